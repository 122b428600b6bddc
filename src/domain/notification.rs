use super::customer::{Customer, CustomerId};
use super::rule::RuleId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub type NotificationId = u64;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Hash, Clone, Copy)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationChannel {
    Sms,
    Email,
    App,
    /// Fan-out over every concrete channel.
    All,
}

impl NotificationChannel {
    pub const CONCRETE: [NotificationChannel; 3] = [
        NotificationChannel::Sms,
        NotificationChannel::Email,
        NotificationChannel::App,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationChannel::Sms => "SMS",
            NotificationChannel::Email => "EMAIL",
            NotificationChannel::App => "APP",
            NotificationChannel::All => "ALL",
        }
    }
}

impl fmt::Display for NotificationChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationStatus {
    #[default]
    Pending,
    Sent,
    Failed,
    Delivered,
}

/// One dispatch attempt over one channel.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Notification {
    pub id: NotificationId,
    pub customer_id: CustomerId,
    pub rule_id: Option<RuleId>,
    pub channel: NotificationChannel,
    pub message: String,
    pub status: NotificationStatus,
    pub sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    /// Resolves a pending notification. Resolving twice is a no-op.
    pub fn resolve(&mut self, delivered: bool, at: DateTime<Utc>) {
        if self.status != NotificationStatus::Pending {
            return;
        }
        if delivered {
            self.status = NotificationStatus::Delivered;
            self.sent_at = Some(at);
        } else {
            self.status = NotificationStatus::Failed;
        }
    }
}

/// A notification before the store has assigned it an id.
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub customer_id: CustomerId,
    pub rule_id: Option<RuleId>,
    pub channel: NotificationChannel,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl NewNotification {
    pub fn with_id(self, id: NotificationId) -> Notification {
        Notification {
            id,
            customer_id: self.customer_id,
            rule_id: self.rule_id,
            channel: self.channel,
            message: self.message,
            status: NotificationStatus::Pending,
            sent_at: None,
            created_at: self.created_at,
        }
    }
}

/// Contact details handed to the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct Recipient {
    pub customer_id: CustomerId,
    pub phone: String,
    pub email: String,
}

impl From<&Customer> for Recipient {
    fn from(customer: &Customer) -> Self {
        Self {
            customer_id: customer.id,
            phone: customer.phone.clone(),
            email: customer.email.clone(),
        }
    }
}
