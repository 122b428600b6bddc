//! Append-only audit records written by the rule engine and curing workflow.

use super::customer::{CustomerId, DunningStatus};
use super::notification::NotificationChannel;
use super::payment::PaymentId;
use super::rule::{ActionType, RuleId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub type DunningLogId = u64;
pub type CuringActionId = u64;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DunningLogStatus {
    Success,
    Failed,
}

/// Structured payload stored with each dunning log.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct DunningLogDetails {
    pub rule_name: String,
    pub action_type: ActionType,
    pub notification_channel: NotificationChannel,
    pub overdue_days: u32,
    pub outstanding_amount: Decimal,
    pub action_taken: String,
    pub notification_sent: bool,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct DunningLog {
    pub id: DunningLogId,
    pub customer_id: CustomerId,
    /// Kept nullable: the rule may be deleted after the log was written.
    pub rule_id: Option<RuleId>,
    pub action_type: ActionType,
    pub status: DunningLogStatus,
    pub details: DunningLogDetails,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewDunningLog {
    pub customer_id: CustomerId,
    pub rule_id: Option<RuleId>,
    pub action_type: ActionType,
    pub status: DunningLogStatus,
    pub details: DunningLogDetails,
    pub created_at: DateTime<Utc>,
}

impl NewDunningLog {
    pub fn with_id(self, id: DunningLogId) -> DunningLog {
        DunningLog {
            id,
            customer_id: self.customer_id,
            rule_id: self.rule_id,
            action_type: self.action_type,
            status: self.status,
            details: self.details,
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct CuringAction {
    pub id: CuringActionId,
    pub customer_id: CustomerId,
    pub payment_id: PaymentId,
    /// Status captured before curing mutated the customer.
    pub previous_status: DunningStatus,
    pub action_taken: String,
    pub success_flag: bool,
    pub remarks: Option<String>,
    pub cured_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewCuringAction {
    pub customer_id: CustomerId,
    pub payment_id: PaymentId,
    pub previous_status: DunningStatus,
    pub action_taken: String,
    pub success_flag: bool,
    pub remarks: Option<String>,
    pub cured_at: DateTime<Utc>,
}

impl NewCuringAction {
    pub fn with_id(self, id: CuringActionId) -> CuringAction {
        CuringAction {
            id,
            customer_id: self.customer_id,
            payment_id: self.payment_id,
            previous_status: self.previous_status,
            action_taken: self.action_taken,
            success_flag: self.success_flag,
            remarks: self.remarks,
            cured_at: self.cured_at,
        }
    }
}
