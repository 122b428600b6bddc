use super::money::Balance;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

pub type CustomerId = u64;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Hash, Clone, Copy)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CustomerType {
    Postpaid,
    Prepaid,
}

/// Where a customer sits on the dunning ladder.
///
/// `Cured` is only ever reported by the curing workflow's history; the rule
/// engine moves customers between the other four states.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Hash, Clone, Copy, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DunningStatus {
    #[default]
    Active,
    Notified,
    Restricted,
    Barred,
    Cured,
}

impl DunningStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DunningStatus::Active => "ACTIVE",
            DunningStatus::Notified => "NOTIFIED",
            DunningStatus::Restricted => "RESTRICTED",
            DunningStatus::Barred => "BARRED",
            DunningStatus::Cured => "CURED",
        }
    }
}

impl fmt::Display for DunningStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for CustomerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CustomerType::Postpaid => "POSTPAID",
            CustomerType::Prepaid => "PREPAID",
        })
    }
}

/// A subscriber together with its billing snapshot.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Customer {
    pub id: CustomerId,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub customer_type: CustomerType,
    pub plan_type: String,
    pub billing_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    /// Days past the due date as of the last dunning or curing run.
    #[serde(default)]
    pub overdue_days: u32,
    pub outstanding_amount: Balance,
    #[serde(default)]
    pub dunning_status: DunningStatus,
    /// Bumped by the store on every committed write.
    #[serde(default)]
    pub version: u64,
}

impl Customer {
    pub fn new(
        id: CustomerId,
        name: impl Into<String>,
        customer_type: CustomerType,
        outstanding_amount: Balance,
    ) -> Self {
        let name = name.into();
        Self {
            id,
            email: format!("customer{id}@example.com"),
            phone: format!("+91{:010}", id),
            name,
            customer_type,
            plan_type: "STANDARD".to_string(),
            billing_date: None,
            due_date: None,
            overdue_days: 0,
            outstanding_amount,
            dunning_status: DunningStatus::Active,
            version: 0,
        }
    }

    /// Days elapsed past the due date on `today`; zero when there is no due
    /// date or it has not passed yet.
    pub fn overdue_days_on(&self, today: NaiveDate) -> u32 {
        match self.due_date {
            Some(due) if today > due => (today - due).num_days().try_into().unwrap_or(u32::MAX),
            _ => 0,
        }
    }

    pub fn has_outstanding_balance(&self) -> bool {
        !self.outstanding_amount.is_zero()
    }

    /// A customer needing no restoration: active and not overdue.
    pub fn is_cured(&self) -> bool {
        self.dunning_status == DunningStatus::Active && self.overdue_days == 0
    }
}
