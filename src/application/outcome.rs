//! Structured results returned by the trigger operations.

use crate::domain::customer::{Customer, CustomerId, DunningStatus};
use crate::domain::payment::PaymentId;
use crate::domain::rule::{ActionType, DunningRule, RuleId};
use crate::error::DunningError;
use rust_decimal::Decimal;
use serde::Serialize;

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcessStatus {
    Success,
    Skipped,
    Failed,
}

/// Result of one rule against one customer.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct RuleExecution {
    pub success: bool,
    pub rule_id: RuleId,
    pub rule_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<ActionType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_taken: Option<String>,
    pub notification_sent: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Set when the rule was not applied because the customer changed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skipped: Option<String>,
}

impl RuleExecution {
    pub fn applied(rule: &DunningRule, notification_sent: bool) -> Self {
        Self {
            success: true,
            rule_id: rule.id,
            rule_name: rule.rule_name.clone(),
            action: Some(rule.action_type),
            action_taken: Some(rule.action_type.description().to_string()),
            notification_sent,
            error: None,
            skipped: None,
        }
    }

    pub fn failed(rule: &DunningRule, error: &DunningError) -> Self {
        Self {
            success: false,
            rule_id: rule.id,
            rule_name: rule.rule_name.clone(),
            action: None,
            action_taken: None,
            notification_sent: false,
            error: Some(error.to_string()),
            skipped: None,
        }
    }

    pub fn superseded(rule: &DunningRule, reason: impl Into<String>) -> Self {
        Self {
            success: false,
            rule_id: rule.id,
            rule_name: rule.rule_name.clone(),
            action: None,
            action_taken: None,
            notification_sent: false,
            error: None,
            skipped: Some(reason.into()),
        }
    }
}

/// Result of running the rule engine for one customer.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct DunningOutcome {
    pub customer_id: CustomerId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_name: Option<String>,
    pub overdue_days: u32,
    pub rules_applied: usize,
    /// What each successful rule did, in execution order.
    pub actions_taken: Vec<String>,
    pub notifications_sent: usize,
    pub rule_results: Vec<RuleExecution>,
    pub status: ProcessStatus,
    pub message: String,
}

impl DunningOutcome {
    pub fn not_found(customer_id: CustomerId) -> Self {
        Self::failed(customer_id, "Customer not found")
    }

    pub fn failed(customer_id: CustomerId, message: impl Into<String>) -> Self {
        Self {
            customer_id,
            customer_name: None,
            overdue_days: 0,
            rules_applied: 0,
            actions_taken: Vec::new(),
            notifications_sent: 0,
            rule_results: Vec::new(),
            status: ProcessStatus::Failed,
            message: message.into(),
        }
    }

    pub fn skipped(customer: &Customer, overdue_days: u32, message: impl Into<String>) -> Self {
        Self {
            customer_id: customer.id,
            customer_name: Some(customer.name.clone()),
            overdue_days,
            rules_applied: 0,
            actions_taken: Vec::new(),
            notifications_sent: 0,
            rule_results: Vec::new(),
            status: ProcessStatus::Skipped,
            message: message.into(),
        }
    }

    pub fn processed(customer: &Customer, overdue_days: u32, rule_results: Vec<RuleExecution>) -> Self {
        let actions_taken = rule_results
            .iter()
            .filter(|r| r.success)
            .filter_map(|r| r.action_taken.clone())
            .collect();
        let notifications_sent = rule_results
            .iter()
            .filter(|r| r.success && r.notification_sent)
            .count();
        Self {
            customer_id: customer.id,
            customer_name: Some(customer.name.clone()),
            overdue_days,
            rules_applied: rule_results.len(),
            actions_taken,
            notifications_sent,
            message: format!("Processed {} rules", rule_results.len()),
            rule_results,
            status: ProcessStatus::Success,
        }
    }
}

/// Aggregate of a batch run.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct BatchSummary {
    pub total_customers: usize,
    pub successful: usize,
    pub failed: usize,
    pub skipped: usize,
    pub results: Vec<DunningOutcome>,
    /// Wall-clock seconds.
    pub execution_time: f64,
}

impl BatchSummary {
    pub fn from_results(results: Vec<DunningOutcome>, execution_time: f64) -> Self {
        let count = |status| results.iter().filter(|r| r.status == status).count();
        Self {
            total_customers: results.len(),
            successful: count(ProcessStatus::Success),
            failed: count(ProcessStatus::Failed),
            skipped: count(ProcessStatus::Skipped),
            results,
            execution_time,
        }
    }
}

/// Per-channel confirmation count, 0 or 1 each.
#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConfirmationTally {
    pub sms: u32,
    pub email: u32,
    pub app: u32,
}

impl ConfirmationTally {
    pub fn total(&self) -> u32 {
        self.sms + self.email + self.app
    }
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct CuringReport {
    pub success: bool,
    pub customer_id: CustomerId,
    pub customer_name: String,
    pub previous_status: DunningStatus,
    pub new_status: DunningStatus,
    pub payment_amount: Decimal,
    pub remaining_balance: Decimal,
    pub actions_taken: Vec<String>,
    pub notifications_sent: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification_details: Option<ConfirmationTally>,
    pub message: String,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct CuringFailure {
    pub success: bool,
    pub customer_id: CustomerId,
    pub error_type: String,
    pub message: String,
}

impl CuringFailure {
    pub fn from_error(customer_id: CustomerId, error: &DunningError) -> Self {
        let error_type = error.error_type();
        let message = match error_type {
            "UnexpectedError" => format!("Curing failed: {error}"),
            _ => error.to_string(),
        };
        Self {
            success: false,
            customer_id,
            error_type: error_type.to_string(),
            message,
        }
    }
}

#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum CuringOutcome {
    Cured(CuringReport),
    Failed(CuringFailure),
}

impl CuringOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, CuringOutcome::Cured(_))
    }

    pub fn report(&self) -> Option<&CuringReport> {
        match self {
            CuringOutcome::Cured(report) => Some(report),
            CuringOutcome::Failed(_) => None,
        }
    }
}

/// Result of handling a gateway webhook.
#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WebhookOutcome {
    Success {
        payment_id: PaymentId,
        curing: CuringOutcome,
    },
    PaymentSuccessCuringFailed {
        payment_id: PaymentId,
        curing: CuringOutcome,
    },
    Duplicate {
        payment_id: PaymentId,
        message: String,
    },
    Rejected {
        reason: String,
    },
}

impl WebhookOutcome {
    pub fn processed(payment_id: PaymentId, curing: CuringOutcome) -> Self {
        if curing.is_success() {
            WebhookOutcome::Success { payment_id, curing }
        } else {
            WebhookOutcome::PaymentSuccessCuringFailed { payment_id, curing }
        }
    }

    pub fn duplicate(payment_id: PaymentId) -> Self {
        WebhookOutcome::Duplicate {
            payment_id,
            message: "Payment already processed".to_string(),
        }
    }
}

/// Result of recording a payment by hand.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct PaymentReceipt {
    pub payment_id: PaymentId,
    pub customer_id: CustomerId,
    pub amount: Decimal,
    pub curing: CuringOutcome,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::customer::CustomerType;
    use crate::domain::money::Balance;
    use crate::domain::notification::NotificationChannel;
    use crate::domain::rule::RuleScope;
    use serde_json::json;

    fn rule(id: RuleId) -> DunningRule {
        DunningRule {
            id,
            rule_name: format!("rule-{id}"),
            customer_type: RuleScope::All,
            trigger_day: 3,
            action_type: ActionType::Notify,
            notification_channel: NotificationChannel::Sms,
            priority: 0,
            is_active: true,
        }
    }

    #[test]
    fn test_processed_counts_only_successful_rules() {
        let customer = Customer::new(1, "Asha", CustomerType::Prepaid, Balance::ZERO);
        let results = vec![
            RuleExecution::applied(&rule(1), true),
            RuleExecution::failed(&rule(2), &DunningError::Conflict(1)),
            RuleExecution::applied(&rule(3), false),
        ];
        let outcome = DunningOutcome::processed(&customer, 3, results);
        assert_eq!(outcome.rules_applied, 3);
        assert_eq!(
            outcome.actions_taken,
            vec!["Notification sent to customer", "Notification sent to customer"]
        );
        assert_eq!(outcome.notifications_sent, 1);
        assert_eq!(outcome.message, "Processed 3 rules");
    }

    #[test]
    fn test_batch_summary_counts_by_status() {
        let customer = Customer::new(1, "Asha", CustomerType::Prepaid, Balance::ZERO);
        let summary = BatchSummary::from_results(
            vec![
                DunningOutcome::processed(&customer, 3, Vec::new()),
                DunningOutcome::skipped(&customer, 0, "Customer not overdue"),
                DunningOutcome::not_found(9),
            ],
            0.5,
        );
        assert_eq!(
            (summary.total_customers, summary.successful, summary.skipped, summary.failed),
            (3, 1, 1, 1)
        );
    }

    #[test]
    fn test_curing_failure_message_by_error_type() {
        let known = CuringFailure::from_error(4, &DunningError::PaymentNotFound(9));
        assert_eq!(known.error_type, "PaymentNotFound");
        assert_eq!(known.message, "Payment with ID 9 not found");

        let unexpected = CuringFailure::from_error(4, &DunningError::Conflict(4));
        assert_eq!(unexpected.error_type, "UnexpectedError");
        assert!(unexpected.message.starts_with("Curing failed: "));
    }

    #[test]
    fn test_webhook_outcome_serialises_status_tag() {
        let value = serde_json::to_value(WebhookOutcome::duplicate(12)).unwrap();
        assert_eq!(
            value,
            json!({"status": "duplicate", "payment_id": 12, "message": "Payment already processed"})
        );

        let failed = WebhookOutcome::processed(
            12,
            CuringOutcome::Failed(CuringFailure::from_error(1, &DunningError::Conflict(1))),
        );
        let value = serde_json::to_value(failed).unwrap();
        assert_eq!(value["status"], "payment_success_curing_failed");
        assert_eq!(value["curing"]["success"], false);
    }
}
