use super::customer::{CustomerType, DunningStatus};
use super::notification::NotificationChannel;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::fmt;

pub type RuleId = u64;

/// Customer segment a rule targets.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleScope {
    Postpaid,
    Prepaid,
    All,
}

impl RuleScope {
    pub fn covers(&self, customer_type: CustomerType) -> bool {
        match self {
            RuleScope::All => true,
            RuleScope::Postpaid => customer_type == CustomerType::Postpaid,
            RuleScope::Prepaid => customer_type == CustomerType::Prepaid,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Hash, Clone, Copy)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionType {
    Notify,
    Throttle,
    BarOutgoing,
    Deactivate,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::Notify => "NOTIFY",
            ActionType::Throttle => "THROTTLE",
            ActionType::BarOutgoing => "BAR_OUTGOING",
            ActionType::Deactivate => "DEACTIVATE",
        }
    }

    /// Status the action leaves the customer in; `None` keeps the current one.
    ///
    /// Deactivation and barring share the `Barred` status and differ only in
    /// their audit description.
    pub fn resulting_status(&self) -> Option<DunningStatus> {
        match self {
            ActionType::Notify => None,
            ActionType::Throttle => Some(DunningStatus::Restricted),
            ActionType::BarOutgoing | ActionType::Deactivate => Some(DunningStatus::Barred),
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ActionType::Notify => "Notification sent to customer",
            ActionType::Throttle => "Data speed throttled to 512 kbps",
            ActionType::BarOutgoing => "Outgoing calls and data services barred",
            ActionType::Deactivate => "Service deactivated - SIM suspended",
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A configured escalation step.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct DunningRule {
    pub id: RuleId,
    pub rule_name: String,
    pub customer_type: RuleScope,
    /// Exact overdue-day count at which the rule fires.
    pub trigger_day: u32,
    pub action_type: ActionType,
    pub notification_channel: NotificationChannel,
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl DunningRule {
    pub fn applies_to(&self, overdue_days: u32, customer_type: CustomerType) -> bool {
        self.is_active && self.trigger_day == overdue_days && self.customer_type.covers(customer_type)
    }
}

/// Orders rules for evaluation: highest priority first, ties by ascending id.
pub fn sort_for_evaluation(rules: &mut [DunningRule]) {
    rules.sort_by_key(|rule| (Reverse(rule.priority), rule.id));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(id: RuleId, priority: i32, scope: RuleScope, day: u32) -> DunningRule {
        DunningRule {
            id,
            rule_name: format!("rule-{id}"),
            customer_type: scope,
            trigger_day: day,
            action_type: ActionType::Notify,
            notification_channel: NotificationChannel::Sms,
            priority,
            is_active: true,
        }
    }

    #[test]
    fn test_applies_to_matches_day_and_scope() {
        let postpaid = rule(1, 0, RuleScope::Postpaid, 7);
        assert!(postpaid.applies_to(7, CustomerType::Postpaid));
        assert!(!postpaid.applies_to(7, CustomerType::Prepaid));
        assert!(!postpaid.applies_to(8, CustomerType::Postpaid));

        let all = rule(2, 0, RuleScope::All, 7);
        assert!(all.applies_to(7, CustomerType::Prepaid));
    }

    #[test]
    fn test_inactive_rule_never_applies() {
        let mut r = rule(1, 0, RuleScope::All, 3);
        r.is_active = false;
        assert!(!r.applies_to(3, CustomerType::Postpaid));
    }

    #[test]
    fn test_sort_by_priority_then_id() {
        let mut rules = vec![
            rule(4, 1, RuleScope::All, 7),
            rule(2, 5, RuleScope::All, 7),
            rule(3, 5, RuleScope::All, 7),
            rule(1, 1, RuleScope::All, 7),
        ];
        sort_for_evaluation(&mut rules);
        let ids: Vec<RuleId> = rules.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![2, 3, 1, 4]);
    }

    #[test]
    fn test_deactivate_and_bar_share_status() {
        assert_eq!(
            ActionType::Deactivate.resulting_status(),
            ActionType::BarOutgoing.resulting_status()
        );
        assert_ne!(
            ActionType::Deactivate.description(),
            ActionType::BarOutgoing.description()
        );
        assert_eq!(ActionType::Notify.resulting_status(), None);
        assert_eq!(
            ActionType::Throttle.resulting_status(),
            Some(DunningStatus::Restricted)
        );
    }
}
