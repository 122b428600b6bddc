//! Customer-facing message catalog.

use crate::domain::customer::Customer;
use crate::domain::money::Rupees;
use crate::domain::rule::ActionType;
use chrono::NaiveDate;
use rust_decimal::Decimal;

/// A rendered-on-demand notification message with its parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum Template<'a> {
    PaymentReminder {
        name: &'a str,
        amount: Decimal,
        days: u32,
        due_date: Option<NaiveDate>,
    },
    DataThrottle {
        name: &'a str,
        amount: Decimal,
        days: u32,
    },
    ServiceBarred {
        name: &'a str,
        amount: Decimal,
        days: u32,
    },
    FinalNotice {
        name: &'a str,
        amount: Decimal,
        days: u32,
    },
    PaymentSuccess {
        name: &'a str,
        amount: Decimal,
        remaining: Decimal,
    },
    ServiceRestored {
        name: &'a str,
        amount: Decimal,
    },
}

impl Template<'_> {
    pub fn key(&self) -> &'static str {
        match self {
            Template::PaymentReminder { .. } => "payment_reminder",
            Template::DataThrottle { .. } => "data_throttle",
            Template::ServiceBarred { .. } => "service_barred",
            Template::FinalNotice { .. } => "final_notice",
            Template::PaymentSuccess { .. } => "payment_success",
            Template::ServiceRestored { .. } => "service_restored",
        }
    }

    pub fn render(&self) -> String {
        match *self {
            Template::PaymentReminder {
                name,
                amount,
                days,
                due_date,
            } => {
                let due = due_date
                    .map(|d| d.format("%d %b %Y").to_string())
                    .unwrap_or_else(|| "N/A".to_string());
                format!(
                    "Dear {name}, your bill of {} is overdue by {days} days. \
                     Please pay to avoid service disruption. Due date was: {due}",
                    Rupees(amount)
                )
            }
            Template::DataThrottle { name, amount, days } => format!(
                "Dear {name}, due to payment delay of {days} days, your data speed has been reduced. \
                 Outstanding: {}. Pay now to restore full speed.",
                Rupees(amount)
            ),
            Template::ServiceBarred { name, amount, days } => format!(
                "URGENT: {name}, your outgoing services have been barred due to {days} days \
                 overdue payment of {}. Pay immediately to restore services.",
                Rupees(amount)
            ),
            Template::FinalNotice { name, amount, days } => format!(
                "FINAL NOTICE: {name}, your service has been suspended due to non-payment for \
                 {days} days. Outstanding: {}. Immediate payment required to avoid disconnection.",
                Rupees(amount)
            ),
            Template::PaymentSuccess {
                name,
                amount,
                remaining,
            } => format!(
                "Dear {name}, thank you for your payment of {}. Remaining balance: {}. \
                 Please clear to avoid future disruptions.",
                Rupees(amount),
                Rupees(remaining)
            ),
            Template::ServiceRestored { name, amount } => format!(
                "Dear {name}, your payment of {} has been received. \
                 All services have been restored. Thank you!",
                Rupees(amount)
            ),
        }
    }

    /// Message announcing a dunning action to the customer.
    pub fn for_action(
        action: ActionType,
        customer: &'_ Customer,
        overdue_days: u32,
    ) -> Template<'_> {
        let name = customer.name.as_str();
        let amount = customer.outstanding_amount.value();
        match action {
            ActionType::Notify => Template::PaymentReminder {
                name,
                amount,
                days: overdue_days,
                due_date: customer.due_date,
            },
            ActionType::Throttle => Template::DataThrottle {
                name,
                amount,
                days: overdue_days,
            },
            ActionType::BarOutgoing => Template::ServiceBarred {
                name,
                amount,
                days: overdue_days,
            },
            ActionType::Deactivate => Template::FinalNotice {
                name,
                amount,
                days: overdue_days,
            },
        }
    }

    /// Payment confirmation, depending on whether a balance remains.
    pub fn confirmation<'a>(name: &'a str, amount: Decimal, remaining: Decimal) -> Template<'a> {
        if remaining > Decimal::ZERO {
            Template::PaymentSuccess {
                name,
                amount,
                remaining,
            }
        } else {
            Template::ServiceRestored { name, amount }
        }
    }
}
