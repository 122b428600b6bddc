#![allow(dead_code)]

use chrono::{Duration, NaiveDate, Utc};
use dunning::application::DunningService;
use dunning::config::EngineConfig;
use dunning::domain::clock::FixedClock;
use dunning::domain::customer::{Customer, CustomerId, CustomerType, DunningStatus};
use dunning::domain::money::Balance;
use dunning::domain::notification::NotificationChannel;
use dunning::domain::payment::{Payment, PaymentId, PaymentMethod, PaymentStatus, PaymentWebhook};
use dunning::domain::rule::{ActionType, DunningRule, RuleId, RuleScope};
use dunning::infrastructure::in_memory::InMemoryStore;
use dunning::infrastructure::transport::ScriptedTransport;
use rust_decimal::Decimal;
use std::sync::Arc;

pub fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, 20).unwrap()
}

pub struct Harness {
    pub store: InMemoryStore,
    pub transport: ScriptedTransport,
    pub service: DunningService,
}

pub fn harness() -> Harness {
    harness_with(EngineConfig::default())
}

pub fn harness_with(config: EngineConfig) -> Harness {
    let store = InMemoryStore::new();
    let transport = ScriptedTransport::new();
    let service = DunningService::new(
        Arc::new(store.clone()),
        Arc::new(transport.clone()),
        Arc::new(FixedClock::new(today())),
        &config,
    );
    Harness {
        store,
        transport,
        service,
    }
}

/// A customer whose due date passed `days_overdue` days before [`today`].
pub fn overdue_customer(
    id: CustomerId,
    customer_type: CustomerType,
    outstanding: Decimal,
    days_overdue: i64,
) -> Customer {
    let mut customer = Customer::new(
        id,
        format!("Customer {id}"),
        customer_type,
        Balance::new(outstanding).unwrap(),
    );
    customer.billing_date = Some(today() - Duration::days(days_overdue + 15));
    customer.due_date = Some(today() - Duration::days(days_overdue));
    customer
}

pub fn with_status(mut customer: Customer, status: DunningStatus) -> Customer {
    customer.overdue_days = customer.overdue_days_on(today());
    customer.dunning_status = status;
    customer
}

pub fn rule(
    id: RuleId,
    trigger_day: u32,
    scope: RuleScope,
    action_type: ActionType,
    channel: NotificationChannel,
) -> DunningRule {
    DunningRule {
        id,
        rule_name: format!("{action_type} on day {trigger_day}"),
        customer_type: scope,
        trigger_day,
        action_type,
        notification_channel: channel,
        priority: 0,
        is_active: true,
    }
}

pub fn success_payment(id: PaymentId, customer_id: CustomerId, amount: Decimal) -> Payment {
    Payment {
        id,
        customer_id,
        amount,
        payment_method: PaymentMethod::Upi,
        payment_status: PaymentStatus::Success,
        transaction_id: Some(format!("TXN-{id}")),
        payment_date: Utc::now(),
    }
}

pub fn webhook(transaction_id: &str, customer_id: CustomerId, amount: Decimal) -> PaymentWebhook {
    PaymentWebhook {
        transaction_id: transaction_id.to_string(),
        customer_id,
        amount,
        payment_method: "UPI".to_string(),
        status: "success".to_string(),
        timestamp: Utc::now(),
        gateway_reference: Some(format!("REF-{transaction_id}")),
    }
}
