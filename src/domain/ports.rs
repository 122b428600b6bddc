use super::audit::{CuringAction, DunningLog, NewCuringAction, NewDunningLog};
use super::clock::Clock;
use super::customer::{Customer, CustomerId, CustomerType};
use super::notification::{NewNotification, Notification};
use super::payment::{NewPayment, Payment, PaymentId};
use super::rule::DunningRule;
use crate::error::{Result, TransportFault};
use async_trait::async_trait;
use std::sync::Arc;

/// Read access and transaction entry point for the persistence layer.
#[async_trait]
pub trait DunningStore: Send + Sync {
    /// Opens a transaction holding the write lock on `customer_id`'s row.
    ///
    /// Waits while another transaction holds the same row. Writes are only
    /// visible to other readers after `commit`; dropping the transaction
    /// discards them.
    async fn begin(&self, customer_id: CustomerId) -> Result<StoreTx>;

    async fn get_customer(&self, id: CustomerId) -> Result<Option<Customer>>;
    async fn all_customers(&self) -> Result<Vec<Customer>>;

    async fn customers_with_outstanding_balance(&self) -> Result<Vec<Customer>> {
        let mut customers = self.all_customers().await?;
        customers.retain(Customer::has_outstanding_balance);
        Ok(customers)
    }

    /// Active rules for an exact trigger day whose scope covers `customer_type`.
    async fn active_rules_for(
        &self,
        trigger_day: u32,
        customer_type: CustomerType,
    ) -> Result<Vec<DunningRule>>;

    async fn get_payment(&self, id: PaymentId) -> Result<Option<Payment>>;
    async fn get_payment_by_transaction_id(&self, transaction_id: &str)
    -> Result<Option<Payment>>;

    async fn dunning_logs(&self) -> Result<Vec<DunningLog>>;
    async fn curing_actions(&self) -> Result<Vec<CuringAction>>;
    async fn notifications(&self) -> Result<Vec<Notification>>;

    /// Administrative upserts used to seed customers, rules and payments.
    async fn put_customer(&self, customer: Customer) -> Result<()>;
    async fn put_rule(&self, rule: DunningRule) -> Result<()>;
    async fn put_payment(&self, payment: Payment) -> Result<()>;
}

/// A unit of work scoped to one customer row.
#[async_trait]
pub trait StoreTransaction: Send {
    /// The customer whose row this transaction has locked.
    fn customer_id(&self) -> CustomerId;

    async fn get_customer(&mut self, id: CustomerId) -> Result<Option<Customer>>;
    async fn get_payment(&mut self, id: PaymentId) -> Result<Option<Payment>>;
    async fn get_payment_by_transaction_id(
        &mut self,
        transaction_id: &str,
    ) -> Result<Option<Payment>>;

    /// Stages a write of the locked customer. Saving any other customer fails.
    async fn save_customer(&mut self, customer: Customer) -> Result<()>;
    /// Assigns an id; a transaction id already on record fails with
    /// `DuplicateTransaction`.
    async fn insert_payment(&mut self, payment: NewPayment) -> Result<Payment>;
    async fn append_dunning_log(&mut self, log: NewDunningLog) -> Result<DunningLog>;
    async fn append_curing_action(&mut self, action: NewCuringAction) -> Result<CuringAction>;
    async fn append_notification(&mut self, notification: NewNotification)
    -> Result<Notification>;
    async fn update_notification(&mut self, notification: Notification) -> Result<()>;

    async fn commit(self: Box<Self>) -> Result<()>;
    async fn rollback(self: Box<Self>) -> Result<()>;
}

/// Delivery gateways for customer messages.
///
/// `Ok(false)` is a delivery the gateway refused; `Err` is a fault raised
/// while talking to it.
#[async_trait]
pub trait NotificationTransport: Send + Sync {
    async fn send_sms(&self, phone: &str, message: &str) -> std::result::Result<bool, TransportFault>;
    async fn send_email(
        &self,
        email: &str,
        subject: &str,
        message: &str,
    ) -> std::result::Result<bool, TransportFault>;
    async fn send_app_push(
        &self,
        customer_id: CustomerId,
        message: &str,
    ) -> std::result::Result<bool, TransportFault>;
}

pub type StoreTx = Box<dyn StoreTransaction>;
pub type SharedStore = Arc<dyn DunningStore>;
pub type SharedTransport = Arc<dyn NotificationTransport>;
pub type SharedClock = Arc<dyn Clock>;
