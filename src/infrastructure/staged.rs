//! Write staging shared by the store backends.
//!
//! A [`StagedTransaction`] buffers every write in memory while holding the
//! customer's row lock and hands the whole batch to its [`Backend`] on commit.
//! Backends apply a batch atomically, so a rolled back or dropped transaction
//! never leaves partial state behind.

use crate::domain::audit::{CuringAction, DunningLog, NewCuringAction, NewDunningLog};
use crate::domain::customer::{Customer, CustomerId};
use crate::domain::notification::{NewNotification, Notification, NotificationId};
use crate::domain::payment::{NewPayment, Payment, PaymentId};
use crate::domain::ports::StoreTransaction;
use crate::error::{DunningError, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::OwnedMutexGuard;

/// Id sequences for rows the store creates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sequence {
    Payment,
    DunningLog,
    CuringAction,
    Notification,
}

/// Monotonic id counters, one per [`Sequence`].
///
/// Ids handed to a transaction that later rolls back are not reused.
#[derive(Debug, Default)]
pub struct Sequences {
    payment: AtomicU64,
    dunning_log: AtomicU64,
    curing_action: AtomicU64,
    notification: AtomicU64,
}

impl Sequences {
    fn counter(&self, sequence: Sequence) -> &AtomicU64 {
        match sequence {
            Sequence::Payment => &self.payment,
            Sequence::DunningLog => &self.dunning_log,
            Sequence::CuringAction => &self.curing_action,
            Sequence::Notification => &self.notification,
        }
    }

    pub fn next(&self, sequence: Sequence) -> u64 {
        self.counter(sequence).fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Makes sure future ids start above `id`.
    pub fn observe(&self, sequence: Sequence, id: u64) {
        self.counter(sequence).fetch_max(id, Ordering::SeqCst);
    }
}

/// Everything a transaction wants to write.
#[derive(Debug, Default)]
pub struct StagedWrites {
    pub customer: Option<Customer>,
    /// Customer version observed when the transaction first touched the row.
    pub base_version: Option<u64>,
    pub payments: Vec<Payment>,
    pub dunning_logs: Vec<DunningLog>,
    pub curing_actions: Vec<CuringAction>,
    pub notifications: BTreeMap<NotificationId, Notification>,
}

impl StagedWrites {
    pub fn is_empty(&self) -> bool {
        self.customer.is_none()
            && self.payments.is_empty()
            && self.dunning_logs.is_empty()
            && self.curing_actions.is_empty()
            && self.notifications.is_empty()
    }

    /// Returns the conflict error if the committed version moved on.
    pub fn check_version(&self, committed: Option<u64>) -> Result<()> {
        match (&self.customer, committed, self.base_version) {
            (Some(customer), Some(current), Some(base)) if current != base => {
                Err(DunningError::Conflict(customer.id))
            }
            _ => Ok(()),
        }
    }
}

/// Storage primitives a [`StagedTransaction`] needs from a backend.
#[async_trait]
pub trait Backend: Clone + Send + Sync + 'static {
    async fn load_customer(&self, id: CustomerId) -> Result<Option<Customer>>;
    async fn load_payment(&self, id: PaymentId) -> Result<Option<Payment>>;
    async fn load_payment_by_transaction_id(&self, transaction_id: &str)
    -> Result<Option<Payment>>;
    fn next_id(&self, sequence: Sequence) -> u64;
    /// Applies a batch atomically. Must reject version conflicts and
    /// transaction ids already on record.
    async fn apply(&self, writes: StagedWrites) -> Result<()>;
}

pub struct StagedTransaction<B: Backend> {
    backend: B,
    customer_id: CustomerId,
    writes: StagedWrites,
    row: OwnedMutexGuard<()>,
}

impl<B: Backend> StagedTransaction<B> {
    pub fn new(backend: B, customer_id: CustomerId, row: OwnedMutexGuard<()>) -> Self {
        Self {
            backend,
            customer_id,
            writes: StagedWrites::default(),
            row,
        }
    }
}

#[async_trait]
impl<B: Backend> StoreTransaction for StagedTransaction<B> {
    fn customer_id(&self) -> CustomerId {
        self.customer_id
    }

    async fn get_customer(&mut self, id: CustomerId) -> Result<Option<Customer>> {
        if id != self.customer_id {
            return self.backend.load_customer(id).await;
        }
        if let Some(staged) = &self.writes.customer {
            return Ok(Some(staged.clone()));
        }
        let loaded = self.backend.load_customer(id).await?;
        if let Some(customer) = &loaded {
            self.writes.base_version.get_or_insert(customer.version);
        }
        Ok(loaded)
    }

    async fn get_payment(&mut self, id: PaymentId) -> Result<Option<Payment>> {
        if let Some(staged) = self.writes.payments.iter().find(|p| p.id == id) {
            return Ok(Some(staged.clone()));
        }
        self.backend.load_payment(id).await
    }

    async fn get_payment_by_transaction_id(
        &mut self,
        transaction_id: &str,
    ) -> Result<Option<Payment>> {
        let staged = self
            .writes
            .payments
            .iter()
            .find(|p| p.transaction_id.as_deref() == Some(transaction_id));
        if let Some(payment) = staged {
            return Ok(Some(payment.clone()));
        }
        self.backend
            .load_payment_by_transaction_id(transaction_id)
            .await
    }

    async fn save_customer(&mut self, customer: Customer) -> Result<()> {
        if customer.id != self.customer_id {
            return Err(DunningError::ValidationError(format!(
                "Customer {} is not locked by this transaction (holding {})",
                customer.id, self.customer_id
            )));
        }
        self.writes.base_version.get_or_insert(customer.version);
        self.writes.customer = Some(customer);
        Ok(())
    }

    async fn insert_payment(&mut self, payment: NewPayment) -> Result<Payment> {
        if let Some(transaction_id) = &payment.transaction_id
            && self
                .get_payment_by_transaction_id(transaction_id)
                .await?
                .is_some()
        {
            return Err(DunningError::DuplicateTransaction(transaction_id.clone()));
        }
        let payment = payment.with_id(self.backend.next_id(Sequence::Payment));
        self.writes.payments.push(payment.clone());
        Ok(payment)
    }

    async fn append_dunning_log(&mut self, log: NewDunningLog) -> Result<DunningLog> {
        let log = log.with_id(self.backend.next_id(Sequence::DunningLog));
        self.writes.dunning_logs.push(log.clone());
        Ok(log)
    }

    async fn append_curing_action(&mut self, action: NewCuringAction) -> Result<CuringAction> {
        let action = action.with_id(self.backend.next_id(Sequence::CuringAction));
        self.writes.curing_actions.push(action.clone());
        Ok(action)
    }

    async fn append_notification(
        &mut self,
        notification: NewNotification,
    ) -> Result<Notification> {
        let notification = notification.with_id(self.backend.next_id(Sequence::Notification));
        self.writes
            .notifications
            .insert(notification.id, notification.clone());
        Ok(notification)
    }

    async fn update_notification(&mut self, notification: Notification) -> Result<()> {
        self.writes
            .notifications
            .insert(notification.id, notification);
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let StagedTransaction {
            backend,
            writes,
            row,
            ..
        } = *self;
        if writes.is_empty() {
            return Ok(());
        }
        let applied = backend.apply(writes).await;
        drop(row);
        applied
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}
