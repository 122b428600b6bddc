use super::row_lock::RowLocks;
use super::staged::{Backend, Sequence, Sequences, StagedTransaction, StagedWrites};
use crate::domain::audit::{CuringAction, DunningLog};
use crate::domain::customer::{Customer, CustomerId, CustomerType};
use crate::domain::notification::Notification;
use crate::domain::payment::{Payment, PaymentId};
use crate::domain::ports::{DunningStore, StoreTx};
use crate::domain::rule::{DunningRule, sort_for_evaluation};
use crate::error::{DunningError, Result};
use async_trait::async_trait;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, IteratorMode, Options, WriteBatch};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Column Family for customer rows.
pub const CF_CUSTOMERS: &str = "customers";
/// Column Family for dunning rules.
pub const CF_RULES: &str = "rules";
/// Column Family for payments keyed by payment id.
pub const CF_PAYMENTS: &str = "payments";
/// Column Family mapping gateway transaction ids to payment ids.
pub const CF_PAYMENT_TXN: &str = "payment_transactions";
/// Column Family for the dunning audit log.
pub const CF_DUNNING_LOGS: &str = "dunning_logs";
/// Column Family for curing actions.
pub const CF_CURING_ACTIONS: &str = "curing_actions";
/// Column Family for notifications.
pub const CF_NOTIFICATIONS: &str = "notifications";

const COLUMN_FAMILIES: [&str; 7] = [
    CF_CUSTOMERS,
    CF_RULES,
    CF_PAYMENTS,
    CF_PAYMENT_TXN,
    CF_DUNNING_LOGS,
    CF_CURING_ACTIONS,
    CF_NOTIFICATIONS,
];

/// A persistent store implementation using RocksDB.
///
/// Each entity lives in its own Column Family, keyed by its big-endian id and
/// stored as JSON. Commits are written as one `WriteBatch`, so a transaction
/// lands completely or not at all.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
    sequences: Arc<Sequences>,
    row_locks: RowLocks,
    commit_lock: Arc<Mutex<()>>,
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at the specified path.
    ///
    /// Creates any missing column families and resumes id sequences from the
    /// highest stored keys.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let descriptors = COLUMN_FAMILIES
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Options::default()));
        let db = DB::open_cf_descriptors(&opts, path, descriptors)?;

        let store = Self {
            db: Arc::new(db),
            sequences: Arc::new(Sequences::default()),
            row_locks: RowLocks::new(),
            commit_lock: Arc::new(Mutex::new(())),
        };
        for (cf, sequence) in [
            (CF_PAYMENTS, Sequence::Payment),
            (CF_DUNNING_LOGS, Sequence::DunningLog),
            (CF_CURING_ACTIONS, Sequence::CuringAction),
            (CF_NOTIFICATIONS, Sequence::Notification),
        ] {
            if let Some(last) = store.last_key(cf)? {
                store.sequences.observe(sequence, last);
            }
        }
        Ok(store)
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db.cf_handle(name).ok_or_else(|| {
            DunningError::InternalError(Box::new(std::io::Error::other(format!(
                "{name} column family not found"
            ))))
        })
    }

    fn get_json<T: DeserializeOwned>(&self, cf: &str, key: &[u8]) -> Result<Option<T>> {
        match self.db.get_cf(self.cf(cf)?, key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn scan_json<T: DeserializeOwned>(&self, cf: &str) -> Result<Vec<T>> {
        let mut rows = Vec::new();
        for item in self.db.iterator_cf(self.cf(cf)?, IteratorMode::Start) {
            let (_key, value) = item?;
            rows.push(serde_json::from_slice(&value)?);
        }
        Ok(rows)
    }

    fn put_json<T: Serialize>(&self, cf: &str, key: &[u8], value: &T) -> Result<()> {
        self.db.put_cf(self.cf(cf)?, key, serde_json::to_vec(value)?)?;
        Ok(())
    }

    fn last_key(&self, cf: &str) -> Result<Option<u64>> {
        match self.db.iterator_cf(self.cf(cf)?, IteratorMode::End).next() {
            Some(item) => {
                let (key, _value) = item?;
                Ok(decode_id(&key))
            }
            None => Ok(None),
        }
    }

    fn payment_id_for(&self, transaction_id: &str) -> Result<Option<PaymentId>> {
        let raw = self
            .db
            .get_cf(self.cf(CF_PAYMENT_TXN)?, transaction_id.as_bytes())?;
        Ok(raw.as_deref().and_then(decode_id))
    }
}

fn decode_id(bytes: &[u8]) -> Option<u64> {
    bytes.try_into().ok().map(u64::from_be_bytes)
}

#[async_trait]
impl Backend for RocksDBStore {
    async fn load_customer(&self, id: CustomerId) -> Result<Option<Customer>> {
        self.get_json(CF_CUSTOMERS, &id.to_be_bytes())
    }

    async fn load_payment(&self, id: PaymentId) -> Result<Option<Payment>> {
        self.get_json(CF_PAYMENTS, &id.to_be_bytes())
    }

    async fn load_payment_by_transaction_id(
        &self,
        transaction_id: &str,
    ) -> Result<Option<Payment>> {
        match self.payment_id_for(transaction_id)? {
            Some(id) => self.get_json(CF_PAYMENTS, &id.to_be_bytes()),
            None => Ok(None),
        }
    }

    fn next_id(&self, sequence: Sequence) -> u64 {
        self.sequences.next(sequence)
    }

    async fn apply(&self, writes: StagedWrites) -> Result<()> {
        let _commit = self.commit_lock.lock().await;

        if let Some(customer) = &writes.customer {
            let committed: Option<Customer> =
                self.get_json(CF_CUSTOMERS, &customer.id.to_be_bytes())?;
            writes.check_version(committed.map(|c| c.version))?;
        }
        for payment in &writes.payments {
            if let Some(transaction_id) = &payment.transaction_id
                && self.payment_id_for(transaction_id)?.is_some()
            {
                return Err(DunningError::DuplicateTransaction(transaction_id.clone()));
            }
        }

        let mut batch = WriteBatch::default();
        if let Some(mut customer) = writes.customer {
            customer.version += 1;
            batch.put_cf(
                self.cf(CF_CUSTOMERS)?,
                customer.id.to_be_bytes(),
                serde_json::to_vec(&customer)?,
            );
        }
        for payment in &writes.payments {
            if let Some(transaction_id) = &payment.transaction_id {
                batch.put_cf(
                    self.cf(CF_PAYMENT_TXN)?,
                    transaction_id.as_bytes(),
                    payment.id.to_be_bytes(),
                );
            }
            batch.put_cf(
                self.cf(CF_PAYMENTS)?,
                payment.id.to_be_bytes(),
                serde_json::to_vec(payment)?,
            );
        }
        for log in &writes.dunning_logs {
            batch.put_cf(
                self.cf(CF_DUNNING_LOGS)?,
                log.id.to_be_bytes(),
                serde_json::to_vec(log)?,
            );
        }
        for action in &writes.curing_actions {
            batch.put_cf(
                self.cf(CF_CURING_ACTIONS)?,
                action.id.to_be_bytes(),
                serde_json::to_vec(action)?,
            );
        }
        for notification in writes.notifications.values() {
            batch.put_cf(
                self.cf(CF_NOTIFICATIONS)?,
                notification.id.to_be_bytes(),
                serde_json::to_vec(notification)?,
            );
        }

        self.db.write(batch)?;
        Ok(())
    }
}

#[async_trait]
impl DunningStore for RocksDBStore {
    async fn begin(&self, customer_id: CustomerId) -> Result<StoreTx> {
        let row = self.row_locks.acquire(customer_id).await;
        Ok(Box::new(StagedTransaction::new(
            self.clone(),
            customer_id,
            row,
        )))
    }

    async fn get_customer(&self, id: CustomerId) -> Result<Option<Customer>> {
        self.load_customer(id).await
    }

    async fn all_customers(&self) -> Result<Vec<Customer>> {
        self.scan_json(CF_CUSTOMERS)
    }

    async fn active_rules_for(
        &self,
        trigger_day: u32,
        customer_type: CustomerType,
    ) -> Result<Vec<DunningRule>> {
        let mut rules: Vec<DunningRule> = self.scan_json(CF_RULES)?;
        rules.retain(|rule| rule.applies_to(trigger_day, customer_type));
        sort_for_evaluation(&mut rules);
        Ok(rules)
    }

    async fn get_payment(&self, id: PaymentId) -> Result<Option<Payment>> {
        self.load_payment(id).await
    }

    async fn get_payment_by_transaction_id(
        &self,
        transaction_id: &str,
    ) -> Result<Option<Payment>> {
        self.load_payment_by_transaction_id(transaction_id).await
    }

    async fn dunning_logs(&self) -> Result<Vec<DunningLog>> {
        self.scan_json(CF_DUNNING_LOGS)
    }

    async fn curing_actions(&self) -> Result<Vec<CuringAction>> {
        self.scan_json(CF_CURING_ACTIONS)
    }

    async fn notifications(&self) -> Result<Vec<Notification>> {
        self.scan_json(CF_NOTIFICATIONS)
    }

    async fn put_customer(&self, customer: Customer) -> Result<()> {
        self.put_json(CF_CUSTOMERS, &customer.id.to_be_bytes(), &customer)
    }

    async fn put_rule(&self, rule: DunningRule) -> Result<()> {
        self.put_json(CF_RULES, &rule.id.to_be_bytes(), &rule)
    }

    async fn put_payment(&self, payment: Payment) -> Result<()> {
        let _commit = self.commit_lock.lock().await;
        if let Some(transaction_id) = &payment.transaction_id {
            match self.payment_id_for(transaction_id)? {
                Some(existing) if existing != payment.id => {
                    return Err(DunningError::DuplicateTransaction(transaction_id.clone()));
                }
                _ => self.db.put_cf(
                    self.cf(CF_PAYMENT_TXN)?,
                    transaction_id.as_bytes(),
                    payment.id.to_be_bytes(),
                )?,
            }
        }
        self.sequences.observe(Sequence::Payment, payment.id);
        self.put_json(CF_PAYMENTS, &payment.id.to_be_bytes(), &payment)
    }
}
