use super::row_lock::RowLocks;
use super::staged::{Backend, Sequence, Sequences, StagedTransaction, StagedWrites};
use crate::domain::audit::{CuringAction, DunningLog};
use crate::domain::customer::{Customer, CustomerId, CustomerType};
use crate::domain::notification::{Notification, NotificationId};
use crate::domain::payment::{Payment, PaymentId};
use crate::domain::ports::{DunningStore, StoreTx};
use crate::domain::rule::{DunningRule, RuleId, sort_for_evaluation};
use crate::error::{DunningError, Result};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct Tables {
    customers: BTreeMap<CustomerId, Customer>,
    rules: BTreeMap<RuleId, DunningRule>,
    payments: BTreeMap<PaymentId, Payment>,
    payments_by_transaction: HashMap<String, PaymentId>,
    dunning_logs: Vec<DunningLog>,
    curing_actions: Vec<CuringAction>,
    notifications: BTreeMap<NotificationId, Notification>,
}

/// A thread-safe in-memory dunning store.
///
/// Uses `Arc<RwLock<..>>` tables so clones share state. Commits take the write
/// lock once, which makes each batch atomic. Ideal for tests and one-shot CLI
/// runs where persistence is not required.
#[derive(Default, Clone)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
    sequences: Arc<Sequences>,
    row_locks: RowLocks,
}

impl InMemoryStore {
    /// Creates a new, empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Backend for InMemoryStore {
    async fn load_customer(&self, id: CustomerId) -> Result<Option<Customer>> {
        let tables = self.tables.read().await;
        Ok(tables.customers.get(&id).cloned())
    }

    async fn load_payment(&self, id: PaymentId) -> Result<Option<Payment>> {
        let tables = self.tables.read().await;
        Ok(tables.payments.get(&id).cloned())
    }

    async fn load_payment_by_transaction_id(
        &self,
        transaction_id: &str,
    ) -> Result<Option<Payment>> {
        let tables = self.tables.read().await;
        Ok(tables
            .payments_by_transaction
            .get(transaction_id)
            .and_then(|id| tables.payments.get(id))
            .cloned())
    }

    fn next_id(&self, sequence: Sequence) -> u64 {
        self.sequences.next(sequence)
    }

    async fn apply(&self, writes: StagedWrites) -> Result<()> {
        let mut tables = self.tables.write().await;

        if let Some(customer) = &writes.customer {
            let committed = tables.customers.get(&customer.id).map(|c| c.version);
            writes.check_version(committed)?;
        }
        for payment in &writes.payments {
            if let Some(transaction_id) = &payment.transaction_id
                && tables.payments_by_transaction.contains_key(transaction_id)
            {
                return Err(DunningError::DuplicateTransaction(transaction_id.clone()));
            }
        }

        let StagedWrites {
            customer,
            payments,
            dunning_logs,
            curing_actions,
            notifications,
            ..
        } = writes;

        if let Some(mut customer) = customer {
            customer.version += 1;
            tables.customers.insert(customer.id, customer);
        }
        for payment in payments {
            if let Some(transaction_id) = &payment.transaction_id {
                tables
                    .payments_by_transaction
                    .insert(transaction_id.clone(), payment.id);
            }
            tables.payments.insert(payment.id, payment);
        }
        tables.dunning_logs.extend(dunning_logs);
        tables.curing_actions.extend(curing_actions);
        tables.notifications.extend(notifications);
        Ok(())
    }
}

#[async_trait]
impl DunningStore for InMemoryStore {
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
        let tables = self.tables.read().await;
        Ok(tables.customers.values().cloned().collect())
    }

    async fn active_rules_for(
        &self,
        trigger_day: u32,
        customer_type: CustomerType,
    ) -> Result<Vec<DunningRule>> {
        let tables = self.tables.read().await;
        let mut rules: Vec<DunningRule> = tables
            .rules
            .values()
            .filter(|rule| rule.applies_to(trigger_day, customer_type))
            .cloned()
            .collect();
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
        let tables = self.tables.read().await;
        Ok(tables.dunning_logs.clone())
    }

    async fn curing_actions(&self) -> Result<Vec<CuringAction>> {
        let tables = self.tables.read().await;
        Ok(tables.curing_actions.clone())
    }

    async fn notifications(&self) -> Result<Vec<Notification>> {
        let tables = self.tables.read().await;
        Ok(tables.notifications.values().cloned().collect())
    }

    async fn put_customer(&self, customer: Customer) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables.customers.insert(customer.id, customer);
        Ok(())
    }

    async fn put_rule(&self, rule: DunningRule) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables.rules.insert(rule.id, rule);
        Ok(())
    }

    async fn put_payment(&self, payment: Payment) -> Result<()> {
        let mut tables = self.tables.write().await;
        if let Some(transaction_id) = &payment.transaction_id {
            match tables.payments_by_transaction.get(transaction_id) {
                Some(existing) if *existing != payment.id => {
                    return Err(DunningError::DuplicateTransaction(transaction_id.clone()));
                }
                _ => {
                    tables
                        .payments_by_transaction
                        .insert(transaction_id.clone(), payment.id);
                }
            }
        }
        self.sequences.observe(Sequence::Payment, payment.id);
        tables.payments.insert(payment.id, payment);
        Ok(())
    }
}
