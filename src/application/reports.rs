use crate::domain::audit::{CuringAction, DunningLog};
use crate::domain::customer::{Customer, CustomerId, CustomerType, DunningStatus};
use crate::domain::notification::Notification;
use crate::domain::ports::{SharedClock, SharedStore};
use crate::error::{DunningError, Result};
use chrono::NaiveDate;
use serde::Serialize;
use std::cmp::Reverse;
use std::collections::HashMap;

pub const DEFAULT_LOG_LIMIT: usize = 100;
pub const MAX_LOG_LIMIT: usize = 1000;

/// Selection over the dunning log. Dates are inclusive and compared against
/// the UTC day a log was written.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogFilter {
    pub customer_id: Option<CustomerId>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub offset: usize,
    /// Defaults to [`DEFAULT_LOG_LIMIT`], capped at [`MAX_LOG_LIMIT`].
    pub limit: Option<usize>,
}

impl LogFilter {
    fn matches(&self, log: &DunningLog) -> bool {
        let day = log.created_at.date_naive();
        self.customer_id.is_none_or(|id| log.customer_id == id)
            && self.from.is_none_or(|from| day >= from)
            && self.to.is_none_or(|to| day <= to)
    }

    fn limit(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_LOG_LIMIT).min(MAX_LOG_LIMIT)
    }
}

/// A curing action joined with the customer it belongs to.
///
/// Customer fields are `None` when the customer no longer exists.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CuringActionView {
    #[serde(flatten)]
    pub action: CuringAction,
    pub customer_name: String,
    pub customer_email: Option<String>,
    pub customer_type: Option<CustomerType>,
    pub dunning_status: Option<DunningStatus>,
}

impl CuringActionView {
    fn new(action: CuringAction, customer: Option<&Customer>) -> Self {
        let customer_name = customer
            .map(|c| c.name.clone())
            .unwrap_or_else(|| format!("Customer {}", action.customer_id));
        Self {
            customer_name,
            customer_email: customer.map(|c| c.email.clone()),
            customer_type: customer.map(|c| c.customer_type),
            dunning_status: customer.map(|c| c.dunning_status),
            action,
        }
    }
}

/// Read-only queries over customers and the audit trail.
#[derive(Clone)]
pub struct Reports {
    store: SharedStore,
    clock: SharedClock,
}

impl Reports {
    pub fn new(store: SharedStore, clock: SharedClock) -> Self {
        Self { store, clock }
    }

    /// Customers with a balance who are past due today, most overdue first.
    ///
    /// `overdue_days` on each returned customer is recomputed for today.
    pub async fn overdue_customers(&self) -> Result<Vec<Customer>> {
        let today = self.clock.today();
        let mut overdue: Vec<Customer> = self
            .store
            .customers_with_outstanding_balance()
            .await?
            .into_iter()
            .filter_map(|mut customer| {
                let days = customer.overdue_days_on(today);
                (days > 0).then(|| {
                    customer.overdue_days = days;
                    customer
                })
            })
            .collect();
        overdue.sort_by_key(|c| (Reverse(c.overdue_days), c.id));
        Ok(overdue)
    }

    /// Dunning logs matching `filter`, newest first.
    pub async fn dunning_logs(&self, filter: &LogFilter) -> Result<Vec<DunningLog>> {
        let mut logs = self.store.dunning_logs().await?;
        logs.retain(|log| filter.matches(log));
        logs.sort_by_key(|log| Reverse((log.created_at, log.id)));
        Ok(logs
            .into_iter()
            .skip(filter.offset)
            .take(filter.limit())
            .collect())
    }

    /// Curing actions for one customer, newest first.
    pub async fn curing_history(&self, customer_id: CustomerId) -> Result<Vec<CuringAction>> {
        self.ensure_customer(customer_id).await?;
        let mut actions = self.store.curing_actions().await?;
        actions.retain(|a| a.customer_id == customer_id);
        actions.sort_by_key(|a| Reverse((a.cured_at, a.id)));
        Ok(actions)
    }

    /// Every curing action across customers, newest first.
    ///
    /// `limit` follows the same default and cap as [`LogFilter`].
    pub async fn all_curing_actions(
        &self,
        offset: usize,
        limit: Option<usize>,
    ) -> Result<Vec<CuringActionView>> {
        let mut actions = self.store.curing_actions().await?;
        actions.sort_by_key(|a| Reverse((a.cured_at, a.id)));
        let customers: HashMap<CustomerId, Customer> = self
            .store
            .all_customers()
            .await?
            .into_iter()
            .map(|c| (c.id, c))
            .collect();
        let limit = limit.unwrap_or(DEFAULT_LOG_LIMIT).min(MAX_LOG_LIMIT);
        Ok(actions
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|action| {
                let customer = customers.get(&action.customer_id);
                CuringActionView::new(action, customer)
            })
            .collect())
    }

    pub async fn curing_action_count(&self) -> Result<usize> {
        Ok(self.store.curing_actions().await?.len())
    }

    pub async fn notifications_for(&self, customer_id: CustomerId) -> Result<Vec<Notification>> {
        self.ensure_customer(customer_id).await?;
        let mut notifications = self.store.notifications().await?;
        notifications.retain(|n| n.customer_id == customer_id);
        notifications.sort_by_key(|n| Reverse((n.created_at, n.id)));
        Ok(notifications)
    }

    async fn ensure_customer(&self, customer_id: CustomerId) -> Result<()> {
        match self.store.get_customer(customer_id).await? {
            Some(_) => Ok(()),
            None => Err(DunningError::CustomerNotFound(customer_id)),
        }
    }
}
