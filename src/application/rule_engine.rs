use super::notifier::NotificationDispatcher;
use super::outcome::{BatchSummary, DunningOutcome, RuleExecution};
use super::templates::Template;
use crate::domain::audit::{DunningLogDetails, DunningLogStatus, NewDunningLog};
use crate::domain::customer::{Customer, CustomerId};
use crate::domain::notification::NotificationChannel;
use crate::domain::ports::{SharedClock, SharedStore, StoreTransaction};
use crate::domain::rule::{ActionType, DunningRule};
use crate::error::{DunningError, Result};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, instrument, warn};

/// Which customers a batch run covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchSelection {
    /// Every customer with an outstanding balance who is past due today.
    AllOverdue,
    Customers(Vec<CustomerId>),
}

/// Escalates restrictions on overdue customers according to the configured rules.
///
/// Each rule runs in its own store transaction, so a failing rule leaves no
/// trace while the rules before and after it still apply.
#[derive(Clone)]
pub struct RuleEngine {
    store: SharedStore,
    dispatcher: NotificationDispatcher,
    clock: SharedClock,
    worker_count: usize,
}

impl RuleEngine {
    pub fn new(
        store: SharedStore,
        dispatcher: NotificationDispatcher,
        clock: SharedClock,
        worker_count: usize,
    ) -> Self {
        Self {
            store,
            dispatcher,
            clock,
            worker_count,
        }
    }

    /// Runs every rule matching the customer's overdue day.
    #[instrument(skip(self))]
    pub async fn process_customer(&self, customer_id: CustomerId) -> Result<DunningOutcome> {
        let Some(customer) = self.store.get_customer(customer_id).await? else {
            warn!("customer not found");
            return Ok(DunningOutcome::not_found(customer_id));
        };

        let overdue_days = customer.overdue_days_on(self.clock.today());
        if overdue_days == 0 {
            return Ok(DunningOutcome::skipped(
                &customer,
                0,
                "Customer not overdue",
            ));
        }

        let rules = self
            .store
            .active_rules_for(overdue_days, customer.customer_type)
            .await?;
        if rules.is_empty() {
            return Ok(DunningOutcome::skipped(
                &customer,
                overdue_days,
                format!("No rules configured for day {overdue_days}"),
            ));
        }

        let mut results = Vec::with_capacity(rules.len());
        for rule in &rules {
            match self.execute_rule(&customer, rule, overdue_days).await {
                Ok(execution) => results.push(execution),
                Err(e) => {
                    error!(rule_id = rule.id, error = %e, "rule execution failed");
                    results.push(RuleExecution::failed(rule, &e));
                }
            }
        }

        info!(overdue_days, rules = results.len(), "customer processed");
        Ok(DunningOutcome::processed(&customer, overdue_days, results))
    }

    /// Applies one rule to `customer` and writes its dunning log.
    ///
    /// The customer is re-read under its row lock. If it is no longer
    /// `overdue_days` past due with a balance, nothing is written. Any error
    /// rolls the rule back entirely.
    pub async fn execute_rule(
        &self,
        customer: &Customer,
        rule: &DunningRule,
        overdue_days: u32,
    ) -> Result<RuleExecution> {
        let mut tx = self.store.begin(customer.id).await?;
        match self.apply_rule(tx.as_mut(), rule, overdue_days).await {
            Ok(None) => {
                tx.rollback().await?;
                warn!(
                    customer_id = customer.id,
                    rule_id = rule.id,
                    overdue_days,
                    "customer changed before rule ran, skipping"
                );
                Ok(RuleExecution::superseded(
                    rule,
                    format!("Customer is no longer {overdue_days} days overdue"),
                ))
            }
            Ok(Some(notification_sent)) => {
                tx.commit().await?;
                info!(
                    customer_id = customer.id,
                    rule_id = rule.id,
                    action = %rule.action_type,
                    "rule applied"
                );
                Ok(RuleExecution::applied(rule, notification_sent))
            }
            Err(e) => {
                if let Err(rollback) = tx.rollback().await {
                    warn!(customer_id = customer.id, error = %rollback, "rollback failed");
                }
                Err(e)
            }
        }
    }

    async fn apply_rule(
        &self,
        tx: &mut dyn StoreTransaction,
        rule: &DunningRule,
        overdue_days: u32,
    ) -> Result<Option<bool>> {
        let customer_id = tx.customer_id();
        let mut customer = tx
            .get_customer(customer_id)
            .await?
            .ok_or(DunningError::CustomerNotFound(customer_id))?;
        if !customer.has_outstanding_balance()
            || customer.overdue_days_on(self.clock.today()) != overdue_days
        {
            return Ok(None);
        }

        if let Some(status) = rule.action_type.resulting_status() {
            customer.dunning_status = status;
        }
        match rule.action_type {
            ActionType::Notify => {}
            ActionType::Throttle => info!(customer_id, "data throttled"),
            ActionType::BarOutgoing => info!(customer_id, "services barred"),
            ActionType::Deactivate => warn!(customer_id, "service deactivated"),
        }
        customer.overdue_days = overdue_days;

        let message = Template::for_action(rule.action_type, &customer, overdue_days).render();
        let outstanding_amount = customer.outstanding_amount.value();
        tx.save_customer(customer).await?;

        let notification_sent = match rule.notification_channel {
            NotificationChannel::All => {
                let mut any_sent = false;
                for channel in NotificationChannel::CONCRETE {
                    match self
                        .dispatcher
                        .create_and_send(tx, customer_id, channel, &message, Some(rule.id))
                        .await
                    {
                        Ok(_) => any_sent = true,
                        Err(e) => {
                            error!(customer_id, rule_id = rule.id, %channel, error = %e, "notification failed");
                        }
                    }
                }
                any_sent
            }
            channel => {
                self.dispatcher
                    .create_and_send(tx, customer_id, channel, &message, Some(rule.id))
                    .await?;
                true
            }
        };

        tx.append_dunning_log(NewDunningLog {
            customer_id,
            rule_id: Some(rule.id),
            action_type: rule.action_type,
            status: DunningLogStatus::Success,
            details: DunningLogDetails {
                rule_name: rule.rule_name.clone(),
                action_type: rule.action_type,
                notification_channel: rule.notification_channel,
                overdue_days,
                outstanding_amount,
                action_taken: rule.action_type.description().to_string(),
                notification_sent,
            },
            created_at: self.clock.now(),
        })
        .await?;

        Ok(Some(notification_sent))
    }

    /// Processes every customer with an outstanding balance who is past due,
    /// ordered by customer id.
    #[instrument(skip(self))]
    pub async fn process_all_overdue_customers(&self) -> Result<Vec<DunningOutcome>> {
        let today = self.clock.today();
        let mut ids: Vec<CustomerId> = self
            .store
            .customers_with_outstanding_balance()
            .await?
            .into_iter()
            .filter(|c| c.overdue_days_on(today) > 0)
            .map(|c| c.id)
            .collect();
        ids.sort_unstable();
        info!(customers = ids.len(), "processing overdue customers");
        self.process_customers(&ids).await
    }

    /// Processes `ids` over at most `worker_count` concurrent tasks.
    ///
    /// Results come back in the order of `ids`. A customer whose processing
    /// errors is reported as FAILED and does not stop the others.
    pub async fn process_customers(&self, ids: &[CustomerId]) -> Result<Vec<DunningOutcome>> {
        let semaphore = Arc::new(Semaphore::new(self.worker_count.max(1)));
        let mut tasks = JoinSet::new();

        for (index, &customer_id) in ids.iter().enumerate() {
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|e| DunningError::InternalError(Box::new(e)))?;
            let engine = self.clone();
            tasks.spawn(async move {
                let _permit = permit;
                let outcome = match engine.process_customer(customer_id).await {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        error!(customer_id, error = %e, "customer processing failed");
                        DunningOutcome::failed(customer_id, e.to_string())
                    }
                };
                (index, outcome)
            });
        }

        let mut slots: Vec<Option<DunningOutcome>> = vec![None; ids.len()];
        while let Some(joined) = tasks.join_next().await {
            let (index, outcome) = joined.map_err(|e| DunningError::InternalError(Box::new(e)))?;
            slots[index] = Some(outcome);
        }
        Ok(slots.into_iter().flatten().collect())
    }

    /// Runs a batch and summarises it.
    #[instrument(skip(self))]
    pub async fn run_batch(&self, selection: BatchSelection) -> Result<BatchSummary> {
        let started = Instant::now();
        let results = match selection {
            BatchSelection::AllOverdue => self.process_all_overdue_customers().await?,
            BatchSelection::Customers(ids) => self.process_customers(&ids).await?,
        };
        let summary = BatchSummary::from_results(results, started.elapsed().as_secs_f64());
        info!(
            total = summary.total_customers,
            successful = summary.successful,
            failed = summary.failed,
            skipped = summary.skipped,
            "batch finished"
        );
        Ok(summary)
    }
}
