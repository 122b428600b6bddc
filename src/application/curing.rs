use super::notifier::NotificationDispatcher;
use super::outcome::{CuringFailure, CuringOutcome, CuringReport, PaymentReceipt, WebhookOutcome};
use crate::domain::audit::NewCuringAction;
use crate::domain::customer::{CustomerId, DunningStatus};
use crate::domain::money::{Amount, Rupees};
use crate::domain::payment::{NewPayment, Payment, PaymentId, PaymentStatus, PaymentWebhook};
use crate::domain::ports::{SharedClock, SharedStore, StoreTransaction};
use crate::error::{DunningError, Result};
use tracing::{error, info, instrument, warn};

const ALREADY_CURED: &str = "Customer already cured, no action needed";
const RESTORED: &str = "Service successfully restored";

enum Cure {
    /// Nothing to restore; the transaction must not write.
    Unchanged(CuringReport),
    Restored(CuringReport),
}

/// Reverses dunning restrictions once a qualifying payment arrives.
#[derive(Clone)]
pub struct CuringWorkflow {
    store: SharedStore,
    dispatcher: NotificationDispatcher,
    clock: SharedClock,
}

impl CuringWorkflow {
    pub fn new(store: SharedStore, dispatcher: NotificationDispatcher, clock: SharedClock) -> Self {
        Self {
            store,
            dispatcher,
            clock,
        }
    }

    /// Applies `payment_id` to `customer_id` and restores service.
    ///
    /// Every write happens in one transaction on the customer's row. Errors
    /// are reported in the returned outcome, never raised.
    #[instrument(skip(self))]
    pub async fn execute_curing(&self, customer_id: CustomerId, payment_id: PaymentId) -> CuringOutcome {
        match self.try_cure(customer_id, payment_id).await {
            Ok(report) => CuringOutcome::Cured(report),
            Err(e) => {
                error!(error = %e, "curing failed");
                CuringOutcome::Failed(CuringFailure::from_error(customer_id, &e))
            }
        }
    }

    async fn try_cure(&self, customer_id: CustomerId, payment_id: PaymentId) -> Result<CuringReport> {
        let mut tx = self.store.begin(customer_id).await?;
        match self.cure(tx.as_mut(), payment_id).await {
            Ok(Cure::Unchanged(report)) => {
                tx.rollback().await?;
                warn!(customer_id, "customer is already cured");
                Ok(report)
            }
            Ok(Cure::Restored(report)) => {
                tx.commit().await?;
                info!(
                    customer_id,
                    previous_status = %report.previous_status,
                    payment = %Rupees(report.payment_amount),
                    "curing completed"
                );
                Ok(report)
            }
            Err(e) => {
                if let Err(rollback) = tx.rollback().await {
                    warn!(customer_id, error = %rollback, "rollback failed");
                }
                Err(e)
            }
        }
    }

    async fn cure(&self, tx: &mut dyn StoreTransaction, payment_id: PaymentId) -> Result<Cure> {
        let customer_id = tx.customer_id();
        let mut customer = tx
            .get_customer(customer_id)
            .await?
            .ok_or(DunningError::CustomerNotFound(customer_id))?;
        let payment = tx
            .get_payment(payment_id)
            .await?
            .ok_or(DunningError::PaymentNotFound(payment_id))?;
        let amount = validate_payment(&payment, customer_id)?;

        let previous_status = customer.dunning_status;
        if customer.is_cured() {
            return Ok(Cure::Unchanged(CuringReport {
                success: true,
                customer_id,
                customer_name: customer.name,
                previous_status,
                new_status: DunningStatus::Active,
                payment_amount: amount.value(),
                remaining_balance: customer.outstanding_amount.value(),
                actions_taken: vec!["Customer was already in ACTIVE status".to_string()],
                notifications_sent: 0,
                notification_details: None,
                message: ALREADY_CURED.to_string(),
            }));
        }

        let mut actions_taken: Vec<String> = restoration_actions(previous_status)
            .iter()
            .map(|a| a.to_string())
            .collect();
        actions_taken.push("Updated dunning status to ACTIVE".to_string());
        customer.dunning_status = DunningStatus::Active;

        let remaining = customer.outstanding_amount.saturating_sub(amount);
        customer.outstanding_amount = remaining;
        customer.overdue_days = 0;
        if remaining.is_zero() {
            customer.billing_date = None;
            customer.due_date = None;
            actions_taken.push("Cleared billing and due dates (fully paid)".to_string());
        }

        tx.append_curing_action(NewCuringAction {
            customer_id,
            payment_id,
            previous_status,
            action_taken: actions_taken.join("; "),
            success_flag: true,
            remarks: Some(format!(
                "Payment: {}, Remaining: {}",
                Rupees(amount.value()),
                Rupees(remaining.value())
            )),
            cured_at: self.clock.now(),
        })
        .await?;
        tx.save_customer(customer.clone()).await?;

        let tally = self
            .dispatcher
            .send_payment_confirmation(tx, &customer, amount.value(), remaining.value())
            .await;

        Ok(Cure::Restored(CuringReport {
            success: true,
            customer_id,
            customer_name: customer.name,
            previous_status,
            new_status: DunningStatus::Active,
            payment_amount: amount.value(),
            remaining_balance: remaining.value(),
            actions_taken,
            notifications_sent: tally.total(),
            notification_details: Some(tally),
            message: RESTORED.to_string(),
        }))
    }

    /// Records a gateway payment and cures the customer.
    ///
    /// A transaction id already on record is reported as a duplicate without
    /// touching anything. Only an unknown customer or an invalid payload is
    /// an error.
    #[instrument(skip(self, payload), fields(transaction_id = %payload.transaction_id, customer_id = payload.customer_id))]
    pub async fn process_payment_webhook(&self, payload: &PaymentWebhook) -> Result<WebhookOutcome> {
        if self.store.get_customer(payload.customer_id).await?.is_none() {
            return Err(DunningError::CustomerNotFound(payload.customer_id));
        }

        if let Some(existing) = self
            .store
            .get_payment_by_transaction_id(&payload.transaction_id)
            .await?
        {
            warn!(payment_id = existing.id, "duplicate webhook");
            return Ok(WebhookOutcome::duplicate(existing.id));
        }

        if !payload.is_success() {
            warn!(status = %payload.status, "webhook rejected");
            return Ok(WebhookOutcome::Rejected {
                reason: format!(
                    "Payment status must be 'success', got '{}'",
                    payload.status
                ),
            });
        }

        let payment = match self.store_payment(payload.to_new_payment()?).await {
            Ok(payment) => payment,
            Err(DunningError::DuplicateTransaction(transaction_id)) => {
                return match self
                    .store
                    .get_payment_by_transaction_id(&transaction_id)
                    .await?
                {
                    Some(existing) => {
                        warn!(payment_id = existing.id, "duplicate webhook");
                        Ok(WebhookOutcome::duplicate(existing.id))
                    }
                    None => Err(DunningError::DuplicateTransaction(transaction_id)),
                };
            }
            Err(e) => return Err(e),
        };
        info!(payment_id = payment.id, "payment recorded");

        let curing = self.execute_curing(payload.customer_id, payment.id).await;
        Ok(WebhookOutcome::processed(payment.id, curing))
    }

    /// Records a manually entered payment as successful and cures the customer.
    ///
    /// The payment stays recorded even if curing fails.
    #[instrument(skip(self, payment), fields(customer_id = payment.customer_id))]
    pub async fn record_payment(&self, mut payment: NewPayment) -> Result<PaymentReceipt> {
        if self.store.get_customer(payment.customer_id).await?.is_none() {
            return Err(DunningError::CustomerNotFound(payment.customer_id));
        }
        payment.payment_status = PaymentStatus::Success;

        let payment = self.store_payment(payment).await?;
        info!(payment_id = payment.id, "payment recorded");
        let curing = self.execute_curing(payment.customer_id, payment.id).await;
        Ok(PaymentReceipt {
            payment_id: payment.id,
            customer_id: payment.customer_id,
            amount: payment.amount,
            curing,
        })
    }

    async fn store_payment(&self, payment: NewPayment) -> Result<Payment> {
        let mut tx = self.store.begin(payment.customer_id).await?;
        let payment = tx.insert_payment(payment).await?;
        tx.commit().await?;
        Ok(payment)
    }
}

fn validate_payment(payment: &Payment, customer_id: CustomerId) -> Result<Amount> {
    if payment.payment_status != PaymentStatus::Success {
        return Err(DunningError::InvalidPayment(format!(
            "Payment {} status is {}, not SUCCESS",
            payment.id, payment.payment_status
        )));
    }
    let amount = Amount::new(payment.amount).map_err(|_| {
        DunningError::InvalidPayment(format!(
            "Payment amount must be positive, got {}",
            payment.amount
        ))
    })?;
    if payment.customer_id != customer_id {
        return Err(DunningError::InvalidPayment(format!(
            "Payment {} does not belong to customer {customer_id}",
            payment.id
        )));
    }
    Ok(amount)
}

fn restoration_actions(previous: DunningStatus) -> &'static [&'static str] {
    match previous {
        DunningStatus::Active => &["Customer was already active, no restoration needed"],
        DunningStatus::Notified => &["Cleared notification status"],
        DunningStatus::Restricted => &["Restored full data speed", "Removed throttling restrictions"],
        DunningStatus::Barred => &[
            "Restored outgoing call services",
            "Restored data services",
            "Removed all service bars",
        ],
        DunningStatus::Cured => &[],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::clock::FixedClock;
    use crate::domain::customer::{Customer, CustomerType};
    use crate::domain::money::Balance;
    use crate::domain::payment::PaymentMethod;
    use crate::domain::ports::{DunningStore, NotificationTransport};
    use crate::error::TransportFault;
    use crate::infrastructure::in_memory::InMemoryStore;
    use crate::infrastructure::transport::ScriptedTransport;
    use chrono::{NaiveDate, Utc};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    fn workflow(store: &InMemoryStore) -> CuringWorkflow {
        let clock: SharedClock = Arc::new(FixedClock::new(
            NaiveDate::from_ymd_opt(2025, 3, 20).unwrap(),
        ));
        let dispatcher =
            NotificationDispatcher::new(Arc::new(ScriptedTransport::new()), clock.clone(), 3);
        CuringWorkflow::new(Arc::new(store.clone()), dispatcher, clock)
    }

    fn restricted_customer(id: CustomerId) -> Customer {
        let mut c = Customer::new(
            id,
            "Asha",
            CustomerType::Postpaid,
            Balance::new(dec!(500)).unwrap(),
        );
        c.dunning_status = DunningStatus::Restricted;
        c.overdue_days = 7;
        c.due_date = NaiveDate::from_ymd_opt(2025, 3, 13);
        c
    }

    fn payment(id: PaymentId, customer_id: CustomerId, amount: Decimal, status: PaymentStatus) -> Payment {
        Payment {
            id,
            customer_id,
            amount,
            payment_method: PaymentMethod::Upi,
            payment_status: status,
            transaction_id: Some(format!("TXN-{id}")),
            payment_date: Utc::now(),
        }
    }

    fn failure_of(outcome: CuringOutcome) -> CuringFailure {
        match outcome {
            CuringOutcome::Failed(failure) => failure,
            CuringOutcome::Cured(report) => panic!("expected failure, got {report:?}"),
        }
    }

    #[tokio::test]
    async fn test_validation_failures_write_nothing() {
        let store = InMemoryStore::new();
        store.put_customer(restricted_customer(1)).await.unwrap();
        store.put_customer(restricted_customer(2)).await.unwrap();
        store
            .put_payment(payment(10, 1, dec!(100), PaymentStatus::Pending))
            .await
            .unwrap();
        store
            .put_payment(payment(11, 2, dec!(100), PaymentStatus::Success))
            .await
            .unwrap();
        let workflow = workflow(&store);

        let missing_customer = failure_of(workflow.execute_curing(9, 10).await);
        assert_eq!(missing_customer.error_type, "CustomerNotFound");

        let missing_payment = failure_of(workflow.execute_curing(1, 99).await);
        assert_eq!(missing_payment.error_type, "PaymentNotFound");

        let pending = failure_of(workflow.execute_curing(1, 10).await);
        assert_eq!(pending.error_type, "InvalidPayment");
        assert_eq!(pending.message, "Invalid payment: Payment 10 status is PENDING, not SUCCESS");

        let foreign = failure_of(workflow.execute_curing(1, 11).await);
        assert_eq!(foreign.error_type, "InvalidPayment");
        assert!(foreign.message.contains("does not belong to customer 1"));

        assert!(store.curing_actions().await.unwrap().is_empty());
        assert!(store.notifications().await.unwrap().is_empty());
        let stored = store.get_customer(1).await.unwrap().unwrap();
        assert_eq!(stored.dunning_status, DunningStatus::Restricted);
    }

    /// Bumps the customer's committed version while a confirmation is in
    /// flight, so the curing commit hits a version conflict.
    struct ConcurrentWriterTransport {
        store: InMemoryStore,
        customer_id: CustomerId,
    }

    #[async_trait::async_trait]
    impl NotificationTransport for ConcurrentWriterTransport {
        async fn send_sms(&self, _phone: &str, _message: &str) -> std::result::Result<bool, TransportFault> {
            if let Ok(Some(mut customer)) = self.store.get_customer(self.customer_id).await {
                customer.version += 1;
                let _ = self.store.put_customer(customer).await;
            }
            Ok(true)
        }

        async fn send_email(
            &self,
            _email: &str,
            _subject: &str,
            _message: &str,
        ) -> std::result::Result<bool, TransportFault> {
            Ok(true)
        }

        async fn send_app_push(
            &self,
            _customer_id: CustomerId,
            _message: &str,
        ) -> std::result::Result<bool, TransportFault> {
            Ok(true)
        }
    }

    #[tokio::test]
    async fn test_failed_commit_rolls_back_every_write() {
        let store = InMemoryStore::new();
        store.put_customer(restricted_customer(1)).await.unwrap();
        store
            .put_payment(payment(1, 1, dec!(500), PaymentStatus::Success))
            .await
            .unwrap();
        let clock: SharedClock = Arc::new(FixedClock::new(
            NaiveDate::from_ymd_opt(2025, 3, 20).unwrap(),
        ));
        let transport = ConcurrentWriterTransport {
            store: store.clone(),
            customer_id: 1,
        };
        let dispatcher = NotificationDispatcher::new(Arc::new(transport), clock.clone(), 3);
        let workflow = CuringWorkflow::new(Arc::new(store.clone()), dispatcher, clock);

        let failure = failure_of(workflow.execute_curing(1, 1).await);

        assert!(!failure.success);
        assert_eq!(failure.error_type, "UnexpectedError");
        assert!(failure.message.starts_with("Curing failed: "));

        let stored = store.get_customer(1).await.unwrap().unwrap();
        assert_eq!(stored.dunning_status, DunningStatus::Restricted);
        assert_eq!(stored.outstanding_amount.value(), dec!(500));
        assert!(stored.due_date.is_some());
        assert!(store.curing_actions().await.unwrap().is_empty());
        assert!(store.notifications().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_partial_payment_restores_and_keeps_dates() {
        let store = InMemoryStore::new();
        store.put_customer(restricted_customer(1)).await.unwrap();
        store
            .put_payment(payment(1, 1, dec!(200), PaymentStatus::Success))
            .await
            .unwrap();

        let outcome = workflow(&store).execute_curing(1, 1).await;
        let report = outcome.report().unwrap();

        assert_eq!(report.previous_status, DunningStatus::Restricted);
        assert_eq!(report.remaining_balance, dec!(300));
        assert_eq!(
            report.actions_taken,
            vec![
                "Restored full data speed",
                "Removed throttling restrictions",
                "Updated dunning status to ACTIVE",
            ]
        );
        assert_eq!(report.notifications_sent, 3);
        assert_eq!(report.message, "Service successfully restored");

        let stored = store.get_customer(1).await.unwrap().unwrap();
        assert_eq!(stored.dunning_status, DunningStatus::Active);
        assert_eq!(stored.overdue_days, 0);
        assert!(stored.due_date.is_some());

        let actions = store.curing_actions().await.unwrap();
        assert_eq!(actions.len(), 1);
        assert_eq!(
            actions[0].remarks.as_deref(),
            Some("Payment: ₹200.00, Remaining: ₹300.00")
        );
        assert_eq!(
            actions[0].action_taken,
            "Restored full data speed; Removed throttling restrictions; Updated dunning status to ACTIVE"
        );
    }

    #[tokio::test]
    async fn test_already_cured_customer_is_left_alone() {
        let store = InMemoryStore::new();
        store
            .put_customer(Customer::new(1, "Asha", CustomerType::Prepaid, Balance::ZERO))
            .await
            .unwrap();
        store
            .put_payment(payment(1, 1, dec!(50), PaymentStatus::Success))
            .await
            .unwrap();

        let outcome = workflow(&store).execute_curing(1, 1).await;
        let report = outcome.report().unwrap();

        assert_eq!(report.message, "Customer already cured, no action needed");
        assert_eq!(report.actions_taken, vec!["Customer was already in ACTIVE status"]);
        assert_eq!(report.notifications_sent, 0);
        assert!(store.curing_actions().await.unwrap().is_empty());
        assert_eq!(store.get_customer(1).await.unwrap().unwrap().version, 0);
    }

    fn webhook(transaction_id: &str, customer_id: CustomerId, status: &str) -> PaymentWebhook {
        PaymentWebhook {
            transaction_id: transaction_id.to_string(),
            customer_id,
            amount: dec!(500),
            payment_method: "upi".to_string(),
            status: status.to_string(),
            timestamp: Utc::now(),
            gateway_reference: None,
        }
    }

    #[tokio::test]
    async fn test_webhook_records_payment_and_cures() {
        let store = InMemoryStore::new();
        store.put_customer(restricted_customer(1)).await.unwrap();

        let outcome = workflow(&store)
            .process_payment_webhook(&webhook("GW-1", 1, "SUCCESS"))
            .await
            .unwrap();

        let (payment_id, curing) = match outcome {
            WebhookOutcome::Success { payment_id, curing } => (payment_id, curing),
            other => panic!("unexpected outcome {other:?}"),
        };
        assert_eq!(curing.report().unwrap().remaining_balance, Decimal::ZERO);
        let stored = store.get_payment(payment_id).await.unwrap().unwrap();
        assert_eq!(stored.payment_status, PaymentStatus::Success);
        assert_eq!(stored.transaction_id.as_deref(), Some("GW-1"));
    }

    #[tokio::test]
    async fn test_webhook_rejections() {
        let store = InMemoryStore::new();
        store.put_customer(restricted_customer(1)).await.unwrap();
        let workflow = workflow(&store);

        let err = workflow
            .process_payment_webhook(&webhook("GW-1", 5, "success"))
            .await
            .unwrap_err();
        assert!(matches!(err, DunningError::CustomerNotFound(5)));

        let rejected = workflow
            .process_payment_webhook(&webhook("GW-2", 1, "failed"))
            .await
            .unwrap();
        assert!(matches!(rejected, WebhookOutcome::Rejected { .. }));

        let mut bad_method = webhook("GW-3", 1, "success");
        bad_method.payment_method = "cheque".to_string();
        let err = workflow.process_payment_webhook(&bad_method).await.unwrap_err();
        assert!(matches!(err, DunningError::ValidationError(_)));

        assert!(store.get_payment_by_transaction_id("GW-2").await.unwrap().is_none());
        assert!(store.get_payment_by_transaction_id("GW-3").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_record_payment_keeps_payment_when_curing_is_a_no_op() {
        let store = InMemoryStore::new();
        store
            .put_customer(Customer::new(1, "Asha", CustomerType::Prepaid, Balance::ZERO))
            .await
            .unwrap();

        let receipt = workflow(&store)
            .record_payment(NewPayment {
                customer_id: 1,
                amount: Amount::new(dec!(75)).unwrap(),
                payment_method: PaymentMethod::Wallet,
                payment_status: PaymentStatus::Pending,
                transaction_id: None,
                payment_date: Utc::now(),
            })
            .await
            .unwrap();

        assert!(receipt.curing.is_success());
        let stored = store.get_payment(receipt.payment_id).await.unwrap().unwrap();
        assert_eq!(stored.payment_status, PaymentStatus::Success);
        assert_eq!(stored.amount, dec!(75));
    }
}
