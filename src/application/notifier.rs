use super::outcome::ConfirmationTally;
use super::templates::Template;
use crate::domain::customer::{Customer, CustomerId};
use crate::domain::notification::{NewNotification, Notification, NotificationChannel, Recipient};
use crate::domain::ports::{SharedClock, SharedTransport, StoreTransaction};
use crate::domain::rule::RuleId;
use crate::error::{DunningError, Result, TransportFault};
use rust_decimal::Decimal;
use tracing::{debug, error, info, warn};

const DUNNING_SUBJECT: &str = "Payment Reminder - Dunning Notice";
const FAN_OUT_SUBJECT: &str = "Payment Reminder";
const CONFIRMATION_SUBJECT: &str = "Payment Received";

/// Delivers customer messages over the transport and records them.
///
/// Every concrete channel gets up to `max_retries` attempts. An unsuccessful
/// delivery or a retryable fault uses up an attempt; a fatal fault stops
/// immediately.
#[derive(Clone)]
pub struct NotificationDispatcher {
    transport: SharedTransport,
    clock: SharedClock,
    max_retries: u32,
}

impl NotificationDispatcher {
    pub fn new(transport: SharedTransport, clock: SharedClock, max_retries: u32) -> Self {
        Self {
            transport,
            clock,
            max_retries,
        }
    }

    /// Sends `message` over `channel`.
    ///
    /// `ALL` tries SMS, EMAIL and APP in turn and only succeeds when all three
    /// do. Running out of attempts yields `Ok(false)`; `Err` is reserved for
    /// fatal transport faults.
    pub async fn send(
        &self,
        channel: NotificationChannel,
        recipient: &Recipient,
        message: &str,
    ) -> std::result::Result<bool, TransportFault> {
        self.dispatch(channel, recipient, message, None).await
    }

    /// Records a notification for `customer_id` inside `tx` and delivers it.
    ///
    /// The returned notification is DELIVERED or FAILED. A fatal transport
    /// fault still records FAILED before returning
    /// [`DunningError::NotificationDispatchFailed`].
    pub async fn create_and_send(
        &self,
        tx: &mut dyn StoreTransaction,
        customer_id: CustomerId,
        channel: NotificationChannel,
        message: &str,
        rule_id: Option<RuleId>,
    ) -> Result<Notification> {
        self.record_and_send(tx, customer_id, channel, message, rule_id, None)
            .await
    }

    /// Same as [`create_and_send`](Self::create_and_send) with a custom email subject.
    pub async fn create_and_send_with_subject(
        &self,
        tx: &mut dyn StoreTransaction,
        customer_id: CustomerId,
        channel: NotificationChannel,
        message: &str,
        subject: &str,
    ) -> Result<Notification> {
        self.record_and_send(tx, customer_id, channel, message, None, Some(subject))
            .await
    }

    /// Confirms a payment over SMS, EMAIL and APP independently.
    ///
    /// A channel counts once its notification was recorded, whether or not
    /// the gateway accepted it. Errors on one channel never stop the others.
    pub async fn send_payment_confirmation(
        &self,
        tx: &mut dyn StoreTransaction,
        customer: &Customer,
        payment_amount: Decimal,
        remaining_balance: Decimal,
    ) -> ConfirmationTally {
        let message =
            Template::confirmation(&customer.name, payment_amount, remaining_balance).render();

        let mut tally = ConfirmationTally::default();
        for channel in NotificationChannel::CONCRETE {
            let sent = self
                .create_and_send_with_subject(
                    tx,
                    customer.id,
                    channel,
                    &message,
                    CONFIRMATION_SUBJECT,
                )
                .await;
            match sent {
                Ok(_) => match channel {
                    NotificationChannel::Sms => tally.sms = 1,
                    NotificationChannel::Email => tally.email = 1,
                    NotificationChannel::App => tally.app = 1,
                    NotificationChannel::All => {}
                },
                Err(e) => {
                    error!(customer_id = customer.id, %channel, error = %e, "payment confirmation failed");
                }
            }
        }
        tally
    }

    async fn record_and_send(
        &self,
        tx: &mut dyn StoreTransaction,
        customer_id: CustomerId,
        channel: NotificationChannel,
        message: &str,
        rule_id: Option<RuleId>,
        subject: Option<&str>,
    ) -> Result<Notification> {
        let customer = tx
            .get_customer(customer_id)
            .await?
            .ok_or(DunningError::CustomerNotFound(customer_id))?;

        let mut notification = tx
            .append_notification(NewNotification {
                customer_id,
                rule_id,
                channel,
                message: message.to_string(),
                created_at: self.clock.now(),
            })
            .await?;

        let recipient = Recipient::from(&customer);
        match self.dispatch(channel, &recipient, message, subject).await {
            Ok(delivered) => {
                notification.resolve(delivered, self.clock.now());
                if delivered {
                    info!(customer_id, %channel, "notification delivered");
                } else {
                    warn!(customer_id, %channel, "notification failed");
                }
                tx.update_notification(notification.clone()).await?;
                Ok(notification)
            }
            Err(fault) => {
                notification.resolve(false, self.clock.now());
                error!(customer_id, %channel, error = %fault, "transport fault while sending notification");
                tx.update_notification(notification).await?;
                Err(DunningError::NotificationDispatchFailed {
                    channel,
                    customer_id,
                })
            }
        }
    }

    async fn dispatch(
        &self,
        channel: NotificationChannel,
        recipient: &Recipient,
        message: &str,
        subject: Option<&str>,
    ) -> std::result::Result<bool, TransportFault> {
        if channel != NotificationChannel::All {
            let subject = subject.unwrap_or(DUNNING_SUBJECT);
            return self.send_with_retry(channel, recipient, subject, message).await;
        }

        let subject = subject.unwrap_or(FAN_OUT_SUBJECT);
        let mut delivered = true;
        let mut fatal = None;
        for concrete in NotificationChannel::CONCRETE {
            match self.send_with_retry(concrete, recipient, subject, message).await {
                Ok(ok) => delivered &= ok,
                Err(fault) => {
                    delivered = false;
                    fatal.get_or_insert(fault);
                }
            }
        }
        match fatal {
            Some(fault) => Err(fault),
            None => Ok(delivered),
        }
    }

    async fn send_with_retry(
        &self,
        channel: NotificationChannel,
        recipient: &Recipient,
        subject: &str,
        message: &str,
    ) -> std::result::Result<bool, TransportFault> {
        let attempts = self.max_retries.max(1);
        for attempt in 1..=attempts {
            debug!(customer_id = recipient.customer_id, %channel, attempt, attempts, "delivery attempt");
            let result = match channel {
                NotificationChannel::Sms => self.transport.send_sms(&recipient.phone, message).await,
                NotificationChannel::Email => {
                    self.transport
                        .send_email(&recipient.email, subject, message)
                        .await
                }
                NotificationChannel::App => {
                    self.transport
                        .send_app_push(recipient.customer_id, message)
                        .await
                }
                // Fan-out is resolved in `dispatch`; there is no single ALL gateway.
                NotificationChannel::All => {
                    warn!(customer_id = recipient.customer_id, "ALL is not a deliverable channel");
                    return Ok(false);
                }
            };
            match result {
                Ok(true) => return Ok(true),
                Ok(false) => {
                    warn!(customer_id = recipient.customer_id, %channel, attempt, "gateway refused delivery");
                }
                Err(fault) if fault.retryable => {
                    warn!(customer_id = recipient.customer_id, %channel, attempt, error = %fault, "transient transport fault");
                }
                Err(fault) => return Err(fault),
            }
        }
        Ok(false)
    }
}
