use crate::domain::customer::CustomerId;
use crate::domain::notification::NotificationChannel;
use crate::domain::ports::NotificationTransport;
use crate::error::TransportFault;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

type Delivery = std::result::Result<bool, TransportFault>;

/// Transport that logs every message and reports success.
///
/// Stands in for real SMS, email and push gateways.
#[derive(Debug, Default, Clone)]
pub struct SimulatedTransport;

impl SimulatedTransport {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl NotificationTransport for SimulatedTransport {
    async fn send_sms(&self, phone: &str, message: &str) -> Delivery {
        info!(channel = "SMS", phone, "sending message");
        debug!(channel = "SMS", message);
        Ok(true)
    }

    async fn send_email(&self, email: &str, subject: &str, message: &str) -> Delivery {
        info!(channel = "EMAIL", email, subject, "sending message");
        debug!(channel = "EMAIL", message);
        Ok(true)
    }

    async fn send_app_push(&self, customer_id: CustomerId, message: &str) -> Delivery {
        info!(channel = "APP", customer_id, "sending message");
        debug!(channel = "APP", message);
        Ok(true)
    }
}

/// A message that reached a [`ScriptedTransport`].
#[derive(Debug, Clone, PartialEq)]
pub struct SentMessage {
    pub channel: NotificationChannel,
    /// Phone number, email address or customer id depending on the channel.
    pub recipient: String,
    pub subject: Option<String>,
    pub message: String,
}

#[derive(Default)]
struct Script {
    queued: HashMap<NotificationChannel, VecDeque<Delivery>>,
    fallback: HashMap<NotificationChannel, Delivery>,
    sent: Vec<SentMessage>,
}

/// Transport with programmable per-channel outcomes.
///
/// Queued outcomes are consumed one per call; once a channel's queue is empty
/// its fallback applies (success unless set). Every call is recorded.
#[derive(Clone, Default)]
pub struct ScriptedTransport {
    script: Arc<Mutex<Script>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues outcomes for the next calls on `channel`.
    pub async fn enqueue(
        &self,
        channel: NotificationChannel,
        outcomes: impl IntoIterator<Item = Delivery>,
    ) {
        let mut script = self.script.lock().await;
        script.queued.entry(channel).or_default().extend(outcomes);
    }

    /// Sets the outcome used once `channel` has no queued outcomes left.
    pub async fn set_fallback(&self, channel: NotificationChannel, outcome: Delivery) {
        self.script.lock().await.fallback.insert(channel, outcome);
    }

    pub async fn sent(&self) -> Vec<SentMessage> {
        self.script.lock().await.sent.clone()
    }

    pub async fn calls_on(&self, channel: NotificationChannel) -> usize {
        self.script
            .lock()
            .await
            .sent
            .iter()
            .filter(|m| m.channel == channel)
            .count()
    }

    async fn deliver(&self, sent: SentMessage) -> Delivery {
        let mut script = self.script.lock().await;
        let channel = sent.channel;
        script.sent.push(sent);
        if let Some(outcome) = script.queued.get_mut(&channel).and_then(VecDeque::pop_front) {
            return outcome;
        }
        script.fallback.get(&channel).cloned().unwrap_or(Ok(true))
    }
}

#[async_trait]
impl NotificationTransport for ScriptedTransport {
    async fn send_sms(&self, phone: &str, message: &str) -> Delivery {
        self.deliver(SentMessage {
            channel: NotificationChannel::Sms,
            recipient: phone.to_string(),
            subject: None,
            message: message.to_string(),
        })
        .await
    }

    async fn send_email(&self, email: &str, subject: &str, message: &str) -> Delivery {
        self.deliver(SentMessage {
            channel: NotificationChannel::Email,
            recipient: email.to_string(),
            subject: Some(subject.to_string()),
            message: message.to_string(),
        })
        .await
    }

    async fn send_app_push(&self, customer_id: CustomerId, message: &str) -> Delivery {
        self.deliver(SentMessage {
            channel: NotificationChannel::App,
            recipient: customer_id.to_string(),
            subject: None,
            message: message.to_string(),
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_simulated_transport_always_succeeds() {
        let transport = SimulatedTransport::new();
        assert_eq!(transport.send_sms("+910000000001", "hi").await, Ok(true));
        assert_eq!(
            transport.send_email("a@example.com", "Subject", "hi").await,
            Ok(true)
        );
        assert_eq!(transport.send_app_push(1, "hi").await, Ok(true));
    }

    #[tokio::test]
    async fn test_scripted_queue_then_fallback() {
        let transport = ScriptedTransport::new();
        transport
            .enqueue(
                NotificationChannel::Sms,
                [Ok(false), Err(TransportFault::transient("timeout"))],
            )
            .await;

        assert_eq!(transport.send_sms("p", "m").await, Ok(false));
        assert_eq!(
            transport.send_sms("p", "m").await,
            Err(TransportFault::transient("timeout"))
        );
        assert_eq!(transport.send_sms("p", "m").await, Ok(true));
        assert_eq!(transport.calls_on(NotificationChannel::Sms).await, 3);
        assert_eq!(transport.calls_on(NotificationChannel::Email).await, 0);
    }

    #[tokio::test]
    async fn test_scripted_records_email_subject() {
        let transport = ScriptedTransport::new();
        transport
            .set_fallback(NotificationChannel::Email, Ok(false))
            .await;

        assert_eq!(
            transport.send_email("a@example.com", "Payment Received", "body").await,
            Ok(false)
        );
        let sent = transport.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].subject.as_deref(), Some("Payment Received"));
        assert_eq!(sent[0].recipient, "a@example.com");
    }
}
