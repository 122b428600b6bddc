use super::customer::CustomerId;
use super::money::Amount;
use crate::error::DunningError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

pub type PaymentId = u64;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    CreditCard,
    DebitCard,
    Upi,
    NetBanking,
    Wallet,
}

impl FromStr for PaymentMethod {
    type Err = DunningError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CREDIT_CARD" => Ok(PaymentMethod::CreditCard),
            "DEBIT_CARD" => Ok(PaymentMethod::DebitCard),
            "UPI" => Ok(PaymentMethod::Upi),
            "NET_BANKING" => Ok(PaymentMethod::NetBanking),
            "WALLET" => Ok(PaymentMethod::Wallet),
            other => Err(DunningError::ValidationError(format!(
                "Unknown payment method: {other}"
            ))),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Success,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Success => "SUCCESS",
            PaymentStatus::Failed => "FAILED",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A recorded payment. The curing workflow only ever reads these.
///
/// `amount` is kept as recorded; curing validates it before use.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Payment {
    pub id: PaymentId,
    pub customer_id: CustomerId,
    pub amount: Decimal,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub transaction_id: Option<String>,
    pub payment_date: DateTime<Utc>,
}

/// A validated payment waiting for an id.
#[derive(Debug, Clone)]
pub struct NewPayment {
    pub customer_id: CustomerId,
    pub amount: Amount,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub transaction_id: Option<String>,
    pub payment_date: DateTime<Utc>,
}

impl NewPayment {
    pub fn with_id(self, id: PaymentId) -> Payment {
        Payment {
            id,
            customer_id: self.customer_id,
            amount: self.amount.value(),
            payment_method: self.payment_method,
            payment_status: self.payment_status,
            transaction_id: self.transaction_id,
            payment_date: self.payment_date,
        }
    }
}

/// Payment notification pushed by a gateway.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct PaymentWebhook {
    pub transaction_id: String,
    pub customer_id: CustomerId,
    pub amount: Decimal,
    pub payment_method: String,
    /// `success`, `failed` or `pending`, in any case.
    pub status: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub gateway_reference: Option<String>,
}

impl PaymentWebhook {
    pub fn is_success(&self) -> bool {
        self.status.trim().eq_ignore_ascii_case("success")
    }

    /// Validates the payload into a successful payment record.
    pub fn to_new_payment(&self) -> Result<NewPayment, DunningError> {
        let amount = Amount::new(self.amount)
            .map_err(|_| DunningError::InvalidPayment(format!(
                "Payment amount must be positive, got {}",
                self.amount
            )))?;
        Ok(NewPayment {
            customer_id: self.customer_id,
            amount,
            payment_method: self.payment_method.parse()?,
            payment_status: PaymentStatus::Success,
            transaction_id: Some(self.transaction_id.clone()),
            payment_date: self.timestamp,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn webhook(status: &str, method: &str, amount: Decimal) -> PaymentWebhook {
        PaymentWebhook {
            transaction_id: "TXN-1".into(),
            customer_id: 3,
            amount,
            payment_method: method.into(),
            status: status.into(),
            timestamp: Utc::now(),
            gateway_reference: None,
        }
    }

    #[test]
    fn test_payment_method_parsing_is_case_insensitive() {
        assert_eq!("upi".parse::<PaymentMethod>().unwrap(), PaymentMethod::Upi);
        assert_eq!(
            "Net_Banking".parse::<PaymentMethod>().unwrap(),
            PaymentMethod::NetBanking
        );
        assert!("cheque".parse::<PaymentMethod>().is_err());
    }

    #[test]
    fn test_webhook_success_detection() {
        assert!(webhook("SUCCESS", "upi", dec!(1)).is_success());
        assert!(webhook("success", "upi", dec!(1)).is_success());
        assert!(!webhook("failed", "upi", dec!(1)).is_success());
    }

    #[test]
    fn test_webhook_to_new_payment() {
        let payment = webhook("success", "wallet", dec!(250.00))
            .to_new_payment()
            .unwrap();
        assert_eq!(payment.customer_id, 3);
        assert_eq!(payment.amount.value(), dec!(250.00));
        assert_eq!(payment.payment_status, PaymentStatus::Success);
        assert_eq!(payment.transaction_id.as_deref(), Some("TXN-1"));
    }

    #[test]
    fn test_webhook_rejects_non_positive_amount() {
        let result = webhook("success", "upi", dec!(0)).to_new_payment();
        assert!(matches!(result, Err(DunningError::InvalidPayment(_))));
    }

    #[test]
    fn test_webhook_deserialization() {
        let json = r#"{
            "transaction_id": "TXN-9",
            "customer_id": 12,
            "amount": 499.5,
            "payment_method": "CREDIT_CARD",
            "status": "success",
            "timestamp": "2026-10-15T09:30:00Z"
        }"#;
        let payload: PaymentWebhook = serde_json::from_str(json).unwrap();
        assert_eq!(payload.customer_id, 12);
        assert_eq!(payload.amount, dec!(499.5));
        assert!(payload.gateway_reference.is_none());
    }
}
