use crate::config::ConfigError;
use crate::domain::customer::CustomerId;
use crate::domain::notification::NotificationChannel;
use crate::domain::payment::PaymentId;
use miette::Diagnostic;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, DunningError>;

#[derive(Error, Debug, Diagnostic)]
pub enum DunningError {
    #[error("Customer with ID {0} not found")]
    #[diagnostic(code(dunning::customer_not_found))]
    CustomerNotFound(CustomerId),
    #[error("Payment with ID {0} not found")]
    #[diagnostic(code(dunning::payment_not_found))]
    PaymentNotFound(PaymentId),
    #[error("Invalid payment: {0}")]
    #[diagnostic(code(dunning::invalid_payment))]
    InvalidPayment(String),
    #[error("Failed to send {channel} notification to customer {customer_id}")]
    NotificationDispatchFailed {
        channel: NotificationChannel,
        customer_id: CustomerId,
    },
    #[error("Transaction id {0} has already been recorded")]
    DuplicateTransaction(String),
    #[error("Customer {0} was modified by a concurrent writer")]
    Conflict(CustomerId),
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Configuration error: {0}")]
    #[diagnostic(help("check DUNNING_MAX_RETRIES and DUNNING_WORKERS"))]
    ConfigError(#[from] ConfigError),
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("Internal error: {0}")]
    InternalError(Box<dyn std::error::Error + Send + Sync>),
    #[cfg(feature = "storage-rocksdb")]
    #[error("Storage error: {0}")]
    StorageError(#[from] rocksdb::Error),
}

impl DunningError {
    /// Stable name reported in failed curing results.
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::CustomerNotFound(_) => "CustomerNotFound",
            Self::PaymentNotFound(_) => "PaymentNotFound",
            Self::InvalidPayment(_) => "InvalidPayment",
            _ => "UnexpectedError",
        }
    }
}

/// A fault raised by a notification transport.
///
/// Retryable faults are treated like an unsuccessful delivery attempt; anything
/// else stops the retry loop and surfaces to the caller.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message}")]
pub struct TransportFault {
    pub retryable: bool,
    pub message: String,
}

impl TransportFault {
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            retryable: true,
            message: message.into(),
        }
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        Self {
            retryable: false,
            message: message.into(),
        }
    }
}
