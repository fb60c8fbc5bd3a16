use crate::domain::invoice::InvoiceStatus;
use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

/// Coarse classification of an error, for callers that only need to pick a
/// response category (e.g. an HTTP status) without matching every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    BadRequest,
    NotFound,
    Forbidden,
    Conflict,
    Unavailable,
    Internal,
}

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(Decimal),
    #[error("Account not found")]
    AccountNotFound,
    #[error("Invoice not found: {0}")]
    InvoiceNotFound(Uuid),
    #[error("Unauthorized access")]
    UnauthorizedAccess,
    #[error("Invalid status transition from {from} to {to}")]
    InvalidStatusTransition {
        from: InvoiceStatus,
        to: InvoiceStatus,
    },
    #[error("API key already exists")]
    DuplicatedApiKey,
    #[error("Failed to publish deferral event: {0}")]
    PublishFailed(String),
    /// The balance and the invoice status disagree and an operator has to fix it.
    #[error(
        "Reconciliation required for invoice {invoice_id} ({amount} on account {account_id}): {source}"
    )]
    ReconciliationRequired {
        invoice_id: Uuid,
        account_id: Uuid,
        amount: Decimal,
        #[source]
        source: Box<GatewayError>,
    },
    #[error("Malformed event payload: {0}")]
    MalformedEvent(#[from] serde_json::Error),
    #[error("Failed to receive event: {0}")]
    ConsumeFailed(String),
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Internal error: {0}")]
    InternalError(Box<dyn std::error::Error + Send + Sync>),
}

impl GatewayError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidAmount(_)
            | Self::ValidationError(_)
            | Self::MalformedEvent(_)
            | Self::CsvError(_) => ErrorKind::BadRequest,
            Self::AccountNotFound | Self::InvoiceNotFound(_) => ErrorKind::NotFound,
            Self::UnauthorizedAccess => ErrorKind::Forbidden,
            Self::InvalidStatusTransition { .. } | Self::DuplicatedApiKey => ErrorKind::Conflict,
            Self::PublishFailed(_) | Self::ConsumeFailed(_) => ErrorKind::Unavailable,
            Self::ReconciliationRequired { .. } | Self::IoError(_) | Self::InternalError(_) => {
                ErrorKind::Internal
            }
        }
    }
}

#[cfg(feature = "storage-rocksdb")]
impl From<rocksdb::Error> for GatewayError {
    fn from(err: rocksdb::Error) -> Self {
        GatewayError::InternalError(Box::new(err))
    }
}

pub type Result<T> = std::result::Result<T, GatewayError>;
