use serde::Serialize;
use thiserror::Error;

use crate::constants::USER_REJECTED_CODE;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("User rejected the request")]
    UserRejected,

    #[error("Please connect your wallet to chain {expected} (currently on chain {actual})")]
    NetworkMismatch { expected: u64, actual: u64 },

    #[error("{0}")]
    TransactionReverted(String),

    #[error("{0}")]
    Provider(String),

    #[error("{0}")]
    Unknown(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Closed set of error categories surfaced to the display layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    UserRejected,
    NetworkMismatch,
    TransactionReverted,
    ProviderError,
    UnknownError,
}

/// A dismissible, display-ready error. `raw` keeps the full debug rendering of
/// the source failure for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorRecord {
    pub kind: ErrorKind,
    pub message: String,
    pub raw: String,
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::UserRejected => ErrorKind::UserRejected,
            AppError::NetworkMismatch { .. } => ErrorKind::NetworkMismatch,
            AppError::TransactionReverted(_) => ErrorKind::TransactionReverted,
            AppError::Provider(_) => ErrorKind::ProviderError,
            AppError::Unknown(_) | AppError::BadRequest(_) | AppError::Config(_) => {
                ErrorKind::UnknownError
            }
        }
    }

    pub fn record(&self) -> ErrorRecord {
        ErrorRecord {
            kind: self.kind(),
            message: self.to_string(),
            raw: format!("{:?}", self),
        }
    }
}

/// Raw failure shape reported by the wallet/node boundary before
/// classification: an optional JSON-RPC error code, the optional structured
/// `data.message` payload, and the plain message.
#[derive(Debug, Clone, Default)]
pub struct RawProviderError {
    pub code: Option<i64>,
    pub data_message: Option<String>,
    pub message: String,
}

/// Total classification: every raw provider failure maps to exactly one
/// `AppError`. The rejection code and the `data.message` extraction follow the
/// wallet provider's conventions.
pub fn classify(raw: RawProviderError) -> AppError {
    if raw.code == Some(USER_REJECTED_CODE) {
        return AppError::UserRejected;
    }
    if let Some(message) = raw.data_message {
        return AppError::Provider(message);
    }
    AppError::Unknown(raw.message)
}

pub type Result<T> = std::result::Result<T, AppError>;
