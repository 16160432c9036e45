//! Result and error types for the core library

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Core library error type
///
/// Ledger operations surface typed failures (self-transfer, unknown
/// recipient, insufficient funds, ...) so callers can react to each case;
/// infrastructure failures are wrapped with a human-readable message.
#[derive(Error, Debug)]
pub enum Error {
    #[error("cannot transfer KTC to your own account")]
    SelfTransfer,

    #[error("no account matches '{0}'")]
    RecipientNotFound(String),

    #[error("'{0}' matches more than one account")]
    AmbiguousRecipient(String),

    #[error("insufficient funds: balance is {balance} KTC, tried to move {requested} KTC")]
    InsufficientFunds {
        balance: Decimal,
        requested: Decimal,
    },

    #[error("the ledger is busy and the operation was not applied; try again")]
    ConcurrencyConflict,

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("ledger backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a database error
    pub fn database(msg: impl Into<String>) -> Self {
        Self::Database(msg.into())
    }

    /// Create a not found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create an authentication error
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Auth(msg.into())
    }

    /// Stable classification label for an error, safe for the event log.
    ///
    /// Display messages embed user data (balances, amounts, the handle
    /// that failed to resolve); the label carries none of it.
    pub fn class(&self) -> &'static str {
        match self {
            Error::SelfTransfer => "self_transfer",
            Error::RecipientNotFound(_) => "recipient_not_found",
            Error::AmbiguousRecipient(_) => "ambiguous_recipient",
            Error::InsufficientFunds { .. } => "insufficient_funds",
            Error::ConcurrencyConflict => "concurrency_conflict",
            Error::Auth(_) => "auth",
            Error::BackendUnavailable(_) => "backend_unavailable",
            Error::Database(_) => "database",
            Error::NotFound(_) => "not_found",
            Error::Validation(_) => "validation",
            Error::Config(_) => "config",
            Error::Io(_) => "io",
            Error::Json(_) => "json",
        }
    }

    /// Whether the caller may safely retry the operation unchanged.
    ///
    /// Only failures that are guaranteed to have applied no effects are
    /// retryable: conflicts and an unreachable backend.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::ConcurrencyConflict | Error::BackendUnavailable(_)
        )
    }
}

/// Core library result type
pub type Result<T> = std::result::Result<T, Error>;

/// Operation result envelope for embedding presentation layers
///
/// Serializable request/response shape so a UI shell can consume service
/// calls without matching on the error enum.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationResult<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    /// True when the failed operation applied no effects and may be retried
    #[serde(default)]
    pub retryable: bool,
}

impl<T> OperationResult<T> {
    /// Create a successful result
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            retryable: false,
        }
    }

    /// Create a failed result
    pub fn fail(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            retryable: false,
        }
    }
}

impl<T> From<Result<T>> for OperationResult<T> {
    fn from(result: Result<T>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(e) => Self {
                success: false,
                data: None,
                retryable: e.is_retryable(),
                error: Some(e.to_string()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_funds_message_carries_amounts() {
        let err = Error::InsufficientFunds {
            balance: Decimal::new(5000, 2),
            requested: Decimal::new(10000, 2),
        };
        let msg = err.to_string();
        assert!(msg.contains("50.00"));
        assert!(msg.contains("100.00"));
    }

    #[test]
    fn test_class_label_carries_no_user_data() {
        let err = Error::InsufficientFunds {
            balance: Decimal::new(5000, 2),
            requested: Decimal::new(10000, 2),
        };
        assert_eq!(err.class(), "insufficient_funds");
        assert!(!err.class().contains("50"));

        let err = Error::RecipientNotFound("KTC-ABC234".into());
        assert_eq!(err.class(), "recipient_not_found");
        assert!(!err.class().contains("ABC234"));
    }

    #[test]
    fn test_retryable_classification() {
        assert!(Error::ConcurrencyConflict.is_retryable());
        assert!(Error::BackendUnavailable("file locked".into()).is_retryable());
        assert!(!Error::SelfTransfer.is_retryable());
        assert!(!Error::validation("bad amount").is_retryable());
    }

    #[test]
    fn test_operation_result_ok() {
        let result: OperationResult<i32> = OperationResult::ok(42);
        assert!(result.success);
        assert_eq!(result.data, Some(42));
        assert!(result.error.is_none());
    }

    #[test]
    fn test_from_result_marks_retryable() {
        let err: Result<i32> = Err(Error::ConcurrencyConflict);
        let result: OperationResult<i32> = err.into();
        assert!(!result.success);
        assert!(result.retryable);

        let err: Result<i32> = Err(Error::SelfTransfer);
        let result: OperationResult<i32> = err.into();
        assert!(!result.retryable);
        assert!(result.error.unwrap().contains("own account"));
    }
}
