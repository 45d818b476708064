use miette::Diagnostic;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

type BoxedSource = Box<dyn std::error::Error + Send + Sync>;

/// Coarse error category reported to the request-handling layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    NotFound,
    Conflict,
    BadRequest,
    Forbidden,
    Internal,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = match self {
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::Conflict => "CONFLICT",
            ErrorCode::BadRequest => "BAD_REQUEST",
            ErrorCode::Forbidden => "FORBIDDEN",
            ErrorCode::Internal => "INTERNAL",
        };
        f.write_str(code)
    }
}

#[derive(Error, Diagnostic, Debug)]
pub enum EngineError {
    #[error("{0}")]
    #[diagnostic(code(enrollpay::not_found))]
    NotFound(String),

    #[error("{0}")]
    #[diagnostic(code(enrollpay::conflict))]
    Conflict(String),

    #[error("{0}")]
    #[diagnostic(code(enrollpay::bad_request))]
    BadRequest(String),

    #[error("{0}")]
    #[diagnostic(code(enrollpay::forbidden))]
    Forbidden(String),

    #[error("Payment declined: {0}")]
    #[diagnostic(code(enrollpay::payment_declined))]
    PaymentDeclined(String),

    #[error("Timed out while waiting for {0}")]
    #[diagnostic(code(enrollpay::timeout))]
    Timeout(String),

    #[error("{context}: {source}")]
    #[diagnostic(code(enrollpay::storage))]
    Storage {
        context: String,
        #[source]
        source: BoxedSource,
    },

    #[error("CSV error: {0}")]
    #[diagnostic(code(enrollpay::csv))]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    #[diagnostic(code(enrollpay::io))]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    #[diagnostic(code(enrollpay::json))]
    Json(#[from] serde_json::Error),
}

impl EngineError {
    pub fn storage<E>(context: impl Into<String>, source: E) -> Self
    where
        E: Into<BoxedSource>,
    {
        EngineError::Storage {
            context: context.into(),
            source: source.into(),
        }
    }

    /// Prefixes storage failures with the operation that hit them.
    ///
    /// Domain errors already carry a user-facing message and pass through untouched.
    pub fn context(self, operation: &str) -> Self {
        match self {
            EngineError::Storage { context, source } => EngineError::Storage {
                context: format!("{operation}: {context}"),
                source,
            },
            other => other,
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            EngineError::NotFound(_) => ErrorCode::NotFound,
            EngineError::Conflict(_) => ErrorCode::Conflict,
            EngineError::BadRequest(_) | EngineError::PaymentDeclined(_) => ErrorCode::BadRequest,
            EngineError::Forbidden(_) => ErrorCode::Forbidden,
            EngineError::Timeout(_)
            | EngineError::Storage { .. }
            | EngineError::Csv(_)
            | EngineError::Io(_)
            | EngineError::Json(_) => ErrorCode::Internal,
        }
    }
}

#[cfg(feature = "storage-rocksdb")]
impl From<rocksdb::Error> for EngineError {
    fn from(e: rocksdb::Error) -> Self {
        EngineError::storage("RocksDB error", e)
    }
}
