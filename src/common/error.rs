//! Error types for minibank

use std::fmt;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    // === I/O Errors ===
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // === Wire Errors ===
    #[error("Malformed record: {0}")]
    Codec(String),

    #[error("Missing field: {0}")]
    MissingField(String),

    #[error("Unknown request type: {0}")]
    UnknownRequestType(String),

    // === Ledger Errors ===
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Snapshot corrupted: {0}")]
    SnapshotCorrupted(String),

    // === Routing Errors ===
    #[error("Partition {0} is not configured")]
    PartitionNotConfigured(usize),

    #[error("Partition {0} is unreachable")]
    PartitionUnreachable(usize),

    #[error("Node {node} unreachable: {reason}")]
    NodeUnreachable { node: String, reason: String },

    // === 2PC Errors ===
    #[error("Transaction {tx_id} aborted: {reason}")]
    Aborted { tx_id: String, reason: ErrorCode },

    // === Config Errors ===
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    // === Audit Store Errors ===
    #[error("Audit store error: {0}")]
    Audit(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Generic ===
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Network failures the coordinator treats as "no answer".
    pub fn is_unreachable(&self) -> bool {
        matches!(self, Error::NodeUnreachable { .. })
    }

    /// Wire error code reported to the peer for this failure.
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::NotFound(_) => ErrorCode::NotFound,
            Error::Validation(_) | Error::Codec(_) | Error::MissingField(_) => {
                ErrorCode::ValidationFailed
            }
            Error::UnknownRequestType(_) => ErrorCode::UnknownRequestType,
            Error::PartitionNotConfigured(_) => ErrorCode::PartitionNotConfigured,
            Error::PartitionUnreachable(_) => ErrorCode::PartitionUnreachable,
            Error::NodeUnreachable { .. } => ErrorCode::NodeUnreachable,
            Error::Aborted { reason, .. } => *reason,
            _ => ErrorCode::InternalOperationFailure,
        }
    }
}

/// Error codes carried in the `"error"` field of an `ERROR` response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    NotFound,
    ValidationFailed,
    PartitionNotConfigured,
    PartitionUnreachable,
    NodeUnreachable,
    UnknownRequestType,
    InternalOperationFailure,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::NotFound => "NotFound",
            ErrorCode::ValidationFailed => "ValidationFailed",
            ErrorCode::PartitionNotConfigured => "PartitionNotConfigured",
            ErrorCode::PartitionUnreachable => "PartitionUnreachable",
            ErrorCode::NodeUnreachable => "NodeUnreachable",
            ErrorCode::UnknownRequestType => "UnknownRequestType",
            ErrorCode::InternalOperationFailure => "InternalOperationFailure",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let code = match s {
            "NotFound" => ErrorCode::NotFound,
            "ValidationFailed" => ErrorCode::ValidationFailed,
            "PartitionNotConfigured" => ErrorCode::PartitionNotConfigured,
            "PartitionUnreachable" => ErrorCode::PartitionUnreachable,
            "NodeUnreachable" => ErrorCode::NodeUnreachable,
            "UnknownRequestType" => ErrorCode::UnknownRequestType,
            "InternalOperationFailure" => ErrorCode::InternalOperationFailure,
            _ => return None,
        };
        Some(code)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Internal(s.to_string())
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Internal(s)
    }
}
