//! Error types for the history indexer.

use crate::types::{GlobalSequence, Name};
use thiserror::Error;

/// Main error type for indexing and query operations.
#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Invalid store descriptor: {0}")]
    InvalidStoreDescriptor(String),

    #[error("Invalid filter rule {rule:?}: {reason}")]
    InvalidFilterRule { rule: String, reason: String },

    #[error("Chain collaborator not provided")]
    MissingChain,

    #[error("Invalid transaction id: {0}")]
    InvalidTransactionId(String),

    #[error("Transaction {id} not found in history (block hint {block_num_hint:?})")]
    TransactionNotFound {
        id: String,
        block_num_hint: Option<u32>,
    },

    #[error("Cannot decode {action} payload: {reason}")]
    InvalidSystemPayload { action: Name, reason: String },

    #[error("Global sequence {got} does not follow {previous}")]
    NonMonotonicGlobalSequence {
        previous: GlobalSequence,
        got: GlobalSequence,
    },

    #[error("Account sequence overflow for {0}")]
    AccountSequenceOverflow(Name),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Corruption detected: {0}")]
    Corruption(String),

    #[error("Checksum mismatch: expected {expected}, got {got}")]
    ChecksumMismatch { expected: u32, got: u32 },

    #[error("Invalid store format: {0}")]
    InvalidFormat(String),

    #[error("Store is locked by another process")]
    Locked,
}

impl HistoryError {
    /// Errors caused by malformed client input rather than the store.
    pub fn is_client_error(&self) -> bool {
        matches!(self, HistoryError::InvalidTransactionId(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, HistoryError::TransactionNotFound { .. })
    }
}

impl From<serde_json::Error> for HistoryError {
    fn from(e: serde_json::Error) -> Self {
        HistoryError::Serialization(e.to_string())
    }
}

impl From<rmp_serde::encode::Error> for HistoryError {
    fn from(e: rmp_serde::encode::Error) -> Self {
        HistoryError::Serialization(e.to_string())
    }
}

impl From<rmp_serde::decode::Error> for HistoryError {
    fn from(e: rmp_serde::decode::Error) -> Self {
        HistoryError::Deserialization(e.to_string())
    }
}

/// Result type for history operations.
pub type Result<T> = std::result::Result<T, HistoryError>;
