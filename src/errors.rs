use std::result::Result as StdResult;

use thiserror::Error;

/// Unified error type for the share registry and its storage backends.
#[derive(Debug, Error)]
pub enum ShareError {
    #[error("Token not found: {0}")]
    TokenNotFound(String),
    #[error("Share not found: {0}")]
    ShareNotFound(String),
    #[error("Invalid share: {0}")]
    InvalidShare(String),
    #[error("Token already in use: {0}")]
    TokenCollision(String),
    #[error("No free token found after {0} attempts")]
    TokenSpaceExhausted(usize),
    #[error("Store is not started")]
    NotStarted,
    #[error("Lock poisoned")]
    LockPoisoned,
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}

impl ShareError {
    /// True for the typed lookup misses callers are expected to recover from.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ShareError::TokenNotFound(_) | ShareError::ShareNotFound(_)
        )
    }
}

impl<T> From<std::sync::PoisonError<T>> for ShareError {
    fn from(_: std::sync::PoisonError<T>) -> Self {
        ShareError::LockPoisoned
    }
}

pub type Result<T> = StdResult<T, ShareError>;
