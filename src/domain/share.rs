//! Domain types describing a registered share.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{Result, ShareError};

/// Returned by `add_share` when the input is rejected and nothing was stored.
pub const EMPTY_TOKEN: &str = "";

/// A named, token-addressable collection of file paths.
///
/// Names are not unique across shares; tokens are. File paths are opaque
/// strings and may repeat within one share.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Share {
    pub name: String,
    pub token: String,
    pub files: Vec<String>,
    #[serde(default)]
    pub created_at: DateTime<Utc>,
}

impl Share {
    pub fn new(name: impl Into<String>, token: impl Into<String>, files: Vec<String>) -> Self {
        Self {
            name: name.into(),
            token: token.into(),
            files,
            created_at: Utc::now(),
        }
    }

    /// Returns `true` when `add_share` would accept this name and file list.
    pub fn is_acceptable(name: &str, files: &[String]) -> bool {
        !name.is_empty() && !files.is_empty()
    }

    /// Validates an already-tokenised record, e.g. one about to be imported.
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(ShareError::InvalidShare(format!(
                "share with token `{}` has an empty name",
                self.token
            )));
        }
        if self.files.is_empty() {
            return Err(ShareError::InvalidShare(format!(
                "share `{}` has no files",
                self.name
            )));
        }
        if self.token.is_empty() {
            return Err(ShareError::InvalidShare(format!(
                "share `{}` has no token",
                self.name
            )));
        }
        Ok(())
    }
}

/// Selects how `get_files` interprets its key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyType {
    Token,
    ShareName,
}

impl KeyType {
    /// Builds the typed not-found error matching this key kind.
    pub fn not_found(self, key: &str) -> ShareError {
        match self {
            KeyType::Token => ShareError::TokenNotFound(key.to_string()),
            KeyType::ShareName => ShareError::ShareNotFound(key.to_string()),
        }
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            KeyType::Token => "token",
            KeyType::ShareName => "share name",
        };
        f.write_str(label)
    }
}
