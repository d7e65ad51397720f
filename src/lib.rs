//! Quickshare keeps a local registry of named file shares.
//!
//! A share is registered under a name and answered with an opaque token;
//! either can later be used to look up its files. Two interchangeable
//! backends implement [`storage::ShareStore`]: a JSON document and an SQLite
//! database. Both support a single-slot backup-and-clear / restore cycle.

pub mod config;
pub mod domain;
pub mod errors;
pub mod storage;
pub mod token;
pub mod utils;

use std::sync::Once;

pub use config::{open_store, ConfigManager, RegistryConfig};
pub use domain::{KeyType, Share, EMPTY_TOKEN};
pub use errors::{Result, ShareError};
pub use storage::{BackendKind, JsonShareStore, ShareStore, SqliteShareStore};
pub use token::{TokenGenerator, TOKEN_LENGTH};

static INIT_TRACING: Once = Once::new();

/// Initializes global tracing and emits a startup info log.
pub fn init() {
    INIT_TRACING.call_once(|| {
        utils::init_tracing();
        tracing::info!("Quickshare tracing initialized.");
    });
}

#[cfg(test)]
mod tests {
    #[test]
    fn init_does_not_panic() {
        super::init();
        super::init();
    }
}
