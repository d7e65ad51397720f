pub mod backup;
pub mod json_backend;
pub mod schema;
pub mod sqlite_backend;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    domain::{KeyType, Share},
    errors::Result,
};

/// Identifies which durable medium a [`ShareStore`] writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// One serialized document rewritten on every mutation.
    #[default]
    Document,
    /// Two related tables in a transactional database file.
    Relational,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            BackendKind::Document => "document",
            BackendKind::Relational => "relational",
        };
        f.write_str(label)
    }
}

/// Contract shared by every share registry backend.
///
/// All backends behave identically for every operation. Mutations are
/// serialized per store instance and are never observed half-applied.
///
/// Name lookups are deliberately not merged: when several shares carry the
/// same name, [`ShareStore::get_files`] with [`KeyType::ShareName`] answers
/// with the files of the oldest one, and [`ShareStore::remove_share`] removes
/// that oldest one first.
pub trait ShareStore: Send + Sync {
    /// Opens the durable medium. Calling it on a started store is a no-op.
    fn start(&self) -> Result<()>;

    /// Flushes and closes the durable medium.
    fn stop(&self) -> Result<()>;

    fn backend(&self) -> BackendKind;

    /// Registers a share and returns its freshly generated token.
    ///
    /// Returns [`crate::EMPTY_TOKEN`] without writing anything when `name` or
    /// `files` is empty.
    fn add_share(&self, name: &str, files: &[String]) -> Result<String>;

    /// Names of all live shares in creation order.
    fn get_shares(&self) -> Result<Vec<String>>;

    fn get_share_count(&self) -> Result<usize>;

    /// Files of the share addressed by `key`.
    ///
    /// Fails with `TokenNotFound` or `ShareNotFound` depending on `key_type`.
    fn get_files(&self, key: &str, key_type: KeyType) -> Result<Vec<String>>;

    /// Removes the oldest share called `name`; `false` when none matched.
    fn remove_share(&self, name: &str) -> Result<bool>;

    /// Moves the full contents into the snapshot slot and empties the store.
    ///
    /// Returns `false`, leaving the live contents untouched, on any failure.
    fn backup_and_clear(&self) -> bool;

    /// Replaces the live contents with the snapshot and consumes it.
    ///
    /// Returns `false` when no snapshot exists or it cannot be read.
    fn restore(&self) -> bool;

    fn has_snapshot(&self) -> bool;

    /// Copies every live share record, in creation order.
    fn export_shares(&self) -> Result<Vec<Share>>;

    /// Appends records keeping their tokens; all or nothing.
    ///
    /// Fails with `TokenCollision` if any token is already live or repeats
    /// within `shares`.
    fn import_shares(&self, shares: &[Share]) -> Result<usize>;
}

pub use backup::{migrate, ClearedScope, SetAside, SnapshotSlot};
pub use json_backend::JsonShareStore;
pub use sqlite_backend::SqliteShareStore;
