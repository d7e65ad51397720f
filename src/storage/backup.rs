//! Single-slot snapshot bookkeeping shared by the backends, plus helpers
//! built on top of `backup_and_clear`/`restore`.

use std::{
    fs,
    path::{Path, PathBuf},
};

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use super::ShareStore;
use crate::{errors::Result, utils::PathResolver};

/// The one snapshot a store instance may hold.
///
/// Owned by the store; the side file lives at a fixed path next to the live
/// medium and is overwritten by every new backup.
#[derive(Debug, Clone)]
pub struct SnapshotSlot {
    path: PathBuf,
    taken_at: Option<DateTime<Utc>>,
}

impl SnapshotSlot {
    /// Slot for the side file belonging to `live`. Starts empty.
    pub fn for_live(live: &Path) -> Self {
        Self {
            path: PathResolver::snapshot_path_for(live),
            taken_at: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_filled(&self) -> bool {
        self.taken_at.is_some()
    }

    pub fn taken_at(&self) -> Option<DateTime<Utc>> {
        self.taken_at
    }

    /// Fills the slot from a side file left by an earlier run, if any.
    pub fn adopt_existing(&mut self) {
        if self.taken_at.is_none() && self.path.is_file() {
            let taken_at = fs::metadata(&self.path)
                .and_then(|meta| meta.modified())
                .map(DateTime::<Utc>::from)
                .unwrap_or_else(|_| Utc::now());
            info!(path = %self.path.display(), "adopting snapshot left by a previous run");
            self.taken_at = Some(taken_at);
        }
    }

    pub fn mark_filled(&mut self) {
        self.taken_at = Some(Utc::now());
    }

    /// Removes the side file and empties the slot. The slot stays filled if
    /// the file cannot be removed.
    pub fn consume(&mut self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path)?;
        }
        self.taken_at = None;
        Ok(())
    }

    /// Moves the current side file out of the way before a new backup is
    /// written over its path.
    pub fn set_aside(&self) -> Result<SetAside> {
        let held = previous_path(&self.path);
        if held.exists() {
            fs::remove_file(&held)?;
        }
        let held = if self.path.is_file() {
            fs::rename(&self.path, &held)?;
            Some(held)
        } else {
            None
        };
        Ok(SetAside {
            side: self.path.clone(),
            held,
        })
    }
}

/// The side file a backup in progress displaced. Either put back when the
/// backup fails or released once it succeeds.
#[derive(Debug)]
#[must_use]
pub struct SetAside {
    side: PathBuf,
    held: Option<PathBuf>,
}

impl SetAside {
    /// Returns the side path to what it held before the backup started.
    pub fn put_back(self) {
        let outcome = match &self.held {
            Some(held) => fs::rename(held, &self.side),
            None if self.side.is_file() => fs::remove_file(&self.side),
            None => Ok(()),
        };
        if let Err(err) = outcome {
            warn!(path = %self.side.display(), error = %err, "could not reinstate previous snapshot");
        }
    }

    /// Drops the displaced side file.
    pub fn release(self) {
        if let Some(held) = &self.held {
            if let Err(err) = fs::remove_file(held) {
                warn!(path = %held.display(), error = %err, "could not remove previous snapshot");
            }
        }
    }
}

fn previous_path(side: &Path) -> PathBuf {
    let mut held = side.as_os_str().to_owned();
    held.push(".prev");
    PathBuf::from(held)
}

/// Keeps a store empty for the guard's lifetime and restores it on drop.
///
/// ```no_run
/// # use quickshare::{storage::{ClearedScope, JsonShareStore, ShareStore}};
/// # fn demo(store: &JsonShareStore) {
/// let scope = ClearedScope::enter(store).expect("store cleared");
/// assert_eq!(scope.store().get_share_count().unwrap(), 0);
/// drop(scope); // previous shares are back
/// # }
/// ```
pub struct ClearedScope<'a> {
    store: &'a dyn ShareStore,
    restored: bool,
}

impl<'a> ClearedScope<'a> {
    /// Returns `None` when the store could not be backed up.
    pub fn enter(store: &'a dyn ShareStore) -> Option<Self> {
        if store.backup_and_clear() {
            Some(Self {
                store,
                restored: false,
            })
        } else {
            None
        }
    }

    pub fn store(&self) -> &'a dyn ShareStore {
        self.store
    }

    /// Restores now and reports the outcome instead of waiting for drop.
    pub fn finish(mut self) -> bool {
        self.restored = true;
        self.store.restore()
    }
}

impl Drop for ClearedScope<'_> {
    fn drop(&mut self) {
        if !self.restored && !self.store.restore() {
            warn!(backend = %self.store.backend(), "restore after cleared scope failed");
        }
    }
}

/// Copies every share of `source` into `target`, tokens and order included.
pub fn migrate(source: &dyn ShareStore, target: &dyn ShareStore) -> Result<usize> {
    let shares = source.export_shares()?;
    let imported = target.import_shares(&shares)?;
    info!(
        from = %source.backend(),
        to = %target.backend(),
        imported,
        "migrated shares"
    );
    Ok(imported)
}
