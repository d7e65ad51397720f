use std::{
    collections::HashSet,
    fs,
    path::{Path, PathBuf},
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use tracing::{debug, info, warn};

use super::{backup::SnapshotSlot, BackendKind, ShareStore};
use crate::{
    domain::{KeyType, Share, EMPTY_TOKEN},
    errors::{Result, ShareError},
    token::TokenGenerator,
    utils::persistence::{self, load_json_or_default},
};

pub const DEFAULT_DOCUMENT_FILE: &str = "shares.json";

/// Document backend: the whole registry is one JSON array on disk.
///
/// Reads are served from an in-memory mirror. Every mutation serializes the
/// complete next state, writes it through a staging file and only then
/// replaces the mirror, so a failed write leaves both untouched.
pub struct JsonShareStore {
    path: PathBuf,
    generator: TokenGenerator,
    state: RwLock<DocumentState>,
}

#[derive(Debug)]
struct DocumentState {
    open: bool,
    shares: Vec<Share>,
    snapshot: SnapshotSlot,
}

impl JsonShareStore {
    /// Creates a store for `path` without touching the disk; call `start()`.
    pub fn new(path: PathBuf) -> Self {
        let snapshot = SnapshotSlot::for_live(&path);
        Self {
            path,
            generator: TokenGenerator,
            state: RwLock::new(DocumentState {
                open: false,
                shares: Vec::new(),
                snapshot,
            }),
        }
    }

    /// Creates and starts a store at `dir/shares.json`.
    pub fn open_in(dir: &Path) -> Result<Self> {
        let store = Self::new(dir.join(DEFAULT_DOCUMENT_FILE));
        store.start()?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn snapshot_path(&self) -> PathBuf {
        SnapshotSlot::for_live(&self.path).path().to_path_buf()
    }

    fn read_open(&self) -> Result<RwLockReadGuard<'_, DocumentState>> {
        let state = self.state.read()?;
        if !state.open {
            return Err(ShareError::NotStarted);
        }
        Ok(state)
    }

    fn write_open(&self) -> Result<RwLockWriteGuard<'_, DocumentState>> {
        let state = self.state.write()?;
        if !state.open {
            return Err(ShareError::NotStarted);
        }
        Ok(state)
    }

    fn try_backup_and_clear(&self) -> Result<()> {
        let mut state = self.write_open()?;
        let snapshot_path = state.snapshot.path().to_path_buf();

        let staged_snapshot = persistence::stage(&snapshot_path, &render(&state.shares)?)?;
        let staged_live = match persistence::stage(&self.path, &render(&[])?) {
            Ok(path) => path,
            Err(err) => {
                discard(&staged_snapshot);
                return Err(err);
            }
        };
        let previous = match state.snapshot.set_aside() {
            Ok(previous) => previous,
            Err(err) => {
                discard(&staged_snapshot);
                discard(&staged_live);
                return Err(err);
            }
        };
        if let Err(err) = fs::rename(&staged_snapshot, &snapshot_path) {
            discard(&staged_snapshot);
            discard(&staged_live);
            previous.put_back();
            return Err(err.into());
        }
        if let Err(err) = fs::rename(&staged_live, &self.path) {
            discard(&staged_live);
            previous.put_back();
            return Err(err.into());
        }
        previous.release();

        info!(
            shares = state.shares.len(),
            snapshot = %snapshot_path.display(),
            "document store backed up and cleared"
        );
        state.shares.clear();
        state.snapshot.mark_filled();
        Ok(())
    }

    fn try_restore(&self) -> Result<bool> {
        let mut state = self.write_open()?;
        if !state.snapshot.is_filled() {
            debug!("restore requested without a snapshot");
            return Ok(false);
        }
        let data = fs::read_to_string(state.snapshot.path())?;
        let restored: Vec<Share> = serde_json::from_str(&data)?;
        persistence::write_atomic(&self.path, &render(&restored)?)?;

        info!(shares = restored.len(), "document store restored from snapshot");
        state.shares = restored;
        if let Err(err) = state.snapshot.consume() {
            warn!(error = %err, "snapshot restored but side file could not be removed");
        }
        Ok(true)
    }
}

impl ShareStore for JsonShareStore {
    fn start(&self) -> Result<()> {
        let mut state = self.state.write()?;
        if state.open {
            return Ok(());
        }
        let shares: Vec<Share> = load_json_or_default(&self.path)?;
        info!(
            path = %self.path.display(),
            shares = shares.len(),
            "document store started"
        );
        state.shares = shares;
        state.snapshot.adopt_existing();
        state.open = true;
        Ok(())
    }

    fn stop(&self) -> Result<()> {
        let mut state = self.state.write()?;
        if !state.open {
            return Ok(());
        }
        persistence::write_atomic(&self.path, &render(&state.shares)?)?;
        state.shares.clear();
        state.open = false;
        info!(path = %self.path.display(), "document store stopped");
        Ok(())
    }

    fn backend(&self) -> BackendKind {
        BackendKind::Document
    }

    fn add_share(&self, name: &str, files: &[String]) -> Result<String> {
        if !Share::is_acceptable(name, files) {
            debug!(name, files = files.len(), "rejected share with empty input");
            return Ok(EMPTY_TOKEN.to_string());
        }
        let mut state = self.write_open()?;
        let token = self
            .generator
            .generate_unique(|candidate| Ok(state.shares.iter().any(|s| s.token == candidate)))?;

        let mut next = state.shares.clone();
        next.push(Share::new(name, token.clone(), files.to_vec()));
        persistence::write_atomic(&self.path, &render(&next)?)?;
        state.shares = next;

        debug!(name, files = files.len(), "share added");
        Ok(token)
    }

    fn get_shares(&self) -> Result<Vec<String>> {
        let state = self.read_open()?;
        Ok(state.shares.iter().map(|share| share.name.clone()).collect())
    }

    fn get_share_count(&self) -> Result<usize> {
        Ok(self.read_open()?.shares.len())
    }

    fn get_files(&self, key: &str, key_type: KeyType) -> Result<Vec<String>> {
        let state = self.read_open()?;
        let found = match key_type {
            KeyType::Token => state.shares.iter().find(|share| share.token == key),
            KeyType::ShareName => state.shares.iter().find(|share| share.name == key),
        };
        found
            .map(|share| share.files.clone())
            .ok_or_else(|| key_type.not_found(key))
    }

    fn remove_share(&self, name: &str) -> Result<bool> {
        let mut state = self.write_open()?;
        let Some(index) = state.shares.iter().position(|share| share.name == name) else {
            return Ok(false);
        };
        let mut next = state.shares.clone();
        next.remove(index);
        persistence::write_atomic(&self.path, &render(&next)?)?;
        state.shares = next;

        debug!(name, "share removed");
        Ok(true)
    }

    fn backup_and_clear(&self) -> bool {
        match self.try_backup_and_clear() {
            Ok(()) => true,
            Err(err) => {
                warn!(error = %err, "document backup failed, live store unchanged");
                false
            }
        }
    }

    fn restore(&self) -> bool {
        match self.try_restore() {
            Ok(restored) => restored,
            Err(err) => {
                warn!(error = %err, "document restore failed, live store unchanged");
                false
            }
        }
    }

    fn has_snapshot(&self) -> bool {
        self.state
            .read()
            .map(|state| state.snapshot.is_filled())
            .unwrap_or(false)
    }

    fn export_shares(&self) -> Result<Vec<Share>> {
        Ok(self.read_open()?.shares.clone())
    }

    fn import_shares(&self, shares: &[Share]) -> Result<usize> {
        let mut state = self.write_open()?;
        {
            let mut tokens: HashSet<&str> =
                state.shares.iter().map(|s| s.token.as_str()).collect();
            for share in shares {
                share.validate()?;
                if !tokens.insert(share.token.as_str()) {
                    return Err(ShareError::TokenCollision(share.token.clone()));
                }
            }
        }

        let mut next = state.shares.clone();
        next.extend(shares.iter().cloned());
        persistence::write_atomic(&self.path, &render(&next)?)?;
        state.shares = next;
        Ok(shares.len())
    }
}

fn render(shares: &[Share]) -> Result<String> {
    Ok(serde_json::to_string_pretty(shares)?)
}

fn discard(staged: &Path) {
    if let Err(err) = fs::remove_file(staged) {
        warn!(path = %staged.display(), error = %err, "could not remove staging file");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store_with_temp_dir() -> (JsonShareStore, TempDir) {
        let temp = TempDir::new().expect("temp dir");
        let store = JsonShareStore::open_in(temp.path()).expect("json store");
        (store, temp)
    }

    fn files(paths: &[&str]) -> Vec<String> {
        paths.iter().map(|p| p.to_string()).collect()
    }

    #[test]
    fn operations_before_start_fail() {
        let temp = TempDir::new().expect("temp dir");
        let store = JsonShareStore::new(temp.path().join(DEFAULT_DOCUMENT_FILE));
        assert!(matches!(store.get_share_count(), Err(ShareError::NotStarted)));
        assert!(matches!(
            store.add_share("Docs", &files(&["/a"])),
            Err(ShareError::NotStarted)
        ));
        assert!(!store.backup_and_clear());
    }

    #[test]
    fn mutations_are_durable_after_each_call() {
        let (store, _guard) = store_with_temp_dir();
        store
            .add_share("Trip Photos", &files(&["a.png", "b.png"]))
            .expect("add share");

        let raw = fs::read_to_string(store.path()).expect("read document");
        let on_disk: Vec<Share> = serde_json::from_str(&raw).expect("parse document");
        assert_eq!(on_disk.len(), 1);
        assert_eq!(on_disk[0].name, "Trip Photos");
        assert_eq!(on_disk[0].files, files(&["a.png", "b.png"]));
    }

    #[test]
    fn restart_reloads_document() {
        let (store, guard) = store_with_temp_dir();
        let token = store
            .add_share("qwertz", &files(&["/storage/sdcard0/123Test/Greenhouse.zip"]))
            .expect("add share");
        store.stop().expect("stop");

        let reopened = JsonShareStore::open_in(guard.path()).expect("reopen");
        assert_eq!(
            reopened.get_files(&token, KeyType::Token).expect("files"),
            files(&["/storage/sdcard0/123Test/Greenhouse.zip"])
        );
    }

    #[test]
    fn snapshot_survives_restart() {
        let (store, guard) = store_with_temp_dir();
        store.add_share("A Mol", &files(&["record0.flac"])).expect("add");
        assert!(store.backup_and_clear());
        store.stop().expect("stop");

        let reopened = JsonShareStore::open_in(guard.path()).expect("reopen");
        assert!(reopened.has_snapshot());
        assert_eq!(reopened.get_share_count().expect("count"), 0);
        assert!(reopened.restore());
        assert_eq!(reopened.get_shares().expect("names"), vec!["A Mol".to_string()]);
    }

    #[test]
    fn restore_consumes_side_file() {
        let (store, _guard) = store_with_temp_dir();
        store.add_share("Docs", &files(&["/a"])).expect("add");
        assert!(store.backup_and_clear());
        assert!(store.snapshot_path().exists());
        assert!(store.restore());
        assert!(!store.snapshot_path().exists());
        assert!(!store.restore());
    }
}
