use std::{
    collections::HashSet,
    fs,
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard},
};

use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use tracing::{debug, info, warn};

use super::{backup::SnapshotSlot, schema, BackendKind, ShareStore};
use crate::{
    domain::{KeyType, Share, EMPTY_TOKEN},
    errors::{Result, ShareError},
    token::TokenGenerator,
    utils::{ensure_dir, persistence::tmp_path},
};

pub const DEFAULT_DATABASE_FILE: &str = "shares.db";

/// Inserts retried when the UNIQUE constraint still rejects a pre-checked token.
const MAX_INSERT_ATTEMPTS: usize = 3;

/// Relational backend: a `shares` table plus a `share_files` table in SQLite.
pub struct SqliteShareStore {
    path: PathBuf,
    generator: TokenGenerator,
    inner: Mutex<Relational>,
}

struct Relational {
    conn: Option<Connection>,
    snapshot: SnapshotSlot,
}

impl SqliteShareStore {
    /// Creates a store for `path` without opening it; call `start()`.
    pub fn new(path: PathBuf) -> Self {
        let snapshot = SnapshotSlot::for_live(&path);
        Self {
            path,
            generator: TokenGenerator,
            inner: Mutex::new(Relational {
                conn: None,
                snapshot,
            }),
        }
    }

    /// Creates and starts a store at `dir/shares.db`.
    pub fn open_in(dir: &Path) -> Result<Self> {
        let store = Self::new(dir.join(DEFAULT_DATABASE_FILE));
        store.start()?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn snapshot_path(&self) -> PathBuf {
        SnapshotSlot::for_live(&self.path).path().to_path_buf()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Relational>> {
        Ok(self.inner.lock()?)
    }

    /// Runs `f` against the open connection.
    fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T>,
    {
        let mut inner = self.lock()?;
        let conn = inner.conn.as_mut().ok_or(ShareError::NotStarted)?;
        f(conn)
    }

    fn try_backup_and_clear(&self) -> Result<()> {
        let mut inner = self.lock()?;
        let Relational { conn, snapshot } = &mut *inner;
        let conn = conn.as_mut().ok_or(ShareError::NotStarted)?;

        // VACUUM INTO refuses to overwrite, so stage to a fresh file first.
        let staged = tmp_path(snapshot.path());
        if staged.exists() {
            fs::remove_file(&staged)?;
        }
        conn.execute("VACUUM INTO ?1", [staged.to_string_lossy().into_owned()])?;
        let previous = match snapshot.set_aside() {
            Ok(previous) => previous,
            Err(err) => {
                discard(&staged);
                return Err(err);
            }
        };
        if let Err(err) = fs::rename(&staged, snapshot.path()) {
            discard(&staged);
            previous.put_back();
            return Err(err.into());
        }

        let cleared = match clear_shares(conn) {
            Ok(cleared) => cleared,
            Err(err) => {
                previous.put_back();
                return Err(err);
            }
        };
        previous.release();

        snapshot.mark_filled();
        info!(
            shares = cleared,
            snapshot = %snapshot.path().display(),
            "relational store backed up and cleared"
        );
        Ok(())
    }

    fn try_restore(&self) -> Result<bool> {
        let mut inner = self.lock()?;
        let Relational { conn, snapshot } = &mut *inner;
        let conn = conn.as_mut().ok_or(ShareError::NotStarted)?;

        if !snapshot.is_filled() {
            debug!("restore requested without a snapshot");
            return Ok(false);
        }
        // ATTACH would silently create an empty database in its place.
        if !snapshot.path().is_file() {
            return Err(ShareError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("snapshot `{}` is missing", snapshot.path().display()),
            )));
        }

        conn.execute(
            "ATTACH DATABASE ?1 AS snapshot",
            [snapshot.path().to_string_lossy().into_owned()],
        )?;
        let outcome = replace_from_snapshot(conn);
        let detached = conn.execute("DETACH DATABASE snapshot", []);
        let restored = outcome?;
        detached?;

        info!(shares = restored, "relational store restored from snapshot");
        if let Err(err) = snapshot.consume() {
            warn!(error = %err, "snapshot restored but side file could not be removed");
        }
        Ok(true)
    }
}

impl ShareStore for SqliteShareStore {
    fn start(&self) -> Result<()> {
        let mut inner = self.lock()?;
        if inner.conn.is_some() {
            return Ok(());
        }
        if let Some(parent) = self.path.parent() {
            ensure_dir(parent)?;
        }
        info!("Opening SQLite database at {:?}", self.path);
        let conn = Connection::open(&self.path)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        schema::init_schema(&conn)?;

        inner.conn = Some(conn);
        inner.snapshot.adopt_existing();
        Ok(())
    }

    fn stop(&self) -> Result<()> {
        let mut inner = self.lock()?;
        if let Some(conn) = inner.conn.take() {
            conn.close().map_err(|(_, err)| ShareError::Database(err))?;
            info!(path = %self.path.display(), "relational store stopped");
        }
        Ok(())
    }

    fn backend(&self) -> BackendKind {
        BackendKind::Relational
    }

    fn add_share(&self, name: &str, files: &[String]) -> Result<String> {
        if !Share::is_acceptable(name, files) {
            debug!(name, files = files.len(), "rejected share with empty input");
            return Ok(EMPTY_TOKEN.to_string());
        }
        self.with_conn(|conn| {
            for _ in 0..MAX_INSERT_ATTEMPTS {
                let token = self
                    .generator
                    .generate_unique(|candidate| token_exists(conn, candidate))?;
                let share = Share::new(name, token.clone(), files.to_vec());

                let tx = conn.transaction()?;
                match insert_share(&tx, &share) {
                    Ok(()) => {
                        tx.commit()?;
                        debug!(name, files = files.len(), "share added");
                        return Ok(token);
                    }
                    Err(ShareError::Database(err)) if is_unique_violation(&err) => {
                        warn!(token = %token, "token rejected by unique constraint, retrying");
                    }
                    Err(err) => return Err(err),
                }
            }
            Err(ShareError::TokenSpaceExhausted(MAX_INSERT_ATTEMPTS))
        })
    }

    fn get_shares(&self) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT name FROM shares ORDER BY id")?;
            let names = stmt
                .query_map([], |row| row.get(0))?
                .collect::<rusqlite::Result<Vec<String>>>()?;
            Ok(names)
        })
    }

    fn get_share_count(&self) -> Result<usize> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM shares", [], |row| row.get(0))?;
            Ok(count as usize)
        })
    }

    fn get_files(&self, key: &str, key_type: KeyType) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let sql = match key_type {
                KeyType::Token => "SELECT id FROM shares WHERE token = ?1",
                KeyType::ShareName => "SELECT id FROM shares WHERE name = ?1 ORDER BY id LIMIT 1",
            };
            let share_id: Option<i64> = conn
                .query_row(sql, [key], |row| row.get(0))
                .optional()?;
            match share_id {
                Some(id) => files_of(conn, id),
                None => Err(key_type.not_found(key)),
            }
        })
    }

    fn remove_share(&self, name: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let changes = conn.execute(
                "DELETE FROM shares WHERE id = (SELECT id FROM shares WHERE name = ?1 ORDER BY id LIMIT 1)",
                [name],
            )?;
            if changes > 0 {
                debug!(name, "share removed");
            }
            Ok(changes > 0)
        })
    }

    fn backup_and_clear(&self) -> bool {
        match self.try_backup_and_clear() {
            Ok(()) => true,
            Err(err) => {
                warn!(error = %err, "relational backup failed, live store unchanged");
                false
            }
        }
    }

    fn restore(&self) -> bool {
        match self.try_restore() {
            Ok(restored) => restored,
            Err(err) => {
                warn!(error = %err, "relational restore failed, live store unchanged");
                false
            }
        }
    }

    fn has_snapshot(&self) -> bool {
        self.lock()
            .map(|inner| inner.snapshot.is_filled())
            .unwrap_or(false)
    }

    fn export_shares(&self) -> Result<Vec<Share>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT id, token, name, created_at FROM shares ORDER BY id")?;
            let rows = stmt
                .query_map([], |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        Share {
                            token: row.get(1)?,
                            name: row.get(2)?,
                            files: Vec::new(),
                            created_at: row.get(3)?,
                        },
                    ))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            let mut shares = Vec::with_capacity(rows.len());
            for (id, mut share) in rows {
                share.files = files_of(conn, id)?;
                shares.push(share);
            }
            Ok(shares)
        })
    }

    fn import_shares(&self, shares: &[Share]) -> Result<usize> {
        let mut batch = HashSet::new();
        for share in shares {
            share.validate()?;
            if !batch.insert(share.token.as_str()) {
                return Err(ShareError::TokenCollision(share.token.clone()));
            }
        }
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            for share in shares {
                if token_exists(&tx, &share.token)? {
                    return Err(ShareError::TokenCollision(share.token.clone()));
                }
                insert_share(&tx, share)?;
            }
            tx.commit()?;
            Ok(shares.len())
        })
    }
}

/// Writes one share row and its file rows; the caller owns the transaction.
fn insert_share(conn: &Connection, share: &Share) -> Result<()> {
    conn.execute(
        "INSERT INTO shares (token, name, created_at) VALUES (?1, ?2, ?3)",
        params![share.token, share.name, share.created_at],
    )?;
    let share_id = conn.last_insert_rowid();

    let mut stmt =
        conn.prepare("INSERT INTO share_files (share_id, position, path) VALUES (?1, ?2, ?3)")?;
    for (position, path) in share.files.iter().enumerate() {
        stmt.execute(params![share_id, position as i64, path])?;
    }
    Ok(())
}

fn token_exists(conn: &Connection, token: &str) -> Result<bool> {
    let exists = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM shares WHERE token = ?1)",
        [token],
        |row| row.get(0),
    )?;
    Ok(exists)
}

fn files_of(conn: &Connection, share_id: i64) -> Result<Vec<String>> {
    let mut stmt =
        conn.prepare("SELECT path FROM share_files WHERE share_id = ?1 ORDER BY position")?;
    let files = stmt
        .query_map([share_id], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<String>>>()?;
    Ok(files)
}

/// Swaps live rows for the attached snapshot's rows in one transaction.
fn replace_from_snapshot(conn: &mut Connection) -> Result<usize> {
    let tx = conn.transaction()?;
    tx.execute("DELETE FROM main.shares", [])?;
    let restored = tx.execute(
        "INSERT INTO main.shares (id, token, name, created_at)
         SELECT id, token, name, created_at FROM snapshot.shares ORDER BY id",
        [],
    )?;
    tx.execute(
        "INSERT INTO main.share_files (id, share_id, position, path)
         SELECT id, share_id, position, path FROM snapshot.share_files ORDER BY id",
        [],
    )?;
    tx.commit()?;
    Ok(restored)
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(code, _) if code.code == ErrorCode::ConstraintViolation
    )
}

fn clear_shares(conn: &mut Connection) -> Result<usize> {
    let tx = conn.transaction()?;
    let cleared = tx.execute(schema::CLEAR_SQL, [])?;
    tx.commit()?;
    Ok(cleared)
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

    fn store_with_temp_dir() -> (SqliteShareStore, TempDir) {
        let temp = TempDir::new().expect("temp dir");
        let store = SqliteShareStore::open_in(temp.path()).expect("sqlite store");
        (store, temp)
    }

    fn files(paths: &[&str]) -> Vec<String> {
        paths.iter().map(|p| p.to_string()).collect()
    }

    fn file_row_count(store: &SqliteShareStore) -> i64 {
        store
            .with_conn(|conn| {
                Ok(conn.query_row("SELECT COUNT(*) FROM share_files", [], |row| row.get(0))?)
            })
            .expect("count file rows")
    }

    #[test]
    fn add_share_writes_one_row_per_file() {
        let (store, _guard) = store_with_temp_dir();
        store
            .add_share("A Mol", &files(&["record0.flac", "record1.flac", "record2.flac"]))
            .expect("add share");
        assert_eq!(file_row_count(&store), 3);
    }

    #[test]
    fn remove_share_cascades_to_file_rows() {
        let (store, _guard) = store_with_temp_dir();
        store.add_share("qwertz", &files(&["/a", "/b"])).expect("add");
        store.add_share("other", &files(&["/c"])).expect("add");

        assert!(store.remove_share("qwertz").expect("remove"));
        assert_eq!(file_row_count(&store), 1);
    }

    #[test]
    fn duplicate_token_is_rejected_by_constraint() {
        let (store, _guard) = store_with_temp_dir();
        let token = store.add_share("first", &files(&["/a"])).expect("add");

        let clash = Share::new("second", token, files(&["/b"]));
        let result = store.with_conn(|conn| insert_share(conn, &clash));
        match result {
            Err(ShareError::Database(err)) => assert!(is_unique_violation(&err)),
            other => panic!("expected unique violation, got {other:?}"),
        }
        assert_eq!(store.get_share_count().expect("count"), 1);
    }

    #[test]
    fn restore_fails_when_side_file_disappears() {
        let (store, _guard) = store_with_temp_dir();
        store.add_share("Docs", &files(&["/a"])).expect("add");
        assert!(store.backup_and_clear());
        fs::remove_file(store.snapshot_path()).expect("remove snapshot");

        assert!(!store.restore());
        assert_eq!(store.get_share_count().expect("count"), 0);
    }

    #[test]
    fn stop_closes_connection() {
        let (store, _guard) = store_with_temp_dir();
        store.stop().expect("stop");
        assert!(matches!(store.get_shares(), Err(ShareError::NotStarted)));
        store.start().expect("restart");
        assert!(store.get_shares().expect("names").is_empty());
    }
}
