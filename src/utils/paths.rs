use std::{
    env, fs,
    path::{Path, PathBuf},
};

use dirs::home_dir;

use crate::errors::Result;

const DEFAULT_DIR_NAME: &str = ".quickshare";
const HOME_ENV: &str = "QUICKSHARE_HOME";
const CONFIG_FILE: &str = "config.json";
const BACKUP_MARKER: &str = "backup";

/// Resolves where the registry keeps its files.
pub struct PathResolver;

impl PathResolver {
    /// Returns the registry data directory, defaulting to `~/.quickshare`.
    pub fn base_dir() -> PathBuf {
        if let Some(custom) = env::var_os(HOME_ENV) {
            return PathBuf::from(custom);
        }
        home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(DEFAULT_DIR_NAME)
    }

    /// Uses `root` when supplied, otherwise [`PathResolver::base_dir`].
    pub fn resolve_base(root: Option<PathBuf>) -> PathBuf {
        root.unwrap_or_else(Self::base_dir)
    }

    pub fn config_file_in(base: &Path) -> PathBuf {
        base.join(CONFIG_FILE)
    }

    /// Fixed side path of the snapshot belonging to `live`.
    ///
    /// `shares.json` maps to `shares.backup.json`, `shares.db` to `shares.backup.db`.
    pub fn snapshot_path_for(live: &Path) -> PathBuf {
        let stem = live
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or("shares");
        let file_name = match live.extension().and_then(|ext| ext.to_str()) {
            Some(ext) => format!("{}.{}.{}", stem, BACKUP_MARKER, ext),
            None => format!("{}.{}", stem, BACKUP_MARKER),
        };
        live.with_file_name(file_name)
    }
}

/// Creates `path` and its parents when missing.
pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)?;
    }
    Ok(())
}
