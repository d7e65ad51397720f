//! Registry configuration and the store factory.

use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    errors::{Result, ShareError},
    storage::{
        json_backend::DEFAULT_DOCUMENT_FILE, sqlite_backend::DEFAULT_DATABASE_FILE, BackendKind,
        JsonShareStore, ShareStore, SqliteShareStore,
    },
    utils::{ensure_dir, persistence, PathResolver},
};

/// Selects and locates the backend a registry runs on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryConfig {
    #[serde(default)]
    pub backend: BackendKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Optional data directory. Defaults to [`PathResolver::base_dir`].
    pub data_dir: Option<PathBuf>,
    #[serde(default = "RegistryConfig::default_document_file")]
    pub document_file: String,
    #[serde(default = "RegistryConfig::default_database_file")]
    pub database_file: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            data_dir: None,
            document_file: Self::default_document_file(),
            database_file: Self::default_database_file(),
        }
    }
}

impl RegistryConfig {
    pub fn default_document_file() -> String {
        DEFAULT_DOCUMENT_FILE.into()
    }

    pub fn default_database_file() -> String {
        DEFAULT_DATABASE_FILE.into()
    }

    /// Configuration for `backend` rooted at `dir`.
    pub fn in_dir(backend: BackendKind, dir: impl Into<PathBuf>) -> Self {
        Self {
            backend,
            data_dir: Some(dir.into()),
            ..Self::default()
        }
    }

    pub fn resolve_data_dir(&self) -> PathBuf {
        PathResolver::resolve_base(self.data_dir.clone())
    }

    /// Live medium of the configured backend.
    pub fn store_path(&self) -> PathBuf {
        let file = match self.backend {
            BackendKind::Document => &self.document_file,
            BackendKind::Relational => &self.database_file,
        };
        self.resolve_data_dir().join(file)
    }

    fn validate(&self) -> Result<()> {
        for (label, file) in [
            ("document_file", &self.document_file),
            ("database_file", &self.database_file),
        ] {
            if file.trim().is_empty() {
                return Err(ShareError::Config(format!("`{}` must not be empty", label)));
            }
            if Path::new(file).components().count() != 1 {
                return Err(ShareError::Config(format!(
                    "`{}` must be a plain file name, got `{}`",
                    label, file
                )));
            }
        }
        Ok(())
    }
}

/// Builds and starts the backend selected by `config`.
pub fn open_store(config: &RegistryConfig) -> Result<Box<dyn ShareStore>> {
    config.validate()?;
    let dir = config.resolve_data_dir();
    ensure_dir(&dir)?;
    let path = config.store_path();
    let store: Box<dyn ShareStore> = match config.backend {
        BackendKind::Document => Box::new(JsonShareStore::new(path)),
        BackendKind::Relational => Box::new(SqliteShareStore::new(path)),
    };
    store.start()?;
    info!(backend = %config.backend, dir = %dir.display(), "share store opened");
    Ok(store)
}

/// Handles persistence of [`RegistryConfig`].
#[derive(Debug, Clone)]
pub struct ConfigManager {
    path: PathBuf,
}

impl ConfigManager {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn with_base_dir(base: &Path) -> Result<Self> {
        ensure_dir(base)?;
        Ok(Self::new(PathResolver::config_file_in(base)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Missing file yields the defaults.
    pub fn load(&self) -> Result<RegistryConfig> {
        if !self.path.exists() {
            return Ok(RegistryConfig::default());
        }
        let data = fs::read_to_string(&self.path)?;
        let config: RegistryConfig = serde_json::from_str(&data)
            .map_err(|err| ShareError::Config(format!("{}: {}", self.path.display(), err)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, config: &RegistryConfig) -> Result<()> {
        config.validate()?;
        persistence::save_json(config, &self.path)
    }
}
