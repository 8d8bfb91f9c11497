//! Normalizer configuration, persisted as TOML.
//!
//! ```toml
//! [store]
//! backend = "redb"
//! path = "/var/lib/node-norm"
//!
//! [ingest]
//! block_size = 1000
//! parallel = true
//!
//! [hierarchy]
//! source = "builtin"
//!
//! [resolve]
//! eq_batch_size = 2500
//! demote_labels_longer_than = 15
//!
//! [resolve.preferred_name_boost_prefixes]
//! "biolink:ChemicalEntity" = ["DRUGBANK", "CHEBI"]
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::hierarchy::remote::DEFAULT_TIMEOUT_SECS;
use crate::ingest::IngestConfig;
use crate::resolve::ResolveConfig;

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Which [`KeyValueStore`](crate::store::KeyValueStore) backend to open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// In-process maps. Nothing survives a restart.
    #[default]
    Memory,
    /// redb database under `store.path`.
    Redb,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    /// Data directory for the redb backend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

/// Where ancestor chains come from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HierarchySource {
    /// Biolink category table compiled into the binary.
    #[default]
    Builtin,
    /// TOML or JSON type table at `hierarchy.path`.
    File,
    /// HTTP ontology service at `hierarchy.endpoint`.
    Remote,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HierarchyConfig {
    #[serde(default)]
    pub source: HierarchySource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl Default for HierarchyConfig {
    fn default() -> Self {
        Self {
            source: HierarchySource::Builtin,
            path: None,
            endpoint: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

fn default_bind() -> String {
    "0.0.0.0:8080".into()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

/// Top-level configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub hierarchy: HierarchyConfig,
    #[serde(default)]
    pub resolve: ResolveConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

impl NormConfig {
    /// Load from a TOML file.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_toml_str(&content).map_err(|e| match e {
            ConfigError::Parse { message, .. } => ConfigError::Parse {
                path: path.display().to_string(),
                message,
            },
            other => other,
        })
    }

    /// Load `path` if it exists, the defaults otherwise.
    pub fn load_or_default(path: &Path) -> ConfigResult<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            Ok(Self::default())
        }
    }

    /// Parse without cross-field checks; CLI overrides are applied before [`validate`](Self::validate).
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: "<inline>".into(),
            message: e.to_string(),
        })
    }

    /// Save to a TOML file, creating parent directories.
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let content = self.to_toml()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
        std::fs::write(path, content).map_err(|e| ConfigError::Write {
            path: path.display().to_string(),
            source: e,
        })
    }

    pub fn to_toml(&self) -> ConfigResult<String> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Invalid {
            message: format!("config cannot be serialized: {e}"),
        })
    }

    /// Cross-field checks serde cannot express.
    pub fn validate(&self) -> ConfigResult<()> {
        let invalid = |message: &str| {
            Err(ConfigError::Invalid {
                message: message.to_string(),
            })
        };
        if self.store.backend == StoreBackend::Redb && self.store.path.is_none() {
            return invalid("store.backend = \"redb\" needs store.path (or --data-dir)");
        }
        match self.hierarchy.source {
            HierarchySource::File if self.hierarchy.path.is_none() => {
                return invalid("hierarchy.source = \"file\" needs hierarchy.path");
            }
            HierarchySource::Remote if self.hierarchy.endpoint.is_none() => {
                return invalid("hierarchy.source = \"remote\" needs hierarchy.endpoint");
            }
            _ => {}
        }
        if self.ingest.block_size == 0 {
            return invalid("ingest.block_size must be at least 1");
        }
        if self.resolve.eq_batch_size == 0 {
            return invalid("resolve.eq_batch_size must be at least 1");
        }
        Ok(())
    }

    /// Point the store at `dir` and switch to the durable backend.
    pub fn with_data_dir(mut self, dir: PathBuf) -> Self {
        self.store.backend = StoreBackend::Redb;
        self.store.path = Some(dir);
        self
    }
}
