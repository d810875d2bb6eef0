//! Server configuration
//!
//! Loaded from a TOML file; every section is optional and falls back to
//! its defaults. CLI flags override individual values after loading.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tessera_core::{
    AccessPolicy, AssetLocator, ResourceKind, ResourceMetadata, ResourceRef, SignedUrlMinter,
    StorageError,
};
use tessera_logging::LogConfig;

/// Shortest issuer API key the server accepts
const MIN_API_KEY_LEN: usize = 16;

/// Errors loading or validating configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),

    #[error("failed to open storage: {0}")]
    Storage(#[from] StorageError),
}

/// Where access codes and sessions are kept
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StorageConfig {
    /// Process-local maps, lost on restart
    #[default]
    Memory,
    /// Embedded redb database file
    Redb { path: PathBuf },
}

/// API key granted to an issuer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuerEntry {
    pub api_key: String,
    pub issuer_id: String,
}

/// Static catalog entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceEntry {
    pub kind: ResourceKind,
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub link_url: Option<String>,
    #[serde(default)]
    pub asset: Option<AssetLocator>,
}

impl ResourceEntry {
    pub fn resource_ref(&self) -> ResourceRef {
        ResourceRef::new(self.kind, self.id.clone())
    }

    pub fn metadata(&self) -> ResourceMetadata {
        ResourceMetadata {
            title: self.title.clone(),
            description: self.description.clone(),
            link_url: self.link_url.clone(),
            asset: self.asset.clone(),
        }
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind the HTTP listener to
    pub bind: SocketAddr,

    /// Storage backend
    pub storage: StorageConfig,

    /// Hex-encoded 32-byte key for signing asset pointers
    pub signing_key_hex: String,

    /// Base URL of the asset host that verifies signed pointers
    pub asset_base_url: String,

    /// Access-code policy
    pub policy: AccessPolicy,

    /// Logging configuration
    pub logging: LogConfig,

    /// Issuer API keys
    pub issuers: Vec<IssuerEntry>,

    /// Catalog of gateable resources
    pub resources: Vec<ResourceEntry>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 8080)),
            storage: StorageConfig::default(),
            signing_key_hex: String::new(),
            asset_base_url: "http://127.0.0.1:9000".to_string(),
            policy: AccessPolicy::default(),
            logging: LogConfig::default(),
            issuers: Vec::new(),
            resources: Vec::new(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&contents)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    /// Override the bind address
    pub fn with_bind(mut self, bind: SocketAddr) -> Self {
        self.bind = bind;
        self
    }

    /// Switch to the redb backend at `path`
    pub fn with_db(mut self, path: impl Into<PathBuf>) -> Self {
        self.storage = StorageConfig::Redb { path: path.into() };
        self
    }

    /// Override the default log level
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.logging.default_level = level.into();
        self
    }

    /// Build the asset pointer minter from the configured key
    pub fn minter(&self) -> Result<SignedUrlMinter, ConfigError> {
        SignedUrlMinter::from_hex(self.asset_base_url.clone(), &self.signing_key_hex)
            .map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    /// Check the configuration before starting
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.signing_key_hex.trim().is_empty() {
            return Err(ConfigError::Invalid("signing_key_hex is required".into()));
        }
        self.minter()?;

        if !(self.asset_base_url.starts_with("http://") || self.asset_base_url.starts_with("https://"))
        {
            return Err(ConfigError::Invalid(format!(
                "asset_base_url must be an http(s) URL, got {:?}",
                self.asset_base_url
            )));
        }

        self.policy.validate().map_err(ConfigError::Invalid)?;

        let mut keys = HashSet::new();
        for issuer in &self.issuers {
            if issuer.issuer_id.trim().is_empty() {
                return Err(ConfigError::Invalid("issuer_id must not be empty".into()));
            }
            if issuer.api_key.len() < MIN_API_KEY_LEN {
                return Err(ConfigError::Invalid(format!(
                    "api_key for issuer {} must be at least {MIN_API_KEY_LEN} characters",
                    issuer.issuer_id
                )));
            }
            if !keys.insert(issuer.api_key.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "api_key for issuer {} is already assigned",
                    issuer.issuer_id
                )));
            }
        }

        let mut resources = HashSet::new();
        for entry in &self.resources {
            if !resources.insert(entry.resource_ref()) {
                return Err(ConfigError::Invalid(format!(
                    "resource {} is listed twice",
                    entry.resource_ref()
                )));
            }
        }

        Ok(())
    }
}
