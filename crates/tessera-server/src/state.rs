//! Shared application state

use std::sync::Arc;

use tessera_core::{InMemoryIssuerDirectory, InMemoryResourceCatalog, IssuerDirectory, IssuerId};
use tessera_service::AccessService;
use tessera_storage::{
    InMemoryAccessCodeStore, InMemoryAccessSessionStore, RedbAccessStore, RedbStorageConfig,
};
use tracing::info;

use crate::config::{ConfigError, ServerConfig, StorageConfig};

/// State handed to every request handler
pub struct AppState {
    pub service: Arc<AccessService>,
    pub issuers: Arc<dyn IssuerDirectory>,
}

impl AppState {
    pub fn new(service: Arc<AccessService>, issuers: Arc<dyn IssuerDirectory>) -> Self {
        Self { service, issuers }
    }

    /// Wire stores, catalog, minter, and issuer directory from configuration
    pub fn from_config(config: &ServerConfig) -> Result<Self, ConfigError> {
        let catalog = InMemoryResourceCatalog::new();
        for entry in &config.resources {
            catalog.insert(entry.resource_ref(), entry.metadata());
        }

        let issuers = InMemoryIssuerDirectory::new();
        for entry in &config.issuers {
            issuers.register(&entry.api_key, IssuerId::new(entry.issuer_id.clone()));
        }

        let minter = config.minter()?;

        let service = match &config.storage {
            StorageConfig::Memory => AccessService::new(
                Arc::new(InMemoryAccessCodeStore::new()),
                Arc::new(InMemoryAccessSessionStore::new()),
                Arc::new(catalog),
                Arc::new(minter),
                config.policy.clone(),
            ),
            StorageConfig::Redb { path } => {
                let store = Arc::new(RedbAccessStore::open(RedbStorageConfig::with_path(
                    path.clone(),
                ))?);
                AccessService::new(
                    store.clone(),
                    store,
                    Arc::new(catalog),
                    Arc::new(minter),
                    config.policy.clone(),
                )
            }
        };

        info!(
            storage = ?config.storage,
            resources = config.resources.len(),
            issuers = config.issuers.len(),
            "Application state ready"
        );

        Ok(Self::new(Arc::new(service), Arc::new(issuers)))
    }
}
