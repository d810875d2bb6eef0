//! In-memory collaborator implementations
//!
//! Backed by `DashMap`. The server seeds these from its configuration
//! file; tests seed them directly.

use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::CollaboratorError;
use crate::model::IssuerId;
use crate::resource::{ResourceMetadata, ResourceRef};
use crate::traits::{IssuerDirectory, ResourceCatalog};

/// Resource catalog holding metadata in memory
#[derive(Debug, Default)]
pub struct InMemoryResourceCatalog {
    resources: DashMap<ResourceRef, ResourceMetadata>,
}

impl InMemoryResourceCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a resource
    pub fn insert(&self, resource: ResourceRef, metadata: ResourceMetadata) {
        self.resources.insert(resource, metadata);
    }

    /// Remove a resource, simulating deletion by the content system
    pub fn remove(&self, resource: &ResourceRef) -> Option<ResourceMetadata> {
        self.resources.remove(resource).map(|(_, m)| m)
    }

    pub fn contains(&self, resource: &ResourceRef) -> bool {
        self.resources.contains_key(resource)
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

#[async_trait]
impl ResourceCatalog for InMemoryResourceCatalog {
    async fn resolve(
        &self,
        resource: &ResourceRef,
    ) -> Result<Option<ResourceMetadata>, CollaboratorError> {
        Ok(self.resources.get(resource).map(|m| m.clone()))
    }
}

/// Issuer directory keyed by API key
///
/// Keys are held as BLAKE3 digests, never in the clear.
#[derive(Debug, Default)]
pub struct InMemoryIssuerDirectory {
    issuers: DashMap<[u8; 32], IssuerId>,
}

impl InMemoryIssuerDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    fn digest(api_key: &str) -> [u8; 32] {
        *blake3::hash(api_key.as_bytes()).as_bytes()
    }

    /// Register an API key for an issuer
    pub fn register(&self, api_key: &str, issuer: IssuerId) {
        self.issuers.insert(Self::digest(api_key), issuer);
    }

    pub fn len(&self) -> usize {
        self.issuers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.issuers.is_empty()
    }
}

#[async_trait]
impl IssuerDirectory for InMemoryIssuerDirectory {
    async fn authenticate(&self, credential: &str) -> Result<Option<IssuerId>, CollaboratorError> {
        Ok(self
            .issuers
            .get(&Self::digest(credential))
            .map(|issuer| issuer.clone()))
    }
}
