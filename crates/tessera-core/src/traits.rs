//! Core traits for Tessera
//!
//! Storage and collaborator abstractions, so the redemption logic runs
//! unchanged against in-memory test doubles and production backends.
//!
//! ## Key Traits
//!
//! - [`AccessCodeStore`]: Code records, including the atomic consumption step
//! - [`AccessSessionStore`]: Session records created by redemptions
//! - [`ResourceCatalog`]: Resolves a [`ResourceRef`] to content metadata
//! - [`PointerMinter`]: Mints short-lived delegated asset pointers
//! - [`IssuerDirectory`]: Maps issuer credentials to an [`IssuerId`]

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::delegation::DelegatedPointer;
use crate::error::{CollaboratorError, RedeemRejection, StorageError};
use crate::model::{AccessCode, AccessSession, CodeId, IssuerId};
use crate::resource::{AssetLocator, ResourceMetadata, ResourceRef};

/// Result of an atomic consumption attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsumeOutcome {
    /// One unit of capacity was taken
    Consumed {
        /// The record as it stands after the update
        code: AccessCode,
        /// This call anchored the expiry window
        first_use: bool,
    },
    /// The code could not be redeemed; nothing was written
    Rejected(RedeemRejection),
}

/// Storage abstraction for access codes
///
/// Implementations must make [`consume`](Self::consume) indivisible: the
/// state check, the counter increment, and the first-use anchor happen in
/// one step that no concurrent consumer can interleave with.
#[async_trait]
pub trait AccessCodeStore: Send + Sync {
    /// Insert a new code unless its code string was ever used before
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Duplicate`] if the code string is taken,
    /// including by a record the retention sweep already purged.
    async fn insert_if_absent(&self, code: AccessCode) -> Result<(), StorageError>;

    /// Look up a code by record id
    async fn get(&self, id: &CodeId) -> Result<Option<AccessCode>, StorageError>;

    /// Look up a code by its canonical code string
    async fn find_by_code(&self, code: &str) -> Result<Option<AccessCode>, StorageError>;

    /// Atomically consume one unit of capacity from the code at `now`
    ///
    /// Unknown codes yield `Rejected(NotFound)`.
    async fn consume(&self, code: &str, now: DateTime<Utc>)
    -> Result<ConsumeOutcome, StorageError>;

    /// Set the invalidated flag, returning the updated record
    ///
    /// Returns `None` if the code does not exist.
    async fn invalidate(&self, id: &CodeId) -> Result<Option<AccessCode>, StorageError>;

    /// Delete codes whose effective expiry is before `cutoff`
    ///
    /// Returns the number of records removed.
    async fn purge_expired_before(&self, cutoff: DateTime<Utc>) -> Result<usize, StorageError>;
}

/// Storage abstraction for access sessions
#[async_trait]
pub trait AccessSessionStore: Send + Sync {
    /// Persist a newly opened session
    async fn insert(&self, session: AccessSession) -> Result<(), StorageError>;

    /// Look up a session by its token
    async fn get_by_token(&self, token: &str) -> Result<Option<AccessSession>, StorageError>;

    /// All sessions opened from a code
    async fn list_for_code(&self, code_id: &CodeId) -> Result<Vec<AccessSession>, StorageError>;

    /// Mark every live session of a code revoked
    ///
    /// Returns the number of sessions newly revoked.
    async fn revoke_for_code(
        &self,
        code_id: &CodeId,
        at: DateTime<Utc>,
    ) -> Result<usize, StorageError>;

    /// Delete sessions that expired before `cutoff`
    async fn purge_expired_before(&self, cutoff: DateTime<Utc>) -> Result<usize, StorageError>;
}

/// Resource metadata lookup owned by the content system
#[async_trait]
pub trait ResourceCatalog: Send + Sync {
    /// Resolve a resource, or `None` if it no longer exists
    async fn resolve(
        &self,
        resource: &ResourceRef,
    ) -> Result<Option<ResourceMetadata>, CollaboratorError>;
}

/// Object-storage pointer minting
#[async_trait]
pub trait PointerMinter: Send + Sync {
    /// Mint a pointer to `asset` valid until `expires_at`
    async fn mint(
        &self,
        asset: &AssetLocator,
        expires_at: DateTime<Utc>,
    ) -> Result<DelegatedPointer, CollaboratorError>;
}

/// Issuer identity lookup
#[async_trait]
pub trait IssuerDirectory: Send + Sync {
    /// Resolve a presented credential to an issuer, or `None` if unknown
    async fn authenticate(&self, credential: &str) -> Result<Option<IssuerId>, CollaboratorError>;
}
