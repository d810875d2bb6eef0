//! # Tessera Core
//!
//! Core types, traits, and errors for Tessera: timed, limited-use access
//! codes that grant temporary, capped access to a piece of semi-public
//! content without requiring the recipient to hold an account.
//!
//! This crate holds everything that does not depend on a particular storage
//! backend or transport, so the same redemption rules run against the
//! in-memory stores used in tests and the persistent stores used in
//! production.
//!
//! ## Key Types
//!
//! - [`AccessCode`]: A distributable code with a capacity and an expiry window
//! - [`AccessSession`]: The session created by one successful redemption
//! - [`CodeState`]: The computed lifecycle state of a code
//! - [`ResourceRef`]: Pointer to the gated content, tagged by [`ResourceKind`]
//!
//! ## Key Traits
//!
//! - [`AccessCodeStore`] / [`AccessSessionStore`]: Pluggable persistence
//! - [`ResourceCatalog`], [`PointerMinter`], [`IssuerDirectory`]: External collaborators
//! - [`Clock`]: Time abstraction for testability

pub mod catalog;
pub mod clock;
pub mod code;
pub mod delegation;
pub mod error;
pub mod model;
pub mod policy;
pub mod resource;
pub mod traits;

// Re-export main types
pub use catalog::{InMemoryIssuerDirectory, InMemoryResourceCatalog};
pub use clock::{Clock, ManualClock, SystemClock};
pub use code::{CODE_ALPHABET, CodeFormat};
pub use delegation::{DelegatedPointer, SignedUrlMinter};
pub use error::{AccessError, AccessResult, CollaboratorError, RedeemRejection, StorageError};
pub use model::*;
pub use policy::{AccessPolicy, DeviceBinding};
pub use resource::{AssetLocator, ResourceKind, ResourceMetadata, ResourceRef};
pub use traits::*;
