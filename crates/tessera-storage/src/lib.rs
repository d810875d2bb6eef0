//! # Tessera Storage
//!
//! Storage backends for Tessera access codes and sessions.
//!
//! ## Features
//!
//! - **InMemoryAccessCodeStore / InMemoryAccessSessionStore**: `DashMap`-backed,
//!   for tests, simulation, and single-process deployments
//! - **RedbAccessStore**: Persistent implementation of both store traits on a
//!   single redb database
//!
//! Both backends make code consumption a single indivisible step: the
//! in-memory store holds the record's shard lock across check and update,
//! and the redb store performs check and update inside one write
//! transaction (redb serializes writers).
//!
//! ## Example
//!
//! ```rust,ignore
//! use tessera_core::{AccessCodeStore, ConsumeOutcome};
//! use tessera_storage::InMemoryAccessCodeStore;
//!
//! let store = InMemoryAccessCodeStore::new();
//! store.insert_if_absent(code).await?;
//!
//! match store.consume("K7QF-M2ZD-9XHT", chrono::Utc::now()).await? {
//!     ConsumeOutcome::Consumed { code, first_use } => { /* open a session */ }
//!     ConsumeOutcome::Rejected(reason) => { /* render reason */ }
//! }
//! ```

pub mod error;
pub mod memory;
pub mod structured;

// Re-exports
pub use memory::{InMemoryAccessCodeStore, InMemoryAccessSessionStore};
pub use structured::{RedbAccessStore, RedbStorage, RedbStorageConfig};

// Re-export the store traits and error from tessera-core for convenience
pub use tessera_core::{AccessCodeStore, AccessSessionStore, ConsumeOutcome, StorageError};
