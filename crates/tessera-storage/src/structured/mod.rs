//! Structured storage using redb
//!
//! Provides the persistent backend for codes and sessions. All tables are
//! raw byte tables holding postcard-encoded records.

mod access_store;
mod tables;

pub use access_store::RedbAccessStore;
pub use tables::{RedbStorage, RedbStorageConfig};
