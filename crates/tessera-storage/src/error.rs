//! Error conversions for storage backends
//!
//! The error type itself lives in `tessera-core` so the store traits can
//! name it; this module maps backend failures onto it.

use std::fmt::Display;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tessera_core::StorageError;

/// Map any redb failure to a (transient) database error
pub(crate) fn db_err(err: impl Display) -> StorageError {
    StorageError::Database(err.to_string())
}

/// Encode a record for a redb value column
pub(crate) fn encode<T: Serialize>(record: &T) -> Result<Vec<u8>, StorageError> {
    postcard::to_allocvec(record).map_err(|e| StorageError::Serialization(e.to_string()))
}

/// Decode a record from a redb value column
pub(crate) fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, StorageError> {
    postcard::from_bytes(bytes).map_err(|e| StorageError::Deserialization(e.to_string()))
}
