//! redb table definitions and storage manager
//!
//! Defines all tables used for structured storage.

use std::path::PathBuf;
use std::sync::Arc;

use redb::{Database, ReadTransaction, TableDefinition, WriteTransaction};
use tracing::{debug, info, instrument};

use crate::error::db_err;
use tessera_core::StorageError;

// Table definitions
// Key: code id bytes (16), Value: serialized AccessCode
pub const CODES: TableDefinition<&[u8], &[u8]> = TableDefinition::new("codes");

// Key: canonical code string, Value: code id bytes
pub const CODE_INDEX: TableDefinition<&[u8], &[u8]> = TableDefinition::new("code_index");

// Key: canonical code string of a purged code, Value: empty
pub const RETIRED_CODES: TableDefinition<&[u8], &[u8]> = TableDefinition::new("retired_codes");

// Key: session token, Value: serialized AccessSession
pub const SESSIONS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("sessions");

// Key: (code id, session token) concatenated, Value: empty
pub const SESSIONS_BY_CODE: TableDefinition<&[u8], &[u8]> =
    TableDefinition::new("sessions_by_code");

/// Configuration for redb storage
#[derive(Debug, Clone)]
pub struct RedbStorageConfig {
    /// Path to the database file
    pub db_path: PathBuf,
}

impl Default for RedbStorageConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("./data/tessera.redb"),
        }
    }
}

impl RedbStorageConfig {
    pub fn with_path(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
        }
    }
}

/// Main redb storage manager
pub struct RedbStorage {
    db: Arc<Database>,
    config: RedbStorageConfig,
}

impl RedbStorage {
    /// Open or create the database
    #[instrument(skip(config), fields(path = %config.db_path.display()))]
    pub fn open(config: RedbStorageConfig) -> Result<Self, StorageError> {
        // Ensure parent directory exists
        if let Some(parent) = config.db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StorageError::Io(e.to_string()))?;
        }

        let db = Database::create(&config.db_path).map_err(db_err)?;

        info!("Opened redb database");

        let storage = Self {
            db: Arc::new(db),
            config,
        };

        // Initialize tables
        storage.init_tables()?;

        Ok(storage)
    }

    /// Initialize all tables
    fn init_tables(&self) -> Result<(), StorageError> {
        let write_txn = self.begin_write()?;

        // Create tables if they don't exist
        for table in [CODES, CODE_INDEX, RETIRED_CODES, SESSIONS, SESSIONS_BY_CODE] {
            write_txn.open_table(table).map_err(db_err)?;
        }

        write_txn.commit().map_err(db_err)?;

        debug!("Initialized redb tables");
        Ok(())
    }

    /// Start a write transaction
    ///
    /// redb admits one writer at a time; everything done inside the
    /// returned transaction is atomic with respect to other writers.
    pub fn begin_write(&self) -> Result<WriteTransaction, StorageError> {
        self.db.begin_write().map_err(db_err)
    }

    /// Start a read transaction on a consistent snapshot
    pub fn begin_read(&self) -> Result<ReadTransaction, StorageError> {
        self.db.begin_read().map_err(db_err)
    }

    /// Get the configuration
    pub fn config(&self) -> &RedbStorageConfig {
        &self.config
    }
}

/// Key for the session-by-code index
pub(crate) fn session_index_key(code_id: &[u8; 16], token: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(16 + token.len());
    key.extend_from_slice(code_id);
    key.extend_from_slice(token.as_bytes());
    key
}
