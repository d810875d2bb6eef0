//! Persistent code and session store
//!
//! Every mutation runs inside one redb write transaction. Because redb
//! admits a single writer at a time, reading a code, applying
//! `try_consume`, and writing it back cannot interleave with another
//! redemption of the same code.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redb::{ReadableTable, WriteTransaction};
use tracing::{debug, trace};

use tessera_core::code::redact;
use tessera_core::{
    AccessCode, AccessCodeStore, AccessSession, AccessSessionStore, CodeId, ConsumeOutcome,
    RedeemRejection, StorageError,
};

use super::tables::{
    CODE_INDEX, CODES, RETIRED_CODES, RedbStorage, RedbStorageConfig, SESSIONS,
    SESSIONS_BY_CODE, session_index_key,
};
use crate::error::{db_err, decode, encode};

const EMPTY: &[u8] = &[];

/// redb-backed implementation of both store traits
#[derive(Clone)]
pub struct RedbAccessStore {
    storage: Arc<RedbStorage>,
}

impl RedbAccessStore {
    /// Create a store on an already opened database
    pub fn new(storage: Arc<RedbStorage>) -> Self {
        Self { storage }
    }

    /// Open or create the database and wrap it
    pub fn open(config: RedbStorageConfig) -> Result<Self, StorageError> {
        Ok(Self::new(Arc::new(RedbStorage::open(config)?)))
    }

    /// Get a reference to the underlying storage
    pub fn storage(&self) -> &RedbStorage {
        &self.storage
    }
}

fn read_code<T>(table: &T, id: &[u8]) -> Result<Option<AccessCode>, StorageError>
where
    T: ReadableTable<&'static [u8], &'static [u8]>,
{
    match table.get(id).map_err(db_err)? {
        Some(value) => decode(value.value()).map(Some),
        None => Ok(None),
    }
}

fn read_session<T>(table: &T, token: &str) -> Result<Option<AccessSession>, StorageError>
where
    T: ReadableTable<&'static [u8], &'static [u8]>,
{
    match table.get(token.as_bytes()).map_err(db_err)? {
        Some(value) => decode(value.value()).map(Some),
        None => Ok(None),
    }
}

/// Tokens of every session opened from `code_id`
fn tokens_for_code<T>(index: &T, code_id: &CodeId) -> Result<Vec<String>, StorageError>
where
    T: ReadableTable<&'static [u8], &'static [u8]>,
{
    let prefix: &[u8] = code_id.as_bytes();
    let mut tokens = Vec::new();

    for entry in index.range(prefix..).map_err(db_err)? {
        let (key, _) = entry.map_err(db_err)?;
        let key_bytes = key.value();

        // Stop when we're past the prefix
        if !key_bytes.starts_with(prefix) {
            break;
        }

        let token = std::str::from_utf8(&key_bytes[prefix.len()..])
            .map_err(|e| StorageError::Deserialization(e.to_string()))?;
        tokens.push(token.to_string());
    }

    Ok(tokens)
}

/// Returns false when the code string is already taken
fn insert_in(txn: &WriteTransaction, code: &AccessCode) -> Result<bool, StorageError> {
    let key = code.code.as_bytes();
    let mut index = txn.open_table(CODE_INDEX).map_err(db_err)?;
    let retired = txn.open_table(RETIRED_CODES).map_err(db_err)?;

    if index.get(key).map_err(db_err)?.is_some() || retired.get(key).map_err(db_err)?.is_some() {
        return Ok(false);
    }

    let id = code.id.as_bytes().as_slice();
    index.insert(key, id).map_err(db_err)?;

    let mut codes = txn.open_table(CODES).map_err(db_err)?;
    codes.insert(id, encode(code)?.as_slice()).map_err(db_err)?;
    Ok(true)
}

fn consume_in(
    txn: &WriteTransaction,
    code: &str,
    now: DateTime<Utc>,
) -> Result<ConsumeOutcome, StorageError> {
    let index = txn.open_table(CODE_INDEX).map_err(db_err)?;
    let id = match index.get(code.as_bytes()).map_err(db_err)? {
        Some(value) => value.value().to_vec(),
        None => return Ok(ConsumeOutcome::Rejected(RedeemRejection::NotFound)),
    };

    let mut codes = txn.open_table(CODES).map_err(db_err)?;
    let Some(mut record) = read_code(&codes, &id)? else {
        return Ok(ConsumeOutcome::Rejected(RedeemRejection::NotFound));
    };

    match record.try_consume(now) {
        Ok(consumption) => {
            codes
                .insert(id.as_slice(), encode(&record)?.as_slice())
                .map_err(db_err)?;
            Ok(ConsumeOutcome::Consumed {
                code: record,
                first_use: consumption.first_use,
            })
        }
        Err(rejection) => Ok(ConsumeOutcome::Rejected(rejection)),
    }
}

#[async_trait]
impl AccessCodeStore for RedbAccessStore {
    async fn insert_if_absent(&self, code: AccessCode) -> Result<(), StorageError> {
        let txn = self.storage.begin_write()?;
        if insert_in(&txn, &code)? {
            txn.commit().map_err(db_err)?;
            trace!(code_id = %code.id, "Stored access code");
            Ok(())
        } else {
            txn.abort().map_err(db_err)?;
            Err(StorageError::Duplicate(redact(&code.code)))
        }
    }

    async fn get(&self, id: &CodeId) -> Result<Option<AccessCode>, StorageError> {
        let txn = self.storage.begin_read()?;
        let codes = txn.open_table(CODES).map_err(db_err)?;
        read_code(&codes, id.as_bytes())
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<AccessCode>, StorageError> {
        let txn = self.storage.begin_read()?;
        let index = txn.open_table(CODE_INDEX).map_err(db_err)?;
        let id = match index.get(code.as_bytes()).map_err(db_err)? {
            Some(value) => value.value().to_vec(),
            None => return Ok(None),
        };
        let codes = txn.open_table(CODES).map_err(db_err)?;
        read_code(&codes, &id)
    }

    async fn consume(
        &self,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<ConsumeOutcome, StorageError> {
        let txn = self.storage.begin_write()?;
        let outcome = consume_in(&txn, code, now)?;
        match outcome {
            ConsumeOutcome::Consumed { .. } => txn.commit().map_err(db_err)?,
            ConsumeOutcome::Rejected(_) => txn.abort().map_err(db_err)?,
        }
        Ok(outcome)
    }

    async fn invalidate(&self, id: &CodeId) -> Result<Option<AccessCode>, StorageError> {
        let txn = self.storage.begin_write()?;
        let updated = {
            let mut codes = txn.open_table(CODES).map_err(db_err)?;
            match read_code(&codes, id.as_bytes())? {
                Some(mut record) => {
                    record.invalidate();
                    codes
                        .insert(id.as_bytes().as_slice(), encode(&record)?.as_slice())
                        .map_err(db_err)?;
                    Some(record)
                }
                None => None,
            }
        };
        txn.commit().map_err(db_err)?;
        Ok(updated)
    }

    async fn purge_expired_before(&self, cutoff: DateTime<Utc>) -> Result<usize, StorageError> {
        let txn = self.storage.begin_write()?;
        let purged = {
            let mut codes = txn.open_table(CODES).map_err(db_err)?;
            let mut index = txn.open_table(CODE_INDEX).map_err(db_err)?;
            let mut retired = txn.open_table(RETIRED_CODES).map_err(db_err)?;

            let mut doomed = Vec::new();
            for entry in codes.iter().map_err(db_err)? {
                let (_, value) = entry.map_err(db_err)?;
                let record: AccessCode = decode(value.value())?;
                if record.is_purgeable(cutoff) {
                    doomed.push(record);
                }
            }

            for record in &doomed {
                let code_key = record.code.as_bytes();
                retired.insert(code_key, EMPTY).map_err(db_err)?;
                index.remove(code_key).map_err(db_err)?;
                codes
                    .remove(record.id.as_bytes().as_slice())
                    .map_err(db_err)?;
            }
            doomed.len()
        };
        txn.commit().map_err(db_err)?;

        if purged > 0 {
            debug!(purged, cutoff = %cutoff, "Purged expired access codes");
        }
        Ok(purged)
    }
}

#[async_trait]
impl AccessSessionStore for RedbAccessStore {
    async fn insert(&self, session: AccessSession) -> Result<(), StorageError> {
        let txn = self.storage.begin_write()?;
        {
            let token = session.token.as_str();
            let mut sessions = txn.open_table(SESSIONS).map_err(db_err)?;
            sessions
                .insert(token.as_bytes(), encode(&session)?.as_slice())
                .map_err(db_err)?;

            let mut by_code = txn.open_table(SESSIONS_BY_CODE).map_err(db_err)?;
            let key = session_index_key(session.code_id.as_bytes(), token);
            by_code.insert(key.as_slice(), EMPTY).map_err(db_err)?;
        }
        txn.commit().map_err(db_err)?;
        trace!(session_id = %session.id, code_id = %session.code_id, "Stored session");
        Ok(())
    }

    async fn get_by_token(&self, token: &str) -> Result<Option<AccessSession>, StorageError> {
        let txn = self.storage.begin_read()?;
        let sessions = txn.open_table(SESSIONS).map_err(db_err)?;
        read_session(&sessions, token)
    }

    async fn list_for_code(&self, code_id: &CodeId) -> Result<Vec<AccessSession>, StorageError> {
        let txn = self.storage.begin_read()?;
        let by_code = txn.open_table(SESSIONS_BY_CODE).map_err(db_err)?;
        let sessions = txn.open_table(SESSIONS).map_err(db_err)?;

        let mut found = Vec::new();
        for token in tokens_for_code(&by_code, code_id)? {
            if let Some(session) = read_session(&sessions, &token)? {
                found.push(session);
            }
        }
        Ok(found)
    }

    async fn revoke_for_code(
        &self,
        code_id: &CodeId,
        at: DateTime<Utc>,
    ) -> Result<usize, StorageError> {
        let txn = self.storage.begin_write()?;
        let revoked = {
            let by_code = txn.open_table(SESSIONS_BY_CODE).map_err(db_err)?;
            let mut sessions = txn.open_table(SESSIONS).map_err(db_err)?;

            let mut revoked = 0;
            for token in tokens_for_code(&by_code, code_id)? {
                let Some(mut session) = read_session(&sessions, &token)? else {
                    continue;
                };
                if session.revoked_at.is_some() {
                    continue;
                }
                session.revoked_at = Some(at);
                sessions
                    .insert(token.as_bytes(), encode(&session)?.as_slice())
                    .map_err(db_err)?;
                revoked += 1;
            }
            revoked
        };
        txn.commit().map_err(db_err)?;
        Ok(revoked)
    }

    async fn purge_expired_before(&self, cutoff: DateTime<Utc>) -> Result<usize, StorageError> {
        let txn = self.storage.begin_write()?;
        let purged = {
            let mut sessions = txn.open_table(SESSIONS).map_err(db_err)?;
            let mut by_code = txn.open_table(SESSIONS_BY_CODE).map_err(db_err)?;

            let mut doomed = Vec::new();
            for entry in sessions.iter().map_err(db_err)? {
                let (_, value) = entry.map_err(db_err)?;
                let session: AccessSession = decode(value.value())?;
                if session.is_purgeable(cutoff) {
                    doomed.push(session);
                }
            }

            for session in &doomed {
                let token = session.token.as_str();
                sessions.remove(token.as_bytes()).map_err(db_err)?;
                let key = session_index_key(session.code_id.as_bytes(), token);
                by_code.remove(key.as_slice()).map_err(db_err)?;
            }
            doomed.len()
        };
        txn.commit().map_err(db_err)?;

        if purged > 0 {
            debug!(purged, cutoff = %cutoff, "Purged expired sessions");
        }
        Ok(purged)
    }
}
