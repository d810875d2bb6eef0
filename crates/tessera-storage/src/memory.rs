//! In-memory storage implementations
//!
//! This module provides `DashMap`-backed implementations of the store
//! traits, suitable for testing, simulation, and single-process servers.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::{DashMap, DashSet};
use tracing::{debug, trace};

use tessera_core::code::redact;
use tessera_core::{
    AccessCode, AccessCodeStore, AccessSession, AccessSessionStore, CodeId, ConsumeOutcome,
    RedeemRejection, StorageError,
};

/// In-memory implementation of AccessCodeStore
///
/// Consumption holds the record's `DashMap` shard lock for the whole
/// check-and-update, so concurrent redeemers of the same code serialize.
#[derive(Debug, Default)]
pub struct InMemoryAccessCodeStore {
    /// Records by id
    codes: DashMap<CodeId, AccessCode>,
    /// Index: canonical code string -> id
    by_code: DashMap<String, CodeId>,
    /// Code strings of purged records, never handed out again
    retired: DashSet<String>,
}

impl InMemoryAccessCodeStore {
    /// Create a new in-memory code store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live records
    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    /// Number of purged code strings kept as tombstones
    pub fn retired_count(&self) -> usize {
        self.retired.len()
    }
}

#[async_trait]
impl AccessCodeStore for InMemoryAccessCodeStore {
    async fn insert_if_absent(&self, code: AccessCode) -> Result<(), StorageError> {
        // The index entry lock guards the uniqueness check
        match self.by_code.entry(code.code.clone()) {
            Entry::Occupied(_) => Err(StorageError::Duplicate(redact(&code.code))),
            Entry::Vacant(slot) => {
                if self.retired.contains(&code.code) {
                    return Err(StorageError::Duplicate(redact(&code.code)));
                }
                trace!(code_id = %code.id, "Storing access code");
                slot.insert(code.id);
                self.codes.insert(code.id, code);
                Ok(())
            }
        }
    }

    async fn get(&self, id: &CodeId) -> Result<Option<AccessCode>, StorageError> {
        Ok(self.codes.get(id).map(|c| c.clone()))
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<AccessCode>, StorageError> {
        let Some(id) = self.by_code.get(code).map(|e| *e.value()) else {
            return Ok(None);
        };
        Ok(self.codes.get(&id).map(|c| c.clone()))
    }

    async fn consume(
        &self,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<ConsumeOutcome, StorageError> {
        let Some(id) = self.by_code.get(code).map(|e| *e.value()) else {
            return Ok(ConsumeOutcome::Rejected(RedeemRejection::NotFound));
        };

        // Purged between the index read and here
        let Some(mut record) = self.codes.get_mut(&id) else {
            return Ok(ConsumeOutcome::Rejected(RedeemRejection::NotFound));
        };

        match record.try_consume(now) {
            Ok(consumption) => Ok(ConsumeOutcome::Consumed {
                code: record.clone(),
                first_use: consumption.first_use,
            }),
            Err(rejection) => Ok(ConsumeOutcome::Rejected(rejection)),
        }
    }

    async fn invalidate(&self, id: &CodeId) -> Result<Option<AccessCode>, StorageError> {
        Ok(self.codes.get_mut(id).map(|mut record| {
            record.invalidate();
            record.clone()
        }))
    }

    async fn purge_expired_before(&self, cutoff: DateTime<Utc>) -> Result<usize, StorageError> {
        let doomed: Vec<(CodeId, String)> = self
            .codes
            .iter()
            .filter(|entry| entry.is_purgeable(cutoff))
            .map(|entry| (entry.id, entry.code.clone()))
            .collect();

        let mut purged = 0;
        for (id, code) in doomed {
            // Tombstone before unindexing so a racing insert sees one or the other
            self.retired.insert(code.clone());
            self.by_code.remove(&code);
            if self.codes.remove(&id).is_some() {
                purged += 1;
            }
        }

        if purged > 0 {
            debug!(purged, cutoff = %cutoff, "Purged expired access codes");
        }
        Ok(purged)
    }
}

/// In-memory implementation of AccessSessionStore
#[derive(Debug, Default)]
pub struct InMemoryAccessSessionStore {
    /// Sessions by token
    sessions: DashMap<String, AccessSession>,
    /// Index: owning code -> session tokens
    by_code: DashMap<CodeId, Vec<String>>,
}

impl InMemoryAccessSessionStore {
    /// Create a new in-memory session store
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[async_trait]
impl AccessSessionStore for InMemoryAccessSessionStore {
    async fn insert(&self, session: AccessSession) -> Result<(), StorageError> {
        let token = session.token.as_str().to_string();
        trace!(session_id = %session.id, code_id = %session.code_id, "Storing session");

        self.by_code
            .entry(session.code_id)
            .or_default()
            .push(token.clone());
        self.sessions.insert(token, session);
        Ok(())
    }

    async fn get_by_token(&self, token: &str) -> Result<Option<AccessSession>, StorageError> {
        Ok(self.sessions.get(token).map(|s| s.clone()))
    }

    async fn list_for_code(&self, code_id: &CodeId) -> Result<Vec<AccessSession>, StorageError> {
        let tokens = match self.by_code.get(code_id) {
            Some(tokens) => tokens.clone(),
            None => return Ok(Vec::new()),
        };
        Ok(tokens
            .iter()
            .filter_map(|t| self.sessions.get(t).map(|s| s.clone()))
            .collect())
    }

    async fn revoke_for_code(
        &self,
        code_id: &CodeId,
        at: DateTime<Utc>,
    ) -> Result<usize, StorageError> {
        let tokens = match self.by_code.get(code_id) {
            Some(tokens) => tokens.clone(),
            None => return Ok(0),
        };

        let mut revoked = 0;
        for token in tokens {
            if let Some(mut session) = self.sessions.get_mut(&token)
                && session.revoked_at.is_none()
            {
                session.revoked_at = Some(at);
                revoked += 1;
            }
        }
        Ok(revoked)
    }

    async fn purge_expired_before(&self, cutoff: DateTime<Utc>) -> Result<usize, StorageError> {
        let doomed: Vec<(String, CodeId)> = self
            .sessions
            .iter()
            .filter(|entry| entry.is_purgeable(cutoff))
            .map(|entry| (entry.key().clone(), entry.code_id))
            .collect();

        let mut purged = 0;
        for (token, code_id) in doomed {
            if self.sessions.remove(&token).is_some() {
                purged += 1;
            }
            if let Entry::Occupied(mut tokens) = self.by_code.entry(code_id) {
                tokens.get_mut().retain(|t| t != &token);
                if tokens.get().is_empty() {
                    tokens.remove();
                }
            }
        }

        if purged > 0 {
            debug!(purged, cutoff = %cutoff, "Purged expired sessions");
        }
        Ok(purged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use tessera_core::{IssuerId, ResourceRef};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
    }

    fn code(code: &str, max_sessions: u32) -> AccessCode {
        AccessCode::new(
            code.to_string(),
            ResourceRef::knowledge("kr-1"),
            IssuerId::new("issuer-a"),
            Duration::hours(1),
            max_sessions,
            None,
            t0(),
        )
    }

    #[tokio::test]
    async fn test_insert_rejects_duplicate_code_string() {
        let store = InMemoryAccessCodeStore::new();
        store.insert_if_absent(code("AAAA-BBBB-CCCC", 1)).await.unwrap();

        let err = store
            .insert_if_absent(code("AAAA-BBBB-CCCC", 1))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Duplicate(_)));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_consume_unknown_is_not_found() {
        let store = InMemoryAccessCodeStore::new();
        let outcome = store.consume("ZZZZ-ZZZZ-ZZZZ", t0()).await.unwrap();
        assert_eq!(outcome, ConsumeOutcome::Rejected(RedeemRejection::NotFound));
    }

    #[tokio::test]
    async fn test_consume_until_exhausted() {
        let store = InMemoryAccessCodeStore::new();
        store.insert_if_absent(code("AAAA-BBBB-CCCC", 2)).await.unwrap();

        let first = store.consume("AAAA-BBBB-CCCC", t0()).await.unwrap();
        assert!(matches!(first, ConsumeOutcome::Consumed { first_use: true, .. }));
        let second = store.consume("AAAA-BBBB-CCCC", t0()).await.unwrap();
        assert!(matches!(second, ConsumeOutcome::Consumed { first_use: false, .. }));
        let third = store.consume("AAAA-BBBB-CCCC", t0()).await.unwrap();
        assert_eq!(third, ConsumeOutcome::Rejected(RedeemRejection::Exhausted));

        let stored = store.find_by_code("AAAA-BBBB-CCCC").await.unwrap().unwrap();
        assert_eq!(stored.used_sessions, 2);
    }

    #[tokio::test]
    async fn test_invalidate() {
        let store = InMemoryAccessCodeStore::new();
        let c = code("AAAA-BBBB-CCCC", 2);
        let id = c.id;
        store.insert_if_absent(c).await.unwrap();

        let updated = store.invalidate(&id).await.unwrap().unwrap();
        assert!(updated.invalidated);
        assert!(store.invalidate(&CodeId::new()).await.unwrap().is_none());

        let outcome = store.consume("AAAA-BBBB-CCCC", t0()).await.unwrap();
        assert_eq!(outcome, ConsumeOutcome::Rejected(RedeemRejection::Invalidated));
    }

    #[tokio::test]
    async fn test_purged_code_string_is_never_reissued() {
        let store = InMemoryAccessCodeStore::new();
        store.insert_if_absent(code("AAAA-BBBB-CCCC", 1)).await.unwrap();

        let purged = store
            .purge_expired_before(t0() + Duration::days(2))
            .await
            .unwrap();
        assert_eq!(purged, 1);
        assert!(store.is_empty());
        assert_eq!(store.retired_count(), 1);

        let err = store
            .insert_if_absent(code("AAAA-BBBB-CCCC", 1))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Duplicate(_)));
    }

    #[tokio::test]
    async fn test_purge_keeps_recent_codes() {
        let store = InMemoryAccessCodeStore::new();
        store.insert_if_absent(code("AAAA-BBBB-CCCC", 1)).await.unwrap();
        // Expires at t0 + 1h; a cutoff at exactly that instant keeps it
        let purged = store
            .purge_expired_before(t0() + Duration::hours(1))
            .await
            .unwrap();
        assert_eq!(purged, 0);
    }

    #[tokio::test]
    async fn test_session_store_index_and_revoke() {
        let codes = InMemoryAccessCodeStore::new();
        let sessions = InMemoryAccessSessionStore::new();
        let c = code("AAAA-BBBB-CCCC", 3);
        codes.insert_if_absent(c.clone()).await.unwrap();

        for _ in 0..2 {
            let ConsumeOutcome::Consumed { code, .. } =
                codes.consume("AAAA-BBBB-CCCC", t0()).await.unwrap()
            else {
                panic!("expected consumption");
            };
            sessions
                .insert(AccessSession::open(&code, None, t0()))
                .await
                .unwrap();
        }

        let listed = sessions.list_for_code(&c.id).await.unwrap();
        assert_eq!(listed.len(), 2);
        let token = listed[0].token.as_str().to_string();
        assert!(sessions.get_by_token(&token).await.unwrap().is_some());

        assert_eq!(sessions.revoke_for_code(&c.id, t0()).await.unwrap(), 2);
        assert_eq!(sessions.revoke_for_code(&c.id, t0()).await.unwrap(), 0);
        let revoked = sessions.get_by_token(&token).await.unwrap().unwrap();
        assert!(revoked.is_revoked());
    }

    #[tokio::test]
    async fn test_session_purge_updates_index() {
        let sessions = InMemoryAccessSessionStore::new();
        let mut c = code("AAAA-BBBB-CCCC", 1);
        c.try_consume(t0()).unwrap();
        sessions
            .insert(AccessSession::open(&c, None, t0()))
            .await
            .unwrap();

        let purged = sessions
            .purge_expired_before(t0() + Duration::days(1))
            .await
            .unwrap();
        assert_eq!(purged, 1);
        assert!(sessions.is_empty());
        assert!(sessions.list_for_code(&c.id).await.unwrap().is_empty());
    }
}
