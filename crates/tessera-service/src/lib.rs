//! # Tessera Service
//!
//! The access service coordinator. [`AccessService`] ties together:
//! - Code and session stores (in-memory or redb)
//! - The resource catalog and pointer minter collaborators
//! - The deployment [`AccessPolicy`] and the server clock
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tessera_core::{AccessPolicy, IssuerId, ResourceRef};
//! use tessera_service::{AccessService, IssueRequest};
//!
//! let service = AccessService::in_memory(catalog, minter, AccessPolicy::default());
//!
//! // Issuer side
//! let issued = service
//!     .issue(&IssuerId::new("clinic-7"), IssueRequest::new(ResourceRef::knowledge("kr-42"), 24, 3))
//!     .await?;
//!
//! // Recipient side
//! let redemption = service.redeem(&issued.code, None).await?;
//! let content = service.fetch_content(&redemption.session_token, None).await?;
//! ```

pub mod retention;
mod retry;
mod types;

pub use retention::RetentionTask;
pub use types::{
    AssetAccess, CodeStatus, ContentAccess, ContentRef, IssueRequest, IssuedCode, Redemption,
    SweepReport,
};

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, instrument, warn};

use tessera_core::code::redact;
use tessera_core::{
    AccessCode, AccessCodeStore, AccessError, AccessPolicy, AccessResult, AccessSession,
    AccessSessionStore, Clock, CodeId, ConsumeOutcome, DeviceBinding, IssuerId, PointerMinter,
    ResourceCatalog, ResourceMetadata, ResourceRef, StorageError, SystemClock,
};
use tessera_storage::{InMemoryAccessCodeStore, InMemoryAccessSessionStore};

use retry::with_retry;

/// Coordinator for every access-code operation
///
/// Cheap to share: wrap it in an [`Arc`] and hand it to request handlers
/// and the [`RetentionTask`].
pub struct AccessService {
    codes: Arc<dyn AccessCodeStore>,
    sessions: Arc<dyn AccessSessionStore>,
    catalog: Arc<dyn ResourceCatalog>,
    minter: Arc<dyn PointerMinter>,
    clock: Arc<dyn Clock>,
    policy: AccessPolicy,
}

impl AccessService {
    /// Create a service on the given stores and collaborators
    pub fn new(
        codes: Arc<dyn AccessCodeStore>,
        sessions: Arc<dyn AccessSessionStore>,
        catalog: Arc<dyn ResourceCatalog>,
        minter: Arc<dyn PointerMinter>,
        policy: AccessPolicy,
    ) -> Self {
        Self {
            codes,
            sessions,
            catalog,
            minter,
            clock: Arc::new(SystemClock),
            policy,
        }
    }

    /// Create a service backed by in-memory stores
    pub fn in_memory(
        catalog: Arc<dyn ResourceCatalog>,
        minter: Arc<dyn PointerMinter>,
        policy: AccessPolicy,
    ) -> Self {
        Self::new(
            Arc::new(InMemoryAccessCodeStore::new()),
            Arc::new(InMemoryAccessSessionStore::new()),
            catalog,
            minter,
            policy,
        )
    }

    /// Replace the clock
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn policy(&self) -> &AccessPolicy {
        &self.policy
    }

    /// Current server time
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now_utc()
    }

    // ------------------------------------------------------------------
    // Issuance
    // ------------------------------------------------------------------

    /// Issue a new code for `request.resource`
    ///
    /// Draws candidates until one is accepted by the store's uniqueness
    /// guard, up to `max_generation_attempts`.
    #[instrument(skip(self, request), fields(issuer = %issuer, resource = %request.resource))]
    pub async fn issue(&self, issuer: &IssuerId, request: IssueRequest) -> AccessResult<IssuedCode> {
        let window = self.validate_issue(&request)?;
        self.require_resource(&request.resource).await?;

        let now = self.now();
        let attempts = self.policy.max_generation_attempts;

        for attempt in 1..=attempts {
            let candidate = self.policy.code_format.generate(&mut rand::rng());
            let record = AccessCode::new(
                candidate,
                request.resource.clone(),
                issuer.clone(),
                window,
                request.max_sessions,
                request.recipient.clone(),
                now,
            );

            let inserted = with_retry("insert_code", || {
                self.codes.insert_if_absent(record.clone())
            })
            .await;

            match inserted {
                Ok(()) => {
                    info!(
                        code_id = %record.id,
                        code = %redact(&record.code),
                        max_sessions = record.max_sessions,
                        ceiling = %record.ceiling_expires_at,
                        "Issued access code"
                    );
                    return Ok(IssuedCode::from(&record));
                }
                Err(StorageError::Duplicate(_)) => {
                    debug!(attempt, "Code collision, drawing again");
                }
                Err(e) => return Err(e.into()),
            }
        }

        error!(
            attempts,
            symbols = self.policy.code_format.symbol_count(),
            "Could not find a free access code; the code space is too small"
        );
        Err(AccessError::GenerationExhausted { attempts })
    }

    fn validate_issue(&self, request: &IssueRequest) -> AccessResult<chrono::Duration> {
        if request.max_sessions == 0 {
            return Err(AccessError::InvalidRequest(
                "maxSessions must be at least 1".into(),
            ));
        }
        if request.validity_window_hours == 0 {
            return Err(AccessError::InvalidRequest(
                "validityWindowHours must be at least 1".into(),
            ));
        }

        let window = chrono::Duration::hours(i64::from(request.validity_window_hours));
        if window > self.policy.max_validity_window() {
            return Err(AccessError::InvalidRequest(format!(
                "validityWindowHours may not exceed {}",
                self.policy.max_validity_hours
            )));
        }
        Ok(window)
    }

    async fn require_resource(&self, resource: &ResourceRef) -> AccessResult<()> {
        match self.catalog.resolve(resource).await {
            Ok(Some(_)) => Ok(()),
            Ok(None) => Err(AccessError::InvalidRequest(format!(
                "unknown resource {resource}"
            ))),
            Err(e) => {
                warn!(error = %e, "Resource catalog unavailable during issuance");
                Err(AccessError::CatalogUnavailable(e.to_string()))
            }
        }
    }

    // ------------------------------------------------------------------
    // Redemption
    // ------------------------------------------------------------------

    /// Redeem a code and open a session
    ///
    /// Business outcomes come back as `NotFound`, `Invalidated`, `Expired`,
    /// or `Exhausted`. A redeemer that lost a capacity race gets the same
    /// `Exhausted` as one that arrived after the code filled up.
    #[instrument(skip_all)]
    pub async fn redeem(
        &self,
        code: &str,
        device_fingerprint: Option<String>,
    ) -> AccessResult<Redemption> {
        let now = self.now();

        let Some(code) = self.policy.code_format.normalize(code) else {
            debug!("Submitted code is not in code format");
            return Err(AccessError::NotFound);
        };

        let outcome = with_retry("consume_code", || self.codes.consume(&code, now)).await?;

        let (record, first_use) = match outcome {
            ConsumeOutcome::Consumed { code, first_use } => (code, first_use),
            ConsumeOutcome::Rejected(reason) => {
                debug!(code = %redact(&code), reason = %reason, "Redemption rejected");
                return Err(reason.into());
            }
        };

        let session = AccessSession::open(&record, device_fingerprint, now);
        if let Err(e) = with_retry("insert_session", || self.sessions.insert(session.clone())).await
        {
            // The capacity unit is already spent; surface the fault loudly
            error!(code_id = %record.id, error = %e, "Consumed a session but failed to store it");
            return Err(e.into());
        }

        info!(
            code_id = %record.id,
            session_id = %session.id,
            used = record.used_sessions,
            max = record.max_sessions,
            first_use,
            "Redeemed access code"
        );

        let title = match self.catalog.resolve(&record.resource).await {
            Ok(metadata) => metadata.map(|m| m.title),
            Err(e) => {
                warn!(resource = %record.resource, error = %e, "Could not resolve title");
                None
            }
        };

        Ok(Redemption {
            remaining_seconds: session.remaining_seconds(now),
            expires_at: session.expires_at,
            session_token: session.token.as_str().to_string(),
            content_ref: ContentRef {
                resource: record.resource,
                title,
            },
        })
    }

    // ------------------------------------------------------------------
    // Content delegation
    // ------------------------------------------------------------------

    /// Serve content metadata to a session holder
    ///
    /// A binary asset gets a pointer minted for this fetch only, valid for
    /// the delegation window or until the session ends, whichever is
    /// sooner.
    #[instrument(skip_all)]
    pub async fn fetch_content(
        &self,
        session_token: &str,
        device_fingerprint: Option<&str>,
    ) -> AccessResult<ContentAccess> {
        let now = self.now();

        let session = with_retry("get_session", || self.sessions.get_by_token(session_token))
            .await?
            .ok_or(AccessError::SessionNotFound)?;

        if session.is_revoked() || self.code_revokes(&session).await? {
            debug!(session_id = %session.id, "Fetch on revoked session");
            return Err(AccessError::SessionRevoked);
        }
        if session.is_expired_at(now) {
            debug!(session_id = %session.id, "Fetch on expired session");
            return Err(AccessError::SessionExpired);
        }
        self.check_device(&session, device_fingerprint)?;

        let metadata = self.resolve_for_fetch(&session.resource).await?;

        let asset = match &metadata.asset {
            Some(locator) => {
                let expires_at = (now + self.policy.delegation_window()).min(session.expires_at);
                let pointer = self.minter.mint(locator, expires_at).await.map_err(|e| {
                    warn!(session_id = %session.id, error = %e, "Pointer minting failed");
                    AccessError::DelegationFailed(e.to_string())
                })?;
                debug!(
                    session_id = %session.id,
                    expires_at = %pointer.expires_at,
                    "Minted delegated pointer"
                );
                Some(AssetAccess {
                    url: pointer.url,
                    expires_at: pointer.expires_at,
                    content_type: locator.content_type.clone(),
                })
            }
            None => None,
        };

        Ok(ContentAccess {
            resource: session.resource,
            title: metadata.title,
            description: metadata.description,
            link_url: metadata.link_url,
            asset,
            session_expires_at: session.expires_at,
        })
    }

    /// Whether cascading invalidation revokes `session` through its code
    ///
    /// A session stored after `invalidate` already revoked its siblings
    /// carries no revocation mark, so the owning code is consulted too. A
    /// purged code counts as invalidated.
    async fn code_revokes(&self, session: &AccessSession) -> AccessResult<bool> {
        if !self.policy.cascade_invalidation {
            return Ok(false);
        }
        let code = with_retry("get_code", || self.codes.get(&session.code_id)).await?;
        Ok(code.is_none_or(|code| code.invalidated))
    }

    fn check_device(&self, session: &AccessSession, presented: Option<&str>) -> AccessResult<()> {
        let Some(recorded) = session.device_fingerprint.as_deref() else {
            return Ok(());
        };
        if presented == Some(recorded) {
            return Ok(());
        }

        match self.policy.device_binding {
            DeviceBinding::Advisory => {
                warn!(
                    session_id = %session.id,
                    presented = presented.is_some(),
                    "Device fingerprint mismatch"
                );
                Ok(())
            }
            DeviceBinding::Strict => {
                warn!(
                    session_id = %session.id,
                    presented = presented.is_some(),
                    "Device fingerprint mismatch, refusing fetch"
                );
                Err(AccessError::DeviceMismatch)
            }
        }
    }

    async fn resolve_for_fetch(&self, resource: &ResourceRef) -> AccessResult<ResourceMetadata> {
        match self.catalog.resolve(resource).await {
            Ok(Some(metadata)) => Ok(metadata),
            Ok(None) => {
                warn!(resource = %resource, "Session points at a resource that no longer exists");
                Err(AccessError::ResourceUnavailable(resource.to_string()))
            }
            Err(e) => {
                warn!(resource = %resource, error = %e, "Resource catalog unavailable");
                Err(AccessError::CatalogUnavailable(e.to_string()))
            }
        }
    }

    // ------------------------------------------------------------------
    // Issuer operations
    // ------------------------------------------------------------------

    /// Invalidate a code on behalf of its issuer
    ///
    /// Idempotent. Sessions already issued stay live unless the policy
    /// enables cascading invalidation. Returns the number of sessions
    /// revoked.
    #[instrument(skip(self), fields(code_id = %code_id, issuer = %issuer))]
    pub async fn invalidate(&self, code_id: &CodeId, issuer: &IssuerId) -> AccessResult<usize> {
        self.owned_code(code_id, issuer).await?;

        let updated = with_retry("invalidate_code", || self.codes.invalidate(code_id))
            .await?
            .ok_or(AccessError::NotFound)?;

        let revoked = if self.policy.cascade_invalidation {
            let now = self.now();
            with_retry("revoke_sessions", || self.sessions.revoke_for_code(code_id, now)).await?
        } else {
            0
        };

        info!(
            used = updated.used_sessions,
            revoked,
            "Access code invalidated"
        );
        Ok(revoked)
    }

    /// Issuer view of a code
    #[instrument(skip(self), fields(code_id = %code_id, issuer = %issuer))]
    pub async fn inspect(&self, code_id: &CodeId, issuer: &IssuerId) -> AccessResult<CodeStatus> {
        let code = self.owned_code(code_id, issuer).await?;
        let sessions = with_retry("list_sessions", || self.sessions.list_for_code(code_id)).await?;
        Ok(CodeStatus::new(code, self.now(), sessions.len()))
    }

    async fn owned_code(&self, code_id: &CodeId, issuer: &IssuerId) -> AccessResult<AccessCode> {
        let code = with_retry("get_code", || self.codes.get(code_id))
            .await?
            .ok_or(AccessError::NotFound)?;

        if code.issuer != *issuer {
            warn!(owner = %code.issuer, "Issuer does not own this code");
            return Err(AccessError::Forbidden);
        }
        Ok(code)
    }

    // ------------------------------------------------------------------
    // Retention
    // ------------------------------------------------------------------

    /// Delete codes and sessions that expired more than the retention
    /// horizon before `now`
    pub async fn sweep(&self, now: DateTime<Utc>) -> AccessResult<SweepReport> {
        let cutoff = now - self.policy.retention_horizon();

        let sessions_purged = with_retry("purge_sessions", || {
            self.sessions.purge_expired_before(cutoff)
        })
        .await?;
        let codes_purged =
            with_retry("purge_codes", || self.codes.purge_expired_before(cutoff)).await?;

        let report = SweepReport {
            codes_purged,
            sessions_purged,
        };
        if !report.is_empty() {
            info!(
                codes = codes_purged,
                sessions = sessions_purged,
                cutoff = %cutoff,
                "Retention sweep purged records"
            );
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn _assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn test_service_is_shareable() {
        _assert_send_sync::<AccessService>();
    }
}
