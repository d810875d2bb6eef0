//! Access codes, sessions, and the redemption state machine
//!
//! A code's lifecycle state is never stored. It is computed from the
//! record's fields by [`AccessCode::state_at`], and the only mutation a
//! redemption performs is [`AccessCode::try_consume`]. Stores call
//! `try_consume` while holding whatever makes their update indivisible, so
//! the counter and the first-use anchor always move together.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::RedeemRejection;
use crate::resource::ResourceRef;

/// Opaque identifier of an access code record
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CodeId(Uuid);

impl CodeId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }
}

impl Default for CodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl FromStr for CodeId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Opaque identifier of a session record
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

/// Identity of the party distributing codes
#[derive(Debug, Display, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IssuerId(String);

impl IssuerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Secret presented on every content fetch
///
/// 32 bytes from the CSPRNG, hex-encoded. Independent of the code string.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionToken(String);

impl SessionToken {
    const BYTES: usize = 32;

    pub fn generate() -> Self {
        let mut bytes = [0u8; Self::BYTES];
        rand::fill(&mut bytes);
        Self(hex::encode(bytes))
    }

    /// Wrap a token received from a client
    pub fn from_client(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Non-secret prefix for log lines
    pub fn short(&self) -> &str {
        self.0.get(..8).unwrap_or(&self.0)
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionToken({}…)", self.short())
    }
}

/// Optional descriptive fields about who a code was handed to
///
/// Not security relevant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipientMeta {
    pub name: Option<String>,
    pub email: Option<String>,
    pub note: Option<String>,
}

/// Computed lifecycle state of a code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodeState {
    /// Never redeemed; the ceiling expiry applies
    Fresh,
    /// Redeemed at least once, capacity remains; the anchored expiry applies
    Active,
    /// Every session has been handed out
    Exhausted,
    /// Past its effective expiry
    Expired,
    /// Revoked by the issuer
    Invalidated,
}

impl CodeState {
    /// Whether a redemption could succeed in this state
    pub fn is_redeemable(&self) -> bool {
        matches!(self, Self::Fresh | Self::Active)
    }
}

/// What a successful consumption did to the record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Consumption {
    /// This consumption anchored the expiry window
    pub first_use: bool,
    pub used_sessions: u32,
    pub effective_expires_at: DateTime<Utc>,
}

/// A distributable access code
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessCode {
    pub id: CodeId,
    pub resource: ResourceRef,
    pub issuer: IssuerId,
    /// Canonical grouped code string, unique among all codes ever issued
    pub code: String,
    pub created_at: DateTime<Utc>,
    /// Length of the validity window, in seconds
    pub validity_window_secs: i64,
    /// Deadline while the code has never been redeemed
    pub ceiling_expires_at: DateTime<Utc>,
    /// Set exactly once, by the first successful redemption
    pub first_used_at: Option<DateTime<Utc>>,
    /// Equals the ceiling until first use, then `first_used_at + window`
    pub effective_expires_at: DateTime<Utc>,
    pub max_sessions: u32,
    pub used_sessions: u32,
    /// One-way: never reverts to false
    pub invalidated: bool,
    pub recipient: Option<RecipientMeta>,
}

impl AccessCode {
    /// Build a fresh record
    ///
    /// Callers validate `max_sessions >= 1` and a positive window before
    /// constructing.
    pub fn new(
        code: String,
        resource: ResourceRef,
        issuer: IssuerId,
        validity_window: Duration,
        max_sessions: u32,
        recipient: Option<RecipientMeta>,
        now: DateTime<Utc>,
    ) -> Self {
        let ceiling = now + validity_window;
        Self {
            id: CodeId::new(),
            resource,
            issuer,
            code,
            created_at: now,
            validity_window_secs: validity_window.num_seconds(),
            ceiling_expires_at: ceiling,
            first_used_at: None,
            effective_expires_at: ceiling,
            max_sessions,
            used_sessions: 0,
            invalidated: false,
            recipient,
        }
    }

    pub fn validity_window(&self) -> Duration {
        Duration::seconds(self.validity_window_secs)
    }

    pub fn remaining_sessions(&self) -> u32 {
        self.max_sessions.saturating_sub(self.used_sessions)
    }

    /// Expired at `now`; a redemption exactly at the deadline is too late
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.effective_expires_at
    }

    /// Compute the lifecycle state at `now`
    ///
    /// Invalidated and Expired dominate the counters.
    pub fn state_at(&self, now: DateTime<Utc>) -> CodeState {
        if self.invalidated {
            CodeState::Invalidated
        } else if self.is_expired_at(now) {
            CodeState::Expired
        } else if self.used_sessions >= self.max_sessions {
            CodeState::Exhausted
        } else if self.first_used_at.is_none() {
            CodeState::Fresh
        } else {
            CodeState::Active
        }
    }

    /// Consume one unit of capacity
    ///
    /// On the first consumption this also anchors the expiry window to
    /// `now`. Leaves the record untouched when it rejects.
    pub fn try_consume(&mut self, now: DateTime<Utc>) -> Result<Consumption, RedeemRejection> {
        match self.state_at(now) {
            CodeState::Invalidated => return Err(RedeemRejection::Invalidated),
            CodeState::Expired => return Err(RedeemRejection::Expired),
            CodeState::Exhausted => return Err(RedeemRejection::Exhausted),
            CodeState::Fresh | CodeState::Active => {}
        }

        self.used_sessions += 1;

        let first_use = self.first_used_at.is_none();
        if first_use {
            self.first_used_at = Some(now);
            self.effective_expires_at = now + self.validity_window();
        }

        Ok(Consumption {
            first_use,
            used_sessions: self.used_sessions,
            effective_expires_at: self.effective_expires_at,
        })
    }

    /// Mark the code invalidated. Returns whether this call changed it.
    pub fn invalidate(&mut self) -> bool {
        let changed = !self.invalidated;
        self.invalidated = true;
        changed
    }

    /// Whether the retention sweep may delete this record
    pub fn is_purgeable(&self, cutoff: DateTime<Utc>) -> bool {
        self.effective_expires_at < cutoff
    }
}

/// A session created by one successful redemption
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessSession {
    pub id: SessionId,
    pub code_id: CodeId,
    pub resource: ResourceRef,
    pub token: SessionToken,
    /// Advisory binding supplied by the redeeming client
    pub device_fingerprint: Option<String>,
    pub created_at: DateTime<Utc>,
    /// The owning code's effective expiry at creation time
    pub expires_at: DateTime<Utc>,
    /// Only set when cascading invalidation is enabled
    pub revoked_at: Option<DateTime<Utc>>,
}

impl AccessSession {
    /// Open a session against a code that was just consumed
    pub fn open(code: &AccessCode, device_fingerprint: Option<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: SessionId::new(),
            code_id: code.id,
            resource: code.resource.clone(),
            token: SessionToken::generate(),
            device_fingerprint,
            created_at: now,
            expires_at: code.effective_expires_at,
            revoked_at: None,
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }

    /// Whole seconds left, never negative
    pub fn remaining_seconds(&self, now: DateTime<Utc>) -> i64 {
        (self.expires_at - now).num_seconds().max(0)
    }

    pub fn is_purgeable(&self, cutoff: DateTime<Utc>) -> bool {
        self.expires_at < cutoff
    }
}
