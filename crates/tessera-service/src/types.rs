//! Request and response types of the access service
//!
//! These are what the HTTP layer serializes, so they carry camelCase
//! serde names.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tessera_core::{AccessCode, CodeId, CodeState, RecipientMeta, ResourceRef};

/// Parameters of a new code
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueRequest {
    pub resource: ResourceRef,
    pub validity_window_hours: u32,
    pub max_sessions: u32,
    #[serde(default)]
    pub recipient: Option<RecipientMeta>,
}

impl IssueRequest {
    pub fn new(resource: ResourceRef, validity_window_hours: u32, max_sessions: u32) -> Self {
        Self {
            resource,
            validity_window_hours,
            max_sessions,
            recipient: None,
        }
    }

    /// Attach descriptive recipient fields
    pub fn with_recipient(mut self, recipient: RecipientMeta) -> Self {
        self.recipient = Some(recipient);
        self
    }
}

/// What the issuer hands to the recipient
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedCode {
    pub id: CodeId,
    pub code: String,
    pub ceiling_expires_at: DateTime<Utc>,
}

impl From<&AccessCode> for IssuedCode {
    fn from(code: &AccessCode) -> Self {
        Self {
            id: code.id,
            code: code.code.clone(),
            ceiling_expires_at: code.ceiling_expires_at,
        }
    }
}

/// Reference to the unlocked content returned on redemption
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentRef {
    pub resource: ResourceRef,
    /// Absent when the catalog could not be reached at redemption time
    pub title: Option<String>,
}

/// A successful redemption
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Redemption {
    pub session_token: String,
    pub expires_at: DateTime<Utc>,
    pub remaining_seconds: i64,
    pub content_ref: ContentRef,
}

/// A freshly minted pointer to the content's binary asset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetAccess {
    pub url: String,
    pub expires_at: DateTime<Utc>,
    pub content_type: String,
}

/// Content metadata served to a session holder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentAccess {
    pub resource: ResourceRef,
    pub title: String,
    pub description: Option<String>,
    pub link_url: Option<String>,
    pub asset: Option<AssetAccess>,
    pub session_expires_at: DateTime<Utc>,
}

/// Issuer view of a code's computed state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeStatus {
    pub id: CodeId,
    pub code: String,
    pub resource: ResourceRef,
    pub state: CodeState,
    pub used_sessions: u32,
    pub max_sessions: u32,
    pub ceiling_expires_at: DateTime<Utc>,
    pub effective_expires_at: DateTime<Utc>,
    pub first_used_at: Option<DateTime<Utc>>,
    pub invalidated: bool,
    /// Session records still held for this code
    pub sessions: usize,
}

impl CodeStatus {
    pub(crate) fn new(code: AccessCode, now: DateTime<Utc>, sessions: usize) -> Self {
        Self {
            state: code.state_at(now),
            id: code.id,
            code: code.code,
            resource: code.resource,
            used_sessions: code.used_sessions,
            max_sessions: code.max_sessions,
            ceiling_expires_at: code.ceiling_expires_at,
            effective_expires_at: code.effective_expires_at,
            first_used_at: code.first_used_at,
            invalidated: code.invalidated,
            sessions,
        }
    }
}

/// Records removed by one retention sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepReport {
    pub codes_purged: usize,
    pub sessions_purged: usize,
}

impl SweepReport {
    pub fn is_empty(&self) -> bool {
        self.codes_purged == 0 && self.sessions_purged == 0
    }
}
