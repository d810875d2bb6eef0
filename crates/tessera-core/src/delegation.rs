//! Delegated asset pointers
//!
//! A delegated pointer is a short-lived URL to one object in object
//! storage. It is minted on every content fetch and never stored, so a
//! leaked pointer is bounded by the delegation window rather than by the
//! session lifetime.
//!
//! [`SignedUrlMinter`] signs `bucket`, `key`, and the expiry with a BLAKE3
//! keyed hash. The asset host shares the key and calls
//! [`SignedUrlMinter::verify`] before serving bytes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CollaboratorError;
use crate::resource::AssetLocator;
use crate::traits::PointerMinter;

const SERVICE: &str = "object-storage";

/// A freshly minted, short-lived pointer to a binary asset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegatedPointer {
    pub url: String,
    pub expires_at: DateTime<Utc>,
}

/// Mints URLs signed with a shared 32-byte key
#[derive(Clone)]
pub struct SignedUrlMinter {
    base_url: String,
    key: [u8; 32],
}

impl std::fmt::Debug for SignedUrlMinter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignedUrlMinter")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl SignedUrlMinter {
    pub fn new(base_url: impl Into<String>, key: [u8; 32]) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            key,
        }
    }

    /// Build from a hex-encoded 32-byte key
    pub fn from_hex(base_url: impl Into<String>, key_hex: &str) -> Result<Self, CollaboratorError> {
        let bytes = hex::decode(key_hex.trim())
            .map_err(|e| CollaboratorError::new(SERVICE, format!("signing key is not hex: {e}")))?;
        let key: [u8; 32] = bytes.try_into().map_err(|v: Vec<u8>| {
            CollaboratorError::new(
                SERVICE,
                format!("signing key must be 32 bytes, got {}", v.len()),
            )
        })?;
        Ok(Self::new(base_url, key))
    }

    fn signature(&self, bucket: &str, key: &str, expires: i64) -> blake3::Hash {
        let message = format!("{bucket}\n{key}\n{expires}");
        blake3::keyed_hash(&self.key, message.as_bytes())
    }

    /// Check a pointer presented to the asset host
    pub fn verify(
        &self,
        bucket: &str,
        key: &str,
        expires: i64,
        signature_hex: &str,
        now: DateTime<Utc>,
    ) -> bool {
        if now.timestamp() >= expires {
            return false;
        }
        match blake3::Hash::from_hex(signature_hex) {
            // blake3::Hash equality is constant-time
            Ok(presented) => presented == self.signature(bucket, key, expires),
            Err(_) => false,
        }
    }
}

/// Path segments are embedded without escaping, so only URL-safe names pass
fn is_url_safe(segment: &str) -> bool {
    !segment.is_empty()
        && !segment.contains("..")
        && segment
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.' | b'/'))
}

#[async_trait]
impl PointerMinter for SignedUrlMinter {
    async fn mint(
        &self,
        asset: &AssetLocator,
        expires_at: DateTime<Utc>,
    ) -> Result<DelegatedPointer, CollaboratorError> {
        if !is_url_safe(&asset.bucket) || !is_url_safe(&asset.key) {
            return Err(CollaboratorError::new(
                SERVICE,
                format!("asset path {}/{} is not URL-safe", asset.bucket, asset.key),
            ));
        }

        let expires = expires_at.timestamp();
        let sig = self.signature(&asset.bucket, &asset.key, expires);
        Ok(DelegatedPointer {
            url: format!(
                "{}/{}/{}?expires={}&sig={}",
                self.base_url,
                asset.bucket,
                asset.key,
                expires,
                sig.to_hex()
            ),
            expires_at,
        })
    }
}
