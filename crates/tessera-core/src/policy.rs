//! Deployment policy for issuing, redeeming, and retaining codes

use serde::{Deserialize, Serialize};

use crate::code::CodeFormat;

/// How a session's recorded device fingerprint is treated on content fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceBinding {
    /// Recorded and compared; a mismatch is logged but allowed
    #[default]
    Advisory,
    /// A mismatch, or a missing fingerprint when one was recorded, is refused
    Strict,
}

/// Longest window, in hours, any policy duration may span (ten years)
pub const MAX_WINDOW_HOURS: u32 = 10 * 365 * 24;

const MAX_WINDOW_SECS: u64 = MAX_WINDOW_HOURS as u64 * 3600;

/// Tunables shared by the access service and its background tasks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessPolicy {
    pub code_format: CodeFormat,
    /// Collision retries before issuance fails loudly
    pub max_generation_attempts: u32,
    /// Upper bound an issuer may request for a validity window
    pub max_validity_hours: u32,
    /// Lifetime of a delegated asset pointer
    pub delegation_window_secs: u64,
    pub device_binding: DeviceBinding,
    /// Revoke derived sessions when a code is invalidated
    pub cascade_invalidation: bool,
    /// How long past expiry records are kept before the sweep deletes them
    pub retention_horizon_hours: u32,
    pub sweep_interval_secs: u64,
}

impl Default for AccessPolicy {
    fn default() -> Self {
        Self {
            code_format: CodeFormat::default(),
            max_generation_attempts: 8,
            max_validity_hours: 30 * 24,
            delegation_window_secs: 3600,
            device_binding: DeviceBinding::default(),
            cascade_invalidation: false,
            retention_horizon_hours: 30 * 24,
            sweep_interval_secs: 3600,
        }
    }
}

// Windows are capped at MAX_WINDOW_HOURS even when validate() was skipped
fn capped_hours(hours: u32) -> chrono::Duration {
    chrono::Duration::hours(i64::from(hours.min(MAX_WINDOW_HOURS)))
}

impl AccessPolicy {
    pub fn max_validity_window(&self) -> chrono::Duration {
        capped_hours(self.max_validity_hours)
    }

    pub fn delegation_window(&self) -> chrono::Duration {
        i64::try_from(self.delegation_window_secs.min(MAX_WINDOW_SECS))
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .unwrap_or_else(|| capped_hours(MAX_WINDOW_HOURS))
    }

    pub fn retention_horizon(&self) -> chrono::Duration {
        capped_hours(self.retention_horizon_hours)
    }

    pub fn sweep_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.sweep_interval_secs)
    }

    /// Set the device binding mode
    pub fn with_device_binding(mut self, binding: DeviceBinding) -> Self {
        self.device_binding = binding;
        self
    }

    /// Enable or disable cascading invalidation
    pub fn with_cascade_invalidation(mut self, cascade: bool) -> Self {
        self.cascade_invalidation = cascade;
        self
    }

    /// Set the collision retry budget
    pub fn with_max_generation_attempts(mut self, attempts: u32) -> Self {
        self.max_generation_attempts = attempts;
        self
    }

    /// Check the policy for values that would make the service unusable
    pub fn validate(&self) -> Result<(), String> {
        if !self.code_format.is_valid() {
            return Err("code_format needs at least one group of one symbol".into());
        }
        if self.max_generation_attempts == 0 {
            return Err("max_generation_attempts must be at least 1".into());
        }
        if self.max_validity_hours == 0 {
            return Err("max_validity_hours must be at least 1".into());
        }
        if self.max_validity_hours > MAX_WINDOW_HOURS {
            return Err(format!(
                "max_validity_hours may not exceed {MAX_WINDOW_HOURS}"
            ));
        }
        if self.delegation_window_secs == 0 {
            return Err("delegation_window_secs must be at least 1".into());
        }
        if self.delegation_window_secs > MAX_WINDOW_SECS {
            return Err(format!(
                "delegation_window_secs may not exceed {MAX_WINDOW_SECS}"
            ));
        }
        if self.retention_horizon_hours > MAX_WINDOW_HOURS {
            return Err(format!(
                "retention_horizon_hours may not exceed {MAX_WINDOW_HOURS}"
            ));
        }
        if self.sweep_interval_secs == 0 {
            return Err("sweep_interval_secs must be at least 1".into());
        }
        Ok(())
    }
}
