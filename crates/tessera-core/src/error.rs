//! Error types for Tessera

use thiserror::Error;

/// Why a code could not be redeemed
///
/// These are expected business outcomes, not faults. A redeemer that loses a
/// capacity race sees exactly the same [`RedeemRejection::Exhausted`] as one
/// that arrived after the code was already full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RedeemRejection {
    #[error("access code not found")]
    NotFound,

    #[error("access code has been invalidated")]
    Invalidated,

    #[error("access code has expired")]
    Expired,

    #[error("access code has no remaining sessions")]
    Exhausted,
}

/// Errors raised by storage backends
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    #[error("Storage I/O error: {0}")]
    Io(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Duplicate key: {0}")]
    Duplicate(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),
}

impl StorageError {
    /// Create a new NotFound error
    pub fn not_found(item: impl Into<String>) -> Self {
        Self::NotFound(item.into())
    }

    /// Create a new Database error
    pub fn database(message: impl Into<String>) -> Self {
        Self::Database(message.into())
    }

    /// Whether retrying the same operation might succeed
    ///
    /// Only infrastructure faults are transient. A duplicate key or a
    /// corrupt record fails the same way every time.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            StorageError::Io(_) | StorageError::Database(_) | StorageError::Unavailable(_)
        )
    }
}

/// Errors raised by external collaborators (catalog, object storage, identity)
#[derive(Debug, Clone, Error)]
#[error("{service}: {message}")]
pub struct CollaboratorError {
    pub service: &'static str,
    pub message: String,
}

impl CollaboratorError {
    pub fn new(service: &'static str, message: impl Into<String>) -> Self {
        Self {
            service,
            message: message.into(),
        }
    }
}

/// Top-level error type for access-code operations
#[derive(Debug, Error)]
pub enum AccessError {
    #[error("access code not found")]
    NotFound,

    #[error("access code has been invalidated")]
    Invalidated,

    #[error("access code has expired")]
    Expired,

    #[error("access code has no remaining sessions")]
    Exhausted,

    #[error("caller is not the issuer of this access code")]
    Forbidden,

    #[error("could not generate a unique access code after {attempts} attempts")]
    GenerationExhausted { attempts: u32 },

    #[error("delegated pointer could not be minted: {0}")]
    DelegationFailed(String),

    #[error("resource is no longer available: {0}")]
    ResourceUnavailable(String),

    #[error("resource catalog unavailable: {0}")]
    CatalogUnavailable(String),

    #[error("session not found")]
    SessionNotFound,

    #[error("session has expired")]
    SessionExpired,

    #[error("session has been revoked")]
    SessionRevoked,

    #[error("device fingerprint does not match the session")]
    DeviceMismatch,

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("Storage error: {0}")]
    Store(#[from] StorageError),
}

impl From<RedeemRejection> for AccessError {
    fn from(rejection: RedeemRejection) -> Self {
        match rejection {
            RedeemRejection::NotFound => AccessError::NotFound,
            RedeemRejection::Invalidated => AccessError::Invalidated,
            RedeemRejection::Expired => AccessError::Expired,
            RedeemRejection::Exhausted => AccessError::Exhausted,
        }
    }
}

impl AccessError {
    /// Stable machine-readable code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            AccessError::NotFound => "NOT_FOUND",
            AccessError::Invalidated => "INVALIDATED",
            AccessError::Expired => "EXPIRED",
            AccessError::Exhausted => "EXHAUSTED",
            AccessError::Forbidden => "FORBIDDEN",
            AccessError::GenerationExhausted { .. } => "GENERATION_EXHAUSTED",
            AccessError::DelegationFailed(_) => "DELEGATION_FAILED",
            AccessError::ResourceUnavailable(_) => "RESOURCE_UNAVAILABLE",
            AccessError::CatalogUnavailable(_) => "CATALOG_UNAVAILABLE",
            AccessError::SessionNotFound => "SESSION_NOT_FOUND",
            AccessError::SessionExpired => "SESSION_EXPIRED",
            AccessError::SessionRevoked => "SESSION_REVOKED",
            AccessError::DeviceMismatch => "DEVICE_MISMATCH",
            AccessError::InvalidRequest(_) => "INVALID_REQUEST",
            AccessError::Store(_) => "STORAGE_ERROR",
        }
    }

    /// Whether this is an expected redemption outcome rather than a fault
    pub fn is_business_outcome(&self) -> bool {
        matches!(
            self,
            AccessError::NotFound
                | AccessError::Invalidated
                | AccessError::Expired
                | AccessError::Exhausted
        )
    }

    /// Whether the caller may retry the same request
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AccessError::DelegationFailed(_) | AccessError::CatalogUnavailable(_)
        )
    }
}

/// Result type alias for access-code operations
pub type AccessResult<T> = Result<T, AccessError>;
