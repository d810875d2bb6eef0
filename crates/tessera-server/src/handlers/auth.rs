//! Issuer authentication

use std::sync::Arc;

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use tessera_core::IssuerId;
use tracing::debug;

use crate::error::ServerError;
use crate::state::AppState;

/// Issuer resolved from an `Authorization: Bearer <key>` header
#[derive(Debug, Clone)]
pub struct Issuer(pub IssuerId);

impl FromRequestParts<Arc<AppState>> for Issuer {
    type Rejection = ServerError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let key = bearer_token(parts)
            .ok_or_else(|| ServerError::unauthorized("missing bearer credential"))?
            .to_string();

        match state.issuers.authenticate(&key).await? {
            Some(issuer) => Ok(Issuer(issuer)),
            None => {
                debug!("Rejected unknown issuer credential");
                Err(ServerError::unauthorized("unknown issuer credential"))
            }
        }
    }
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}
