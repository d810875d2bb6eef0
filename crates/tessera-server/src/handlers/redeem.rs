//! Recipient endpoints: redeem a code, fetch gated content

use std::sync::Arc;

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::HeaderMap,
};
use serde::Deserialize;
use tessera_core::AccessError;
use tessera_service::{ContentAccess, Redemption};

use crate::error::Result;
use crate::state::AppState;

pub const SESSION_TOKEN_HEADER: &str = "x-session-token";
pub const DEVICE_FINGERPRINT_HEADER: &str = "x-device-fingerprint";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedeemBody {
    pub code: String,
    #[serde(default)]
    pub device_fingerprint: Option<String>,
}

/// POST /v1/redeem
pub async fn redeem(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<RedeemBody>, JsonRejection>,
) -> Result<Json<Redemption>> {
    let Json(body) = payload?;
    let redemption = state
        .service
        .redeem(&body.code, body.device_fingerprint)
        .await?;
    Ok(Json(redemption))
}

/// GET /v1/content
pub async fn fetch_content(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<ContentAccess>> {
    let token = header_value(&headers, SESSION_TOKEN_HEADER).ok_or(AccessError::SessionNotFound)?;
    let fingerprint = header_value(&headers, DEVICE_FINGERPRINT_HEADER);

    let content = state.service.fetch_content(token, fingerprint).await?;
    Ok(Json(content))
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}
