//! Issuer endpoints: issue, inspect, invalidate

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
};
use serde::Serialize;
use tessera_core::{AccessError, CodeId};
use tessera_service::{CodeStatus, IssueRequest, IssuedCode};

use super::auth::Issuer;
use crate::error::Result;
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidateResponse {
    pub ok: bool,
    pub sessions_revoked: usize,
}

/// POST /v1/codes
pub async fn issue_code(
    State(state): State<Arc<AppState>>,
    Issuer(issuer): Issuer,
    payload: std::result::Result<Json<IssueRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<IssuedCode>)> {
    let Json(request) = payload?;
    let issued = state.service.issue(&issuer, request).await?;
    Ok((StatusCode::CREATED, Json(issued)))
}

/// GET /v1/codes/{id}
pub async fn code_status(
    State(state): State<Arc<AppState>>,
    Issuer(issuer): Issuer,
    Path(id): Path<String>,
) -> Result<Json<CodeStatus>> {
    let id = parse_code_id(&id)?;
    Ok(Json(state.service.inspect(&id, &issuer).await?))
}

/// POST /v1/codes/{id}/invalidate
pub async fn invalidate_code(
    State(state): State<Arc<AppState>>,
    Issuer(issuer): Issuer,
    Path(id): Path<String>,
) -> Result<Json<InvalidateResponse>> {
    let id = parse_code_id(&id)?;
    let sessions_revoked = state.service.invalidate(&id, &issuer).await?;
    Ok(Json(InvalidateResponse {
        ok: true,
        sessions_revoked,
    }))
}

// A malformed id cannot name any code
fn parse_code_id(raw: &str) -> std::result::Result<CodeId, AccessError> {
    raw.parse().map_err(|_| AccessError::NotFound)
}
