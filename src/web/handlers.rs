use super::extract::{AuthUser, JsonObject};
use super::{Result, WebError};
use crate::core::InterfaceError;
use crate::interface::{InterfaceEntry, Page, PageQuery, TableAttributes, WireRow};
use crate::state::AppState;
use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::{StatusCode, Uri};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::info;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
}

pub async fn healthcheck() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

pub async fn create_interface(
    State(state): State<AppState>,
    auth: AuthUser,
    JsonObject(body): JsonObject,
) -> Result<(StatusCode, Json<InterfaceEntry>)> {
    let sql = match body.get("sql") {
        Some(JsonValue::String(sql)) => sql.clone(),
        Some(_) => return Err(InterfaceError::Parse("Sql must be a string".to_string()).into()),
        None => return Err(InterfaceError::Parse("Sql not provided".to_string()).into()),
    };

    let entry = state.service.create(&auth.user, sql).await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

pub async fn list_interfaces(
    State(state): State<AppState>,
    _auth: AuthUser,
    Query(query): Query<PageQuery>,
    uri: Uri,
) -> Result<Json<Page<InterfaceEntry>>> {
    let slice = state.service.list(query.number()?).await?;
    Ok(Json(slice.into_page(uri.path())))
}

pub async fn push_row(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(tname): Path<String>,
    JsonObject(body): JsonObject,
) -> Result<(StatusCode, Json<WireRow>)> {
    let row = state.service.push(&auth.user, tname, body).await?;
    Ok((StatusCode::CREATED, Json(row)))
}

pub async fn pull_rows(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(tname): Path<String>,
    Query(query): Query<PageQuery>,
    uri: Uri,
) -> Result<Json<Page<WireRow>>> {
    let slice = state
        .service
        .pull(&auth.user, tname, query.number()?)
        .await?;
    Ok(Json(slice.into_page(uri.path())))
}

pub async fn table_attribute(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(tname): Path<String>,
) -> Result<Json<TableAttributes>> {
    let attributes = state.service.attribute(&auth.user, tname).await?;
    Ok(Json(attributes))
}

pub async fn issue_token(
    State(state): State<AppState>,
    JsonObject(body): JsonObject,
) -> Result<Json<TokenResponse>> {
    let request: TokenRequest = serde_json::from_value(JsonValue::Object(body))
        .map_err(|err| WebError::from(InterfaceError::Parse(err.to_string())))?;

    let token = state
        .auth
        .issue_token(&request.username, &request.password)
        .await?;
    info!(username = %request.username, "token issued");
    Ok(Json(TokenResponse { token }))
}

pub async fn revoke_token(State(state): State<AppState>, auth: AuthUser) -> StatusCode {
    state.auth.revoke_token(&auth.token).await;
    info!(username = %auth.user.username(), "token revoked");
    StatusCode::NO_CONTENT
}
