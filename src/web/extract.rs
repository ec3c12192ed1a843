//! Request extractors shared by the handlers.

use super::WebError;
use crate::auth::User;
use crate::core::InterfaceError;
use crate::state::AppState;
use async_trait::async_trait;
use axum::body::Bytes;
use axum::extract::{FromRequest, FromRequestParts, Request};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use serde_json::{Map, Value as JsonValue};

/// Caller identified by an `Authorization: Bearer <token>` header.
///
/// `Token <token>` is accepted as well.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user: User,
    pub token: String,
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = WebError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| not_authenticated("Authentication credentials were not provided."))?;

        let token = header
            .strip_prefix("Bearer ")
            .or_else(|| header.strip_prefix("Token "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| not_authenticated("Invalid token header."))?;

        let user = state.auth.resolve_token(token).await?;
        Ok(AuthUser {
            user,
            token: token.to_string(),
        })
    }
}

/// Non-empty JSON object body.
///
/// Empty bodies, `{}`, malformed JSON and non-object documents are all rejected
/// with a parse error before the handler runs.
#[derive(Debug, Clone)]
pub struct JsonObject(pub Map<String, JsonValue>);

#[async_trait]
impl<S> FromRequest<S> for JsonObject
where
    S: Send + Sync,
{
    type Rejection = WebError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|rejection| InterfaceError::Parse(rejection.body_text()))?;

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Err(no_content().into());
        }

        let document: JsonValue = serde_json::from_slice(&bytes)
            .map_err(|err| InterfaceError::Parse(format!("JSON parse error - {}", err)))?;

        match document {
            JsonValue::Object(map) if map.is_empty() => Err(no_content().into()),
            JsonValue::Object(map) => Ok(JsonObject(map)),
            _ => Err(InterfaceError::Parse("Expected a JSON object.".to_string()).into()),
        }
    }
}

fn not_authenticated(message: &str) -> WebError {
    InterfaceError::NotAuthenticated(message.to_string()).into()
}

fn no_content() -> InterfaceError {
    InterfaceError::Parse("No JSON content was sent.".to_string())
}
