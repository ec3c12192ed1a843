//! HTTP surface: error responses, request extractors and handlers.

pub mod extract;
pub mod handlers;

use crate::core::{FieldErrors, InterfaceError};
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use std::any::Any;
use tracing::error;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<FieldErrors>,
}

#[derive(Debug)]
pub enum WebError {
    Interface(InterfaceError),
    Internal(String),
}

impl From<InterfaceError> for WebError {
    fn from(err: InterfaceError) -> Self {
        WebError::Interface(err)
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let (status, code, message, fields) = match self {
            WebError::Interface(err) => {
                let (status, code) = match &err {
                    InterfaceError::Parse(_) => (StatusCode::BAD_REQUEST, "parse_error"),
                    InterfaceError::Validation(_) => (StatusCode::BAD_REQUEST, "validation_error"),
                    InterfaceError::NotAuthenticated(_) => {
                        (StatusCode::UNAUTHORIZED, "not_authenticated")
                    }
                    InterfaceError::PermissionDenied => (StatusCode::FORBIDDEN, "permission_denied"),
                    InterfaceError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
                    InterfaceError::TableCreation(_) => {
                        (StatusCode::INTERNAL_SERVER_ERROR, "table_creation_error")
                    }
                    InterfaceError::Resolution(_) => {
                        (StatusCode::INTERNAL_SERVER_ERROR, "resolution_error")
                    }
                    InterfaceError::Service(_) => (StatusCode::INTERNAL_SERVER_ERROR, "service_error"),
                };
                let message = err.to_string();
                let fields = match err {
                    InterfaceError::Validation(fields) => Some(fields),
                    _ => None,
                };
                (status, code, message, fields)
            }
            WebError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                msg,
                None,
            ),
        };

        if status.is_server_error() {
            error!(status = status.as_u16(), code, error = %message, "request failed");
        }

        let body = Json(ErrorResponse {
            error: message,
            code: code.to_string(),
            fields,
        });

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, WebError>;

/// Converts a handler panic into a plain 500 response.
pub fn handle_panic(payload: Box<dyn Any + Send + 'static>) -> Response {
    let detail = payload
        .downcast_ref::<String>()
        .cloned()
        .or_else(|| payload.downcast_ref::<&str>().map(|s| s.to_string()))
        .unwrap_or_else(|| "unknown panic payload".to_string());
    error!(panic = %detail, "request handler panicked");

    WebError::Internal("A server error occurred.".to_string()).into_response()
}
