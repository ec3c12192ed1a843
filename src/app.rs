use axum::{
    Router,
    http::Method,
    routing::{get, post},
};
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    state::AppState,
    web::{
        handle_panic,
        handlers::{
            create_interface, healthcheck, issue_token, list_interfaces, pull_rows, push_row,
            revoke_token, table_attribute,
        },
    },
};

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(healthcheck))
        .route("/api-auth/token", post(issue_token).delete(revoke_token))
        .route("/interface", post(create_interface).get(list_interfaces))
        .route("/interface/:tname", post(push_row).get(pull_rows))
        .route("/interface/:tname/attribute", get(table_attribute))
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_headers(Any)
                .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS]),
        )
        .with_state(state)
}
