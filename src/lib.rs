// ============================================================================
// dbinterface Library
// ============================================================================

pub mod app;
pub mod auth;
pub mod config;
pub mod connection;
pub mod core;
pub mod interface;
pub mod state;
pub mod web;

// Re-export main types for convenience
pub use app::build_router;
pub use auth::{AuthManager, User};
pub use crate::core::{DataType, InterfaceError, Result, Value};
pub use interface::{InterfaceEntry, InterfaceService};
pub use state::AppState;

// Re-export connection API
pub use crate::connection::{
    Connection,
    config::ConnectionConfig,
    pool::{ConnectionPool, PoolGuard, PoolStats},
};
