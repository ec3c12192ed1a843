//! Account rows kept next to the interface metadata, so user ids outlive the process.

use super::User;
use crate::core::{InterfaceError, Result};
use rusqlite::{Connection, ErrorCode, OptionalExtension, Row, params};

pub(crate) const USERS_TABLE: &str = "auth_users";

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS auth_users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,
    is_admin INTEGER NOT NULL DEFAULT 0
)
"#;

fn from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User::new(row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

pub fn ensure_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

/// Inserts an account. A taken username is a client error.
pub fn insert(conn: &Connection, username: &str, password_hash: &str, is_admin: bool) -> Result<User> {
    conn.query_row(
        "INSERT INTO auth_users (username, password_hash, is_admin) VALUES (?1, ?2, ?3) \
         RETURNING id, username, password_hash, is_admin",
        params![username, password_hash, is_admin],
        from_row,
    )
    .map_err(|err| match err.sqlite_error_code() {
        Some(ErrorCode::ConstraintViolation) => {
            InterfaceError::Parse(format!("User '{}' already exists", username))
        }
        _ => err.into(),
    })
}

pub fn find_by_username(conn: &Connection, username: &str) -> Result<Option<User>> {
    let user = conn
        .query_row(
            "SELECT id, username, password_hash, is_admin FROM auth_users WHERE username = ?1",
            params![username],
            from_row,
        )
        .optional()?;
    Ok(user)
}
