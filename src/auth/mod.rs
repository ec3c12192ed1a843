//! Identity store and bearer tokens.
//!
//! Accounts are rows in the backing store, so the id recorded as a table's owner
//! refers to the same account after a restart. Tokens live in memory and end with
//! the process. Every request to the interface endpoints presents one.

mod store;

pub(crate) use store::USERS_TABLE;

use crate::connection::pool::ConnectionPool;
use crate::core::{InterfaceError, Result};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, error, info};
use uuid::Uuid;

/// User account
#[derive(Debug, Clone)]
pub struct User {
    id: u64,
    username: String,
    password_hash: String,
    is_admin: bool,
}

impl User {
    /// Creates a new user
    pub fn new(id: u64, username: String, password_hash: String, is_admin: bool) -> Self {
        Self {
            id,
            username,
            password_hash,
            is_admin,
        }
    }

    /// Returns the numeric identity used for table ownership
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Returns the username
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Checks if user is an administrator
    #[inline]
    pub fn is_admin(&self) -> bool {
        self.is_admin
    }
}

/// Authentication manager
///
/// Manages user accounts and the bearer tokens issued to them.
pub struct AuthManager {
    pool: ConnectionPool,
    tokens: RwLock<HashMap<String, String>>,
    cost: u32,
}

impl AuthManager {
    /// Opens the account table on `pool` and makes sure the administrator exists.
    ///
    /// An administrator left by an earlier run keeps its stored password.
    pub async fn open(pool: ConnectionPool, admin: &str, password: &str, cost: u32) -> Result<Self> {
        pool.run("ensure_users_schema", store::ensure_schema).await?;

        let manager = Self {
            pool,
            tokens: RwLock::new(HashMap::new()),
            cost,
        };
        manager.ensure_account(admin, password, true).await?;
        Ok(manager)
    }

    /// Hashes a password using bcrypt on a blocking thread
    async fn hash_password(password: &str, cost: u32) -> Result<String> {
        let password = password.to_string();
        tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
            .await
            .map_err(blocking_failed)?
            .map_err(|e| InterfaceError::Service(format!("Failed to hash password: {}", e)))
    }

    /// Verifies password against bcrypt hash on a blocking thread
    async fn verify_password(password: &str, hash: &str) -> Result<bool> {
        let (password, hash) = (password.to_string(), hash.to_string());
        let verified = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
            .await
            .map_err(blocking_failed)?;
        Ok(verified.unwrap_or(false))
    }

    async fn find(&self, username: &str) -> Result<Option<User>> {
        let username = username.to_string();
        self.pool
            .run("find_user", move |conn| store::find_by_username(conn, &username))
            .await
    }

    /// Authenticates a user
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<User> {
        let user = self.find(username).await?.ok_or_else(invalid_credentials)?;

        if !Self::verify_password(password, &user.password_hash).await? {
            return Err(invalid_credentials());
        }

        Ok(user)
    }

    /// Creates a new user and returns it
    pub async fn create_user(&self, username: &str, password: &str) -> Result<User> {
        self.insert_account(username, password, false).await
    }

    /// Creates a regular account unless `username` is already taken.
    ///
    /// Returns the stored account either way; an existing password is left alone.
    pub async fn ensure_user(&self, username: &str, password: &str) -> Result<User> {
        self.ensure_account(username, password, false).await
    }

    async fn ensure_account(&self, username: &str, password: &str, is_admin: bool) -> Result<User> {
        if let Some(user) = self.find(username).await? {
            debug!(username, id = user.id, "account already provisioned");
            return Ok(user);
        }
        self.insert_account(username, password, is_admin).await
    }

    async fn insert_account(&self, username: &str, password: &str, is_admin: bool) -> Result<User> {
        self.validate_username(username)?;
        self.validate_password(password)?; // Validate BEFORE hashing

        let password_hash = Self::hash_password(password, self.cost).await?;
        let name = username.to_string();
        let user = self
            .pool
            .run("insert_user", move |conn| {
                store::insert(conn, &name, &password_hash, is_admin)
            })
            .await?;

        info!(username, id = user.id, admin = is_admin, "account created");
        Ok(user)
    }

    /// Verifies credentials and issues a fresh bearer token
    pub async fn issue_token(&self, username: &str, password: &str) -> Result<String> {
        let user = self.authenticate(username, password).await?;
        let token = Uuid::new_v4().simple().to_string();

        self.tokens
            .write()
            .await
            .insert(token.clone(), user.username.clone());

        debug!(username, admin = user.is_admin(), "token stored");
        Ok(token)
    }

    /// Resolves a bearer token to its user
    pub async fn resolve_token(&self, token: &str) -> Result<User> {
        let username = self
            .tokens
            .read()
            .await
            .get(token)
            .cloned()
            .ok_or_else(|| InterfaceError::NotAuthenticated("Invalid token.".into()))?;

        // Tokens reference usernames; the account must still exist.
        self.find(&username)
            .await?
            .ok_or_else(|| InterfaceError::NotAuthenticated("User inactive or deleted.".into()))
    }

    /// Revokes a token; returns whether it existed
    pub async fn revoke_token(&self, token: &str) -> bool {
        self.tokens.write().await.remove(token).is_some()
    }

    /// Validates username
    fn validate_username(&self, username: &str) -> Result<()> {
        if username.is_empty() {
            return Err(InterfaceError::Parse("Username cannot be empty".into()));
        }

        if username.len() > 150 {
            return Err(InterfaceError::Parse(
                "Username too long (max 150 characters)".into(),
            ));
        }

        Ok(())
    }

    /// Validates password complexity
    ///
    /// Enforces the following rules:
    /// - Minimum 8 characters
    /// - Cannot be empty
    fn validate_password(&self, password: &str) -> Result<()> {
        if password.is_empty() {
            return Err(InterfaceError::Parse("Password cannot be empty".into()));
        }

        if password.len() < 8 {
            return Err(InterfaceError::Parse(
                "Password must be at least 8 characters long".into(),
            ));
        }

        Ok(())
    }
}

fn blocking_failed(err: tokio::task::JoinError) -> InterfaceError {
    error!(error = %err, "password hashing task did not complete");
    InterfaceError::Service("password hashing did not complete".to_string())
}

fn invalid_credentials() -> InterfaceError {
    InterfaceError::NotAuthenticated("Invalid username or password".into())
}
