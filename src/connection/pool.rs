use super::{Connection, config::ConnectionConfig};
use crate::core::{InterfaceError, Result};
use std::collections::VecDeque;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

/// Connection pool
///
/// Manages a pool of backing store connections shared by all request handlers.
/// Cloning the pool is cheap; clones share the same connections.
#[derive(Clone)]
pub struct ConnectionPool {
    shared: Arc<PoolShared>,
}

struct PoolShared {
    /// Pool configuration
    config: ConnectionConfig,
    /// Available connections
    available: Mutex<VecDeque<PooledConnection>>,
    /// Total number of connections created and not yet discarded
    total_connections: AtomicUsize,
    /// Next connection ID
    next_id: AtomicU64,
}

/// A connection from the pool
struct PooledConnection {
    connection: Connection,
    created_at: Instant,
    last_used: Instant,
}

impl PooledConnection {
    fn new(connection: Connection) -> Self {
        let now = Instant::now();
        Self {
            connection,
            created_at: now,
            last_used: now,
        }
    }

    fn is_expired(&self, max_lifetime: Option<Duration>) -> bool {
        if let Some(lifetime) = max_lifetime {
            self.created_at.elapsed() > lifetime
        } else {
            false
        }
    }

    fn is_idle_too_long(&self, idle_timeout: Option<Duration>) -> bool {
        if let Some(timeout) = idle_timeout {
            self.last_used.elapsed() > timeout
        } else {
            false
        }
    }
}

impl ConnectionPool {
    /// Create a new connection pool, opening the minimum number of connections.
    pub fn new(config: ConnectionConfig) -> Result<Self> {
        config.validate().map_err(InterfaceError::Service)?;

        let pool = Self {
            shared: Arc::new(PoolShared {
                config,
                available: Mutex::new(VecDeque::new()),
                total_connections: AtomicUsize::new(0),
                next_id: AtomicU64::new(1),
            }),
        };

        // Pre-create minimum connections
        pool.ensure_min_connections()?;

        Ok(pool)
    }

    /// Pool over a private in-memory database.
    pub fn in_memory() -> Result<Self> {
        Self::new(ConnectionConfig::in_memory())
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.shared.config
    }

    /// Get a connection from the pool
    pub async fn get_connection(&self) -> Result<PoolGuard> {
        let start = Instant::now();

        loop {
            // Try to get an available connection
            if let Some(pooled) = self.try_get_available()? {
                return Ok(PoolGuard {
                    connection: Some(pooled),
                    shared: Arc::clone(&self.shared),
                });
            }

            // Try to create a new connection if under limit
            if let Some(conn) = self.try_create_connection()? {
                return Ok(PoolGuard {
                    connection: Some(PooledConnection::new(conn)),
                    shared: Arc::clone(&self.shared),
                });
            }

            // Check timeout
            if start.elapsed() > self.shared.config.connect_timeout {
                return Err(InterfaceError::Service(
                    "Connection pool timeout: no connections available".into(),
                ));
            }

            // Wait a bit before retrying
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    /// Runs blocking store `work` on one pooled connection, off the async workers.
    ///
    /// `operation` names the work in logs and errors.
    pub async fn run<T, F>(&self, operation: &'static str, work: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&rusqlite::Connection) -> Result<T> + Send + 'static,
    {
        let conn = self.get_connection().await?;
        tokio::task::spawn_blocking(move || work(&**conn))
            .await
            .map_err(|err| {
                error!(operation, error = %err, "store task did not complete");
                InterfaceError::Service(format!("{} did not complete", operation))
            })?
    }

    /// Try to get an available connection from the pool
    fn try_get_available(&self) -> Result<Option<PooledConnection>> {
        let config = &self.shared.config;
        let mut available = self.shared.available.lock()?;

        let before = available.len();
        available.retain(|pooled| {
            !pooled.is_expired(config.max_lifetime) && !pooled.is_idle_too_long(config.idle_timeout)
        });
        let removed = before - available.len();

        if removed > 0 {
            debug!(removed, "discarded expired pooled connections");
            self.shared
                .total_connections
                .fetch_sub(removed, Ordering::SeqCst);
        }

        Ok(available.pop_front())
    }

    /// Try to create a new connection if under limit
    fn try_create_connection(&self) -> Result<Option<Connection>> {
        let max = self.shared.config.max_connections;
        let reserved = self
            .shared
            .total_connections
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |total| {
                (total < max).then_some(total + 1)
            });
        if reserved.is_err() {
            return Ok(None);
        }

        let id = self.shared.next_id.fetch_add(1, Ordering::SeqCst);
        match Connection::open(id, &self.shared.config) {
            Ok(connection) => Ok(Some(connection)),
            Err(err) => {
                self.shared.total_connections.fetch_sub(1, Ordering::SeqCst);
                Err(err)
            }
        }
    }

    /// Ensure minimum number of connections
    fn ensure_min_connections(&self) -> Result<()> {
        while self.shared.total_connections.load(Ordering::SeqCst)
            < self.shared.config.min_connections
        {
            let Some(connection) = self.try_create_connection()? else {
                break;
            };
            self.shared
                .available
                .lock()?
                .push_back(PooledConnection::new(connection));
        }

        Ok(())
    }

    /// Get pool statistics
    pub fn stats(&self) -> PoolStats {
        let available = self
            .shared
            .available
            .lock()
            .map(|queue| queue.len())
            .unwrap_or(0);
        let total = self.shared.total_connections.load(Ordering::SeqCst);

        PoolStats {
            total_connections: total,
            available_connections: available,
            active_connections: total.saturating_sub(available),
            max_connections: self.shared.config.max_connections,
        }
    }
}

/// Connection pool statistics
#[derive(Debug, Clone)]
pub struct PoolStats {
    pub total_connections: usize,
    pub available_connections: usize,
    pub active_connections: usize,
    pub max_connections: usize,
}

impl std::fmt::Display for PoolStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Pool Stats: {}/{} active, {} available, max {}",
            self.active_connections,
            self.total_connections,
            self.available_connections,
            self.max_connections
        )
    }
}

/// RAII guard for pooled connections
///
/// Returns the connection to the pool when dropped. The guard is `Send`, so it can be
/// moved into `spawn_blocking` for the duration of a store operation.
pub struct PoolGuard {
    connection: Option<PooledConnection>,
    shared: Arc<PoolShared>,
}

impl Deref for PoolGuard {
    type Target = Connection;

    fn deref(&self) -> &Self::Target {
        match &self.connection {
            Some(pooled) => &pooled.connection,
            None => unreachable!("connection is only taken on drop"),
        }
    }
}

impl DerefMut for PoolGuard {
    fn deref_mut(&mut self) -> &mut Self::Target {
        match &mut self.connection {
            Some(pooled) => &mut pooled.connection,
            None => unreachable!("connection is only taken on drop"),
        }
    }
}

impl Drop for PoolGuard {
    fn drop(&mut self) {
        let Some(mut pooled) = self.connection.take() else {
            return;
        };

        if !pooled.connection.is_autocommit() {
            // A transaction was left open; the connection cannot be reused safely.
            warn!(
                connection_id = pooled.connection.id(),
                "discarding pooled connection with an open transaction"
            );
            self.shared.total_connections.fetch_sub(1, Ordering::SeqCst);
            return;
        }

        pooled.last_used = Instant::now();
        match self.shared.available.lock() {
            Ok(mut available) => available.push_back(pooled),
            Err(_) => {
                warn!("connection pool lock poisoned; dropping connection");
                self.shared.total_connections.fetch_sub(1, Ordering::SeqCst);
            }
        }
    }
}
