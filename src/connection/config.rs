use std::time::Duration;

const MEMORY: &str = ":memory:";

/// Backing store connection configuration
///
/// Similar to PostgreSQL/MySQL connection strings, pointed at a SQLite database.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Database file path, or `:memory:`
    pub database: String,

    /// Time to wait for a free connection
    pub connect_timeout: Duration,

    /// Time SQLite waits on a locked database before failing
    pub busy_timeout: Duration,

    /// Maximum number of connections in pool
    pub max_connections: usize,

    /// Minimum number of connections in pool
    pub min_connections: usize,

    /// Connection idle timeout
    pub idle_timeout: Option<Duration>,

    /// Maximum connection lifetime
    pub max_lifetime: Option<Duration>,
}

impl ConnectionConfig {
    /// Create a configuration for a database file
    pub fn new(database: &str) -> Self {
        Self {
            database: database.to_string(),
            connect_timeout: Duration::from_secs(30),
            busy_timeout: Duration::from_secs(5),
            max_connections: 10,
            min_connections: 1,
            idle_timeout: Some(Duration::from_secs(600)), // 10 minutes
            max_lifetime: Some(Duration::from_secs(1800)), // 30 minutes
        }
    }

    /// Private in-memory database.
    ///
    /// Every SQLite connection to `:memory:` opens its own database, so the pool is
    /// pinned to a single connection that is never recycled.
    pub fn in_memory() -> Self {
        Self {
            database: MEMORY.to_string(),
            max_connections: 1,
            min_connections: 1,
            idle_timeout: None,
            max_lifetime: None,
            ..Self::new(MEMORY)
        }
    }

    /// Set connection timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set SQLite busy timeout
    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    /// Set maximum connections
    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Set minimum connections
    pub fn min_connections(mut self, min: usize) -> Self {
        self.min_connections = min;
        self
    }

    /// Set idle timeout
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = Some(timeout);
        self
    }

    /// Set maximum lifetime
    pub fn max_lifetime(mut self, lifetime: Duration) -> Self {
        self.max_lifetime = Some(lifetime);
        self
    }

    pub fn is_in_memory(&self) -> bool {
        self.database == MEMORY
    }

    /// Parse from connection string
    ///
    /// Accepted forms: `sqlite::memory:`, `sqlite://<path>`, or a bare path.
    ///
    /// # Examples
    ///
    /// ```
    /// use dbinterface::ConnectionConfig;
    ///
    /// let config = ConnectionConfig::from_url("sqlite:///var/lib/dbinterface.db").unwrap();
    /// assert_eq!(config.database, "/var/lib/dbinterface.db");
    /// ```
    pub fn from_url(url: &str) -> Result<Self, String> {
        let url = url.trim();
        if url.is_empty() {
            return Err("database url cannot be empty".to_string());
        }

        if url == MEMORY || url == "sqlite::memory:" {
            return Ok(Self::in_memory());
        }

        let path = match url.strip_prefix("sqlite://") {
            Some(path) => path,
            None if url.contains("://") => {
                return Err("URL must start with 'sqlite://'".to_string());
            }
            None => url,
        };

        if path.is_empty() {
            return Err("Invalid database path".to_string());
        }

        Ok(Self::new(path))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.database.is_empty() {
            return Err("database cannot be empty".to_string());
        }

        if self.max_connections == 0 {
            return Err("max_connections must be > 0".to_string());
        }

        if self.min_connections > self.max_connections {
            return Err("min_connections cannot exceed max_connections".to_string());
        }

        if self.is_in_memory() && self.max_connections != 1 {
            return Err("an in-memory database supports exactly one connection".to_string());
        }

        Ok(())
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self::in_memory()
    }
}
