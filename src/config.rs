use crate::connection::config::ConnectionConfig;
use clap::Parser;
use std::net::SocketAddr;
use std::time::Duration;

/// Server configuration, read from flags with environment fallbacks.
#[derive(Parser, Debug, Clone)]
#[command(name = "dbinterface", about = "REST API for tables defined at runtime")]
pub struct Cli {
    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1", env = "DBINTERFACE_HOST")]
    pub host: String,

    #[arg(long, default_value_t = 8000, env = "DBINTERFACE_PORT")]
    pub port: u16,

    /// SQLite database: `:memory:`, `sqlite://<path>` or a bare path
    #[arg(long, default_value = "dbinterface.db", env = "DATABASE_URL")]
    pub database: String,

    /// Ignored for in-memory databases, which use a single connection
    #[arg(long, default_value_t = 10, env = "DBINTERFACE_MAX_CONNECTIONS")]
    pub max_connections: usize,

    #[arg(long, default_value_t = 1, env = "DBINTERFACE_MIN_CONNECTIONS")]
    pub min_connections: usize,

    /// Seconds to wait for a free pooled connection
    #[arg(long, default_value_t = 30, env = "DBINTERFACE_CONNECT_TIMEOUT")]
    pub connect_timeout: u64,

    /// Seconds a pooled connection may sit unused before it is replaced
    #[arg(long, default_value_t = 600, env = "DBINTERFACE_IDLE_TIMEOUT")]
    pub idle_timeout: u64,

    /// Seconds a pooled connection lives before it is replaced
    #[arg(long, default_value_t = 1800, env = "DBINTERFACE_MAX_LIFETIME")]
    pub max_lifetime: u64,

    /// Username of the account created at startup
    #[arg(long, default_value = "admin", env = "DBINTERFACE_ADMIN_USER")]
    pub admin_user: String,

    #[arg(long, default_value = "adminpass", env = "DBINTERFACE_ADMIN_PASSWORD", hide_env_values = true)]
    pub admin_password: String,

    /// Regular account to provision at startup, as `name:password`; repeatable
    #[arg(
        long = "user",
        value_name = "NAME:PASSWORD",
        env = "DBINTERFACE_USERS",
        value_delimiter = ',',
        hide_env_values = true
    )]
    pub users: Vec<String>,

    #[arg(long, default_value_t = bcrypt::DEFAULT_COST, env = "DBINTERFACE_BCRYPT_COST")]
    pub bcrypt_cost: u32,
}

impl Cli {
    pub fn bind_addr(&self) -> Result<SocketAddr, String> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|err| format!("invalid listen address {}:{}: {}", self.host, self.port, err))
    }

    /// Pool settings derived from the flags.
    pub fn connection_config(&self) -> Result<ConnectionConfig, String> {
        let config = ConnectionConfig::from_url(&self.database)?;
        if config.is_in_memory() {
            return Ok(config);
        }

        let config = config
            .max_connections(self.max_connections)
            .min_connections(self.min_connections)
            .connect_timeout(Duration::from_secs(self.connect_timeout))
            .idle_timeout(Duration::from_secs(self.idle_timeout))
            .max_lifetime(Duration::from_secs(self.max_lifetime));
        config.validate()?;
        Ok(config)
    }

    /// Splits each `--user` value into a username and password.
    pub fn user_accounts(&self) -> Result<Vec<(String, String)>, String> {
        self.users
            .iter()
            .map(|entry| match entry.split_once(':') {
                Some((name, password)) if !name.is_empty() => {
                    Ok((name.to_string(), password.to_string()))
                }
                _ => Err(format!("--user expects NAME:PASSWORD, got '{}'", entry)),
            })
            .collect()
    }
}
