pub mod config;
pub mod pool;

use crate::core::Result;
use config::ConnectionConfig;
use rusqlite::OpenFlags;
use std::ops::{Deref, DerefMut};

/// Backing store connection handle
///
/// Wraps one SQLite connection opened with the pool's settings.
pub struct Connection {
    /// Unique connection ID
    id: u64,
    inner: rusqlite::Connection,
}

impl Connection {
    /// Open a new connection (internal use)
    pub(crate) fn open(id: u64, config: &ConnectionConfig) -> Result<Self> {
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let inner = if config.is_in_memory() {
            rusqlite::Connection::open_in_memory_with_flags(flags)?
        } else {
            rusqlite::Connection::open_with_flags(&config.database, flags)?
        };

        inner.execute_batch("PRAGMA foreign_keys = ON;")?;
        inner.busy_timeout(config.busy_timeout)?;
        if !config.is_in_memory() {
            // WAL lets readers proceed while another connection provisions a table.
            let _mode: String =
                inner.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        }

        Ok(Self { id, inner })
    }

    /// Get connection ID
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl Deref for Connection {
    type Target = rusqlite::Connection;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl DerefMut for Connection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.inner
    }
}

/// Quotes an identifier for inclusion in SQL text.
///
/// Doubles embedded quote characters, so any table or column name is safe to splice.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
