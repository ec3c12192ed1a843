//! Orchestrates table creation and row access on behalf of a user.
//!
//! Every store operation runs on a blocking thread with one pooled connection
//! held for its whole duration.

use super::metadata::{self, InterfaceEntry};
use super::pagination::{self, PAGE_SIZE, PageSlice};
use super::provisioner;
use super::resolver::{self, RowAccessor};
use super::serializer::RowSerializer;
use super::validator;
use crate::auth::User;
use crate::connection::pool::ConnectionPool;
use crate::core::{Column, InterfaceError, Result};
use serde::Serialize;
use serde_json::{Map, Value as JsonValue};
use tracing::{debug, info, warn};

pub type WireRow = Map<String, JsonValue>;

/// Column descriptions and the leading rows of a table.
#[derive(Debug, Clone, Serialize)]
pub struct TableAttributes {
    pub tname: String,
    pub columns: Vec<Column>,
    pub count: u64,
    pub results: Vec<WireRow>,
}

#[derive(Clone)]
pub struct InterfaceService {
    pool: ConnectionPool,
}

impl InterfaceService {
    /// Wraps `pool` and makes sure the metadata table exists.
    pub async fn open(pool: ConnectionPool) -> Result<Self> {
        let service = Self { pool };
        service.run("ensure_schema", metadata::ensure_schema).await?;
        Ok(service)
    }

    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    /// Records `statement` as owned by `user`, then creates the table.
    ///
    /// The entry is committed first; if provisioning fails it stays behind.
    pub async fn create(&self, user: &User, statement: String) -> Result<InterfaceEntry> {
        if !validator::validate(&statement) {
            return Err(InterfaceError::Parse(
                "Sql is not a create table statement".to_string(),
            ));
        }
        let tname = validator::extract_table_name(&statement)?;
        if is_reserved(&tname) {
            warn!(tname = %tname, user = user.username(), "refused to create a store-managed table");
            return Err(InterfaceError::TableCreation(format!(
                "table {} already exists",
                tname
            )));
        }
        let owner = user.id();

        let entry = self
            .run("create", move |conn| {
                let entry = metadata::record(conn, owner, &statement, &tname)?;
                debug!(entry_id = entry.id, tname = %entry.tname, "interface entry recorded");

                provisioner::provision(conn, &statement).inspect_err(|err| {
                    warn!(entry_id = entry.id, error = %err, "provisioning failed after entry was recorded");
                })?;
                Ok(entry)
            })
            .await?;

        info!(tname = %entry.tname, owner = entry.owner, "table created");
        Ok(entry)
    }

    /// Lists recorded entries in creation order.
    pub async fn list(&self, page: u64) -> Result<PageSlice<InterfaceEntry>> {
        self.run("list", move |conn| {
            let count = metadata::count(conn)?;
            let offset = pagination::offset_for(page, count)?;
            let results = metadata::list(conn, PAGE_SIZE, offset)?;
            Ok(PageSlice {
                count,
                number: page,
                results,
            })
        })
        .await
    }

    /// Inserts one row into a table owned by `user` and returns it as stored.
    pub async fn push(&self, user: &User, tname: String, fields: WireRow) -> Result<WireRow> {
        let caller = user.id();
        self.run("push", move |conn| {
            let accessor = owned_accessor(conn, caller, &tname, InterfaceError::Resolution)?;
            let serializer = RowSerializer::build(&accessor, &tname);

            let values = serializer.from_wire(&fields)?;
            let row = accessor.insert(conn, &values)?;
            debug!(tname = %tname, serializer = serializer.name(), "row inserted");
            Ok(serializer.to_wire(&row))
        })
        .await
    }

    /// Reads one page of rows from a table owned by `user`.
    pub async fn pull(&self, user: &User, tname: String, page: u64) -> Result<PageSlice<WireRow>> {
        let caller = user.id();
        self.run("pull", move |conn| {
            let accessor = owned_accessor(conn, caller, &tname, InterfaceError::Resolution)?;
            let serializer = RowSerializer::build(&accessor, &tname);

            let count = accessor.count(conn)?;
            let offset = pagination::offset_for(page, count)?;
            let results = accessor
                .fetch(conn, PAGE_SIZE, offset)?
                .iter()
                .map(|row| serializer.to_wire(row))
                .collect();
            Ok(PageSlice {
                count,
                number: page,
                results,
            })
        })
        .await
    }

    /// Describes a table owned by `user` along with its first page of rows.
    ///
    /// Failures past the ownership check surface as service errors.
    pub async fn attribute(&self, user: &User, tname: String) -> Result<TableAttributes> {
        let caller = user.id();
        self.run("attribute", move |conn| {
            let accessor = owned_accessor(conn, caller, &tname, InterfaceError::Service)?;
            let serializer = RowSerializer::build(&accessor, &tname);

            let read = || -> Result<TableAttributes> {
                let count = accessor.count(conn)?;
                let results = accessor
                    .fetch(conn, PAGE_SIZE, 0)?
                    .iter()
                    .map(|row| serializer.to_wire(row))
                    .collect();
                Ok(TableAttributes {
                    tname: tname.clone(),
                    columns: serializer.columns().to_vec(),
                    count,
                    results,
                })
            };
            read().map_err(|err| InterfaceError::Service(err.to_string()))
        })
        .await
    }

    async fn run<T, F>(&self, operation: &'static str, work: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&rusqlite::Connection) -> Result<T> + Send + 'static,
    {
        self.pool.run(operation, work).await
    }
}

/// Tables the store manages itself. Recording an entry for one would hand its rows
/// to the caller.
fn is_reserved(tname: &str) -> bool {
    [metadata::ENTRIES_TABLE, crate::auth::USERS_TABLE]
        .iter()
        .any(|name| tname.eq_ignore_ascii_case(name))
        || tname
            .get(..7)
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case("sqlite_"))
}

/// Looks up the entry for `tname`, checks `caller` owns it, then resolves the table.
///
/// `on_unresolved` decides how a resolution failure is reported.
fn owned_accessor(
    conn: &rusqlite::Connection,
    caller: u64,
    tname: &str,
    on_unresolved: fn(String) -> InterfaceError,
) -> Result<RowAccessor> {
    let entry = metadata::find_by_table_name(conn, tname)?;
    if entry.owner != caller {
        warn!(tname, caller, owner = entry.owner, "rejected access to table owned by another user");
        return Err(InterfaceError::PermissionDenied);
    }

    resolver::resolve(conn, tname).map_err(|err| match err {
        InterfaceError::Resolution(message) => {
            on_unresolved(format!("Convert to model error: {}", message))
        }
        other => other,
    })
}
