use crate::core::{InterfaceError, Result};
use rusqlite::{Connection, Row, params};
use serde::Serialize;
use tracing::error;

pub(crate) const ENTRIES_TABLE: &str = "interface_entries";

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS interface_entries (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    owner INTEGER NOT NULL,
    sql TEXT NOT NULL,
    tname TEXT NOT NULL
)
"#;

/// Ownership record of one dynamically created table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InterfaceEntry {
    pub id: i64,
    pub owner: u64,
    pub sql: String,
    pub tname: String,
}

impl InterfaceEntry {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            owner: row.get(1)?,
            sql: row.get(2)?,
            tname: row.get(3)?,
        })
    }
}

/// Creates the metadata table if it does not exist yet.
pub fn ensure_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

/// Inserts one entry. `tname` is deliberately not unique.
pub fn record(conn: &Connection, owner: u64, sql: &str, tname: &str) -> Result<InterfaceEntry> {
    let entry = conn.query_row(
        "INSERT INTO interface_entries (owner, sql, tname) VALUES (?1, ?2, ?3) \
         RETURNING id, owner, sql, tname",
        params![owner, sql, tname],
        InterfaceEntry::from_row,
    )?;
    Ok(entry)
}

/// Finds the single entry for `tname`.
///
/// Zero or several matches mean the one-entry-per-table invariant is broken, which
/// is reported as a service fault rather than a client error.
pub fn find_by_table_name(conn: &Connection, tname: &str) -> Result<InterfaceEntry> {
    let mut stmt = conn.prepare(
        "SELECT id, owner, sql, tname FROM interface_entries WHERE tname = ?1 ORDER BY id",
    )?;
    let mut entries = stmt
        .query_map(params![tname], InterfaceEntry::from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    match entries.len() {
        1 => Ok(entries.remove(0)),
        found => {
            error!(tname, found, "interface entry lookup did not match exactly one record");
            Err(InterfaceError::Service(format!(
                "Relation table error: expected one entry for '{}', found {}",
                tname, found
            )))
        }
    }
}

pub fn count(conn: &Connection) -> Result<u64> {
    let count = conn.query_row("SELECT COUNT(*) FROM interface_entries", [], |row| {
        row.get(0)
    })?;
    Ok(count)
}

pub fn list(conn: &Connection, limit: u64, offset: u64) -> Result<Vec<InterfaceEntry>> {
    let mut stmt = conn.prepare(
        "SELECT id, owner, sql, tname FROM interface_entries ORDER BY id LIMIT ?1 OFFSET ?2",
    )?;
    let entries = stmt
        .query_map(params![limit, offset], InterfaceEntry::from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        ensure_schema(&conn).unwrap();
        conn
    }

    #[test]
    fn record_then_find() {
        let conn = store();
        let created = record(&conn, 3, "CREATE TABLE t (a int)", "t").unwrap();
        assert_eq!(created.owner, 3);

        let found = find_by_table_name(&conn, "t").unwrap();
        assert_eq!(found, created);
    }

    #[test]
    fn missing_entry_is_a_service_fault() {
        let conn = store();
        assert!(matches!(
            find_by_table_name(&conn, "nope"),
            Err(InterfaceError::Service(_))
        ));
    }

    #[test]
    fn duplicate_entries_are_a_service_fault() {
        let conn = store();
        record(&conn, 1, "CREATE TABLE t (a int)", "t").unwrap();
        record(&conn, 2, "CREATE TABLE t (b int)", "t").unwrap();

        assert!(matches!(
            find_by_table_name(&conn, "t"),
            Err(InterfaceError::Service(_))
        ));
    }

    #[test]
    fn ensure_schema_is_repeatable() {
        let conn = store();
        ensure_schema(&conn).unwrap();
        assert_eq!(count(&conn).unwrap(), 0);
    }

    #[test]
    fn list_pages_in_id_order() {
        let conn = store();
        for i in 0..5 {
            record(&conn, 1, "CREATE TABLE x (a int)", &format!("t{}", i)).unwrap();
        }

        assert_eq!(count(&conn).unwrap(), 5);
        let page = list(&conn, 2, 2).unwrap();
        let names: Vec<_> = page.iter().map(|e| e.tname.as_str()).collect();
        assert_eq!(names, vec!["t2", "t3"]);
    }
}
