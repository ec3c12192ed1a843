//! Turns a validated statement into a physical table.

use super::validator::extract_table_name;
use crate::connection::quote_ident;
use crate::core::{InterfaceError, Result};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use tracing::{debug, info, warn};

const IDENTITY_COLUMN: &str = "id INTEGER PRIMARY KEY AUTOINCREMENT";
const SHADOW_SUFFIX: &str = "__provisioning";

/// Executes `statement`, then gives the table an `id` identity column unless the
/// statement mentions a primary key.
///
/// The statement commits on its own. When the second step fails, the table from
/// the first step stays behind without an identity column.
pub fn provision(conn: &Connection, statement: &str) -> Result<()> {
    conn.execute(statement, []).map_err(creation_error)?;

    if statement.to_lowercase().contains("primary key") {
        debug!("statement declares a primary key; no identity column added");
        return Ok(());
    }

    let tname = extract_table_name(statement)?;
    add_identity_column(conn, &tname, statement).inspect_err(|err| {
        warn!(tname = %tname, error = %err, "table created without identity column");
    })?;
    info!(tname = %tname, "identity column added");

    Ok(())
}

/// SQLite cannot `ALTER TABLE ... ADD` a primary key, so the table is rebuilt
/// from the statement's column list with the identity column in front.
///
/// The rebuild holds a write lock from start to finish. Any failure rolls it
/// back, so neither the shadow table nor a half-renamed table survives.
fn add_identity_column(conn: &Connection, tname: &str, statement: &str) -> Result<()> {
    let (open, close) = match (statement.find('('), statement.rfind(')')) {
        (Some(open), Some(close)) if open < close => (open, close),
        _ => {
            return Err(InterfaceError::TableCreation(
                "statement has no column list to extend with an id column".to_string(),
            ));
        }
    };
    let definitions = &statement[open + 1..close];
    let options = statement[close + 1..].trim().trim_end_matches(';');

    let table = quote_ident(tname);
    let shadow = quote_ident(&format!("{}{}", tname, SHADOW_SUFFIX));

    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)
        .map_err(creation_error)?;

    let existing = existing_columns(&tx, tname)?;
    if existing.is_empty() {
        return Err(InterfaceError::TableCreation(format!(
            "no columns found for table {}",
            table
        )));
    }
    let columns = existing
        .iter()
        .map(|name| quote_ident(name))
        .collect::<Vec<_>>()
        .join(", ");

    tx.execute(
        &format!(
            "CREATE TABLE {} ({}, {}) {}",
            shadow, IDENTITY_COLUMN, definitions, options
        ),
        [],
    )
    .map_err(creation_error)?;

    tx.execute_batch(&format!(
        "INSERT INTO {shadow} ({columns}) SELECT {columns} FROM {table};\n\
         DROP TABLE {table};\n\
         ALTER TABLE {shadow} RENAME TO {table};"
    ))
    .map_err(creation_error)?;

    tx.commit().map_err(creation_error)
}

fn existing_columns(conn: &Connection, tname: &str) -> Result<Vec<String>> {
    let mut stmt = conn
        .prepare("SELECT name FROM pragma_table_info(?1) ORDER BY cid")
        .map_err(creation_error)?;
    let names = stmt
        .query_map([tname], |row| row.get(0))
        .map_err(creation_error)?
        .collect::<rusqlite::Result<Vec<String>>>()
        .map_err(creation_error)?;
    Ok(names)
}

fn creation_error(err: rusqlite::Error) -> InterfaceError {
    InterfaceError::TableCreation(err.to_string())
}
