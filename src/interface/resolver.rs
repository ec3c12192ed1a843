//! Runtime row access for tables whose shape is only known to the store.
//!
//! Nothing here is cached: every request introspects the catalog again, so a table
//! altered out-of-band is seen with its current columns.

use crate::connection::quote_ident;
use crate::core::{Column, InterfaceError, Result, Row, Schema, Value};
use rusqlite::{Connection, ErrorCode, params, params_from_iter};

/// Handle for reading and writing rows of one dynamic table.
#[derive(Debug, Clone)]
pub struct RowAccessor {
    table: String,
    schema: Schema,
}

/// Introspects `table` and builds an accessor mirroring its columns.
pub fn resolve(conn: &Connection, table: &str) -> Result<RowAccessor> {
    let mut stmt = conn
        .prepare(
            "SELECT name, type, \"notnull\", dflt_value IS NOT NULL, pk \
             FROM pragma_table_info(?1) ORDER BY cid",
        )
        .map_err(resolution_error)?;

    let described = stmt
        .query_map(params![table], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, bool>(2)?,
                row.get::<_, bool>(3)?,
                row.get::<_, i64>(4)?,
            ))
        })
        .map_err(resolution_error)?
        .collect::<rusqlite::Result<Vec<_>>>()
        .map_err(resolution_error)?;

    if described.is_empty() {
        return Err(InterfaceError::Resolution(format!(
            "Table '{}' does not exist",
            table
        )));
    }

    let key_count = described.iter().filter(|(.., pk)| *pk > 0).count();
    let columns = described
        .into_iter()
        .map(|(name, declared, not_null, has_default, pk)| {
            let mut column = Column::new(name, declared);
            if not_null {
                column = column.not_null();
            }
            if has_default {
                column = column.with_default();
            }
            if pk > 0 {
                column = column.primary_key();
                // A lone INTEGER PRIMARY KEY aliases the rowid and is filled in by the store.
                if key_count == 1 && column.declared_type.eq_ignore_ascii_case("INTEGER") {
                    column = column.auto_increment();
                }
            }
            column
        })
        .collect();

    Ok(RowAccessor {
        table: table.to_string(),
        schema: Schema::new(columns),
    })
}

impl RowAccessor {
    pub fn table_name(&self) -> &str {
        &self.table
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Inserts one row and returns it as stored, defaults and generated keys included.
    ///
    /// Constraint failures reported by the store are the client's fault and come
    /// back as validation errors.
    pub fn insert(&self, conn: &Connection, values: &[(String, Value)]) -> Result<Row> {
        let table = quote_ident(&self.table);
        let returning = self.select_list();

        let sql = if values.is_empty() {
            format!("INSERT INTO {} DEFAULT VALUES RETURNING {}", table, returning)
        } else {
            let columns = values
                .iter()
                .map(|(name, _)| quote_ident(name))
                .collect::<Vec<_>>()
                .join(", ");
            let placeholders = (1..=values.len())
                .map(|i| format!("?{}", i))
                .collect::<Vec<_>>()
                .join(", ");
            format!(
                "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
                table, columns, placeholders, returning
            )
        };

        conn.query_row(
            &sql,
            params_from_iter(values.iter().map(|(_, value)| value)),
            |row| self.read_row(row),
        )
        .map_err(|err| self.insert_error(err))
    }

    pub fn count(&self, conn: &Connection) -> Result<u64> {
        let sql = format!("SELECT COUNT(*) FROM {}", quote_ident(&self.table));
        Ok(conn.query_row(&sql, [], |row| row.get(0))?)
    }

    /// Reads up to `limit` rows starting at `offset`, in key order.
    pub fn fetch(&self, conn: &Connection, limit: u64, offset: u64) -> Result<Vec<Row>> {
        let sql = format!(
            "SELECT {} FROM {} ORDER BY {} LIMIT ?1 OFFSET ?2",
            self.select_list(),
            quote_ident(&self.table),
            self.order_by()
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![limit, offset], |row| self.read_row(row))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn select_list(&self) -> String {
        self.schema
            .columns()
            .iter()
            .map(|col| quote_ident(&col.name))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn order_by(&self) -> String {
        let keys = self.schema.primary_key();
        if keys.is_empty() {
            "rowid".to_string()
        } else {
            keys.iter()
                .map(|col| quote_ident(&col.name))
                .collect::<Vec<_>>()
                .join(", ")
        }
    }

    fn read_row(&self, row: &rusqlite::Row<'_>) -> rusqlite::Result<Row> {
        (0..self.schema.column_count())
            .map(|idx| row.get_ref(idx).map(Value::from_sql_ref))
            .collect()
    }

    fn insert_error(&self, err: rusqlite::Error) -> InterfaceError {
        match &err {
            rusqlite::Error::SqliteFailure(failure, message)
                if matches!(
                    failure.code,
                    ErrorCode::ConstraintViolation | ErrorCode::TypeMismatch
                ) =>
            {
                let message = message.clone().unwrap_or_else(|| err.to_string());
                InterfaceError::field(self.blamed_column(&message), message)
            }
            _ => InterfaceError::from(err),
        }
    }

    /// Picks the column named in messages like `NOT NULL constraint failed: t.name`.
    fn blamed_column(&self, message: &str) -> String {
        message
            .rsplit(": ")
            .next()
            .and_then(|target| target.split(", ").next())
            .and_then(|qualified| qualified.rsplit('.').next())
            .filter(|name| self.schema.get_column(name).is_some())
            .map(str::to_string)
            .unwrap_or_else(|| "non_field_errors".to_string())
    }
}

fn resolution_error(err: rusqlite::Error) -> InterfaceError {
    InterfaceError::Resolution(err.to_string())
}
