//! Gate for schema statements.
//!
//! Only the leading keywords are inspected; everything after the table name is
//! passed to the store untouched.

use crate::core::{InterfaceError, Result};

/// Accepts a statement iff its first two tokens are `CREATE TABLE`, in any case.
pub fn validate(statement: &str) -> bool {
    let mut tokens = statement.split_whitespace();
    matches!(
        (tokens.next(), tokens.next()),
        (Some(action), Some(object))
            if action.eq_ignore_ascii_case("CREATE") && object.eq_ignore_ascii_case("TABLE")
    )
}

/// Returns the table name named by a creation statement.
///
/// Takes the third token, drops backtick quoting and anything from a glued-on
/// column list (`t(a int)`). Call after [`validate`]; other statements yield
/// whatever their third token happens to be, so `CREATE TABLE IF NOT EXISTS t`
/// names `IF`.
///
/// Only backticks are stripped. SQLite also quotes identifiers with `"name"` and
/// `[name]`, and those characters stay in the returned name, which then matches no
/// table in the store.
pub fn extract_table_name(statement: &str) -> Result<String> {
    let token = statement.split_whitespace().nth(2).ok_or_else(|| {
        InterfaceError::Parse("Sql does not name a table".to_string())
    })?;

    let name = token.split('(').next().unwrap_or_default().replace('`', "");
    if name.is_empty() {
        return Err(InterfaceError::Parse(format!(
            "Sql names an empty table: '{}'",
            token
        )));
    }

    Ok(name)
}
