use std::collections::BTreeMap;
use thiserror::Error;

/// Per-column validation messages, keyed by column name.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

#[derive(Error, Debug)]
pub enum InterfaceError {
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Validation error: {}", summarize(.0))]
    Validation(FieldErrors),

    #[error("Authentication credentials were not provided or are invalid: {0}")]
    NotAuthenticated(String),

    #[error("You do not have permission to perform this action")]
    PermissionDenied,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Create table error: {0}")]
    TableCreation(String),

    #[error("Resolve table error: {0}")]
    Resolution(String),

    #[error("Service error: {0}")]
    Service(String),
}

impl InterfaceError {
    /// Builds a validation error carrying a single message for one column.
    pub fn field(column: impl Into<String>, message: impl Into<String>) -> Self {
        let mut fields = FieldErrors::new();
        fields.insert(column.into(), vec![message.into()]);
        Self::Validation(fields)
    }
}

fn summarize(fields: &FieldErrors) -> String {
    fields
        .iter()
        .map(|(column, messages)| format!("{}: {}", column, messages.join(" ")))
        .collect::<Vec<_>>()
        .join("; ")
}

pub type Result<T> = std::result::Result<T, InterfaceError>;

impl From<rusqlite::Error> for InterfaceError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Service(err.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for InterfaceError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::Service(format!("lock poisoned: {}", err))
    }
}
