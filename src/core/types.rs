use super::{DataType, Value};
use serde::Serialize;

pub type Row = Vec<Value>;

/// One column of a table as reported by the store's catalog.
#[derive(Debug, Clone, Serialize)]
pub struct Column {
    pub name: String,
    /// Type text exactly as written in the creating statement.
    pub declared_type: String,
    pub data_type: DataType,
    pub nullable: bool,
    pub has_default: bool,
    pub primary_key: bool,
    /// Value is generated by the store (rowid alias).
    pub auto_increment: bool,
    pub max_length: Option<usize>,
}

impl Column {
    pub fn new(name: impl Into<String>, declared_type: impl Into<String>) -> Self {
        let declared_type = declared_type.into();
        Self {
            name: name.into(),
            data_type: DataType::from_declared(&declared_type),
            max_length: DataType::max_length(&declared_type),
            declared_type,
            nullable: true,
            has_default: false,
            primary_key: false,
            auto_increment: false,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn with_default(mut self) -> Self {
        self.has_default = true;
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }

    /// Whether an insert must supply this column.
    pub fn is_required(&self) -> bool {
        !self.nullable && !self.has_default && !self.auto_increment
    }
}

#[derive(Debug, Clone)]
pub struct Schema {
    columns: Vec<Column>,
}

impl Schema {
    pub fn new(columns: Vec<Column>) -> Self {
        Self { columns }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn get_column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|col| col.name == name)
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn primary_key(&self) -> Vec<&Column> {
        self.columns.iter().filter(|col| col.primary_key).collect()
    }
}
