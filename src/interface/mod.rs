//! Runtime-defined tables: statement gate, ownership metadata, provisioning,
//! and generic row access.

pub mod metadata;
pub mod pagination;
pub mod provisioner;
pub mod resolver;
pub mod serializer;
pub mod service;
pub mod validator;

pub use metadata::InterfaceEntry;
pub use pagination::{PAGE_SIZE, Page, PageQuery, PageSlice};
pub use resolver::RowAccessor;
pub use serializer::RowSerializer;
pub use service::{InterfaceService, TableAttributes, WireRow};
