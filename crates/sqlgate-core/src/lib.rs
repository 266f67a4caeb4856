//! Core types and traits for sqlgate.
//!
//! This crate provides the foundations shared by every layer:
//!
//! - `Value`, `Row` and `Record` for data flowing to and from the server
//! - `EntityDescriptor` / `PropertyDescriptor` supplied by the model layer
//! - `Connection` and `Connector` transport traits
//! - the value codec (`encode_param`, `encode_literal`, `from_database_row`)
//! - `Outcome` re-export from asupersync for cancel-correct operations
//! - `Cx` context for structured concurrency

// Re-export asupersync primitives for structured concurrency
pub use asupersync::{Cx, Outcome};

pub mod codec;
pub mod connection;
pub mod entity;
pub mod error;
pub mod identifiers;
pub mod record;
pub mod row;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod value;

pub use codec::{encode_literal, encode_param, format_datetime, from_database_row, parse_datetime};
pub use connection::{Connection, ConnectionConfig, Connector, QueryResult};
pub use entity::{
    DefaultValue, EntityDescriptor, ID_COLUMN, LogicalType, ModelRegistry, PropertyDescriptor,
};
pub use error::{
    ConfigError, ConnectionError, ConnectionErrorKind, Error, FieldValidationError, PoolError,
    PoolErrorKind, QueryError, QueryErrorKind, Result, SchemaError, SchemaErrorKind,
    TransactionError, TransactionErrorKind, TypeError, ValidationError, ValidationErrorKind,
};
pub use identifiers::{escape_string, quote_ident_mysql, quote_qualified};
pub use record::Record;
pub use row::{ColumnInfo, FromValue, Row};
pub use value::Value;
