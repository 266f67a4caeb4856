//! Schema reconciliation for sqlgate.
//!
//! This crate provides:
//! - Column datatype mapping and `CREATE TABLE` / `DROP TABLE` DDL
//! - `SHOW FIELDS` parsing into [`LiveColumn`]s
//! - The declared-versus-live diff that drives `ALTER TABLE`
//!
//! Nothing here talks to a server; the adapter runs the statements.

pub mod ddl;
pub mod diff;
pub mod introspect;

pub use ddl::{
    ID_COLUMN_SQL, column_sql, create_table_sql, datatype, drop_table_sql, properties_sql,
    property_settings_sql,
};
pub use diff::{AlterClause, alter_table, alter_table_sql, column_changed};
pub use introspect::{LiveColumn, ParsedSqlType, live_columns, show_fields_sql};
