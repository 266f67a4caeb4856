//! Transport traits.
//!
//! The wire driver is an external collaborator. sqlgate only needs:
//!
//! - [`Connection`] - execute one statement with bound `?` parameters and
//!   escape a string for inline SQL
//! - [`Connector`] - open new physical connections from a [`ConnectionConfig`]
//!
//! All I/O integrates with asupersync's structured concurrency via `Cx`.

use crate::error::Error;
use crate::identifiers::escape_string;
use crate::row::Row;
use crate::value::Value;
use asupersync::{Cx, Outcome};
use std::future::Future;
use std::time::Duration;

/// Everything a statement can return.
#[derive(Debug, Clone, Default)]
pub struct QueryResult {
    /// Result rows (empty for DML/DDL)
    pub rows: Vec<Row>,
    /// Rows affected by DML
    pub affected_rows: u64,
    /// Generated key of an INSERT, if any
    pub last_insert_id: Option<i64>,
}

impl QueryResult {
    /// A result set.
    pub fn with_rows(rows: Vec<Row>) -> Self {
        Self {
            rows,
            ..Self::default()
        }
    }

    /// A DML result.
    pub fn affected(affected_rows: u64) -> Self {
        Self {
            affected_rows,
            ..Self::default()
        }
    }

    /// An INSERT result carrying a generated key.
    pub fn inserted(id: i64) -> Self {
        Self {
            affected_rows: 1,
            last_insert_id: Some(id),
            ..Self::default()
        }
    }

    /// First row, if any.
    pub fn first(&self) -> Option<&Row> {
        self.rows.first()
    }
}

/// A physical connection to the server.
///
/// Placeholders are MySQL-style `?`. A `Value::Array` parameter is expanded
/// by the driver into a comma-separated list (used by `IN (?)`).
pub trait Connection: Send + Sync {
    /// Execute one statement.
    fn query(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<QueryResult, Error>> + Send;

    /// Render a string as a quoted literal for inline SQL.
    fn escape(&self, s: &str) -> String {
        escape_string(s)
    }
}

/// Factory for physical connections.
pub trait Connector: Send + Sync {
    /// The connection type produced.
    type Conn: Connection + 'static;

    /// Open a new connection. The database is selected afterwards with `USE`.
    fn connect(
        &self,
        cx: &Cx,
        config: &ConnectionConfig,
    ) -> impl Future<Output = Outcome<Self::Conn, Error>> + Send;
}

/// Server coordinates handed to a [`Connector`].
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: Option<String>,
    /// Connection timeout
    pub connect_timeout: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 3306,
            user: String::new(),
            password: None,
            connect_timeout: Duration::from_secs(30),
        }
    }
}

impl ConnectionConfig {
    /// `host:port` for socket addressing.
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_config_defaults() {
        let config = ConnectionConfig::default();
        assert_eq!(config.socket_addr(), "localhost:3306");
        assert_eq!(config.connect_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_query_result_constructors() {
        let inserted = QueryResult::inserted(9);
        assert_eq!(inserted.last_insert_id, Some(9));
        assert_eq!(inserted.affected_rows, 1);

        let rows = QueryResult::with_rows(vec![Row::new(vec!["a".into()], vec![Value::Int(1)])]);
        assert_eq!(rows.first().and_then(|r| r.get(0)), Some(&Value::Int(1)));
        assert!(QueryResult::affected(0).first().is_none());
    }
}
