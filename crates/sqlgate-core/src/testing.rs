//! Scripted in-memory transport for tests.
//!
//! [`ScriptedConnector`] hands out [`ScriptedConnection`]s that share one
//! statement log and one handler. Each connection gets a sequence number so
//! tests can tell the primary connection apart from pooled ones.

use crate::connection::{ConnectionConfig, Connection, Connector, QueryResult};
use crate::error::{Error, QueryError, QueryErrorKind, Result};
use crate::value::Value;
use asupersync::{Cx, Outcome};
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

/// One statement seen by a scripted connection.
#[derive(Debug, Clone, PartialEq)]
pub struct Executed {
    /// Sequence number of the connection that ran it (0 = first opened)
    pub connection: usize,
    pub sql: String,
    pub params: Vec<Value>,
}

type Handler = dyn Fn(&str, &[Value]) -> Result<QueryResult> + Send + Sync;

#[derive(Default)]
struct ScriptState {
    executed: Vec<Executed>,
    opened: usize,
    fail_connect: Option<String>,
}

/// Shared script: statement log plus response handler.
#[derive(Clone)]
pub struct ScriptedConnector {
    state: Arc<Mutex<ScriptState>>,
    handler: Arc<Handler>,
}

impl ScriptedConnector {
    /// Every statement succeeds with an empty result.
    pub fn new() -> Self {
        Self::with_handler(|_, _| Ok(QueryResult::default()))
    }

    /// Answer statements through `handler`.
    pub fn with_handler<F>(handler: F) -> Self
    where
        F: Fn(&str, &[Value]) -> Result<QueryResult> + Send + Sync + 'static,
    {
        Self {
            state: Arc::new(Mutex::new(ScriptState::default())),
            handler: Arc::new(handler),
        }
    }

    /// Make every later `connect` fail with the given message.
    pub fn fail_connect(&self, message: impl Into<String>) {
        self.lock().fail_connect = Some(message.into());
    }

    /// Open a connection without going through the async path.
    pub fn open(&self) -> ScriptedConnection {
        let mut state = self.lock();
        let id = state.opened;
        state.opened += 1;
        ScriptedConnection {
            id,
            state: Arc::clone(&self.state),
            handler: Arc::clone(&self.handler),
        }
    }

    /// All statements executed so far, in order.
    pub fn executed(&self) -> Vec<Executed> {
        self.lock().executed.clone()
    }

    /// SQL text of all statements executed so far.
    pub fn statements(&self) -> Vec<String> {
        self.lock().executed.iter().map(|e| e.sql.clone()).collect()
    }

    /// SQL text executed on one connection.
    pub fn statements_on(&self, connection: usize) -> Vec<String> {
        self.lock()
            .executed
            .iter()
            .filter(|e| e.connection == connection)
            .map(|e| e.sql.clone())
            .collect()
    }

    /// Number of connections opened.
    pub fn opened(&self) -> usize {
        self.lock().opened
    }

    /// Forget recorded statements.
    pub fn clear(&self) {
        self.lock().executed.clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ScriptState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for ScriptedConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl Connector for ScriptedConnector {
    type Conn = ScriptedConnection;

    fn connect(
        &self,
        _cx: &Cx,
        _config: &ConnectionConfig,
    ) -> impl Future<Output = Outcome<Self::Conn, Error>> + Send {
        let failure = self.lock().fail_connect.clone();
        let conn = if failure.is_none() {
            Some(self.open())
        } else {
            None
        };
        async move {
            match (conn, failure) {
                (Some(conn), _) => Outcome::Ok(conn),
                (None, message) => Outcome::Err(Error::Connection(crate::error::ConnectionError {
                    kind: crate::error::ConnectionErrorKind::Connect,
                    message: message.unwrap_or_default(),
                    source: None,
                })),
            }
        }
    }
}

/// A connection answering from the shared script.
pub struct ScriptedConnection {
    id: usize,
    state: Arc<Mutex<ScriptState>>,
    handler: Arc<Handler>,
}

impl ScriptedConnection {
    /// Sequence number assigned at open.
    pub fn id(&self) -> usize {
        self.id
    }
}

impl std::fmt::Debug for ScriptedConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedConnection")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

impl Connection for ScriptedConnection {
    fn query(
        &self,
        _cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<QueryResult, Error>> + Send {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .executed
            .push(Executed {
                connection: self.id,
                sql: sql.to_string(),
                params: params.to_vec(),
            });
        let answer = (self.handler)(sql, params);
        async move {
            match answer {
                Ok(result) => Outcome::Ok(result),
                Err(e) => Outcome::Err(e),
            }
        }
    }
}

/// A server-side error as the driver would report it.
pub fn server_error(message: impl Into<String>) -> Error {
    Error::Query(QueryError::new(QueryErrorKind::Database, message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use asupersync::runtime::RuntimeBuilder;

    #[test]
    fn test_scripted_connections_share_log() {
        let rt = RuntimeBuilder::current_thread()
            .build()
            .expect("create runtime");
        let cx = Cx::for_testing();
        let connector = ScriptedConnector::with_handler(|sql, _| {
            if sql.starts_with("BAD") {
                Err(server_error("syntax"))
            } else {
                Ok(QueryResult::affected(1))
            }
        });

        rt.block_on(async {
            let a = match connector.connect(&cx, &ConnectionConfig::default()).await {
                Outcome::Ok(c) => c,
                other => panic!("connect failed: {other:?}"),
            };
            let b = connector.open();

            assert!(matches!(a.query(&cx, "SELECT 1", &[]).await, Outcome::Ok(_)));
            assert!(matches!(
                b.query(&cx, "BAD", &[Value::Int(1)]).await,
                Outcome::Err(_)
            ));
        });

        assert_eq!(connector.opened(), 2);
        assert_eq!(connector.statements(), vec!["SELECT 1", "BAD"]);
        assert_eq!(connector.statements_on(1), vec!["BAD"]);
        assert_eq!(connector.executed()[1].params, vec![Value::Int(1)]);
    }

    #[test]
    fn test_fail_connect() {
        let rt = RuntimeBuilder::current_thread()
            .build()
            .expect("create runtime");
        let cx = Cx::for_testing();
        let connector = ScriptedConnector::new();
        connector.fail_connect("refused");

        rt.block_on(async {
            match connector.connect(&cx, &ConnectionConfig::default()).await {
                Outcome::Err(e) => assert!(e.is_connection_error()),
                other => panic!("expected error, got {other:?}"),
            }
        });
        assert_eq!(connector.opened(), 0);
    }
}
