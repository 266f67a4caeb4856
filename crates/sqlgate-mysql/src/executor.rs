//! Query executor.
//!
//! Every statement issued through the adapter's primary connection passes
//! through [`Executor::execute`], which
//!
//! - waits for the one-shot [`ConnectedSignal`] before touching the transport
//! - creates a missing database on `Unknown database '<name>'` and retries
//!   the statement once
//! - reports SQL text and elapsed time to `tracing` and an optional
//!   [`QueryLogger`]

use asupersync::sync::Notify;
use regex::Regex;
use sqlgate_core::{
    Connection, ConnectionError, ConnectionErrorKind, Cx, Error, Outcome, QueryResult, Value,
    quote_ident_mysql,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

/// Receives every executed statement with its wall-clock duration.
pub trait QueryLogger: Send + Sync {
    fn log(&self, sql: &str, elapsed: Duration);
}

impl<F> QueryLogger for F
where
    F: Fn(&str, Duration) + Send + Sync,
{
    fn log(&self, sql: &str, elapsed: Duration) {
        self(sql, elapsed);
    }
}

/// Reports statements to `tracing` at info level.
///
/// Installed by the adapter when `MySqlConfig::debug` is set and no other
/// logger is given.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl QueryLogger for TracingLogger {
    fn log(&self, sql: &str, elapsed: Duration) {
        let elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        tracing::info!(sql = %sql, elapsed_ms, "statement");
    }
}

#[derive(Default)]
struct SignalInner {
    fired: AtomicBool,
    notify: Notify,
}

/// One-shot latch fired when the adapter finishes connecting.
///
/// Waiters registered before [`ConnectedSignal::fire`] resume afterwards;
/// waiting on a fired signal completes immediately.
#[derive(Clone, Default)]
pub struct ConnectedSignal {
    inner: Arc<SignalInner>,
}

impl ConnectedSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the signal has fired.
    pub fn is_fired(&self) -> bool {
        self.inner.fired.load(Ordering::Acquire)
    }

    /// Fire the signal and wake all waiters. Later calls do nothing.
    pub fn fire(&self) {
        if self.inner.fired.swap(true, Ordering::AcqRel) {
            return;
        }
        tracing::debug!(
            waiters = self.inner.notify.waiter_count(),
            "connected signal fired"
        );
        self.inner.notify.notify_waiters();
    }

    /// Resolve once the signal has fired.
    pub async fn wait(&self) {
        loop {
            // Register before checking so a concurrent fire is not missed.
            let notified = self.inner.notify.notified();
            if self.is_fired() {
                return;
            }
            notified.await;
        }
    }
}

impl std::fmt::Debug for ConnectedSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectedSignal")
            .field("fired", &self.is_fired())
            .finish()
    }
}

/// Name of the missing database in an `Unknown database '<name>'` error.
pub fn unknown_database(error: &Error) -> Option<String> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    let pattern = PATTERN
        .get_or_init(|| Regex::new(r"(?i)^unknown database '(.*?)'").ok())
        .as_ref()?;
    let message = error.driver_message()?;
    pattern
        .captures(message)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Run one statement, reporting it to `tracing` and the logger.
pub async fn run_logged<C: Connection>(
    cx: &Cx,
    conn: &C,
    sql: &str,
    params: &[Value],
    logger: Option<&dyn QueryLogger>,
) -> Outcome<QueryResult, Error> {
    let started = Instant::now();
    let outcome = conn.query(cx, sql, params).await;
    let elapsed = started.elapsed();
    let elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
    match &outcome {
        Outcome::Ok(result) => tracing::debug!(
            sql = %sql,
            params = params.len(),
            rows = result.rows.len(),
            affected = result.affected_rows,
            elapsed_ms,
            "statement executed"
        ),
        Outcome::Err(e) => tracing::debug!(
            sql = %sql,
            params = params.len(),
            error = %e,
            elapsed_ms,
            "statement failed"
        ),
        Outcome::Cancelled(_) | Outcome::Panicked(_) => {}
    }
    if let Some(logger) = logger {
        logger.log(sql, elapsed);
    }
    outcome
}

/// Run one statement; on an unknown-database error create the database and
/// retry once.
pub async fn run_with_recovery<C: Connection>(
    cx: &Cx,
    conn: &C,
    sql: &str,
    params: &[Value],
    logger: Option<&dyn QueryLogger>,
) -> Outcome<QueryResult, Error> {
    let error = match run_logged(cx, conn, sql, params, logger).await {
        Outcome::Err(e) => e,
        other => return other,
    };
    let Some(database) = unknown_database(&error) else {
        return Outcome::Err(error);
    };

    tracing::warn!(database = %database, "unknown database, creating it and retrying");
    let create = format!("CREATE DATABASE {}", quote_ident_mysql(&database));
    match run_logged(cx, conn, &create, &[], logger).await {
        Outcome::Ok(_) => run_logged(cx, conn, sql, params, logger).await,
        Outcome::Err(create_error) => {
            tracing::warn!(
                database = %database,
                error = %create_error,
                "could not create missing database"
            );
            Outcome::Err(error)
        }
        Outcome::Cancelled(r) => Outcome::Cancelled(r),
        Outcome::Panicked(p) => Outcome::Panicked(p),
    }
}

/// Executes statements on the adapter's primary connection.
pub struct Executor<C> {
    conn: OnceLock<C>,
    connected: ConnectedSignal,
    logger: Option<Arc<dyn QueryLogger>>,
}

impl<C: Connection> Executor<C> {
    pub fn new(connected: ConnectedSignal) -> Self {
        Self {
            conn: OnceLock::new(),
            connected,
            logger: None,
        }
    }

    /// Report every statement to `logger`.
    pub fn with_logger(mut self, logger: Arc<dyn QueryLogger>) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn logger(&self) -> Option<&dyn QueryLogger> {
        self.logger.as_deref()
    }

    pub fn connected(&self) -> &ConnectedSignal {
        &self.connected
    }

    /// Install the primary connection. Only the first install takes effect.
    #[allow(clippy::result_large_err)]
    pub fn install(&self, conn: C) -> sqlgate_core::Result<()> {
        self.conn.set(conn).map_err(|_| {
            Error::Connection(ConnectionError {
                kind: ConnectionErrorKind::Connect,
                message: "primary connection already installed".to_string(),
                source: None,
            })
        })
    }

    /// The primary connection, once installed.
    pub fn connection(&self) -> Option<&C> {
        self.conn.get()
    }

    /// Execute a statement once the adapter is connected.
    pub async fn execute(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> Outcome<QueryResult, Error> {
        if !self.connected.is_fired() {
            tracing::trace!(sql = %sql, "deferring statement until connected");
            self.connected.wait().await;
        }
        let Some(conn) = self.conn.get() else {
            return Outcome::Err(Error::Connection(ConnectionError {
                kind: ConnectionErrorKind::NotConnected,
                message: "adapter has no open connection".to_string(),
                source: None,
            }));
        };
        run_with_recovery(cx, conn, sql, params, self.logger()).await
    }
}
