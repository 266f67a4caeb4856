//! Transaction queues.
//!
//! A [`TransactionQueue`] owns one leased pool connection for its whole
//! life. Statements are queued, then drained strictly in order; a
//! statement's continuation may queue more statements, which run before the
//! drain reports completion.
//!
//! ```text
//! Open ──execute──> Executing ──drained──> Open
//!   │                                       │
//!   └──────────── commit / rollback ────────┴──> Ended(Commit | Rollback)
//! ```
//!
//! Ending always releases the lease, whether or not the terminal statement
//! succeeded. A queue dropped before it ends discards its connection.

use crate::executor::{QueryLogger, run_logged};
use sqlgate_core::{
    Connection, Cx, Error, Outcome, QueryResult, TransactionError, TransactionErrorKind, Value,
};
use sqlgate_pool::{Lease, Pool};
use std::collections::VecDeque;
use std::fmt;

/// How a transaction ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    Commit,
    Rollback,
}

impl Termination {
    pub const fn as_sql(self) -> &'static str {
        match self {
            Termination::Commit => "COMMIT",
            Termination::Rollback => "ROLLBACK",
        }
    }
}

/// Transaction queue state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxState {
    /// Accepting statements
    Open,
    /// Draining the queue
    Executing,
    /// Committed or rolled back; the connection is back in the pool
    Ended(Termination),
}

/// Callback run after a queued statement completes.
///
/// It may push further statements onto the queue it is given.
pub type Continuation =
    Box<dyn FnOnce(&mut StatementQueue, std::result::Result<&QueryResult, &Error>) + Send>;

/// A statement waiting in a queue.
pub struct PendingStatement {
    pub sql: String,
    pub params: Vec<Value>,
    continuation: Option<Continuation>,
}

impl fmt::Debug for PendingStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingStatement")
            .field("sql", &self.sql)
            .field("params", &self.params)
            .field("continuation", &self.continuation.is_some())
            .finish()
    }
}

/// FIFO of pending statements.
#[derive(Debug, Default)]
pub struct StatementQueue {
    pending: VecDeque<PendingStatement>,
}

impl StatementQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a statement without parameters.
    pub fn push(&mut self, sql: impl Into<String>) -> &mut Self {
        self.push_with(sql, Vec::new())
    }

    /// Queue a statement with bound parameters.
    pub fn push_with(&mut self, sql: impl Into<String>, params: Vec<Value>) -> &mut Self {
        self.pending.push_back(PendingStatement {
            sql: sql.into(),
            params,
            continuation: None,
        });
        self
    }

    /// Queue a statement whose result is handed to `continuation`.
    pub fn push_then<F>(
        &mut self,
        sql: impl Into<String>,
        params: Vec<Value>,
        continuation: F,
    ) -> &mut Self
    where
        F: FnOnce(&mut StatementQueue, std::result::Result<&QueryResult, &Error>) + Send + 'static,
    {
        self.pending.push_back(PendingStatement {
            sql: sql.into(),
            params,
            continuation: Some(Box::new(continuation)),
        });
        self
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Pending statements, head first.
    pub fn iter(&self) -> impl Iterator<Item = &PendingStatement> {
        self.pending.iter()
    }

    fn pop(&mut self) -> Option<PendingStatement> {
        self.pending.pop_front()
    }

    fn clear(&mut self) {
        self.pending.clear();
    }
}

/// A transaction bound to one leased connection.
pub struct TransactionQueue<'a, C> {
    pool: &'a Pool<C>,
    lease: Option<Lease<C>>,
    queue: StatementQueue,
    state: TxState,
    logger: Option<&'a dyn QueryLogger>,
}

impl<'a, C: Connection> TransactionQueue<'a, C> {
    /// Lease a connection and issue `BEGIN`.
    ///
    /// Fails without suspending when the pool has no idle connection. If
    /// `BEGIN` fails the connection goes straight back to the pool.
    pub async fn begin(
        cx: &Cx,
        pool: &'a Pool<C>,
        logger: Option<&'a dyn QueryLogger>,
    ) -> Outcome<Self, Error> {
        let lease = match pool.acquire() {
            Ok(lease) => lease,
            Err(e) => return Outcome::Err(e),
        };
        match run_logged(cx, &*lease, "BEGIN", &[], logger).await {
            Outcome::Ok(_) => {}
            Outcome::Err(e) => {
                release(pool, lease);
                return Outcome::Err(e);
            }
            Outcome::Cancelled(r) => {
                release(pool, lease);
                return Outcome::Cancelled(r);
            }
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        }
        tracing::debug!(pool_idle = pool.stats().idle, "transaction started");
        Outcome::Ok(Self {
            pool,
            lease: Some(lease),
            queue: StatementQueue::new(),
            state: TxState::Open,
            logger,
        })
    }

    pub fn state(&self) -> TxState {
        self.state
    }

    /// The pending statements.
    pub fn queue(&self) -> &StatementQueue {
        &self.queue
    }

    /// The leased connection, until the transaction ends.
    pub fn connection(&self) -> Option<&C> {
        self.lease.as_deref()
    }

    /// Queue a statement.
    #[allow(clippy::result_large_err)]
    pub fn query(&mut self, sql: impl Into<String>) -> sqlgate_core::Result<&mut Self> {
        self.query_with(sql, Vec::new())
    }

    /// Queue a statement with bound parameters.
    #[allow(clippy::result_large_err)]
    pub fn query_with(
        &mut self,
        sql: impl Into<String>,
        params: Vec<Value>,
    ) -> sqlgate_core::Result<&mut Self> {
        self.ensure_open("queue a statement on")?;
        self.queue.push_with(sql, params);
        Ok(self)
    }

    /// Queue a statement whose result is handed to `continuation`.
    #[allow(clippy::result_large_err)]
    pub fn query_then<F>(
        &mut self,
        sql: impl Into<String>,
        params: Vec<Value>,
        continuation: F,
    ) -> sqlgate_core::Result<&mut Self>
    where
        F: FnOnce(&mut StatementQueue, std::result::Result<&QueryResult, &Error>) + Send + 'static,
    {
        self.ensure_open("queue a statement on")?;
        self.queue.push_then(sql, params, continuation);
        Ok(self)
    }

    /// Drain the queue, including statements queued by continuations.
    ///
    /// A failed statement with a continuation hands the error to it and the
    /// drain goes on. A failed statement without one stops the drain and
    /// returns the error; the remaining statements stay queued and the
    /// transaction stays open for the caller to roll back.
    pub async fn execute(&mut self, cx: &Cx) -> Outcome<(), Error> {
        if let Err(e) = self.ensure_open("execute") {
            return Outcome::Err(e);
        }
        let Some(conn) = self.lease.as_deref() else {
            return Outcome::Err(self.ended_error("execute"));
        };
        self.state = TxState::Executing;

        let mut executed = 0usize;
        while let Some(statement) = self.queue.pop() {
            let PendingStatement {
                sql,
                params,
                continuation,
            } = statement;
            let outcome = run_logged(cx, conn, &sql, &params, self.logger).await;
            executed += 1;
            match (outcome, continuation) {
                (Outcome::Ok(result), Some(next)) => next(&mut self.queue, Ok(&result)),
                (Outcome::Ok(_), None) => {}
                (Outcome::Err(e), Some(next)) => next(&mut self.queue, Err(&e)),
                (Outcome::Err(e), None) => {
                    self.state = TxState::Open;
                    return Outcome::Err(e);
                }
                (Outcome::Cancelled(r), _) => {
                    self.state = TxState::Open;
                    return Outcome::Cancelled(r);
                }
                (Outcome::Panicked(p), _) => return Outcome::Panicked(p),
            }
        }

        self.state = TxState::Open;
        tracing::trace!(executed, "transaction queue drained");
        Outcome::Ok(())
    }

    /// Drain anything queued, then `COMMIT`.
    pub async fn commit(&mut self, cx: &Cx) -> Outcome<QueryResult, Error> {
        if let Err(e) = self.ensure_open("commit") {
            return Outcome::Err(e);
        }
        if !self.queue.is_empty() {
            match self.execute(cx).await {
                Outcome::Ok(()) => {}
                Outcome::Err(e) => return Outcome::Err(e),
                Outcome::Cancelled(r) => return Outcome::Cancelled(r),
                Outcome::Panicked(p) => return Outcome::Panicked(p),
            }
        }
        self.end(cx, Termination::Commit).await
    }

    /// `ROLLBACK`, discarding anything still queued.
    pub async fn rollback(&mut self, cx: &Cx) -> Outcome<QueryResult, Error> {
        self.end(cx, Termination::Rollback).await
    }

    /// Send `COMMIT` or `ROLLBACK`, then release the connection.
    ///
    /// The queue is cleared and the lease returned even if the statement
    /// fails; its outcome is passed through.
    pub async fn end(
        &mut self,
        cx: &Cx,
        termination: Termination,
    ) -> Outcome<QueryResult, Error> {
        let verb = match termination {
            Termination::Commit => "commit",
            Termination::Rollback => "roll back",
        };
        if let Err(e) = self.ensure_open(verb) {
            return Outcome::Err(e);
        }
        let Some(lease) = self.lease.take() else {
            return Outcome::Err(self.ended_error(verb));
        };

        let outcome = run_logged(cx, &*lease, termination.as_sql(), &[], self.logger).await;
        self.state = TxState::Ended(termination);
        self.queue.clear();
        release(self.pool, lease);
        tracing::debug!(
            termination = termination.as_sql(),
            ok = matches!(outcome, Outcome::Ok(_)),
            "transaction ended"
        );
        outcome
    }

    #[allow(clippy::result_large_err)]
    fn ensure_open(&self, action: &str) -> sqlgate_core::Result<()> {
        match self.state {
            TxState::Ended(_) => Err(self.ended_error(action)),
            TxState::Open | TxState::Executing => Ok(()),
        }
    }

    fn ended_error(&self, action: &str) -> Error {
        let (kind, done) = match self.state {
            TxState::Ended(Termination::Rollback) => {
                (TransactionErrorKind::AlreadyRolledBack, "ROLLBACK")
            }
            _ => (TransactionErrorKind::AlreadyCommitted, "COMMIT"),
        };
        Error::Transaction(TransactionError {
            kind,
            message: format!("cannot {action} transaction, already performed {done}"),
        })
    }
}

fn release<C>(pool: &Pool<C>, lease: Lease<C>) {
    if let Err(e) = pool.release(lease) {
        tracing::warn!(error = %e, "could not return transaction connection to pool");
    }
}

impl<C> Drop for TransactionQueue<'_, C> {
    fn drop(&mut self) {
        if self.lease.is_some() {
            tracing::warn!(
                pending = self.queue.len(),
                "transaction queue dropped without commit or rollback"
            );
        }
    }
}

impl<C> fmt::Debug for TransactionQueue<'_, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionQueue")
            .field("state", &self.state)
            .field("pending", &self.queue.len())
            .finish_non_exhaustive()
    }
}
