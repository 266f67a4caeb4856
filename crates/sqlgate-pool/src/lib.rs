//! Bounded connection pool for sqlgate.
//!
//! The pool holds a fixed number of physical connections, filled once at
//! connect time. A connection is either idle in the pool or exclusively
//! leased through a [`Lease`] token. Leasing from an empty pool fails
//! immediately with [`PoolErrorKind::Exhausted`]; there is no waiting.
//!
//! A lease goes back with [`Pool::release`], which consumes the token, so a
//! lease cannot be returned twice. Dropping a lease without releasing it
//! discards the connection and counts it as leaked.

use sqlgate_core::{ConfigError, Error, PoolError, PoolErrorKind, Result};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Connection pool configuration.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Maximum number of connections held by the pool
    pub max_connections: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self { max_connections: 5 }
    }
}

impl PoolConfig {
    /// Create a new pool configuration with the given max connections.
    pub fn new(max_connections: usize) -> Self {
        Self { max_connections }
    }

    /// Reject sizes the pool cannot honor.
    #[allow(clippy::result_large_err)]
    pub fn validate(&self) -> Result<()> {
        if self.max_connections == 0 {
            return Err(Error::Config(ConfigError {
                message: "pool size must be at least 1".to_string(),
                source: None,
            }));
        }
        Ok(())
    }
}

/// Pool statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Configured maximum
    pub capacity: usize,
    /// Connections waiting in the pool
    pub idle: usize,
    /// Connections currently leased
    pub leased: usize,
    /// Leases dropped without being released
    pub leaked: usize,
}

struct PoolInner<C> {
    idle: Vec<C>,
    leased: usize,
    leaked: usize,
    closed: bool,
}

type Shared<C> = Arc<Mutex<PoolInner<C>>>;

fn lock<C>(inner: &Shared<C>) -> MutexGuard<'_, PoolInner<C>> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A fixed-size set of connections.
pub struct Pool<C> {
    config: PoolConfig,
    inner: Shared<C>,
}

impl<C> Pool<C> {
    /// Create an empty pool; fill it with [`Pool::add`].
    #[allow(clippy::result_large_err)]
    pub fn new(config: PoolConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            inner: Arc::new(Mutex::new(PoolInner {
                idle: Vec::new(),
                leased: 0,
                leaked: 0,
                closed: false,
            })),
        })
    }

    /// Get the pool configuration.
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Put a freshly opened connection into the pool.
    #[allow(clippy::result_large_err)]
    pub fn add(&self, conn: C) -> Result<()> {
        let mut inner = lock(&self.inner);
        if inner.closed {
            return Err(closed());
        }
        if inner.idle.len() + inner.leased >= self.config.max_connections {
            return Err(Error::Pool(PoolError {
                kind: PoolErrorKind::Config,
                message: format!(
                    "pool already holds its maximum of {} connections",
                    self.config.max_connections
                ),
            }));
        }
        inner.idle.push(conn);
        Ok(())
    }

    /// Lease an idle connection, failing at once if none is idle.
    #[allow(clippy::result_large_err)]
    pub fn acquire(&self) -> Result<Lease<C>> {
        let mut inner = lock(&self.inner);
        if inner.closed {
            return Err(closed());
        }
        let Some(conn) = inner.idle.pop() else {
            return Err(Error::Pool(PoolError {
                kind: PoolErrorKind::Exhausted,
                message: format!(
                    "all {} pooled connections are leased ({} idle, {} leased)",
                    self.config.max_connections,
                    inner.idle.len(),
                    inner.leased
                ),
            }));
        };
        inner.leased += 1;
        tracing::trace!(leased = inner.leased, idle = inner.idle.len(), "lease acquired");
        Ok(Lease {
            conn,
            token: LeaseToken {
                pool: Arc::clone(&self.inner),
                released: false,
            },
        })
    }

    /// Return a leased connection. The lease must come from this pool.
    #[allow(clippy::result_large_err)]
    pub fn release(&self, lease: Lease<C>) -> Result<()> {
        if !Arc::ptr_eq(&lease.token.pool, &self.inner) {
            return Err(Error::Pool(PoolError {
                kind: PoolErrorKind::Config,
                message: "lease belongs to a different pool".to_string(),
            }));
        }
        let Lease { conn, mut token } = lease;
        token.released = true;
        let mut inner = lock(&self.inner);
        inner.leased = inner.leased.saturating_sub(1);
        if !inner.closed {
            inner.idle.push(conn);
        }
        tracing::trace!(leased = inner.leased, idle = inner.idle.len(), "lease released");
        Ok(())
    }

    /// Current statistics.
    pub fn stats(&self) -> PoolStats {
        let inner = lock(&self.inner);
        PoolStats {
            capacity: self.config.max_connections,
            idle: inner.idle.len(),
            leased: inner.leased,
            leaked: inner.leaked,
        }
    }

    /// True when no connection is idle.
    pub fn at_capacity(&self) -> bool {
        lock(&self.inner).idle.is_empty()
    }

    /// Stop leasing and hand back the idle connections.
    pub fn close(&self) -> Vec<C> {
        let mut inner = lock(&self.inner);
        inner.closed = true;
        std::mem::take(&mut inner.idle)
    }
}

fn closed() -> Error {
    Error::Pool(PoolError {
        kind: PoolErrorKind::Closed,
        message: "pool is closed".to_string(),
    })
}

/// Exclusive ownership of one pooled connection.
pub struct Lease<C> {
    conn: C,
    token: LeaseToken<C>,
}

impl<C> std::ops::Deref for Lease<C> {
    type Target = C;

    fn deref(&self) -> &Self::Target {
        &self.conn
    }
}

impl<C> std::fmt::Debug for Lease<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lease").finish_non_exhaustive()
    }
}

/// Accounts for a lease that is dropped instead of released.
struct LeaseToken<C> {
    pool: Shared<C>,
    released: bool,
}

impl<C> Drop for LeaseToken<C> {
    fn drop(&mut self) {
        if !self.released {
            let mut inner = lock(&self.pool);
            inner.leased = inner.leased.saturating_sub(1);
            inner.leaked += 1;
            tracing::warn!(
                leaked = inner.leaked,
                "pooled connection lease dropped without release; connection discarded"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled(n: usize) -> Pool<usize> {
        let pool = Pool::new(PoolConfig::new(n)).unwrap();
        for i in 0..n {
            pool.add(i).unwrap();
        }
        pool
    }

    #[test]
    fn test_zero_size_is_config_error() {
        assert!(matches!(
            Pool::<usize>::new(PoolConfig::new(0)),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_add_beyond_capacity_rejected() {
        let pool = filled(2);
        assert!(pool.add(99).is_err());
    }

    #[test]
    fn test_exhaustion_is_immediate_error() {
        let pool = filled(5);
        let leases: Vec<_> = (0..5).map(|_| pool.acquire().unwrap()).collect();

        match pool.acquire() {
            Err(Error::Pool(e)) => assert_eq!(e.kind, PoolErrorKind::Exhausted),
            other => panic!("expected exhaustion, got {other:?}"),
        }
        assert_eq!(pool.stats().leased, 5);

        for lease in leases {
            pool.release(lease).unwrap();
        }
        assert_eq!(
            pool.stats(),
            PoolStats {
                capacity: 5,
                idle: 5,
                leased: 0,
                leaked: 0
            }
        );
    }

    #[test]
    fn test_release_restores_capacity() {
        let pool = filled(1);
        let lease = pool.acquire().unwrap();
        assert!(pool.at_capacity());
        pool.release(lease).unwrap();
        assert!(!pool.at_capacity());
        let again = pool.acquire().unwrap();
        assert_eq!(*again, 0);
        pool.release(again).unwrap();
    }

    #[test]
    fn test_dropped_lease_counts_as_leaked() {
        let pool = filled(2);
        {
            let _lease = pool.acquire().unwrap();
        }
        let stats = pool.stats();
        assert_eq!(stats.leaked, 1);
        assert_eq!(stats.leased, 0);
        assert_eq!(stats.idle, 1);
    }

    #[test]
    fn test_foreign_lease_rejected() {
        let a = filled(1);
        let b = filled(1);
        let lease = a.acquire().unwrap();
        assert!(b.release(lease).is_err());
        // The rejected lease was dropped inside `release`, so `a` sees it as leaked.
        assert_eq!(a.stats().leaked, 1);
        assert_eq!(b.stats().idle, 1);
    }

    #[test]
    fn test_closed_pool() {
        let pool = filled(2);
        let lease = pool.acquire().unwrap();
        assert_eq!(pool.close(), vec![0]);
        assert!(matches!(pool.acquire(), Err(Error::Pool(_))));
        pool.release(lease).unwrap();
        assert_eq!(pool.stats().idle, 0);
    }
}
