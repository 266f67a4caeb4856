//! MySQL adapter for sqlgate.
//!
//! This crate drives a MySQL server through any [`Connector`] and provides:
//!
//! - [`MySqlConfig`] parsed from builder calls or a `mysql://` URL
//! - [`Executor`]: statements on the primary connection, deferred until
//!   `connect` finishes, with unknown-database recovery
//! - [`TransactionQueue`]: ordered statement queues on leased pool
//!   connections with continuations and `COMMIT`/`ROLLBACK`
//! - [`MySqlAdapter`]: the CRUD facade plus `autoupdate`, `is_actual` and
//!   `automigrate` schema reconciliation
//!
//! # Example
//!
//! ```rust,ignore
//! use sqlgate_mysql::{MySqlAdapter, MySqlConfig};
//!
//! let config = MySqlConfig::from_url("mysql://root@localhost/shop?pool=5")?;
//! let adapter = MySqlAdapter::new(connector, config)?;
//! adapter.define(EntityDescriptor::new("User")
//!     .property(PropertyDescriptor::new("name", LogicalType::String)));
//!
//! adapter.connect(&cx).await?;
//! adapter.autoupdate(&cx).await?;
//! let id = adapter.create(&cx, "User", &Record::new().with("name", "ann")).await?;
//! ```
//!
//! [`Connector`]: sqlgate_core::Connector

pub mod adapter;
pub mod config;
pub mod executor;
pub mod transaction;

pub use adapter::{AutoupdateReport, MySqlAdapter, TableAction};
pub use config::MySqlConfig;
pub use executor::{ConnectedSignal, Executor, QueryLogger, TracingLogger, unknown_database};
pub use transaction::{
    Continuation, PendingStatement, StatementQueue, Termination, TransactionQueue, TxState,
};
