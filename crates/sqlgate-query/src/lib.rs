//! SQL generation for sqlgate.
//!
//! `sqlgate-query` turns entity descriptors plus per-call filters into MySQL
//! statement text and bound parameters. It performs no I/O.
//!
//! - **Filters**: [`Filter`], [`Condition`], [`OperatorExpr`], [`JoinSpec`]
//! - **Fragments**: [`build_where`], [`build_order_by`], [`build_limit`], [`build_join`]
//! - **Statements**: [`select`], [`insert`], [`update`], [`delete`], [`find`],
//!   [`exists`], [`count`], [`upsert`]

pub mod builder;
pub mod clause;
pub mod expr;
pub mod filter;

pub use builder::{Statement, count, delete, exists, find, insert, select, update, upsert};
pub use clause::{Fragment, build_join, build_limit, build_order_by, build_where};
pub use expr::{Condition, OperatorExpr};
pub use filter::{Filter, JoinSpec};
