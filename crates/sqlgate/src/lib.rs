//! sqlgate - entity-level access to MySQL.
//!
//! sqlgate maps entity descriptors onto MySQL tables, providing:
//!
//! - Filter-driven SQL generation with bound parameters
//! - A primary connection whose statements wait until connect finishes
//! - Ordered transaction queues on pooled connections
//! - Schema reconciliation: create, alter, check or recreate tables
//!
//! # Quick Start
//!
//! ```ignore
//! use sqlgate::prelude::*;
//!
//! async fn example(cx: &Cx, connector: impl Connector) -> Result<()> {
//!     let adapter = MySqlAdapter::new(connector, MySqlConfig::from_url("mysql://root@localhost/shop")?)?;
//!     adapter.define(
//!         EntityDescriptor::new("Hero")
//!             .property(PropertyDescriptor::new("name", LogicalType::String).not_null())
//!             .property(PropertyDescriptor::new("age", LogicalType::Number)),
//!     );
//!
//!     adapter.connect(cx).await?;
//!     adapter.autoupdate(cx).await?;
//!
//!     let id = adapter
//!         .create(cx, "Hero", &Record::new().with("name", "Spider-Man").with("age", 25))
//!         .await?;
//!     let adults = adapter
//!         .all(cx, "Hero", &Filter::new().where_op("age", OperatorExpr::gt(18)))
//!         .await?;
//!
//!     let mut tx = adapter.start_transaction(cx).await?;
//!     tx.query_with("UPDATE `Hero` SET `age` = `age` + 1", Vec::new())?;
//!     tx.commit(cx).await?;
//!     Ok(())
//! }
//! ```
//!
//! # Crates
//!
//! - `sqlgate-core`: values, rows, records, entity descriptors, errors, transport traits
//! - `sqlgate-query`: filters and statement builders
//! - `sqlgate-pool`: the bounded transaction pool
//! - `sqlgate-schema`: DDL, introspection and diff
//! - `sqlgate-mysql`: executor, transactions and the adapter facade

// Re-export all public types from sub-crates
pub use sqlgate_core::{
    Connection, ConnectionConfig, Connector, Cx, DefaultValue, EntityDescriptor, Error,
    LogicalType, ModelRegistry, Outcome, PropertyDescriptor, QueryResult, Record, Result, Row,
    Value,
};

pub use sqlgate_query::{
    Condition, Filter, JoinSpec, OperatorExpr, Statement, count, delete, exists, find, insert,
    select, update, upsert,
};

pub use sqlgate_schema::{
    AlterClause, LiveColumn, alter_table, alter_table_sql, create_table_sql, drop_table_sql,
};

pub use sqlgate_pool::{Lease, Pool, PoolConfig, PoolStats};

pub use sqlgate_mysql::{
    AutoupdateReport, ConnectedSignal, MySqlAdapter, MySqlConfig, QueryLogger, StatementQueue,
    TableAction, Termination, TransactionQueue, TxState,
};

/// Prelude module for convenient imports.
///
/// ```ignore
/// use sqlgate::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        // Core types
        Connection,
        Connector,
        Cx,
        EntityDescriptor,
        Error,
        // Query building
        Filter,
        JoinSpec,
        LogicalType,
        // Adapter
        MySqlAdapter,
        MySqlConfig,
        OperatorExpr,
        Outcome,
        PropertyDescriptor,
        Record,
        Result,
        Row,
        TransactionQueue,
        Value,
    };
}

#[cfg(test)]
mod tests {
    use super::prelude::*;
    use asupersync::runtime::RuntimeBuilder;
    use sqlgate_core::testing::ScriptedConnector;

    #[test]
    fn test_prelude_round_trip() {
        let rt = RuntimeBuilder::current_thread()
            .build()
            .expect("create runtime");
        let cx = Cx::for_testing();
        let connector = ScriptedConnector::with_handler(|sql, _| {
            if sql.starts_with("INSERT") {
                Ok(crate::QueryResult::inserted(1))
            } else {
                Ok(crate::QueryResult::default())
            }
        });
        let adapter = MySqlAdapter::new(connector.clone(), MySqlConfig::new().pool_size(1))
            .expect("adapter");
        adapter.define(
            EntityDescriptor::new("Hero")
                .property(PropertyDescriptor::new("name", LogicalType::String).not_null()),
        );

        let id = rt.block_on(async {
            match adapter.connect(&cx).await {
                Outcome::Ok(()) => {}
                other => panic!("connect failed: {other:?}"),
            }
            match adapter
                .create(&cx, "Hero", &Record::new().with("name", "Spider-Man"))
                .await
            {
                Outcome::Ok(id) => id,
                other => panic!("create failed: {other:?}"),
            }
        });

        assert_eq!(id, Some(1));
        assert_eq!(
            connector.statements(),
            vec!["INSERT INTO `Hero` SET `name` = ?"]
        );
    }
}
