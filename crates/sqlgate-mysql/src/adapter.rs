//! The adapter facade.
//!
//! [`MySqlAdapter`] ties the pieces together: models are registered with
//! [`MySqlAdapter::define`], CRUD operations address them by model name,
//! statements run on the primary connection through the [`Executor`], and
//! transactions lease dedicated connections from the [`Pool`].

use crate::config::MySqlConfig;
use crate::executor::{ConnectedSignal, Executor, QueryLogger, TracingLogger, run_with_recovery};
use crate::transaction::TransactionQueue;
use futures_util::future::join_all;
use regex::Regex;
use sqlgate_core::{
    Connection, Connector, Cx, EntityDescriptor, Error, ModelRegistry, Outcome, QueryErrorKind,
    QueryResult, Record, Result, Row, Value, escape_string, from_database_row, quote_ident_mysql,
};
use sqlgate_pool::{Lease, Pool};
use sqlgate_query::{Filter, Statement};
use sqlgate_schema::{LiveColumn, alter_table, alter_table_sql, live_columns, show_fields_sql};
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

/// What `autoupdate` did to one table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableAction {
    Created,
    Altered,
    Unchanged,
}

/// Outcome of an `autoupdate` run, one entry per model.
#[derive(Debug, Default)]
pub struct AutoupdateReport {
    pub created: Vec<String>,
    pub altered: Vec<String>,
    pub unchanged: Vec<String>,
    pub failed: Vec<(String, Error)>,
}

impl AutoupdateReport {
    /// True when no table failed.
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    /// Number of models processed.
    pub fn total(&self) -> usize {
        self.created.len() + self.altered.len() + self.unchanged.len() + self.failed.len()
    }
}

/// Entity-level access to one MySQL database.
pub struct MySqlAdapter<K: Connector> {
    connector: K,
    config: MySqlConfig,
    models: RwLock<ModelRegistry>,
    executor: Executor<K::Conn>,
    pool: Pool<K::Conn>,
}

impl<K: Connector> MySqlAdapter<K> {
    /// Create an unconnected adapter.
    #[allow(clippy::result_large_err)]
    pub fn new(connector: K, config: MySqlConfig) -> Result<Self> {
        let pool = Pool::new(config.pool_config())?;
        let mut executor = Executor::new(ConnectedSignal::new());
        if config.debug {
            executor = executor.with_logger(Arc::new(TracingLogger));
        }
        Ok(Self {
            connector,
            config,
            models: RwLock::new(ModelRegistry::new()),
            executor,
            pool,
        })
    }

    /// Report every statement to `logger`, replacing the `debug` tracer.
    pub fn with_logger<L>(mut self, logger: L) -> Self
    where
        L: QueryLogger + 'static,
    {
        self.executor = self.executor.with_logger(Arc::new(logger));
        self
    }

    pub fn config(&self) -> &MySqlConfig {
        &self.config
    }

    /// The primary-connection executor.
    pub fn executor(&self) -> &Executor<K::Conn> {
        &self.executor
    }

    /// The transaction connection pool.
    pub fn pool(&self) -> &Pool<K::Conn> {
        &self.pool
    }

    /// The one-shot signal fired once `connect` finishes.
    pub fn connected(&self) -> &ConnectedSignal {
        self.executor.connected()
    }

    pub fn is_connected(&self) -> bool {
        self.executor.connected().is_fired() && self.executor.connection().is_some()
    }

    // ========================================================================
    // Models
    // ========================================================================

    /// Register (or redefine) a model.
    pub fn define(&self, entity: EntityDescriptor) -> Arc<EntityDescriptor> {
        let entity = self
            .models
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .define(entity);
        tracing::debug!(
            model = entity.name(),
            table = entity.table_name(),
            columns = entity.properties().len(),
            "model defined"
        );
        entity
    }

    /// Look up a model by name.
    #[allow(clippy::result_large_err)]
    pub fn model(&self, name: &str) -> Result<Arc<EntityDescriptor>> {
        self.models
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
    }

    /// All models in definition order.
    pub fn models(&self) -> Vec<Arc<EntityDescriptor>> {
        self.models
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    // ========================================================================
    // Connection lifecycle
    // ========================================================================

    /// Open the primary connection and fill the transaction pool.
    ///
    /// Each connection selects the configured database with `USE`, creating
    /// it first if the server reports it unknown. The connected signal fires
    /// when this returns, successfully or not, so deferred statements never
    /// wait forever; after a failure they see a not-connected error.
    pub async fn connect(&self, cx: &Cx) -> Outcome<(), Error> {
        let outcome = self.open_all(cx).await;
        self.executor.connected().fire();
        match &outcome {
            Outcome::Ok(()) => tracing::info!(
                addr = %self.config.socket_addr(),
                database = self.config.database.as_deref().unwrap_or(""),
                pool = self.config.pool_size,
                "connected"
            ),
            Outcome::Err(e) => tracing::error!(
                addr = %self.config.socket_addr(),
                error = %e,
                "connect failed"
            ),
            Outcome::Cancelled(_) | Outcome::Panicked(_) => {}
        }
        outcome
    }

    async fn open_all(&self, cx: &Cx) -> Outcome<(), Error> {
        let primary = match self.open_one(cx).await {
            Outcome::Ok(conn) => conn,
            Outcome::Err(e) => return Outcome::Err(e),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        };
        if let Err(e) = self.executor.install(primary) {
            return Outcome::Err(e);
        }

        for _ in 0..self.config.pool_size {
            let conn = match self.open_one(cx).await {
                Outcome::Ok(conn) => conn,
                Outcome::Err(e) => return Outcome::Err(e),
                Outcome::Cancelled(r) => return Outcome::Cancelled(r),
                Outcome::Panicked(p) => return Outcome::Panicked(p),
            };
            if let Err(e) = self.pool.add(conn) {
                return Outcome::Err(e);
            }
        }
        Outcome::Ok(())
    }

    async fn open_one(&self, cx: &Cx) -> Outcome<K::Conn, Error> {
        let conn = match self
            .connector
            .connect(cx, &self.config.connection_config())
            .await
        {
            Outcome::Ok(conn) => conn,
            Outcome::Err(e) => return Outcome::Err(e),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        };
        if let Some(database) = &self.config.database {
            let sql = format!("USE {}", quote_ident_mysql(database));
            match run_with_recovery(cx, &conn, &sql, &[], self.executor.logger()).await {
                Outcome::Ok(_) => {}
                Outcome::Err(e) => return Outcome::Err(e),
                Outcome::Cancelled(r) => return Outcome::Cancelled(r),
                Outcome::Panicked(p) => return Outcome::Panicked(p),
            }
        }
        Outcome::Ok(conn)
    }

    // ========================================================================
    // Raw access
    // ========================================================================

    /// Run raw SQL on the primary connection.
    pub async fn query(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> Outcome<QueryResult, Error> {
        self.executor.execute(cx, sql, params).await
    }

    async fn run(&self, cx: &Cx, statement: &Statement) -> Outcome<QueryResult, Error> {
        self.executor
            .execute(cx, &statement.sql, &statement.params)
            .await
    }

    /// Lease a pooled connection outside any transaction.
    ///
    /// Hand it back with [`MySqlAdapter::release`].
    #[allow(clippy::result_large_err)]
    pub fn lease(&self) -> Result<Lease<K::Conn>> {
        self.pool.acquire()
    }

    #[allow(clippy::result_large_err)]
    pub fn release(&self, lease: Lease<K::Conn>) -> Result<()> {
        self.pool.release(lease)
    }

    /// Lease a pooled connection and `BEGIN` a transaction on it.
    ///
    /// Fails at once with a pool error when every connection is leased.
    pub async fn start_transaction(
        &self,
        cx: &Cx,
    ) -> Outcome<TransactionQueue<'_, K::Conn>, Error> {
        TransactionQueue::begin(cx, &self.pool, self.executor.logger()).await
    }

    fn escape(&self, s: &str) -> String {
        match self.executor.connection() {
            Some(conn) => conn.escape(s),
            None => escape_string(s),
        }
    }

    // ========================================================================
    // CRUD
    // ========================================================================

    /// Insert a row and return its generated key.
    ///
    /// Only declared columns present in `data` are written; with none the
    /// row is created from column defaults.
    pub async fn create(&self, cx: &Cx, model: &str, data: &Record) -> Outcome<Option<i64>, Error> {
        let statement = match self
            .model(model)
            .and_then(|entity| sqlgate_query::insert(&entity, data))
        {
            Ok(statement) => statement,
            Err(e) => return Outcome::Err(e),
        };
        match self.run(cx, &statement).await {
            Outcome::Ok(result) => Outcome::Ok(result.last_insert_id),
            Outcome::Err(e) => Outcome::Err(e),
            Outcome::Cancelled(r) => Outcome::Cancelled(r),
            Outcome::Panicked(p) => Outcome::Panicked(p),
        }
    }

    /// Fetch one row by key; a missing row is `None`.
    pub async fn find(
        &self,
        cx: &Cx,
        model: &str,
        id: impl Into<Value>,
    ) -> Outcome<Option<Row>, Error> {
        let id = id.into();
        let entity = match self.model(model) {
            Ok(entity) => entity,
            Err(e) => return Outcome::Err(e),
        };
        let statement = match sqlgate_query::find(&entity, &id) {
            Ok(statement) => statement,
            Err(e) => return Outcome::Err(e),
        };
        match self.run(cx, &statement).await {
            Outcome::Ok(result) => Outcome::Ok(
                result
                    .rows
                    .into_iter()
                    .next()
                    .map(|row| with_id(from_database_row(&entity, row), id)),
            ),
            Outcome::Err(e) => Outcome::Err(e),
            Outcome::Cancelled(r) => Outcome::Cancelled(r),
            Outcome::Panicked(p) => Outcome::Panicked(p),
        }
    }

    /// Update the row identified by `data`'s `id`.
    pub async fn save(&self, cx: &Cx, model: &str, data: &Record) -> Outcome<u64, Error> {
        let statement = match self
            .model(model)
            .and_then(|entity| sqlgate_query::update(&entity, data))
        {
            Ok(statement) => statement,
            Err(e) => return Outcome::Err(e),
        };
        match self.run(cx, &statement).await {
            Outcome::Ok(result) => Outcome::Ok(result.affected_rows),
            Outcome::Err(e) => Outcome::Err(e),
            Outcome::Cancelled(r) => Outcome::Cancelled(r),
            Outcome::Panicked(p) => Outcome::Panicked(p),
        }
    }

    /// Delete a row by key.
    pub async fn destroy(
        &self,
        cx: &Cx,
        model: &str,
        id: impl Into<Value>,
    ) -> Outcome<u64, Error> {
        let id = id.into();
        let statement = match self
            .model(model)
            .and_then(|entity| sqlgate_query::delete(&entity, &id))
        {
            Ok(statement) => statement,
            Err(e) => return Outcome::Err(e),
        };
        match self.run(cx, &statement).await {
            Outcome::Ok(result) => Outcome::Ok(result.affected_rows),
            Outcome::Err(e) => Outcome::Err(e),
            Outcome::Cancelled(r) => Outcome::Cancelled(r),
            Outcome::Panicked(p) => Outcome::Panicked(p),
        }
    }

    /// Whether exactly one row has this key.
    pub async fn exists(&self, cx: &Cx, model: &str, id: impl Into<Value>) -> Outcome<bool, Error> {
        let id = id.into();
        let statement = match self
            .model(model)
            .and_then(|entity| sqlgate_query::exists(&entity, &id))
        {
            Ok(statement) => statement,
            Err(e) => return Outcome::Err(e),
        };
        match self.run(cx, &statement).await {
            Outcome::Ok(result) => Outcome::Ok(result.rows.len() == 1),
            Outcome::Err(e) => Outcome::Err(e),
            Outcome::Cancelled(r) => Outcome::Cancelled(r),
            Outcome::Panicked(p) => Outcome::Panicked(p),
        }
    }

    /// Rows matching `filter`.
    ///
    /// With a join, rows are selected through the related model and only the
    /// filter's first equality condition applies.
    pub async fn all(&self, cx: &Cx, model: &str, filter: &Filter) -> Outcome<Vec<Row>, Error> {
        let entity = match self.model(model) {
            Ok(entity) => entity,
            Err(e) => return Outcome::Err(e),
        };
        let related = match filter.join.as_ref().map(|j| self.model(&j.model_name)) {
            None => None,
            Some(Ok(related)) => Some(related),
            Some(Err(e)) => return Outcome::Err(e),
        };
        let escape = |s: &str| self.escape(s);
        let statement =
            match sqlgate_query::select(&entity, filter, related.as_deref(), &escape) {
                Ok(statement) => statement,
                Err(e) => return Outcome::Err(e),
            };
        match self.run(cx, &statement).await {
            Outcome::Ok(result) => Outcome::Ok(
                result
                    .rows
                    .into_iter()
                    .map(|row| from_database_row(&entity, row))
                    .collect(),
            ),
            Outcome::Err(e) => Outcome::Err(e),
            Outcome::Cancelled(r) => Outcome::Cancelled(r),
            Outcome::Panicked(p) => Outcome::Panicked(p),
        }
    }

    /// `count(*)`, optionally restricted by equality/NULL conditions.
    pub async fn count(
        &self,
        cx: &Cx,
        model: &str,
        conditions: &[(String, Value)],
    ) -> Outcome<u64, Error> {
        let statement = match self
            .model(model)
            .and_then(|entity| sqlgate_query::count(&entity, conditions))
        {
            Ok(statement) => statement,
            Err(e) => return Outcome::Err(e),
        };
        match self.run(cx, &statement).await {
            Outcome::Ok(result) => match result.first() {
                Some(row) => match row.get_named::<u64>("cnt") {
                    Ok(n) => Outcome::Ok(n),
                    Err(e) => Outcome::Err(e),
                },
                None => Outcome::Ok(0),
            },
            Outcome::Err(e) => Outcome::Err(e),
            Outcome::Cancelled(r) => Outcome::Cancelled(r),
            Outcome::Panicked(p) => Outcome::Panicked(p),
        }
    }

    /// Insert or, on a duplicate key, update in one statement.
    ///
    /// When the server reports a generated key it is written back into
    /// `data` as `id`. Returns the record's `id` afterwards.
    pub async fn update_or_create(
        &self,
        cx: &Cx,
        model: &str,
        data: &mut Record,
    ) -> Outcome<Option<Value>, Error> {
        let statement = match self
            .model(model)
            .and_then(|entity| sqlgate_query::upsert(&entity, data))
        {
            Ok(statement) => statement,
            Err(e) => return Outcome::Err(e),
        };
        match self.run(cx, &statement).await {
            Outcome::Ok(result) => {
                if let Some(id) = result.last_insert_id.filter(|id| *id != 0) {
                    data.set_id(id);
                }
                Outcome::Ok(data.id().cloned())
            }
            Outcome::Err(e) => Outcome::Err(e),
            Outcome::Cancelled(r) => Outcome::Cancelled(r),
            Outcome::Panicked(p) => Outcome::Panicked(p),
        }
    }

    // ========================================================================
    // Schema
    // ========================================================================

    /// Live columns of a model's table, or `None` when the table is missing.
    pub async fn describe(
        &self,
        cx: &Cx,
        entity: &EntityDescriptor,
    ) -> Outcome<Option<Vec<LiveColumn>>, Error> {
        match self.executor.execute(cx, &show_fields_sql(entity), &[]).await {
            Outcome::Ok(result) => {
                let columns = live_columns(&result.rows);
                Outcome::Ok(if columns.is_empty() { None } else { Some(columns) })
            }
            Outcome::Err(e) if is_missing_table(&e) => {
                tracing::debug!(table = entity.table_name(), "table does not exist");
                Outcome::Ok(None)
            }
            Outcome::Err(e) => Outcome::Err(e),
            Outcome::Cancelled(r) => Outcome::Cancelled(r),
            Outcome::Panicked(p) => Outcome::Panicked(p),
        }
    }

    /// Create missing tables and alter existing ones to match their models.
    ///
    /// Tables are processed concurrently; a failure is logged and recorded
    /// in the report without stopping the others.
    pub async fn autoupdate(&self, cx: &Cx) -> Outcome<AutoupdateReport, Error> {
        let models = self.models();
        let outcomes = join_all(models.iter().map(|entity| self.update_table(cx, entity))).await;

        let mut report = AutoupdateReport::default();
        for (entity, outcome) in models.iter().zip(outcomes) {
            let table = entity.table_name().to_string();
            match outcome {
                Outcome::Ok(TableAction::Created) => report.created.push(table),
                Outcome::Ok(TableAction::Altered) => report.altered.push(table),
                Outcome::Ok(TableAction::Unchanged) => report.unchanged.push(table),
                Outcome::Err(e) => {
                    tracing::error!(table = %table, error = %e, "autoupdate failed");
                    report.failed.push((table, e));
                }
                Outcome::Cancelled(r) => return Outcome::Cancelled(r),
                Outcome::Panicked(p) => return Outcome::Panicked(p),
            }
        }
        tracing::info!(
            created = report.created.len(),
            altered = report.altered.len(),
            unchanged = report.unchanged.len(),
            failed = report.failed.len(),
            "autoupdate finished"
        );
        Outcome::Ok(report)
    }

    async fn update_table(&self, cx: &Cx, entity: &EntityDescriptor) -> Outcome<TableAction, Error> {
        let live = match self.describe(cx, entity).await {
            Outcome::Ok(live) => live,
            Outcome::Err(e) => return Outcome::Err(e),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        };

        let (sql, action) = match live {
            None => match sqlgate_schema::create_table_sql(entity) {
                Ok(sql) => (sql, TableAction::Created),
                Err(e) => return Outcome::Err(e),
            },
            Some(columns) => {
                let clauses = match alter_table(entity, &columns) {
                    Ok(clauses) => clauses,
                    Err(e) => return Outcome::Err(e),
                };
                match alter_table_sql(entity, &clauses) {
                    Some(sql) => (sql, TableAction::Altered),
                    None => return Outcome::Ok(TableAction::Unchanged),
                }
            }
        };

        match self.executor.execute(cx, &sql, &[]).await {
            Outcome::Ok(_) => Outcome::Ok(action),
            Outcome::Err(e) => Outcome::Err(e),
            Outcome::Cancelled(r) => Outcome::Cancelled(r),
            Outcome::Panicked(p) => Outcome::Panicked(p),
        }
    }

    /// Whether every model's table matches its declaration. Never alters.
    pub async fn is_actual(&self, cx: &Cx) -> Outcome<bool, Error> {
        let models = self.models();
        let outcomes = join_all(models.iter().map(|entity| self.table_is_actual(cx, entity))).await;

        let mut actual = true;
        for outcome in outcomes {
            match outcome {
                Outcome::Ok(ok) => actual &= ok,
                Outcome::Err(e) => return Outcome::Err(e),
                Outcome::Cancelled(r) => return Outcome::Cancelled(r),
                Outcome::Panicked(p) => return Outcome::Panicked(p),
            }
        }
        Outcome::Ok(actual)
    }

    async fn table_is_actual(&self, cx: &Cx, entity: &EntityDescriptor) -> Outcome<bool, Error> {
        match self.describe(cx, entity).await {
            Outcome::Ok(None) => Outcome::Ok(false),
            Outcome::Ok(Some(columns)) => match alter_table(entity, &columns) {
                Ok(clauses) => {
                    if !clauses.is_empty() {
                        tracing::debug!(
                            table = entity.table_name(),
                            changes = clauses.len(),
                            "table differs from model"
                        );
                    }
                    Outcome::Ok(clauses.is_empty())
                }
                Err(e) => Outcome::Err(e),
            },
            Outcome::Err(e) => Outcome::Err(e),
            Outcome::Cancelled(r) => Outcome::Cancelled(r),
            Outcome::Panicked(p) => Outcome::Panicked(p),
        }
    }

    /// Drop and recreate every model's table. Existing data is lost.
    pub async fn automigrate(&self, cx: &Cx) -> Outcome<(), Error> {
        for entity in self.models() {
            let create = match sqlgate_schema::create_table_sql(&entity) {
                Ok(sql) => sql,
                Err(e) => return Outcome::Err(e),
            };
            for sql in [sqlgate_schema::drop_table_sql(&entity), create] {
                match self.executor.execute(cx, &sql, &[]).await {
                    Outcome::Ok(_) => {}
                    Outcome::Err(e) => return Outcome::Err(e),
                    Outcome::Cancelled(r) => return Outcome::Cancelled(r),
                    Outcome::Panicked(p) => return Outcome::Panicked(p),
                }
            }
            tracing::debug!(table = entity.table_name(), "table recreated");
        }
        Outcome::Ok(())
    }
}

fn is_missing_table(error: &Error) -> bool {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    if matches!(error, Error::Query(q) if matches!(q.kind, QueryErrorKind::NotFound)) {
        return true;
    }
    let Some(pattern) = PATTERN
        .get_or_init(|| Regex::new(r"(?i)table '.*' doesn't exist").ok())
        .as_ref()
    else {
        return false;
    };
    error.driver_message().is_some_and(|m| pattern.is_match(m))
}

/// `row` with its `id` column set to `id`, prepending the column if absent.
fn with_id(mut row: Row, id: Value) -> Row {
    if row.set_by_name("id", id.clone()) {
        return row;
    }
    let (mut names, mut values) = (vec!["id".to_string()], vec![id]);
    for (name, value) in row.into_pairs() {
        names.push(name);
        values.push(value);
    }
    Row::new(names, values)
}

impl<K: Connector> std::fmt::Debug for MySqlAdapter<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MySqlAdapter")
            .field("addr", &self.config.socket_addr())
            .field("database", &self.config.database)
            .field("pool", &self.pool.stats())
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}
