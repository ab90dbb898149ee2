//! Startup health check.
//!
//! Runs once, after every repository has been constructed. It freezes the
//! registries, makes sure the `idGenerator` table exists, creates entity
//! tables under MySQL, and gives every numeric-key entity an id row. Existing
//! rows seed the counter store so ids are never re-issued after the store is
//! lost.

use std::sync::{Arc, PoisonError};

use tessera_db::{Entity, Schema, Value};
use tessera_events::{RepositoryEvent, TableStage};
use tracing::{debug, error, info, warn};

use crate::{
    context::RepositoryContext,
    error::{BootstrapError, RepoError},
    id_generator::{self, IdGenerator},
};

/// Lifecycle of the startup check. `Started` and `Aborted` are terminal: a
/// context runs the check at most once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapState {
    Uninitialized,
    Starting,
    Started { degraded: bool },
    /// A fatal error stopped the check before any DDL ran.
    Aborted,
}

/// Summary of one startup run.
#[derive(Debug, Clone, PartialEq)]
pub struct BootstrapReport {
    pub state: BootstrapState,
    pub tables_checked: usize,
    pub id_rows_created: usize,
    pub counters_reconciled: usize,
    pub failures: Vec<(String, String)>,
}

impl BootstrapReport {
    pub fn is_degraded(&self) -> bool {
        !self.failures.is_empty()
    }
}

enum IdRow {
    Created,
    Reconciled,
    NotNeeded,
}

pub struct HealthChecker {
    ctx: Arc<RepositoryContext>,
}

impl HealthChecker {
    pub fn new(ctx: &Arc<RepositoryContext>) -> Self {
        Self { ctx: ctx.clone() }
    }

    pub fn state(&self) -> BootstrapState {
        *self.ctx.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn begin(&self) -> Result<(), BootstrapError> {
        let mut state = self.ctx.state.lock().unwrap_or_else(PoisonError::into_inner);
        if *state != BootstrapState::Uninitialized {
            return Err(BootstrapError::AlreadyStarted);
        }
        *state = BootstrapState::Starting;
        drop(state);
        self.ctx.freeze();
        Ok(())
    }

    /// Runs the health check. Only a missing table mapping is an error;
    /// everything else is recorded in the report.
    pub fn on_started(&self) -> Result<BootstrapReport, BootstrapError> {
        self.begin()?;

        for repository in self.ctx.repositories() {
            let schema = repository.schema();
            debug!(type_name = schema.type_name(), "metadata ready");
        }
        let mut plans = Vec::new();
        for schema in self.ctx.entities() {
            let Some(sql) = self.ctx.mappers().try_to_create(schema) else {
                *self.ctx.state.lock().unwrap_or_else(PoisonError::into_inner) =
                    BootstrapState::Aborted;
                error!(type_name = schema.type_name(), "no table mapping, startup aborted");
                return Err(BootstrapError::MissingMapper {
                    type_name: schema.type_name().to_string(),
                });
            };
            plans.push((schema, sql));
        }

        let id_schema = IdGenerator::schema();
        let ddl = id_generator::create_table_sql(self.ctx.dialect());
        if let Err(err) = self.ctx.engine().execute(id_schema, &ddl, &[]) {
            warn!(error = %err, "could not create idGenerator table");
        }

        let mut report = BootstrapReport {
            state: BootstrapState::Starting,
            tables_checked: 0,
            id_rows_created: 0,
            counters_reconciled: 0,
            failures: Vec::new(),
        };
        for (schema, sql) in plans {
            if let Err(err) = self.check_table(schema, &sql) {
                warn!(type_name = schema.type_name(), error = %err, "table check failed");
                report.failures.push((schema.type_name().to_string(), err.to_string()));
                continue;
            }
            report.tables_checked += 1;

            match self.ensure_id_row(schema) {
                Ok(IdRow::Created) => report.id_rows_created += 1,
                Ok(IdRow::Reconciled) => report.counters_reconciled += 1,
                Ok(IdRow::NotNeeded) => {}
                Err(err) => {
                    warn!(type_name = schema.type_name(), error = %err, "id row check failed");
                    report.failures.push((schema.type_name().to_string(), err.to_string()));
                }
            }
        }

        let degraded = report.is_degraded();
        report.state = BootstrapState::Started { degraded };
        *self.ctx.state.lock().unwrap_or_else(PoisonError::into_inner) = report.state;

        info!(
            tables = report.tables_checked,
            id_rows = report.id_rows_created,
            reconciled = report.counters_reconciled,
            failures = report.failures.len(),
            "startup check {}",
            if degraded { "degraded" } else { "ok" }
        );
        self.ctx.events().emit(RepositoryEvent::BootstrapFinished {
            degraded,
            failures: report.failures.len(),
        });
        Ok(report)
    }

    /// Like [`HealthChecker::on_started`], but a fatal error ends the process.
    pub fn on_started_or_exit(&self) -> Result<BootstrapReport, BootstrapError> {
        match self.on_started() {
            Err(err) if err.is_fatal() => {
                error!("{err}");
                std::process::exit(1);
            }
            other => other,
        }
    }

    fn check_table(&self, schema: &Schema, sql: &str) -> Result<(), RepoError> {
        let stage = if self.ctx.dialect().creates_tables() {
            match self.ctx.engine().execute(schema, sql, &[]) {
                Ok(_) => TableStage::Created,
                Err(err) => {
                    self.emit_table(schema, TableStage::Failed(err.to_string()));
                    return Err(err.into());
                }
            }
        } else {
            TableStage::Skipped
        };
        self.emit_table(schema, stage);
        Ok(())
    }

    fn emit_table(&self, schema: &Schema, stage: TableStage) {
        self.ctx.events().emit(RepositoryEvent::TableChecked {
            type_name: schema.type_name().to_string(),
            stage,
        });
    }

    fn ensure_id_row(&self, schema: &Schema) -> Result<IdRow, RepoError> {
        let key = schema.require_key()?;
        if schema.has_text_key() {
            debug!(type_name = schema.type_name(), key = key.property, "text key, no id row");
            return Ok(IdRow::NotNeeded);
        }

        let engine = self.ctx.engine();
        let name = schema.type_name();
        let row = engine.get(IdGenerator::schema(), &Value::Text(name.to_string()))?;
        let Some(row) = row else {
            engine.create(IdGenerator::schema(), &IdGenerator::new(name, 0).to_record())?;
            self.ctx.events().emit(RepositoryEvent::IdRowInitialised {
                type_name: name.to_string(),
            });
            return Ok(IdRow::Created);
        };

        let max_id = IdGenerator::from_record(&row)?.max_id.unwrap_or(0);
        let counter = self
            .ctx
            .counter()
            .hset_max(self.ctx.id_map_key(), name, max_id)?;
        debug!(type_name = name, max_id, counter, "counter reconciled");
        self.ctx.events().emit(RepositoryEvent::CounterReconciled {
            type_name: name.to_string(),
            max_id,
            counter,
        });
        Ok(IdRow::Reconciled)
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::HashSet, sync::Mutex};

    use tessera_db::{
        define_entity, Criteria, DbError, Dialect, Direction, InCondition, Page, Record,
        ReduceCondition, Refresh, SqlEngine, SqliteEngine,
    };
    use tessera_events::CollectorSink;

    use super::*;
    use crate::{counter::CounterStore, repository::Repository};

    /// Records every raw statement and runs it on SQLite without MySQL table options.
    struct RecordingEngine {
        inner: SqliteEngine,
        executed: Mutex<Vec<String>>,
        failing_tables: HashSet<&'static str>,
    }

    impl RecordingEngine {
        fn new(failing_tables: &[&'static str]) -> Self {
            Self {
                inner: SqliteEngine::open_in_memory().unwrap(),
                executed: Mutex::new(Vec::new()),
                failing_tables: failing_tables.iter().copied().collect(),
            }
        }

        fn executed(&self) -> Vec<String> {
            self.executed.lock().unwrap().clone()
        }
    }

    impl SqlEngine for RecordingEngine {
        fn create(&self, schema: &Schema, record: &Record) -> tessera_db::error::Result<Value> {
            self.inner.create(schema, record)
        }

        fn create_batch(&self, schema: &Schema, records: &[Record]) -> tessera_db::error::Result<bool> {
            self.inner.create_batch(schema, records)
        }

        fn get(&self, schema: &Schema, id: &Value) -> tessera_db::error::Result<Option<Record>> {
            self.inner.get(schema, id)
        }

        fn list(&self, schema: &Schema, example: Option<&Record>) -> tessera_db::error::Result<Vec<Record>> {
            self.inner.list(schema, example)
        }

        fn get_one(
            &self,
            schema: &Schema,
            example: &Record,
            order_by: Option<&str>,
            direction: Direction,
        ) -> tessera_db::error::Result<Option<Record>> {
            self.inner.get_one(schema, example, order_by, direction)
        }

        fn remove(&self, schema: &Schema, record: &Record) -> tessera_db::error::Result<bool> {
            self.inner.remove(schema, record)
        }

        fn refresh(&self, schema: &Schema, record: &Record) -> tessera_db::error::Result<bool> {
            self.inner.refresh(schema, record)
        }

        fn refresh_condition(&self, schema: &Schema, refresh: &Refresh) -> tessera_db::error::Result<bool> {
            self.inner.refresh_condition(schema, refresh)
        }

        fn reduce(&self, schema: &Schema, reduce: &ReduceCondition) -> tessera_db::error::Result<Value> {
            self.inner.reduce(schema, reduce)
        }

        fn in_list(&self, schema: &Schema, condition: &InCondition) -> tessera_db::error::Result<Vec<Record>> {
            self.inner.in_list(schema, condition)
        }

        fn find(&self, schema: &Schema, criteria: &Criteria) -> tessera_db::error::Result<Page<Record>> {
            self.inner.find(schema, criteria)
        }

        fn list_criteria(&self, schema: &Schema, criteria: &Criteria) -> tessera_db::error::Result<Vec<Record>> {
            self.inner.list_criteria(schema, criteria)
        }

        fn refresh_cache(&self, schema: &Schema) {
            self.inner.refresh_cache(schema)
        }

        fn execute(&self, schema: &Schema, sql: &str, params: &[Value]) -> tessera_db::error::Result<usize> {
            self.executed.lock().unwrap().push(sql.to_string());
            if self.failing_tables.contains(schema.table()) {
                return Err(DbError::QueryError(format!("access denied to {}", schema.table())));
            }
            let sql = sql.replace(Dialect::MySql.table_options(), "");
            self.inner.execute(schema, &sql, params)
        }
    }

    #[derive(Debug, Clone)]
    struct User {
        id: i64,
        name: String,
    }

    define_entity!(
        User {
            type_name: "com.x.User",
            table: "user",
            key: id,
            columns: {
                id: i64 => "id",
                name: String => "name",
            }
        }
    );

    #[derive(Debug, Clone)]
    struct Tag {
        code: String,
    }

    define_entity!(
        Tag {
            type_name: "com.x.Tag",
            table: "tag",
            key: code,
            columns: {
                code: String => "code"
            }
        }
    );

    #[derive(Debug, Clone)]
    struct Unmapped {
        id: i64,
    }

    define_entity!(
        Unmapped {
            type_name: "com.x.Unmapped",
            table: "",
            key: id,
            columns: {
                id: i64 => "id"
            }
        }
    );

    fn context(
        engine: Arc<RecordingEngine>,
        dialect: Dialect,
        events: Arc<CollectorSink>,
    ) -> Arc<RepositoryContext> {
        RepositoryContext::builder(engine)
            .dialect(dialect)
            .events(events)
            .build()
            .unwrap()
    }

    fn id_row(engine: &RecordingEngine, name: &str) -> Option<IdGenerator> {
        engine
            .get(IdGenerator::schema(), &Value::Text(name.to_string()))
            .unwrap()
            .map(|r| IdGenerator::from_record(&r).unwrap())
    }

    #[test]
    fn test_mysql_creates_tables_and_numeric_id_rows() {
        let engine = Arc::new(RecordingEngine::new(&[]));
        let events = Arc::new(CollectorSink::default());
        let ctx = context(engine.clone(), Dialect::MySql, events.clone());
        let _users = Repository::<User>::new(&ctx).unwrap();
        let _tags = Repository::<Tag>::new(&ctx).unwrap();

        let checker = HealthChecker::new(&ctx);
        assert_eq!(checker.state(), BootstrapState::Uninitialized);
        let report = checker.on_started().unwrap();

        assert_eq!(report.state, BootstrapState::Started { degraded: false });
        assert_eq!(report.tables_checked, 2);
        assert_eq!(report.id_rows_created, 1);
        assert_eq!(checker.state(), report.state);

        let executed = engine.executed();
        assert_eq!(executed.len(), 3);
        assert!(executed[0].starts_with("CREATE TABLE IF NOT EXISTS idGenerator"));
        assert!(executed[0].ends_with("ENGINE=InnoDB DEFAULT CHARSET=utf8"));
        assert!(executed[1].starts_with("CREATE TABLE IF NOT EXISTS user"));
        assert!(executed[2].starts_with("CREATE TABLE IF NOT EXISTS tag"));

        assert_eq!(id_row(&engine, "com.x.User"), Some(IdGenerator::new("com.x.User", 0)));
        assert_eq!(id_row(&engine, "com.x.Tag"), None);
        assert!(matches!(
            events.events().last(),
            Some(RepositoryEvent::BootstrapFinished { degraded: false, .. })
        ));
    }

    #[test]
    fn test_non_mysql_dialect_skips_entity_tables() {
        let engine = Arc::new(RecordingEngine::new(&[]));
        let ctx = context(engine.clone(), Dialect::Sqlite, Arc::default());
        let _users = Repository::<User>::new(&ctx).unwrap();

        let report = HealthChecker::new(&ctx).on_started().unwrap();
        assert_eq!(engine.executed().len(), 1);
        assert_eq!(report.id_rows_created, 1);
    }

    #[test]
    fn test_failed_table_degrades_and_skips_id_row() {
        let engine = Arc::new(RecordingEngine::new(&["user"]));
        let ctx = context(engine.clone(), Dialect::MySql, Arc::default());
        let _users = Repository::<User>::new(&ctx).unwrap();

        let report = HealthChecker::new(&ctx).on_started().unwrap();
        assert!(report.is_degraded());
        assert_eq!(report.state, BootstrapState::Started { degraded: true });
        assert_eq!(report.failures[0].0, "com.x.User");
        assert_eq!(id_row(&engine, "com.x.User"), None);
    }

    #[test]
    fn test_existing_row_seeds_counter() {
        let engine = Arc::new(RecordingEngine::new(&[]));
        let ctx = context(engine.clone(), Dialect::Sqlite, Arc::default());
        engine
            .execute(IdGenerator::schema(), &id_generator::create_table_sql(Dialect::Sqlite), &[])
            .unwrap();
        engine
            .create(IdGenerator::schema(), &IdGenerator::new("com.x.User", 40).to_record())
            .unwrap();
        let users = Repository::<User>::new(&ctx).unwrap();

        let report = HealthChecker::new(&ctx).on_started().unwrap();
        assert_eq!(report.counters_reconciled, 1);
        assert_eq!(report.id_rows_created, 0);
        assert_eq!(ctx.counter().hget("ID_MAP_KEY", "com.x.User").unwrap(), Some(40));
        assert_eq!(users.create_id().unwrap(), 41);
    }

    #[test]
    fn test_runs_once_and_freezes_registries() {
        let engine = Arc::new(RecordingEngine::new(&[]));
        let ctx = context(engine, Dialect::Sqlite, Arc::default());
        let checker = HealthChecker::new(&ctx);
        checker.on_started().unwrap();

        assert!(matches!(checker.on_started(), Err(BootstrapError::AlreadyStarted)));
        assert!(matches!(
            Repository::<User>::new(&ctx),
            Err(RepoError::Misuse(_))
        ));
    }

    #[test]
    fn test_missing_mapper_stops_before_any_ddl() {
        let engine = Arc::new(RecordingEngine::new(&[]));
        let ctx = context(engine.clone(), Dialect::MySql, Arc::default());
        let _users = Repository::<User>::new(&ctx).unwrap();
        let _broken = Repository::<Unmapped>::new(&ctx).unwrap();

        let err = HealthChecker::new(&ctx).on_started().unwrap_err();
        assert!(err.is_fatal());
        assert!(matches!(err, BootstrapError::MissingMapper { ref type_name } if type_name == "com.x.Unmapped"));
        assert!(engine.executed().is_empty());

        let checker = HealthChecker::new(&ctx);
        assert_eq!(checker.state(), BootstrapState::Aborted);
        assert!(matches!(checker.on_started(), Err(BootstrapError::AlreadyStarted)));
        assert!(engine.executed().is_empty());
    }

    #[test]
    fn test_keyless_entity_is_a_failure() {
        #[derive(Debug, Clone)]
        struct Line {
            text: String,
        }

        define_entity!(
            Line {
                type_name: "com.x.Line",
                table: "line",
                columns: {
                    text: String => "text"
                }
            }
        );

        let engine = Arc::new(RecordingEngine::new(&[]));
        let ctx = context(engine, Dialect::Sqlite, Arc::default());
        let _lines = Repository::<Line>::new(&ctx).unwrap();
        let report = HealthChecker::new(&ctx).on_started().unwrap();
        assert!(report.is_degraded());
    }
}
