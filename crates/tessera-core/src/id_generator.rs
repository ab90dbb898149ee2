//! Durable shadow of the id counters.

use tessera_db::{
    define_entity, expr::Col, traits::{Expression as _, Filterable as _}, Dialect, Entity,
    SqlEngine, UpdateQuery,
};
use tessera_events::{EventSink, RepositoryEvent};
use tracing::{debug, warn};

use crate::error::Result;

const CLZ_NAME: Col<String> = Col::new("clzName");
const MAX_ID: Col<i64> = Col::new("maxId");

/// One row per numeric-key entity type, holding the highest persisted id.
#[derive(Debug, Clone, PartialEq)]
pub struct IdGenerator {
    pub clz_name: String,
    pub max_id: Option<i64>,
}

define_entity!(
    IdGenerator {
        type_name: "tessera.IdGenerator",
        table: "idGenerator",
        key: clz_name,
        columns: {
            clz_name: String => "clzName",
            max_id: Option<i64> => "maxId",
        }
    }
);

impl IdGenerator {
    pub fn new(clz_name: impl Into<String>, max_id: i64) -> Self {
        Self {
            clz_name: clz_name.into(),
            max_id: Some(max_id),
        }
    }
}

/// DDL for the `idGenerator` table under `dialect`.
pub fn create_table_sql(dialect: Dialect) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS idGenerator (clzName VARCHAR(120) PRIMARY KEY, maxId BIGINT NULL){}",
        dialect.table_options()
    )
}

/// Advances the persisted max id for `type_name`, never moving it backwards.
pub(crate) fn persist_max_id(
    engine: &dyn SqlEngine,
    events: &dyn EventSink,
    type_name: &str,
    id: i64,
) -> Result<()> {
    let schema = IdGenerator::schema();
    let (sql, params) = UpdateQuery::table(schema.table())
        .set(MAX_ID.name, id)
        .filter(CLZ_NAME.eq(type_name.to_string()))
        .filter(MAX_ID.lt(id))
        .build();

    match engine.execute(schema, &sql, &params) {
        Ok(rows) => {
            debug!(type_name, id, advanced = rows > 0, "persisted max id");
            Ok(())
        }
        Err(err) => {
            warn!(type_name, id, error = %err, "failed to persist max id");
            events.emit(RepositoryEvent::IdPersistFailed {
                type_name: type_name.to_string(),
                id,
                error: err.to_string(),
            });
            Err(err.into())
        }
    }
}
