//! The SQL engine seam.
//!
//! Repositories never build SQL themselves; they hand an entity's [`Schema`]
//! and type-erased [`Record`]s to a [`SqlEngine`] shared by every repository
//! of a context.

mod sqlite;

pub use sqlite::SqliteEngine;

use rusqlite::types::Value;

use crate::{
    criteria::{Criteria, Direction, InCondition, Page, ReduceCondition, Refresh},
    error::Result,
    schema::{Record, Schema},
};

/// Persistence operations for any entity type, driven by its metadata.
pub trait SqlEngine: Send + Sync {
    /// Inserts one row and returns its key. A missing or zero integer key is
    /// left to the database to assign.
    fn create(&self, schema: &Schema, record: &Record) -> Result<Value>;

    /// Inserts all rows in one transaction.
    fn create_batch(&self, schema: &Schema, records: &[Record]) -> Result<bool>;

    fn get(&self, schema: &Schema, id: &Value) -> Result<Option<Record>>;

    /// All rows, or the rows matching every set column of `example`.
    fn list(&self, schema: &Schema, example: Option<&Record>) -> Result<Vec<Record>>;

    /// First row matching `example` under the given ordering.
    fn get_one(
        &self,
        schema: &Schema,
        example: &Record,
        order_by: Option<&str>,
        direction: Direction,
    ) -> Result<Option<Record>>;

    fn remove(&self, schema: &Schema, record: &Record) -> Result<bool>;

    /// Updates the row identified by the record's key with its non-null columns.
    fn refresh(&self, schema: &Schema, record: &Record) -> Result<bool>;

    /// Updates by assignments and predicate. Performs no safety check.
    fn refresh_condition(&self, schema: &Schema, refresh: &Refresh) -> Result<bool>;

    fn reduce(&self, schema: &Schema, reduce: &ReduceCondition) -> Result<Value>;

    fn in_list(&self, schema: &Schema, condition: &InCondition) -> Result<Vec<Record>>;

    /// Paginated query. Result-mapped criteria project their result keys.
    fn find(&self, schema: &Schema, criteria: &Criteria) -> Result<Page<Record>>;

    /// Same as [`SqlEngine::find`] without paging.
    fn list_criteria(&self, schema: &Schema, criteria: &Criteria) -> Result<Vec<Record>>;

    /// Drops whatever the engine remembers about the entity's table.
    fn refresh_cache(&self, schema: &Schema);

    /// Runs raw SQL on behalf of `schema`'s entity, returning affected rows.
    fn execute(&self, schema: &Schema, sql: &str, params: &[Value]) -> Result<usize>;
}

