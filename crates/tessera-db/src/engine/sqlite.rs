//! [`SqlEngine`] over a single SQLite connection.

use std::{
    collections::HashMap,
    path::Path,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use rusqlite::{params_from_iter, types::Value, Connection};
use tracing::{debug, trace};

use super::SqlEngine;
use crate::{
    criteria::{Criteria, CriteriaMode, Direction, InCondition, Page, ReduceCondition, Refresh},
    error::{DbError, Result},
    expr::Col,
    query::{DeleteQuery, InsertQuery, SelectQuery, UpdateQuery},
    schema::{Record, Schema},
    traits::{Expression as _, Filterable},
    types::{is_set, is_usable},
};

/// SQLite-backed engine. Cloning shares the connection.
#[derive(Clone)]
pub struct SqliteEngine {
    conn: Arc<Mutex<Connection>>,
    generations: Arc<Mutex<HashMap<&'static str, u64>>>,
}

impl SqliteEngine {
    /// Opens (or creates) a database file in WAL mode.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path.as_ref())
            .map_err(|e| DbError::ConnectionError(e.to_string()))?;
        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(|e| DbError::ConnectionError(e.to_string()))?;
        Ok(Self::from_connection(conn))
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn =
            Connection::open_in_memory().map_err(|e| DbError::ConnectionError(e.to_string()))?;
        Ok(Self::from_connection(conn))
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
            generations: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// How many times the table's cache has been invalidated.
    pub fn cache_generation(&self, table: &str) -> u64 {
        self.generations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(table)
            .copied()
            .unwrap_or(0)
    }

    /// Runs a read-only statement and returns its rows.
    pub fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Record>> {
        let conn = self.lock()?;
        query_records(&conn, sql, params)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| DbError::ConnectionError("connection lock poisoned".to_string()))
    }

    fn run(&self, sql: &str, params: &[Value]) -> Result<usize> {
        debug!(sql, params = params.len(), "execute");
        let conn = self.lock()?;
        Ok(conn.execute(sql, params_from_iter(params.iter()))?)
    }

    fn select(&self, query: &SelectQuery) -> Result<Vec<Record>> {
        let (sql, params) = query.build();
        self.query(&sql, &params)
    }
}

fn query_records(conn: &Connection, sql: &str, params: &[Value]) -> Result<Vec<Record>> {
    debug!(sql, params = params.len(), "query");
    let mut stmt = conn.prepare(sql)?;
    let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    let rows = stmt.query_map(params_from_iter(params.iter()), |row| {
        let mut record = Record::new();
        for (idx, name) in names.iter().enumerate() {
            record.insert(name.clone(), row.get::<_, Value>(idx)?);
        }
        Ok(record)
    })?;
    let records = rows.collect::<rusqlite::Result<Vec<_>>>()?;
    trace!(rows = records.len(), "fetched");
    Ok(records)
}

fn insert_query(schema: &Schema, record: &Record) -> InsertQuery {
    let key = schema.key();
    schema
        .elements()
        .iter()
        .filter_map(|e| {
            let value = e.get(record)?;
            let auto_key = key == Some(e.column) && !is_usable(value);
            (!auto_key).then(|| (e.column, value.clone()))
        })
        .fold(InsertQuery::into(schema.table()), |q, (col, value)| q.set(col, value))
}

/// Adds `column = value` for every set column of the example.
fn filter_example<Q: Filterable>(schema: &Schema, example: &Record, mut query: Q) -> Q {
    for element in schema.elements() {
        if let Some(value) = element.get(example).filter(|v| is_set(v)) {
            query = query.filter(Col::of(element).eq(value.clone()));
        }
    }
    query
}

fn by_key<Q: Filterable>(schema: &Schema, record: &Record, query: Q) -> Result<Q> {
    let key = schema.require_key()?;
    let value = key.get(record).cloned().unwrap_or(Value::Null);
    Ok(query.filter(Col::of(key).eq(value)))
}

fn criteria_query(schema: &Schema, criteria: &Criteria) -> Result<SelectQuery> {
    let mut query = SelectQuery::from(schema.table());
    if let CriteriaMode::ResultMapped { result_keys } = &criteria.mode {
        let columns = result_keys
            .iter()
            .map(|k| schema.require(k).map(|e| e.column))
            .collect::<Result<Vec<_>>>()?;
        query = query.select(columns);
    }
    query = criteria.condition.apply(schema, query)?;
    for (key, direction) in &criteria.order_by {
        query = query.order_by(schema.require(key)?.column, direction.is_desc());
    }
    Ok(query)
}

impl SqlEngine for SqliteEngine {
    fn create(&self, schema: &Schema, record: &Record) -> Result<Value> {
        let (sql, params) = insert_query(schema, record).build();
        debug!(sql, table = schema.table(), "create");
        let conn = self.lock()?;
        conn.execute(&sql, params_from_iter(params.iter()))?;

        let given = schema.key_field().and_then(|k| k.get(record)).filter(|v| is_usable(v));
        Ok(match (schema.key_field(), given) {
            (_, Some(value)) => value.clone(),
            (Some(_), None) => Value::Integer(conn.last_insert_rowid()),
            (None, None) => Value::Null,
        })
    }

    fn create_batch(&self, schema: &Schema, records: &[Record]) -> Result<bool> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        for record in records {
            let (sql, params) = insert_query(schema, record).build();
            tx.execute(&sql, params_from_iter(params.iter()))?;
        }
        tx.commit()?;
        debug!(table = schema.table(), rows = records.len(), "batch created");
        Ok(true)
    }

    fn get(&self, schema: &Schema, id: &Value) -> Result<Option<Record>> {
        let key = schema.require_key()?;
        let query = SelectQuery::from(schema.table())
            .filter(Col::of(key).eq(id.clone()))
            .limit(1);
        Ok(self.select(&query)?.into_iter().next())
    }

    fn list(&self, schema: &Schema, example: Option<&Record>) -> Result<Vec<Record>> {
        let query = SelectQuery::from(schema.table());
        let query = match example {
            Some(example) => filter_example(schema, example, query),
            None => query,
        };
        self.select(&query)
    }

    fn get_one(
        &self,
        schema: &Schema,
        example: &Record,
        order_by: Option<&str>,
        direction: Direction,
    ) -> Result<Option<Record>> {
        let mut query = filter_example(schema, example, SelectQuery::from(schema.table()));
        if let Some(order_by) = order_by {
            query = query.order_by(schema.require(order_by)?.column, direction.is_desc());
        }
        Ok(self.select(&query.limit(1))?.into_iter().next())
    }

    fn remove(&self, schema: &Schema, record: &Record) -> Result<bool> {
        let (sql, params) = by_key(schema, record, DeleteQuery::from(schema.table()))?.build();
        Ok(self.run(&sql, &params)? > 0)
    }

    fn refresh(&self, schema: &Schema, record: &Record) -> Result<bool> {
        let key = schema.require_key()?.column;
        let query = schema
            .elements()
            .iter()
            .filter(|e| e.column != key)
            .filter_map(|e| e.get(record).filter(|v| **v != Value::Null).map(|v| (e.column, v)))
            .fold(UpdateQuery::table(schema.table()), |q, (col, v)| q.set(col, v.clone()));
        if !query.has_updates() {
            debug!(table = schema.table(), "nothing to refresh");
            return Ok(false);
        }
        let (sql, params) = by_key(schema, record, query)?.build();
        Ok(self.run(&sql, &params)? > 0)
    }

    fn refresh_condition(&self, schema: &Schema, refresh: &Refresh) -> Result<bool> {
        let mut query = UpdateQuery::table(schema.table());
        for (key, value) in &refresh.assignments {
            query = query.set(schema.require(key)?.column, value.clone());
        }
        let key = schema.key_field();
        if let Some(target) = &refresh.target {
            for element in schema.elements() {
                if key.is_some_and(|k| k.column == element.column)
                    || refresh.assignments.iter().any(|(k, _)| {
                        k.as_str() == element.property || k.as_str() == element.column
                    })
                {
                    continue;
                }
                if let Some(value) = element.get(target).filter(|v| **v != Value::Null) {
                    query = query.set(element.column, value.clone());
                }
            }
        }
        if !query.has_updates() {
            debug!(table = schema.table(), "nothing to refresh");
            return Ok(false);
        }

        let mut query = refresh.condition.apply(schema, query)?;
        if let (Some(key), Some(target)) = (key, &refresh.target) {
            if let Some(value) = key.get(target).filter(|v| is_usable(v)) {
                query = query.filter(Col::of(key).eq(value.clone()));
            }
        }
        let (sql, params) = query.build();
        Ok(self.run(&sql, &params)? > 0)
    }

    fn reduce(&self, schema: &Schema, reduce: &ReduceCondition) -> Result<Value> {
        let column = schema.require(&reduce.property)?.column;
        let query = SelectQuery::from(schema.table()).select([reduce.reduce_type.sql(column)]);
        let (sql, params) = reduce.condition.apply(schema, query)?.build();
        debug!(sql, "reduce");
        let conn = self.lock()?;
        Ok(conn.query_row(&sql, params_from_iter(params.iter()), |row| row.get(0))?)
    }

    fn in_list(&self, schema: &Schema, condition: &InCondition) -> Result<Vec<Record>> {
        let element = schema.require(&condition.property)?;
        let query =
            SelectQuery::from(schema.table()).filter(Col::of(element).in_(condition.in_list.clone()));
        self.select(&query)
    }

    fn find(&self, schema: &Schema, criteria: &Criteria) -> Result<Page<Record>> {
        let paging = criteria.paging.unwrap_or_default();
        let query = criteria_query(schema, criteria)?.page(paging.page, paging.rows);

        let (count_sql, count_params) = query.build_count();
        let total_rows: i64 = {
            let conn = self.lock()?;
            conn.query_row(&count_sql, params_from_iter(count_params.iter()), |row| row.get(0))?
        };
        let list = self.select(&query)?;
        Ok(Page {
            page: paging.page,
            rows: paging.rows,
            total_rows: u64::try_from(total_rows).unwrap_or(0),
            list,
        })
    }

    fn list_criteria(&self, schema: &Schema, criteria: &Criteria) -> Result<Vec<Record>> {
        self.select(&criteria_query(schema, criteria)?)
    }

    fn refresh_cache(&self, schema: &Schema) {
        let mut generations = self
            .generations
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *generations.entry(schema.table()).or_insert(0) += 1;
        debug!(table = schema.table(), "cache invalidated");
    }

    fn execute(&self, schema: &Schema, sql: &str, params: &[Value]) -> Result<usize> {
        trace!(type_name = schema.type_name(), "raw execute");
        self.run(sql, params)
    }
}
