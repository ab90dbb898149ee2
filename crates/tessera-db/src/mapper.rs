//! Generated DDL, cached per entity type.

use std::{
    collections::HashMap,
    sync::{PoisonError, RwLock},
};

use tracing::debug;

use crate::{dialect::Dialect, schema::Schema, types::ColumnType};

/// Kind of generated statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mapper {
    CreateTable,
}

/// Generates and remembers SQL for entity types, keyed by type name.
pub struct MapperFactory {
    dialect: Dialect,
    sql: RwLock<HashMap<(String, Mapper), String>>,
}

impl MapperFactory {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            sql: RwLock::new(HashMap::new()),
        }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Generates the CREATE TABLE statement for `schema` and caches it.
    ///
    /// Returns `None` when the schema cannot be mapped (no table name or no
    /// columns); no entry is cached in that case.
    pub fn try_to_create(&self, schema: &Schema) -> Option<String> {
        if let Some(sql) = self.get_sql(schema.type_name(), Mapper::CreateTable) {
            return Some(sql);
        }
        let sql = create_table_sql(schema, self.dialect)?;
        debug!(type_name = schema.type_name(), sql = %sql, "generated create table");
        self.sql
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((schema.type_name().to_string(), Mapper::CreateTable), sql.clone());
        Some(sql)
    }

    pub fn get_sql(&self, type_name: &str, mapper: Mapper) -> Option<String> {
        self.sql
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(type_name.to_string(), mapper))
            .cloned()
    }
}

fn column_sql(column_type: ColumnType, is_key: bool, dialect: Dialect) -> &'static str {
    match (column_type, dialect) {
        (ColumnType::Integer, _) => "BIGINT",
        (ColumnType::Real, _) => "DOUBLE",
        (ColumnType::Text, _) if is_key => "VARCHAR(120)",
        (ColumnType::Text, Dialect::MySql) => "VARCHAR(255)",
        (ColumnType::Text, _) => "TEXT",
        (ColumnType::Blob, _) => "BLOB",
        (ColumnType::Boolean, Dialect::MySql) => "TINYINT(1)",
        (ColumnType::Boolean, _) => "BOOLEAN",
    }
}

fn create_table_sql(schema: &Schema, dialect: Dialect) -> Option<String> {
    if schema.table().is_empty() || schema.elements().is_empty() {
        return None;
    }
    let key = schema.key();
    let mut columns: Vec<String> = schema
        .elements()
        .iter()
        .map(|e| {
            let is_key = key == Some(e.column);
            let mut col = format!("{} {}", e.column, column_sql(e.column_type, is_key, dialect));
            if is_key || !e.nullable {
                col.push_str(" NOT NULL");
            }
            col
        })
        .collect();
    if let Some(key) = key {
        columns.push(format!("PRIMARY KEY ({key})"));
    }
    Some(format!(
        "CREATE TABLE IF NOT EXISTS {} ({}){}",
        schema.table(),
        columns.join(", "),
        dialect.table_options()
    ))
}
