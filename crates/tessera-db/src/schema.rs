//! Entity metadata.
//!
//! A [`Schema`] is built once per entity type (see [`Entity::schema`]) and
//! describes how the type maps onto a table: its logical type name, table,
//! columns and the primary key ("key one").

use std::collections::BTreeMap;

use rusqlite::types::Value;

use crate::{
    error::{DbError, Result},
    types::ColumnType,
};

/// A row exchanged with the SQL engine, keyed by column name.
pub type Record = BTreeMap<String, Value>;

/// A single mapped property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub property: &'static str,
    pub column: &'static str,
    pub column_type: ColumnType,
    pub nullable: bool,
}

impl Element {
    pub const fn new(
        property: &'static str,
        column: &'static str,
        column_type: ColumnType,
        nullable: bool,
    ) -> Self {
        Self {
            property,
            column,
            column_type,
            nullable,
        }
    }

    /// Reads this element out of a record.
    pub fn get<'r>(&self, record: &'r Record) -> Option<&'r Value> {
        record.get(self.column)
    }
}

/// Metadata descriptor of one entity type.
#[derive(Debug, Clone)]
pub struct Schema {
    type_name: &'static str,
    table: &'static str,
    key_one: Option<usize>,
    elements: Vec<Element>,
}

impl Schema {
    /// Builds a schema. `key_one` names the primary-key property; a name
    /// that matches no element leaves the schema without a key.
    pub fn new(
        type_name: &'static str,
        table: &'static str,
        key_one: Option<&str>,
        elements: Vec<Element>,
    ) -> Self {
        let key_one = key_one.and_then(|key| {
            elements
                .iter()
                .position(|e| e.property == key || e.column == key)
        });
        Self {
            type_name,
            table,
            key_one,
            elements,
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn table(&self) -> &'static str {
        self.table
    }

    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    /// The primary-key element, if one is declared.
    pub fn key_field(&self) -> Option<&Element> {
        self.key_one.map(|idx| &self.elements[idx])
    }

    /// Column name of the primary key.
    pub fn key(&self) -> Option<&'static str> {
        self.key_field().map(|e| e.column)
    }

    /// Looks an element up by property or column name.
    pub fn element(&self, name: &str) -> Option<&Element> {
        self.elements
            .iter()
            .find(|e| e.property == name)
            .or_else(|| self.elements.iter().find(|e| e.column == name))
    }

    /// Like [`Schema::element`], failing with a metadata error.
    pub fn require(&self, name: &str) -> Result<&Element> {
        self.element(name).ok_or_else(|| DbError::UnknownProperty {
            type_name: self.type_name.to_string(),
            property: name.to_string(),
        })
    }

    /// Like [`Schema::key_field`], failing when no key is declared.
    pub fn require_key(&self) -> Result<&Element> {
        self.key_field().ok_or_else(|| DbError::NoPrimaryKey {
            type_name: self.type_name.to_string(),
        })
    }

    /// Whether the primary key is string-typed. Such entities never get an
    /// id generator row.
    pub fn has_text_key(&self) -> bool {
        self.key_field()
            .is_some_and(|k| k.column_type == ColumnType::Text)
    }
}

/// A type persisted through a repository.
///
/// Usually implemented with [`crate::define_entity!`].
pub trait Entity: Clone + Send + Sync + 'static {
    /// Metadata for this type, parsed on first use.
    fn schema() -> &'static Schema;

    fn to_record(&self) -> Record;

    fn from_record(record: &Record) -> Result<Self>;

    /// Value of the primary key, or `None` if the type declares none.
    fn key_value(&self) -> Option<Value> {
        let key = Self::schema().key()?;
        Some(self.to_record().remove(key).unwrap_or(Value::Null))
    }
}
