//! Represents a database column.
//!
//! `Col<T>` ties a column name to a Rust type `T`. It implements
//! [`Expression`], so it can be used directly in filters.

use std::marker::PhantomData;

use rusqlite::types::Value;

use crate::{schema::Element, traits::Expression};

/// A typed reference to a database column.
///
/// The type parameter `T` documents the expected Rust type of the column.
/// Columns resolved at runtime from a [`crate::Schema`] are untyped
/// (`Col<Value>`).
///
/// # Example
///
/// ```rust
/// use tessera_db::expr::Col;
/// const NAME: Col<String> = Col::new("name");
/// ```
#[derive(Clone, Copy)]
pub struct Col<T> {
    pub name: &'static str,
    _type: PhantomData<T>,
}

impl<T> Col<T> {
    /// Creates a new column reference.
    ///
    /// # Parameters
    ///
    /// - `name`: the actual column name in the database (e.g., `"clzName"`)
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _type: PhantomData,
        }
    }
}

impl Col<Value> {
    /// The column an entity element is stored in.
    pub const fn of(element: &Element) -> Self {
        Self::new(element.column)
    }
}

impl<T> Expression for Col<T> {
    fn to_sql(&self, _params: &mut Vec<Value>) -> String {
        self.name.to_string()
    }
}
