//! Internal representation of query clauses.
//!
//! These types are used internally by the statement builders and are not part of the public API.

use rusqlite::types::Value;

/// A WHERE clause represented as a closure that generates SQL and binds parameters.
pub(crate) struct WhereClause {
    pub sql_fn: Box<dyn Fn(&mut Vec<Value>) -> String>,
}

impl WhereClause {
    pub(crate) fn render(wheres: &[WhereClause], sql: &mut String, params: &mut Vec<Value>) {
        if wheres.is_empty() {
            return;
        }
        sql.push_str(" WHERE ");
        let conditions = wheres
            .iter()
            .map(|w| (w.sql_fn)(params))
            .collect::<Vec<_>>();
        sql.push_str(&conditions.join(" AND "));
    }
}

impl std::fmt::Debug for WhereClause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WhereClause").finish_non_exhaustive()
    }
}

/// An ORDER BY clause.
#[derive(Debug)]
pub(crate) struct OrderClause {
    pub column: String,
    pub desc: bool,
}
