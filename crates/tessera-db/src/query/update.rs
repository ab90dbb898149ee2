//! UPDATE statement builder.

use rusqlite::types::Value;

use crate::{
    query::clause::WhereClause,
    traits::{Expression, Filterable},
};

pub struct UpdateQuery {
    table: &'static str,
    updates: Vec<(String, Value)>,
    wheres: Vec<WhereClause>,
}

impl UpdateQuery {
    pub fn table(table: &'static str) -> Self {
        Self {
            table,
            updates: vec![],
            wheres: vec![],
        }
    }

    pub fn set<V: Into<Value>>(mut self, column: impl Into<String>, value: V) -> Self {
        self.updates.push((column.into(), value.into()));
        self
    }

    pub fn has_updates(&self) -> bool {
        !self.updates.is_empty()
    }

    pub fn has_filters(&self) -> bool {
        !self.wheres.is_empty()
    }

    pub fn build(&self) -> (String, Vec<Value>) {
        let mut params = Vec::new();

        let sets: Vec<String> = self
            .updates
            .iter()
            .map(|(col, val)| {
                params.push(val.clone());
                format!("{} = ?", col)
            })
            .collect();

        let mut sql = format!("UPDATE {} SET {}", self.table, sets.join(", "));
        WhereClause::render(&self.wheres, &mut sql, &mut params);

        (sql, params)
    }
}

impl Filterable for UpdateQuery {
    fn filter<E: Expression + 'static>(mut self, expr: E) -> Self {
        self.wheres.push(WhereClause {
            sql_fn: Box::new(move |params| expr.to_sql(params)),
        });
        self
    }
}
