//! DELETE statement builder.

use rusqlite::types::Value;

use crate::{
    query::clause::WhereClause,
    traits::{Expression, Filterable},
};

pub struct DeleteQuery {
    table: &'static str,
    wheres: Vec<WhereClause>,
}

impl DeleteQuery {
    pub fn from(table: &'static str) -> Self {
        Self {
            table,
            wheres: Vec::new(),
        }
    }

    pub fn build(&self) -> (String, Vec<Value>) {
        let mut params = Vec::new();
        let mut sql = format!("DELETE FROM {}", self.table);
        WhereClause::render(&self.wheres, &mut sql, &mut params);
        (sql, params)
    }
}

impl Filterable for DeleteQuery {
    fn filter<E: Expression + 'static>(mut self, expr: E) -> Self {
        self.wheres.push(WhereClause {
            sql_fn: Box::new(move |params| expr.to_sql(params)),
        });
        self
    }
}
