//! SELECT statement builder.

use rusqlite::types::Value;

use crate::{
    query::clause::{OrderClause, WhereClause},
    traits::{Expression, Filterable},
};

/// An ergonomic SELECT builder.
///
/// Constructed via [`SelectQuery::from`], then chained with `.filter()`, `.order_by()`, etc.
///
/// # Example
///
/// ```rust
/// use tessera_db::{expr::Col, traits::{Expression as _, Filterable as _}, SelectQuery};
///
/// const OWNER: Col<i64> = Col::new("owner");
///
/// let (sql, params) = SelectQuery::from("pet")
///     .filter(OWNER.in_([1_i64, 2]))
///     .page(2, 20)
///     .build();
/// assert_eq!(sql, "SELECT * FROM pet WHERE owner IN (?, ?) LIMIT 20 OFFSET 20");
/// assert_eq!(params.len(), 2);
/// ```
#[derive(Debug)]
pub struct SelectQuery {
    table: &'static str,
    columns: Vec<String>,
    wheres: Vec<WhereClause>,
    orders: Vec<OrderClause>,
    limit: Option<u32>,
    offset: Option<u64>,
}

impl SelectQuery {
    /// Starts a new query on the given table.
    ///
    /// # Parameters
    ///
    /// - `table`: table name (e.g., `"user"`)
    pub fn from(table: &'static str) -> Self {
        Self {
            table,
            columns: vec![],
            wheres: vec![],
            orders: vec![],
            limit: None,
            offset: None,
        }
    }

    /// Select specific columns from the table.
    pub fn select<I, S>(mut self, cols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns.extend(cols.into_iter().map(Into::into));
        self
    }

    /// Adds an ORDER BY clause.
    pub fn order_by(mut self, column: impl Into<String>, desc: bool) -> Self {
        self.orders.push(OrderClause {
            column: column.into(),
            desc,
        });
        self
    }

    /// Limit the number of results
    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Set pagination params; pages are 1-based.
    ///
    /// The offset is computed in `u64`, so any `page` and `per_page` pair is
    /// representable.
    pub fn page(mut self, page: u32, per_page: u32) -> Self {
        self.limit = Some(per_page);
        self.offset = Some(u64::from(page.saturating_sub(1)) * u64::from(per_page));
        self
    }

    /// Builds the SELECT statement and its parameters.
    pub fn build(&self) -> (String, Vec<Value>) {
        let mut params = vec![];

        let select = if self.columns.is_empty() {
            "*".to_string()
        } else {
            self.columns.join(", ")
        };

        let mut sql = format!("SELECT {} FROM {}", select, self.table);
        WhereClause::render(&self.wheres, &mut sql, &mut params);

        if !self.orders.is_empty() {
            sql.push_str(" ORDER BY ");
            let orders = self
                .orders
                .iter()
                .map(|o| format!("{} {}", o.column, if o.desc { "DESC" } else { "ASC" }))
                .collect::<Vec<_>>();
            sql.push_str(&orders.join(", "));
        }

        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        if let Some(offset) = self.offset {
            sql.push_str(&format!(" OFFSET {}", offset));
        }

        (sql, params)
    }

    /// Builds a `COUNT(*)` over the same filters, ignoring order and paging.
    pub fn build_count(&self) -> (String, Vec<Value>) {
        let mut params = vec![];
        let mut sql = format!("SELECT COUNT(*) FROM {}", self.table);
        WhereClause::render(&self.wheres, &mut sql, &mut params);
        (sql, params)
    }
}

impl Filterable for SelectQuery {
    fn filter<E: Expression + 'static>(mut self, expr: E) -> Self {
        self.wheres.push(WhereClause {
            sql_fn: Box::new(move |params| expr.to_sql(params)),
        });
        self
    }
}
