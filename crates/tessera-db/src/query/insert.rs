//! INSERT statement builder.

use rusqlite::types::Value;

pub struct InsertQuery {
    table: &'static str,
    columns: Vec<String>,
    values: Vec<Value>,
    on_conflict: Option<String>,
}

impl InsertQuery {
    pub fn into(table: &'static str) -> Self {
        Self {
            table,
            columns: vec![],
            values: vec![],
            on_conflict: None,
        }
    }

    pub fn set<V: Into<Value>>(mut self, column: impl Into<String>, value: V) -> Self {
        self.columns.push(column.into());
        self.values.push(value.into());
        self
    }

    pub fn on_conflict_do_nothing(mut self) -> Self {
        self.on_conflict = Some("ON CONFLICT DO NOTHING".to_string());
        self
    }

    pub fn build(&self) -> (String, Vec<Value>) {
        let columns = self.columns.join(", ");
        let placeholders = vec!["?"; self.values.len()].join(", ");

        let mut sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.table, columns, placeholders
        );

        if let Some(conflict) = &self.on_conflict {
            sql.push(' ');
            sql.push_str(conflict);
        }

        (sql, self.values.clone())
    }
}
