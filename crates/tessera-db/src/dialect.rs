use serde::{Deserialize, Serialize};

/// SQL dialect of the configured database.
///
/// Only [`Dialect::MySql`] has entity tables created automatically at startup.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    MySql,
    #[default]
    Sqlite,
    Postgres,
    Oracle,
}

impl Dialect {
    /// Whether startup issues CREATE TABLE for every registered entity.
    pub const fn creates_tables(self) -> bool {
        matches!(self, Dialect::MySql)
    }

    /// Storage options appended to generated CREATE TABLE statements.
    pub const fn table_options(self) -> &'static str {
        match self {
            Dialect::MySql => " ENGINE=InnoDB DEFAULT CHARSET=utf8",
            _ => "",
        }
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Dialect::MySql => "mysql",
            Dialect::Sqlite => "sqlite",
            Dialect::Postgres => "postgres",
            Dialect::Oracle => "oracle",
        };
        f.write_str(name)
    }
}
