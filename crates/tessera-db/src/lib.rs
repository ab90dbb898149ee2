pub mod criteria;
pub mod dialect;
pub mod engine;
pub mod error;
pub mod expr;
pub mod macros;
pub mod mapper;
pub mod query;
pub mod schema;
pub mod traits;
pub mod types;

pub use criteria::{
    Clause, ClauseValue, Criteria, CriteriaCondition, CriteriaMode, Direction, InCondition, Op,
    Page, Paging, ReduceCondition, ReduceType, Refresh, RefreshCondition,
};
pub use dialect::Dialect;
pub use engine::{SqlEngine, SqliteEngine};
pub use error::DbError;
pub use mapper::{Mapper, MapperFactory};
pub use query::*;
pub use rusqlite::types::Value;
pub use schema::{Element, Entity, Record, Schema};
pub use types::{is_usable, value_text, ColumnType, SqlType};
