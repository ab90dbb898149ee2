//! The query builder.
//!
//! This module provides a strongly-typed interface for constructing SQL statements
//! without manually concatenating strings. Each statement type (SELECT, INSERT, UPDATE,
//! DELETE) has its own builder with chainable methods for composing clauses.
//!
//! Builders are pure: [`SelectQuery::build`] and friends return the SQL text and the
//! bound parameter list, and the caller decides where to run it. The
//! [`crate::SqliteEngine`] executes them on its connection; the id generator in
//! `tessera-core` hands them to whatever [`crate::SqlEngine`] is configured.
//!
//! # Example
//!
//! ```rust
//! use tessera_db::{expr::Col, traits::{Expression as _, Filterable as _}, SelectQuery};
//!
//! const ID: Col<i64> = Col::new("id");
//!
//! let (sql, params) = SelectQuery::from("user")
//!     .filter(ID.lt(10))
//!     .order_by(ID.name, true)
//!     .limit(10)
//!     .build();
//! assert_eq!(sql, "SELECT * FROM user WHERE id < ? ORDER BY id DESC LIMIT 10");
//! assert_eq!(params.len(), 1);
//! ```

mod clause;
pub mod delete;
pub mod insert;
pub mod select;
pub mod update;

pub use delete::DeleteQuery;
pub use insert::InsertQuery;
pub use select::SelectQuery;
pub use update::UpdateQuery;
