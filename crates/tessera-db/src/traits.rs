//! The two traits criteria compile through: [`Expression`] renders a
//! predicate, [`Filterable`] attaches it to a statement builder.

use rusqlite::types::Value;

use crate::expr::ops::{BinaryOp, InOp, LikeOp, NullOp, Op};

/// A SQL fragment with `?` placeholders.
///
/// `to_sql` appends the bound values to `params` in placeholder order.
///
/// ```rust
/// use tessera_db::{expr::Col, traits::Expression as _, Op};
///
/// let max_id = Col::<i64>::new("maxId");
/// let mut params = vec![];
/// let sql = max_id.compare(Op::Lt, 7_i64).unwrap().to_sql(&mut params);
/// assert_eq!(sql, "maxId < ?");
/// ```
pub trait Expression: Sized {
    fn to_sql(&self, params: &mut Vec<Value>) -> String;

    /// `self <op> value`; `None` when `op` is not a comparison.
    fn compare<T: Into<Value>>(self, op: Op, value: T) -> Option<BinaryOp<Self>> {
        BinaryOp::new(self, op, value.into())
    }

    fn eq<T: Into<Value>>(self, value: T) -> BinaryOp<Self> {
        BinaryOp::equal(self, value.into())
    }

    fn lt<T: Into<Value>>(self, value: T) -> BinaryOp<Self> {
        BinaryOp::less(self, value.into())
    }

    /// Substring match.
    fn like(self, pattern: impl Into<String>) -> LikeOp<Self> {
        LikeOp::new(self, pattern.into())
    }

    fn in_<T, I>(self, values: I) -> InOp<Self>
    where
        T: Into<Value>,
        I: IntoIterator<Item = T>,
    {
        InOp::new(self, values.into_iter().map(Into::into).collect(), false)
    }

    fn not_in<T, I>(self, values: I) -> InOp<Self>
    where
        T: Into<Value>,
        I: IntoIterator<Item = T>,
    {
        InOp::new(self, values.into_iter().map(Into::into).collect(), true)
    }

    fn null(self) -> NullOp<Self> {
        NullOp::new(self, true)
    }

    fn not_null(self) -> NullOp<Self> {
        NullOp::new(self, false)
    }
}

/// A statement builder that accepts WHERE conditions.
///
/// Implemented by the SELECT, UPDATE and DELETE builders so criteria can be
/// compiled onto any of them.
pub trait Filterable: Sized {
    /// Adds a WHERE condition; conditions are joined with `AND`.
    fn filter<E: Expression + 'static>(self, expr: E) -> Self;
}
