//! Predicate operators.
//!
//! [`Op`] names every operator a criteria clause can carry and owns its SQL
//! spelling; the structs below render one predicate each.

use rusqlite::types::Value;

use crate::traits::Expression;

/// Comparison operator of a clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    Like,
    In,
    NotIn,
    IsNull,
    IsNotNull,
}

impl Op {
    pub const fn symbol(self) -> &'static str {
        match self {
            Op::Eq => "=",
            Op::Ne => "!=",
            Op::Gt => ">",
            Op::Gte => ">=",
            Op::Lt => "<",
            Op::Lte => "<=",
            Op::Like => "LIKE",
            Op::In => "IN",
            Op::NotIn => "NOT IN",
            Op::IsNull => "IS NULL",
            Op::IsNotNull => "IS NOT NULL",
        }
    }

    /// Whether the operator compares a column with one bound value.
    pub const fn is_comparison(self) -> bool {
        matches!(
            self,
            Op::Eq | Op::Ne | Op::Gt | Op::Gte | Op::Lt | Op::Lte
        )
    }
}

/// `left <op> ?` for the comparison operators.
pub struct BinaryOp<L> {
    left: L,
    op: Op,
    right: Value,
}

impl<L> BinaryOp<L> {
    /// `None` unless `op` is a comparison.
    pub fn new(left: L, op: Op, right: Value) -> Option<Self> {
        op.is_comparison().then_some(Self { left, op, right })
    }

    pub(crate) fn equal(left: L, right: Value) -> Self {
        Self {
            left,
            op: Op::Eq,
            right,
        }
    }

    pub(crate) fn less(left: L, right: Value) -> Self {
        Self {
            left,
            op: Op::Lt,
            right,
        }
    }
}

impl<L: Expression> Expression for BinaryOp<L> {
    fn to_sql(&self, params: &mut Vec<Value>) -> String {
        let left_sql = self.left.to_sql(params);
        params.push(self.right.clone());
        format!("{} {} ?", left_sql, self.op.symbol())
    }
}

/// Substring match: the pattern is wrapped in `%` on both sides.
pub struct LikeOp<L> {
    left: L,
    pattern: String,
}

impl<L> LikeOp<L> {
    pub const fn new(left: L, pattern: String) -> Self {
        Self { left, pattern }
    }
}

impl<L: Expression> Expression for LikeOp<L> {
    fn to_sql(&self, params: &mut Vec<Value>) -> String {
        let left_sql = self.left.to_sql(params);
        params.push(Value::Text(format!("%{}%", self.pattern)));
        format!("{} {} ?", left_sql, Op::Like.symbol())
    }
}

/// `IN` / `NOT IN`. An empty list renders as a constant predicate since
/// `IN ()` is not portable.
pub struct InOp<L> {
    left: L,
    values: Vec<Value>,
    negated: bool,
}

impl<L> InOp<L> {
    pub fn new(left: L, values: Vec<Value>, negated: bool) -> Self {
        Self {
            left,
            values,
            negated,
        }
    }
}

impl<L: Expression> Expression for InOp<L> {
    fn to_sql(&self, params: &mut Vec<Value>) -> String {
        if self.values.is_empty() {
            return if self.negated { "1 = 1" } else { "1 = 0" }.to_string();
        }
        let left_sql = self.left.to_sql(params);
        let placeholders = vec!["?"; self.values.len()].join(", ");
        params.extend(self.values.iter().cloned());
        let op = if self.negated { Op::NotIn } else { Op::In };
        format!("{} {} ({})", left_sql, op.symbol(), placeholders)
    }
}

pub struct NullOp<L> {
    left: L,
    is_null: bool,
}

impl<L> NullOp<L> {
    pub fn new(left: L, is_null: bool) -> Self {
        Self { left, is_null }
    }
}

impl<L: Expression> Expression for NullOp<L> {
    fn to_sql(&self, params: &mut Vec<Value>) -> String {
        let op = if self.is_null { Op::IsNull } else { Op::IsNotNull };
        format!("{} {}", self.left.to_sql(params), op.symbol())
    }
}
