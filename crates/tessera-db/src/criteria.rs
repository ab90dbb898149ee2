//! Query predicates and condition objects.
//!
//! [`CriteriaCondition`] is the ordered list of `{key, op, value}` clauses shared by
//! every condition type. [`Criteria`] adds ordering, paging and the result shape.

use rusqlite::types::Value;

pub use crate::expr::ops::Op;
use crate::{
    error::{DbError, Result},
    expr::Col,
    schema::{Entity, Record, Schema},
    traits::{Expression, Filterable},
    types::value_text,
};

/// Sort direction for queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    pub const fn is_desc(self) -> bool {
        matches!(self, Direction::Desc)
    }
}

/// Right-hand side of a clause.
#[derive(Debug, Clone, PartialEq)]
pub enum ClauseValue {
    One(Value),
    Many(Vec<Value>),
    Nothing,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Clause {
    pub key: String,
    pub op: Op,
    pub value: ClauseValue,
}

impl Clause {
    /// The scalar operand, if the clause has one.
    pub fn value(&self) -> Option<&Value> {
        match &self.value {
            ClauseValue::One(v) => Some(v),
            _ => None,
        }
    }
}

/// Ordered list of clauses, joined with `AND`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CriteriaCondition {
    clauses: Vec<Clause>,
}

macro_rules! scalar_clause {
    ($($name:ident => $op:ident),* $(,)?) => {
        $(
            pub fn $name(self, key: impl Into<String>, value: impl Into<Value>) -> Self {
                self.push(key, Op::$op, ClauseValue::One(value.into()))
            }
        )*
    };
}

impl CriteriaCondition {
    pub fn new() -> Self {
        Self::default()
    }

    scalar_clause!(eq => Eq, ne => Ne, gt => Gt, gte => Gte, lt => Lt, lte => Lte);

    /// Substring match: `pattern` is wrapped in `%` on both sides, so `%` or
    /// `_` inside it still act as wildcards but can never anchor the match.
    pub fn like(self, key: impl Into<String>, pattern: impl Into<String>) -> Self {
        self.push(key, Op::Like, ClauseValue::One(Value::Text(pattern.into())))
    }

    pub fn in_list<V, I>(self, key: impl Into<String>, values: I) -> Self
    where
        V: Into<Value>,
        I: IntoIterator<Item = V>,
    {
        let values = values.into_iter().map(Into::into).collect();
        self.push(key, Op::In, ClauseValue::Many(values))
    }

    pub fn not_in<V, I>(self, key: impl Into<String>, values: I) -> Self
    where
        V: Into<Value>,
        I: IntoIterator<Item = V>,
    {
        let values = values.into_iter().map(Into::into).collect();
        self.push(key, Op::NotIn, ClauseValue::Many(values))
    }

    pub fn is_null(self, key: impl Into<String>) -> Self {
        self.push(key, Op::IsNull, ClauseValue::Nothing)
    }

    pub fn is_not_null(self, key: impl Into<String>) -> Self {
        self.push(key, Op::IsNotNull, ClauseValue::Nothing)
    }

    fn push(mut self, key: impl Into<String>, op: Op, value: ClauseValue) -> Self {
        self.clauses.push(Clause {
            key: key.into(),
            op,
            value,
        });
        self
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Compiles every clause onto `query`, resolving keys against `schema`.
    pub fn apply<Q: Filterable>(&self, schema: &Schema, mut query: Q) -> Result<Q> {
        for clause in &self.clauses {
            let col = Col::of(schema.require(&clause.key)?);
            query = match (clause.op, &clause.value) {
                (Op::IsNull, ClauseValue::Nothing) => query.filter(col.null()),
                (Op::IsNotNull, ClauseValue::Nothing) => query.filter(col.not_null()),
                (Op::In, ClauseValue::Many(values)) => query.filter(col.in_(values.clone())),
                (Op::NotIn, ClauseValue::Many(values)) => {
                    query.filter(col.not_in(values.clone()))
                }
                (Op::Like, ClauseValue::One(value)) => query.filter(col.like(value_text(value))),
                (op, ClauseValue::One(value)) => match col.compare(op, value.clone()) {
                    Some(expr) => query.filter(expr),
                    None => return Err(operand_mismatch(clause)),
                },
                _ => return Err(operand_mismatch(clause)),
            };
        }
        Ok(query)
    }
}

fn operand_mismatch(clause: &Clause) -> DbError {
    let expected = match clause.op {
        Op::In | Op::NotIn => "a value list",
        Op::IsNull | Op::IsNotNull => "no value",
        _ => "a single value",
    };
    DbError::QueryError(format!(
        "operator {:?} on '{}' needs {expected}",
        clause.op, clause.key
    ))
}

/// Result shape of a [`Criteria`].
#[derive(Debug, Clone, Default, PartialEq)]
pub enum CriteriaMode {
    /// Rows decode into the bound entity type.
    #[default]
    Entity,
    /// Rows are returned as [`Record`]s restricted to `result_keys`
    /// (all columns when empty).
    ResultMapped { result_keys: Vec<String> },
}

/// 1-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paging {
    pub page: u32,
    pub rows: u32,
}

impl Default for Paging {
    fn default() -> Self {
        Self {
            page: 1,
            rows: 20,
        }
    }
}

/// A structured query: condition, ordering, paging and result shape.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Criteria {
    pub condition: CriteriaCondition,
    pub order_by: Vec<(String, Direction)>,
    pub paging: Option<Paging>,
    pub mode: CriteriaMode,
}

impl Criteria {
    pub fn new(condition: CriteriaCondition) -> Self {
        Self {
            condition,
            ..Self::default()
        }
    }

    /// A map-shaped criteria projecting `result_keys`.
    pub fn result_mapped<I, S>(condition: CriteriaCondition, result_keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            condition,
            mode: CriteriaMode::ResultMapped {
                result_keys: result_keys.into_iter().map(Into::into).collect(),
            },
            ..Self::default()
        }
    }

    pub fn order_by(mut self, key: impl Into<String>, direction: Direction) -> Self {
        self.order_by.push((key.into(), direction));
        self
    }

    pub fn paged(mut self, page: u32, rows: u32) -> Self {
        self.paging = Some(Paging {
            page: page.max(1),
            rows,
        });
        self
    }

    pub fn is_result_mapped(&self) -> bool {
        matches!(self.mode, CriteriaMode::ResultMapped { .. })
    }
}

/// A page of results.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub page: u32,
    pub rows: u32,
    pub total_rows: u64,
    pub list: Vec<T>,
}

impl<T> Page<T> {
    pub fn total_pages(&self) -> u64 {
        if self.rows == 0 {
            return 0;
        }
        self.total_rows.div_ceil(u64::from(self.rows))
    }

    /// Converts every item, keeping the paging figures.
    pub fn try_map<U, E>(self, f: impl FnMut(T) -> std::result::Result<U, E>) -> std::result::Result<Page<U>, E> {
        Ok(Page {
            page: self.page,
            rows: self.rows,
            total_rows: self.total_rows,
            list: self.list.into_iter().map(f).collect::<std::result::Result<_, _>>()?,
        })
    }
}

/// An update request: an optional target row, explicit assignments and a
/// predicate. The entity type is bound through `T`.
#[derive(Debug, Clone)]
pub struct RefreshCondition<T> {
    pub target: Option<T>,
    pub assignments: Vec<(String, Value)>,
    pub condition: CriteriaCondition,
}

impl<T> Default for RefreshCondition<T> {
    fn default() -> Self {
        Self {
            target: None,
            assignments: Vec::new(),
            condition: CriteriaCondition::default(),
        }
    }
}

impl<T> RefreshCondition<T> {
    pub fn new(condition: CriteriaCondition) -> Self {
        Self {
            condition,
            ..Self::default()
        }
    }

    pub fn with_target(mut self, target: T) -> Self {
        self.target = Some(target);
        self
    }

    /// Adds `key = value` to the SET list.
    pub fn refresh(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.assignments.push((key.into(), value.into()));
        self
    }
}

impl<T: Entity> RefreshCondition<T> {
    /// Type-erased form handed to the engine.
    pub fn to_refresh(&self) -> Refresh {
        Refresh {
            target: self.target.as_ref().map(Entity::to_record),
            assignments: self.assignments.clone(),
            condition: self.condition.clone(),
        }
    }
}

/// Engine-side form of a [`RefreshCondition`].
#[derive(Debug, Clone, PartialEq)]
pub struct Refresh {
    pub target: Option<Record>,
    pub assignments: Vec<(String, Value)>,
    pub condition: CriteriaCondition,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReduceType {
    Count,
    CountDistinct,
    Sum,
    Max,
    Min,
    Avg,
}

impl ReduceType {
    pub(crate) fn sql(self, column: &str) -> String {
        match self {
            ReduceType::Count => format!("COUNT({column})"),
            ReduceType::CountDistinct => format!("COUNT(DISTINCT {column})"),
            ReduceType::Sum => format!("SUM({column})"),
            ReduceType::Max => format!("MAX({column})"),
            ReduceType::Min => format!("MIN({column})"),
            ReduceType::Avg => format!("AVG({column})"),
        }
    }
}

/// Aggregation over one property.
#[derive(Debug, Clone, PartialEq)]
pub struct ReduceCondition {
    pub reduce_type: ReduceType,
    pub property: String,
    pub condition: CriteriaCondition,
}

impl ReduceCondition {
    pub fn new(reduce_type: ReduceType, property: impl Into<String>) -> Self {
        Self {
            reduce_type,
            property: property.into(),
            condition: CriteriaCondition::default(),
        }
    }

    pub fn with_condition(mut self, condition: CriteriaCondition) -> Self {
        self.condition = condition;
        self
    }
}

/// Membership query: rows whose `property` is in `in_list`.
#[derive(Debug, Clone, PartialEq)]
pub struct InCondition {
    pub property: String,
    pub in_list: Vec<Value>,
}

impl InCondition {
    pub fn new<V, I>(property: impl Into<String>, in_list: I) -> Self
    where
        V: Into<Value>,
        I: IntoIterator<Item = V>,
    {
        Self {
            property: property.into(),
            in_list: in_list.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.in_list.is_empty()
    }
}
