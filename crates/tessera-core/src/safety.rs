//! Guards that keep updates bounded to primary-key identified rows.

use tessera_db::{is_usable, Clause, ClauseValue, Element, Record, Refresh, Schema};

use crate::error::{RepoError, Result};

const NO_KEY: &str = "No PrimaryKey, UnSafe Refresh, try refresh_unsafe";
const UNSAFE: &str = "UnSafe Refresh, try refresh_unsafe";

fn key_of(schema: &Schema) -> Result<&Element> {
    schema
        .key_field()
        .ok_or_else(|| RepoError::Persistence(NO_KEY.to_string()))
}

fn names_key(clause: &Clause, key: &Element) -> bool {
    clause.key == key.property || clause.key == key.column
}

fn has_usable_value(clause: &Clause) -> bool {
    match &clause.value {
        ClauseValue::One(value) => is_usable(value),
        ClauseValue::Many(values) => !values.is_empty(),
        ClauseValue::Nothing => false,
    }
}

/// A whole-entity update must carry a usable key.
pub(crate) fn check_refresh(schema: &Schema, record: &Record) -> Result<()> {
    let key = key_of(schema)?;
    match key.get(record) {
        Some(value) if is_usable(value) => Ok(()),
        _ => Err(RepoError::Persistence(UNSAFE.to_string())),
    }
}

/// A conditional update must pin the key through its target or a clause.
pub(crate) fn check_refresh_condition(schema: &Schema, refresh: &Refresh) -> Result<()> {
    let key = key_of(schema)?;
    let target_pinned = refresh
        .target
        .as_ref()
        .and_then(|target| key.get(target))
        .is_some_and(is_usable);
    let clause_pinned = refresh
        .condition
        .clauses()
        .iter()
        .any(|clause| names_key(clause, key) && has_usable_value(clause));
    if target_pinned || clause_pinned {
        Ok(())
    } else {
        Err(RepoError::Persistence(UNSAFE.to_string()))
    }
}
