//! Structured predicate construction.
//!
//! # Responsibility
//! - Build equality and AND-of-equality predicates from caller input.
//! - Render predicates as parameterized SQL and evaluate them in memory.
//!
//! # Invariants
//! - Field names are validated as bare identifiers before use.
//! - Values always travel as bound parameters, never inside SQL text.

use crate::model::record::{FieldFilter, Record};
use crate::schema::{is_identifier, ID_FIELD};
use rusqlite::types::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Field-name validation errors raised while building predicates.
#[derive(Debug, PartialEq, Eq)]
pub enum InvalidFieldError {
    Empty,
    NotAnIdentifier(String),
}

impl Display for InvalidFieldError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "predicate field name is empty"),
            Self::NotAnIdentifier(field) => {
                write!(f, "predicate field `{field}` is not a valid identifier")
            }
        }
    }
}

impl Error for InvalidFieldError {}

#[derive(Debug, Clone, PartialEq, Eq)]
struct EqualsClause {
    field: String,
    value: String,
}

/// Boolean filter over one entity's records: the AND of one or more
/// `field == value` clauses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Predicate {
    clauses: Vec<EqualsClause>,
}

/// Builds a single `field == value` predicate.
pub fn equality(field: &str, value: &str) -> Result<Predicate, InvalidFieldError> {
    Ok(Predicate {
        clauses: vec![clause(field, value)?],
    })
}

/// Builds the AND of equality predicates over all filter pairs.
///
/// Returns `None` for an empty filter, meaning "match all". Clause
/// order follows the map's key order but is not part of the contract;
/// AND is commutative.
pub fn conjunction(filter: &FieldFilter) -> Result<Option<Predicate>, InvalidFieldError> {
    if filter.is_empty() {
        return Ok(None);
    }
    let clauses = filter
        .iter()
        .map(|(field, value)| clause(field, value))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Some(Predicate { clauses }))
}

fn clause(field: &str, value: &str) -> Result<EqualsClause, InvalidFieldError> {
    if field.is_empty() {
        return Err(InvalidFieldError::Empty);
    }
    if !is_identifier(field) {
        return Err(InvalidFieldError::NotAnIdentifier(field.to_string()));
    }
    Ok(EqualsClause {
        field: field.to_string(),
        value: value.to_string(),
    })
}

impl Predicate {
    /// Field names referenced by this predicate, for schema checks.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.clauses.iter().map(|clause| clause.field.as_str())
    }

    /// Renders the predicate as a SQL fragment plus its bind values.
    /// The fragment contains only validated identifiers and `?`
    /// placeholders.
    pub(crate) fn to_sql(&self) -> (String, Vec<Value>) {
        let fragment = self
            .clauses
            .iter()
            .map(|clause| format!("\"{}\" = ?", clause.field))
            .collect::<Vec<_>>()
            .join(" AND ");
        let binds = self
            .clauses
            .iter()
            .map(|clause| Value::Text(clause.value.clone()))
            .collect();
        (fragment, binds)
    }

    /// Evaluates the predicate against an in-memory record. Used when
    /// uncommitted mutations must be merged into fetch results.
    pub(crate) fn matches(&self, record: &Record) -> bool {
        self.clauses.iter().all(|clause| {
            if clause.field == ID_FIELD {
                record.id().to_string() == clause.value
            } else {
                record.field(&clause.field) == Some(clause.value.as_str())
            }
        })
    }
}
