//! Store session: the single mutable coordination point against SQLite.
//!
//! # Responsibility
//! - Define the fetch descriptor and the store error taxonomy.
//! - Host [`StoreContext`] open/bootstrap and operation code.
//!
//! # Invariants
//! - Initialization failures are surfaced once, from `open`; every
//!   per-operation failure is a recoverable `Result`.
//! - A failed `save` never discards pending mutations.

use crate::model::record::RecordId;
use crate::predicate::{InvalidFieldError, Predicate};
use crate::schema::{SchemaError, ID_FIELD};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

mod context;
mod open;

pub use context::StoreContext;

/// One read operation: entity, optional filter, ascending sort, limit.
#[derive(Debug, Clone)]
pub struct FetchSpec {
    pub entity: String,
    pub predicate: Option<Predicate>,
    /// Sort field, ascending. Defaults to `id`.
    pub sort_by: String,
    /// Maximum number of records; `0` means unbounded.
    pub limit: u32,
}

impl FetchSpec {
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            predicate: None,
            sort_by: ID_FIELD.to_string(),
            limit: 0,
        }
    }

    pub fn with_predicate(mut self, predicate: Predicate) -> Self {
        self.predicate = Some(predicate);
        self
    }

    pub fn sorted_by(mut self, field: impl Into<String>) -> Self {
        self.sort_by = field.into();
        self
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }
}

/// Fatal initialization errors from [`StoreContext::open`].
///
/// Callers should treat these as startup failures; nothing about the
/// store is usable after one.
#[derive(Debug)]
pub enum StoreInitError {
    /// The schema resource does not exist at the resolved path.
    SchemaMissing(PathBuf),
    Schema(SchemaError),
    /// The database file could not be opened or attached.
    Attach(rusqlite::Error),
    /// Pragmas or per-entity DDL failed after attach.
    Bootstrap(rusqlite::Error),
}

impl Display for StoreInitError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SchemaMissing(path) => {
                write!(f, "schema resource not found at `{}`", path.display())
            }
            Self::Schema(err) => write!(f, "{err}"),
            Self::Attach(err) => write!(f, "failed to attach storage: {err}"),
            Self::Bootstrap(err) => write!(f, "failed to bootstrap storage: {err}"),
        }
    }
}

impl Error for StoreInitError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::SchemaMissing(_) => None,
            Self::Schema(err) => Some(err),
            Self::Attach(err) | Self::Bootstrap(err) => Some(err),
        }
    }
}

impl From<SchemaError> for StoreInitError {
    fn from(value: SchemaError) -> Self {
        Self::Schema(value)
    }
}

/// Recoverable fetch failures.
#[derive(Debug)]
pub enum FetchError {
    UnknownEntity(String),
    UnknownField { entity: String, field: String },
    Predicate(InvalidFieldError),
    /// A stored row could not be decoded into a record.
    InvalidRow(String),
    ContextClosed,
    Engine(rusqlite::Error),
}

impl Display for FetchError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownEntity(entity) => write!(f, "unknown entity `{entity}`"),
            Self::UnknownField { entity, field } => {
                write!(f, "entity `{entity}` has no field `{field}`")
            }
            Self::Predicate(err) => write!(f, "{err}"),
            Self::InvalidRow(message) => write!(f, "invalid stored row: {message}"),
            Self::ContextClosed => write!(f, "store context is closed"),
            Self::Engine(err) => write!(f, "fetch failed: {err}"),
        }
    }
}

impl Error for FetchError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Predicate(err) => Some(err),
            Self::Engine(err) => Some(err),
            _ => None,
        }
    }
}

impl From<InvalidFieldError> for FetchError {
    fn from(value: InvalidFieldError) -> Self {
        Self::Predicate(value)
    }
}

impl From<rusqlite::Error> for FetchError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Engine(value)
    }
}

/// Recoverable commit failures. Pending mutations survive every variant
/// and a later `save` may retry them.
#[derive(Debug)]
pub enum SaveError {
    /// A staged update targets a row that no longer exists.
    RecordVanished(RecordId),
    ContextClosed,
    Engine(rusqlite::Error),
}

impl Display for SaveError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RecordVanished(id) => {
                write!(f, "staged update targets missing record `{id}`")
            }
            Self::ContextClosed => write!(f, "store context is closed"),
            Self::Engine(err) => write!(f, "save failed: {err}"),
        }
    }
}

impl Error for SaveError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Engine(err) => Some(err),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for SaveError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Engine(value)
    }
}

/// Recoverable bulk-delete failures.
#[derive(Debug)]
pub enum DeleteError {
    UnknownEntity(String),
    ContextClosed,
    Engine(rusqlite::Error),
}

impl Display for DeleteError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownEntity(entity) => write!(f, "unknown entity `{entity}`"),
            Self::ContextClosed => write!(f, "store context is closed"),
            Self::Engine(err) => write!(f, "bulk delete failed: {err}"),
        }
    }
}

impl Error for DeleteError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Engine(err) => Some(err),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for DeleteError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Engine(value)
    }
}

/// Caller-misuse errors from record-level mutations.
#[derive(Debug)]
pub enum InvalidRecordError {
    UnknownEntity(String),
    UnknownField { entity: String, field: String },
    /// The record is neither pending nor durable in this store.
    NotInStore(RecordId),
    ContextClosed,
    /// Membership lookups hit the engine and may fail like any read.
    Engine(rusqlite::Error),
}

impl Display for InvalidRecordError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownEntity(entity) => write!(f, "unknown entity `{entity}`"),
            Self::UnknownField { entity, field } => {
                write!(f, "entity `{entity}` has no field `{field}`")
            }
            Self::NotInStore(id) => write!(f, "record `{id}` does not belong to this store"),
            Self::ContextClosed => write!(f, "store context is closed"),
            Self::Engine(err) => write!(f, "record lookup failed: {err}"),
        }
    }
}

impl Error for InvalidRecordError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Engine(err) => Some(err),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for InvalidRecordError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Engine(value)
    }
}
