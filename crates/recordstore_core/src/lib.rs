//! Generic record persistence over SQLite.
//! One facade for creating, querying, filtering, sorting, and deleting
//! flat domain records, with explicit save points and structured
//! predicates.

pub mod access;
pub mod logging;
pub mod model;
pub mod predicate;
pub mod schema;
pub mod store;

pub use access::record_access::RecordAccess;
pub use access::shared;
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::record::{FieldFilter, Record, RecordId};
pub use predicate::{conjunction, equality, InvalidFieldError, Predicate};
pub use schema::{EntityDef, Schema, SchemaError, StoreConfig, ID_FIELD};
pub use store::{
    DeleteError, FetchError, FetchSpec, InvalidRecordError, SaveError, StoreContext,
    StoreInitError,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
