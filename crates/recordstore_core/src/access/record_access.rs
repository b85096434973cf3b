//! The record access facade.
//!
//! # Responsibility
//! - Expose add/get/delete/save entry points for application code.
//! - Translate field filters into structured predicates.
//!
//! # Invariants
//! - The facade never bypasses the context's validation or pending
//!   buffer.
//! - Fetch failures propagate as errors; they are never folded into an
//!   empty result.

use crate::model::record::{FieldFilter, Record};
use crate::predicate;
use crate::schema::{Schema, StoreConfig};
use crate::store::{
    DeleteError, FetchError, FetchSpec, InvalidRecordError, SaveError, StoreContext,
    StoreInitError,
};

/// Public facade over one store context.
///
/// Construct one per store at the composition root, or install a
/// process-wide instance through [`crate::access::shared`].
pub struct RecordAccess {
    context: StoreContext,
}

impl std::fmt::Debug for RecordAccess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordAccess").finish_non_exhaustive()
    }
}

impl RecordAccess {
    /// Opens the store described by `config` and wraps it.
    pub fn open(config: &StoreConfig) -> Result<Self, StoreInitError> {
        Ok(Self {
            context: StoreContext::open(config)?,
        })
    }

    /// Opens a transient in-memory store over `schema` and wraps it.
    pub fn open_in_memory(schema: Schema) -> Result<Self, StoreInitError> {
        Ok(Self {
            context: StoreContext::open_in_memory(schema)?,
        })
    }

    /// Wraps an already-open context.
    pub fn with_context(context: StoreContext) -> Self {
        Self { context }
    }

    /// The underlying context, for callers that need fetch specs or
    /// predicates directly.
    pub fn context(&self) -> &StoreContext {
        &self.context
    }

    /// Creates a new uncommitted record of `entity`.
    pub fn add(&self, entity: &str) -> Result<Record, InvalidRecordError> {
        self.context.insert(entity)
    }

    /// Stages the caller's copy of `record` as its pending state.
    pub fn update(&self, record: &Record) -> Result<(), InvalidRecordError> {
        self.context.stage_update(record)
    }

    /// Returns one record of `entity` whose `field` equals `value`, or
    /// `Ok(None)` when nothing matches.
    ///
    /// When several records match, the one with the smallest id is
    /// returned; the choice is deterministic but unrelated to insertion
    /// order.
    pub fn get_one(
        &self,
        entity: &str,
        field: &str,
        value: &str,
    ) -> Result<Option<Record>, FetchError> {
        let predicate = predicate::equality(field, value)?;
        let spec = FetchSpec::new(entity).with_predicate(predicate).with_limit(1);
        Ok(self.context.fetch(&spec)?.into_iter().next())
    }

    /// Returns all records of `entity` matching `filter` (every pair
    /// must match; an empty filter matches all), sorted ascending by
    /// `sort_by`, capped at `limit` (`0` = unbounded).
    ///
    /// Unlike the legacy design this surfaces fetch failures instead of
    /// returning an empty sequence, so "no matches" and "fetch failed"
    /// stay distinguishable.
    pub fn get_all(
        &self,
        entity: &str,
        filter: &FieldFilter,
        limit: u32,
        sort_by: &str,
    ) -> Result<Vec<Record>, FetchError> {
        let mut spec = FetchSpec::new(entity).sorted_by(sort_by).with_limit(limit);
        if let Some(predicate) = predicate::conjunction(filter)? {
            spec = spec.with_predicate(predicate);
        }
        self.context.fetch(&spec)
    }

    /// Marks `record` for removal on the next [`save`](Self::save).
    pub fn delete_one(&self, record: &Record) -> Result<(), InvalidRecordError> {
        self.context.delete_one(record)
    }

    /// Immediately removes every durable record of `entity`, returning
    /// the removed row count. See
    /// [`StoreContext::delete_all_of_type`] for the pending-state
    /// caveats.
    pub fn delete_all(&self, entity: &str) -> Result<u64, DeleteError> {
        self.context.delete_all_of_type(entity)
    }

    /// Commits all pending mutations atomically.
    pub fn save(&self) -> Result<(), SaveError> {
        self.context.save()
    }

    /// Whether any uncommitted mutations are buffered.
    pub fn has_pending_changes(&self) -> bool {
        self.context.has_pending_changes()
    }

    /// Releases the store session deterministically.
    pub fn close(&self) {
        self.context.close()
    }
}
