//! Store context: pending-change coordination over one SQLite session.
//!
//! # Responsibility
//! - Buffer inserts, updates, and single deletes until `save` commits
//!   them as one transaction.
//! - Execute fetches so results reflect uncommitted pending state
//!   (read-your-writes).
//!
//! # Invariants
//! - All operations serialize on one internal lock; callers may be
//!   concurrent.
//! - A failed `save` rolls back and leaves every pending mutation
//!   intact and retryable.
//! - Bulk deletes act on durable rows only and never touch pending
//!   state.

use super::{DeleteError, FetchError, FetchSpec, InvalidRecordError, SaveError};
use crate::model::record::{Record, RecordId};
use crate::schema::{EntityDef, Schema, ID_FIELD};
use log::{debug, error, info};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, Row, Transaction};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// The single mutable session against the underlying engine.
///
/// One context owns one connection and one pending-change buffer.
/// Records obtained from a context are only meaningful while that
/// context is alive and open.
pub struct StoreContext {
    inner: Mutex<Inner>,
}

struct Inner {
    conn: Option<Connection>,
    schema: Schema,
    pending: Pending,
}

#[derive(Default)]
struct Pending {
    inserts: Vec<Record>,
    updates: BTreeMap<RecordId, Record>,
    /// Durable records marked for deletion, keyed by id, valued by
    /// entity name.
    deletes: BTreeMap<RecordId, String>,
}

impl Pending {
    fn is_empty(&self) -> bool {
        self.inserts.is_empty() && self.updates.is_empty() && self.deletes.is_empty()
    }

    fn clear(&mut self) {
        self.inserts.clear();
        self.updates.clear();
        self.deletes.clear();
    }

    fn touches(&self, entity: &str) -> bool {
        self.inserts.iter().any(|r| r.entity_type() == entity)
            || self.updates.values().any(|r| r.entity_type() == entity)
            || self.deletes.values().any(|e| e == entity)
    }
}

impl std::fmt::Debug for StoreContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreContext").finish_non_exhaustive()
    }
}

impl StoreContext {
    pub(super) fn from_parts(conn: Connection, schema: Schema) -> Self {
        Self {
            inner: Mutex::new(Inner {
                conn: Some(conn),
                schema,
                pending: Pending::default(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Executes a fetch: filter, ascending sort, limit, materialize.
    ///
    /// Results reflect pending mutations in this context. When the
    /// entity has no pending state, filter/sort/limit are pushed down
    /// to the engine; otherwise durable rows are merged with pending
    /// state and the pipeline runs in memory with identical ordering
    /// rules (NULL sort keys first, id as tiebreak).
    pub fn fetch(&self, spec: &FetchSpec) -> Result<Vec<Record>, FetchError> {
        let guard = self.lock();
        let Inner {
            conn,
            schema,
            pending,
        } = &*guard;
        let conn = conn.as_ref().ok_or(FetchError::ContextClosed)?;
        let entity = schema
            .entity(&spec.entity)
            .ok_or_else(|| FetchError::UnknownEntity(spec.entity.clone()))?;

        if !entity.has_field(&spec.sort_by) {
            return Err(FetchError::UnknownField {
                entity: entity.name.clone(),
                field: spec.sort_by.clone(),
            });
        }
        if let Some(predicate) = &spec.predicate {
            for field in predicate.fields() {
                if !entity.has_field(field) {
                    return Err(FetchError::UnknownField {
                        entity: entity.name.clone(),
                        field: field.to_string(),
                    });
                }
            }
        }

        if pending.touches(&entity.name) {
            fetch_merged(conn, entity, pending, spec)
        } else {
            fetch_pushdown(conn, entity, spec)
        }
    }

    /// Allocates a new uncommitted record of `entity`, attached to this
    /// context. Durable storage is untouched until `save`.
    pub fn insert(&self, entity: &str) -> Result<Record, InvalidRecordError> {
        let mut guard = self.lock();
        let Inner {
            conn,
            schema,
            pending,
        } = &mut *guard;
        conn.as_ref().ok_or(InvalidRecordError::ContextClosed)?;
        let def = schema
            .entity(entity)
            .ok_or_else(|| InvalidRecordError::UnknownEntity(entity.to_string()))?;

        let record = Record::new(def.name.clone());
        debug!(
            "event=store_insert module=store entity={} id={}",
            def.name,
            record.id()
        );
        pending.inserts.push(record.clone());
        Ok(record)
    }

    /// Stages the caller's copy of a record as the pending state for
    /// its id: amends a pending insert in place, or buffers an update
    /// for a durable record.
    ///
    /// # Errors
    /// - [`InvalidRecordError::UnknownField`] when the record carries a
    ///   field its entity does not declare.
    /// - [`InvalidRecordError::NotInStore`] when the record is neither
    ///   pending nor durable here, or is already marked for deletion.
    pub fn stage_update(&self, record: &Record) -> Result<(), InvalidRecordError> {
        let mut guard = self.lock();
        let Inner {
            conn,
            schema,
            pending,
        } = &mut *guard;
        let conn = conn.as_ref().ok_or(InvalidRecordError::ContextClosed)?;
        let def = lookup_entity(schema, record)?;
        validate_fields(def, record)?;

        if let Some(staged) = pending
            .inserts
            .iter_mut()
            .find(|staged| staged.id() == record.id())
        {
            *staged = record.clone();
            return Ok(());
        }
        if pending.deletes.contains_key(&record.id()) {
            return Err(InvalidRecordError::NotInStore(record.id()));
        }
        if pending.updates.contains_key(&record.id()) || row_exists(conn, def, record.id())? {
            pending.updates.insert(record.id(), record.clone());
            return Ok(());
        }
        Err(InvalidRecordError::NotInStore(record.id()))
    }

    /// Marks one record for removal on the next `save`.
    ///
    /// A pending insert is simply dropped, together with any staged
    /// field edits. A durable record gets a pending delete; any staged
    /// update for it is discarded, since deletion supersedes it.
    /// Repeating a delete is a no-op.
    ///
    /// # Errors
    /// [`InvalidRecordError::NotInStore`] when the record is neither
    /// pending nor durable in this store.
    pub fn delete_one(&self, record: &Record) -> Result<(), InvalidRecordError> {
        let mut guard = self.lock();
        let Inner {
            conn,
            schema,
            pending,
        } = &mut *guard;
        let conn = conn.as_ref().ok_or(InvalidRecordError::ContextClosed)?;
        let def = lookup_entity(schema, record)?;
        let id = record.id();

        if let Some(position) = pending.inserts.iter().position(|staged| staged.id() == id) {
            pending.inserts.remove(position);
            return Ok(());
        }
        if pending.updates.remove(&id).is_some() {
            pending.deletes.insert(id, def.name.clone());
            return Ok(());
        }
        if pending.deletes.contains_key(&id) {
            return Ok(());
        }
        if row_exists(conn, def, id)? {
            pending.deletes.insert(id, def.name.clone());
            return Ok(());
        }
        Err(InvalidRecordError::NotInStore(id))
    }

    /// Removes every durable record of `entity` immediately, bypassing
    /// the pending buffer, and returns the number of rows removed.
    ///
    /// This is an engine-level batch delete and is unaware of the
    /// pending buffer: pending inserts of the same entity survive, and
    /// a staged update whose durable row is removed here will fail the
    /// next `save` with [`SaveError::RecordVanished`].
    pub fn delete_all_of_type(&self, entity: &str) -> Result<u64, DeleteError> {
        let guard = self.lock();
        let Inner { conn, schema, .. } = &*guard;
        let conn = conn.as_ref().ok_or(DeleteError::ContextClosed)?;
        let def = schema
            .entity(entity)
            .ok_or_else(|| DeleteError::UnknownEntity(entity.to_string()))?;

        let removed = conn.execute(&format!("DELETE FROM \"{}\";", def.name), [])? as u64;
        info!(
            "event=store_bulk_delete module=store status=ok entity={} rows={removed}",
            def.name
        );
        Ok(removed)
    }

    /// Commits all pending mutations as one transaction.
    ///
    /// With nothing pending this is a no-op. On failure the transaction
    /// rolls back, every pending mutation stays buffered, and the next
    /// `save` retries the full set.
    pub fn save(&self) -> Result<(), SaveError> {
        let mut guard = self.lock();
        let Inner {
            conn,
            schema,
            pending,
        } = &mut *guard;
        let conn = conn.as_mut().ok_or(SaveError::ContextClosed)?;
        if pending.is_empty() {
            return Ok(());
        }

        let (inserts, updates, deletes) = (
            pending.inserts.len(),
            pending.updates.len(),
            pending.deletes.len(),
        );
        match commit_pending(conn, schema, pending) {
            Ok(()) => {
                pending.clear();
                info!(
                    "event=store_save module=store status=ok inserts={inserts} updates={updates} deletes={deletes}"
                );
                Ok(())
            }
            Err(err) => {
                error!(
                    "event=store_save module=store status=error inserts={inserts} updates={updates} deletes={deletes} error={err}"
                );
                Err(err)
            }
        }
    }

    /// Whether any uncommitted mutations are buffered.
    pub fn has_pending_changes(&self) -> bool {
        !self.lock().pending.is_empty()
    }

    /// Releases the engine session deterministically. Pending
    /// uncommitted mutations are discarded; subsequent operations fail
    /// with the `ContextClosed` variant of their error type.
    pub fn close(&self) {
        let mut guard = self.lock();
        let dropped = !guard.pending.is_empty();
        guard.pending.clear();
        if let Some(conn) = guard.conn.take() {
            match conn.close() {
                Ok(()) => info!(
                    "event=store_close module=store status=ok pending_dropped={dropped}"
                ),
                Err((_conn, err)) => {
                    error!("event=store_close module=store status=error error={err}")
                }
            }
        }
    }
}

fn lookup_entity<'a>(
    schema: &'a Schema,
    record: &Record,
) -> Result<&'a EntityDef, InvalidRecordError> {
    schema
        .entity(record.entity_type())
        .ok_or_else(|| InvalidRecordError::UnknownEntity(record.entity_type().to_string()))
}

fn validate_fields(def: &EntityDef, record: &Record) -> Result<(), InvalidRecordError> {
    for field in record.fields().keys() {
        if !def.declares(field) {
            return Err(InvalidRecordError::UnknownField {
                entity: def.name.clone(),
                field: field.clone(),
            });
        }
    }
    Ok(())
}

fn row_exists(conn: &Connection, def: &EntityDef, id: RecordId) -> Result<bool, rusqlite::Error> {
    let found: i64 = conn.query_row(
        &format!(
            "SELECT EXISTS(SELECT 1 FROM \"{}\" WHERE \"id\" = ?1);",
            def.name
        ),
        [id.to_string()],
        |row| row.get(0),
    )?;
    Ok(found == 1)
}

fn select_sql(def: &EntityDef) -> String {
    let mut columns = vec!["\"id\"".to_string()];
    columns.extend(def.fields.iter().map(|field| format!("\"{field}\"")));
    format!("SELECT {} FROM \"{}\"", columns.join(", "), def.name)
}

fn order_clause(sort_by: &str) -> String {
    if sort_by == ID_FIELD {
        " ORDER BY \"id\" ASC".to_string()
    } else {
        format!(" ORDER BY \"{sort_by}\" ASC, \"id\" ASC")
    }
}

fn fetch_pushdown(
    conn: &Connection,
    def: &EntityDef,
    spec: &FetchSpec,
) -> Result<Vec<Record>, FetchError> {
    let mut sql = select_sql(def);
    let mut binds: Vec<Value> = Vec::new();

    if let Some(predicate) = &spec.predicate {
        let (fragment, values) = predicate.to_sql();
        sql.push_str(" WHERE ");
        sql.push_str(&fragment);
        binds.extend(values);
    }
    sql.push_str(&order_clause(&spec.sort_by));
    if spec.limit > 0 {
        sql.push_str(" LIMIT ?");
        binds.push(Value::Integer(i64::from(spec.limit)));
    }

    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query(params_from_iter(binds))?;
    let mut records = Vec::new();
    while let Some(row) = rows.next()? {
        records.push(decode_row(def, row)?);
    }
    Ok(records)
}

fn fetch_merged(
    conn: &Connection,
    def: &EntityDef,
    pending: &Pending,
    spec: &FetchSpec,
) -> Result<Vec<Record>, FetchError> {
    let mut stmt = conn.prepare(&select_sql(def))?;
    let mut rows = stmt.query([])?;
    let mut records = Vec::new();
    while let Some(row) = rows.next()? {
        records.push(decode_row(def, row)?);
    }

    for record in &mut records {
        if let Some(updated) = pending.updates.get(&record.id()) {
            *record = updated.clone();
        }
    }
    records.retain(|record| !pending.deletes.contains_key(&record.id()));
    records.extend(
        pending
            .inserts
            .iter()
            .filter(|record| record.entity_type() == def.name)
            .cloned(),
    );

    if let Some(predicate) = &spec.predicate {
        records.retain(|record| predicate.matches(record));
    }
    sort_records(&mut records, &spec.sort_by);
    if spec.limit > 0 {
        records.truncate(spec.limit as usize);
    }
    Ok(records)
}

fn decode_row(def: &EntityDef, row: &Row<'_>) -> Result<Record, FetchError> {
    let id_text: String = row.get(0)?;
    let id = uuid::Uuid::parse_str(&id_text).map_err(|_| {
        FetchError::InvalidRow(format!(
            "invalid id `{id_text}` in table `{}`",
            def.name
        ))
    })?;

    let mut fields = BTreeMap::new();
    for (index, field) in def.fields.iter().enumerate() {
        if let Some(value) = row.get::<_, Option<String>>(index + 1)? {
            fields.insert(field.clone(), value);
        }
    }
    Ok(Record::from_parts(id, def.name.clone(), fields))
}

/// Ascending sort with NULL keys first and id as tiebreak, matching
/// what the pushed-down `ORDER BY` produces.
fn sort_records(records: &mut [Record], sort_by: &str) {
    records.sort_by(|a, b| {
        sort_value(a, sort_by)
            .cmp(&sort_value(b, sort_by))
            .then_with(|| a.id().to_string().cmp(&b.id().to_string()))
    });
}

fn sort_value(record: &Record, sort_by: &str) -> Option<String> {
    if sort_by == ID_FIELD {
        Some(record.id().to_string())
    } else {
        record.field(sort_by).map(str::to_owned)
    }
}

fn commit_pending(
    conn: &mut Connection,
    schema: &Schema,
    pending: &Pending,
) -> Result<(), SaveError> {
    let tx = conn.transaction()?;
    for (id, entity) in &pending.deletes {
        // 0 rows changed is fine: the row may have been bulk-deleted
        // since the record was marked.
        tx.execute(
            &format!("DELETE FROM \"{entity}\" WHERE \"id\" = ?1;"),
            [id.to_string()],
        )?;
    }
    for record in &pending.inserts {
        let def = resolve_def(schema, record)?;
        exec_insert(&tx, def, record)?;
    }
    for record in pending.updates.values() {
        let def = resolve_def(schema, record)?;
        if exec_update(&tx, def, record)? == 0 {
            return Err(SaveError::RecordVanished(record.id()));
        }
    }
    tx.commit()?;
    Ok(())
}

fn resolve_def<'a>(schema: &'a Schema, record: &Record) -> Result<&'a EntityDef, SaveError> {
    // Staging validated the entity against this schema; absence means
    // the record was staged against a different store's schema.
    schema
        .entity(record.entity_type())
        .ok_or(SaveError::RecordVanished(record.id()))
}

fn exec_insert(
    tx: &Transaction<'_>,
    def: &EntityDef,
    record: &Record,
) -> Result<(), rusqlite::Error> {
    let mut columns = vec!["\"id\"".to_string()];
    let mut binds: Vec<Value> = vec![Value::Text(record.id().to_string())];
    for field in &def.fields {
        columns.push(format!("\"{field}\""));
        binds.push(match record.field(field) {
            Some(value) => Value::Text(value.to_string()),
            None => Value::Null,
        });
    }
    let placeholders = (1..=binds.len())
        .map(|index| format!("?{index}"))
        .collect::<Vec<_>>()
        .join(", ");
    tx.execute(
        &format!(
            "INSERT INTO \"{}\" ({}) VALUES ({});",
            def.name,
            columns.join(", "),
            placeholders
        ),
        params_from_iter(binds),
    )?;
    Ok(())
}

fn exec_update(
    tx: &Transaction<'_>,
    def: &EntityDef,
    record: &Record,
) -> Result<usize, rusqlite::Error> {
    let mut sets = Vec::new();
    let mut binds: Vec<Value> = Vec::new();
    for field in &def.fields {
        sets.push(format!("\"{field}\" = ?"));
        binds.push(match record.field(field) {
            Some(value) => Value::Text(value.to_string()),
            None => Value::Null,
        });
    }
    if sets.is_empty() {
        // Fieldless entity: the update only asserts the row exists.
        sets.push("\"id\" = \"id\"".to_string());
    }
    binds.push(Value::Text(record.id().to_string()));
    tx.execute(
        &format!(
            "UPDATE \"{}\" SET {} WHERE \"id\" = ?;",
            def.name,
            sets.join(", ")
        ),
        params_from_iter(binds),
    )
}
