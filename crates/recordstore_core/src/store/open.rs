//! Store bootstrap: schema resolution, attach, pragmas, per-entity DDL.
//!
//! # Responsibility
//! - Open file or in-memory stores from a [`StoreConfig`] or a schema.
//! - Guarantee every returned context has its entity tables in place.
//!
//! # Invariants
//! - Returned contexts have `busy_timeout` configured.
//! - DDL is applied in one transaction; a half-bootstrapped store is
//!   never returned.

use super::{StoreContext, StoreInitError};
use crate::schema::{EntityDef, Schema, StoreConfig};
use log::{error, info};
use rusqlite::Connection;
use std::time::{Duration, Instant};

impl StoreContext {
    /// Opens the store described by `config`: resolves and parses the
    /// schema resource, attaches the database file (or an in-memory
    /// database when `storage_path` is `None`), and creates any missing
    /// entity tables.
    ///
    /// # Errors
    /// Initialization failures are fatal for the store; see
    /// [`StoreInitError`] for the cases.
    pub fn open(config: &StoreConfig) -> Result<Self, StoreInitError> {
        let started_at = Instant::now();
        let mode = if config.storage_path.is_some() {
            "file"
        } else {
            "memory"
        };
        info!(
            "event=store_open module=store status=start mode={mode} schema={}",
            config.schema_name
        );

        let resource = config.schema_resource_path();
        let result = load_schema(config).and_then(|schema| {
            let conn = match &config.storage_path {
                Some(path) => Connection::open(path),
                None => Connection::open_in_memory(),
            }
            .map_err(StoreInitError::Attach)?;
            bootstrap(conn, schema)
        });

        match result {
            Ok(context) => {
                info!(
                    "event=store_open module=store status=ok mode={mode} duration_ms={}",
                    started_at.elapsed().as_millis()
                );
                Ok(context)
            }
            Err(err) => {
                error!(
                    "event=store_open module=store status=error mode={mode} resource={} duration_ms={} error={err}",
                    resource.display(),
                    started_at.elapsed().as_millis()
                );
                Err(err)
            }
        }
    }

    /// Opens a transient in-memory store over an already-validated
    /// schema. Useful for tests and embedded demo schemas.
    pub fn open_in_memory(schema: Schema) -> Result<Self, StoreInitError> {
        schema.validate()?;
        let conn = Connection::open_in_memory().map_err(StoreInitError::Attach)?;
        let context = bootstrap(conn, schema)?;
        info!("event=store_open module=store status=ok mode=memory");
        Ok(context)
    }
}

fn load_schema(config: &StoreConfig) -> Result<Schema, StoreInitError> {
    let path = config.schema_resource_path();
    let text = match std::fs::read_to_string(&path) {
        Ok(text) => text,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Err(StoreInitError::SchemaMissing(path));
        }
        Err(_) => return Err(StoreInitError::SchemaMissing(path)),
    };
    Ok(Schema::from_json_str(&text)?)
}

fn bootstrap(conn: Connection, schema: Schema) -> Result<StoreContext, StoreInitError> {
    conn.busy_timeout(Duration::from_secs(5))
        .map_err(StoreInitError::Bootstrap)?;

    let ddl = schema
        .entities
        .iter()
        .map(create_table_sql)
        .collect::<Vec<_>>()
        .join("\n");
    conn.execute_batch(&format!("BEGIN;\n{ddl}\nCOMMIT;"))
        .map_err(StoreInitError::Bootstrap)?;

    Ok(StoreContext::from_parts(conn, schema))
}

fn create_table_sql(entity: &EntityDef) -> String {
    // Identifiers were validated at schema load; quoting keeps keywords
    // usable as entity or field names.
    let mut columns = vec!["\"id\" TEXT PRIMARY KEY NOT NULL".to_string()];
    columns.extend(
        entity
            .fields
            .iter()
            .map(|field| format!("\"{field}\" TEXT")),
    );
    format!(
        "CREATE TABLE IF NOT EXISTS \"{}\" ({});",
        entity.name,
        columns.join(", ")
    )
}
