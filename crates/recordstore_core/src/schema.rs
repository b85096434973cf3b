//! Schema registry and store configuration.
//!
//! # Responsibility
//! - Describe which entities exist and which fields each one carries.
//! - Resolve the schema resource named by a [`StoreConfig`].
//!
//! # Invariants
//! - Entity and field names are bare identifiers; anything else is
//!   rejected before it can reach a SQL statement.
//! - `id` is implicitly owned by every entity and may not be declared.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

/// Implicit primary-key field present on every entity.
pub const ID_FIELD: &str = "id";

static IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new("^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern is valid"));

/// Returns whether `name` is a bare identifier safe to use as a SQL
/// table or column name.
pub(crate) fn is_identifier(name: &str) -> bool {
    IDENTIFIER.is_match(name)
}

/// Configuration for opening a store.
///
/// The schema resource is resolved as
/// `<schema_dir>/<schema_name>.<schema_extension>`. `storage_path`
/// names the durable database file; `None` opens a transient in-memory
/// store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    pub schema_name: String,
    pub schema_extension: String,
    pub schema_dir: PathBuf,
    pub storage_path: Option<PathBuf>,
}

impl StoreConfig {
    /// Creates a config for an in-memory store; chain
    /// [`with_storage_path`](Self::with_storage_path) for durable data.
    pub fn new(
        schema_name: impl Into<String>,
        schema_extension: impl Into<String>,
        schema_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            schema_name: schema_name.into(),
            schema_extension: schema_extension.into(),
            schema_dir: schema_dir.into(),
            storage_path: None,
        }
    }

    pub fn with_storage_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.storage_path = Some(path.into());
        self
    }

    /// Full path of the schema resource this config points at.
    pub fn schema_resource_path(&self) -> PathBuf {
        self.schema_dir
            .join(format!("{}.{}", self.schema_name, self.schema_extension))
    }
}

/// One entity declaration: a name and its text field list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityDef {
    pub name: String,
    pub fields: Vec<String>,
}

impl EntityDef {
    /// Whether `field` is declared on this entity (excluding `id`).
    pub fn declares(&self, field: &str) -> bool {
        self.fields.iter().any(|f| f == field)
    }

    /// Whether `field` can appear in a predicate or sort for this
    /// entity: declared fields plus the implicit `id`.
    pub fn has_field(&self, field: &str) -> bool {
        field == ID_FIELD || self.declares(field)
    }
}

/// Parsed schema resource: the set of entities the store manages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    pub entities: Vec<EntityDef>,
}

impl Schema {
    /// Parses and validates a schema from its JSON text.
    pub fn from_json_str(text: &str) -> Result<Self, SchemaError> {
        let schema: Schema = serde_json::from_str(text)?;
        schema.validate()?;
        Ok(schema)
    }

    /// Looks up an entity declaration by name.
    pub fn entity(&self, name: &str) -> Option<&EntityDef> {
        self.entities.iter().find(|entity| entity.name == name)
    }

    pub(crate) fn validate(&self) -> Result<(), SchemaError> {
        let mut seen_entities = BTreeSet::new();
        for entity in &self.entities {
            if !is_identifier(&entity.name) {
                return Err(SchemaError::InvalidEntityName(entity.name.clone()));
            }
            if !seen_entities.insert(entity.name.as_str()) {
                return Err(SchemaError::DuplicateEntity(entity.name.clone()));
            }

            let mut seen_fields = BTreeSet::new();
            for field in &entity.fields {
                if field == ID_FIELD {
                    return Err(SchemaError::ReservedField {
                        entity: entity.name.clone(),
                    });
                }
                if !is_identifier(field) {
                    return Err(SchemaError::InvalidFieldName {
                        entity: entity.name.clone(),
                        field: field.clone(),
                    });
                }
                if !seen_fields.insert(field.as_str()) {
                    return Err(SchemaError::DuplicateField {
                        entity: entity.name.clone(),
                        field: field.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Validation and parse errors for schema resources.
#[derive(Debug)]
pub enum SchemaError {
    Parse(serde_json::Error),
    InvalidEntityName(String),
    DuplicateEntity(String),
    InvalidFieldName { entity: String, field: String },
    DuplicateField { entity: String, field: String },
    ReservedField { entity: String },
}

impl Display for SchemaError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse(err) => write!(f, "schema is not valid JSON: {err}"),
            Self::InvalidEntityName(name) => {
                write!(f, "entity name `{name}` is not a valid identifier")
            }
            Self::DuplicateEntity(name) => write!(f, "entity `{name}` is declared twice"),
            Self::InvalidFieldName { entity, field } => {
                write!(f, "field `{field}` on `{entity}` is not a valid identifier")
            }
            Self::DuplicateField { entity, field } => {
                write!(f, "field `{field}` on `{entity}` is declared twice")
            }
            Self::ReservedField { entity } => {
                write!(f, "entity `{entity}` declares the reserved field `id`")
            }
        }
    }
}

impl Error for SchemaError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Parse(err) => Some(err),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for SchemaError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value)
    }
}
