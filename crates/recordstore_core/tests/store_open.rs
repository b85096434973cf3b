use recordstore_core::{
    FetchSpec, FieldFilter, RecordAccess, Schema, SchemaError, StoreConfig, StoreContext,
    StoreInitError,
};
use std::path::Path;

const PERSON_SCHEMA: &str =
    r#"{"entities":[{"name":"Person","fields":["name","city","age"]}]}"#;

fn write_schema(dir: &Path, name: &str, text: &str) {
    std::fs::write(dir.join(format!("{name}.momd")), text).unwrap();
}

fn config(dir: &Path, name: &str) -> StoreConfig {
    StoreConfig::new(name, "momd", dir)
}

#[test]
fn open_in_memory_creates_entity_tables() {
    let schema = Schema::from_json_str(PERSON_SCHEMA).unwrap();
    let context = StoreContext::open_in_memory(schema).unwrap();

    let records = context.fetch(&FetchSpec::new("Person")).unwrap();
    assert!(records.is_empty());
}

#[test]
fn file_backed_store_is_durable_across_opens() {
    let dir = tempfile::tempdir().unwrap();
    write_schema(dir.path(), "AppModel", PERSON_SCHEMA);
    let config = config(dir.path(), "AppModel")
        .with_storage_path(dir.path().join("AppModel.sqlite3"));

    let access = RecordAccess::open(&config).unwrap();
    let mut person = access.add("Person").unwrap();
    person.set_field("name", "Ada");
    access.update(&person).unwrap();
    access.save().unwrap();
    access.close();

    let reopened = RecordAccess::open(&config).unwrap();
    let records = reopened
        .get_all("Person", &FieldFilter::new(), 0, "id")
        .unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id(), person.id());
    assert_eq!(records[0].field("name"), Some("Ada"));
}

#[test]
fn missing_schema_resource_fails_open() {
    let dir = tempfile::tempdir().unwrap();
    let err = StoreContext::open(&config(dir.path(), "Nowhere")).unwrap_err();
    assert!(matches!(err, StoreInitError::SchemaMissing(path)
        if path.ends_with("Nowhere.momd")));
}

#[test]
fn unparsable_schema_resource_fails_open() {
    let dir = tempfile::tempdir().unwrap();
    write_schema(dir.path(), "Broken", "{ not json");
    let err = StoreContext::open(&config(dir.path(), "Broken")).unwrap_err();
    assert!(matches!(
        err,
        StoreInitError::Schema(SchemaError::Parse(_))
    ));
}

#[test]
fn invalid_schema_content_fails_open() {
    let dir = tempfile::tempdir().unwrap();
    write_schema(
        dir.path(),
        "BadNames",
        r#"{"entities":[{"name":"Drop Table","fields":[]}]}"#,
    );
    let err = StoreContext::open(&config(dir.path(), "BadNames")).unwrap_err();
    assert!(matches!(
        err,
        StoreInitError::Schema(SchemaError::InvalidEntityName(_))
    ));
}

#[test]
fn absent_storage_path_means_transient_stores() {
    let dir = tempfile::tempdir().unwrap();
    write_schema(dir.path(), "AppModel", PERSON_SCHEMA);
    let config = config(dir.path(), "AppModel");

    let first = RecordAccess::open(&config).unwrap();
    first.add("Person").unwrap();
    first.save().unwrap();

    let second = RecordAccess::open(&config).unwrap();
    let records = second
        .get_all("Person", &FieldFilter::new(), 0, "id")
        .unwrap();
    assert!(records.is_empty());
}
