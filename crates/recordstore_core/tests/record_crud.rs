use recordstore_core::{
    DeleteError, FetchError, FieldFilter, InvalidRecordError, RecordAccess, SaveError, Schema,
};

const PERSON_SCHEMA: &str =
    r#"{"entities":[{"name":"Person","fields":["name","city","age"]},{"name":"Pet","fields":["name"]}]}"#;

fn open_access() -> RecordAccess {
    let schema = Schema::from_json_str(PERSON_SCHEMA).unwrap();
    RecordAccess::open_in_memory(schema).unwrap()
}

fn all(access: &RecordAccess, entity: &str) -> Vec<recordstore_core::Record> {
    access
        .get_all(entity, &FieldFilter::new(), 0, "id")
        .unwrap()
}

#[test]
fn add_is_visible_before_save() {
    let access = open_access();
    let person = access.add("Person").unwrap();

    let records = all(&access, "Person");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id(), person.id());
}

#[test]
fn add_with_no_fields_saves_and_fetches() {
    let access = open_access();
    access.add("Person").unwrap();
    access.save().unwrap();

    assert_eq!(all(&access, "Person").len(), 1);
    let missing = access.get_one("Person", "name", "Alice").unwrap();
    assert!(missing.is_none());
}

#[test]
fn update_amends_a_pending_insert() {
    let access = open_access();
    let mut person = access.add("Person").unwrap();
    person.set_field("name", "Ada");
    access.update(&person).unwrap();
    access.save().unwrap();

    let loaded = access.get_one("Person", "name", "Ada").unwrap().unwrap();
    assert_eq!(loaded.id(), person.id());
    assert_eq!(loaded.field("city"), None);
}

#[test]
fn update_on_a_durable_record_is_read_your_writes() {
    let access = open_access();
    let mut person = access.add("Person").unwrap();
    person.set_field("city", "Rome");
    access.update(&person).unwrap();
    access.save().unwrap();

    person.set_field("city", "Paris");
    access.update(&person).unwrap();

    // visible before commit
    let pending = access.get_one("Person", "city", "Paris").unwrap().unwrap();
    assert_eq!(pending.id(), person.id());
    assert!(access.get_one("Person", "city", "Rome").unwrap().is_none());

    access.save().unwrap();
    let durable = access.get_one("Person", "city", "Paris").unwrap().unwrap();
    assert_eq!(durable.field("city"), Some("Paris"));
}

#[test]
fn clearing_a_field_persists_as_null() {
    let access = open_access();
    let mut person = access.add("Person").unwrap();
    person.set_field("name", "Ada");
    access.update(&person).unwrap();
    access.save().unwrap();

    person.clear_field("name");
    access.update(&person).unwrap();
    access.save().unwrap();

    let records = all(&access, "Person");
    assert_eq!(records[0].field("name"), None);
}

#[test]
fn delete_one_drops_a_pending_insert() {
    let access = open_access();
    let person = access.add("Person").unwrap();
    access.delete_one(&person).unwrap();

    assert!(all(&access, "Person").is_empty());
    access.save().unwrap();
    assert!(all(&access, "Person").is_empty());
}

#[test]
fn delete_one_on_a_durable_record_waits_for_save() {
    let access = open_access();
    let person = access.add("Person").unwrap();
    access.save().unwrap();

    access.delete_one(&person).unwrap();
    assert!(all(&access, "Person").is_empty());
    assert!(access.has_pending_changes());

    access.save().unwrap();
    assert!(all(&access, "Person").is_empty());

    // repeating after commit reports the record as gone
    let err = access.delete_one(&person).unwrap_err();
    assert!(matches!(err, InvalidRecordError::NotInStore(id) if id == person.id()));
}

#[test]
fn delete_one_rejects_records_from_another_store() {
    let access = open_access();
    let foreign = open_access().add("Person").unwrap();

    let err = access.delete_one(&foreign).unwrap_err();
    assert!(matches!(err, InvalidRecordError::NotInStore(id) if id == foreign.id()));
}

#[test]
fn unknown_entities_and_fields_are_caller_errors() {
    let access = open_access();
    let err = access.add("Ghost").unwrap_err();
    assert!(matches!(err, InvalidRecordError::UnknownEntity(entity) if entity == "Ghost"));

    let mut pet = access.add("Pet").unwrap();
    pet.set_field("wingspan", "3m");
    let err = access.update(&pet).unwrap_err();
    assert!(matches!(
        err,
        InvalidRecordError::UnknownField { entity, field }
            if entity == "Pet" && field == "wingspan"
    ));
}

#[test]
fn operations_after_close_report_the_closed_context() {
    let access = open_access();
    let person = access.add("Person").unwrap();
    access.close();

    assert!(matches!(
        access.add("Person").unwrap_err(),
        InvalidRecordError::ContextClosed
    ));
    assert!(matches!(
        access.update(&person).unwrap_err(),
        InvalidRecordError::ContextClosed
    ));
    assert!(matches!(
        access
            .get_all("Person", &FieldFilter::new(), 0, "id")
            .unwrap_err(),
        FetchError::ContextClosed
    ));
    assert!(matches!(
        access.delete_all("Person").unwrap_err(),
        DeleteError::ContextClosed
    ));
    assert!(matches!(access.save().unwrap_err(), SaveError::ContextClosed));
    // pending state was discarded with the session
    assert!(!access.has_pending_changes());
}
