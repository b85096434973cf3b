use recordstore_core::{FieldFilter, RecordAccess, SaveError, Schema, StoreConfig};
use std::path::Path;

const PERSON_SCHEMA: &str =
    r#"{"entities":[{"name":"Person","fields":["name","city","age"]}]}"#;

fn file_backed(dir: &Path) -> StoreConfig {
    std::fs::write(dir.join("AppModel.momd"), PERSON_SCHEMA).unwrap();
    StoreConfig::new("AppModel", "momd", dir)
        .with_storage_path(dir.join("AppModel.sqlite3"))
}

fn open_in_memory() -> RecordAccess {
    let schema = Schema::from_json_str(PERSON_SCHEMA).unwrap();
    RecordAccess::open_in_memory(schema).unwrap()
}

fn count(access: &RecordAccess) -> usize {
    access
        .get_all("Person", &FieldFilter::new(), 0, "id")
        .unwrap()
        .len()
}

#[test]
fn save_without_changes_is_a_no_op() {
    let access = open_in_memory();
    assert!(!access.has_pending_changes());
    access.save().unwrap();

    access.add("Person").unwrap();
    assert!(access.has_pending_changes());
    access.save().unwrap();
    assert!(!access.has_pending_changes());
}

#[test]
fn delete_all_reports_count_and_empties_the_store() {
    let access = open_in_memory();
    for _ in 0..3 {
        access.add("Person").unwrap();
    }
    access.save().unwrap();

    assert_eq!(access.delete_all("Person").unwrap(), 3);
    assert_eq!(count(&access), 0);
    assert_eq!(access.delete_all("Person").unwrap(), 0);
}

#[test]
fn bulk_delete_does_not_touch_pending_inserts() {
    let access = open_in_memory();
    access.add("Person").unwrap();
    access.save().unwrap();

    let mut pending = access.add("Person").unwrap();
    pending.set_field("name", "survivor");
    access.update(&pending).unwrap();

    assert_eq!(access.delete_all("Person").unwrap(), 1);
    assert_eq!(count(&access), 1);

    access.save().unwrap();
    let records = access
        .get_all("Person", &FieldFilter::new(), 0, "id")
        .unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].field("name"), Some("survivor"));
}

#[test]
fn failed_save_rolls_back_and_stays_retryable() {
    let dir = tempfile::tempdir().unwrap();
    let config = file_backed(dir.path());
    let access = RecordAccess::open(&config).unwrap();

    let mut victim = access.add("Person").unwrap();
    victim.set_field("name", "victim");
    access.update(&victim).unwrap();
    access.save().unwrap();

    // stage an update on the durable row plus a fresh insert
    victim.set_field("name", "renamed");
    access.update(&victim).unwrap();
    let mut survivor = access.add("Person").unwrap();
    survivor.set_field("name", "kept");
    access.update(&survivor).unwrap();

    // the bulk delete removes the durable row out from under the staged
    // update, so the next save cannot apply it
    assert_eq!(access.delete_all("Person").unwrap(), 1);
    let err = access.save().unwrap_err();
    assert!(matches!(err, SaveError::RecordVanished(id) if id == victim.id()));
    assert!(access.has_pending_changes());

    // nothing from the failed save became durable
    let verifier = RecordAccess::open(&config).unwrap();
    assert_eq!(count(&verifier), 0);
    verifier.close();

    // the pending insert is still buffered and visible
    let visible = access
        .get_all("Person", &FieldFilter::new(), 0, "id")
        .unwrap();
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].id(), survivor.id());

    // removing the vanished record fixes the cause; the retry commits
    access.delete_one(&victim).unwrap();
    access.save().unwrap();
    assert!(!access.has_pending_changes());

    let verifier = RecordAccess::open(&config).unwrap();
    let records = verifier
        .get_all("Person", &FieldFilter::new(), 0, "id")
        .unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].field("name"), Some("kept"));
    verifier.close();
    access.close();
}

#[test]
fn one_save_commits_inserts_updates_and_deletes_together() {
    let access = open_in_memory();
    let mut keep = access.add("Person").unwrap();
    keep.set_field("name", "keep");
    access.update(&keep).unwrap();
    let doomed = access.add("Person").unwrap();
    access.save().unwrap();

    keep.set_field("city", "NYC");
    access.update(&keep).unwrap();
    access.delete_one(&doomed).unwrap();
    access.add("Person").unwrap();
    access.save().unwrap();

    let records = access
        .get_all("Person", &FieldFilter::new(), 0, "id")
        .unwrap();
    assert_eq!(records.len(), 2);
    let kept = access.get_one("Person", "name", "keep").unwrap().unwrap();
    assert_eq!(kept.field("city"), Some("NYC"));
}
