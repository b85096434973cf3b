//! CLI smoke entry point.
//!
//! # Responsibility
//! - Exercise the public facade end to end against an in-memory store.
//! - Keep output deterministic for quick local sanity checks.

use recordstore_core::{FieldFilter, RecordAccess, Schema};
use std::error::Error;

const DEMO_SCHEMA: &str =
    r#"{"entities":[{"name":"Person","fields":["name","city","age"]}]}"#;

fn main() {
    println!("recordstore_core version={}", recordstore_core::core_version());
    match smoke() {
        Ok(count) => println!("smoke ok, records={count}"),
        Err(err) => {
            eprintln!("smoke failed: {err}");
            std::process::exit(1);
        }
    }
}

fn smoke() -> Result<usize, Box<dyn Error>> {
    let schema = Schema::from_json_str(DEMO_SCHEMA)?;
    let access = RecordAccess::open_in_memory(schema)?;

    let mut person = access.add("Person")?;
    person.set_field("name", "Ada");
    person.set_field("city", "London");
    access.update(&person)?;
    access.save()?;

    let people = access.get_all("Person", &FieldFilter::new(), 0, "name")?;
    access.close();
    Ok(people.len())
}
