//! Resolver behavior over on-disk flavor documents.

use std::fs;
use std::path::Path;

use bcfg_model::{FieldRecord, FlavorFieldSet};
use bcfg_resolve::{FlavorResolver, ResolveError};

const DEMO_URL: &str = "https://a.example.com";
const PROD_URL: &str = "https://b.example.com";

fn write_app_document(dir: &Path) {
    let mut set = FlavorFieldSet::default();
    set.variants.insert(
        "demo".to_string(),
        vec![
            FieldRecord::string("SERVER_URL", DEMO_URL),
            FieldRecord::string("GREETING", "hi"),
        ],
    );
    set.variants.insert(
        "prod".to_string(),
        vec![
            FieldRecord::string("SERVER_URL", PROD_URL),
            FieldRecord::string("GREETING", "hello"),
        ],
    );
    fs::write(
        dir.join("app.json"),
        serde_json::to_vec_pretty(&set).unwrap(),
    )
    .unwrap();
}

#[test]
fn resolves_to_selected_flavor() {
    let dir = tempfile::tempdir().unwrap();
    write_app_document(dir.path());
    let resolver = FlavorResolver::new(dir.path());

    // Default flavor is the first variant in document order.
    assert_eq!(resolver.current_flavor("app").as_deref(), Some("demo"));
    assert_eq!(resolver.resolve("app", DEMO_URL), DEMO_URL);

    resolver.set_flavor("app", "prod").unwrap();
    assert_eq!(resolver.resolve("app", DEMO_URL), PROD_URL);
    assert_eq!(resolver.current_flavor("app").as_deref(), Some("prod"));

    // The compiled build may have inlined any variant's value; the field is
    // recovered from whichever variant declared it.
    assert_eq!(resolver.resolve("app", PROD_URL), PROD_URL);
    resolver.set_flavor("app", "demo").unwrap();
    assert_eq!(resolver.resolve("app", PROD_URL), DEMO_URL);
}

#[test]
fn unknown_values_resolve_to_themselves() {
    let dir = tempfile::tempdir().unwrap();
    write_app_document(dir.path());
    let resolver = FlavorResolver::new(dir.path());

    assert_eq!(resolver.resolve("app", "not declared"), "not declared");
    // Missing document: every value is its own resolution.
    assert_eq!(resolver.resolve("lib", DEMO_URL), DEMO_URL);
    assert_eq!(resolver.current_flavor("lib"), None);
}

#[test]
fn flavor_selection_is_validated() {
    let dir = tempfile::tempdir().unwrap();
    write_app_document(dir.path());
    let resolver = FlavorResolver::new(dir.path());

    assert_eq!(
        resolver.set_flavor("app", "staging"),
        Err(ResolveError::UnknownFlavor {
            unit: "app".to_string(),
            flavor: "staging".to_string(),
        })
    );
    assert_eq!(
        resolver.set_flavor("lib", "demo"),
        Err(ResolveError::UnknownUnit("lib".to_string()))
    );
}

#[test]
fn enumerates_flavors_and_fields() {
    let dir = tempfile::tempdir().unwrap();
    write_app_document(dir.path());
    let resolver = FlavorResolver::new(dir.path());

    assert_eq!(resolver.flavors("app"), ["demo", "prod"]);
    assert!(resolver.flavors("lib").is_empty());

    let fields = resolver.fields("app");
    assert_eq!(fields.len(), 2);
    assert_eq!(fields[0].name, "SERVER_URL");
    assert_eq!(fields[0].value, DEMO_URL);

    resolver.set_flavor("app", "prod").unwrap();
    assert_eq!(resolver.fields("app")[0].value, PROD_URL);
}

#[test]
fn unreadable_document_degrades_to_identity() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("app.json"), b"{ not json").unwrap();
    let resolver = FlavorResolver::new(dir.path());
    assert_eq!(resolver.resolve("app", DEMO_URL), DEMO_URL);
    assert!(resolver.flavors("app").is_empty());
}
