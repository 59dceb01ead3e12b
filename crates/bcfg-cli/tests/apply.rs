//! End-to-end pipeline: declare, tag, collect, rewrite, resolve.

use std::fs;
use std::io::Write;

use bcfg_archive::{rewrite_archive, rewrite_class_dir};
use bcfg_classfile::{ClassFile, ConstantPool, MemberInfo};
use bcfg_collect::{tag_table, write_field_documents};
use bcfg_model::{ConstantTable, FieldRecord, FlavorFieldSet, TaggedSet};
use bcfg_resolve::FlavorResolver;

const DEMO_URL: &str = "https://a.example.com";
const PROD_URL: &str = "https://b.example.com";

fn declared_table() -> ConstantTable {
    let mut set = FlavorFieldSet::default();
    set.variants.insert(
        "demo".to_string(),
        vec![FieldRecord::string("SERVER_URL", DEMO_URL)],
    );
    set.variants.insert(
        "prod".to_string(),
        vec![FieldRecord::string("SERVER_URL", PROD_URL)],
    );
    let mut table = ConstantTable::default();
    table.units.insert("app".to_string(), set);
    table
}

/// What the compiler would emit for `return SERVER_URL;` after the tagger
/// ran: the tagged literal, inlined.
fn compiled_class(literal: &str) -> Vec<u8> {
    let mut pool = ConstantPool::default();
    let this_class = pool.ensure_class("com/example/Main").unwrap();
    let super_class = pool.ensure_class("java/lang/Object").unwrap();
    let string_index = pool.ensure_string(literal).unwrap();
    let code_name = pool.ensure_utf8("Code").unwrap();
    let method_name = pool.ensure_utf8("serverUrl").unwrap();
    let descriptor = pool.ensure_utf8("()Ljava/lang/String;").unwrap();

    let code = [0x12, string_index as u8, 0xB0]; // ldc; areturn
    let mut data = Vec::new();
    data.extend_from_slice(&1u16.to_be_bytes());
    data.extend_from_slice(&1u16.to_be_bytes());
    data.extend_from_slice(&(code.len() as u32).to_be_bytes());
    data.extend_from_slice(&code);
    data.extend_from_slice(&0u16.to_be_bytes());
    data.extend_from_slice(&0u16.to_be_bytes());

    ClassFile {
        minor_version: 0,
        major_version: 49,
        pool,
        access_flags: 0x0021,
        this_class,
        super_class,
        interfaces: Vec::new(),
        fields: Vec::new(),
        methods: vec![MemberInfo {
            access_flags: 0x0001,
            name_index: method_name,
            descriptor_index: descriptor,
            attributes: vec![bcfg_classfile::AttributeInfo {
                name_index: code_name,
                data,
            }],
        }],
        attributes: Vec::new(),
    }
    .to_bytes()
}

#[test]
fn declared_constant_reaches_the_resolver() {
    let workspace = tempfile::tempdir().unwrap();
    let docs_dir = workspace.path().join("flavor-docs");
    let classes_dir = workspace.path().join("classes");
    fs::create_dir_all(&classes_dir).unwrap();

    // Tag: the declared value becomes a recognizable literal.
    let tagged_table = tag_table(&declared_table()).unwrap();
    let literal = &tagged_table.units["app"].fields("demo").unwrap()[0].value;
    assert_eq!(literal, "`BuildConfig#app#https://a.example.com`");

    // Collect: documents carry the original values, per variant.
    write_field_documents(&docs_dir, &tagged_table).unwrap();

    // Compile + rewrite: the inlined literal becomes a resolver call.
    let class_path = classes_dir.join("Main.class");
    fs::write(&class_path, compiled_class(literal)).unwrap();
    let snapshot = TaggedSet::from_table(&tagged_table);
    let summary = rewrite_class_dir(&classes_dir, &snapshot).unwrap();
    assert_eq!(summary.rewritten, 1);
    assert_eq!(summary.call_sites, 1);
    assert!(summary.failures.is_empty());

    let rewritten = ClassFile::parse(&fs::read(&class_path).unwrap()).unwrap();
    assert!((1..rewritten.pool.slot_count() as u16).any(|index| {
        rewritten
            .pool
            .utf8(index)
            .is_ok_and(|text| text == "com/android/BuildConfigDelegate")
    }));

    // Resolve: the call the rewritten code now makes.
    let resolver = FlavorResolver::new(&docs_dir);
    assert_eq!(resolver.resolve("app", DEMO_URL), DEMO_URL);
    resolver.set_flavor("app", "prod").unwrap();
    assert_eq!(resolver.resolve("app", DEMO_URL), PROD_URL);
}

#[test]
fn packaged_constant_reaches_the_resolver() {
    let workspace = tempfile::tempdir().unwrap();
    let docs_dir = workspace.path().join("flavor-docs");

    let tagged_table = tag_table(&declared_table()).unwrap();
    let documents = write_field_documents(&docs_dir, &tagged_table).unwrap();
    assert_eq!(documents, vec![docs_dir.join("app.json")]);
    let document: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&documents[0]).unwrap()).unwrap();
    assert_eq!(document["prod"][0]["value"], PROD_URL);

    // Pack the compiled class into a first-party jar.
    let literal = &tagged_table.units["app"].fields("demo").unwrap()[0].value;
    let jar_path = workspace.path().join("app.jar");
    let mut jar = zip::ZipWriter::new(fs::File::create(&jar_path).unwrap());
    jar.start_file("com/example/Main.class", zip::write::SimpleFileOptions::default())
        .unwrap();
    jar.write_all(&compiled_class(literal)).unwrap();
    jar.finish().unwrap();

    let snapshot = TaggedSet::from_table(&tagged_table);
    let summary = rewrite_archive(&jar_path, &snapshot).unwrap();
    assert_eq!(summary.entries, 1);
    assert_eq!(summary.rewritten, 1);
    assert_eq!(summary.call_sites, 1);

    let resolver = FlavorResolver::new(&docs_dir);
    resolver.set_flavor("app", "prod").unwrap();
    assert_eq!(resolver.resolve("app", DEMO_URL), PROD_URL);
}
