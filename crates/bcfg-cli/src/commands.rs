//! Subcommand entry points.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use comfy_table::Table;
use tracing::warn;

use bcfg_archive::{ArchiveScope, is_excluded_class, rewrite_archive, rewrite_class_file};
use bcfg_model::{ConstantTable, FieldType};

use crate::cli::{ApplyArgs, CollectArgs, FieldsArgs, RewriteArgs};
use crate::pipeline::{
    collect_documents, discover_archives, load_snapshot, rewrite_archives, rewrite_classes,
};
use crate::summary::apply_table_style;
use crate::types::{ApplyResult, TargetKind, TargetSummary};

pub fn run_apply(args: &ApplyArgs) -> Result<ApplyResult> {
    let build_dir = &args.build_dir;
    let table_path = args
        .table
        .clone()
        .unwrap_or_else(|| build_dir.join("build-config.json"));
    let docs_dir = args
        .docs_dir
        .clone()
        .unwrap_or_else(|| build_dir.join("flavor-docs"));
    let classes_dir = args
        .classes_dir
        .clone()
        .unwrap_or_else(|| build_dir.join("classes"));
    let libs_dir = args
        .libs_dir
        .clone()
        .unwrap_or_else(|| build_dir.join("libs"));

    let (table, tagged) = load_snapshot(&table_path)?;

    // Documents first: rewritten classes must never outrun the documents
    // their resolver calls will read.
    let documents = collect_documents(&docs_dir, &table)?;

    let mut targets = Vec::new();
    let mut errors = Vec::new();

    if classes_dir.is_dir() {
        let summary = rewrite_classes(&classes_dir, &tagged)?;
        for failure in &summary.failures {
            errors.push(format!("{}: {}", failure.path.display(), failure.error));
        }
        targets.push(TargetSummary {
            name: classes_dir.display().to_string(),
            kind: TargetKind::Classes,
            modules: summary.scanned,
            rewritten: summary.rewritten,
            call_sites: summary.call_sites,
            error: None,
        });
    } else {
        warn!(dir = %classes_dir.display(), "no class tree to rewrite");
    }

    if libs_dir.is_dir() {
        let scope = ArchiveScope::from_units(table.units.keys().cloned());
        let archives = discover_archives(&libs_dir, &scope)?;
        for (path, result) in rewrite_archives(&archives, &tagged) {
            let name = path.display().to_string();
            match result {
                Ok(summary) => targets.push(TargetSummary {
                    name,
                    kind: TargetKind::Archive,
                    modules: summary.entries,
                    rewritten: summary.rewritten,
                    call_sites: summary.call_sites,
                    error: None,
                }),
                Err(error) => {
                    let error = anyhow::Error::new(error);
                    targets.push(TargetSummary {
                        name,
                        kind: TargetKind::Archive,
                        modules: 0,
                        rewritten: 0,
                        call_sites: 0,
                        error: Some(format!("{error:#}")),
                    });
                }
            }
        }
    }

    let has_errors = !errors.is_empty() || targets.iter().any(|target| target.error.is_some());
    Ok(ApplyResult {
        docs_dir,
        documents,
        targets,
        errors,
        has_errors,
    })
}

pub fn run_collect(args: &CollectArgs) -> Result<Vec<PathBuf>> {
    let (table, _) = load_snapshot(&args.table)?;
    let documents = collect_documents(&args.out, &table)?;
    for path in &documents {
        println!("{}", path.display());
    }
    Ok(documents)
}

pub fn run_rewrite(args: &RewriteArgs) -> Result<()> {
    let (_, tagged) = load_snapshot(&args.table)?;
    let artifact = &args.artifact;
    match artifact.extension().and_then(|ext| ext.to_str()) {
        Some("class") => {
            let file_name = artifact
                .file_name()
                .and_then(|name| name.to_str())
                .unwrap_or_default();
            if is_excluded_class(file_name) {
                bail!(
                    "{} is excluded from rewriting (resolver, BuildConfig, and \
                     resource index classes are never touched)",
                    artifact.display()
                );
            }
            match rewrite_class_file(artifact, &tagged)
                .with_context(|| format!("rewrite {}", artifact.display()))?
            {
                Some(call_sites) => {
                    println!("{}: {call_sites} call site(s)", artifact.display());
                }
                None => println!("{}: unchanged", artifact.display()),
            }
        }
        Some("jar" | "zip") => {
            let summary = rewrite_archive(artifact, &tagged)
                .with_context(|| format!("repackage {}", artifact.display()))?;
            println!(
                "{}: {} of {} entries rewritten, {} call site(s)",
                artifact.display(),
                summary.rewritten,
                summary.entries,
                summary.call_sites
            );
        }
        _ => bail!("unsupported artifact type: {}", artifact.display()),
    }
    Ok(())
}

pub fn run_fields(args: &FieldsArgs) -> Result<()> {
    let table_path: &Path = &args.table;
    let table = ConstantTable::load(table_path)
        .with_context(|| format!("load constant table {}", table_path.display()))?;

    let mut out = Table::new();
    out.set_header(vec!["Unit", "Variant", "Field", "Type", "Value"]);
    apply_table_style(&mut out);
    for (unit, set) in &table.units {
        for variant in set.variant_names() {
            for field in set.fields(variant).unwrap_or_default() {
                out.add_row(vec![
                    unit.as_str(),
                    variant,
                    &field.name,
                    type_name(field.field_type),
                    &field.value,
                ]);
            }
        }
    }
    println!("{out}");
    Ok(())
}

fn type_name(field_type: FieldType) -> &'static str {
    match field_type {
        FieldType::String => "String",
        FieldType::Boolean => "boolean",
        FieldType::Int => "int",
        FieldType::Long => "long",
        FieldType::Float => "float",
        FieldType::Double => "double",
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn rewrite_refuses_excluded_classes() {
        let dir = tempfile::tempdir().unwrap();
        let table = dir.path().join("build-config.json");
        fs::write(&table, r#"{"units": {}}"#).unwrap();
        let artifact = dir.path().join("BuildConfigDelegate.class");
        fs::write(&artifact, b"not even a class file").unwrap();

        let error = run_rewrite(&RewriteArgs {
            artifact: artifact.clone(),
            table,
        })
        .expect_err("excluded class must be refused");
        assert!(error.to_string().contains("excluded"));
        // Refused before the file was ever opened.
        assert_eq!(fs::read(&artifact).unwrap(), b"not even a class file");
    }
}
