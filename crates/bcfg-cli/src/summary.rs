use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL_CONDENSED;
use comfy_table::{Attribute, Cell, CellAlignment, ContentArrangement, Table};

use crate::types::{ApplyResult, TargetSummary};

pub fn print_summary(result: &ApplyResult) {
    println!("Flavor documents: {}", result.docs_dir.display());
    for path in &result.documents {
        println!("- {}", path.display());
    }

    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Target"),
        header_cell("Kind"),
        header_cell("Modules"),
        header_cell("Rewritten"),
        header_cell("Call sites"),
        header_cell("Status"),
    ]);
    apply_table_style(&mut table);
    align_column(&mut table, 2, CellAlignment::Right);
    align_column(&mut table, 3, CellAlignment::Right);
    align_column(&mut table, 4, CellAlignment::Right);

    let mut total_modules = 0usize;
    let mut total_rewritten = 0usize;
    let mut total_call_sites = 0usize;
    for target in &result.targets {
        total_modules += target.modules;
        total_rewritten += target.rewritten;
        total_call_sites += target.call_sites;
        table.add_row(vec![
            Cell::new(&target.name),
            Cell::new(target.kind.label()),
            Cell::new(target.modules),
            Cell::new(target.rewritten),
            Cell::new(target.call_sites),
            status_cell(target),
        ]);
    }
    table.add_row(vec![
        Cell::new("TOTAL")
            .fg(comfy_table::Color::Cyan)
            .add_attribute(Attribute::Bold),
        dim_cell("-"),
        Cell::new(total_modules).add_attribute(Attribute::Bold),
        Cell::new(total_rewritten).add_attribute(Attribute::Bold),
        Cell::new(total_call_sites).add_attribute(Attribute::Bold),
        dim_cell("-"),
    ]);
    println!("{table}");

    if !result.errors.is_empty() {
        eprintln!("Module failures:");
        for error in &result.errors {
            eprintln!("- {error}");
        }
    }
}

pub fn apply_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_width(120);
}

fn status_cell(target: &TargetSummary) -> Cell {
    match &target.error {
        None => Cell::new("ok")
            .fg(comfy_table::Color::Green)
            .add_attribute(Attribute::Bold),
        Some(error) => Cell::new(format!("failed: {error}"))
            .fg(comfy_table::Color::Red)
            .add_attribute(Attribute::Bold),
    }
}

fn align_column(table: &mut Table, index: usize, alignment: CellAlignment) {
    if let Some(column) = table.column_mut(index) {
        column.set_cell_alignment(alignment);
    }
}

fn header_cell(label: &str) -> Cell {
    Cell::new(label)
        .fg(comfy_table::Color::Cyan)
        .add_attribute(Attribute::Bold)
}

fn dim_cell<T: ToString>(value: T) -> Cell {
    Cell::new(value).fg(comfy_table::Color::DarkGrey)
}
