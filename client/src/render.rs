//! Table rendering for uniform records.
//!
//! Columns are ordered as: the preferred columns that are present, in the given order, then the
//! remaining columns alphabetically, with `error` always last.

use comfy_table::{
    presets,
    Attribute,
    Cell,
    CellAlignment,
    ColumnConstraint,
    ContentArrangement,
    Table,
    Width,
};
use serde_json::Value;
use std::collections::BTreeSet;

/// One table row, column name to value.
pub type Record = serde_json::Map<String, Value>;

pub const ERROR_COLUMN: &str = "error";

/// Free text columns that wrap instead of stretching the table.
const WRAPPED_COLUMNS: [&str; 2] = [ERROR_COLUMN, "response"];
const MAX_TEXT_WIDTH: u16 = 100;

pub fn column_order(records: &[Record], preferred: &[&str]) -> Vec<String> {
    let mut remaining: BTreeSet<&str> = records
        .iter()
        .flat_map(|record| record.keys().map(String::as_str))
        .collect();

    let mut columns: Vec<String> = preferred
        .iter()
        .filter(|column| remaining.remove(**column))
        .map(|column| column.to_string())
        .collect();

    let has_error = remaining.remove(ERROR_COLUMN);
    columns.extend(remaining.into_iter().map(str::to_string));
    if has_error {
        columns.push(ERROR_COLUMN.to_string());
    }
    columns
}

pub fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Renders `records` into a table. Cells missing from a record stay empty.
pub fn render_table(records: &[Record], preferred: &[&str], right_aligned: &[&str]) -> Table {
    let columns = column_order(records, preferred);

    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(
            columns
                .iter()
                .map(|column| Cell::new(column).add_attribute(Attribute::Bold))
                .collect::<Vec<_>>(),
        );

    for record in records {
        table.add_row(
            columns
                .iter()
                .map(|column| Cell::new(record.get(column).map(cell_text).unwrap_or_default()))
                .collect::<Vec<_>>(),
        );
    }

    for (index, column) in columns.iter().enumerate() {
        let Some(table_column) = table.column_mut(index) else {
            continue;
        };
        if WRAPPED_COLUMNS.contains(&column.as_str()) {
            table_column.set_constraint(ColumnConstraint::UpperBoundary(Width::Fixed(MAX_TEXT_WIDTH)));
        }
        let alignment = if right_aligned.contains(&column.as_str()) {
            CellAlignment::Right
        } else {
            CellAlignment::Left
        };
        table_column.set_cell_alignment(alignment);
    }

    table
}
