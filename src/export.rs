use crate::checkpoint::load_json_list;
use crate::error::Result;
use crate::models::MergedRecord;
use rust_xlsxwriter::{Format, Workbook};
use serde_json::Value;
use std::collections::BTreeSet;
use std::path::Path;

/// Priority columns first, then every other key seen in `records`, sorted.
pub fn column_order<'r>(
    records: impl IntoIterator<Item = &'r MergedRecord>,
    priority: &[String],
) -> Vec<String> {
    let rest: BTreeSet<&String> = records
        .into_iter()
        .flat_map(|record| record.0.keys())
        .filter(|key| !priority.contains(key))
        .collect();
    priority
        .iter()
        .cloned()
        .chain(rest.into_iter().cloned())
        .collect()
}

/// `published_by` becomes `Published By`.
pub fn header_label(column: &str) -> String {
    let mut label = String::with_capacity(column.len());
    let mut word_start = true;
    for c in column.replace('_', " ").chars() {
        if word_start {
            label.extend(c.to_uppercase());
        } else {
            label.extend(c.to_lowercase());
        }
        word_start = !c.is_alphabetic();
    }
    label
}

/// Text written to a cell; lists are joined with commas.
pub fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(cell_text)
            .collect::<Vec<_>>()
            .join(", "),
        other => other.to_string(),
    }
}

/// Writes one sheet with a header row and one row per record. Bare marker
/// records are left out. Returns the number of rows written.
pub fn export_records(records: &[MergedRecord], priority: &[String], output: &Path) -> Result<usize> {
    let rows: Vec<&MergedRecord> = records.iter().filter(|r| r.len() > 1).collect();
    let columns = column_order(rows.iter().copied(), priority);

    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let mut workbook = Workbook::new();
    let header_format = Format::new().set_bold();
    let worksheet = workbook.add_worksheet();
    for (col, column) in columns.iter().enumerate() {
        worksheet.write_string_with_format(0, col as u16, header_label(column), &header_format)?;
    }
    for (row, record) in rows.iter().enumerate() {
        for (col, column) in columns.iter().enumerate() {
            if let Some(value) = record.0.get(column) {
                worksheet.write_string(row as u32 + 1, col as u16, cell_text(value))?;
            }
        }
    }
    worksheet.set_freeze_panes(1, 0)?;
    workbook.save(output)?;

    tracing::info!("Exported {} rows to {}", rows.len(), output.display());
    Ok(rows.len())
}

/// Exports a data checkpoint file as a spreadsheet.
pub fn export_file(input: &Path, output: &Path, priority: &[String]) -> Result<usize> {
    let records: Vec<MergedRecord> = load_json_list(input)?;
    export_records(&records, priority, output)
}
