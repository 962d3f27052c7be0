//! CSV snapshot of normalized records, written between transform and load.
//!
//! Nulls are written as `\N` (the PostgreSQL COPY convention) so that an
//! absent value and an empty string survive a write/read cycle distinctly.
//! Text starting with a backslash gets one extra leading backslash, so no
//! text value is ever written as the bare null marker.

use crate::model::CatalogRecord;
use ingestor_core::{Error, Result};
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::{info, instrument};

const NULL: &str = "\\N";

/// Writes `records` to `path`, replacing any previous snapshot.
///
/// The data goes to a temporary file next to `path` which is renamed over
/// it only after a successful flush, so readers never see a partial file.
#[instrument(skip(records), fields(records = records.len()))]
pub fn write_snapshot(path: &Path, records: &[CatalogRecord]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut file = NamedTempFile::new_in(dir)?;

    {
        let mut writer = csv::Writer::from_writer(file.as_file_mut());
        writer.write_record(CatalogRecord::FIELDS)?;
        for record in records {
            writer.write_record(to_row(record))?;
        }
        writer.flush()?;
    }
    file.as_file_mut().flush()?;
    file.as_file().sync_all()?;

    file.persist(path).map_err(|e| Error::Io(e.error))?;

    info!(path = %path.display(), "Copied {} records to snapshot", records.len());
    Ok(())
}

pub fn read_snapshot(path: &Path) -> Result<Vec<CatalogRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)?;

    let headers = reader.headers()?;
    if headers.iter().ne(CatalogRecord::FIELDS) {
        return Err(Error::Snapshot(format!(
            "{}: unexpected header '{}', expected '{}'",
            path.display(),
            headers.iter().collect::<Vec<_>>().join(","),
            CatalogRecord::FIELDS.join(",")
        )));
    }

    let mut records = Vec::new();
    for (index, row) in reader.records().enumerate() {
        let row = row?;
        // header is line 1
        let line = index + 2;
        records.push(from_row(&row).map_err(|details| {
            Error::Snapshot(format!("{} line {}: {}", path.display(), line, details))
        })?);
    }

    Ok(records)
}

fn to_row(record: &CatalogRecord) -> [String; 4] {
    [
        cell(record.product_id.map(|id| id.to_string())),
        cell(record.title.as_deref().map(escape)),
        cell(record.category.as_deref().map(escape)),
        cell(record.price.map(|p| p.to_string())),
    ]
}

fn cell(value: Option<String>) -> String {
    value.unwrap_or_else(|| NULL.to_string())
}

fn escape(text: &str) -> String {
    if text.starts_with('\\') {
        format!("\\{text}")
    } else {
        text.to_string()
    }
}

fn unescape(text: &str) -> String {
    text.strip_prefix('\\').unwrap_or(text).to_string()
}

fn from_row(row: &csv::StringRecord) -> std::result::Result<CatalogRecord, String> {
    if row.len() != CatalogRecord::FIELDS.len() {
        return Err(format!(
            "expected {} fields, found {}",
            CatalogRecord::FIELDS.len(),
            row.len()
        ));
    }

    let raw = |i: usize| match &row[i] {
        NULL => None,
        s => Some(s),
    };
    let text = |i: usize| raw(i).map(unescape);

    let product_id = raw(0)
        .map(|s| s.parse::<i64>().map_err(|e| format!("invalid product_id '{s}': {e}")))
        .transpose()?;
    let price = raw(3)
        .map(|s| s.parse::<f64>().map_err(|e| format!("invalid price '{s}': {e}")))
        .transpose()?;

    Ok(CatalogRecord {
        product_id,
        title: text(1),
        category: text(2),
        price,
    })
}
