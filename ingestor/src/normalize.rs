use crate::model::{CatalogRecord, RawItem};
use metrics::counter;
use serde_json::Value;
use tracing::{debug, info};

/// Maps raw items to catalog records, one for one and in order.
///
/// Fields that are missing or cannot be read as the expected type become
/// `None`; a bad item never aborts the batch.
pub fn normalize(items: Vec<RawItem>) -> Vec<CatalogRecord> {
    let records: Vec<CatalogRecord> = items.iter().map(normalize_item).collect();

    let gaps: usize = records.iter().map(CatalogRecord::gaps).sum();
    counter!("ingestor_records_normalized").increment(records.len() as u64);
    counter!("ingestor_normalization_gaps").increment(gaps as u64);

    info!(records = records.len(), gaps, "Normalized catalog items");
    records
}

pub fn normalize_item(item: &RawItem) -> CatalogRecord {
    let record = CatalogRecord {
        product_id: item.field("id").and_then(as_id),
        title: item.field("title").and_then(as_text),
        category: item.field("category").and_then(as_text),
        price: item.field("price").and_then(as_price),
    };

    if record.gaps() > 0 {
        debug!(item = %item.0, ?record, "Catalog item has missing or unreadable fields");
    }
    record
}

fn as_id(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn as_price(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
