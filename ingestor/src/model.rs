use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// One element of the source's item list, exactly as received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawItem(pub Value);

impl RawItem {
    /// Looks up a key, treating explicit JSON `null` the same as a missing key.
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.0.get(key).filter(|v| !v.is_null())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogRecord {
    pub product_id: Option<i64>,
    pub title: Option<String>,
    pub category: Option<String>,
    pub price: Option<f64>,
}

impl CatalogRecord {
    /// Column order shared by the snapshot header and the destination table.
    pub const FIELDS: [&'static str; 4] = ["product_id", "title", "category", "price"];

    #[cfg(test)]
    pub fn new(product_id: i64, title: &str, category: &str, price: f64) -> Self {
        Self {
            product_id: Some(product_id),
            title: Some(title.to_string()),
            category: Some(category.to_string()),
            price: Some(price),
        }
    }

    /// Number of fields that came through as null.
    pub fn gaps(&self) -> usize {
        [
            self.product_id.is_none(),
            self.title.is_none(),
            self.category.is_none(),
            self.price.is_none(),
        ]
        .into_iter()
        .filter(|missing| *missing)
        .count()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordFailure {
    pub product_id: Option<i64>,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoadReport {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: Vec<RecordFailure>,
}

impl LoadReport {
    /// True when nothing was handed to the loader.
    pub fn is_empty(&self) -> bool {
        self.attempted == 0
    }

    pub fn failed_ids(&self) -> Vec<Option<i64>> {
        self.failed.iter().map(|f| f.product_id).collect()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub extracted: usize,
    pub report: LoadReport,
}
