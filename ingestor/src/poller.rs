use crate::ingest::CatalogSource;
use crate::model::RawItem;
use ingestor_core::{poll_until, Deadline, Error, PollOutcome, PollPolicy, Result};
use metrics::{counter, histogram};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, instrument};

/// Polls the catalog endpoint until it answers with a readable item list.
pub struct Poller {
    source: Arc<dyn CatalogSource>,
    items_path: Vec<String>,
    policy: PollPolicy,
}

impl Poller {
    pub fn new(source: Arc<dyn CatalogSource>, items_path: Vec<String>, policy: PollPolicy) -> Self {
        Self {
            source,
            items_path,
            policy,
        }
    }

    /// Returns the items of the first 200 response, or [`Error::PollTimeout`]
    /// if none arrives within the policy's timeout.
    #[instrument(skip(self), fields(source = self.source.source_id()))]
    pub async fn poll(&self) -> Result<Vec<RawItem>> {
        match poll_until(self.policy, || self.attempt(), "poll_catalog").await {
            Deadline::Ready {
                value,
                attempts,
                elapsed,
            } => {
                info!(
                    items = value.len(),
                    attempts,
                    elapsed_ms = elapsed.as_millis(),
                    "Found {} catalog items",
                    value.len()
                );
                Ok(value)
            }
            Deadline::TimedOut {
                attempts,
                elapsed,
                last_failure,
            } => Err(Error::PollTimeout {
                attempts,
                elapsed_ms: elapsed.as_millis(),
                last_failure,
            }),
        }
    }

    /// One request/response cycle. Keeps no state between calls.
    pub async fn attempt(&self) -> PollOutcome<Vec<RawItem>> {
        let start = Instant::now();
        let result = self.source.fetch().await;
        histogram!("ingestor_fetch_duration_ms").record(start.elapsed().as_millis() as f64);

        let outcome = match result {
            Ok(response) if response.status == 200 => {
                let body = response.body.unwrap_or(Value::Null);
                match extract_items(&body, &self.items_path) {
                    Ok(items) => PollOutcome::Ready(items),
                    Err(details) => PollOutcome::Failed(format!("HTTP 200: {details}")),
                }
            }
            Ok(response) => PollOutcome::NotReady(format!("HTTP {}", response.status)),
            Err(e) => PollOutcome::Failed(e.to_string()),
        };

        let label = match &outcome {
            PollOutcome::Ready(_) => "ready",
            PollOutcome::NotReady(_) => "not_ready",
            PollOutcome::Failed(_) => "failed",
        };
        counter!("ingestor_poll_attempts", "outcome" => label).increment(1);

        outcome
    }
}

/// Walks `path` through nested objects and returns the list found there.
///
/// A missing key anywhere along the path (or a null leaf) means the source
/// has no items, which is a valid empty result. A non-object on the way or
/// a leaf that is not an array is a malformed body.
pub fn extract_items(body: &Value, path: &[String]) -> std::result::Result<Vec<RawItem>, String> {
    let mut current = body;
    for (depth, key) in path.iter().enumerate() {
        let Value::Object(map) = current else {
            return Err(format!(
                "expected an object at '{}', found {}",
                path[..depth].join("."),
                kind(current)
            ));
        };
        match map.get(key) {
            Some(next) => current = next,
            None => return Ok(Vec::new()),
        }
    }

    match current {
        Value::Array(items) => Ok(items.iter().cloned().map(RawItem).collect()),
        Value::Null => Ok(Vec::new()),
        other => Err(format!(
            "expected an array at '{}', found {}",
            path.join("."),
            kind(other)
        )),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
