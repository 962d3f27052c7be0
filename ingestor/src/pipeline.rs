use crate::ingest::CatalogSource;
use crate::loader::Loader;
use crate::model::{CatalogRecord, LoadReport, RawItem, RunSummary};
use crate::normalize::normalize;
use crate::poller::Poller;
use crate::snapshot::{read_snapshot, write_snapshot};
use crate::store::CatalogStore;
use chrono::Utc;
use ingestor_core::{Config, Error, Result};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, info_span, instrument, Instrument};
use uuid::Uuid;

/// The four stages, each taking the previous stage's output.
pub struct Pipeline {
    store: Arc<dyn CatalogStore>,
    poller: Poller,
    loader: Loader,
    config: Config,
}

impl Pipeline {
    pub fn new(
        source: Arc<dyn CatalogSource>,
        store: Arc<dyn CatalogStore>,
        config: Config,
    ) -> Self {
        let poller = Poller::new(
            source,
            config.source.items_path_segments(),
            config.poll.policy(),
        );
        let loader = Loader::new(Arc::clone(&store));

        Self {
            store,
            poller,
            loader,
            config,
        }
    }

    #[instrument(skip(self))]
    pub async fn initialize_schema(&self) -> Result<()> {
        self.store.ensure_schema().await
    }

    pub async fn poll_and_extract(&self) -> Result<Vec<RawItem>> {
        self.poller.poll().await
    }

    /// Returns `None` when there was nothing to normalize; downstream treats that as a stop.
    #[instrument(skip(self, items), fields(items = items.len()))]
    pub async fn normalize_and_snapshot(
        &self,
        items: Vec<RawItem>,
    ) -> Result<Option<Vec<CatalogRecord>>> {
        if items.is_empty() {
            info!("No data received from source");
            return Ok(None);
        }

        let records = normalize(items);
        let path = self.config.snapshot.path.clone();
        let records = tokio::task::spawn_blocking(move || {
            write_snapshot(&path, &records)?;
            Ok::<_, Error>(records)
        })
        .await
        .map_err(|e| Error::Internal(format!("snapshot writer task failed: {}", e)))??;
        Ok(Some(records))
    }

    pub async fn load(&self, records: Option<Vec<CatalogRecord>>) -> Result<LoadReport> {
        self.loader.load(records.as_deref().unwrap_or_default()).await
    }

    /// Loads a snapshot written by an earlier run.
    pub async fn replay(&self, snapshot: &Path) -> Result<LoadReport> {
        let path = snapshot.to_path_buf();
        let records = tokio::task::spawn_blocking(move || read_snapshot(&path))
            .await
            .map_err(|e| Error::Internal(format!("snapshot reader task failed: {}", e)))??;
        info!(path = %snapshot.display(), records = records.len(), "Replaying snapshot");
        self.loader.load(&records).await
    }

    /// Poll and snapshot without touching the destination.
    pub async fn extract(&self) -> Result<Option<Vec<CatalogRecord>>> {
        let items = self.poll_and_extract().await?;
        self.normalize_and_snapshot(items).await
    }

    pub async fn run(&self) -> Result<RunSummary> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();

        async {
            info!("Starting catalog ingestion run");

            self.initialize_schema().await?;
            let items = self.poll_and_extract().await?;
            let extracted = items.len();
            let records = self.normalize_and_snapshot(items).await?;
            let report = self.load(records).await?;

            let summary = RunSummary {
                run_id,
                started_at,
                finished_at: Utc::now(),
                extracted,
                report,
            };

            info!(
                extracted = summary.extracted,
                attempted = summary.report.attempted,
                succeeded = summary.report.succeeded,
                failed = summary.report.failed.len(),
                duration_ms = (summary.finished_at - summary.started_at).num_milliseconds(),
                "Run completed"
            );
            Ok::<_, Error>(summary)
        }
        .instrument(info_span!("run", %run_id))
        .await
    }
}
