use crate::ingest::HttpSource;
use crate::model::{LoadReport, RunSummary};
use crate::pipeline::Pipeline;
use crate::store::{CatalogStore, PgStore};
use ingestor_core::{Config, Result};
use sqlx::PgPool;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, instrument};

pub struct App {
    pipeline: Pipeline,
}

impl App {
    #[instrument(skip(config, pool))]
    pub async fn new(config: Config, pool: PgPool) -> Result<Self> {
        info!("Initializing application");

        let store = Arc::new(PgStore::new(pool, &config.database.table));
        let source = HttpSource::new(&config.source)?;

        let pipeline = Pipeline::new(
            Arc::new(source),
            store as Arc<dyn CatalogStore>,
            config,
        );

        Ok(Self { pipeline })
    }

    pub async fn init(&self) -> Result<()> {
        self.pipeline.initialize_schema().await
    }

    pub async fn run(&self) -> Result<RunSummary> {
        self.pipeline.run().await
    }

    pub async fn extract(&self) -> Result<usize> {
        let records = self.pipeline.extract().await?;
        Ok(records.map_or(0, |r| r.len()))
    }

    pub async fn replay(&self, snapshot: &Path) -> Result<LoadReport> {
        self.pipeline.initialize_schema().await?;
        self.pipeline.replay(snapshot).await
    }
}
