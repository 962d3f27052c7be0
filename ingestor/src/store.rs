use crate::model::CatalogRecord;
use async_trait::async_trait;
use ingestor_core::{Error, Result};
use metrics::counter;
use sqlx::PgPool;
use tracing::{debug, info, instrument};

/// Destination for catalog records.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Create the destination table if it does not exist yet.
    async fn ensure_schema(&self) -> Result<()>;

    /// Insert or overwrite one record keyed by `product_id`, as a single statement.
    async fn upsert(&self, record: &CatalogRecord) -> Result<()>;

    async fn health_check(&self) -> Result<()>;
}

pub struct PgStore {
    pool: PgPool,
    create_sql: String,
    upsert_sql: String,
}

impl PgStore {
    /// `table` must already be validated as a plain identifier; it is spliced into the SQL.
    pub fn new(pool: PgPool, table: &str) -> Self {
        let create_sql = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {table} (
                product_id BIGINT PRIMARY KEY,
                title VARCHAR(255),
                category VARCHAR(255),
                price DOUBLE PRECISION
            )
            "#
        );

        let upsert_sql = format!(
            r#"
            INSERT INTO {table} (product_id, title, category, price)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (product_id) DO UPDATE SET
                title = EXCLUDED.title,
                category = EXCLUDED.category,
                price = EXCLUDED.price
            "#
        );

        Self {
            pool,
            create_sql,
            upsert_sql,
        }
    }
}

#[async_trait]
impl CatalogStore for PgStore {
    #[instrument(skip(self))]
    async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(&self.create_sql)
            .execute(&self.pool)
            .await
            .map_err(|e| Error::Schema {
                details: format!("failed to create destination table: {}", e),
                source: Some(e),
            })?;

        info!("Destination table ready");
        Ok(())
    }

    async fn upsert(&self, record: &CatalogRecord) -> Result<()> {
        sqlx::query(&self.upsert_sql)
            .bind(record.product_id)
            .bind(record.title.as_deref())
            .bind(record.category.as_deref())
            .bind(record.price)
            .execute(&self.pool)
            .await?;

        counter!("ingestor_records_upserted").increment(1);
        debug!(product_id = ?record.product_id, "Upserted record");
        Ok(())
    }

    async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
