use crate::model::{CatalogRecord, LoadReport, RecordFailure};
use crate::store::CatalogStore;
use ingestor_core::{Error, Result};
use metrics::counter;
use std::sync::Arc;
use tracing::{info, instrument, warn};

pub struct Loader {
    store: Arc<dyn CatalogStore>,
}

impl Loader {
    pub fn new(store: Arc<dyn CatalogStore>) -> Self {
        Self { store }
    }

    /// Upserts every record independently and reports what happened.
    ///
    /// Rejected records are collected in the report. The call only fails if
    /// the datastore connection is gone and no further upsert can be tried.
    #[instrument(skip(self, records), fields(records = records.len()))]
    pub async fn load(&self, records: &[CatalogRecord]) -> Result<LoadReport> {
        if records.is_empty() {
            info!("Nothing to load");
            return Ok(LoadReport::default());
        }

        info!("Loading {} records into the destination table", records.len());

        let mut report = LoadReport::default();
        for (index, record) in records.iter().enumerate() {
            report.attempted += 1;

            let err = match self.store.upsert(record).await {
                Ok(()) => {
                    report.succeeded += 1;
                    continue;
                }
                Err(err) => err,
            };

            if err.is_connection_loss() && self.store.health_check().await.is_err() {
                return Err(Error::ConnectionLost {
                    succeeded: report.succeeded,
                    remaining: records.len() - index,
                    details: err.to_string(),
                });
            }

            warn!(
                product_id = ?record.product_id,
                error = %err,
                "Error inserting record into destination table"
            );
            counter!("ingestor_records_failed").increment(1);
            report.failed.push(RecordFailure {
                product_id: record.product_id,
                reason: err.to_string(),
            });
        }

        info!(
            attempted = report.attempted,
            succeeded = report.succeeded,
            failed = report.failed.len(),
            "Load finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::Ordering;

    fn loader(store: &Arc<MemoryStore>) -> Loader {
        Loader::new(Arc::clone(store) as Arc<dyn CatalogStore>)
    }

    #[tokio::test]
    async fn loads_a_single_record() {
        let store = Arc::new(MemoryStore::default());
        let records = vec![CatalogRecord::new(1, "A", "x", 9.99)];

        let report = loader(&store).load(&records).await.unwrap();

        assert_eq!(
            report,
            LoadReport {
                attempted: 1,
                succeeded: 1,
                failed: vec![],
            }
        );
        assert_eq!(store.row(1), Some(CatalogRecord::new(1, "A", "x", 9.99)));
    }

    #[tokio::test]
    async fn empty_batch_touches_nothing() {
        let store = Arc::new(MemoryStore::default());

        let report = loader(&store).load(&[]).await.unwrap();

        assert!(report.is_empty());
        assert_eq!(store.statements.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn second_load_overwrites_the_same_row() {
        let store = Arc::new(MemoryStore::default());
        let loader = loader(&store);

        loader.load(&[CatalogRecord::new(7, "Old", "x", 1.0)]).await.unwrap();
        loader.load(&[CatalogRecord::new(7, "New", "y", 2.0)]).await.unwrap();

        assert_eq!(store.row_count(), 1);
        assert_eq!(store.row(7), Some(CatalogRecord::new(7, "New", "y", 2.0)));
    }

    #[tokio::test]
    async fn duplicate_ids_in_one_batch_last_write_wins() {
        let store = Arc::new(MemoryStore::default());
        let records = vec![
            CatalogRecord::new(3, "first", "x", 1.0),
            CatalogRecord::new(3, "second", "x", 2.0),
        ];

        let report = loader(&store).load(&records).await.unwrap();

        assert_eq!(report.succeeded, 2);
        assert_eq!(store.row(3).unwrap().title.as_deref(), Some("second"));
    }

    #[tokio::test]
    async fn null_product_id_fails_alone() {
        let store = Arc::new(MemoryStore::default());
        let records = vec![
            CatalogRecord {
                product_id: None,
                ..CatalogRecord::new(0, "orphan", "x", 1.0)
            },
            CatalogRecord::new(2, "B", "y", 3.5),
        ];

        let report = loader(&store).load(&records).await.unwrap();

        assert_eq!(report.attempted, 2);
        assert_eq!(report.succeeded, 1);
        assert_eq!(report.failed_ids(), vec![None]);
        assert!(report.failed[0].reason.contains("not-null"));
        assert_eq!(store.row(2), Some(CatalogRecord::new(2, "B", "y", 3.5)));
    }

    #[tokio::test]
    async fn connection_blip_is_a_record_failure_when_store_still_answers() {
        let store = Arc::new(MemoryStore::default());
        *store.drop_connection_after.lock().unwrap() = Some(1);
        store.recovers.store(true, Ordering::SeqCst);
        let records = vec![
            CatalogRecord::new(1, "A", "x", 1.0),
            CatalogRecord::new(2, "B", "x", 2.0),
        ];

        let report = loader(&store).load(&records).await.unwrap();

        assert_eq!(report.succeeded, 1);
        assert_eq!(report.failed_ids(), vec![Some(2)]);
    }

    #[tokio::test]
    async fn lost_connection_aborts_the_batch() {
        let store = Arc::new(MemoryStore::default());
        *store.drop_connection_after.lock().unwrap() = Some(1);
        let records = vec![
            CatalogRecord::new(1, "A", "x", 1.0),
            CatalogRecord::new(2, "B", "x", 2.0),
            CatalogRecord::new(3, "C", "x", 3.0),
        ];

        let err = loader(&store).load(&records).await.unwrap_err();

        match err {
            Error::ConnectionLost { succeeded, remaining, .. } => {
                assert_eq!(succeeded, 1);
                assert_eq!(remaining, 2);
            }
            other => panic!("expected connection loss, got {other:?}"),
        }
        assert_eq!(store.statements.load(Ordering::SeqCst), 2);
        assert!(store.row(3).is_none());
    }
}
