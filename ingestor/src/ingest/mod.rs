pub mod http_source;

use async_trait::async_trait;
use ingestor_core::Result;
use serde_json::Value;

/// Status and body of one request to the catalog endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceResponse {
    pub status: u16,
    /// Parsed JSON body, only present for 200 responses.
    pub body: Option<Value>,
}

#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Issue one request. Transport and body-parsing problems come back as
    /// [`ingestor_core::Error::Fetch`].
    async fn fetch(&self) -> Result<SourceResponse>;

    /// Get the source identifier
    fn source_id(&self) -> &str;
}

pub use http_source::HttpSource;
