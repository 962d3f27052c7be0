use super::{CatalogSource, SourceResponse};
use async_trait::async_trait;
use ingestor_core::config::SourceConfig;
use ingestor_core::{Error, Result};
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::{debug, instrument};

pub struct HttpSource {
    client: Client,
    url: String,
}

impl HttpSource {
    pub fn new(config: &SourceConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(concat!("ingestor/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            url: config.url.clone(),
        })
    }
}

#[async_trait]
impl CatalogSource for HttpSource {
    #[instrument(skip(self), fields(url = %self.url))]
    async fn fetch(&self) -> Result<SourceResponse> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| Error::Fetch {
                status: e.status().map(|s| s.as_u16()),
                details: format!("request to {} failed: {}", self.url, e),
            })?;

        let status = response.status();
        if status != StatusCode::OK {
            debug!(status = status.as_u16(), "Catalog endpoint not ready");
            return Ok(SourceResponse {
                status: status.as_u16(),
                body: None,
            });
        }

        let body = response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| Error::Fetch {
                status: Some(status.as_u16()),
                details: format!("failed to parse response body: {}", e),
            })?;

        Ok(SourceResponse {
            status: status.as_u16(),
            body: Some(body),
        })
    }

    fn source_id(&self) -> &str {
        &self.url
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn source_for(server: &MockServer) -> HttpSource {
        HttpSource::new(&SourceConfig {
            url: format!("{}/api/v1/public/randomproducts", server.uri()),
            items_path: "data.data".to_string(),
            request_timeout_secs: 5,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn returns_parsed_body_on_200() {
        let server = MockServer::start().await;
        let body = serde_json::json!({ "data": { "data": [{ "id": 1 }] } });
        Mock::given(method("GET"))
            .and(path("/api/v1/public/randomproducts"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body.clone()))
            .mount(&server)
            .await;

        let response = source_for(&server).fetch().await.unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.body, Some(body));
    }

    #[tokio::test]
    async fn non_200_is_reported_without_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503).set_body_string("busy"))
            .mount(&server)
            .await;

        let response = source_for(&server).fetch().await.unwrap();
        assert_eq!(response.status, 503);
        assert_eq!(response.body, None);
    }

    #[tokio::test]
    async fn malformed_body_is_a_fetch_error_carrying_the_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let err = source_for(&server).fetch().await.unwrap_err();
        assert!(matches!(err, Error::Fetch { status: Some(200), .. }));
    }
}
