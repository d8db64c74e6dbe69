//! The external visitor counter.
//!
//! One `GET {endpoint}/api/visitor/increment?target=<site-id>` per page
//! load. Any failure means "no visitor count this load"; there is no retry.

use crate::errors::CounterError;
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

pub const INCREMENT_PATH: &str = "/api/visitor/increment";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CounterResponse {
    pub count: u64,
    /// Not every deployment reports page views.
    #[serde(default)]
    pub page_views: Option<u64>,
}

#[async_trait]
pub trait CounterClient: Send + Sync {
    /// Record one visit for `site_id` and return the new totals.
    async fn increment(&self, site_id: &str) -> Result<CounterResponse, CounterError>;
}

pub struct HttpCounterClient {
    client: Client,
    base: Url,
}

impl HttpCounterClient {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, CounterError> {
        let base = Url::parse(endpoint)
            .map_err(|e| CounterError::InvalidEndpoint(format!("{endpoint}: {e}")))?;
        if base.cannot_be_a_base() {
            return Err(CounterError::InvalidEndpoint(endpoint.to_string()));
        }
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CounterError::Network(e.to_string()))?;
        Ok(Self { client, base })
    }

    /// Full increment URL for `site_id`.
    pub fn increment_url(&self, site_id: &str) -> Result<Url, CounterError> {
        let mut url = self
            .base
            .join(INCREMENT_PATH)
            .map_err(|e| CounterError::InvalidEndpoint(e.to_string()))?;
        url.query_pairs_mut().append_pair("target", site_id);
        Ok(url)
    }
}

#[async_trait]
impl CounterClient for HttpCounterClient {
    async fn increment(&self, site_id: &str) -> Result<CounterResponse, CounterError> {
        let url = self.increment_url(site_id)?;
        debug!(url = %url, "Incrementing visitor count");

        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                CounterError::Timeout
            } else {
                CounterError::Network(e.to_string())
            }
        })?;
        let status = response.status();
        if !status.is_success() {
            return Err(CounterError::HttpStatus {
                status: status.as_u16(),
            });
        }
        response
            .json::<CounterResponse>()
            .await
            .map_err(|e| CounterError::Parse(e.to_string()))
    }
}

/// A counter that is never reachable, for offline page loads.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineCounterClient;

#[async_trait]
impl CounterClient for OfflineCounterClient {
    async fn increment(&self, _site_id: &str) -> Result<CounterResponse, CounterError> {
        Err(CounterError::Network("visitor counter disabled".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_increment_url_encodes_target() {
        let client = HttpCounterClient::new("http://127.0.0.1:8080", Duration::from_secs(1)).unwrap();
        let url = client.increment_url("nie 1037").unwrap();
        assert_eq!(
            url.as_str(),
            "http://127.0.0.1:8080/api/visitor/increment?target=nie+1037"
        );
    }

    #[test]
    fn test_invalid_endpoint_rejected() {
        let err = HttpCounterClient::new("not a url", Duration::from_secs(1))
            .err()
            .unwrap();
        assert!(matches!(err, CounterError::InvalidEndpoint(_)));
    }

    #[test]
    fn test_response_page_views_optional() {
        let r: CounterResponse = serde_json::from_str(r#"{"count": 42}"#).unwrap();
        assert_eq!(r, CounterResponse { count: 42, page_views: None });
        let r: CounterResponse = serde_json::from_str(r#"{"count": 1, "pageViews": 9}"#).unwrap();
        assert_eq!(r.page_views, Some(9));
    }

    #[tokio::test]
    async fn test_offline_client_fails() {
        assert!(OfflineCounterClient.increment("site").await.is_err());
    }
}
