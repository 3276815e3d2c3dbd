//! Upstream delivery for queued mutations.

use std::time::Duration;

use async_trait::async_trait;
use tenderdesk_core::sync::{MutationTransport, QueuedMutation, TransportError};

const PUSH_TIMEOUT: Duration = Duration::from_secs(15);
const AVAILABILITY_TIMEOUT: Duration = Duration::from_secs(3);

/// Posts mutations as JSON to `{base_url}/mutations`.
pub struct HttpMutationTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpMutationTransport {
    pub fn new(base_url: &str) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(PUSH_TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

fn classify(err: reqwest::Error) -> TransportError {
    if err.is_connect() || err.is_timeout() {
        TransportError::offline(err.to_string())
    } else {
        TransportError::Other(err.to_string())
    }
}

#[async_trait]
impl MutationTransport for HttpMutationTransport {
    async fn is_available(&self) -> bool {
        let url = format!("{}/healthz", self.base_url);
        match self.client.get(&url).timeout(AVAILABILITY_TIMEOUT).send().await {
            Ok(response) => response.status().is_success(),
            Err(err) => {
                tracing::debug!("Upstream availability check failed: {}", err);
                false
            }
        }
    }

    async fn push(&self, mutation: &QueuedMutation) -> Result<(), TransportError> {
        let url = format!("{}/mutations", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(mutation)
            .send()
            .await
            .map_err(classify)?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        tracing::debug!("Upstream rejected {} ({}): {}", mutation.id, status, body);
        Err(TransportError::rejected(status.as_u16(), body))
    }
}

/// Used when no upstream is configured; mutations stay queued.
pub struct OfflineTransport;

#[async_trait]
impl MutationTransport for OfflineTransport {
    async fn is_available(&self) -> bool {
        false
    }

    async fn push(&self, _mutation: &QueuedMutation) -> Result<(), TransportError> {
        Err(TransportError::offline("No upstream configured"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_is_normalized() {
        let transport = HttpMutationTransport::new("https://sync.example.com/").unwrap();
        assert_eq!(transport.base_url(), "https://sync.example.com");
    }

    #[tokio::test]
    async fn offline_transport_never_delivers() {
        let transport = OfflineTransport;
        assert!(!transport.is_available().await);
    }

    #[tokio::test]
    async fn unreachable_upstream_is_unavailable() {
        // Port 9 (discard) on localhost is not expected to serve HTTP.
        let transport = HttpMutationTransport::new("http://127.0.0.1:9").unwrap();
        assert!(!transport.is_available().await);
    }
}
