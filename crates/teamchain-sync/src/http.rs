//! HTTP transport: one blocking `PUT {base}/{endpoint}` per request.

use std::time::Duration;

use tracing::debug;

use crate::TeamServer;
use crate::server::{Endpoint, ServerError, ServerResponse};

/// Timeout applied to every request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// [`TeamServer`] over HTTPS.
pub struct HttpTeamServer {
    base_url: String,
    client: reqwest::blocking::Client,
}

impl HttpTeamServer {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ServerError> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ServerError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ServerError::Connection(e.to_string()))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn url(&self, endpoint: Endpoint) -> String {
        format!("{}/{}", self.base_url, endpoint.as_str())
    }
}

impl TeamServer for HttpTeamServer {
    fn send_sync(
        &self,
        endpoint: Endpoint,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value, ServerError> {
        let url = self.url(endpoint);
        debug!(%url, "sending request");

        let response = self
            .client
            .put(&url)
            .json(body)
            .send()
            .map_err(|e| ServerError::Connection(e.to_string()))?;
        let status = response.status();
        let text = response
            .text()
            .map_err(|e| ServerError::Connection(e.to_string()))?;

        // Error replies still carry the envelope, whatever the status code.
        match serde_json::from_str::<ServerResponse>(&text) {
            Ok(envelope) => envelope.into_result(),
            Err(_) => Err(ServerError::Unknown(format!("HTTP {status}: {text}"))),
        }
    }
}
