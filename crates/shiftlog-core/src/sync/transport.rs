//! Network seam between the worker and the remote mirror.

use std::future::Future;
use std::time::Duration;

use reqwest::StatusCode;
use thiserror::Error;

use crate::models::PairCode;
use crate::util::{api_base_url, error_excerpt};
use crate::wire::{IngestResponse, RemoteRequest, ShiftProjection};

/// A delivery failure. Recorded on the queue item and retried; never
/// returned to callers of the state machine.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Invalid transport configuration: {0}")]
    InvalidConfiguration(String),
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Remote returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Failed to prepare photo: {0}")]
    Prepare(String),
}

/// Sends one request to the remote mirror.
///
/// Implementations must treat every request as safe to repeat.
pub trait Transport: Send + Sync {
    fn send(
        &self,
        request: &RemoteRequest,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;
}

impl<T: Transport> Transport for std::sync::Arc<T> {
    fn send(
        &self,
        request: &RemoteRequest,
    ) -> impl Future<Output = Result<(), TransportError>> + Send {
        (**self).send(request)
    }
}

/// reqwest-backed transport for the shiftlog API.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    base_url: String,
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, TransportError> {
        let base_url = normalize_base_url(&base_url.into())?;
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { base_url, client })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch the live projection for a pair code. Unknown codes yield `None`.
    pub async fn fetch_shift(
        &self,
        pair_code: &PairCode,
    ) -> Result<Option<ShiftProjection>, TransportError> {
        let url = format!("{}/v1/shift/{pair_code}", self.base_url);
        let response = self
            .client
            .get(url)
            .header("Accept", "application/json")
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = ensure_success(response).await?;
        Ok(Some(response.json::<ShiftProjection>().await?))
    }
}

impl Transport for HttpTransport {
    async fn send(&self, request: &RemoteRequest) -> Result<(), TransportError> {
        let url = format!("{}{}", self.base_url, request.route());
        let builder = self.client.post(url);
        let builder = match request {
            RemoteRequest::Shift(body) => builder.json(body),
            RemoteRequest::Location(body) => builder.json(body),
            RemoteRequest::Photo(body) => builder.json(body),
            RemoteRequest::Note(body) => builder.json(body),
            RemoteRequest::ShiftEnd(body) => builder.json(body),
        };

        let response = ensure_success(builder.send().await?).await?;
        let ack = response.json::<IngestResponse>().await?;
        tracing::debug!(route = request.route(), applied = ack.applied, "Remote acknowledged");
        Ok(())
    }
}

async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, TransportError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(TransportError::Status {
        status: status.as_u16(),
        body: error_excerpt(&body),
    })
}

fn normalize_base_url(raw: &str) -> Result<String, TransportError> {
    api_base_url(raw).map_err(|error| TransportError::InvalidConfiguration(error.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_base_url_rejects_invalid_values() {
        assert!(normalize_base_url("").is_err());
        assert!(normalize_base_url("example.com").is_err());
    }

    #[test]
    fn normalize_base_url_trims_trailing_slash() {
        assert_eq!(
            normalize_base_url(" https://api.example.com/ ").unwrap(),
            "https://api.example.com"
        );
    }

    #[test]
    fn http_transport_keeps_normalized_base() {
        let transport =
            HttpTransport::new("http://localhost:8080/", Duration::from_secs(5)).unwrap();
        assert_eq!(transport.base_url(), "http://localhost:8080");
    }
}
