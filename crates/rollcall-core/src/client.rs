//! Outbound client for the external face-model service.
//!
//! Wraps the service's `/embed` and `/verify` multipart endpoints. A non-2xx
//! upstream response is the answer, to be relayed verbatim to the original
//! caller; only transport failures and deadline overruns are errors here.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};

use crate::error::GatewayError;
use crate::types::{EmbedResponse, RelayedResponse};

/// Wall-clock bound for embed and verify calls.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(120);
/// Wall-clock bound for reference-image fetches.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// One file of a multipart proxy call.
#[derive(Debug, Clone)]
pub struct FilePart {
    pub bytes: Vec<u8>,
    pub filename: String,
}

/// Parameters forwarded to the model service on embed calls.
#[derive(Debug, Clone)]
pub struct EmbedOptions {
    pub model_name: String,
    pub detector_backend: String,
}

/// Parameters forwarded on verify calls. `threshold` is only sent when the
/// caller supplied one.
#[derive(Debug, Clone)]
pub struct VerifyOptions {
    pub model_name: String,
    pub detector_backend: String,
    pub distance_metric: String,
    pub threshold: Option<f64>,
}

/// Outcome of an embed call that reached the upstream service.
#[derive(Debug)]
pub enum EmbedOutcome {
    /// 2xx response, body parsed leniently.
    Embedded(EmbedResponse),
    /// Non-2xx response to relay.
    Refused(RelayedResponse),
}

/// Seam for the external face-model service, so orchestration can be
/// exercised without a live upstream.
#[async_trait]
pub trait FaceGateway: Send + Sync {
    async fn embed(
        &self,
        image: FilePart,
        opts: &EmbedOptions,
    ) -> Result<EmbedOutcome, GatewayError>;

    async fn verify(
        &self,
        reference: FilePart,
        query: FilePart,
        opts: &VerifyOptions,
    ) -> Result<RelayedResponse, GatewayError>;

    /// Outbound GET for reference images stored as absolute URLs.
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, GatewayError>;
}

/// HTTP implementation of [`FaceGateway`] backed by reqwest.
pub struct FaceApiClient {
    http: reqwest::Client,
    base_url: String,
    call_timeout: Duration,
    fetch_timeout: Duration,
}

impl FaceApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_timeouts(base_url, DEFAULT_CALL_TIMEOUT, DEFAULT_FETCH_TIMEOUT)
    }

    pub fn with_timeouts(
        base_url: impl Into<String>,
        call_timeout: Duration,
        fetch_timeout: Duration,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            http: reqwest::Client::new(),
            base_url,
            call_timeout,
            fetch_timeout,
        }
    }

    fn endpoint(&self, suffix: &str) -> String {
        format!("{}{}", self.base_url, suffix)
    }
}

#[async_trait]
impl FaceGateway for FaceApiClient {
    async fn embed(
        &self,
        image: FilePart,
        opts: &EmbedOptions,
    ) -> Result<EmbedOutcome, GatewayError> {
        let form = Form::new()
            .part("file", Part::bytes(image.bytes).file_name(image.filename))
            .text("model_name", opts.model_name.clone())
            .text("detector_backend", opts.detector_backend.clone())
            .text("enforce_detection", "false")
            .text("align", "true");

        let response = self
            .http
            .post(self.endpoint("/embed"))
            .multipart(form)
            .timeout(self.call_timeout)
            .send()
            .await
            .map_err(map_send_error)?;

        let status = response.status();
        let text = response.text().await.map_err(map_send_error)?;
        tracing::debug!(status = status.as_u16(), "embed response received");

        if status.is_success() {
            // Lenient parse: an unusable body surfaces as a missing
            // embedding, which orchestration treats as InvalidEmbedding.
            let parsed = serde_json::from_str::<EmbedResponse>(&text).unwrap_or_default();
            Ok(EmbedOutcome::Embedded(parsed))
        } else {
            Ok(EmbedOutcome::Refused(relay_body(status.as_u16(), &text)))
        }
    }

    async fn verify(
        &self,
        reference: FilePart,
        query: FilePart,
        opts: &VerifyOptions,
    ) -> Result<RelayedResponse, GatewayError> {
        let mut form = Form::new()
            .part(
                "file1",
                Part::bytes(reference.bytes).file_name(reference.filename),
            )
            .part("file2", Part::bytes(query.bytes).file_name(query.filename))
            .text("model_name", opts.model_name.clone())
            .text("detector_backend", opts.detector_backend.clone())
            .text("distance_metric", opts.distance_metric.clone())
            .text("enforce_detection", "false")
            .text("align", "true");

        if let Some(threshold) = opts.threshold {
            form = form.text("threshold", threshold.to_string());
        }

        let response = self
            .http
            .post(self.endpoint("/verify"))
            .multipart(form)
            .timeout(self.call_timeout)
            .send()
            .await
            .map_err(map_send_error)?;

        let status = response.status();
        let text = response.text().await.map_err(map_send_error)?;
        tracing::debug!(status = status.as_u16(), "verify response received");

        Ok(relay_body(status.as_u16(), &text))
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>, GatewayError> {
        let response = self
            .http
            .get(url)
            .timeout(self.fetch_timeout)
            .send()
            .await
            .map_err(map_send_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::Transport(format!(
                "GET {url} returned {status}"
            )));
        }
        Ok(response.bytes().await.map_err(map_send_error)?.to_vec())
    }
}

fn map_send_error(err: reqwest::Error) -> GatewayError {
    if err.is_timeout() {
        GatewayError::Timeout
    } else {
        GatewayError::Transport(err.to_string())
    }
}

/// Parse an upstream body as JSON; wrap unparsable text so the raw evidence
/// survives the relay.
fn relay_body(status: u16, text: &str) -> RelayedResponse {
    match serde_json::from_str::<serde_json::Value>(text) {
        Ok(body) => RelayedResponse { status, body },
        Err(_) => RelayedResponse::wrap_raw(status, text),
    }
}
