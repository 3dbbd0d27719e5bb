//! HTTP client for the remote defect inference service.
//!
//! The service exposes a liveness probe at its root and a single detection
//! endpoint taking one image per request as multipart form data. Batches fan
//! out concurrently, one request per image, and fail as a whole on the first
//! error so a partial batch is never presented as a complete one.

use std::time::Duration;

use adlaw_core::DetectResponse;
use futures::future::try_join_all;
use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use crate::validate::{UploadImage, ValidationError, check_batch_size};

/// Liveness probe timeout. Short, so a sleeping service is reported quickly.
pub const PING_TIMEOUT: Duration = Duration::from_secs(5);

/// Detection request timeout. Generous, to ride out model cold starts.
pub const DETECT_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum DetectError {
    /// The service could not be reached, timed out, or failed server-side.
    #[error("inference service unavailable: {0}")]
    ServiceUnavailable(String),
    /// The service refused the request (4xx) with its own message.
    #[error("detection rejected ({status}): {message}")]
    Rejected { status: u16, message: String },
    /// A 2xx response whose body does not match the detection contract.
    #[error("malformed detection response: {0}")]
    MalformedResponse(String),
    /// Local pre-flight failure; no network call was made.
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// HTTP client for the inference service's probe and detect endpoints.
pub struct DetectClient {
    client: reqwest::Client,
    base_url: String,
}

/// Error body shapes the service is known to emit on rejection.
#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    detail: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl DetectClient {
    /// Create a new client for the given service base URL.
    ///
    /// `base_url` should be like `http://localhost:8000` (no trailing slash).
    pub fn new(base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Probe the service root for liveness.
    ///
    /// Serverless deployments cold-start, so an unavailable result here
    /// often means "asleep" rather than "down".
    pub async fn ping(&self) -> Result<(), DetectError> {
        let url = format!("{}/", self.base_url);
        info!(url = %url, "pinging inference service");

        let resp = self
            .client
            .get(&url)
            .timeout(PING_TIMEOUT)
            .send()
            .await
            .map_err(|e| DetectError::ServiceUnavailable(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(DetectError::ServiceUnavailable(format!(
                "liveness probe returned {}",
                status.as_u16()
            )));
        }
        Ok(())
    }

    /// Run detection on one validated image.
    pub async fn detect(&self, image: &UploadImage) -> Result<DetectResponse, DetectError> {
        let url = format!("{}/detect/", self.base_url);
        info!(url = %url, file = %image.filename, bytes = image.data.len(), "requesting detection");

        let part = reqwest::multipart::Part::bytes(image.data.clone())
            .file_name(image.filename.clone())
            .mime_str(image.kind.mime())
            .map_err(|e| DetectError::ServiceUnavailable(format!("building request: {e}")))?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let resp = self
            .client
            .post(&url)
            .multipart(form)
            .timeout(DETECT_TIMEOUT)
            .send()
            .await
            .map_err(|e| DetectError::ServiceUnavailable(e.to_string()))?;

        let status = resp.status();
        if status.is_client_error() {
            let body = resp.text().await.unwrap_or_default();
            return Err(DetectError::Rejected {
                status: status.as_u16(),
                message: rejection_message(&body, status),
            });
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(DetectError::ServiceUnavailable(format!(
                "server returned {}: {}",
                status.as_u16(),
                body
            )));
        }

        let outcome: DetectResponse = resp
            .json()
            .await
            .map_err(|e| DetectError::MalformedResponse(e.to_string()))?;
        info!(count = outcome.detections.len(), "detection complete");
        Ok(outcome)
    }

    /// Run detection on a batch, one concurrent request per image.
    ///
    /// Results come back in input order. The first failure fails the whole
    /// batch; callers never see a partial set of results.
    pub async fn detect_all(
        &self,
        images: &[UploadImage],
    ) -> Result<Vec<DetectResponse>, DetectError> {
        check_batch_size(images.len())?;
        info!(count = images.len(), "running detection batch");
        try_join_all(images.iter().map(|img| self.detect(img))).await
    }
}

/// Extract a human-readable message from a rejection body.
///
/// Tries the JSON error shapes first, then falls back to the raw body, then
/// to the status line.
fn rejection_message(body: &str, status: reqwest::StatusCode) -> String {
    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body)
        && let Some(msg) = parsed.detail.or(parsed.message)
    {
        return msg;
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("request rejected")
            .to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate::ImageKind;

    #[test]
    fn detect_client_trims_trailing_slash() {
        let client = DetectClient::new("http://localhost:8000/".into());
        assert_eq!(client.base_url, "http://localhost:8000");
    }

    #[test]
    fn rejection_message_prefers_detail_field() {
        let msg = rejection_message(
            r#"{"detail": "Invalid image file"}"#,
            reqwest::StatusCode::BAD_REQUEST,
        );
        assert_eq!(msg, "Invalid image file");
    }

    #[test]
    fn rejection_message_falls_back_to_message_field() {
        let msg = rejection_message(
            r#"{"message": "unsupported media type"}"#,
            reqwest::StatusCode::UNSUPPORTED_MEDIA_TYPE,
        );
        assert_eq!(msg, "unsupported media type");
    }

    #[test]
    fn rejection_message_uses_raw_body_when_not_json() {
        let msg = rejection_message("plain refusal\n", reqwest::StatusCode::BAD_REQUEST);
        assert_eq!(msg, "plain refusal");
    }

    #[test]
    fn rejection_message_uses_status_line_for_empty_body() {
        let msg = rejection_message("", reqwest::StatusCode::NOT_FOUND);
        assert_eq!(msg, "Not Found");
    }

    #[test]
    fn error_display_carries_status_and_message() {
        let err = DetectError::Rejected {
            status: 422,
            message: "no file provided".into(),
        };
        assert_eq!(err.to_string(), "detection rejected (422): no file provided");
    }

    #[test]
    fn validation_error_converts_into_detect_error() {
        let err: DetectError = check_batch_size(6).unwrap_err().into();
        assert!(matches!(err, DetectError::Validation(_)));
        assert!(err.to_string().contains("6 files"));
    }

    #[tokio::test]
    async fn oversized_batch_is_rejected_before_any_request() {
        let client = DetectClient::new("http://localhost:1".into());
        let images: Vec<UploadImage> = (0..6)
            .map(|i| UploadImage {
                filename: format!("panel-{i}.png"),
                kind: ImageKind::Png,
                data: vec![0u8; 16],
            })
            .collect();

        // No server needed: the batch cap rejects before any request is built.
        let err = client.detect_all(&images).await.unwrap_err();
        assert!(
            matches!(
                err,
                DetectError::Validation(ValidationError::TooManyFiles { count: 6 })
            ),
            "expected the batch cap to reject six files, got: {err}"
        );
    }
}
