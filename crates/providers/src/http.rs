//! Shared HTTP plumbing for the upstream clients.

use std::time::Duration;

use hikewise_core::UpstreamError;
use serde::de::DeserializeOwned;
use tracing::warn;

/// Default upstream base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Longest error body kept in an [`UpstreamError::Status`].
const MAX_ERROR_BODY: usize = 512;

pub(crate) fn build_client(timeout: Duration) -> Result<reqwest::Client, UpstreamError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| UpstreamError::Network(format!("Failed to create HTTP client: {e}")))
}

pub(crate) fn normalize_base_url(base_url: &str) -> String {
    base_url.trim_end_matches('/').to_string()
}

pub(crate) fn network_error(e: reqwest::Error, timeout: Duration) -> UpstreamError {
    if e.is_timeout() {
        UpstreamError::Timeout(timeout.as_secs())
    } else {
        UpstreamError::Network(e.to_string())
    }
}

/// Map a non-2xx response to [`UpstreamError::Status`], or decode the body.
pub(crate) async fn read_json<T: DeserializeOwned>(
    response: reqwest::Response,
    provider: &str,
    timeout: Duration,
) -> Result<T, UpstreamError> {
    let status = response.status();
    if !status.is_success() {
        let mut body = response.text().await.unwrap_or_default();
        if body.len() > MAX_ERROR_BODY {
            let mut cut = MAX_ERROR_BODY;
            while !body.is_char_boundary(cut) {
                cut -= 1;
            }
            body.truncate(cut);
        }
        warn!(provider, status = status.as_u16(), body = %body, "Upstream returned error");
        return Err(UpstreamError::Status {
            status_code: status.as_u16(),
            message: body,
        });
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| network_error(e, timeout))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| UpstreamError::Parse(format!("Failed to parse {provider} response: {e}")))
}
