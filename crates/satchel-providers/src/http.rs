//! Shared reqwest plumbing for the REST backends.

use std::time::Duration;

use reqwest::{Client, Response};
use serde::de::DeserializeOwned;

use satchel_core::error::ProviderError;
use tracing::warn;

/// Longest error body kept in a `ProviderError::Status`.
const MAX_ERROR_BODY: usize = 256;

/// A client bounded by `timeout`. A build failure is kept and reported
/// as a transport error by every request made through the backend.
pub(crate) fn build_client(timeout: Duration) -> Result<Client, ProviderError> {
    Client::builder().timeout(timeout).build().map_err(|e| {
        warn!(error = %e, "HTTP client construction failed");
        ProviderError::Transport(format!("client unavailable: {e}"))
    })
}

pub(crate) fn transport_error(e: reqwest::Error, timeout: Duration) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout(timeout)
    } else {
        ProviderError::Transport(e.to_string())
    }
}

/// Pass 2xx responses through; turn anything else into `ProviderError::Status`.
pub(crate) async fn check_status(resp: Response) -> Result<Response, ProviderError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let mut body = resp.text().await.unwrap_or_default();
    if body.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }
    Err(ProviderError::Status {
        status: status.as_u16(),
        body,
    })
}

pub(crate) async fn read_text(resp: Response, timeout: Duration) -> Result<String, ProviderError> {
    let resp = check_status(resp).await?;
    resp.text().await.map_err(|e| transport_error(e, timeout))
}

pub(crate) async fn read_json<T: DeserializeOwned>(
    resp: Response,
    timeout: Duration,
) -> Result<T, ProviderError> {
    let text = read_text(resp, timeout).await?;
    serde_json::from_str(&text).map_err(|e| ProviderError::Decode(e.to_string()))
}
