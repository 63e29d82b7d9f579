//! Shared HTTP plumbing for the bundled adapters.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;

use super::SourceError;

pub(crate) fn build_client(timeout_secs: u32, cookie_store: bool) -> reqwest::Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs as u64))
        .cookie_store(cookie_store)
        .build()
}

/// Map a transport-level failure onto the source taxonomy.
pub(crate) fn transport_error(e: reqwest::Error) -> SourceError {
    if e.is_decode() {
        SourceError::Malformed(e.to_string())
    } else {
        // Timeouts, refused connections and dropped bodies are retried next tick
        SourceError::Transient(e.without_url().to_string())
    }
}

/// Map a non-success HTTP status onto the source taxonomy.
pub(crate) fn status_error(status: StatusCode, body: &str) -> SourceError {
    let snippet: String = body.chars().take(200).collect();
    let message = format!("HTTP {}: {}", status, snippet);
    match status.as_u16() {
        404 => SourceError::NotFound(message),
        401 | 403 => SourceError::Unauthenticated(message),
        _ => SourceError::Transient(message),
    }
}

/// GET a URL and return the body, mapping failures.
pub(crate) async fn get_text(client: &Client, url: &str) -> Result<String, SourceError> {
    let response = client.get(url).send().await.map_err(transport_error)?;
    let status = response.status();
    let body = response.text().await.map_err(transport_error)?;
    if !status.is_success() {
        return Err(status_error(status, &body));
    }
    Ok(body)
}

/// GET a URL and decode a JSON body; decode failures are `Malformed`.
pub(crate) async fn get_json<T: DeserializeOwned>(
    client: &Client,
    url: &str,
) -> Result<T, SourceError> {
    let body = get_text(client, url).await?;
    serde_json::from_str(&body)
        .map_err(|e| SourceError::Malformed(format!("Failed to parse response: {}", e)))
}
