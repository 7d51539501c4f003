//! HTTP retrieval of runtime modules, package assets and manifests.
//!
//! All network traffic of the loader funnels through this crate: the
//! binary module fetch at bootstrap, the dependency manifest, and every
//! package asset. Failures are surfaced, never retried - retry policy is
//! explicitly out of scope for the loader.

use std::sync::OnceLock;
use std::time::Duration;

use thiserror::Error;
use url::Url;

use pyrite_types::{DependencyManifest, MANIFEST_PATH};

const CONNECT_TIMEOUT_SECS: u64 = 30;
const REQUEST_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: Url,
        #[source]
        source: reqwest::Error,
    },

    #[error("request to {url} returned status {status}")]
    Status { url: Url, status: reqwest::StatusCode },

    #[error("cannot resolve '{path}' against {base}: {source}")]
    Path {
        base: Url,
        path: &'static str,
        #[source]
        source: url::ParseError,
    },

    #[error("response from {url} is not a valid manifest: {source}")]
    Decode {
        url: Url,
        #[source]
        source: serde_json::Error,
    },
}

/// Process-wide HTTP client.
///
/// Built once; asset fetches across concurrent load operations share its
/// connection pool.
pub fn http_client() -> &'static reqwest::Client {
    static CLIENT: OnceLock<reqwest::Client> = OnceLock::new();
    CLIENT.get_or_init(|| {
        reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|e| {
                tracing::error!("failed to build HTTP client: {e}; falling back to defaults");
                reqwest::Client::new()
            })
    })
}

/// Fetch a URL and return its body bytes. Non-2xx statuses are errors.
pub async fn fetch_bytes(url: &Url) -> Result<Vec<u8>, FetchError> {
    tracing::debug!(%url, "fetching");
    let response = http_client()
        .get(url.clone())
        .send()
        .await
        .map_err(|source| FetchError::Transport {
            url: url.clone(),
            source,
        })?;

    let status = response.status();
    if !status.is_success() {
        tracing::warn!(%url, %status, "fetch failed");
        return Err(FetchError::Status {
            url: url.clone(),
            status,
        });
    }

    let body = response
        .bytes()
        .await
        .map_err(|source| FetchError::Transport {
            url: url.clone(),
            source,
        })?;
    tracing::debug!(%url, len = body.len(), "fetched");
    Ok(body.to_vec())
}

/// Fetch and decode the dependency manifest at its well-known path.
pub async fn fetch_manifest(base: &Url) -> Result<DependencyManifest, FetchError> {
    let url = base.join(MANIFEST_PATH).map_err(|source| FetchError::Path {
        base: base.clone(),
        path: MANIFEST_PATH,
        source,
    })?;
    let body = fetch_bytes(&url).await?;
    serde_json::from_slice(&body).map_err(|source| FetchError::Decode { url, source })
}
