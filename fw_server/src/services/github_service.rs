//! GitHub integration — webhook signature validation, typed release-event
//! payloads, asset download.

use std::time::Duration;

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

use crate::error::ApiError;

type HmacSha256 = Hmac<Sha256>;

pub const USER_AGENT: &str = "fw-hub";

/// Validate a GitHub webhook signature (X-Hub-Signature-256).
///
/// The digest comparison is constant time. A header without the
/// `sha256=` prefix is rejected before any HMAC work, and an empty
/// configured secret rejects everything.
pub fn validate_signature(secret: &str, payload: &[u8], signature: &str) -> bool {
    if secret.is_empty() {
        return false;
    }
    let Some(sig) = signature.strip_prefix("sha256=") else {
        return false;
    };
    let sig_bytes = match hex::decode(sig) {
        Ok(b) => b,
        Err(_) => return false,
    };

    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(m) => m,
        Err(_) => return false,
    };
    mac.update(payload);

    mac.verify_slice(&sig_bytes).is_ok()
}

// ── Release event payload (strict decode at the trust boundary) ──

#[derive(Debug, Deserialize)]
pub struct ReleaseEvent {
    pub action: String,
    pub release: Option<GhRelease>,
    pub repository: GhRepository,
    #[serde(default)]
    pub installation: Option<GhInstallation>,
}

#[derive(Debug, Deserialize)]
pub struct GhRelease {
    pub tag_name: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub assets: Vec<GhAsset>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GhAsset {
    pub id: i64,
    pub name: String,
    /// API URL, usable with an installation token.
    pub url: String,
    /// Anonymous download URL.
    pub browser_download_url: String,
    #[serde(default)]
    pub content_type: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct GhRepository {
    pub full_name: String,
}

#[derive(Debug, Deserialize)]
pub struct GhInstallation {
    pub id: i64,
}

/// Fetch a release asset, anonymously or with an installation token.
///
/// One bounded request per call; firmware binaries can be tens of
/// megabytes, so callers fetch sequentially rather than in parallel.
pub async fn fetch_asset(
    client: &reqwest::Client,
    url: &str,
    token: Option<&str>,
    timeout: Duration,
) -> Result<bytes::Bytes, ApiError> {
    let mut request = client
        .get(url)
        .timeout(timeout)
        .header("Accept", "application/octet-stream")
        .header("User-Agent", USER_AGENT);
    if let Some(token) = token {
        request = request.header("Authorization", format!("Bearer {token}"));
    }

    let resp = request
        .send()
        .await
        .map_err(|e| ApiError::Upstream(format!("asset fetch failed for {url}: {e}")))?;
    if !resp.status().is_success() {
        return Err(ApiError::Upstream(format!(
            "asset fetch failed: {} for {url}",
            resp.status()
        )));
    }
    resp.bytes()
        .await
        .map_err(|e| ApiError::Upstream(format!("asset body read failed for {url}: {e}")))
}
