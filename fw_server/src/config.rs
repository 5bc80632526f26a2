//! Server configuration — loaded from environment variables.

#[derive(Clone, Debug)]
pub struct FwConfig {
    /// GitHub webhook secret for HMAC validation.
    pub webhook_secret: String,
    /// Public base URL devices use to download firmware.
    pub public_url: String,
    /// Root directory of the artifact store.
    pub storage_root: String,
    /// GitHub App id for private-repo asset access (optional).
    pub github_app_id: Option<String>,
    /// GitHub App private key PEM (optional, pairs with app id).
    pub github_app_key: Option<String>,
    /// Deadline for each upstream fetch, in seconds.
    pub fetch_timeout_secs: u64,
    /// How many times an ingestion task is delivered before being dropped.
    pub max_delivery_attempts: u32,
    /// Delay before a failed ingestion task is redelivered, in seconds.
    pub redelivery_delay_secs: u64,
}

impl FwConfig {
    pub fn from_env() -> Self {
        let webhook_secret = std::env::var("FW_WEBHOOK_SECRET").unwrap_or_default();
        let public_url =
            std::env::var("FW_PUBLIC_URL").unwrap_or_else(|_| "http://localhost:8080".to_string());
        let storage_root =
            std::env::var("FW_STORAGE_ROOT").unwrap_or_else(|_| "./firmware-store".to_string());
        let github_app_id = std::env::var("FW_GITHUB_APP_ID").ok().filter(|s| !s.is_empty());
        let github_app_key = match std::env::var("FW_GITHUB_APP_KEY_FILE") {
            Ok(path) if !path.is_empty() => match std::fs::read_to_string(&path) {
                Ok(pem) => Some(pem),
                Err(e) => {
                    tracing::warn!("Failed to read FW_GITHUB_APP_KEY_FILE {path}: {e}");
                    None
                }
            },
            _ => std::env::var("FW_GITHUB_APP_KEY").ok().filter(|s| !s.is_empty()),
        };
        let fetch_timeout_secs = std::env::var("FW_FETCH_TIMEOUT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(30);
        let max_delivery_attempts = std::env::var("FW_MAX_DELIVERY_ATTEMPTS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(5);
        let redelivery_delay_secs = std::env::var("FW_REDELIVERY_DELAY")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(10);

        if webhook_secret.is_empty() {
            tracing::warn!("FW_WEBHOOK_SECRET not set -- all webhook deliveries will be rejected");
        }
        if github_app_id.is_some() != github_app_key.is_some() {
            tracing::warn!(
                "FW_GITHUB_APP_ID and FW_GITHUB_APP_KEY must both be set -- private-repo asset access disabled"
            );
        }

        Self {
            webhook_secret,
            public_url,
            storage_root,
            github_app_id,
            github_app_key,
            fetch_timeout_secs,
            max_delivery_attempts,
            redelivery_delay_secs,
        }
    }

    /// Public download prefix for a (project, variant, version), with a
    /// trailing slash.
    pub fn release_base_url(&self, project: &str, variant: &str, version: &str) -> String {
        format!(
            "{}/firmware/{project}/{variant}/{version}/",
            self.public_url.trim_end_matches('/')
        )
    }
}
