//! GitHub App credential issuance — a signed app JWT exchanged for a
//! short-lived, installation-scoped bearer token.

use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::services::github_service::USER_AGENT;
use crate::services::key_encoding::{self, KeyEncodingError};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("private key encoding: {0}")]
    KeyEncoding(#[from] KeyEncodingError),
    #[error("private key rejected: {0}")]
    Key(#[from] jsonwebtoken::errors::Error),
    #[error("token exchange request failed: {0}")]
    Exchange(#[from] reqwest::Error),
    #[error("token exchange rejected: {0}")]
    ExchangeRejected(String),
}

/// Claims asserted by the app JWT. Issued-at sits 60 seconds in the past
/// to tolerate clock skew against the upstream verifier.
#[derive(Debug, Serialize)]
struct AppClaims {
    iat: i64,
    exp: i64,
    iss: String,
}

/// Signer state for one GitHub App.
pub struct AppAuth {
    app_id: String,
    encoding_key: EncodingKey,
}

impl AppAuth {
    /// Build signer state from the app id and a private key PEM. Legacy
    /// PKCS#1 keys are transcoded to PKCS#8 before loading.
    pub fn from_pem(app_id: &str, pem: &str) -> Result<Self, AuthError> {
        let pkcs8 = key_encoding::pkcs1_to_pkcs8(pem)?;
        Ok(Self {
            app_id: app_id.to_string(),
            encoding_key: EncodingKey::from_rsa_pem(pkcs8.as_bytes())?,
        })
    }

    /// Sign a short-lived RS256 JWT asserting the app identity.
    pub fn sign_app_jwt(&self) -> Result<String, AuthError> {
        let now = Utc::now().timestamp();
        let claims = AppClaims {
            iat: now - 60,
            exp: now + 600,
            iss: self.app_id.clone(),
        };
        Ok(jsonwebtoken::encode(
            &Header::new(Algorithm::RS256),
            &claims,
            &self.encoding_key,
        )?)
    }

    /// Exchange the app JWT for an installation token (valid about an
    /// hour).
    pub async fn installation_token(
        &self,
        client: &reqwest::Client,
        installation_id: i64,
    ) -> Result<String, AuthError> {
        #[derive(Deserialize)]
        struct TokenResponse {
            token: String,
        }

        let jwt = self.sign_app_jwt()?;
        let url =
            format!("https://api.github.com/app/installations/{installation_id}/access_tokens");
        let resp = client
            .post(&url)
            .header("Authorization", format!("Bearer {jwt}"))
            .header("Accept", "application/vnd.github+json")
            .header("User-Agent", USER_AGENT)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(AuthError::ExchangeRejected(format!("{status}: {text}")));
        }

        let token: TokenResponse = resp.json().await?;
        Ok(token.token)
    }
}
