//! GitHub release webhook — verifies the delivery, upserts the project,
//! and fans out one ingestion task per variant manifest.

use axum::body::Bytes;
use axum::http::HeaderMap;
use serde::Serialize;

use crate::error::ApiError;
use crate::models::project::NewProject;
use crate::routes::AppState;
use crate::services::github_service::{self, ReleaseEvent};
use crate::services::{ingest, project_service};

/// Summary of what a webhook delivery queued.
#[derive(Debug, Serialize)]
pub struct WebhookSummary {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub queued_variants: Vec<String>,
}

impl WebhookSummary {
    fn ignored() -> Self {
        Self {
            project: None,
            version: None,
            queued_variants: Vec::new(),
        }
    }
}

/// Handle an incoming GitHub release webhook.
pub async fn handle_webhook(
    state: &AppState,
    headers: &HeaderMap,
    body: Bytes,
) -> Result<WebhookSummary, ApiError> {
    let signature = headers
        .get("x-hub-signature-256")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    if !github_service::validate_signature(&state.config.webhook_secret, &body, signature) {
        tracing::warn!("Webhook signature validation failed");
        return Err(ApiError::Auth("invalid webhook signature".to_string()));
    }

    let event: ReleaseEvent = serde_json::from_slice(&body)
        .map_err(|e| ApiError::Validation(format!("malformed release event: {e}")))?;

    crate::metrics::webhook_received(&event.action);

    // Only published/edited releases produce work; everything else is
    // acknowledged without side effects.
    let relevant = matches!(event.action.as_str(), "published" | "edited");
    let Some(release) = event.release.filter(|_| relevant) else {
        tracing::debug!(action = %event.action, "Ignoring webhook action");
        return Ok(WebhookSummary::ignored());
    };

    let repository_slug = event.repository.full_name.clone();
    let slug = repository_slug
        .rsplit('/')
        .next()
        .unwrap_or(&repository_slug)
        .to_string();
    let display_name = release
        .name
        .clone()
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| slug.strip_suffix("-fw").unwrap_or(&slug).to_uppercase());

    let mut conn = state
        .pool
        .get()
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    let project = project_service::upsert_from_webhook(
        &mut conn,
        NewProject {
            slug: slug.clone(),
            repository_slug,
            name: display_name,
        },
    )
    .await?;

    let installation_id = event.installation.map(|i| i.id);
    let version = ingest::normalized_version(&release.tag_name);

    let mut queued_variants = Vec::new();
    for task in ingest::plan_tasks(&project, &release, installation_id) {
        let variant = task.variant().to_string();
        if !state.queue.enqueue(task) {
            return Err(ApiError::Internal("ingestion queue unavailable".to_string()));
        }
        queued_variants.push(variant);
    }

    tracing::info!(
        project = %project.slug,
        version = %version,
        variants = queued_variants.len(),
        "Webhook accepted"
    );

    Ok(WebhookSummary {
        project: Some(project.slug),
        version: Some(version),
        queued_variants,
    })
}
