//! Release ingestion — webhook fan-out planning and the idempotent
//! per-manifest consumer.

use std::time::Duration;

use diesel_async::AsyncPgConnection;
use serde::{Deserialize, Serialize};

use crate::config::FwConfig;
use crate::models::project::Project;
use crate::models::release::NewRelease;
use crate::services::credential_service::AppAuth;
use crate::services::github_service::{self, GhRelease};
use crate::services::storage::{self, ArtifactStore};
use crate::services::{ledger_service, manifest, release_service};
use crate::version::VersionTriple;

/// Suffix that marks a release asset as a variant manifest.
pub const MANIFEST_SUFFIX: &str = "_manifest.json";

/// One unit of ingestion work: a single variant manifest of a release,
/// plus the release's full asset list so the consumer can resolve
/// referenced files without a second upstream listing call. Delivered at
/// least once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionTask {
    pub project_id: i64,
    pub project_slug: String,
    pub version: String,
    pub manifest_asset_id: i64,
    pub manifest_api_url: String,
    pub manifest_url: String,
    pub manifest_filename: String,
    pub assets: Vec<TaskAsset>,
    pub installation_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskAsset {
    pub name: String,
    pub url: String,
    pub api_url: String,
    pub content_type: Option<String>,
}

impl IngestionTask {
    /// Variant name: the manifest filename with the suffix removed.
    pub fn variant(&self) -> &str {
        self.manifest_filename
            .strip_suffix(MANIFEST_SUFFIX)
            .unwrap_or(&self.manifest_filename)
    }
}

/// Plan one ingestion task per manifest asset of a release.
pub fn plan_tasks(
    project: &Project,
    release: &GhRelease,
    installation_id: Option<i64>,
) -> Vec<IngestionTask> {
    let version = normalized_version(&release.tag_name);
    let assets: Vec<TaskAsset> = release
        .assets
        .iter()
        .map(|a| TaskAsset {
            name: a.name.clone(),
            url: a.browser_download_url.clone(),
            api_url: a.url.clone(),
            content_type: a.content_type.clone(),
        })
        .collect();

    release
        .assets
        .iter()
        .filter(|a| a.name.ends_with(MANIFEST_SUFFIX))
        .map(|a| IngestionTask {
            project_id: project.id,
            project_slug: project.slug.clone(),
            version: version.clone(),
            manifest_asset_id: a.id,
            manifest_api_url: a.url.clone(),
            manifest_url: a.browser_download_url.clone(),
            manifest_filename: a.name.clone(),
            assets: assets.clone(),
            installation_id,
        })
        .collect()
}

/// Stored version string: the release tag with a leading `v` stripped.
pub fn normalized_version(tag: &str) -> String {
    tag.strip_prefix('v')
        .or_else(|| tag.strip_prefix('V'))
        .unwrap_or(tag)
        .to_string()
}

/// Everything the consumer needs besides the task itself.
pub struct IngestContext<'a> {
    pub config: &'a FwConfig,
    pub client: &'a reqwest::Client,
    pub store: &'a dyn ArtifactStore,
    pub app_auth: Option<&'a AppAuth>,
}

/// Process one ingestion task.
///
/// Safe to re-run from the top: every write before the final ledger mark
/// is an overwrite or an insert-ignore. Errors propagate so the queue
/// redelivers the task; the release row is only written once all
/// artifacts are in place.
pub async fn process_task(
    conn: &mut AsyncPgConnection,
    ctx: &IngestContext<'_>,
    task: &IngestionTask,
) -> anyhow::Result<()> {
    let variant = task.variant().to_string();

    // 1. Ledger gate: a row means every side effect already happened.
    let done = ledger_service::processed_ids(conn, &[task.manifest_asset_id]).await?;
    if done.contains(&task.manifest_asset_id) {
        tracing::debug!(
            asset_id = task.manifest_asset_id,
            "Manifest asset already processed"
        );
        crate::metrics::task_processed("duplicate");
        return Ok(());
    }

    // 2. Credentials, when the webhook came from an app installation.
    let token = match (task.installation_id, ctx.app_auth) {
        (Some(installation_id), Some(auth)) => {
            Some(auth.installation_token(ctx.client, installation_id).await?)
        }
        _ => None,
    };
    let timeout = Duration::from_secs(ctx.config.fetch_timeout_secs);

    // 3. Manifest: fetch, parse, canonicalize, persist under its
    //    canonical name.
    let manifest_url = if token.is_some() {
        &task.manifest_api_url
    } else {
        &task.manifest_url
    };
    let bytes = github_service::fetch_asset(ctx.client, manifest_url, token.as_deref(), timeout)
        .await?;
    let mut document = manifest::parse(&bytes)?;
    manifest::canonicalize(&mut document);
    let canonical = serde_json::to_vec_pretty(&document)?;
    let manifest_key =
        storage::object_key(&task.project_slug, &variant, &task.version, "manifest.json");
    ctx.store.put(&manifest_key, &canonical).await?;

    // 4. Referenced part files, resolved against the task's asset list by
    //    exact filename. A missing file is logged and skipped; the rest
    //    still land.
    for path in manifest::referenced_paths(&document) {
        let Some(asset) = task.assets.iter().find(|a| a.name == path) else {
            tracing::warn!(
                project = %task.project_slug,
                variant = %variant,
                file = %path,
                "Manifest references a file missing from the release assets"
            );
            continue;
        };
        let url = if token.is_some() { &asset.api_url } else { &asset.url };
        let bytes = github_service::fetch_asset(ctx.client, url, token.as_deref(), timeout).await?;
        let key = storage::object_key(&task.project_slug, &variant, &task.version, &path);
        ctx.store.put(&key, &bytes).await?;
    }

    // 5. Debug symbols, best effort; absence is not an error.
    let elf_name = format!("{variant}.elf");
    if let Some(asset) = task.assets.iter().find(|a| a.name == elf_name) {
        let url = if token.is_some() { &asset.api_url } else { &asset.url };
        match github_service::fetch_asset(ctx.client, url, token.as_deref(), timeout).await {
            Ok(bytes) => {
                let key =
                    storage::object_key(&task.project_slug, &variant, &task.version, &elf_name);
                ctx.store.put(&key, &bytes).await?;
            }
            Err(e) => {
                tracing::warn!(file = %elf_name, "Debug symbol fetch failed: {e:#}");
            }
        }
    }

    // 6. Release row, written only now that artifacts are in place. A
    //    second manifest task for the same variant/version is not an
    //    error.
    let triple = VersionTriple::parse(&task.version)
        .map_err(|e| anyhow::anyhow!("release tag {}: {e}", task.version))?;
    release_service::insert_ignore(
        conn,
        NewRelease {
            project_id: task.project_id,
            variant: variant.clone(),
            version: task.version.clone(),
            major: triple.major,
            minor: triple.minor,
            patch: triple.patch,
        },
    )
    .await?;

    // 7. Ledger mark: from here on the task is a duplicate.
    ledger_service::mark_processed(conn, task.manifest_asset_id, task.project_id).await?;

    crate::metrics::task_processed("ok");
    tracing::info!(
        project = %task.project_slug,
        variant = %variant,
        version = %task.version,
        "Release variant ingested"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::github_service::GhAsset;
    use chrono::Utc;

    fn project() -> Project {
        Project {
            id: 1,
            slug: "widget-fw".to_string(),
            repository_slug: "acme/widget-fw".to_string(),
            name: "WIDGET".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn asset(id: i64, name: &str) -> GhAsset {
        GhAsset {
            id,
            name: name.to_string(),
            url: format!("https://api.github.com/repos/acme/widget-fw/releases/assets/{id}"),
            browser_download_url: format!(
                "https://github.com/acme/widget-fw/releases/download/v1.2.0/{name}"
            ),
            content_type: None,
        }
    }

    fn release() -> GhRelease {
        GhRelease {
            tag_name: "v1.2.0".to_string(),
            name: Some("Widget 1.2.0".to_string()),
            assets: vec![
                asset(1, "WIDGET_manifest.json"),
                asset(2, "WIDGET_app.bin"),
                asset(3, "SENSOR_manifest.json"),
                asset(4, "README.md"),
            ],
        }
    }

    #[test]
    fn plans_one_task_per_manifest_asset() {
        let tasks = plan_tasks(&project(), &release(), Some(7));

        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].variant(), "WIDGET");
        assert_eq!(tasks[1].variant(), "SENSOR");
        assert_eq!(tasks[0].version, "1.2.0");
        assert_eq!(tasks[0].manifest_asset_id, 1);
        assert_eq!(tasks[0].installation_id, Some(7));
        // Every task carries the full asset list for filename resolution.
        assert_eq!(tasks[0].assets.len(), 4);
        assert_eq!(tasks[1].assets.len(), 4);
    }

    #[test]
    fn version_strips_a_leading_v_only() {
        assert_eq!(normalized_version("v1.2.0"), "1.2.0");
        assert_eq!(normalized_version("V2.0"), "2.0");
        assert_eq!(normalized_version("1.2.0"), "1.2.0");
    }
}
