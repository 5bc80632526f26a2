//! OTA version resolution — answers "does this device need an update".

use diesel_async::AsyncPgConnection;

use crate::config::FwConfig;
use crate::error::ApiError;
use crate::services::storage::{self, ArtifactStore};
use crate::services::{manifest, project_service, release_service};
use crate::version::VersionTriple;

/// Variant used when a project publishes no named variants.
pub const DEFAULT_VARIANT: &str = "default";

/// Factory-default placeholder. Devices that have never recorded a real
/// version report this and are always told they are up to date,
/// whatever is actually latest.
const FACTORY_PLACEHOLDER: &str = "0.0.1";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OtaOutcome {
    UpToDate,
    UpdateAvailable { ota_url: String },
}

pub async fn resolve(
    conn: &mut AsyncPgConnection,
    store: &dyn ArtifactStore,
    config: &FwConfig,
    slug: &str,
    device_version: &str,
    variant: &str,
) -> Result<OtaOutcome, ApiError> {
    if device_version.trim() == FACTORY_PLACEHOLDER {
        return Ok(OtaOutcome::UpToDate);
    }

    let device =
        VersionTriple::parse(device_version).map_err(|e| ApiError::Validation(e.to_string()))?;

    let project = project_service::find_by_slug(conn, slug)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .ok_or_else(|| ApiError::NotFound(format!("unknown project: {slug}")))?;

    let latest = release_service::latest(conn, project.id, variant)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .ok_or_else(|| ApiError::NotFound(format!("no releases for {slug}/{variant}")))?;

    // Component-wise integer comparison; only a strictly older device
    // gets an update.
    if device >= VersionTriple::new(latest.major, latest.minor, latest.patch) {
        return Ok(OtaOutcome::UpToDate);
    }

    let key = storage::object_key(slug, variant, &latest.version, "manifest.json");
    let bytes = store
        .get(&key)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .ok_or_else(|| {
            ApiError::NotFound(format!(
                "manifest missing for {slug}/{variant}/{}",
                latest.version
            ))
        })?;
    let document = manifest::parse(&bytes).map_err(|e| ApiError::Internal(e.to_string()))?;

    let Some(path) = select_app_binary(slug, &document) else {
        return Err(ApiError::NotFound(format!(
            "no application binary for project {slug} in manifest {variant}/{}",
            latest.version
        )));
    };

    let base = config.release_base_url(slug, variant, &latest.version);
    Ok(OtaOutcome::UpdateAvailable {
        ota_url: format!("{base}{path}"),
    })
}

/// Pick the application binary out of a manifest's first build: the first
/// part whose normalized path contains the normalized project slug.
///
/// Normalization lower-cases and maps hyphens to underscores, so
/// `widget-fw` matches `widget_fw_app.bin`. When several parts match, the
/// first in array order wins.
pub fn select_app_binary<'a>(slug: &str, document: &'a manifest::Manifest) -> Option<&'a str> {
    let needle = normalize(slug);
    let build = document.builds.first()?;
    build
        .parts
        .iter()
        .find(|part| normalize(&part.path).contains(&needle))
        .map(|part| part.path.as_str())
}

fn normalize(s: &str) -> String {
    s.to_lowercase().replace('-', "_")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::manifest::parse;

    fn manifest_with_parts(parts: &[&str]) -> manifest::Manifest {
        let parts: Vec<String> = parts
            .iter()
            .map(|p| format!(r#"{{"path": "{p}", "offset": 0}}"#))
            .collect();
        let doc = format!(
            r#"{{"builds": [{{"chipFamily": "ESP32", "parts": [{}]}}]}}"#,
            parts.join(",")
        );
        parse(doc.as_bytes()).unwrap()
    }

    #[test]
    fn matches_the_application_binary_by_slug_substring() {
        let document = manifest_with_parts(&[
            "bootloader.bin",
            "partition-table.bin",
            "WIDGET_FW_app.bin",
        ]);
        assert_eq!(
            select_app_binary("widget-fw", &document),
            Some("WIDGET_FW_app.bin")
        );
    }

    #[test]
    fn hyphens_and_case_normalize_both_ways() {
        let document = manifest_with_parts(&["acme-sensor-v2.bin"]);
        assert_eq!(
            select_app_binary("ACME_SENSOR-V2", &document),
            Some("acme-sensor-v2.bin")
        );
    }

    #[test]
    fn first_match_in_array_order_wins() {
        let document =
            manifest_with_parts(&["widget_fw_factory.bin", "widget_fw_app.bin"]);
        assert_eq!(
            select_app_binary("widget-fw", &document),
            Some("widget_fw_factory.bin")
        );
    }

    #[test]
    fn only_the_first_build_is_considered() {
        let doc = br#"{
            "builds": [
                {"parts": [{"path": "other.bin", "offset": 0}]},
                {"parts": [{"path": "widget_fw_app.bin", "offset": 0}]}
            ]
        }"#;
        let document = parse(doc).unwrap();
        assert_eq!(select_app_binary("widget-fw", &document), None);
    }

    #[test]
    fn no_match_yields_none() {
        let document = manifest_with_parts(&["bootloader.bin"]);
        assert_eq!(select_app_binary("widget-fw", &document), None);
        assert_eq!(select_app_binary("widget-fw", &parse(b"{}").unwrap()), None);
    }
}
