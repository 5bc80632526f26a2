//! Firmware manifest parsing, canonicalization, and serve-time rewriting.
//!
//! A manifest lists one or more build targets, each with binary parts and
//! flash offsets. The canonical form (relative paths, canonical chip
//! spellings) is stored once per (project, variant, version); absolute
//! download URLs are substituted only when the document is served, so a
//! changed public base URL never forces re-ingestion.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ManifestError {
    /// Malformed JSON is a hard failure for the ingestion task.
    #[error("malformed manifest JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

static CHIP_FAMILY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^esp32(?:([a-z])([0-9]))?$").unwrap());

/// Unknown fields ride along in `extra` so canonical storage round-trips
/// keys this service does not interpret.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default)]
    pub builds: Vec<Build>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Build {
    #[serde(rename = "chipFamily", default, skip_serializing_if = "Option::is_none")]
    pub chip_family: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Part {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<u64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Decode manifest bytes.
pub fn parse(bytes: &[u8]) -> Result<Manifest, ManifestError> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Canonical chip-family spelling: `esp32` becomes `ESP32`, `esp32c3`
/// becomes `ESP32-C3`. Strings outside that shape pass through unchanged.
pub fn canonical_chip_family(raw: &str) -> String {
    match CHIP_FAMILY.captures(raw) {
        Some(caps) => match (caps.get(1), caps.get(2)) {
            (Some(letter), Some(digit)) => {
                format!("ESP32-{}{}", letter.as_str().to_uppercase(), digit.as_str())
            }
            _ => "ESP32".to_string(),
        },
        None => raw.to_string(),
    }
}

/// Rewrite every build's chip family to its canonical spelling.
pub fn canonicalize(manifest: &mut Manifest) {
    for build in &mut manifest.builds {
        if let Some(family) = &build.chip_family {
            build.chip_family = Some(canonical_chip_family(family));
        }
    }
}

/// Distinct part paths across all builds, first-seen order. These are the
/// filenames that must exist among the release's upstream assets.
pub fn referenced_paths(manifest: &Manifest) -> Vec<String> {
    let mut paths: Vec<String> = Vec::new();
    for build in &manifest.builds {
        for part in &build.parts {
            if !paths.iter().any(|p| p == &part.path) {
                paths.push(part.path.clone());
            }
        }
    }
    paths
}

/// Serve-time copy with every relative part path prefixed by `base`.
/// Paths that already carry a URL scheme are left alone. The canonical
/// stored document is never mutated.
pub fn rewrite_download_urls(manifest: &Manifest, base: &str) -> Manifest {
    let mut served = manifest.clone();
    for build in &mut served.builds {
        for part in &mut build.parts {
            if !has_url_scheme(&part.path) {
                part.path = format!("{base}{}", part.path);
            }
        }
    }
    served
}

fn has_url_scheme(path: &str) -> bool {
    let Some((scheme, _)) = path.split_once("://") else {
        return false;
    };
    let mut chars = scheme.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '.' | '-'))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Manifest {
        parse(
            br#"{
                "name": "Widget",
                "version": "1.2.0",
                "builds": [
                    {
                        "chipFamily": "esp32c3",
                        "parts": [
                            {"path": "WIDGET_bootloader.bin", "offset": 0},
                            {"path": "WIDGET_app.bin", "offset": 65536},
                            {"path": "WIDGET_app.bin", "offset": 65536}
                        ]
                    }
                ]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn canonicalizes_chip_families() {
        assert_eq!(canonical_chip_family("esp32c3"), "ESP32-C3");
        assert_eq!(canonical_chip_family("ESP32C3"), "ESP32-C3");
        assert_eq!(canonical_chip_family("esp32s3"), "ESP32-S3");
        assert_eq!(canonical_chip_family("esp32"), "ESP32");
        assert_eq!(canonical_chip_family("ESP32"), "ESP32");
        assert_eq!(canonical_chip_family("xyz"), "xyz");
        assert_eq!(canonical_chip_family("esp32c"), "esp32c");
        assert_eq!(canonical_chip_family("esp8266"), "esp8266");
    }

    #[test]
    fn canonicalize_rewrites_builds_in_place() {
        let mut manifest = sample();
        canonicalize(&mut manifest);
        assert_eq!(manifest.builds[0].chip_family.as_deref(), Some("ESP32-C3"));
    }

    #[test]
    fn referenced_paths_are_distinct_in_first_seen_order() {
        assert_eq!(
            referenced_paths(&sample()),
            vec!["WIDGET_bootloader.bin", "WIDGET_app.bin"]
        );
    }

    #[test]
    fn rewrite_prefixes_relative_paths_only() {
        let mut manifest = sample();
        manifest.builds[0].parts[0].path = "https://cdn.example.com/boot.bin".to_string();

        let served = rewrite_download_urls(
            &manifest,
            "http://localhost:8080/firmware/widget-fw/WIDGET/1.2.0/",
        );

        assert_eq!(served.builds[0].parts[0].path, "https://cdn.example.com/boot.bin");
        assert_eq!(
            served.builds[0].parts[1].path,
            "http://localhost:8080/firmware/widget-fw/WIDGET/1.2.0/WIDGET_app.bin"
        );
        // Canonical document untouched.
        assert_eq!(manifest.builds[0].parts[1].path, "WIDGET_app.bin");
    }

    #[test]
    fn unknown_fields_survive_a_round_trip() {
        let manifest = parse(br#"{"builds": [], "funding": "none", "new_install_prompt_erase": true}"#).unwrap();
        let out = serde_json::to_value(&manifest).unwrap();
        assert_eq!(out["funding"], "none");
        assert_eq!(out["new_install_prompt_erase"], true);
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        assert!(parse(b"{not json").is_err());
    }
}
