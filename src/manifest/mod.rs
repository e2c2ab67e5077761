//! Shared `metadata/latest.json` document consumed by update checkers.
//!
//! Each run overwrites the top-level `version`/`release_date` and replaces only its own
//! `{platform}-{arch}` entry under `downloads`. The read-modify-write is not atomic:
//! two runs racing on the same bucket can drop each other's entries.

use std::collections::BTreeMap;

use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::storage::{ObjectStore, StorageError};

pub const MANIFEST_KEY: &str = "metadata/latest.json";
const MANIFEST_CONTENT_TYPE: &str = "application/json";

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ReleaseManifest {
    pub version: String,
    pub release_date: String,
    /// Entries written by other runs are kept as raw JSON; only this run's entry is typed.
    pub downloads: BTreeMap<String, Value>,
    /// Fields written by other tools; carried through untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DownloadEntry {
    pub url: String,
    pub size: u64,
    pub sha256: String,
    pub signed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notarized: Option<bool>,
}

impl From<&DownloadEntry> for Value {
    fn from(entry: &DownloadEntry) -> Self {
        let mut map = Map::new();
        map.insert("url".into(), Value::from(entry.url.clone()));
        map.insert("size".into(), Value::from(entry.size));
        map.insert("sha256".into(), Value::from(entry.sha256.clone()));
        map.insert("signed".into(), Value::Bool(entry.signed));
        if let Some(notarized) = entry.notarized {
            map.insert("notarized".into(), Value::Bool(notarized));
        }
        Value::Object(map)
    }
}

/// This run's contribution to the manifest.
#[derive(Clone, Debug, PartialEq)]
pub struct ManifestUpdate {
    pub version: String,
    pub release_date: String,
    pub platform_arch: String,
    pub entry: DownloadEntry,
}

#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("could not serialize release manifest: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("could not update {}: {}", MANIFEST_KEY, .0)]
    Write(#[from] StorageError),
}

/// Why an existing manifest body could not be merged into.
#[derive(Debug, thiserror::Error)]
pub enum MalformedManifest {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("top level is not a JSON object")]
    NotAnObject,
    #[error("`downloads` is not a JSON object")]
    DownloadsNotAnObject,
}

impl ReleaseManifest {
    /// Empty manifest carrying only the top-level fields.
    pub fn fresh(version: &str, release_date: &str) -> Self {
        Self {
            version: version.to_owned(),
            release_date: release_date.to_owned(),
            downloads: BTreeMap::new(),
            extra: Map::new(),
        }
    }

    /// Read a stored manifest. Only the overall shape is checked: the body must be an
    /// object and `downloads`, when present, must be an object. Top-level `version` and
    /// `release_date` of any type are accepted since every update replaces them.
    pub fn parse(bytes: &[u8]) -> Result<Self, MalformedManifest> {
        let Value::Object(mut fields) = serde_json::from_slice::<Value>(bytes)? else {
            return Err(MalformedManifest::NotAnObject);
        };
        let downloads = match fields.remove("downloads") {
            None => BTreeMap::new(),
            Some(Value::Object(entries)) => entries.into_iter().collect(),
            Some(_) => return Err(MalformedManifest::DownloadsNotAnObject),
        };
        let version = fields.remove("version").map(text).unwrap_or_default();
        let release_date = fields.remove("release_date").map(text).unwrap_or_default();

        Ok(Self {
            version,
            release_date,
            downloads,
            extra: fields,
        })
    }

    /// Two-space indented JSON.
    pub fn to_pretty_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec_pretty(self)
    }

    /// Typed view of the entry for `platform_arch`, if it has the expected shape.
    pub fn entry(&self, platform_arch: &str) -> Option<DownloadEntry> {
        self.downloads
            .get(platform_arch)
            .and_then(|value| DownloadEntry::deserialize(value).ok())
    }

    /// Apply `update`: the top level always takes the new values, and only the
    /// entry for `update.platform_arch` is replaced.
    pub fn apply(&mut self, update: &ManifestUpdate) {
        self.version = update.version.clone();
        self.release_date = update.release_date.clone();
        self.downloads
            .insert(update.platform_arch.clone(), Value::from(&update.entry));
    }
}

fn text(value: Value) -> String {
    match value {
        Value::String(text) => text,
        other => other.to_string(),
    }
}

/// Merge `update` into whatever `prior` holds. Missing or unreadable input
/// starts from a fresh manifest.
pub fn merge(prior: Option<&[u8]>, update: &ManifestUpdate) -> ReleaseManifest {
    let mut manifest = match prior.map(ReleaseManifest::parse) {
        Some(Ok(manifest)) => manifest,
        Some(Err(err)) => {
            warn!("manifest: existing {MANIFEST_KEY} is malformed ({err}); starting fresh");
            ReleaseManifest::fresh(&update.version, &update.release_date)
        }
        None => ReleaseManifest::fresh(&update.version, &update.release_date),
    };
    manifest.apply(update);
    manifest
}

/// Fetch, merge and store the release manifest.
pub async fn update_manifest<S: ObjectStore + ?Sized>(
    store: &S,
    update: &ManifestUpdate,
) -> Result<ReleaseManifest, ManifestError> {
    let prior = match store.get_object(MANIFEST_KEY).await {
        Ok(Some(bytes)) => Some(bytes),
        Ok(None) => {
            info!("manifest: no existing {MANIFEST_KEY}, creating it");
            None
        }
        Err(err) => {
            warn!("manifest: could not read existing metadata: {err}");
            None
        }
    };

    let manifest = merge(prior.as_deref(), update);
    let body = manifest.to_pretty_json()?;

    info!("manifest: updating {MANIFEST_KEY}");
    store
        .put_object(MANIFEST_KEY, body, MANIFEST_CONTENT_TYPE)
        .await?;
    info!("manifest: updated ({} platforms)", manifest.downloads.len());
    Ok(manifest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::MemoryStore;
    use serde_json::json;

    fn macos_update() -> ManifestUpdate {
        ManifestUpdate {
            version: "1.1.0".into(),
            release_date: "t1".into(),
            platform_arch: "macos-arm64".into(),
            entry: DownloadEntry {
                url: "u2".into(),
                size: 20,
                sha256: "h2".into(),
                signed: false,
                notarized: Some(true),
            },
        }
    }

    const PRIOR: &str = r#"{"version":"1.0.0","release_date":"t0","downloads":{"windows-x64":{"url":"u1","size":10,"sha256":"h1","signed":true}}}"#;

    #[test]
    fn merges_new_platform_alongside_existing_ones() {
        let manifest = merge(Some(PRIOR.as_bytes()), &macos_update());
        let value = serde_json::to_value(&manifest).unwrap();
        assert_eq!(
            value,
            json!({
                "version": "1.1.0",
                "release_date": "t1",
                "downloads": {
                    "windows-x64": {"url": "u1", "size": 10, "sha256": "h1", "signed": true},
                    "macos-arm64": {
                        "url": "u2", "size": 20, "sha256": "h2",
                        "signed": false, "notarized": true
                    }
                }
            })
        );
    }

    #[test]
    fn replaces_only_the_matching_entry() {
        let first = merge(Some(PRIOR.as_bytes()), &macos_update());
        let bytes = first.to_pretty_json().unwrap();

        let mut again = macos_update();
        again.version = "1.2.0".into();
        again.entry.size = 30;
        let second = merge(Some(bytes.as_slice()), &again);

        assert_eq!(second.version, "1.2.0");
        assert_eq!(second.downloads.len(), 2);
        assert_eq!(second.entry("macos-arm64").unwrap().size, 30);
        assert_eq!(second.downloads["windows-x64"], first.downloads["windows-x64"]);
    }

    #[test]
    fn older_version_still_overwrites_top_level() {
        let mut update = macos_update();
        update.version = "0.9.0".into();
        let manifest = merge(Some(PRIOR.as_bytes()), &update);
        assert_eq!(manifest.version, "0.9.0");
        assert_eq!(manifest.release_date, "t1");
    }

    #[test]
    fn missing_or_malformed_prior_starts_fresh() {
        let update = macos_update();
        for prior in [
            None,
            Some(&b"not json"[..]),
            Some(&b"\"a string\""[..]),
            Some(&br#"{"downloads":[]}"#[..]),
        ] {
            let manifest = merge(prior, &update);
            assert_eq!(manifest.version, "1.1.0");
            assert_eq!(manifest.downloads.len(), 1);
            assert!(manifest.downloads.contains_key("macos-arm64"));
            assert!(manifest.extra.is_empty());
        }
    }

    #[test]
    fn keeps_entries_that_do_not_match_the_current_shape() {
        let priors = [
            r#"{"version":"1.0.0","release_date":"t0","downloads":{"windows-x64":{"url":"u1","size":10,"sha256":"h1"}}}"#,
            r#"{"version":1,"release_date":"t0","downloads":{"windows-x64":{"url":"u1","size":10,"sha256":"h1","signed":true}}}"#,
            r#"{"downloads":{"windows-x64":"https://example.com/old.zip"}}"#,
        ];
        for prior in priors {
            let before: Value = serde_json::from_str(prior).unwrap();
            let manifest = merge(Some(prior.as_bytes()), &macos_update());
            assert_eq!(manifest.version, "1.1.0");
            assert_eq!(manifest.release_date, "t1");
            assert_eq!(
                manifest.downloads.get("windows-x64"),
                Some(&before["downloads"]["windows-x64"]),
                "lost windows-x64 from {prior}"
            );
            assert_eq!(manifest.entry("macos-arm64"), Some(macos_update().entry));
        }
    }

    #[test]
    fn non_object_bodies_are_malformed() {
        assert!(matches!(
            ReleaseManifest::parse(b"[1, 2]"),
            Err(MalformedManifest::NotAnObject)
        ));
        assert!(matches!(
            ReleaseManifest::parse(br#"{"downloads": []}"#),
            Err(MalformedManifest::DownloadsNotAnObject)
        ));
        assert!(matches!(
            ReleaseManifest::parse(b"{"),
            Err(MalformedManifest::Json(_))
        ));
    }

    #[test]
    fn write_error_names_the_manifest_key() {
        let err = ManifestError::Write(StorageError::Request {
            operation: "PutObject",
            key: MANIFEST_KEY.into(),
            message: "denied".into(),
        });
        assert_eq!(
            err.to_string(),
            format!("could not update {MANIFEST_KEY}: PutObject {MANIFEST_KEY}: denied")
        );
    }

    #[test]
    fn keeps_unknown_fields_from_other_writers() {
        let prior = br#"{
            "version": "1.0.0",
            "release_date": "t0",
            "channel": "stable",
            "downloads": {
                "windows-x64": {"url": "u1", "size": 10, "sha256": "h1", "signed": true, "min_os": "10"}
            }
        }"#;
        let manifest = merge(Some(&prior[..]), &macos_update());
        let value = serde_json::to_value(&manifest).unwrap();
        assert_eq!(value["channel"], "stable");
        assert_eq!(value["downloads"]["windows-x64"]["min_os"], "10");
    }

    #[test]
    fn windows_entry_omits_notarized() {
        let mut update = macos_update();
        update.platform_arch = "windows-x64".into();
        update.entry.notarized = None;
        let manifest = merge(None, &update);
        let value = serde_json::to_value(&manifest).unwrap();
        assert!(value["downloads"]["windows-x64"].get("notarized").is_none());
    }

    #[test]
    fn pretty_json_uses_two_space_indent() {
        let manifest = ReleaseManifest::fresh("1.0.0", "t0");
        let text = String::from_utf8(manifest.to_pretty_json().unwrap()).unwrap();
        assert!(text.starts_with("{\n  \"version\": \"1.0.0\""));
    }

    #[tokio::test]
    async fn stores_merged_manifest() {
        let store = MemoryStore::new().with_object(MANIFEST_KEY, PRIOR);
        let manifest = update_manifest(&store, &macos_update()).await.unwrap();

        let stored = store.object(MANIFEST_KEY).unwrap();
        assert_eq!(stored.content_type, "application/json");
        assert_eq!(ReleaseManifest::parse(&stored.body).unwrap(), manifest);
        assert_eq!(manifest.downloads.len(), 2);
        assert_eq!(
            store.calls(),
            vec![format!("get {MANIFEST_KEY}"), format!("put {MANIFEST_KEY}")]
        );
    }

    #[tokio::test]
    async fn read_failure_falls_back_to_fresh_manifest() {
        let store = MemoryStore::new()
            .with_object(MANIFEST_KEY, PRIOR)
            .failing_reads();
        let manifest = update_manifest(&store, &macos_update()).await.unwrap();
        assert_eq!(manifest.downloads.len(), 1);
        assert!(!manifest.downloads.contains_key("windows-x64"));
    }

    #[tokio::test]
    async fn write_failure_is_reported() {
        let store = MemoryStore::new().failing_writes_to(MANIFEST_KEY);
        let err = update_manifest(&store, &macos_update()).await.unwrap_err();
        assert!(matches!(err, ManifestError::Write(_)));
        assert!(store.object(MANIFEST_KEY).is_none());
    }
}
