use std::path::Path;

use log::{debug, info, warn};

use crate::artifact::{self, FileDigest, ObjectKeys, Platform, UploadRequest};
use crate::engine::state::{ManifestStatus, PublishStage};
use crate::env::StoreConfig;
use crate::error::PublishError;
use crate::manifest::{self, DownloadEntry, ManifestUpdate};
use crate::storage::{ObjectMetadata, ObjectStore};
use crate::util;

pub mod state;

/// Public URLs printed after a successful run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DownloadHints {
    pub versioned: String,
    pub latest: String,
    /// False when the URLs are guessed from the API endpoint.
    pub from_public_url: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublishOutcome {
    pub digest: FileDigest,
    pub keys: ObjectKeys,
    pub content_type: &'static str,
    pub manifest: ManifestStatus,
    pub hints: DownloadHints,
    /// Stages passed through, ending with `Done`.
    pub stages: Vec<PublishStage>,
}

/// Run one publish: validate, hash, upload twice, then update the manifest.
///
/// Configuration comes from `lookup` and the store is only built through `connect`
/// once every local check has passed, so validation failures never touch the network.
/// A failed manifest update is logged and reported in the outcome, not returned as an
/// error.
pub async fn publish<L, C, S>(
    request: &UploadRequest,
    lookup: L,
    connect: C,
) -> Result<PublishOutcome, PublishError>
where
    L: Fn(&str) -> Option<String>,
    C: FnOnce(&StoreConfig) -> S,
    S: ObjectStore,
{
    let mut stages = Vec::new();

    enter(&mut stages, PublishStage::ValidateEnv);
    let config = StoreConfig::from_lookup(lookup)?;

    enter(&mut stages, PublishStage::ValidateFile);
    validate_file(&request.file)?;
    if request.notarized && request.platform != Platform::MacOs {
        warn!(
            "publish: --notarized only applies to macOS builds; ignoring it for {}",
            request.platform
        );
    }

    enter(&mut stages, PublishStage::Hash);
    let digest = artifact::hash_file(&request.file).map_err(|source| PublishError::Hash {
        path: request.file.clone(),
        source,
    })?;
    info!("publish: uploading {}", request.file_name());
    info!("   size: {}", util::format_size(digest.size));
    info!("   sha256: {}", digest.sha256);

    enter(&mut stages, PublishStage::BuildKeys);
    let keys = ObjectKeys::for_request(request);
    let content_type = artifact::content_type(&request.file_name());
    let build_date = util::utc_timestamp();
    let metadata = request.object_metadata(&digest, &build_date);

    let store = connect(&config);
    info!("publish: uploading to bucket {}", store.bucket());

    enter(&mut stages, PublishStage::UploadVersioned);
    info!("   versioned: {}", keys.versioned);
    upload(
        &store,
        PublishStage::UploadVersioned,
        &keys.versioned,
        request,
        content_type,
        &metadata,
    )
    .await?;
    info!("      uploaded");

    enter(&mut stages, PublishStage::UploadLatest);
    info!("   latest: {}", keys.latest);
    upload(
        &store,
        PublishStage::UploadLatest,
        &keys.latest,
        request,
        content_type,
        &metadata,
    )
    .await?;
    info!("      uploaded (replaced previous)");

    enter(&mut stages, PublishStage::UpdateManifest);
    let update = ManifestUpdate {
        version: request.version.clone(),
        release_date: build_date,
        platform_arch: request.platform_arch(),
        entry: DownloadEntry {
            url: config.object_url(&keys.latest),
            size: digest.size,
            sha256: digest.sha256.clone(),
            signed: request.signed,
            notarized: (request.platform == Platform::MacOs).then_some(request.notarized),
        },
    };
    let manifest_status = match manifest::update_manifest(&store, &update).await {
        Ok(manifest) => ManifestStatus::Updated {
            platforms: manifest.downloads.len(),
        },
        Err(err) => {
            warn!("publish: {err}");
            ManifestStatus::Failed(err.to_string())
        }
    };

    enter(&mut stages, PublishStage::Done);
    let hints = DownloadHints {
        versioned: config.public_url_hint(&keys.versioned),
        latest: config.public_url_hint(&keys.latest),
        from_public_url: config.public_url.is_some(),
    };
    Ok(PublishOutcome {
        digest,
        keys,
        content_type,
        manifest: manifest_status,
        hints,
        stages,
    })
}

fn enter(stages: &mut Vec<PublishStage>, stage: PublishStage) {
    debug!("publish: entering stage '{stage}'");
    stages.push(stage);
}

fn validate_file(path: &Path) -> Result<(), PublishError> {
    if !path.exists() {
        return Err(PublishError::FileNotFound(path.to_path_buf()));
    }
    if !path.is_file() {
        return Err(PublishError::NotAFile(path.to_path_buf()));
    }
    Ok(())
}

async fn upload<S: ObjectStore>(
    store: &S,
    stage: PublishStage,
    key: &str,
    request: &UploadRequest,
    content_type: &str,
    metadata: &ObjectMetadata,
) -> Result<(), PublishError> {
    store
        .put_file(key, &request.file, content_type, metadata)
        .await
        .map_err(|source| PublishError::Upload {
            stage,
            key: key.to_owned(),
            source,
        })
}
