use std::fmt;

// Stages of a single publish run, in the order they execute.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PublishStage {
    ValidateEnv,
    ValidateFile,
    Hash,
    BuildKeys,
    UploadVersioned,
    UploadLatest,
    UpdateManifest,
    Done,
}

impl PublishStage {
    pub fn label(self) -> &'static str {
        match self {
            PublishStage::ValidateEnv => "validate environment",
            PublishStage::ValidateFile => "validate file",
            PublishStage::Hash => "hash file",
            PublishStage::BuildKeys => "build object keys",
            PublishStage::UploadVersioned => "upload versioned object",
            PublishStage::UploadLatest => "upload latest object",
            PublishStage::UpdateManifest => "update manifest",
            PublishStage::Done => "done",
        }
    }
}

impl fmt::Display for PublishStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Result of the best-effort manifest step.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ManifestStatus {
    Updated { platforms: usize },
    Failed(String),
}
