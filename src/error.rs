use std::io;
use std::path::PathBuf;

use crate::engine::state::PublishStage;
use crate::env::REQUIRED_VARS;
use crate::storage::StorageError;

/// Failures that abort a publish run.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error(
        "missing R2 credentials in environment variables: {} (required: {})",
        .missing.join(", "),
        REQUIRED_VARS.join(", ")
    )]
    Config { missing: Vec<&'static str> },

    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("not a regular file: {}", .0.display())]
    NotAFile(PathBuf),

    #[error("failed to hash {}: {source}", .path.display())]
    Hash {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("upload to {key} failed: {source}")]
    Upload {
        stage: PublishStage,
        key: String,
        #[source]
        source: StorageError,
    },
}

impl PublishError {
    /// Stage the run was in when this error stopped it.
    pub fn stage(&self) -> PublishStage {
        match self {
            PublishError::Config { .. } => PublishStage::ValidateEnv,
            PublishError::FileNotFound(_) | PublishError::NotAFile(_) => {
                PublishStage::ValidateFile
            }
            PublishError::Hash { .. } => PublishStage::Hash,
            PublishError::Upload { stage, .. } => *stage,
        }
    }
}
