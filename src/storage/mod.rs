//! Object store capability used by the publisher.
//!
//! The publisher only needs three calls: stream a local file to a key, put a small
//! in-memory body, and read an object back. `S3Store` talks to any S3-compatible
//! endpoint; `memory::MemoryStore` backs the tests.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

#[cfg(test)]
pub mod memory;
mod s3;

pub use s3::S3Store;

/// User metadata attached to an uploaded object (`x-amz-meta-*`).
pub type ObjectMetadata = BTreeMap<String, String>;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{operation} {key}: {message}")]
    Request {
        operation: &'static str,
        key: String,
        message: String,
    },

    #[error("failed to read response body for {key}: {message}")]
    Body { key: String, message: String },
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Bucket every key is resolved against.
    fn bucket(&self) -> &str;

    /// Stream the file at `path` to `key`, replacing any existing object.
    async fn put_file(
        &self,
        key: &str,
        path: &Path,
        content_type: &str,
        metadata: &ObjectMetadata,
    ) -> Result<(), StorageError>;

    /// Store `body` at `key`, replacing any existing object.
    async fn put_object(
        &self,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError>;

    /// Fetch the object at `key`. Returns `None` if it does not exist.
    async fn get_object(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;
}
