use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use super::{ObjectMetadata, ObjectStore, StorageError};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredObject {
    pub body: Vec<u8>,
    pub content_type: String,
    pub metadata: ObjectMetadata,
}

#[derive(Default)]
struct Inner {
    objects: BTreeMap<String, StoredObject>,
    calls: Vec<String>,
    failing_writes: BTreeSet<String>,
    failing_reads: bool,
}

/// In-process store that records every call. Clones share state.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_object(self, key: &str, body: impl Into<Vec<u8>>) -> Self {
        self.lock().objects.insert(
            key.to_owned(),
            StoredObject {
                body: body.into(),
                content_type: "application/octet-stream".into(),
                metadata: ObjectMetadata::new(),
            },
        );
        self
    }

    /// Make every write to `key` fail.
    pub fn failing_writes_to(self, key: &str) -> Self {
        self.lock().failing_writes.insert(key.to_owned());
        self
    }

    /// Make every read fail.
    pub fn failing_reads(self) -> Self {
        self.lock().failing_reads = true;
        self
    }

    pub fn object(&self, key: &str) -> Option<StoredObject> {
        self.lock().objects.get(key).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        self.lock().objects.keys().cloned().collect()
    }

    /// Calls made so far, as `"{operation} {key}"`.
    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(
        &self,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
        metadata: ObjectMetadata,
    ) -> Result<(), StorageError> {
        let mut inner = self.lock();
        inner.calls.push(format!("put {key}"));
        if inner.failing_writes.contains(key) {
            return Err(StorageError::Request {
                operation: "PutObject",
                key: key.to_owned(),
                message: "injected write failure".into(),
            });
        }
        inner.objects.insert(
            key.to_owned(),
            StoredObject {
                body,
                content_type: content_type.to_owned(),
                metadata,
            },
        );
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    fn bucket(&self) -> &str {
        "memory"
    }

    async fn put_file(
        &self,
        key: &str,
        path: &Path,
        content_type: &str,
        metadata: &ObjectMetadata,
    ) -> Result<(), StorageError> {
        let body = std::fs::read(path).map_err(|source| StorageError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        self.write(key, body, content_type, metadata.clone())
    }

    async fn put_object(
        &self,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError> {
        self.write(key, body, content_type, ObjectMetadata::new())
    }

    async fn get_object(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let mut inner = self.lock();
        inner.calls.push(format!("get {key}"));
        if inner.failing_reads {
            return Err(StorageError::Request {
                operation: "GetObject",
                key: key.to_owned(),
                message: "injected read failure".into(),
            });
        }
        Ok(inner.objects.get(key).map(|object| object.body.clone()))
    }
}
