use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region, RequestChecksumCalculation};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use log::debug;

use super::{ObjectMetadata, ObjectStore, StorageError};
use crate::env::StoreConfig;

/// R2 does not partition by region; the SDK still needs one for SigV4.
const REGION: &str = "auto";
const CREDENTIALS_SOURCE: &str = "r2-environment";

/// S3-compatible store (Cloudflare R2, MinIO, AWS) addressed with static credentials.
#[derive(Clone, Debug)]
pub struct S3Store {
    client: Client,
    bucket: String,
}

impl S3Store {
    pub fn connect(config: &StoreConfig) -> Self {
        let credentials = Credentials::new(
            config.access_key_id.clone(),
            config.secret_access_key.clone(),
            None,
            None,
            CREDENTIALS_SOURCE,
        );
        let sdk_config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(REGION))
            .endpoint_url(config.endpoint_base())
            .credentials_provider(credentials)
            .force_path_style(true)
            // R2 rejects some of the default flexible checksums on PutObject.
            .request_checksum_calculation(RequestChecksumCalculation::WhenRequired)
            .build();
        debug!(
            "s3: client for bucket {} at {}",
            config.bucket,
            config.endpoint_base()
        );

        Self {
            client: Client::from_conf(sdk_config),
            bucket: config.bucket.clone(),
        }
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn put_file(
        &self,
        key: &str,
        path: &Path,
        content_type: &str,
        metadata: &ObjectMetadata,
    ) -> Result<(), StorageError> {
        let body = ByteStream::from_path(path)
            .await
            .map_err(|e| StorageError::Read {
                path: path.to_path_buf(),
                source: std::io::Error::other(e),
            })?;
        let metadata: HashMap<String, String> = metadata
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .set_metadata(Some(metadata))
            .body(body)
            .send()
            .await
            .map_err(|e| StorageError::Request {
                operation: "PutObject",
                key: key.to_owned(),
                message: DisplayErrorContext(&e).to_string(),
            })?;
        Ok(())
    }

    async fn put_object(
        &self,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| StorageError::Request {
                operation: "PutObject",
                key: key.to_owned(),
                message: DisplayErrorContext(&e).to_string(),
            })?;
        Ok(())
    }

    async fn get_object(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let output = match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(output) => output,
            Err(err)
                if err
                    .as_service_error()
                    .is_some_and(|service| service.is_no_such_key()) =>
            {
                return Ok(None);
            }
            Err(err) => {
                return Err(StorageError::Request {
                    operation: "GetObject",
                    key: key.to_owned(),
                    message: DisplayErrorContext(&err).to_string(),
                });
            }
        };

        let data = output
            .body
            .collect()
            .await
            .map_err(|e| StorageError::Body {
                key: key.to_owned(),
                message: e.to_string(),
            })?;
        Ok(Some(data.into_bytes().to_vec()))
    }
}
