use crate::config::S3Config;
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::Builder as S3ConfigBuilder;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::types::ObjectCannedAcl;
use aws_sdk_s3::Client as S3Client;
use thiserror::Error;
use tracing::{debug, info, instrument};

/// Errors returned by a storage backend
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to list objects under {prefix:?}: {message}")]
    List { prefix: String, message: String },

    #[error("Failed to get object {key}: {message}")]
    Get { key: String, message: String },

    #[error("Failed to copy {source_key} to {destination}: {message}")]
    Copy {
        destination: String,
        source_key: String,
        message: String,
    },

    #[error("Precondition failed writing {0}")]
    PreconditionFailed(String),

    #[error("Conditional writes are not supported by this storage backend")]
    ConditionalWriteUnsupported,
}

/// A listed object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobDescriptor {
    pub key: String,
}

impl BlobDescriptor {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

/// Contents of a fetched object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub data: Vec<u8>,
    pub etag: Option<String>,
}

/// Access policy applied to written objects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessPolicy {
    /// Readable by anyone through the public bucket URL
    PublicRead,
}

/// Precondition for a conditional write
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteCondition {
    /// Destination must still carry this ETag
    IfMatch(String),
    /// Destination must not exist yet
    IfAbsent,
}

/// Key/value blob store holding release artifacts and manifests
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StorageGateway: Send + Sync {
    /// Public URL prefix for objects, ending in `/`
    fn public_base_url(&self) -> String;

    /// List every object under a prefix
    async fn list(&self, prefix: &str) -> Result<Vec<BlobDescriptor>, StorageError>;

    /// Fetch an object; a missing key is `None`
    async fn get(&self, key: &str) -> Result<Option<StoredObject>, StorageError>;

    /// Copy an object within the bucket, overwriting the destination
    async fn put_copy(
        &self,
        destination: &str,
        source_key: &str,
        policy: AccessPolicy,
    ) -> Result<(), StorageError>;

    fn supports_conditional_write(&self) -> bool {
        false
    }

    /// Copy an object only if the destination still satisfies `condition`
    async fn put_copy_if_match(
        &self,
        _destination: &str,
        _source_key: &str,
        _policy: AccessPolicy,
        _condition: &WriteCondition,
    ) -> Result<(), StorageError> {
        Err(StorageError::ConditionalWriteUnsupported)
    }
}

/// S3-backed storage gateway
pub struct S3Gateway {
    client: S3Client,
    bucket: String,
    public_base_url: String,
}

impl S3Gateway {
    /// Create a new S3 gateway
    pub async fn new(config: &S3Config) -> Self {
        let aws_config = aws_config::defaults(BehaviorVersion::latest())
            .region(aws_config::Region::new(config.region.clone()))
            .load()
            .await;

        let mut s3_config_builder = S3ConfigBuilder::from(&aws_config);

        // Custom endpoint for MinIO/LocalStack
        if let Some(ref endpoint_url) = config.endpoint_url {
            s3_config_builder = s3_config_builder.endpoint_url(endpoint_url);
        }

        if config.force_path_style {
            s3_config_builder = s3_config_builder.force_path_style(true);
        }

        let client = S3Client::from_conf(s3_config_builder.build());

        info!(
            bucket = %config.bucket,
            region = %config.region,
            "S3 gateway initialized"
        );

        Self {
            client,
            bucket: config.bucket.clone(),
            public_base_url: bucket_url(&config.public_base_url, &config.bucket),
        }
    }
}

#[async_trait]
impl StorageGateway for S3Gateway {
    fn public_base_url(&self) -> String {
        self.public_base_url.clone()
    }

    #[instrument(skip(self))]
    async fn list(&self, prefix: &str) -> Result<Vec<BlobDescriptor>, StorageError> {
        let mut blobs = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let response = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(prefix)
                .set_continuation_token(continuation_token.take())
                .send()
                .await
                .map_err(|e| StorageError::List {
                    prefix: prefix.to_string(),
                    message: DisplayErrorContext(e).to_string(),
                })?;

            blobs.extend(
                response
                    .contents()
                    .iter()
                    .filter_map(|obj| obj.key().map(BlobDescriptor::new)),
            );

            match response.next_continuation_token() {
                Some(token) if response.is_truncated().unwrap_or(false) => {
                    continuation_token = Some(token.to_string());
                }
                _ => break,
            }
        }

        debug!(prefix = %prefix, count = blobs.len(), "Listed objects");
        Ok(blobs)
    }

    #[instrument(skip(self))]
    async fn get(&self, key: &str) -> Result<Option<StoredObject>, StorageError> {
        let response = match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                if e.as_service_error()
                    .map(|e| e.is_no_such_key())
                    .unwrap_or(false)
                {
                    return Ok(None);
                }
                return Err(StorageError::Get {
                    key: key.to_string(),
                    message: DisplayErrorContext(e).to_string(),
                });
            }
        };

        let etag = response.e_tag().map(String::from);
        let data = response
            .body
            .collect()
            .await
            .map_err(|e| StorageError::Get {
                key: key.to_string(),
                message: e.to_string(),
            })?
            .into_bytes()
            .to_vec();

        Ok(Some(StoredObject { data, etag }))
    }

    #[instrument(skip(self))]
    async fn put_copy(
        &self,
        destination: &str,
        source_key: &str,
        policy: AccessPolicy,
    ) -> Result<(), StorageError> {
        let acl = match policy {
            AccessPolicy::PublicRead => ObjectCannedAcl::PublicRead,
        };

        self.client
            .copy_object()
            .bucket(&self.bucket)
            .key(destination)
            .copy_source(copy_source(&self.bucket, source_key))
            .acl(acl)
            .send()
            .await
            .map_err(|e| StorageError::Copy {
                destination: destination.to_string(),
                source_key: source_key.to_string(),
                message: DisplayErrorContext(e).to_string(),
            })?;

        debug!(destination = %destination, source = %source_key, "Object copied");
        Ok(())
    }
}

/// Public URL of a bucket, ending in `/`
fn bucket_url(base: &str, bucket: &str) -> String {
    format!("{}/{}/", base.trim_end_matches('/'), bucket)
}

/// `CopySource` value: bucket and URL-encoded key, with `/` kept between segments
fn copy_source(bucket: &str, key: &str) -> String {
    let encoded: Vec<_> = key.split('/').map(urlencoding::encode).collect();
    format!("{}/{}", bucket, encoded.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_url() {
        assert_eq!(
            bucket_url("https://s3.amazonaws.com", "prerelease"),
            "https://s3.amazonaws.com/prerelease/"
        );
        assert_eq!(
            bucket_url("http://localhost:9000/", "prerelease"),
            "http://localhost:9000/prerelease/"
        );
    }

    #[test]
    fn test_copy_source_encodes_segments() {
        assert_eq!(
            copy_source("prerelease", "darwin/App-1.0.14-20160215154242+ab3d4f1.dmg"),
            "prerelease/darwin/App-1.0.14-20160215154242%2Bab3d4f1.dmg"
        );
        assert_eq!(
            copy_source("prerelease", "darwin-support/update darwin.json"),
            "prerelease/darwin-support/update%20darwin.json"
        );
    }

    #[tokio::test]
    async fn test_conditional_write_unsupported_by_default() {
        struct ReadOnly;

        #[async_trait]
        impl StorageGateway for ReadOnly {
            fn public_base_url(&self) -> String {
                String::new()
            }
            async fn list(&self, _prefix: &str) -> Result<Vec<BlobDescriptor>, StorageError> {
                Ok(vec![])
            }
            async fn get(&self, _key: &str) -> Result<Option<StoredObject>, StorageError> {
                Ok(None)
            }
            async fn put_copy(
                &self,
                _destination: &str,
                _source_key: &str,
                _policy: AccessPolicy,
            ) -> Result<(), StorageError> {
                Ok(())
            }
        }

        let gateway = ReadOnly;
        assert!(!gateway.supports_conditional_write());
        let result = gateway
            .put_copy_if_match("a", "b", AccessPolicy::PublicRead, &WriteCondition::IfAbsent)
            .await;
        assert!(matches!(result, Err(StorageError::ConditionalWriteUnsupported)));
    }
}
