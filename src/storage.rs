use std::future::Future;
use std::pin::Pin;

use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::{Builder, Region};
use aws_sdk_s3::primitives::ByteStream;
use thiserror::Error;
use tracing::debug;

use crate::settings::StorageSettings;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage is not configured")]
    NotConfigured,

    #[error("upload failed: {0}")]
    UploadFailed(String),
}

pub type StoreFuture<'a> = Pin<Box<dyn Future<Output = Result<String, StorageError>> + Send + 'a>>;

/// Where finished cards go. `put` persists the encoded bytes under a key and
/// answers a publicly resolvable URL, or writes nothing at all.
pub trait ObjectStore: Send + Sync {
    fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> StoreFuture<'_>;
}

impl ObjectStore for Box<dyn ObjectStore> {
    fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> StoreFuture<'_> {
        (**self).put(key, bytes, content_type)
    }
}

/// S3-compatible store (R2 and friends).
#[derive(Clone)]
pub struct S3Store {
    client: Client,
    bucket: String,
    endpoint_url: String,
    public_base_url: Option<String>,
}

impl S3Store {
    pub fn new(settings: &StorageSettings) -> Self {
        let credentials = Credentials::new(
            &settings.access_key_id,
            &settings.secret_access_key,
            None,
            None,
            "newscard",
        );
        let config = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .endpoint_url(&settings.endpoint_url)
            .region(Region::new(settings.region.clone()))
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();
        Self {
            client: Client::from_conf(config),
            bucket: settings.bucket.clone(),
            endpoint_url: settings.endpoint_url.trim_end_matches('/').to_string(),
            public_base_url: settings
                .public_base_url
                .as_ref()
                .map(|url| url.trim_end_matches('/').to_string()),
        }
    }

    fn public_url(&self, key: &str) -> String {
        match &self.public_base_url {
            Some(base) => format!("{base}/{key}"),
            None => format!("{}/{}/{}", self.endpoint_url, self.bucket, key),
        }
    }
}

impl ObjectStore for S3Store {
    fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> StoreFuture<'_> {
        let key = key.to_string();
        let content_type = content_type.to_string();
        Box::pin(async move {
            debug!(key = %key, size = bytes.len(), "uploading card");
            self.client
                .put_object()
                .bucket(&self.bucket)
                .key(&key)
                .content_type(&content_type)
                .body(ByteStream::from(bytes))
                .send()
                .await
                .map_err(|err| StorageError::UploadFailed(err.to_string()))?;
            Ok(self.public_url(&key))
        })
    }
}

/// Placeholder store for preview-only deployments. Any attempt to persist is
/// an error, which keeps `skip_upload = false` honest instead of silently
/// dropping bytes.
pub struct UnconfiguredStore;

impl ObjectStore for UnconfiguredStore {
    fn put(&self, _key: &str, _bytes: Vec<u8>, _content_type: &str) -> StoreFuture<'_> {
        Box::pin(async { Err(StorageError::NotConfigured) })
    }
}
