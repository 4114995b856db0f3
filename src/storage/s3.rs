use std::path::Path;
use std::time::Duration;

use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::config::Credentials;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;

use super::{ObjectStore, StorageError};
use crate::config::Config;

pub struct S3ObjectStore {
    client: aws_sdk_s3::Client,
    bucket: String,
    presign_expiry: Duration,
}

impl S3ObjectStore {
    pub async fn from_config(config: &Config) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.s3_region.clone()));

        if let (Some(access_key), Some(secret_key)) =
            (&config.aws_access_key_id, &config.aws_secret_access_key)
        {
            loader = loader.credentials_provider(Credentials::new(
                access_key.clone(),
                secret_key.clone(),
                None,
                None,
                "environment",
            ));
        }

        if let Some(endpoint) = &config.s3_endpoint_url {
            loader = loader.endpoint_url(endpoint.clone());
        }

        let sdk_config = loader.load().await;
        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(config.s3_endpoint_url.is_some())
            .build();

        tracing::info!(
            bucket = %config.s3_bucket,
            region = %config.s3_region,
            static_credentials = config.has_static_credentials(),
            custom_endpoint = config.s3_endpoint_url.is_some(),
            "S3 object store initialized"
        );

        Self {
            client: aws_sdk_s3::Client::from_conf(s3_config),
            bucket: config.s3_bucket.clone(),
            presign_expiry: Duration::from_secs(config.presign_expiry_secs),
        }
    }
}

fn classify_sdk_error(key: &str, message: String) -> StorageError {
    let lower = message.to_lowercase();
    if lower.contains("credential") || lower.contains("invalidaccesskeyid") {
        StorageError::Credentials(message)
    } else {
        StorageError::Upload {
            key: key.to_string(),
            reason: message,
        }
    }
}

#[async_trait::async_trait]
impl ObjectStore for S3ObjectStore {
    #[tracing::instrument(
        name = "storage upload",
        skip(self, local_path),
        fields(storage.bucket = %self.bucket, storage.key = %key)
    )]
    async fn upload(&self, local_path: &Path, key: &str) -> Result<String, StorageError> {
        let body = ByteStream::from_path(local_path)
            .await
            .map_err(|e| StorageError::LocalFile {
                path: local_path.to_path_buf(),
                reason: e.to_string(),
            })?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type("application/pdf")
            .body(body)
            .send()
            .await
            .map_err(|e| classify_sdk_error(key, DisplayErrorContext(&e).to_string()))?;

        let presigning =
            PresigningConfig::expires_in(self.presign_expiry).map_err(|e| StorageError::Presign {
                key: key.to_string(),
                reason: e.to_string(),
            })?;

        let presigned = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presigning)
            .await
            .map_err(|e| match classify_sdk_error(key, DisplayErrorContext(&e).to_string()) {
                StorageError::Upload { key, reason } => StorageError::Presign { key, reason },
                other => other,
            })?;

        tracing::debug!(expires_in_secs = self.presign_expiry.as_secs(), "Object uploaded");

        Ok(presigned.uri().to_string())
    }
}
