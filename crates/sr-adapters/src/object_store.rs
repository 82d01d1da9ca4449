//! S3/MinIO-compatible object store adapter (C1).
//!
//! Objects are content-addressed: the key is derived from the
//! enrollment number and the file's SHA-256 checksum, so re-uploading
//! the same bytes for the same student is a no-op write to the same
//! key.

use crate::config::ObjectStoreConfig;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::{
    config::{Builder as S3ConfigBuilder, Region},
    operation::get_object::GetObjectError,
    presigning::PresigningConfig,
    primitives::ByteStream,
    Client as S3Client,
};
use bytes::Bytes;
use sr_ports::{ObjectMetadata, ObjectStore, ObjectStoreError};
use tracing::{debug, info, instrument, warn};

pub struct S3ObjectStore {
    client: S3Client,
    external_client: S3Client,
    bucket: String,
}

impl S3ObjectStore {
    pub async fn connect(config: ObjectStoreConfig) -> Result<Self, ObjectStoreError> {
        let credentials = Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None,
            None,
            "certificate-object-store",
        );

        let s3_config = S3ConfigBuilder::new()
            .endpoint_url(&config.endpoint)
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials.clone())
            .force_path_style(config.force_path_style)
            .behavior_version(BehaviorVersion::latest())
            .build();
        let client = S3Client::from_conf(s3_config);

        let external_endpoint = config
            .external_endpoint
            .clone()
            .unwrap_or_else(|| config.endpoint.clone());
        let external_config = S3ConfigBuilder::new()
            .endpoint_url(&external_endpoint)
            .region(Region::new(config.region))
            .credentials_provider(credentials)
            .force_path_style(config.force_path_style)
            .behavior_version(BehaviorVersion::latest())
            .build();
        let external_client = S3Client::from_conf(external_config);

        let store = Self {
            client,
            external_client,
            bucket: config.bucket,
        };
        store.ensure_bucket().await?;

        info!(bucket = %store.bucket, "object store connected");
        Ok(store)
    }

    async fn ensure_bucket(&self) -> Result<(), ObjectStoreError> {
        match self.client.head_bucket().bucket(&self.bucket).send().await {
            Ok(_) => Ok(()),
            Err(_) => {
                warn!(bucket = %self.bucket, "bucket not found, creating");
                self.client
                    .create_bucket()
                    .bucket(&self.bucket)
                    .send()
                    .await
                    .map_err(|e| ObjectStoreError::UploadFailed {
                        message: format!("failed to create bucket: {e}"),
                    })?;
                Ok(())
            }
        }
    }
}

impl ObjectStore for S3ObjectStore {
    #[instrument(skip(self, bytes, metadata), fields(bucket = %self.bucket, key = %key))]
    async fn upload(
        &self,
        key: &str,
        bytes: Bytes,
        content_type: &str,
        metadata: ObjectMetadata,
    ) -> Result<(), ObjectStoreError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(bytes))
            .content_type(content_type)
            .metadata("enrollment_number", &metadata.enrollment_number)
            .metadata("original_filename", &metadata.original_filename)
            .metadata("checksum", &metadata.checksum)
            .send()
            .await
            .map_err(|e| ObjectStoreError::UploadFailed {
                message: e.to_string(),
            })?;
        debug!("object uploaded");
        Ok(())
    }

    #[instrument(skip(self), fields(bucket = %self.bucket, key = %key))]
    async fn download(&self, key: &str) -> Result<Bytes, ObjectStoreError> {
        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                let service_err = e.into_service_error();
                match &service_err {
                    GetObjectError::NoSuchKey(_) => ObjectStoreError::NotFound {
                        key: key.to_string(),
                    },
                    _ => ObjectStoreError::DownloadFailed {
                        message: service_err.to_string(),
                    },
                }
            })?;

        let data = response
            .body
            .collect()
            .await
            .map_err(|e| ObjectStoreError::DownloadFailed {
                message: e.to_string(),
            })?;
        Ok(data.into_bytes())
    }

    #[instrument(skip(self), fields(bucket = %self.bucket, key = %key))]
    async fn presigned_url(&self, key: &str, expires_in_secs: u64) -> Result<String, ObjectStoreError> {
        let presign_config = PresigningConfig::expires_in(std::time::Duration::from_secs(
            expires_in_secs,
        ))
        .map_err(|e| ObjectStoreError::PresignFailed {
            message: e.to_string(),
        })?;

        let presigned = self
            .external_client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presign_config)
            .await
            .map_err(|e| ObjectStoreError::PresignFailed {
                message: e.to_string(),
            })?;

        Ok(presigned.uri().to_string())
    }
}

/// Content-addressed object key: `certificates/{enrollment_number}/{checksum}.{ext}`.
pub fn object_key(enrollment_number: &str, checksum: &str, extension: &str) -> String {
    format!("certificates/{enrollment_number}/{checksum}.{extension}")
}

/// Extension-to-MIME mapping for the file kinds the intake service accepts.
pub fn content_type_for_extension(extension: &str) -> &'static str {
    match extension.to_lowercase().as_str() {
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "tiff" | "tif" => "image/tiff",
        "bmp" => "image/bmp",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_scheme_matches_enrollment_and_checksum() {
        let key = object_key("2021001234", "abc123", "pdf");
        assert_eq!(key, "certificates/2021001234/abc123.pdf");
    }

    #[test]
    fn content_type_covers_accepted_extensions() {
        assert_eq!(content_type_for_extension("PDF"), "application/pdf");
        assert_eq!(content_type_for_extension("jpg"), "image/jpeg");
        assert_eq!(content_type_for_extension("jpeg"), "image/jpeg");
        assert_eq!(content_type_for_extension("weird"), "application/octet-stream");
    }
}
