use crate::domain::ports::ObjectStore;
use crate::utils::error::{EtlError, Result};
use std::path::{Path, PathBuf};

/// Object store backed by a local directory; keys are relative paths.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    pub fn new<P: AsRef<Path>>(base_path: P) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
        }
    }

    fn full_path(&self, key: &str) -> PathBuf {
        self.base_path.join(key)
    }
}

impl ObjectStore for LocalStorage {
    async fn put_object(&self, key: &str, data: &[u8], replace: bool) -> Result<()> {
        let full_path = self.full_path(key);

        if !replace && tokio::fs::try_exists(&full_path).await? {
            return Err(EtlError::StorageError {
                message: format!("The key {} already exists.", key),
            });
        }
        if let Some(parent) = full_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        tokio::fs::write(full_path, data).await?;
        Ok(())
    }

    async fn head_object(&self, key: &str) -> Result<Option<u64>> {
        match tokio::fs::metadata(self.full_path(key)).await {
            Ok(meta) if meta.is_file() => Ok(Some(meta.len())),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn read_object(&self, key: &str) -> Result<Vec<u8>> {
        Ok(tokio::fs::read(self.full_path(key)).await?)
    }

    fn describe(&self, key: &str) -> String {
        self.full_path(key).display().to_string()
    }
}

#[cfg(feature = "aws")]
pub use s3::S3Storage;

#[cfg(feature = "aws")]
mod s3 {
    use crate::domain::ports::ObjectStore;
    use crate::utils::error::{EtlError, Result};
    use aws_sdk_s3::error::ProvideErrorMetadata;
    use aws_sdk_s3::operation::head_object::HeadObjectError;
    use aws_sdk_s3::Client as S3Client;

    #[derive(Debug, Clone)]
    pub struct S3Storage {
        client: S3Client,
        bucket: String,
    }

    impl S3Storage {
        pub fn new(client: S3Client, bucket: String) -> Self {
            Self { client, bucket }
        }

        /// Client from the default credential chain, pinned to `region`.
        pub async fn from_env(bucket: String, region: String) -> Self {
            let shared = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
            let config = aws_sdk_s3::config::Builder::from(&shared)
                .region(aws_sdk_s3::config::Region::new(region))
                .force_path_style(true)
                .build();
            Self::new(S3Client::from_conf(config), bucket)
        }
    }

    fn storage_error(action: &str, key: &str, code: Option<&str>, detail: impl std::fmt::Display) -> EtlError {
        EtlError::StorageError {
            message: format!(
                "Failed to {} {}: {} ({})",
                action,
                key,
                detail,
                code.unwrap_or("no error code")
            ),
        }
    }

    impl ObjectStore for S3Storage {
        async fn put_object(&self, key: &str, data: &[u8], replace: bool) -> Result<()> {
            if !replace && self.head_object(key).await?.is_some() {
                return Err(EtlError::StorageError {
                    message: format!("The key {} already exists.", key),
                });
            }

            self.client
                .put_object()
                .bucket(&self.bucket)
                .key(key)
                .content_type("text/csv")
                .body(data.to_vec().into())
                .send()
                .await
                .map_err(|e| {
                    let e = e.into_service_error();
                    storage_error("write", key, e.code(), &e)
                })?;
            Ok(())
        }

        async fn head_object(&self, key: &str) -> Result<Option<u64>> {
            let result = self
                .client
                .head_object()
                .bucket(&self.bucket)
                .key(key)
                .send()
                .await;

            match result {
                Ok(output) => Ok(Some(
                    output.content_length().unwrap_or_default().max(0) as u64,
                )),
                Err(err) => match err.into_service_error() {
                    HeadObjectError::NotFound(_) => Ok(None),
                    err => Err(storage_error("head", key, err.code(), &err)),
                },
            }
        }

        async fn read_object(&self, key: &str) -> Result<Vec<u8>> {
            let resp = self
                .client
                .get_object()
                .bucket(&self.bucket)
                .key(key)
                .send()
                .await
                .map_err(|e| {
                    let e = e.into_service_error();
                    storage_error("read", key, e.code(), &e)
                })?;

            let data = resp
                .body
                .collect()
                .await
                .map_err(|e| storage_error("collect", key, None, e))?;
            Ok(data.into_bytes().to_vec())
        }

        fn describe(&self, key: &str) -> String {
            format!("s3://{}/{}", self.bucket, key)
        }
    }
}
