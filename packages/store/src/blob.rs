//! Cloudflare R2 backend for the document store.
//!
//! Maps each logical namespace to a key prefix within a single bucket,
//! accessed through the S3-compatible API.
//!
//! # Environment Variables
//!
//! | Variable | Required | Description |
//! |---|---|---|
//! | `CLOUDFLARE_ACCOUNT_ID` | Yes | Cloudflare account ID (builds the R2 endpoint) |
//! | `R2_ACCESS_KEY_ID` | Yes | S3-compatible access key for R2 |
//! | `R2_SECRET_ACCESS_KEY` | Yes | S3-compatible secret key for R2 |

use async_trait::async_trait;
use aws_config::Region;
use aws_sdk_s3::config::{Credentials, StalledStreamProtectionConfig};
use aws_sdk_s3::error::ProvideErrorMetadata;

use crate::{DocumentStore, StoreError};

/// R2 bucket name for noise report data.
const BUCKET: &str = "quiet-map-data";

/// Document store backed by a single R2 bucket.
pub struct BlobStore {
    client: aws_sdk_s3::Client,
}

impl BlobStore {
    /// Creates a new R2-backed store from environment variables.
    ///
    /// Reads `CLOUDFLARE_ACCOUNT_ID`, `R2_ACCESS_KEY_ID`, and
    /// `R2_SECRET_ACCESS_KEY` from the environment.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::MissingEnv`] if any required variable is unset.
    pub fn from_env() -> Result<Self, StoreError> {
        let account_id = require_env("CLOUDFLARE_ACCOUNT_ID")?;
        let access_key = require_env("R2_ACCESS_KEY_ID")?;
        let secret_key = require_env("R2_SECRET_ACCESS_KEY")?;

        let endpoint = format!("https://{account_id}.r2.cloudflarestorage.com");
        let creds = Credentials::new(&access_key, &secret_key, None, None, "r2-env");

        let config = aws_sdk_s3::Config::builder()
            .endpoint_url(&endpoint)
            .region(Region::new("auto"))
            .credentials_provider(creds)
            .force_path_style(true)
            .stalled_stream_protection(StalledStreamProtectionConfig::disabled())
            .build();

        Ok(Self {
            client: aws_sdk_s3::Client::from_conf(config),
        })
    }

    /// Bucket object key for a namespaced document.
    fn object_key(namespace: &str, key: &str) -> String {
        format!("{namespace}/{key}")
    }
}

#[async_trait]
impl DocumentStore for BlobStore {
    async fn put(
        &self,
        namespace: &str,
        key: &str,
        bytes: &[u8],
        overwrite: bool,
    ) -> Result<(), StoreError> {
        let object_key = Self::object_key(namespace, key);
        let body = aws_sdk_s3::primitives::ByteStream::from(bytes.to_vec());

        let mut request = self
            .client
            .put_object()
            .bucket(BUCKET)
            .key(&object_key)
            .body(body)
            .content_type("application/json");

        if !overwrite {
            request = request.if_none_match("*");
        }

        request.send().await.map_err(|err| {
            // Conditional writes fail with 412 when the key exists
            if !overwrite
                && err
                    .as_service_error()
                    .is_some_and(|e| e.code() == Some("PreconditionFailed"))
            {
                StoreError::AlreadyExists {
                    namespace: namespace.to_string(),
                    key: key.to_string(),
                }
            } else {
                StoreError::Put {
                    namespace: namespace.to_string(),
                    key: key.to_string(),
                    source: Box::new(err),
                }
            }
        })?;

        log::debug!("put s3://{BUCKET}/{object_key} ({} bytes)", bytes.len());
        Ok(())
    }

    async fn get(&self, namespace: &str, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let object_key = Self::object_key(namespace, key);

        let result = self
            .client
            .get_object()
            .bucket(BUCKET)
            .key(&object_key)
            .send()
            .await;

        let output = match result {
            Ok(output) => output,
            Err(err) => {
                // NoSuchKey is not an error — the document doesn't exist
                if err
                    .as_service_error()
                    .is_some_and(aws_sdk_s3::operation::get_object::GetObjectError::is_no_such_key)
                {
                    return Ok(None);
                }
                return Err(StoreError::Get {
                    namespace: namespace.to_string(),
                    key: key.to_string(),
                    source: Box::new(err),
                });
            }
        };

        let bytes = output.body.collect().await.map_err(|err| StoreError::Get {
            namespace: namespace.to_string(),
            key: key.to_string(),
            source: Box::new(err),
        })?;

        Ok(Some(bytes.into_bytes().to_vec()))
    }

    async fn delete(&self, namespace: &str, key: &str) -> Result<(), StoreError> {
        let object_key = Self::object_key(namespace, key);

        // S3 DeleteObject is idempotent — deleting an absent key succeeds
        self.client
            .delete_object()
            .bucket(BUCKET)
            .key(&object_key)
            .send()
            .await
            .map_err(|err| StoreError::Delete {
                namespace: namespace.to_string(),
                key: key.to_string(),
                source: Box::new(err),
            })?;

        log::debug!("deleted s3://{BUCKET}/{object_key}");
        Ok(())
    }

    async fn list(&self, namespace: &str) -> Result<Vec<String>, StoreError> {
        let prefix = format!("{namespace}/");

        let mut keys = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let mut request = self
                .client
                .list_objects_v2()
                .bucket(BUCKET)
                .prefix(&prefix);

            if let Some(token) = &continuation_token {
                request = request.continuation_token(token);
            }

            let output = request.send().await.map_err(|err| StoreError::List {
                namespace: namespace.to_string(),
                source: Box::new(err),
            })?;

            for obj in output.contents() {
                if let Some(stripped) = obj.key().and_then(|k| k.strip_prefix(&prefix))
                    && !stripped.is_empty()
                {
                    keys.push(stripped.to_string());
                }
            }

            if output.is_truncated() == Some(true) {
                continuation_token = output.next_continuation_token().map(String::from);
            } else {
                break;
            }
        }

        log::debug!("listed {} documents under s3://{BUCKET}/{prefix}", keys.len());
        Ok(keys)
    }

    async fn ensure_namespace(&self, namespace: &str) -> Result<(), StoreError> {
        // Namespaces are key prefixes within one bucket; nothing to create
        log::debug!("namespace {namespace} maps to prefix s3://{BUCKET}/{namespace}/");
        Ok(())
    }
}

/// Reads a required environment variable.
fn require_env(name: &str) -> Result<String, StoreError> {
    std::env::var(name).map_err(|_| StoreError::MissingEnv {
        name: name.to_string(),
    })
}
