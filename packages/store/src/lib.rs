#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Document store contract for quiet-map.
//!
//! All durable state lives in an external key-value store of JSON
//! documents, grouped into logical namespaces. The store provides
//! per-document atomic put/get/delete and an unordered complete listing —
//! no transactions, no secondary indexes. Callers must never depend on
//! listing order.
//!
//! Two backends implement the contract: [`MemoryStore`] for tests and
//! local runs, and [`BlobStore`] backed by Cloudflare R2 via the
//! S3-compatible API.

mod blob;
mod memory;

pub use blob::BlobStore;
pub use memory::MemoryStore;

use async_trait::async_trait;

/// Errors from the document store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Missing required environment variable.
    #[error("Missing environment variable: {name}")]
    MissingEnv {
        /// Name of the missing environment variable.
        name: String,
    },

    /// Write failed.
    #[error("Failed to put {namespace}/{key}: {source}")]
    Put {
        /// Namespace name.
        namespace: String,
        /// Document key.
        key: String,
        /// Underlying backend error.
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Write with `overwrite = false` hit an existing document.
    #[error("Document already exists: {namespace}/{key}")]
    AlreadyExists {
        /// Namespace name.
        namespace: String,
        /// Document key.
        key: String,
    },

    /// Read failed (for reasons other than the document being absent).
    #[error("Failed to get {namespace}/{key}: {source}")]
    Get {
        /// Namespace name.
        namespace: String,
        /// Document key.
        key: String,
        /// Underlying backend error.
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Delete failed.
    #[error("Failed to delete {namespace}/{key}: {source}")]
    Delete {
        /// Namespace name.
        namespace: String,
        /// Document key.
        key: String,
        /// Underlying backend error.
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Listing failed.
    #[error("Failed to list {namespace}: {source}")]
    List {
        /// Namespace name.
        namespace: String,
        /// Underlying backend error.
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Namespace creation failed.
    #[error("Failed to ensure namespace {namespace}: {source}")]
    EnsureNamespace {
        /// Namespace name.
        namespace: String,
        /// Underlying backend error.
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// Key-value store of JSON documents grouped into namespaces.
///
/// Implementations provide at most per-document atomicity. The core logic
/// built on top never retries silently; retry policy, if any, belongs to
/// the backend.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Writes a document. With `overwrite = false` the write fails with
    /// [`StoreError::AlreadyExists`] if the key is already present.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Put`] or [`StoreError::AlreadyExists`].
    async fn put(
        &self,
        namespace: &str,
        key: &str,
        bytes: &[u8],
        overwrite: bool,
    ) -> Result<(), StoreError>;

    /// Reads a document. Returns `None` if the key does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Get`] on backend failures.
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Deletes a document. Deleting an absent key succeeds (idempotent).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Delete`] on backend failures.
    async fn delete(&self, namespace: &str, key: &str) -> Result<(), StoreError>;

    /// Lists every key in a namespace — a complete snapshot at call time,
    /// in no particular order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::List`] on backend failures.
    async fn list(&self, namespace: &str) -> Result<Vec<String>, StoreError>;

    /// Creates the namespace if it does not already exist (idempotent).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::EnsureNamespace`] on backend failures.
    async fn ensure_namespace(&self, namespace: &str) -> Result<(), StoreError>;
}
