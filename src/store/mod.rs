//! Remote object store boundary.
//!
//! The pipeline only needs a handful of bucket operations; [`ObjectStore`]
//! names them so the resolver, tagger, and uploader can run against the AWS
//! CLI in production and an in-memory fake in tests.

mod aws;

pub use aws::{parse_listing, parse_progress, AwsCliStore};

use std::path::Path;

use async_trait::async_trait;
use vfxupload_core::Result;

/// One line of a prefix listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListingEntry {
    /// A common prefix, without the trailing slash.
    Folder(String),
    /// An object directly under the prefix.
    File(String),
}

impl ListingEntry {
    pub fn name(&self) -> &str {
        match self {
            ListingEntry::Folder(name) | ListingEntry::File(name) => name,
        }
    }

    pub fn is_folder(&self) -> bool {
        matches!(self, ListingEntry::Folder(_))
    }
}

/// Upload progress callback, called with a fraction in `0.0..=1.0`.
pub type ProgressFn<'a> = &'a (dyn Fn(f64) + Send + Sync);

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Entries directly under `prefix`. An empty or missing prefix lists as
    /// empty.
    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<ListingEntry>>;

    async fn upload(
        &self,
        local: &Path,
        bucket: &str,
        key: &str,
        metadata: &[(String, String)],
        progress: ProgressFn<'_>,
    ) -> Result<()>;

    async fn download(&self, bucket: &str, key: &str, local: &Path) -> Result<()>;

    async fn copy(&self, bucket: &str, from_key: &str, to_key: &str) -> Result<()>;

    async fn delete(&self, bucket: &str, key: &str) -> Result<()>;

    async fn exists(&self, bucket: &str, key: &str) -> Result<bool>;
}
