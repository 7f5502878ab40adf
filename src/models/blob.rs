//! Blob keys and the metadata row stored for each blob.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::{borrow::Borrow, fmt};

const PICTURE_PREFIX: &str = "picture";
const FILE_PREFIX: &str = "file";

/// Opaque identifier of a stored blob, namespaced by a `kind:` prefix
/// (e.g. `picture:3f1c…`, `file:report.pdf`).
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct BlobKey(String);

/// The namespace a key belongs to, derived from the text before the first `:`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BlobNamespace {
    Picture,
    File,
    Other(String),
    Unprefixed,
}

impl BlobKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn namespace(&self) -> BlobNamespace {
        match self.0.split_once(':') {
            Some((PICTURE_PREFIX, _)) => BlobNamespace::Picture,
            Some((FILE_PREFIX, _)) => BlobNamespace::File,
            Some((other, _)) => BlobNamespace::Other(other.to_string()),
            None => BlobNamespace::Unprefixed,
        }
    }

    /// Only picture and file blobs are ever considered for deletion.
    pub fn is_sweepable(&self) -> bool {
        self.namespace().is_sweepable()
    }
}

impl BlobNamespace {
    pub fn is_sweepable(&self) -> bool {
        matches!(self, BlobNamespace::Picture | BlobNamespace::File)
    }
}

impl fmt::Display for BlobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for BlobKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for BlobKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for BlobKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Metadata for one stored blob. The payload itself lives on disk.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct Blob {
    /// Namespaced blob key.
    pub key: String,

    /// Content type (MIME type) supplied at upload.
    pub content_type: Option<String>,

    /// Size in bytes.
    pub size_bytes: i64,

    /// MD5 of the payload.
    pub etag: Option<String>,

    pub last_modified: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn namespace_is_taken_from_first_colon() {
        assert_eq!(BlobKey::new("picture:1").namespace(), BlobNamespace::Picture);
        assert_eq!(BlobKey::new("file:a:b").namespace(), BlobNamespace::File);
        assert_eq!(
            BlobKey::new("avatar:me").namespace(),
            BlobNamespace::Other("avatar".into())
        );
        assert_eq!(BlobKey::new("picture").namespace(), BlobNamespace::Unprefixed);
    }

    #[test]
    fn only_picture_and_file_are_sweepable() {
        assert!(BlobKey::new("picture:1").is_sweepable());
        assert!(BlobKey::new("file:3").is_sweepable());
        assert!(!BlobKey::new("avatar:1").is_sweepable());
        assert!(!BlobKey::new("pictures:1").is_sweepable());
        assert!(!BlobKey::new("").is_sweepable());
    }

    #[test]
    fn serializes_as_plain_string() {
        let json = serde_json::to_string(&BlobKey::new("file:3")).unwrap();
        assert_eq!(json, "\"file:3\"");
    }
}
