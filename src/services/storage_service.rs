//! src/services/storage_service.rs
//!
//! Blob store backed by SQLite for metadata and local disk for payloads.
//! Payloads are sharded beneath `base_path/{shard}/{shard}/{key}`.
//!
//! The sweep only needs [`BlobStore`]; the rest of [`LocalBlobStore`] serves
//! the HTTP host.

use crate::models::blob::{Blob, BlobKey};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use futures::{Stream, StreamExt, pin_mut};
use md5::Context;
use sqlx::{QueryBuilder, SqlitePool, sqlite::Sqlite};
use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
    sync::Arc,
};
use thiserror::Error;
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tracing::debug;
use uuid::Uuid;

/// Schema applied by `--migrate` and by tests.
pub const SCHEMA_SQL: &str = include_str!("../../migrations/0001_init.sql");

#[derive(Clone, Debug)]
pub struct ListBlobsParams {
    pub prefix: Option<String>,
    pub continuation_token: Option<String>,
    pub max_keys: usize,
}

#[derive(Debug)]
pub struct ListBlobsResult {
    pub blobs: Vec<Blob>,
    pub is_truncated: bool,
    pub next_continuation_token: Option<String>,
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("blob `{0}` not found")]
    BlobNotFound(String),
    #[error("invalid blob key")]
    InvalidBlobKey,
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// The two store primitives the sweep consumes.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Every key currently stored, across all namespaces.
    async fn list_blob_keys(&self) -> StorageResult<Vec<BlobKey>>;

    /// Delete a blob. Returns `Ok(false)` when the key was already absent.
    async fn delete_blob(&self, key: &BlobKey) -> StorageResult<bool>;
}

#[derive(Clone)]
pub struct LocalBlobStore {
    /// Shared SQLite connection pool used for metadata operations.
    pub db: Arc<SqlitePool>,

    /// Base directory on disk where blob payloads are stored.
    pub base_path: PathBuf,
}

const MAX_BLOB_KEY_LEN: usize = 1024;
const MAX_LIST_KEYS: usize = 1000;

/// Execute the embedded schema statements against `db`.
pub async fn apply_schema(db: &SqlitePool) -> StorageResult<()> {
    let statements = SCHEMA_SQL
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>();

    tracing::info!("Running {} migration statements...", statements.len());

    for stmt in statements {
        debug!("Executing migration SQL: {}", stmt);
        sqlx::query(stmt).execute(db).await?;
    }
    Ok(())
}

/// Stream `body` into a new file at `path` and fsync it.
///
/// Returns the byte count and the hex MD5 etag of what was written.
async fn write_payload<S>(path: &Path, body: S) -> io::Result<(i64, String)>
where
    S: Stream<Item = io::Result<Bytes>>,
{
    let mut file = File::create(path).await?;
    let mut size_bytes: i64 = 0;
    let mut digest = Context::new();
    pin_mut!(body);
    while let Some(chunk) = body.next().await {
        let chunk = chunk?;
        size_bytes += chunk.len() as i64;
        digest.consume(&chunk);
        file.write_all(&chunk).await?;
    }
    file.flush().await?;
    file.sync_all().await?;
    Ok((size_bytes, format!("{:x}", digest.compute())))
}

async fn move_into_place(from: &Path, to: &Path) -> io::Result<()> {
    match fs::rename(from, to).await {
        Err(err) if err.kind() == ErrorKind::AlreadyExists => {
            fs::remove_file(to).await?;
            fs::rename(from, to).await
        }
        res => res,
    }
}

impl LocalBlobStore {
    pub fn new(db: Arc<SqlitePool>, base_path: impl Into<PathBuf>) -> Self {
        Self {
            db,
            base_path: base_path.into(),
        }
    }

    /// Reject keys that could escape `base_path` or break the shard layout.
    fn ensure_key_safe(&self, key: &str) -> StorageResult<()> {
        if key.is_empty() || key.len() > MAX_BLOB_KEY_LEN {
            return Err(StorageError::InvalidBlobKey);
        }
        if key.starts_with('/') || key.contains("..") {
            return Err(StorageError::InvalidBlobKey);
        }
        if key
            .bytes()
            .any(|b| b.is_ascii_control() || b == b'\\' || b == b'\0')
        {
            return Err(StorageError::InvalidBlobKey);
        }
        Ok(())
    }

    /// First two bytes of MD5(key) as lowercase hex, one per directory level.
    fn blob_shards(key: &str) -> (String, String) {
        let digest = md5::compute(key);
        (format!("{:02x}", digest[0]), format!("{:02x}", digest[1]))
    }

    fn blob_path(&self, key: &str) -> PathBuf {
        let (shard_a, shard_b) = Self::blob_shards(key);
        let mut path = self.base_path.clone();
        path.push(shard_a);
        path.push(shard_b);
        path.push(key);
        path
    }

    async fn fetch_blob(&self, key: &str) -> StorageResult<Blob> {
        sqlx::query_as::<_, Blob>(
            "SELECT key, content_type, size_bytes, etag, last_modified
             FROM blobs WHERE key = ?",
        )
        .bind(key)
        .fetch_one(&*self.db)
        .await
        .map_err(|err| match err {
            sqlx::Error::RowNotFound => StorageError::BlobNotFound(key.to_string()),
            other => StorageError::Sqlx(other),
        })
    }

    /// Stream-upload a blob to disk and upsert its metadata.
    ///
    /// Bytes go to a temp file first, are fsynced, then renamed into place.
    /// The temp file is removed on any error.
    pub async fn put_blob_stream<S>(
        &self,
        key: &str,
        content_type: Option<String>,
        stream: S,
    ) -> StorageResult<Blob>
    where
        S: Stream<Item = io::Result<Bytes>> + Send + 'static,
    {
        self.ensure_key_safe(key)?;

        let file_path = self.blob_path(key);
        let parent = file_path
            .parent()
            .map(Path::to_path_buf)
            .ok_or_else(|| io::Error::other("blob path missing parent directory"))?;
        fs::create_dir_all(&parent).await?;
        let tmp_path = parent.join(format!(".tmp-{}", Uuid::new_v4()));

        let written = async {
            let stats = write_payload(&tmp_path, stream).await?;
            move_into_place(&tmp_path, &file_path).await?;
            Ok::<_, io::Error>(stats)
        };
        let (size_bytes, etag) = match written.await {
            Ok(stats) => stats,
            Err(err) => {
                let _ = fs::remove_file(&tmp_path).await;
                return Err(StorageError::Io(err));
            }
        };

        let upsert = sqlx::query_as::<_, Blob>(
            r#"
            INSERT INTO blobs (key, content_type, size_bytes, etag, last_modified)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET
                content_type = excluded.content_type,
                size_bytes = excluded.size_bytes,
                etag = excluded.etag,
                last_modified = excluded.last_modified
            RETURNING key, content_type, size_bytes, etag, last_modified
            "#,
        )
        .bind(key)
        .bind(content_type)
        .bind(size_bytes)
        .bind(&etag)
        .bind(Utc::now())
        .fetch_one(&*self.db)
        .await;

        match upsert {
            Ok(blob) => {
                debug!(key, size_bytes, "stored blob");
                Ok(blob)
            }
            Err(err) => {
                let _ = fs::remove_file(&file_path).await;
                Err(StorageError::Sqlx(err))
            }
        }
    }

    /// Metadata plus an open payload file, ready for streaming out.
    ///
    /// Returns BlobNotFound if the row exists but the payload is gone.
    pub async fn get_blob_reader(&self, key: &str) -> StorageResult<(Blob, File)> {
        self.ensure_key_safe(key)?;
        let blob = self.fetch_blob(key).await?;

        let file = File::open(self.blob_path(key)).await.map_err(|err| {
            if err.kind() == ErrorKind::NotFound {
                StorageError::BlobNotFound(key.to_string())
            } else {
                StorageError::Io(err)
            }
        })?;

        Ok((blob, file))
    }

    pub async fn get_blob_metadata(&self, key: &str) -> StorageResult<Blob> {
        self.ensure_key_safe(key)?;
        self.fetch_blob(key).await
    }

    /// Page through blobs in key order, optionally restricted to a prefix.
    pub async fn list_blobs(&self, params: ListBlobsParams) -> StorageResult<ListBlobsResult> {
        let max_keys = params.max_keys.clamp(1, MAX_LIST_KEYS);
        let fetch_limit = max_keys + 1;

        let mut builder = QueryBuilder::<Sqlite>::new(
            "SELECT key, content_type, size_bytes, etag, last_modified FROM blobs WHERE 1 = 1",
        );

        if let Some(prefix) = &params.prefix {
            // substr avoids LIKE treating `_` and `%` in keys as wildcards
            builder.push(" AND substr(key, 1, length(");
            builder.push_bind(prefix.clone());
            builder.push(")) = ");
            builder.push_bind(prefix.clone());
        }

        if let Some(token) = &params.continuation_token {
            builder.push(" AND key > ");
            builder.push_bind(token.clone());
        }

        builder.push(" ORDER BY key ASC LIMIT ");
        builder.push_bind(fetch_limit as i64);

        let mut rows: Vec<Blob> = builder.build_query_as().fetch_all(&*self.db).await?;

        let mut is_truncated = false;
        let mut next_continuation_token = None;
        if rows.len() == fetch_limit {
            rows.pop();
            next_continuation_token = rows.last().map(|last| last.key.clone());
            is_truncated = true;
        }

        Ok(ListBlobsResult {
            blobs: rows,
            is_truncated,
            next_continuation_token,
        })
    }

    /// Hard-delete a blob: payload first, then the metadata row.
    ///
    /// A payload that fails to delete keeps its row, so the key is still
    /// listed and the next sweep tries again.
    pub async fn remove_blob(&self, key: &str) -> StorageResult<bool> {
        self.ensure_key_safe(key)?;

        let file_path = self.blob_path(key);
        match fs::remove_file(&file_path).await {
            Ok(_) => debug!("removed physical file {}", file_path.display()),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("file {} already missing", file_path.display());
            }
            Err(err) => return Err(StorageError::Io(err)),
        }

        let result = sqlx::query("DELETE FROM blobs WHERE key = ?")
            .bind(key)
            .execute(&*self.db)
            .await?;

        if let Some(parent) = file_path.parent() {
            self.prune_empty_dirs(parent, &self.base_path).await;
        }

        Ok(result.rows_affected() > 0)
    }

    /// Remove empty shard directories up to `stop`, best-effort.
    async fn prune_empty_dirs(&self, start: &Path, stop: &Path) {
        let mut current = start.to_path_buf();
        while current.starts_with(stop) && current != stop {
            match fs::remove_dir(&current).await {
                Ok(_) => {
                    if let Some(parent) = current.parent() {
                        current = parent.to_path_buf();
                    } else {
                        break;
                    }
                }
                Err(err) if err.kind() == ErrorKind::NotFound => break,
                Err(err) if err.kind() == ErrorKind::DirectoryNotEmpty => break,
                Err(err) => {
                    debug!("failed to prune directory {}: {}", current.display(), err);
                    break;
                }
            }
        }
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn list_blob_keys(&self) -> StorageResult<Vec<BlobKey>> {
        let keys = sqlx::query_scalar::<_, String>("SELECT key FROM blobs ORDER BY key ASC")
            .fetch_all(&*self.db)
            .await?;
        Ok(keys.into_iter().map(BlobKey::from).collect())
    }

    async fn delete_blob(&self, key: &BlobKey) -> StorageResult<bool> {
        self.remove_blob(key.as_str()).await
    }
}
