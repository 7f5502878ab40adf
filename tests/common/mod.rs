#![allow(dead_code)]

use async_trait::async_trait;
use blob_sweeper::{
    models::{
        blob::BlobKey,
        graph::{ContentPart, FileAttachment, LiveGraph, Message, PictureAttachment, Session},
    },
    services::storage_service::{BlobStore, StorageError, StorageResult},
};
use std::{
    collections::{BTreeSet, HashSet},
    io,
    sync::Mutex,
};

/// In-memory store that records deletes and can be told to fail some of them.
#[derive(Default)]
pub struct RecordingStore {
    keys: Mutex<BTreeSet<BlobKey>>,
    failing: Mutex<HashSet<BlobKey>>,
    delete_calls: Mutex<Vec<BlobKey>>,
}

impl RecordingStore {
    pub fn with_keys(keys: &[&str]) -> Self {
        let store = Self::default();
        store
            .keys
            .lock()
            .unwrap()
            .extend(keys.iter().copied().map(BlobKey::new));
        store
    }

    pub fn fail_deletes_of(&self, key: &str) {
        self.failing.lock().unwrap().insert(BlobKey::new(key));
    }

    pub fn heal(&self) {
        self.failing.lock().unwrap().clear();
    }

    pub fn keys(&self) -> BTreeSet<BlobKey> {
        self.keys.lock().unwrap().clone()
    }

    pub fn delete_calls(&self) -> Vec<BlobKey> {
        self.delete_calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.delete_calls.lock().unwrap().clear();
    }
}

#[async_trait]
impl BlobStore for RecordingStore {
    async fn list_blob_keys(&self) -> StorageResult<Vec<BlobKey>> {
        Ok(self.keys.lock().unwrap().iter().cloned().collect())
    }

    async fn delete_blob(&self, key: &BlobKey) -> StorageResult<bool> {
        self.delete_calls.lock().unwrap().push(key.clone());
        if self.failing.lock().unwrap().contains(key) {
            return Err(StorageError::Io(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "simulated store failure",
            )));
        }
        Ok(self.keys.lock().unwrap().remove(key))
    }
}

pub fn key(k: &str) -> BlobKey {
    BlobKey::new(k)
}

pub fn keys(ks: &[&str]) -> BTreeSet<BlobKey> {
    ks.iter().copied().map(BlobKey::new).collect()
}

pub fn picture(k: &str) -> PictureAttachment {
    PictureAttachment {
        storage_key: Some(key(k)),
        url: None,
    }
}

pub fn file(k: &str) -> FileAttachment {
    FileAttachment {
        id: k.into(),
        name: "attachment".into(),
        file_type: None,
        storage_key: Some(key(k)),
    }
}

pub fn image_part(k: &str) -> ContentPart {
    ContentPart::Image {
        storage_key: Some(key(k)),
    }
}

pub fn single_session(messages: Vec<Message>) -> LiveGraph {
    LiveGraph {
        sessions: vec![Session {
            id: "s1".into(),
            name: "Session".into(),
            messages,
            assistant_avatar_key: None,
        }],
        ..LiveGraph::default()
    }
}
