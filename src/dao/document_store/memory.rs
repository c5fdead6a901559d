//! In-process document store, used by default and by the tests.

use std::{
    io,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
};

use dashmap::{DashMap, mapref::entry::Entry};
use futures::{
    StreamExt,
    future::{self, BoxFuture},
    stream::BoxStream,
};
use serde_json::Value;
use tokio::sync::broadcast;
use tokio_stream::wrappers::{BroadcastStream, errors::BroadcastStreamRecvError};
use tracing::warn;

use crate::dao::{
    document_store::{Document, DocumentChange, DocumentStore},
    merge::merge_patch,
    storage::{StorageError, StorageResult},
};

const CHANGE_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
struct StoredDocument {
    generation: u64,
    rev: String,
    body: Value,
}

#[derive(Debug)]
struct Inner {
    documents: DashMap<String, StoredDocument>,
    changes: broadcast::Sender<DocumentChange>,
    sequence: AtomicU64,
    offline: AtomicBool,
}

/// Document store kept in memory for the lifetime of the process.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                documents: DashMap::new(),
                changes,
                sequence: AtomicU64::new(0),
                offline: AtomicBool::new(false),
            }),
        }
    }

    /// Simulate an outage: every operation fails until switched back.
    pub fn set_offline(&self, offline: bool) {
        self.inner.offline.store(offline, Ordering::SeqCst);
    }

    fn ensure_online(&self) -> StorageResult<()> {
        if self.inner.offline.load(Ordering::SeqCst) {
            return Err(StorageError::unavailable(
                "memory store is offline".into(),
                io::Error::from(io::ErrorKind::NotConnected),
            ));
        }
        Ok(())
    }

    fn next_rev(&self, generation: u64) -> String {
        let sequence = self.inner.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        format!("{generation}-{sequence:08x}")
    }

    fn notify(&self, change: DocumentChange) {
        // No receiver simply means nobody subscribed yet.
        let _ = self.inner.changes.send(change);
    }

    fn write(&self, id: &str, body: Value, expected_rev: Option<&str>) -> StorageResult<String> {
        self.ensure_online()?;

        let rev = match self.inner.documents.entry(id.to_string()) {
            Entry::Occupied(mut entry) => {
                if expected_rev.is_some_and(|expected| expected != entry.get().rev) {
                    return Err(StorageError::Conflict {
                        doc_id: id.to_string(),
                    });
                }
                let generation = entry.get().generation + 1;
                let rev = self.next_rev(generation);
                entry.insert(StoredDocument {
                    generation,
                    rev: rev.clone(),
                    body: body.clone(),
                });
                rev
            }
            Entry::Vacant(entry) => {
                if expected_rev.is_some() {
                    return Err(StorageError::Conflict {
                        doc_id: id.to_string(),
                    });
                }
                let rev = self.next_rev(1);
                entry.insert(StoredDocument {
                    generation: 1,
                    rev: rev.clone(),
                    body: body.clone(),
                });
                rev
            }
        };

        self.notify(DocumentChange {
            id: id.to_string(),
            rev: rev.clone(),
            body: Some(body),
        });
        Ok(rev)
    }

    fn patch(&self, id: &str, patch: &Value) -> StorageResult<Option<String>> {
        self.ensure_online()?;

        let (rev, body) = {
            let Some(mut stored) = self.inner.documents.get_mut(id) else {
                return Ok(None);
            };
            merge_patch(&mut stored.body, patch);
            stored.generation += 1;
            stored.rev = self.next_rev(stored.generation);
            (stored.rev.clone(), stored.body.clone())
        };

        self.notify(DocumentChange {
            id: id.to_string(),
            rev: rev.clone(),
            body: Some(body),
        });
        Ok(Some(rev))
    }

    fn remove(&self, id: &str) -> StorageResult<bool> {
        self.ensure_online()?;

        let Some((_, stored)) = self.inner.documents.remove(id) else {
            return Ok(false);
        };
        let rev = self.next_rev(stored.generation + 1);
        self.notify(DocumentChange {
            id: id.to_string(),
            rev,
            body: None,
        });
        Ok(true)
    }

    fn documents_with_prefix(&self, prefix: &str) -> StorageResult<Vec<Document>> {
        self.ensure_online()?;

        let mut documents: Vec<Document> = self
            .inner
            .documents
            .iter()
            .filter(|entry| entry.key().starts_with(prefix))
            .map(|entry| Document {
                id: entry.key().clone(),
                rev: entry.rev.clone(),
                body: entry.body.clone(),
            })
            .collect();
        documents.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(documents)
    }
}

impl DocumentStore for MemoryStore {
    fn get(&self, id: &str) -> BoxFuture<'static, StorageResult<Option<Document>>> {
        let result = self.ensure_online().map(|_| {
            self.inner.documents.get(id).map(|stored| Document {
                id: id.to_string(),
                rev: stored.rev.clone(),
                body: stored.body.clone(),
            })
        });
        Box::pin(future::ready(result))
    }

    fn set(
        &self,
        id: &str,
        body: Value,
        expected_rev: Option<String>,
    ) -> BoxFuture<'static, StorageResult<String>> {
        Box::pin(future::ready(self.write(id, body, expected_rev.as_deref())))
    }

    fn merge(&self, id: &str, patch: Value) -> BoxFuture<'static, StorageResult<Option<String>>> {
        Box::pin(future::ready(self.patch(id, &patch)))
    }

    fn delete(&self, id: &str) -> BoxFuture<'static, StorageResult<bool>> {
        Box::pin(future::ready(self.remove(id)))
    }

    fn list(&self, prefix: &str) -> BoxFuture<'static, StorageResult<Vec<Document>>> {
        Box::pin(future::ready(self.documents_with_prefix(prefix)))
    }

    fn subscribe(&self, prefix: &str) -> BoxStream<'static, DocumentChange> {
        let prefix = prefix.to_string();
        BroadcastStream::new(self.inner.changes.subscribe())
            .filter_map(move |item| {
                let change = match item {
                    Ok(change) if change.id.starts_with(&prefix) => Some(change),
                    Ok(_) => None,
                    Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                        warn!(skipped, prefix = %prefix, "change subscriber lagged");
                        None
                    }
                };
                future::ready(change)
            })
            .boxed()
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(future::ready(self.ensure_online()))
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(future::ready(self.ensure_online()))
    }
}
