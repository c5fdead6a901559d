/// CouchDB backend.
#[cfg(feature = "couch-store")]
pub mod couchdb;
/// In-process backend.
pub mod memory;

use futures::{future::BoxFuture, stream::BoxStream};
use serde_json::Value;

use crate::dao::storage::StorageResult;

/// Stored JSON document with its current revision.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// Document identifier (`<kind>::<key>`).
    pub id: String,
    /// Opaque revision token, changes on every write.
    pub rev: String,
    /// Document body without backend metadata.
    pub body: Value,
}

/// Change notification emitted by [`DocumentStore::subscribe`].
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentChange {
    /// Changed document.
    pub id: String,
    /// Revision after the change.
    pub rev: String,
    /// `None` when the document was deleted.
    pub body: Option<Value>,
}

impl DocumentChange {
    /// Whether the change is a deletion.
    pub fn is_deletion(&self) -> bool {
        self.body.is_none()
    }
}

/// Key/value document store shared by every session of the game.
pub trait DocumentStore: Send + Sync {
    /// Fetch a document once.
    fn get(&self, id: &str) -> BoxFuture<'static, StorageResult<Option<Document>>>;
    /// Replace a document wholesale and return the new revision.
    ///
    /// With `expected_rev`, the write only succeeds if the stored revision
    /// still matches, otherwise it fails with `StorageError::Conflict`.
    fn set(
        &self,
        id: &str,
        body: Value,
        expected_rev: Option<String>,
    ) -> BoxFuture<'static, StorageResult<String>>;
    /// Apply a JSON merge patch to an existing document.
    ///
    /// Resolves to `None` when the document does not exist.
    fn merge(&self, id: &str, patch: Value) -> BoxFuture<'static, StorageResult<Option<String>>>;
    /// Delete a document, resolving to whether it existed.
    fn delete(&self, id: &str) -> BoxFuture<'static, StorageResult<bool>>;
    /// List every document whose id starts with `prefix`, ordered by id.
    fn list(&self, prefix: &str) -> BoxFuture<'static, StorageResult<Vec<Document>>>;
    /// Stream changes of documents whose id starts with `prefix`.
    fn subscribe(&self, prefix: &str) -> BoxStream<'static, DocumentChange>;
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
