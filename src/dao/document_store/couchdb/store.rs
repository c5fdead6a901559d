use std::{sync::Arc, time::Duration};

use futures::{StreamExt, future::BoxFuture, stream::BoxStream};
use reqwest::{Client, Method, StatusCode};
use serde_json::Value;
use tracing::{debug, warn};

use crate::dao::{
    document_store::{Document, DocumentChange, DocumentStore},
    merge::merge_patch,
    storage::StorageResult,
};

use super::{
    config::CouchConfig,
    error::{CouchDaoError, CouchResult},
    models::{
        AllDocsResponse, ChangesResponse, END_SUFFIX, WriteResponse, into_document, with_metadata,
    },
};

const CHANGES: &str = "_changes";
const CHANGES_POLL_TIMEOUT: Duration = Duration::from_secs(30);
const CHANGES_RETRY_DELAY: Duration = Duration::from_secs(1);

/// [`DocumentStore`] backed by a CouchDB database over its HTTP API.
#[derive(Clone)]
pub struct CouchDocumentStore {
    client: Client,
    base_url: Arc<str>,
    database: Arc<str>,
    auth: Option<(Arc<str>, Arc<str>)>,
}

impl CouchDocumentStore {
    /// Establish a connection to CouchDB and ensure the database exists.
    pub async fn connect(config: CouchConfig) -> CouchResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|source| CouchDaoError::ClientBuilder { source })?;

        let store = Self {
            client,
            base_url: Arc::from(config.base_url.trim_end_matches('/')),
            database: Arc::from(config.database),
            auth: config
                .credentials
                .map(|(user, pass)| (Arc::from(user), Arc::from(pass))),
        };

        store.ensure_database().await?;
        Ok(store)
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.auth {
            Some((ref user, ref pass)) => builder.basic_auth(user.as_ref(), Some(pass.as_ref())),
            None => builder,
        }
    }

    fn database_url(&self) -> String {
        format!("{}/{}", self.base_url, self.database)
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}/{}", self.database_url(), path);
        self.authorized(self.client.request(method, url))
    }

    async fn send(&self, builder: reqwest::RequestBuilder, path: &str) -> CouchResult<reqwest::Response> {
        builder
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: path.to_string(),
                source,
            })
    }

    async fn decode<T>(response: reqwest::Response, path: &str) -> CouchResult<T>
    where
        T: serde::de::DeserializeOwned,
    {
        response
            .json::<T>()
            .await
            .map_err(|source| CouchDaoError::DecodeResponse {
                path: path.to_string(),
                source,
            })
    }

    async fn ensure_database(&self) -> CouchResult<()> {
        let url = self.database_url();
        let response = self.send(self.authorized(self.client.get(&url)), &url).await?;

        match response.status() {
            StatusCode::OK => Ok(()),
            StatusCode::NOT_FOUND => {
                let create = self.send(self.authorized(self.client.put(&url)), &url).await?;
                // 412 means another process created it in between.
                if create.status().is_success() || create.status() == StatusCode::PRECONDITION_FAILED {
                    debug!(database = %self.database, "CouchDB database ready");
                    Ok(())
                } else {
                    Err(CouchDaoError::DatabaseStatus {
                        database: self.database.to_string(),
                        status: create.status(),
                    })
                }
            }
            other => Err(CouchDaoError::DatabaseStatus {
                database: self.database.to_string(),
                status: other,
            }),
        }
    }

    async fn get_document(&self, doc_id: &str) -> CouchResult<Option<Document>> {
        let response = self.send(self.request(Method::GET, doc_id), doc_id).await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let raw: Value = Self::decode(response, doc_id).await?;
                into_document(raw)
                    .map(Some)
                    .ok_or_else(|| CouchDaoError::UnexpectedShape {
                        path: doc_id.to_string(),
                    })
            }
            other => Err(CouchDaoError::RequestStatus {
                path: doc_id.to_string(),
                status: other,
            }),
        }
    }

    async fn put_document(&self, doc_id: &str, rev: Option<&str>, body: Value) -> CouchResult<String> {
        let payload = with_metadata(doc_id, rev, body);
        let response = self
            .send(self.request(Method::PUT, doc_id).json(&payload), doc_id)
            .await?;

        match response.status() {
            StatusCode::CONFLICT => Err(CouchDaoError::Conflict {
                path: doc_id.to_string(),
            }),
            status if status.is_success() => {
                let written: WriteResponse = Self::decode(response, doc_id).await?;
                Ok(written.rev)
            }
            other => Err(CouchDaoError::RequestStatus {
                path: doc_id.to_string(),
                status: other,
            }),
        }
    }

    async fn set_document(
        &self,
        doc_id: &str,
        body: Value,
        expected_rev: Option<String>,
    ) -> CouchResult<String> {
        let rev = match expected_rev {
            Some(rev) => Some(rev),
            None => self.get_document(doc_id).await?.map(|doc| doc.rev),
        };
        self.put_document(doc_id, rev.as_deref(), body).await
    }

    async fn merge_document(&self, doc_id: &str, patch: Value) -> CouchResult<Option<String>> {
        let Some(mut doc) = self.get_document(doc_id).await? else {
            return Ok(None);
        };
        merge_patch(&mut doc.body, &patch);
        self.put_document(doc_id, Some(&doc.rev), doc.body)
            .await
            .map(Some)
    }

    async fn delete_document(&self, doc_id: &str) -> CouchResult<bool> {
        let Some(doc) = self.get_document(doc_id).await? else {
            return Ok(false);
        };
        let builder = self
            .request(Method::DELETE, doc_id)
            .query(&[("rev", doc.rev.as_str())]);
        let response = self.send(builder, doc_id).await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            StatusCode::CONFLICT => Err(CouchDaoError::Conflict {
                path: doc_id.to_string(),
            }),
            status if status.is_success() => Ok(true),
            other => Err(CouchDaoError::RequestStatus {
                path: doc_id.to_string(),
                status: other,
            }),
        }
    }

    async fn list_documents(&self, prefix: &str) -> CouchResult<Vec<Document>> {
        const ALL_DOCS: &str = "_all_docs";
        let query = [
            ("include_docs", "true".to_string()),
            ("startkey", format!("\"{prefix}\"")),
            ("endkey", format!("\"{prefix}{END_SUFFIX}\"")),
        ];

        let response = self
            .send(self.request(Method::GET, ALL_DOCS).query(&query), ALL_DOCS)
            .await?;
        if !response.status().is_success() {
            return Err(CouchDaoError::RequestStatus {
                path: ALL_DOCS.to_string(),
                status: response.status(),
            });
        }

        let payload: AllDocsResponse = Self::decode(response, ALL_DOCS).await?;
        Ok(payload
            .rows
            .into_iter()
            .filter_map(|row| row.doc)
            .filter_map(into_document)
            .collect())
    }

    async fn poll_changes(&self, since: &Value) -> CouchResult<ChangesResponse> {
        let since = match since {
            Value::String(seq) => seq.clone(),
            other => other.to_string(),
        };
        let query = [
            ("feed", "longpoll".to_string()),
            ("include_docs", "true".to_string()),
            ("since", since),
            ("timeout", CHANGES_POLL_TIMEOUT.as_millis().to_string()),
        ];
        let response = self
            .send(self.request(Method::GET, CHANGES).query(&query), CHANGES)
            .await?;
        if !response.status().is_success() {
            return Err(CouchDaoError::RequestStatus {
                path: CHANGES.to_string(),
                status: response.status(),
            });
        }
        Self::decode(response, CHANGES).await
    }
}

impl DocumentStore for CouchDocumentStore {
    fn get(&self, id: &str) -> BoxFuture<'static, StorageResult<Option<Document>>> {
        let store = self.clone();
        let id = id.to_string();
        Box::pin(async move { Ok(store.get_document(&id).await?) })
    }

    fn set(
        &self,
        id: &str,
        body: Value,
        expected_rev: Option<String>,
    ) -> BoxFuture<'static, StorageResult<String>> {
        let store = self.clone();
        let id = id.to_string();
        Box::pin(async move { Ok(store.set_document(&id, body, expected_rev).await?) })
    }

    fn merge(&self, id: &str, patch: Value) -> BoxFuture<'static, StorageResult<Option<String>>> {
        let store = self.clone();
        let id = id.to_string();
        Box::pin(async move { Ok(store.merge_document(&id, patch).await?) })
    }

    fn delete(&self, id: &str) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        let id = id.to_string();
        Box::pin(async move { Ok(store.delete_document(&id).await?) })
    }

    fn list(&self, prefix: &str) -> BoxFuture<'static, StorageResult<Vec<Document>>> {
        let store = self.clone();
        let prefix = prefix.to_string();
        Box::pin(async move { Ok(store.list_documents(&prefix).await?) })
    }

    fn subscribe(&self, prefix: &str) -> BoxStream<'static, DocumentChange> {
        let store = self.clone();
        let prefix = prefix.to_string();
        async_stream::stream! {
            let mut since = Value::String("now".into());
            loop {
                match store.poll_changes(&since).await {
                    Ok(batch) => {
                        since = batch.last_seq;
                        for row in batch.results {
                            if !row.id.starts_with(&prefix) {
                                continue;
                            }
                            if let Some(change) = row.into_change() {
                                yield change;
                            }
                        }
                    }
                    Err(err) => {
                        warn!(error = %err, prefix = %prefix, "CouchDB change feed failed, retrying");
                        tokio::time::sleep(CHANGES_RETRY_DELAY).await;
                    }
                }
            }
        }
        .boxed()
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let url = store.database_url();
            let response = store
                .send(store.authorized(store.client.get(&url)), &url)
                .await?;

            if response.status().is_success() {
                Ok(())
            } else {
                Err(CouchDaoError::RequestStatus {
                    path: url,
                    status: response.status(),
                }
                .into())
            }
        })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.ensure_database().await.map_err(Into::into) })
    }
}
