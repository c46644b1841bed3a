//! In-memory backend implementation for testing.
//!
//! Documents are JSON values keyed by `(index, id)` in a `DashMap`. Every call
//! is recorded so tests can assert how many round trips were made and what
//! they carried, and failures can be queued to exercise error paths.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::{json, Map, Value};
use tracing::instrument;

use crate::error::{BackendError, BackendResult};
use crate::traits::{MultiGetClient, MultiGetDoc, MultiGetReply, MultiGetRequest};

/// A failure the next call will return instead of serving documents.
#[derive(Debug, Clone)]
pub enum InjectedFailure {
    /// Fail before any response, as a dropped connection would.
    Transport(String),
    /// Reply with this status and raw body.
    Reply { status: u16, body: String },
}

/// In-memory implementation of `MultiGetClient`.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    documents: DashMap<(String, String), Value>,
    calls: Mutex<Vec<MultiGetRequest>>,
    failures: Mutex<VecDeque<InjectedFailure>>,
}

impl MemoryBackend {
    /// Creates an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty backend wrapped in Arc.
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Stores (or replaces) a document.
    pub fn insert(&self, index: &str, id: &str, source: Value) {
        self.documents
            .insert((index.to_string(), id.to_string()), source);
    }

    /// Removes a document, returning it if present.
    pub fn remove(&self, index: &str, id: &str) -> Option<Value> {
        self.documents
            .remove(&(index.to_string(), id.to_string()))
            .map(|(_, v)| v)
    }

    /// Queues a failure for the next call. Failures are consumed in order.
    pub fn fail_next(&self, failure: InjectedFailure) {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(failure);
    }

    /// Number of multi-get calls served so far, failed ones included.
    pub fn call_count(&self) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Snapshot of every request received, in arrival order.
    pub fn calls(&self) -> Vec<MultiGetRequest> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn lookup(&self, doc: &MultiGetDoc) -> Value {
        let key = (doc.index.clone(), doc.id.clone());
        match self.documents.get(&key) {
            Some(source) => json!({
                "_index": doc.index,
                "_id": doc.id,
                "_version": 1,
                "found": true,
                "_source": filter_source(source.value(), doc),
            }),
            None => json!({
                "_index": doc.index,
                "_id": doc.id,
                "found": false,
            }),
        }
    }
}

/// Applies `_source.include` to top-level fields.
fn filter_source(source: &Value, doc: &MultiGetDoc) -> Value {
    let (Some(filter), Value::Object(fields)) = (&doc.source, source) else {
        return source.clone();
    };

    let filtered: Map<String, Value> = fields
        .iter()
        .filter(|(name, _)| filter.include.iter().any(|f| f == *name))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect();
    Value::Object(filtered)
}

#[async_trait]
impl MultiGetClient for MemoryBackend {
    #[instrument(skip(self, request), fields(docs = request.docs.len()))]
    async fn multi_get(&self, request: &MultiGetRequest) -> BackendResult<MultiGetReply> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());

        let injected = self
            .failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        match injected {
            Some(InjectedFailure::Transport(message)) => {
                return Err(BackendError::Connection { message });
            }
            Some(InjectedFailure::Reply { status, body }) => {
                return Ok(MultiGetReply::new(status, body));
            }
            None => {}
        }

        if request.docs.is_empty() {
            let body = json!({
                "error": {"type": "action_request_validation_exception", "reason": "no documents to get"},
                "status": 400,
            });
            return Ok(MultiGetReply::new(400, body.to_string()));
        }

        let docs: Vec<Value> = request.docs.iter().map(|d| self.lookup(d)).collect();
        Ok(MultiGetReply::new(200, json!({ "docs": docs }).to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(reply: &MultiGetReply) -> Value {
        serde_json::from_slice(&reply.body).unwrap()
    }

    #[tokio::test]
    async fn test_serves_found_and_missing_documents() {
        let backend = MemoryBackend::new();
        backend.insert("movies", "1", json!({"Title": "Batman Begins"}));

        let reply = backend
            .multi_get(&MultiGetRequest::new(vec![
                MultiGetDoc::new("movies", "1", &[]),
                MultiGetDoc::new("movies", "2", &[]),
            ]))
            .await
            .unwrap();

        assert_eq!(reply.status, 200);
        let docs = body(&reply)["docs"].clone();
        assert_eq!(docs[0]["found"], json!(true));
        assert_eq!(docs[0]["_source"]["Title"], json!("Batman Begins"));
        assert_eq!(docs[1]["found"], json!(false));
        assert!(docs[1].get("_source").is_none());
    }

    #[tokio::test]
    async fn test_applies_source_include_filter() {
        let backend = MemoryBackend::new();
        backend.insert(
            "movies",
            "1",
            json!({"Title": "The Dark Knight", "Director": "Christopher Nolan"}),
        );

        let reply = backend
            .multi_get(&MultiGetRequest::new(vec![MultiGetDoc::new(
                "movies",
                "1",
                &["Director".to_string()],
            )]))
            .await
            .unwrap();

        assert_eq!(
            body(&reply)["docs"][0]["_source"],
            json!({"Director": "Christopher Nolan"})
        );
    }

    #[tokio::test]
    async fn test_injected_failures_are_consumed_in_order() {
        let backend = MemoryBackend::new();
        backend.fail_next(InjectedFailure::Transport("reset".to_string()));
        backend.fail_next(InjectedFailure::Reply {
            status: 503,
            body: "unavailable".to_string(),
        });
        let request = MultiGetRequest::new(vec![MultiGetDoc::new("movies", "1", &[])]);

        let first = backend.multi_get(&request).await;
        let second = backend.multi_get(&request).await.unwrap();
        let third = backend.multi_get(&request).await.unwrap();

        assert!(matches!(first, Err(BackendError::Connection { .. })));
        assert_eq!(second.status, 503);
        assert_eq!(third.status, 200);
        assert_eq!(backend.call_count(), 3);
    }

    #[tokio::test]
    async fn test_empty_request_is_rejected_with_400() {
        let backend = MemoryBackend::new();

        let reply = backend
            .multi_get(&MultiGetRequest::new(vec![]))
            .await
            .unwrap();

        assert_eq!(reply.status, 400);
    }
}
