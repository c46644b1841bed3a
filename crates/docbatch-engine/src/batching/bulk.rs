//! One multi-get call serving a homogeneous group of point-gets.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use docbatch_backend::{MultiGetClient, MultiGetDoc, MultiGetReply, MultiGetRequest};
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use tracing::{debug, warn};

use super::context::ExecContext;
use super::key::{DocKey, GroupKey};
use super::types::{FetchError, FetchResult, GetResponse, ReqResp};

/// What to do with the rest of a group when one document source fails to
/// decode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecodeFailurePolicy {
    /// Stop processing the reply and return the error. Requests not yet
    /// resolved stay pending and are abandoned with the group.
    #[default]
    AbortGroup,
    /// Fail only that request, resolve the rest, then return the first
    /// decode error.
    IsolateDocument,
}

/// Lifecycle of a `BulkRequest`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BulkState {
    Pending,
    Executing,
    Resolved,
}

/// Status of one submitted request inside a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryStatus {
    /// Waiting for a result.
    Pending,
    /// Its response has been delivered.
    Resolved,
    /// A later submission for the same document replaced it.
    Superseded,
}

struct Entry {
    status: EntryStatus,
    req_resp: Option<ReqResp>,
}

#[derive(Deserialize)]
struct ResponseDoc {
    #[serde(rename = "_index")]
    index: String,
    #[serde(rename = "_id")]
    id: String,
    #[serde(default)]
    found: bool,
    #[serde(rename = "_source", default)]
    source: Option<Box<RawValue>>,
}

#[derive(Deserialize)]
struct ResponseEnvelope {
    docs: Vec<ResponseDoc>,
}

/// Point-gets sharing one index and field filter, served by one multi-get.
///
/// Entries live in an arena in submission order and carry an explicit status;
/// nothing is removed while a reply is dispatched.
pub struct BulkRequest {
    key: GroupKey,
    entries: Vec<Entry>,
    by_doc: HashMap<DocKey, usize>,
    state: BulkState,
    policy: DecodeFailurePolicy,
    /// Serializes decoding into destinations.
    decode_lock: Mutex<()>,
}

impl BulkRequest {
    pub fn new(key: GroupKey, policy: DecodeFailurePolicy) -> Self {
        Self {
            key,
            entries: Vec::new(),
            by_doc: HashMap::new(),
            state: BulkState::Pending,
            policy,
            decode_lock: Mutex::new(()),
        }
    }

    pub fn key(&self) -> &GroupKey {
        &self.key
    }

    pub fn state(&self) -> BulkState {
        self.state
    }

    /// Adds a request. The caller guarantees it belongs to this group.
    ///
    /// Submitting the same document twice replaces the earlier request, which
    /// is marked superseded and abandoned.
    pub fn add(&mut self, rr: ReqResp) {
        debug_assert_eq!(GroupKey::of(rr.request()), self.key);

        let doc = DocKey::of(rr.request());
        let idx = self.entries.len();
        self.entries.push(Entry {
            status: EntryStatus::Pending,
            req_resp: Some(rr),
        });

        if let Some(previous) = self.by_doc.insert(doc, idx) {
            let entry = &mut self.entries[previous];
            if entry.status == EntryStatus::Pending {
                debug!(group = %self.key, "duplicate document in group, earlier request superseded");
                entry.status = EntryStatus::Superseded;
                entry.req_resp = None;
            }
        }
    }

    /// Number of requests still waiting for a result.
    pub fn pending(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.status == EntryStatus::Pending)
            .count()
    }

    /// Status of the current request for a document.
    pub fn status_of(&self, doc: &DocKey) -> Option<EntryStatus> {
        self.by_doc.get(doc).map(|&idx| self.entries[idx].status)
    }

    /// Builds the multi-get call for every pending request, in submission
    /// order, with the local-shard and realtime hints set.
    pub fn build_call_body(&self) -> MultiGetRequest {
        let docs = self
            .entries
            .iter()
            .filter(|e| e.status == EntryStatus::Pending)
            .filter_map(|e| e.req_resp.as_ref())
            .map(|rr| {
                let request = rr.request();
                MultiGetDoc::new(&request.index, &request.document_id, &request.fields)
            })
            .collect();

        MultiGetRequest::new(docs).local_realtime()
    }

    /// Performs the multi-get and resolves every request it can.
    ///
    /// # Errors
    ///
    /// Returns the transport, backend or decode error that was also delivered
    /// to the affected requests.
    pub async fn execute(
        &mut self,
        ctx: &ExecContext,
        client: &dyn MultiGetClient,
    ) -> FetchResult<()> {
        let pending = self.pending();
        if pending == 0 {
            self.state = BulkState::Resolved;
            return Ok(());
        }

        self.state = BulkState::Executing;
        debug!(group = %self.key, documents = pending, "performing bulk get");

        let request = self.build_call_body();
        let result = match ctx.run(client.multi_get(&request)).await {
            Ok(Ok(reply)) => self.process_reply(&reply),
            Ok(Err(e)) => Err(self.fail_pending(FetchError::Transport {
                message: e.to_string(),
            })),
            Err(e) => Err(self.fail_pending(e)),
        };

        self.state = BulkState::Resolved;
        result
    }

    fn process_reply(&mut self, reply: &MultiGetReply) -> FetchResult<()> {
        match reply.status {
            200 => self.dispatch(reply),
            // Nothing found for the whole group.
            404 => {
                self.resolve_pending(GetResponse::not_found());
                Ok(())
            }
            status if status >= 400 => Err(self.fail_pending(FetchError::Backend {
                status,
                body: reply.body_text(),
            })),
            status => Err(self.fail_pending(FetchError::UnexpectedStatus { status })),
        }
    }

    fn dispatch(&mut self, reply: &MultiGetReply) -> FetchResult<()> {
        let envelope: ResponseEnvelope = match serde_json::from_slice(&reply.body) {
            Ok(envelope) => envelope,
            Err(e) => {
                return Err(self.fail_pending(FetchError::Envelope {
                    message: e.to_string(),
                }))
            }
        };

        let mut first_decode_error = None;

        for doc in envelope.docs {
            let key = DocKey::new(doc.index, doc.id);
            let Some(&idx) = self.by_doc.get(&key) else {
                warn!(group = %self.key, document = %key, "reply contains a document that was not requested");
                continue;
            };
            if self.entries[idx].status != EntryStatus::Pending {
                continue;
            }

            if !doc.found {
                self.resolve(idx, GetResponse::not_found());
                continue;
            }

            let source = doc.source.as_deref().map_or("null", RawValue::get);
            match self.decode_source(idx, source) {
                Ok(()) => self.resolve(idx, GetResponse::found()),
                Err(e) => {
                    let err = FetchError::Source {
                        index: key.index().to_string(),
                        document_id: key.document_id().to_string(),
                        message: e.to_string(),
                    };
                    warn!(group = %self.key, document = %key, error = %err, "failed to decode document source");
                    self.resolve(idx, GetResponse::failed(err.clone()));

                    match self.policy {
                        DecodeFailurePolicy::AbortGroup => return Err(err),
                        DecodeFailurePolicy::IsolateDocument => {
                            first_decode_error.get_or_insert(err);
                        }
                    }
                }
            }
        }

        // Whatever the reply did not mention was not found.
        self.resolve_pending(GetResponse::not_found());

        first_decode_error.map_or(Ok(()), Err)
    }

    fn decode_source(&self, idx: usize, source: &str) -> serde_json::Result<()> {
        let _guard = self.decode_lock.lock().unwrap_or_else(PoisonError::into_inner);
        match &self.entries[idx].req_resp {
            Some(rr) => rr.decode(source),
            None => Ok(()),
        }
    }

    fn resolve(&mut self, idx: usize, response: GetResponse) {
        let entry = &mut self.entries[idx];
        if let Some(rr) = entry.req_resp.take() {
            entry.status = EntryStatus::Resolved;
            rr.deliver(response);
        }
    }

    fn resolve_pending(&mut self, response: GetResponse) {
        for idx in 0..self.entries.len() {
            if self.entries[idx].status == EntryStatus::Pending {
                self.resolve(idx, response.clone());
            }
        }
    }

    /// Delivers `err` to every pending request and hands it back.
    fn fail_pending(&mut self, err: FetchError) -> FetchError {
        warn!(group = %self.key, documents = self.pending(), error = %err, "bulk get failed");
        self.resolve_pending(GetResponse::failed(err.clone()));
        err
    }
}

impl std::fmt::Debug for BulkRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BulkRequest")
            .field("key", &self.key)
            .field("state", &self.state)
            .field("pending", &self.pending())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batching::types::{DocumentSlot, GetRequest, ResultReceiver};
    use serde_json::Value;

    fn submit(bulk: &mut BulkRequest, index: &str, id: &str) -> ResultReceiver {
        let (rr, receiver) = ReqResp::new(
            GetRequest::new(index, id).with_fields(["Title"]),
            DocumentSlot::<Value>::new(),
        );
        bulk.add(rr);
        receiver
    }

    fn group(index: &str) -> BulkRequest {
        BulkRequest::new(
            GroupKey::of(&GetRequest::new(index, "").with_fields(["Title"])),
            DecodeFailurePolicy::AbortGroup,
        )
    }

    #[test]
    fn test_call_body_lists_pending_documents_in_order() {
        let mut bulk = group("movies");
        let _r1 = submit(&mut bulk, "movies", "1");
        let _r2 = submit(&mut bulk, "movies", "2");

        let call = bulk.build_call_body();
        let body: Value = serde_json::from_slice(&call.body().unwrap()).unwrap();

        assert_eq!(
            body,
            serde_json::json!({"docs": [
                {"_index": "movies", "_id": "1", "_source": {"include": ["Title"]}},
                {"_index": "movies", "_id": "2", "_source": {"include": ["Title"]}},
            ]})
        );
        assert_eq!(call.preference.as_deref(), Some("_local"));
        assert_eq!(call.realtime, Some(true));
    }

    #[test]
    fn test_duplicate_document_supersedes_earlier_request() {
        let mut bulk = group("movies");
        let mut first = submit(&mut bulk, "movies", "1");
        let mut second = submit(&mut bulk, "movies", "1");

        assert_eq!(bulk.pending(), 1);
        assert_eq!(bulk.build_call_body().docs.len(), 1);
        assert_eq!(
            bulk.status_of(&DocKey::new("movies", "1")),
            Some(EntryStatus::Pending)
        );
        assert!(first.try_recv().is_err());
        assert_eq!(second.try_recv(), Ok(None));
    }

    #[test]
    fn test_new_group_is_pending() {
        let bulk = group("movies");
        assert_eq!(bulk.state(), BulkState::Pending);
        assert_eq!(bulk.pending(), 0);
    }
}
