//! MultiGetClient trait definition.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::BackendResult;

/// Preference hint routing the read to a local shard copy.
pub const PREFERENCE_LOCAL: &str = "_local";

/// Source filtering for one requested document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFilter {
    /// Top-level fields to return.
    pub include: Vec<String>,
}

/// One document addressed by a multi-get call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiGetDoc {
    #[serde(rename = "_index")]
    pub index: String,
    #[serde(rename = "_id")]
    pub id: String,
    /// Absent when the whole source is wanted.
    #[serde(rename = "_source", default, skip_serializing_if = "Option::is_none")]
    pub source: Option<SourceFilter>,
}

impl MultiGetDoc {
    /// Creates a document reference, filtering the source when `fields` is non-empty.
    pub fn new(index: impl Into<String>, id: impl Into<String>, fields: &[String]) -> Self {
        let source = if fields.is_empty() {
            None
        } else {
            Some(SourceFilter {
                include: fields.to_vec(),
            })
        };
        Self {
            index: index.into(),
            id: id.into(),
            source,
        }
    }
}

/// A multi-get call.
///
/// Serializing this struct yields the request body (`{"docs": [...]}`); the
/// preference and realtime hints travel as query parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiGetRequest {
    pub docs: Vec<MultiGetDoc>,
    #[serde(skip)]
    pub preference: Option<String>,
    #[serde(skip)]
    pub realtime: Option<bool>,
}

impl MultiGetRequest {
    /// Creates a request without hints.
    pub fn new(docs: Vec<MultiGetDoc>) -> Self {
        Self {
            docs,
            preference: None,
            realtime: None,
        }
    }

    /// Routes to the local shard and reads in real time, bypassing any
    /// backend-side read caching.
    pub fn local_realtime(mut self) -> Self {
        self.preference = Some(PREFERENCE_LOCAL.to_string());
        self.realtime = Some(true);
        self
    }

    /// Serializes the request body.
    pub fn body(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}

/// Raw reply to a multi-get call: an HTTP status and an undecoded body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultiGetReply {
    pub status: u16,
    pub body: Vec<u8>,
}

impl MultiGetReply {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Body as text, lossy, for error reporting.
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// A backend able to fetch several documents in one round trip.
///
/// Implementations must be thread-safe (Send + Sync). A call that produced
/// any HTTP response returns `Ok`, whatever the status; `Err` means the
/// transport failed.
#[async_trait]
pub trait MultiGetClient: Send + Sync + 'static {
    /// Performs one multi-get call.
    async fn multi_get(&self, request: &MultiGetRequest) -> BackendResult<MultiGetReply>;
}
