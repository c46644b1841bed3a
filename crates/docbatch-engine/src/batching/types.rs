//! Data types for point-get batching.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use serde::de::DeserializeOwned;
use tokio::sync::oneshot;
use tokio::sync::oneshot::error::TryRecvError;

/// A request for a single document by index and id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetRequest {
    /// The index holding the document.
    pub index: String,
    /// The document identifier.
    pub document_id: String,
    /// Source fields to return, in order. Empty means all fields.
    pub fields: Vec<String>,
}

impl GetRequest {
    /// Creates a request for the whole document.
    pub fn new(index: impl Into<String>, document_id: impl Into<String>) -> Self {
        Self {
            index: index.into(),
            document_id: document_id.into(),
            fields: Vec::new(),
        }
    }

    /// Restricts the returned source to `fields`.
    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }
}

/// Broad classification of a `FetchError`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The backend call failed before any response was obtained.
    Transport,
    /// The backend answered with a non-success, non-"not found" status.
    Backend,
    /// The reply envelope or a document payload could not be parsed.
    Decode,
}

/// Errors delivered to callers of a point-get.
///
/// The same error is fanned out to every request of a failed group, so it is
/// `Clone` and carries messages rather than source errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    /// The multi-get call failed in transport.
    #[error("transport error: {message}")]
    Transport { message: String },

    /// The execution context was cancelled before the call completed.
    #[error("request cancelled")]
    Cancelled,

    /// The execution context deadline passed before the call completed.
    #[error("request timed out after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// The backend returned an error status.
    #[error("HTTP error: status {status}: {body}")]
    Backend { status: u16, body: String },

    /// The backend returned a status that is neither success nor error.
    #[error("unexpected HTTP return code: {status}")]
    UnexpectedStatus { status: u16 },

    /// The reply body was not a multi-get envelope.
    #[error("error decoding body: {message}")]
    Envelope { message: String },

    /// A document source could not be decoded into its destination.
    #[error("error decoding source of {index}/{document_id}: {message}")]
    Source {
        index: String,
        document_id: String,
        message: String,
    },
}

impl FetchError {
    /// Classifies the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            FetchError::Transport { .. } | FetchError::Cancelled | FetchError::Timeout { .. } => {
                ErrorKind::Transport
            }
            FetchError::Backend { .. } | FetchError::UnexpectedStatus { .. } => ErrorKind::Backend,
            FetchError::Envelope { .. } | FetchError::Source { .. } => ErrorKind::Decode,
        }
    }
}

/// Result type for batch execution.
pub type FetchResult<T> = Result<T, FetchError>;

/// Outcome of one point-get.
///
/// `found == false` with no error means the document does not exist. Any
/// error means the request failed, whatever `found` says.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetResponse {
    pub found: bool,
    pub error: Option<FetchError>,
}

impl GetResponse {
    pub fn found() -> Self {
        Self {
            found: true,
            error: None,
        }
    }

    pub fn not_found() -> Self {
        Self {
            found: false,
            error: None,
        }
    }

    pub fn failed(error: FetchError) -> Self {
        Self {
            found: false,
            error: Some(error),
        }
    }

    /// True when the request did not fail (found or not).
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// The request was dropped without a result.
///
/// Happens when a duplicate submission superseded it, when its group was never
/// executed or aborted mid-way, or when the getter shut down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("request abandoned before a result was delivered")]
pub struct Abandoned;

/// Where a found document's source is decoded to.
///
/// The engine writes into a destination but never reads it back.
pub trait Destination: Send + 'static {
    /// Decodes `source` (JSON text) into the destination. On error the
    /// destination must be left untouched.
    fn decode(&self, source: &str) -> serde_json::Result<()>;
}

/// A shared slot receiving a decoded document of type `T`.
///
/// Clone it, hand one clone to the engine, keep the other to read the value
/// once the response arrives.
pub struct DocumentSlot<T> {
    inner: Arc<Mutex<Option<T>>>,
}

impl<T> DocumentSlot<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(None)),
        }
    }

    /// Takes the decoded document, leaving the slot empty.
    pub fn take(&self) -> Option<T> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    pub fn is_filled(&self) -> bool {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

impl<T: Clone> DocumentSlot<T> {
    /// Copy of the decoded document, if any.
    pub fn get(&self) -> Option<T> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl<T> Clone for DocumentSlot<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Default for DocumentSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for DocumentSlot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentSlot")
            .field("filled", &self.is_filled())
            .finish()
    }
}

impl<T> Destination for DocumentSlot<T>
where
    T: DeserializeOwned + Send + 'static,
{
    fn decode(&self, source: &str) -> serde_json::Result<()> {
        let value: T = serde_json::from_str(source)?;
        *self.inner.lock().unwrap_or_else(PoisonError::into_inner) = Some(value);
        Ok(())
    }
}

/// A submitted point-get: the request, its destination and the single-use
/// sender its result is delivered on.
pub struct ReqResp {
    request: GetRequest,
    destination: Box<dyn Destination>,
    sender: oneshot::Sender<GetResponse>,
}

impl ReqResp {
    /// Pairs a request with its destination, returning the receiver the
    /// caller awaits.
    pub fn new(request: GetRequest, destination: impl Destination) -> (Self, ResultReceiver) {
        let (sender, receiver) = oneshot::channel();
        let rr = Self {
            request,
            destination: Box::new(destination),
            sender,
        };
        (rr, ResultReceiver { inner: receiver })
    }

    pub fn request(&self) -> &GetRequest {
        &self.request
    }

    pub(crate) fn decode(&self, source: &str) -> serde_json::Result<()> {
        self.destination.decode(source)
    }

    /// Sends the one and only response, closing the channel.
    pub(crate) fn deliver(self, response: GetResponse) {
        // The caller may have stopped waiting; nothing to do then.
        let _ = self.sender.send(response);
    }
}

impl fmt::Debug for ReqResp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReqResp")
            .field("request", &self.request)
            .finish_non_exhaustive()
    }
}

/// Caller side of a submitted point-get.
#[derive(Debug)]
pub struct ResultReceiver {
    inner: oneshot::Receiver<GetResponse>,
}

impl ResultReceiver {
    /// Waits for the response.
    ///
    /// # Errors
    ///
    /// Returns `Abandoned` if the request was dropped without a result.
    pub async fn recv(self) -> Result<GetResponse, Abandoned> {
        self.inner.await.map_err(|_| Abandoned)
    }

    /// Polls without waiting. `Ok(None)` means the request is still open.
    pub fn try_recv(&mut self) -> Result<Option<GetResponse>, Abandoned> {
        match self.inner.try_recv() {
            Ok(response) => Ok(Some(response)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Closed) => Err(Abandoned),
        }
    }
}
