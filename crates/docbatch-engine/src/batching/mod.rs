//! Point-get batching.
//!
//! Requests flow through two levels:
//!
//! 1. **Batch**: partitions requests into groups sharing an index and a field
//!    filter, and drives their execution
//! 2. **BulkRequest**: turns one group into a single multi-get call, decodes the
//!    reply and resolves every request exactly once
//!
//! Each caller holds a `ResultReceiver` that yields one `GetResponse`, or
//! `Abandoned` if its request was dropped unresolved.

mod batch;
mod bulk;
mod context;
mod getter;
mod key;
mod types;

pub use batch::{Batch, ExecutionMode};
pub use bulk::{BulkRequest, BulkState, DecodeFailurePolicy, EntryStatus};
pub use context::{CancelHandle, ExecContext};
pub use getter::BatchingGetter;
pub use key::{DocKey, GroupKey};
pub use types::{
    Abandoned, Destination, DocumentSlot, ErrorKind, FetchError, FetchResult, GetRequest,
    GetResponse, ReqResp, ResultReceiver,
};
