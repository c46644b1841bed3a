//! docbatch-engine: Point-get coalescing
//!
//! Many independent "fetch document D from index I" requests are grouped by
//! (field filter, index), served with one multi-get call per group, and each
//! result is routed back to the caller that asked for it.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │               docbatch-engine                 │
//! ├──────────────────────────────────────────────┤
//! │  batching/                                    │
//! │    types.rs   - Requests, responses, errors   │
//! │    key.rs     - Group and document keys       │
//! │    bulk.rs    - One multi-get per group       │
//! │    batch.rs   - Groups of a batch             │
//! │    context.rs - Timeout and cancellation      │
//! │    getter.rs  - Intake and flush policy       │
//! │  config.rs        - Configuration             │
//! │  observability.rs - Logging setup             │
//! └──────────────────────────────────────────────┘
//! ```

pub mod batching;
pub mod config;
pub mod observability;

// Re-exports for convenience
pub use batching::{
    Abandoned, Batch, BatchingGetter, BulkRequest, DecodeFailurePolicy, Destination,
    DocumentSlot, ExecContext, ExecutionMode, FetchError, GetRequest, GetResponse, ReqResp,
    ResultReceiver,
};
pub use config::{ConfigLoadError, DocbatchConfig};
