//! docbatch-backend: Multi-get backend abstraction
//!
//! This crate describes the one backend operation the batching engine needs,
//! a multi-document get, and ships two implementations:
//! - `HttpMultiGetClient` talks to an OpenSearch/Elasticsearch `_mget` endpoint
//! - `MemoryBackend` serves documents from memory for testing
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │              docbatch-backend                │
//! ├─────────────────────────────────────────────┤
//! │  traits.rs - MultiGetClient + wire types    │
//! │  http.rs   - reqwest `_mget` client         │
//! │  memory.rs - In-memory implementation       │
//! └─────────────────────────────────────────────┘
//! ```

pub mod error;
pub mod http;
pub mod memory;
pub mod traits;

// Re-export commonly used types
pub use error::{BackendError, BackendResult};
pub use http::{HttpClientConfig, HttpMultiGetClient};
pub use memory::{InjectedFailure, MemoryBackend};
pub use traits::{
    MultiGetClient, MultiGetDoc, MultiGetReply, MultiGetRequest, SourceFilter, PREFERENCE_LOCAL,
};
