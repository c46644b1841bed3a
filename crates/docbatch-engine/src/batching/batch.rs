//! A batch: point-gets partitioned into multi-get groups.

use std::collections::HashMap;

use docbatch_backend::MultiGetClient;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::bulk::{BulkRequest, BulkState, DecodeFailurePolicy};
use super::context::ExecContext;
use super::key::GroupKey;
use super::types::{FetchResult, ReqResp};

/// How the groups of a batch are executed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// One group after the other in insertion order, stopping at the first
    /// group that fails. Later groups are left unexecuted.
    #[default]
    Sequential,
    /// All groups at once. Every group executes; the error returned is the
    /// first one in insertion order.
    Concurrent,
}

/// Groups of point-gets keyed by (field filter, index).
///
/// Filled by a single writer, executed once, then dropped. Requests in groups
/// that never executed stay open while the batch lives and are abandoned when
/// it is dropped.
pub struct Batch {
    groups: Vec<BulkRequest>,
    by_key: HashMap<GroupKey, usize>,
    mode: ExecutionMode,
    decode_failure: DecodeFailurePolicy,
}

impl Batch {
    pub fn new(mode: ExecutionMode, decode_failure: DecodeFailurePolicy) -> Self {
        Self {
            groups: Vec::new(),
            by_key: HashMap::new(),
            mode,
            decode_failure,
        }
    }

    /// Routes a request into its group, creating the group on first use.
    pub fn add(&mut self, rr: ReqResp) {
        let key = GroupKey::of(rr.request());
        let idx = match self.by_key.get(&key) {
            Some(&idx) => idx,
            None => {
                let idx = self.groups.len();
                self.groups
                    .push(BulkRequest::new(key.clone(), self.decode_failure));
                self.by_key.insert(key, idx);
                idx
            }
        };
        self.groups[idx].add(rr);
    }

    /// Number of groups.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Requests across all groups still waiting for a result.
    pub fn pending_requests(&self) -> usize {
        self.groups.iter().map(BulkRequest::pending).sum()
    }

    pub fn group(&self, key: &GroupKey) -> Option<&BulkRequest> {
        self.by_key.get(key).map(|&idx| &self.groups[idx])
    }

    /// Keys of the groups that have not been executed, in insertion order.
    pub fn unexecuted_groups(&self) -> Vec<&GroupKey> {
        self.groups
            .iter()
            .filter(|g| g.state() == BulkState::Pending)
            .map(BulkRequest::key)
            .collect()
    }

    /// Executes every group that has not run yet.
    ///
    /// # Errors
    ///
    /// Returns the error of the first failing group (see `ExecutionMode`).
    pub async fn execute(
        &mut self,
        ctx: &ExecContext,
        client: &dyn MultiGetClient,
    ) -> FetchResult<()> {
        debug!(
            groups = self.groups.len(),
            requests = self.pending_requests(),
            mode = ?self.mode,
            "executing batch"
        );

        match self.mode {
            ExecutionMode::Sequential => {
                let total = self.groups.len();
                for (position, group) in self.groups.iter_mut().enumerate() {
                    if group.state() != BulkState::Pending {
                        continue;
                    }
                    if let Err(err) = group.execute(ctx, client).await {
                        warn!(
                            group = %group.key(),
                            skipped_groups = total - position - 1,
                            error = %err,
                            "batch stopped at failing group"
                        );
                        return Err(err);
                    }
                }
                Ok(())
            }
            ExecutionMode::Concurrent => {
                let results = join_all(
                    self.groups
                        .iter_mut()
                        .filter(|g| g.state() == BulkState::Pending)
                        .map(|g| g.execute(ctx, client)),
                )
                .await;
                results.into_iter().find_map(Result::err).map_or(Ok(()), Err)
            }
        }
    }
}

impl Default for Batch {
    fn default() -> Self {
        Self::new(ExecutionMode::default(), DecodeFailurePolicy::default())
    }
}

impl Drop for Batch {
    fn drop(&mut self) {
        let pending = self.pending_requests();
        if pending > 0 {
            debug!(pending, "abandoning unresolved requests");
        }
    }
}

impl std::fmt::Debug for Batch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Batch")
            .field("groups", &self.groups)
            .field("mode", &self.mode)
            .field("decode_failure", &self.decode_failure)
            .finish()
    }
}
