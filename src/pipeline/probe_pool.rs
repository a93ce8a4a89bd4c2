//! Concurrent existence checks for one batch of indices.

use std::sync::Arc;

use futures::stream::{self, StreamExt};

use crate::config::{ProbeConfig, UnexpectedStatusPolicy};
use crate::locator::ResourceLocator;
use crate::retry::download_with_retry;
use crate::source::SegmentSource;
use crate::types::{ProbeOutcome, ProbeStatus, SegmentIndex};

use super::AttemptError;

/// Bounded-concurrency existence checker
///
/// At most `concurrency` probes are in flight at once. Results come back in
/// completion order; callers must sort them before interpreting them.
pub struct ProbePool {
    source: Arc<dyn SegmentSource>,
    locator: ResourceLocator,
    config: ProbeConfig,
    policy: UnexpectedStatusPolicy,
    concurrency: usize,
}

impl ProbePool {
    /// Create a pool that probes through `source`
    pub fn new(
        source: Arc<dyn SegmentSource>,
        locator: ResourceLocator,
        config: ProbeConfig,
        policy: UnexpectedStatusPolicy,
        concurrency: usize,
    ) -> Self {
        Self {
            source,
            locator,
            config,
            policy,
            concurrency: concurrency.max(1),
        }
    }

    /// Probe every index in `indices`, returning one outcome per index in arrival order
    pub async fn probe_batch(&self, indices: &[SegmentIndex]) -> Vec<ProbeOutcome> {
        stream::iter(indices.iter().copied())
            .map(|index| self.probe_one(index))
            .buffer_unordered(self.concurrency)
            .collect()
            .await
    }

    /// Probe a single index, retrying timeouts and connection errors
    ///
    /// Exhausted retries are reported as `TransientError { status: 0 }`.
    pub async fn probe_one(&self, index: SegmentIndex) -> ProbeOutcome {
        let url = self.locator.address(index);
        let source = &self.source;
        let target = url.as_str();
        let timeout = self.config.timeout;
        let policy = self.policy;

        let result = download_with_retry(&self.config.retry, || async move {
            match source.probe(target, timeout).await {
                Ok(status @ (200 | 404)) => Ok(status),
                Ok(other) => Err(AttemptError::status(other, policy)),
                Err(e) => Err(AttemptError::Transport(e)),
            }
        })
        .await;

        let status = match result {
            Ok(code) => ProbeStatus::from_status(code),
            Err(AttemptError::Status { status, .. }) => ProbeStatus::TransientError { status },
            Err(AttemptError::Transport(e)) => {
                tracing::warn!(
                    index = index.get(),
                    url = %url,
                    error = %e,
                    "Probe failed after retries, treating as unavailable"
                );
                ProbeStatus::TransientError { status: 0 }
            }
        };

        tracing::trace!(index = index.get(), status = ?status, "Probed segment");
        ProbeOutcome { index, url, status }
    }
}
