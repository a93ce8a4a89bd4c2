//! Concurrent full-body downloads into the segment store.

use std::sync::Arc;

use futures::stream::{self, StreamExt};

use crate::config::{RetrievalConfig, UnexpectedStatusPolicy};
use crate::retry::download_with_retry;
use crate::source::SegmentSource;
use crate::storage::SegmentStore;
use crate::types::{RetrievalOutcome, SegmentIndex};

use super::AttemptError;

/// One index scheduled for download
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetrievalJob {
    /// Segment index
    pub index: SegmentIndex,
    /// Remote address
    pub url: String,
}

/// Bounded-concurrency fetcher
///
/// Concurrency equals the number of jobs submitted with each batch. Every
/// worker writes only its own destination file.
pub struct RetrievalPool {
    source: Arc<dyn SegmentSource>,
    store: SegmentStore,
    config: RetrievalConfig,
    policy: UnexpectedStatusPolicy,
}

impl RetrievalPool {
    /// Create a pool that downloads through `source` into `store`
    pub fn new(
        source: Arc<dyn SegmentSource>,
        store: SegmentStore,
        config: RetrievalConfig,
        policy: UnexpectedStatusPolicy,
    ) -> Self {
        Self {
            source,
            store,
            config,
            policy,
        }
    }

    /// Download all jobs, returning one outcome per job in completion order
    pub async fn retrieve_batch(&self, jobs: Vec<RetrievalJob>) -> Vec<RetrievalOutcome> {
        let concurrency = jobs.len().max(1);
        stream::iter(jobs)
            .map(|job| self.retrieve_one(job))
            .buffer_unordered(concurrency)
            .collect()
            .await
    }

    /// Download a single segment and persist it
    ///
    /// Non-200 responses fail the attempt without retry (unless the
    /// unexpected-status policy says otherwise); timeouts and connection
    /// errors are retried with the configured backoff.
    pub async fn retrieve_one(&self, job: RetrievalJob) -> RetrievalOutcome {
        let RetrievalJob { index, url } = job;
        let path = self.store.path_for(index);
        let source = &self.source;
        let target = url.as_str();
        let timeout = self.config.timeout;
        let policy = self.policy;

        let body = match download_with_retry(&self.config.retry, || async move {
            match source.fetch(target, timeout).await {
                Ok(response) if response.status == 200 => Ok(response.body),
                Ok(response) => Err(AttemptError::status(response.status, policy)),
                Err(e) => Err(AttemptError::Transport(e)),
            }
        })
        .await
        {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(
                    index = index.get(),
                    url = %url,
                    error = %e,
                    "Segment download failed, excluding it"
                );
                return RetrievalOutcome {
                    index,
                    path,
                    success: false,
                };
            }
        };

        match self.store.persist(index, &body).await {
            Ok(record) => {
                tracing::debug!(
                    index = index.get(),
                    bytes = body.len(),
                    path = %record.path.display(),
                    "Stored segment"
                );
                RetrievalOutcome {
                    index,
                    path: record.path,
                    success: true,
                }
            }
            Err(e) => {
                tracing::warn!(index = index.get(), error = %e, "Failed to store segment");
                RetrievalOutcome {
                    index,
                    path,
                    success: false,
                }
            }
        }
    }
}
