//! Segment discovery and retrieval pipeline.
//!
//! Split into focused submodules:
//! - [`probe_pool`] - Bounded-concurrency existence checks for one batch
//! - [`retrieval_pool`] - Bounded-concurrency downloads into the segment store
//! - [`coordinator`] - Batch state machine: probe, filter, retrieve, advance
//! - [`sequencer`] - Index-ordered accumulation of stored segments
//!
//! Each batch runs its phases strictly one after another, and the next batch
//! starts only after the previous batch's retrieval has joined.

mod coordinator;
mod probe_pool;
mod retrieval_pool;
mod sequencer;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;

pub use coordinator::Coordinator;
pub use probe_pool::ProbePool;
pub use retrieval_pool::{RetrievalJob, RetrievalPool};
pub use sequencer::Sequencer;

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::assembly::{Assembler, Player, deliver};
use crate::config::{Config, UnexpectedStatusPolicy};
use crate::error::{Error, Result};
use crate::retry::IsRetryable;
use crate::source::{HttpSource, SegmentSource};
use crate::storage::SegmentStore;
use crate::types::{Event, RunReport};

/// Capacity of the progress event channel
const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Entry point: owns the configuration, the network source and the event channel
///
/// # Example
///
/// ```no_run
/// use segment_dl::{Config, SegmentPipeline};
///
/// # async fn example() -> segment_dl::Result<()> {
/// let config = Config::for_source("https://cdn.example.com/v1/segment/720p/720p");
/// let pipeline = SegmentPipeline::new(config)?;
/// let report = pipeline.run().await?;
/// println!("stored {} segments", report.segments.len());
/// # Ok(())
/// # }
/// ```
pub struct SegmentPipeline {
    config: Arc<Config>,
    source: Arc<dyn SegmentSource>,
    event_tx: broadcast::Sender<Event>,
    cancel_token: CancellationToken,
}

impl SegmentPipeline {
    /// Validate `config` and build a pipeline that talks HTTP
    pub fn new(config: Config) -> Result<Self> {
        let source = HttpSource::new(&config.source.user_agent)?;
        Self::with_source(config, Arc::new(source))
    }

    /// Validate `config` and build a pipeline on top of a custom source
    pub fn with_source(config: Config, source: Arc<dyn SegmentSource>) -> Result<Self> {
        config.validate()?;
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Ok(Self {
            config: Arc::new(config),
            source,
            event_tx,
            cancel_token: CancellationToken::new(),
        })
    }

    /// Subscribe to progress events
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Token that stops the run before the next batch is scheduled
    ///
    /// Work already submitted for the current batch always completes.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    /// Configuration in use
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Discover and download every available segment
    pub async fn run(&self) -> Result<RunReport> {
        let store = SegmentStore::from_config(&self.config).await?;
        let coordinator = Coordinator::new(
            Arc::clone(&self.config),
            Arc::clone(&self.source),
            store,
            self.event_tx.clone(),
            self.cancel_token.clone(),
        );
        coordinator.run().await
    }

    /// Run discovery, then merge the segments and hand the result to `player`
    ///
    /// Returns [`Error::NoSegments`] without touching the assembler when nothing
    /// was stored.
    pub async fn run_and_deliver(
        &self,
        assembler: &dyn Assembler,
        player: &dyn Player,
    ) -> Result<PathBuf> {
        let report = self.run().await?;
        deliver(&report, &self.config.download.output_file, assembler, player).await
    }
}

/// Failure of a single network attempt, as seen by the retry wrapper
#[derive(Debug)]
pub(crate) enum AttemptError {
    /// The request completed with a status the caller does not accept
    Status {
        /// HTTP status code
        status: u16,
        /// Whether the unexpected-status policy allows retrying it
        retryable: bool,
    },
    /// The request did not complete
    Transport(Error),
}

impl AttemptError {
    /// Classify a non-success status under `policy`
    pub(crate) fn status(status: u16, policy: UnexpectedStatusPolicy) -> Self {
        let retryable =
            policy == UnexpectedStatusPolicy::Retry && (status >= 500 || status == 429);
        AttemptError::Status { status, retryable }
    }
}

impl std::fmt::Display for AttemptError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AttemptError::Status { status, .. } => write!(f, "unexpected HTTP status {}", status),
            AttemptError::Transport(e) => write!(f, "{}", e),
        }
    }
}

impl IsRetryable for AttemptError {
    fn is_retryable(&self) -> bool {
        match self {
            AttemptError::Status { retryable, .. } => *retryable,
            AttemptError::Transport(e) => e.is_retryable(),
        }
    }
}
