//! Batch coordinator: drives batches through probing, filtering, retrieval and advance.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::config::{Config, UnexpectedStatusPolicy};
use crate::error::{Error, Result};
use crate::locator::ResourceLocator;
use crate::source::SegmentSource;
use crate::storage::SegmentStore;
use crate::types::{
    Event, ProbeOutcome, ProbeStatus, RetrievalOutcome, RunReport, RunStats, SegmentIndex,
    SegmentRecord, Termination,
};

use super::probe_pool::ProbePool;
use super::retrieval_pool::{RetrievalJob, RetrievalPool};
use super::sequencer::Sequencer;

/// State carried from one batch to the next
#[derive(Debug)]
struct RunState {
    next_start: u64,
    sequencer: Sequencer,
    stats: RunStats,
}

/// Interpretation of one batch of index-sorted probe outcomes
#[derive(Debug, Default)]
pub(super) struct BatchVerdict {
    /// Available indices before the terminal cutoff, ascending
    pub(super) available: Vec<ProbeOutcome>,
    /// Indices skipped because of an unexpected status, ascending
    pub(super) skipped: Vec<ProbeOutcome>,
    /// Set when this batch ends discovery
    pub(super) termination: Option<Termination>,
}

/// Owns the run state and sequences the per-batch phases
///
/// Phases per batch:
/// 1. Probe `[start, start + batch_size)` and wait for every probe
/// 2. Sort outcomes by index, find the terminal cutoff
/// 3. Reuse valid local copies
/// 4. Download the rest and wait for every download
/// 5. Append the batch to the sequencer and advance
pub struct Coordinator {
    config: Arc<Config>,
    locator: ResourceLocator,
    store: SegmentStore,
    probe_pool: ProbePool,
    retrieval_pool: RetrievalPool,
    event_tx: broadcast::Sender<Event>,
    cancel_token: CancellationToken,
}

impl Coordinator {
    /// Wire both pools to `source` and `store`
    pub fn new(
        config: Arc<Config>,
        source: Arc<dyn SegmentSource>,
        store: SegmentStore,
        event_tx: broadcast::Sender<Event>,
        cancel_token: CancellationToken,
    ) -> Self {
        let locator = ResourceLocator::from_config(&config.source);
        let probe_pool = ProbePool::new(
            Arc::clone(&source),
            locator.clone(),
            config.probe.clone(),
            config.unexpected_status,
            config.download.batch_size,
        );
        let retrieval_pool = RetrievalPool::new(
            source,
            store.clone(),
            config.retrieval.clone(),
            config.unexpected_status,
        );

        Self {
            config,
            locator,
            store,
            probe_pool,
            retrieval_pool,
            event_tx,
            cancel_token,
        }
    }

    /// Run batches until a terminal, exhausted, limit or cancelled state is reached
    ///
    /// Only [`UnexpectedStatusPolicy::Abort`] turns a per-index problem into an error.
    pub async fn run(&self) -> Result<RunReport> {
        let started_at = Utc::now();
        let mut state = RunState {
            next_start: self.config.download.start_index,
            sequencer: Sequencer::new(),
            stats: RunStats::default(),
        };

        tracing::info!(
            base_url = %self.config.source.base_url,
            start_index = state.next_start,
            batch_size = self.config.download.batch_size,
            download_dir = %self.store.dir().display(),
            "Starting segment discovery"
        );

        let termination = loop {
            if self.cancel_token.is_cancelled() {
                tracing::info!(next_start = state.next_start, "Run cancelled");
                break Termination::Cancelled;
            }
            let Some(batch) = self.next_batch(state.next_start) else {
                tracing::info!(next_start = state.next_start, "Reached configured max index");
                break Termination::LimitReached;
            };
            let batch_end = batch
                .last()
                .map(|index| index.get() + 1)
                .unwrap_or(state.next_start);

            let outcomes = self.probe_phase(&batch, &mut state.stats).await;
            let verdict = self.interpret(outcomes, &mut state.stats)?;
            let (reused, jobs) = self.filter_phase(&verdict.available).await;
            let fetched = self.retrieve_phase(jobs).await;
            self.advance(&mut state, batch_end, reused, fetched);

            if let Some(termination) = verdict.termination {
                break termination;
            }
        };

        let segments = state.sequencer.finish();
        tracing::info!(
            termination = ?termination,
            segments = segments.len(),
            downloaded = state.stats.downloaded,
            reused = state.stats.reused,
            skipped = state.stats.skipped,
            failed = state.stats.failed,
            "Segment discovery finished"
        );
        self.emit(Event::Finished {
            termination,
            total_segments: segments.len(),
        });

        Ok(RunReport {
            segments,
            termination,
            stats: state.stats,
            started_at,
            finished_at: Utc::now(),
        })
    }

    /// Indices of the batch starting at `start`, clipped to the configured max index
    fn next_batch(&self, start: u64) -> Option<Vec<SegmentIndex>> {
        let size = self.config.download.batch_size as u64;
        let mut end = start.saturating_add(size);
        if let Some(max) = self.config.download.max_index {
            if start >= max {
                return None;
            }
            end = end.min(max);
        }
        Some((start..end).map(SegmentIndex).collect())
    }

    /// Probe the whole batch and wait for every result
    async fn probe_phase(&self, batch: &[SegmentIndex], stats: &mut RunStats) -> Vec<ProbeOutcome> {
        let start = batch.first().copied().unwrap_or_default();
        self.emit(Event::BatchStarted {
            start,
            size: batch.len() as u64,
        });
        tracing::debug!(batch_start = start.get(), size = batch.len(), "Probing batch");

        let outcomes = self.probe_pool.probe_batch(batch).await;
        stats.batches += 1;
        stats.probed += outcomes.len() as u64;
        outcomes
    }

    /// Sort outcomes by index and apply the terminal cutoff and leniency policy
    fn interpret(&self, outcomes: Vec<ProbeOutcome>, stats: &mut RunStats) -> Result<BatchVerdict> {
        let verdict = interpret_outcomes(outcomes, self.config.unexpected_status)?;

        for outcome in &verdict.skipped {
            if let ProbeStatus::TransientError { status } = outcome.status {
                tracing::warn!(
                    index = outcome.index.get(),
                    status = status,
                    url = %outcome.url,
                    "Segment probe returned unexpected status, skipping"
                );
                self.emit(Event::SegmentSkipped {
                    index: outcome.index,
                    reason: format!("probe status {}", status),
                });
            }
        }
        if let Some(Termination::Terminal { index }) = verdict.termination {
            tracing::info!(index = index.get(), "Found end of sequence (404)");
        }

        stats.available += verdict.available.len() as u64;
        stats.skipped += verdict.skipped.len() as u64;
        Ok(verdict)
    }

    /// Split available indices into existing local copies and download jobs
    async fn filter_phase(
        &self,
        available: &[ProbeOutcome],
    ) -> (Vec<SegmentRecord>, Vec<RetrievalJob>) {
        let mut reused = Vec::new();
        let mut jobs = Vec::new();

        for outcome in available {
            match self.store.existing(outcome.index).await {
                Some(record) => {
                    tracing::debug!(index = outcome.index.get(), "Reusing existing local copy");
                    self.emit(Event::SegmentReused {
                        index: record.index,
                        path: record.path.clone(),
                    });
                    reused.push(record);
                }
                None => jobs.push(RetrievalJob {
                    index: outcome.index,
                    url: self.locator.address(outcome.index),
                }),
            }
        }

        (reused, jobs)
    }

    /// Download every job and wait for all of them
    async fn retrieve_phase(&self, jobs: Vec<RetrievalJob>) -> Vec<RetrievalOutcome> {
        if jobs.is_empty() {
            return Vec::new();
        }
        let outcomes = self.retrieval_pool.retrieve_batch(jobs).await;

        for outcome in &outcomes {
            if outcome.success {
                self.emit(Event::SegmentStored {
                    index: outcome.index,
                    path: outcome.path.clone(),
                });
            } else {
                self.emit(Event::SegmentSkipped {
                    index: outcome.index,
                    reason: "download failed".to_string(),
                });
            }
        }
        outcomes
    }

    /// Append this batch's successes to the run and move to the next batch
    fn advance(
        &self,
        state: &mut RunState,
        batch_end: u64,
        reused: Vec<SegmentRecord>,
        fetched: Vec<RetrievalOutcome>,
    ) {
        state.stats.reused += reused.len() as u64;

        let mut records = reused;
        for outcome in fetched {
            match outcome.into_record() {
                Some(record) => {
                    state.stats.downloaded += 1;
                    records.push(record);
                }
                None => state.stats.failed += 1,
            }
        }

        let batch_start = state.next_start;
        state.sequencer.push_batch(records);
        state.next_start = batch_end;

        tracing::debug!(
            batch_start = batch_start,
            next_start = state.next_start,
            total_segments = state.sequencer.len(),
            "Batch complete"
        );
        self.emit(Event::BatchCompleted {
            start: SegmentIndex(batch_start),
            total_segments: state.sequencer.len(),
        });
    }

    fn emit(&self, event: Event) {
        // No subscribers is fine
        self.event_tx.send(event).ok();
    }
}

/// Interpret one batch of probe outcomes, independent of arrival order
///
/// The first 404 in index order ends discovery and everything after it is
/// discarded, even if it was probed as available. A batch with neither an
/// available nor a terminal index ends the run as exhausted.
pub(super) fn interpret_outcomes(
    mut outcomes: Vec<ProbeOutcome>,
    policy: UnexpectedStatusPolicy,
) -> Result<BatchVerdict> {
    outcomes.sort_by_key(|outcome| outcome.index);

    let mut verdict = BatchVerdict::default();
    for outcome in outcomes {
        match outcome.status {
            ProbeStatus::Available => verdict.available.push(outcome),
            ProbeStatus::Terminal => {
                verdict.termination = Some(Termination::Terminal {
                    index: outcome.index,
                });
                break;
            }
            ProbeStatus::TransientError { status } => {
                if policy == UnexpectedStatusPolicy::Abort && status != 0 {
                    return Err(Error::UnexpectedStatus {
                        index: outcome.index,
                        status,
                    });
                }
                verdict.skipped.push(outcome);
            }
        }
    }

    if verdict.termination.is_none() && verdict.available.is_empty() {
        verdict.termination = Some(Termination::Exhausted);
    }
    Ok(verdict)
}
