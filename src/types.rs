//! Core types for segment-dl

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Position of a segment in the remote sequence
///
/// Indices are the ordering key and the identity of a segment within a run.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct SegmentIndex(pub u64);

impl SegmentIndex {
    /// Create a new SegmentIndex
    pub fn new(index: u64) -> Self {
        Self(index)
    }

    /// Get the inner u64 value
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl From<u64> for SegmentIndex {
    fn from(index: u64) -> Self {
        Self(index)
    }
}

impl From<SegmentIndex> for u64 {
    fn from(index: SegmentIndex) -> Self {
        index.0
    }
}

impl PartialEq<u64> for SegmentIndex {
    fn eq(&self, other: &u64) -> bool {
        self.0 == *other
    }
}

impl std::fmt::Display for SegmentIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for SegmentIndex {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

/// Availability of a single index as reported by a probe
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum ProbeStatus {
    /// HTTP 200: the segment exists
    Available,
    /// HTTP 404: end of the sequence
    Terminal,
    /// Any other status, or no response after all retries (status 0)
    TransientError {
        /// Last observed HTTP status, 0 if the request never completed
        status: u16,
    },
}

impl ProbeStatus {
    /// Classify a raw HTTP status code
    pub fn from_status(status: u16) -> Self {
        match status {
            200 => ProbeStatus::Available,
            404 => ProbeStatus::Terminal,
            other => ProbeStatus::TransientError { status: other },
        }
    }
}

/// Result of probing one index
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProbeOutcome {
    /// Probed index
    pub index: SegmentIndex,
    /// Address that was probed
    pub url: String,
    /// Classified result
    pub status: ProbeStatus,
}

/// Durably stored, non-empty local copy of a segment
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentRecord {
    /// Segment index
    pub index: SegmentIndex,
    /// Absolute path of the local file
    pub path: PathBuf,
}

/// Result of retrieving one index (after internal retries)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetrievalOutcome {
    /// Retrieved index
    pub index: SegmentIndex,
    /// Destination path of the segment
    pub path: PathBuf,
    /// Whether the segment is now stored locally
    pub success: bool,
}

impl RetrievalOutcome {
    /// Convert a successful outcome into a record, dropping failures
    pub fn into_record(self) -> Option<SegmentRecord> {
        self.success.then_some(SegmentRecord {
            index: self.index,
            path: self.path,
        })
    }
}

/// Why discovery stopped
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "reason")]
pub enum Termination {
    /// A probe returned 404 at `index`
    Terminal {
        /// First absent index
        index: SegmentIndex,
    },
    /// A whole batch produced neither an available nor a terminal index
    Exhausted,
    /// The configured maximum index was reached
    LimitReached,
    /// The run was cancelled between batches
    Cancelled,
}

/// Counters collected over a run
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    /// Number of probe batches issued
    pub batches: u64,
    /// Indices probed
    pub probed: u64,
    /// Indices probed as available (before the terminal cutoff)
    pub available: u64,
    /// Indices satisfied by an existing local copy
    pub reused: u64,
    /// Indices freshly downloaded
    pub downloaded: u64,
    /// Indices skipped because of an unexpected probe status
    pub skipped: u64,
    /// Indices whose retrieval failed
    pub failed: u64,
}

/// Outcome of a complete discovery-and-retrieval run
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunReport {
    /// Successfully stored segments, strictly increasing by index
    pub segments: Vec<SegmentRecord>,
    /// Why the run stopped
    pub termination: Termination,
    /// Run counters
    pub stats: RunStats,
    /// When the run started
    pub started_at: DateTime<Utc>,
    /// When the run finished
    pub finished_at: DateTime<Utc>,
}

impl RunReport {
    /// Local paths of all stored segments, in index order
    pub fn paths(&self) -> Vec<PathBuf> {
        self.segments.iter().map(|s| s.path.clone()).collect()
    }

    /// Whether no segment was stored
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

/// Progress events emitted by the pipeline
///
/// Subscribe with [`SegmentPipeline::subscribe`](crate::SegmentPipeline::subscribe).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A batch is about to be probed
    BatchStarted {
        /// First index of the batch
        start: SegmentIndex,
        /// Number of indices in the batch
        size: u64,
    },
    /// A segment was downloaded and stored
    SegmentStored {
        /// Segment index
        index: SegmentIndex,
        /// Local path
        path: PathBuf,
    },
    /// A valid local copy was found, no download needed
    SegmentReused {
        /// Segment index
        index: SegmentIndex,
        /// Local path
        path: PathBuf,
    },
    /// A segment was excluded from the output
    SegmentSkipped {
        /// Segment index
        index: SegmentIndex,
        /// Human-readable reason
        reason: String,
    },
    /// A batch finished retrieval
    BatchCompleted {
        /// First index of the batch
        start: SegmentIndex,
        /// Segments accumulated so far
        total_segments: usize,
    },
    /// Discovery finished
    Finished {
        /// Why the run stopped
        termination: Termination,
        /// Number of segments stored
        total_segments: usize,
    },
}
