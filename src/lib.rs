//! # segment-dl
//!
//! Discovers, downloads and reassembles sequentially indexed media segments
//! published over HTTP under a predictable address pattern.
//!
//! ## How it works
//!
//! Segment `n` lives at `{base_url}{n}{extension}`. The total count is unknown,
//! so discovery walks the index space in fixed-size batches:
//!
//! 1. Probe every index of the batch concurrently (HEAD)
//! 2. Sort the results by index; the first 404 marks the end of the sequence
//! 3. Reuse valid local copies, download the rest concurrently (GET)
//! 4. Append the batch to the index-ordered result and move to the next batch
//!
//! Once discovery ends, the stored segments are merged into a single file and
//! optionally handed to a player.
//!
//! ## Quick Start
//!
//! ```no_run
//! use segment_dl::{Config, SegmentPipeline};
//! use segment_dl::assembly::{FfmpegAssembler, NoOpPlayer};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut config = Config::for_source("https://cdn.example.com/v1/segment/1080p/1080p");
//!     config.download.batch_size = 16;
//!
//!     let pipeline = SegmentPipeline::new(config)?;
//!
//!     // Subscribe to events
//!     let mut events = pipeline.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let assembler = FfmpegAssembler::from_path().ok_or("ffmpeg not found")?;
//!     let output = pipeline.run_and_deliver(&assembler, &NoOpPlayer).await?;
//!     println!("merged into {}", output.display());
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Merging and playback
pub mod assembly;
/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Index to address mapping
pub mod locator;
/// Batch pipeline: probe pool, retrieval pool, coordinator, sequencer
pub mod pipeline;
/// Retry logic with configurable backoff
pub mod retry;
/// Network access to remote segments
pub mod source;
/// Local segment files
pub mod storage;
/// Core types and events
pub mod types;

// Re-export commonly used types
pub use assembly::{Assembler, FfmpegAssembler, MpvPlayer, NoOpPlayer, Player};
pub use config::{
    BackoffStrategy, Config, DownloadConfig, ProbeConfig, RetrievalConfig, RetryConfig,
    SourceConfig, ToolsConfig, UnexpectedStatusPolicy,
};
pub use error::{Error, Result};
pub use locator::ResourceLocator;
pub use pipeline::SegmentPipeline;
pub use source::{FetchResponse, HttpSource, SegmentSource};
pub use storage::SegmentStore;
pub use types::{
    Event, ProbeOutcome, ProbeStatus, RetrievalOutcome, RunReport, RunStats, SegmentIndex,
    SegmentRecord, Termination,
};

use tokio_util::sync::CancellationToken;

/// Cancel `token` once a termination signal arrives.
///
/// The pipeline checks its token between batches, so a batch that is already
/// running finishes before the run stops.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use segment_dl::{Config, SegmentPipeline, cancel_on_signal};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = Config::for_source("https://cdn.example.com/v1/segment/720p/720p");
///     let pipeline = SegmentPipeline::new(config)?;
///
///     tokio::spawn(cancel_on_signal(pipeline.cancel_token()));
///     let report = pipeline.run().await?;
///     println!("{:?}", report.termination);
///
///     Ok(())
/// }
/// ```
pub async fn cancel_on_signal(token: CancellationToken) {
    tokio::select! {
        _ = wait_for_signal() => {
            tracing::info!("Stopping after the current batch");
            token.cancel();
        }
        _ = token.cancelled() => {}
    }
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Signal registration may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), Ok(mut sigint)) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            sigint.recv().await;
            tracing::info!("Received SIGINT signal (Ctrl+C)");
        }
        (Ok(mut sigterm), Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            sigterm.recv().await;
            tracing::info!("Received SIGTERM signal");
        }
        (Err(e), Err(_)) => {
            tracing::error!(error = %e, "Could not register any signal handlers, using ctrl_c fallback");
            tokio::signal::ctrl_c().await.ok();
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
