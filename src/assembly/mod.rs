//! Merging and playback of stored segments
//!
//! Both steps run external programs and sit strictly after discovery: nothing
//! here feeds back into probing or retrieval.
//!
//! - [`Assembler`]: combines an index-ordered list of segment files into one artifact
//! - [`Player`]: plays the artifact
//!
//! Implementations:
//!
//! - [`FfmpegAssembler`]: ffmpeg concat demuxer, stream copy
//! - [`MpvPlayer`]: any player that accepts a file path (mpv by default)
//! - [`NoOpPlayer`]: used when playback is disabled

mod cli;
mod noop;

pub use cli::{FfmpegAssembler, MpvPlayer};
pub use noop::NoOpPlayer;

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::types::RunReport;

/// Combines ordered segment files into a single artifact
#[async_trait]
pub trait Assembler: Send + Sync {
    /// Merge `segments` (absolute paths, in index order) into `output`
    ///
    /// Returns the path of the produced artifact.
    async fn merge(&self, segments: &[PathBuf], output: &Path) -> Result<PathBuf>;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}

/// Plays a merged artifact
#[async_trait]
pub trait Player: Send + Sync {
    /// Play `artifact`, returning once playback ends
    async fn play(&self, artifact: &Path) -> Result<()>;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}

/// Hand a finished run to the assembler, then to the player
///
/// An empty run is reported as [`Error::NoSegments`] and neither collaborator
/// is invoked. Playback happens only after a successful merge.
pub async fn deliver(
    report: &RunReport,
    output: &Path,
    assembler: &dyn Assembler,
    player: &dyn Player,
) -> Result<PathBuf> {
    if report.is_empty() {
        tracing::warn!(termination = ?report.termination, "No segments found, skipping assembly");
        return Err(Error::NoSegments);
    }

    let segments = report.paths();
    tracing::info!(
        assembler = assembler.name(),
        segments = segments.len(),
        output = %output.display(),
        "Merging segments"
    );
    let artifact = assembler.merge(&segments, output).await?;

    tracing::info!(player = player.name(), artifact = %artifact.display(), "Starting playback");
    player.play(&artifact).await?;
    Ok(artifact)
}
