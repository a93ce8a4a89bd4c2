//! External-binary assembler and player

use super::{Assembler, Player};
use crate::config::ToolsConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

/// Name of the concat list written next to the segments
const CONCAT_LIST_NAME: &str = "segments.txt";

/// Resolve a tool from an explicit path, or from PATH when searching is enabled
fn resolve_binary(
    explicit: Option<&PathBuf>,
    name: &str,
    key: &str,
    search_path: bool,
) -> Result<PathBuf> {
    match explicit {
        Some(path) => Ok(path.clone()),
        None if search_path => which::which(name)
            .map_err(|_| Error::NotSupported(format!("{} not found in PATH", name))),
        None => Err(Error::config(
            key,
            format!("no {} path configured and PATH search is disabled", name),
        )),
    }
}

/// Render a concat demuxer list, one `file '<path>'` line per segment
///
/// Single quotes inside paths are escaped the way the concat demuxer expects.
pub(crate) fn concat_list(segments: &[PathBuf]) -> String {
    segments
        .iter()
        .map(|path| {
            let escaped = path.to_string_lossy().replace('\'', r"'\''");
            format!("file '{}'\n", escaped)
        })
        .collect()
}

/// Assembler that runs ffmpeg's concat demuxer with stream copy
///
/// # Examples
///
/// ```no_run
/// use segment_dl::assembly::{Assembler, FfmpegAssembler};
/// use std::path::{Path, PathBuf};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let assembler = FfmpegAssembler::from_path().expect("ffmpeg not found in PATH");
/// let segments = vec![PathBuf::from("/tmp/seg/00000.ts"), PathBuf::from("/tmp/seg/00001.ts")];
/// assembler.merge(&segments, Path::new("output.mp4")).await?;
/// # Ok(())
/// # }
/// ```
pub struct FfmpegAssembler {
    binary_path: PathBuf,
}

impl FfmpegAssembler {
    /// Create an assembler with an explicit ffmpeg path
    pub fn new(binary_path: PathBuf) -> Self {
        Self { binary_path }
    }

    /// Attempt to find ffmpeg in PATH
    pub fn from_path() -> Option<Self> {
        which::which("ffmpeg").ok().map(Self::new)
    }

    /// Use the configured ffmpeg path, falling back to a PATH search
    pub fn from_config(tools: &ToolsConfig) -> Result<Self> {
        resolve_binary(
            tools.ffmpeg_path.as_ref(),
            "ffmpeg",
            "tools.ffmpeg_path",
            tools.search_path,
        )
        .map(Self::new)
    }
}

#[async_trait]
impl Assembler for FfmpegAssembler {
    async fn merge(&self, segments: &[PathBuf], output: &Path) -> Result<PathBuf> {
        let list_dir = segments
            .first()
            .and_then(|path| path.parent())
            .ok_or(Error::NoSegments)?;
        let list_path = list_dir.join(CONCAT_LIST_NAME);
        tokio::fs::write(&list_path, concat_list(segments))
            .await
            .map_err(|e| Error::Storage {
                path: list_path.clone(),
                source: e,
            })?;

        let result = Command::new(&self.binary_path)
            .args(["-hide_banner", "-loglevel", "error", "-y"])
            .args(["-f", "concat", "-safe", "0", "-i"])
            .arg(&list_path)
            .args(["-c", "copy"])
            .arg(output)
            .output()
            .await;

        if let Err(e) = tokio::fs::remove_file(&list_path).await {
            tracing::debug!(path = %list_path.display(), error = %e, "Could not remove concat list");
        }

        let out = result
            .map_err(|e| Error::ExternalTool(format!("Failed to execute ffmpeg: {}", e)))?;
        if !out.status.success() {
            return Err(Error::ExternalTool(format!(
                "ffmpeg exited with {}: {}",
                out.status,
                String::from_utf8_lossy(&out.stderr).trim()
            )));
        }

        match tokio::fs::metadata(output).await {
            Ok(meta) if meta.len() > 0 => Ok(output.to_path_buf()),
            _ => Err(Error::ExternalTool(format!(
                "ffmpeg produced no output at {}",
                output.display()
            ))),
        }
    }

    fn name(&self) -> &'static str {
        "ffmpeg"
    }
}

/// Player that launches an external program with the artifact path
///
/// Defaults to `mpv`; any player taking a file path as its last argument works.
pub struct MpvPlayer {
    binary_path: PathBuf,
    args: Vec<String>,
}

impl MpvPlayer {
    /// Create a player with an explicit binary and extra arguments
    pub fn new(binary_path: PathBuf, args: Vec<String>) -> Self {
        Self { binary_path, args }
    }

    /// Use the configured player, falling back to `mpv` on PATH
    pub fn from_config(tools: &ToolsConfig) -> Result<Self> {
        resolve_binary(
            tools.player_path.as_ref(),
            "mpv",
            "tools.player_path",
            tools.search_path,
        )
        .map(|binary| Self::new(binary, tools.player_args.clone()))
    }
}

#[async_trait]
impl Player for MpvPlayer {
    /// Run the player until it exits
    ///
    /// A player killed by a signal (closed window, terminal hang-up) is reported
    /// as closed early rather than as a normal exit.
    async fn play(&self, artifact: &Path) -> Result<()> {
        let status = Command::new(&self.binary_path)
            .args(&self.args)
            .arg(artifact)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map_err(|e| {
                Error::ExternalTool(format!(
                    "Failed to execute {}: {}",
                    self.binary_path.display(),
                    e
                ))
            })?;

        match status.code() {
            Some(0) => Ok(()),
            Some(_) => Err(Error::ExternalTool(format!(
                "{} exited with {}",
                self.binary_path.display(),
                status
            ))),
            None => Err(Error::ExternalTool(format!(
                "{} closed before playback finished ({})",
                self.binary_path.display(),
                status
            ))),
        }
    }

    fn name(&self) -> &'static str {
        "mpv"
    }
}
