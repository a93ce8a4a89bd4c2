//! Configuration types for segment-dl

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Where segments live remotely and how to ask for them
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Address prefix; the index is appended directly (no separator)
    pub base_url: String,

    /// Suffix appended after the index, e.g. ".webp" (default: ".ts")
    #[serde(default = "default_extension")]
    pub extension: String,

    /// User-Agent header sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            extension: default_extension(),
            user_agent: default_user_agent(),
        }
    }
}

/// Batch layout and local storage settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Directory that receives the segment files (default: "./downloads")
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,

    /// Merged artifact path (default: "output.mp4", relative to the working directory)
    #[serde(default = "default_output_file")]
    pub output_file: PathBuf,

    /// Indices per batch; also the concurrency limit of both worker pools (default: 28)
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// First index to probe (default: 0)
    #[serde(default)]
    pub start_index: u64,

    /// Zero padding applied to local file names (default: 5 -> "00042.ts")
    #[serde(default = "default_index_width")]
    pub index_width: usize,

    /// Stop discovery before this index even without a 404 (None = unbounded)
    #[serde(default)]
    pub max_index: Option<u64>,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            download_dir: default_download_dir(),
            output_file: default_output_file(),
            batch_size: default_batch_size(),
            start_index: 0,
            index_width: default_index_width(),
            max_index: None,
        }
    }
}

/// Spacing between retry attempts
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum BackoffStrategy {
    /// Same delay before every retry
    Fixed,
    /// Delay grows by `initial_delay` with each retry
    Linear,
    /// Delay is multiplied by `multiplier` with each retry
    Exponential {
        /// Growth factor between consecutive delays
        multiplier: f64,
    },
}

/// Retry configuration for transient network failures
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total number of attempts, including the first one
    pub max_attempts: u32,

    /// Delay before the first retry
    #[serde(with = "duration_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 60 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// How the delay grows between attempts
    pub backoff: BackoffStrategy,

    /// Add random jitter to delays (default: false)
    #[serde(default)]
    pub jitter: bool,
}

impl RetryConfig {
    /// Probe defaults: 3 attempts, 1 second apart
    pub fn probe_default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: default_max_delay(),
            backoff: BackoffStrategy::Fixed,
            jitter: false,
        }
    }

    /// Retrieval defaults: 5 attempts, waiting 2s, 4s, 6s, ... between them
    pub fn retrieval_default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_secs(2),
            max_delay: default_max_delay(),
            backoff: BackoffStrategy::Linear,
            jitter: false,
        }
    }
}

/// Existence-check settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProbeConfig {
    /// Per-request timeout (default: 5 seconds)
    #[serde(default = "default_probe_timeout", with = "duration_serde")]
    pub timeout: Duration,

    /// Retry policy for timeouts and connection errors
    #[serde(default = "RetryConfig::probe_default")]
    pub retry: RetryConfig,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            timeout: default_probe_timeout(),
            retry: RetryConfig::probe_default(),
        }
    }
}

/// Full-body download settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Per-request timeout (default: 15 seconds)
    #[serde(default = "default_retrieval_timeout", with = "duration_serde")]
    pub timeout: Duration,

    /// Retry policy for timeouts and connection errors
    #[serde(default = "RetryConfig::retrieval_default")]
    pub retry: RetryConfig,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            timeout: default_retrieval_timeout(),
            retry: RetryConfig::retrieval_default(),
        }
    }
}

/// What to do when a probe sees a status other than 200 or 404
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnexpectedStatusPolicy {
    /// Warn, exclude the index and keep going (default)
    #[default]
    Skip,
    /// Treat 5xx and 429 like a timeout and retry them
    Retry,
    /// Stop the run with an error
    Abort,
}

/// External tool paths for merging and playback
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Path to ffmpeg executable (auto-detected if None)
    #[serde(default)]
    pub ffmpeg_path: Option<PathBuf>,

    /// Path to the player executable (auto-detected as "mpv" if None)
    #[serde(default)]
    pub player_path: Option<PathBuf>,

    /// Extra arguments passed to the player before the artifact path
    ///
    /// Defaults to mpv's cache and demuxer read-ahead flags.
    #[serde(default = "default_player_args")]
    pub player_args: Vec<String>,

    /// Whether to search PATH for external binaries if explicit paths not set (default: true)
    #[serde(default = "default_true")]
    pub search_path: bool,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: None,
            player_path: None,
            player_args: default_player_args(),
            search_path: true,
        }
    }
}

/// Main configuration for [`SegmentPipeline`](crate::SegmentPipeline)
///
/// Every knob the pipeline reads lives here; the value is passed in explicitly
/// and shared behind an `Arc`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Remote source
    pub source: SourceConfig,

    /// Batching and storage
    #[serde(default)]
    pub download: DownloadConfig,

    /// Probe pool
    #[serde(default)]
    pub probe: ProbeConfig,

    /// Retrieval pool
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Handling of statuses other than 200/404
    #[serde(default)]
    pub unexpected_status: UnexpectedStatusPolicy,

    /// External tools
    #[serde(default)]
    pub tools: ToolsConfig,
}

impl Config {
    /// Build a configuration for `base_url` with every other setting at its default
    pub fn for_source(base_url: impl Into<String>) -> Self {
        Self {
            source: SourceConfig {
                base_url: base_url.into(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Load a configuration from a JSON file
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Check the configuration for values the pipeline cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.source.base_url.trim().is_empty() {
            return Err(Error::config("source.base_url", "base URL must not be empty"));
        }
        // The index is appended verbatim, so the base must parse on its own and with a suffix
        let probe_url = format!("{}0{}", self.source.base_url, self.source.extension);
        url::Url::parse(&probe_url).map_err(|source| Error::InvalidUrl {
            url: probe_url.clone(),
            source,
        })?;

        if self.download.batch_size == 0 {
            return Err(Error::config(
                "download.batch_size",
                "batch size must be greater than zero",
            ));
        }
        if let Some(max) = self.download.max_index
            && max <= self.download.start_index
        {
            return Err(Error::config(
                "download.max_index",
                format!(
                    "max index {} must be greater than start index {}",
                    max, self.download.start_index
                ),
            ));
        }
        if self.probe.retry.max_attempts == 0 {
            return Err(Error::config(
                "probe.retry.max_attempts",
                "at least one attempt is required",
            ));
        }
        if self.retrieval.retry.max_attempts == 0 {
            return Err(Error::config(
                "retrieval.retry.max_attempts",
                "at least one attempt is required",
            ));
        }
        Ok(())
    }
}

fn default_extension() -> String {
    ".ts".to_string()
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36".to_string()
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("./downloads")
}

fn default_output_file() -> PathBuf {
    PathBuf::from("output.mp4")
}

fn default_batch_size() -> usize {
    28
}

fn default_index_width() -> usize {
    5
}

fn default_probe_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_retrieval_timeout() -> Duration {
    Duration::from_secs(15)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(60)
}

fn default_true() -> bool {
    true
}

fn default_player_args() -> Vec<String> {
    [
        "--cache=yes",
        "--demuxer-max-bytes=128MiB",
        "--demuxer-readahead-secs=20",
    ]
    .map(String::from)
    .to_vec()
}

// Duration serialization helper (whole seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
