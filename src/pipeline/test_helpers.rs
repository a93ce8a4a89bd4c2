//! In-memory segment source and config helpers shared by pipeline tests

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use crate::config::{BackoffStrategy, Config, RetryConfig};
use crate::error::{Error, Result};
use crate::source::{FetchResponse, SegmentSource};

/// Base address every mock URL starts with
pub(crate) const MOCK_BASE: &str = "http://segments.test/v1/720p/720p";
/// Extension every mock URL ends with
pub(crate) const MOCK_EXT: &str = ".ts";

/// Delay between retries in test configs
pub(crate) const TEST_RETRY_DELAY: Duration = Duration::from_millis(20);

/// Body served for `index`
pub(crate) fn body_for(index: u64) -> Vec<u8> {
    format!("segment-{index:05}").into_bytes()
}

/// Config pointing at [`MOCK_BASE`] with short retry delays and no jitter
pub(crate) fn test_config(download_dir: &Path, batch_size: usize) -> Config {
    let mut config = Config::for_source(MOCK_BASE);
    config.source.extension = MOCK_EXT.to_string();
    config.download.download_dir = download_dir.to_path_buf();
    config.download.output_file = download_dir.join("output.mp4");
    config.download.batch_size = batch_size;
    config.probe.timeout = Duration::from_millis(500);
    config.probe.retry = RetryConfig {
        max_attempts: 3,
        initial_delay: TEST_RETRY_DELAY,
        max_delay: Duration::from_secs(1),
        backoff: BackoffStrategy::Fixed,
        jitter: false,
    };
    config.retrieval.timeout = Duration::from_millis(500);
    config.retrieval.retry = RetryConfig {
        max_attempts: 5,
        initial_delay: TEST_RETRY_DELAY,
        max_delay: Duration::from_secs(1),
        backoff: BackoffStrategy::Fixed,
        jitter: false,
    };
    config
}

/// Scripted [`SegmentSource`]
///
/// Indices below `end` exist and everything from `end` on answers 404.
/// Individual indices can be overridden with other statuses or with a number
/// of leading timeouts, and every call is counted per index.
#[derive(Default)]
pub(crate) struct MockSource {
    end: Option<u64>,
    probe_status: HashMap<u64, u16>,
    fetch_status: HashMap<u64, u16>,
    probe_timeouts: HashMap<u64, u32>,
    fetch_timeouts: HashMap<u64, u32>,
    scramble: bool,
    probe_calls: Mutex<HashMap<u64, u32>>,
    fetch_calls: Mutex<HashMap<u64, u32>>,
}

impl MockSource {
    /// Source where `[0, end)` exists and `end` is the first 404
    pub(crate) fn with_end(end: u64) -> Self {
        Self {
            end: Some(end),
            ..Default::default()
        }
    }

    /// Source that never answers 404
    pub(crate) fn endless() -> Self {
        Self::default()
    }

    /// Answer probes for `index` with `status`
    pub(crate) fn probe_status(mut self, index: u64, status: u16) -> Self {
        self.probe_status.insert(index, status);
        self
    }

    /// Answer fetches for `index` with `status`
    pub(crate) fn fetch_status(mut self, index: u64, status: u16) -> Self {
        self.fetch_status.insert(index, status);
        self
    }

    /// Time out the first `count` probes of `index`
    pub(crate) fn probe_timeouts(mut self, index: u64, count: u32) -> Self {
        self.probe_timeouts.insert(index, count);
        self
    }

    /// Time out the first `count` fetches of `index`
    pub(crate) fn fetch_timeouts(mut self, index: u64, count: u32) -> Self {
        self.fetch_timeouts.insert(index, count);
        self
    }

    /// Delay responses so that higher indices complete first
    pub(crate) fn scrambled(mut self) -> Self {
        self.scramble = true;
        self
    }

    pub(crate) fn probe_count(&self, index: u64) -> u32 {
        self.probe_calls.lock().unwrap().get(&index).copied().unwrap_or(0)
    }

    pub(crate) fn fetch_count(&self, index: u64) -> u32 {
        self.fetch_calls.lock().unwrap().get(&index).copied().unwrap_or(0)
    }

    pub(crate) fn total_probes(&self) -> u32 {
        self.probe_calls.lock().unwrap().values().sum()
    }

    pub(crate) fn total_fetches(&self) -> u32 {
        self.fetch_calls.lock().unwrap().values().sum()
    }

    /// Indices that were fetched at least once, ascending
    pub(crate) fn fetched_indices(&self) -> Vec<u64> {
        let mut indices: Vec<u64> = self.fetch_calls.lock().unwrap().keys().copied().collect();
        indices.sort_unstable();
        indices
    }

    fn index_of(url: &str) -> u64 {
        url.strip_prefix(MOCK_BASE)
            .and_then(|rest| rest.strip_suffix(MOCK_EXT))
            .and_then(|digits| digits.parse().ok())
            .unwrap_or_else(|| panic!("unexpected mock url {url}"))
    }

    fn default_status(&self, index: u64) -> u16 {
        match self.end {
            Some(end) if index >= end => 404,
            _ => 200,
        }
    }

    /// Record a call and return its 1-based attempt number
    fn record(calls: &Mutex<HashMap<u64, u32>>, index: u64) -> u32 {
        let mut calls = calls.lock().unwrap();
        let count = calls.entry(index).or_insert(0);
        *count += 1;
        *count
    }

    async fn maybe_delay(&self, index: u64) {
        if self.scramble {
            // Lower indices wait longer
            let wait = 40u64.saturating_sub(index % 40);
            tokio::time::sleep(Duration::from_millis(wait)).await;
        }
    }
}

#[async_trait]
impl SegmentSource for MockSource {
    async fn probe(&self, url: &str, _timeout: Duration) -> Result<u16> {
        let index = Self::index_of(url);
        let attempt = Self::record(&self.probe_calls, index);
        self.maybe_delay(index).await;

        if attempt <= self.probe_timeouts.get(&index).copied().unwrap_or(0) {
            return Err(Error::Timeout {
                url: url.to_string(),
            });
        }
        Ok(self
            .probe_status
            .get(&index)
            .copied()
            .unwrap_or_else(|| self.default_status(index)))
    }

    async fn fetch(&self, url: &str, _timeout: Duration) -> Result<FetchResponse> {
        let index = Self::index_of(url);
        let attempt = Self::record(&self.fetch_calls, index);
        self.maybe_delay(index).await;

        if attempt <= self.fetch_timeouts.get(&index).copied().unwrap_or(0) {
            return Err(Error::Timeout {
                url: url.to_string(),
            });
        }
        let status = self
            .fetch_status
            .get(&index)
            .copied()
            .unwrap_or_else(|| self.default_status(index));
        let body = if status == 200 {
            Bytes::from(body_for(index))
        } else {
            Bytes::new()
        };
        Ok(FetchResponse { status, body })
    }
}
