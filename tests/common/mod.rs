//! Common test utilities for segment-dl HTTP tests
#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use segment_dl::{BackoffStrategy, Config, RetryConfig};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Path prefix segments are served under
pub const SEGMENT_PREFIX: &str = "/v1/segment/720p/720p";

/// Delay between retries used by [`fast_config`]
pub const RETRY_DELAY: Duration = Duration::from_millis(20);

/// Body served for segment `index`
pub fn segment_body(index: u64) -> Vec<u8> {
    format!("ts-payload-{index:05}").into_bytes()
}

fn segment_path(index: u64) -> String {
    format!("{SEGMENT_PREFIX}{index}.ts")
}

/// Mock CDN serving segments `[0, count)`; anything else is a 404
pub struct SegmentServer {
    pub server: MockServer,
}

impl SegmentServer {
    pub async fn start(count: u64) -> Self {
        let server = MockServer::start().await;
        for index in 0..count {
            Mock::given(method("HEAD"))
                .and(path(segment_path(index)))
                .respond_with(ResponseTemplate::new(200))
                .mount(&server)
                .await;
            Mock::given(method("GET"))
                .and(path(segment_path(index)))
                .respond_with(ResponseTemplate::new(200).set_body_bytes(segment_body(index)))
                .mount(&server)
                .await;
        }
        Self { server }
    }

    /// Base URL to configure the pipeline with
    pub fn base_url(&self) -> String {
        format!("{}{}", self.server.uri(), SEGMENT_PREFIX)
    }

    /// Answer `http_method` requests for `index` with `status`, ahead of the defaults
    pub async fn override_status(&self, http_method: &str, index: u64, status: u16) {
        Mock::given(method(http_method))
            .and(path(segment_path(index)))
            .respond_with(ResponseTemplate::new(status))
            .with_priority(1)
            .mount(&self.server)
            .await;
    }

    /// Delay the next `times` GET responses for `index`
    pub async fn slow_fetch(&self, index: u64, delay: Duration, times: u64) {
        Mock::given(method("GET"))
            .and(path(segment_path(index)))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(segment_body(index))
                    .set_delay(delay),
            )
            .up_to_n_times(times)
            .with_priority(1)
            .mount(&self.server)
            .await;
    }

    /// Number of received requests with `http_method`, optionally for one index only
    pub async fn count(&self, http_method: &str, index: Option<u64>) -> usize {
        let requests = self.server.received_requests().await.unwrap_or_default();
        requests
            .iter()
            .filter(|r| r.method.to_string() == http_method)
            .filter(|r| index.is_none_or(|i| r.url.path() == segment_path(i)))
            .count()
    }
}

/// Pipeline config for `base_url` with short timeouts and retry delays
pub fn fast_config(base_url: &str, download_dir: &Path, batch_size: usize) -> Config {
    let mut config = Config::for_source(base_url);
    config.download.download_dir = download_dir.to_path_buf();
    config.download.output_file = download_dir.join("merged.mp4");
    config.download.batch_size = batch_size;
    config.probe.timeout = Duration::from_secs(2);
    config.probe.retry = RetryConfig {
        max_attempts: 3,
        initial_delay: RETRY_DELAY,
        max_delay: Duration::from_secs(1),
        backoff: BackoffStrategy::Fixed,
        jitter: false,
    };
    config.retrieval.timeout = Duration::from_secs(2);
    config.retrieval.retry = RetryConfig {
        max_attempts: 5,
        initial_delay: RETRY_DELAY,
        max_delay: Duration::from_secs(1),
        backoff: BackoffStrategy::Linear,
        jitter: false,
    };
    config
}

/// Raw TCP server that closes connections without an HTTP response
///
/// With `answer_head`, HEAD requests are answered normally (200 for index 0,
/// 404 otherwise) and only GET connections are dropped.
pub struct HangUpServer {
    addr: String,
    head: Arc<AtomicUsize>,
    get: Arc<AtomicUsize>,
}

impl HangUpServer {
    pub async fn start(answer_head: bool) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = format!("http://{}", listener.local_addr().unwrap());
        let head = Arc::new(AtomicUsize::new(0));
        let get = Arc::new(AtomicUsize::new(0));
        let (head_count, get_count) = (Arc::clone(&head), Arc::clone(&get));

        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let mut buf = [0u8; 4096];
                let n = socket.read(&mut buf).await.unwrap_or(0);
                let request = String::from_utf8_lossy(&buf[..n]).to_string();

                if request.starts_with("HEAD") {
                    head_count.fetch_add(1, Ordering::SeqCst);
                    if answer_head {
                        let status = if request.contains(&format!("{SEGMENT_PREFIX}0.ts ")) {
                            "200 OK"
                        } else {
                            "404 Not Found"
                        };
                        let response = format!(
                            "HTTP/1.1 {status}\r\ncontent-length: 0\r\nconnection: close\r\n\r\n"
                        );
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    }
                } else {
                    get_count.fetch_add(1, Ordering::SeqCst);
                }
                drop(socket);
            }
        });

        Self { addr, head, get }
    }

    pub fn base_url(&self) -> String {
        format!("{}{}", self.addr, SEGMENT_PREFIX)
    }

    pub fn head_requests(&self) -> usize {
        self.head.load(Ordering::SeqCst)
    }

    pub fn get_requests(&self) -> usize {
        self.get.load(Ordering::SeqCst)
    }
}
