//! End-to-end runs of the pipeline against a mock HTTP server

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use std::path::PathBuf;
use std::time::Duration;

use common::{HangUpServer, SegmentServer, fast_config, segment_body};
use segment_dl::{
    Error, FfmpegAssembler, NoOpPlayer, RunReport, SegmentIndex, SegmentPipeline, Termination,
};
use tempfile::TempDir;

fn indices(report: &RunReport) -> Vec<u64> {
    report.segments.iter().map(|s| s.index.get()).collect()
}

#[tokio::test]
async fn test_downloads_every_segment_until_404() {
    let cdn = SegmentServer::start(23).await;
    let dir = TempDir::new().unwrap();
    let config = fast_config(&cdn.base_url(), dir.path(), 10);

    let report = SegmentPipeline::new(config).unwrap().run().await.unwrap();

    assert_eq!(indices(&report), (0..23).collect::<Vec<_>>());
    assert_eq!(
        report.termination,
        Termination::Terminal {
            index: SegmentIndex(23)
        }
    );
    assert_eq!(cdn.count("HEAD", None).await, 30);
    assert_eq!(cdn.count("GET", None).await, 23);

    for record in &report.segments {
        let expected = dir.path().join(format!("{:05}.ts", record.index.get()));
        assert_eq!(record.path, expected);
        assert_eq!(std::fs::read(&record.path).unwrap(), segment_body(record.index.get()));
    }
}

#[tokio::test]
async fn test_requests_carry_configured_user_agent() {
    let cdn = SegmentServer::start(2).await;
    let dir = TempDir::new().unwrap();
    let mut config = fast_config(&cdn.base_url(), dir.path(), 4);
    config.source.user_agent = "segment-dl-e2e/1.0".to_string();

    SegmentPipeline::new(config).unwrap().run().await.unwrap();

    let requests = cdn.server.received_requests().await.unwrap();
    assert!(!requests.is_empty());
    for request in requests {
        let agent = request
            .headers
            .get("user-agent")
            .and_then(|value| value.to_str().ok());
        assert_eq!(agent, Some("segment-dl-e2e/1.0"));
    }
}

#[tokio::test]
async fn test_server_error_on_probe_skips_only_that_index() {
    let cdn = SegmentServer::start(8).await;
    cdn.override_status("HEAD", 5, 500).await;
    let dir = TempDir::new().unwrap();
    let config = fast_config(&cdn.base_url(), dir.path(), 4);

    let report = SegmentPipeline::new(config).unwrap().run().await.unwrap();

    assert_eq!(indices(&report), vec![0, 1, 2, 3, 4, 6, 7]);
    assert_eq!(cdn.count("GET", Some(5)).await, 0);
    assert_eq!(report.stats.skipped, 1);
}

#[tokio::test]
async fn test_failed_download_is_excluded() {
    let cdn = SegmentServer::start(4).await;
    cdn.override_status("GET", 1, 403).await;
    let dir = TempDir::new().unwrap();
    let config = fast_config(&cdn.base_url(), dir.path(), 10);

    let report = SegmentPipeline::new(config).unwrap().run().await.unwrap();

    assert_eq!(indices(&report), vec![0, 2, 3]);
    assert_eq!(report.stats.failed, 1);
    assert!(!dir.path().join("00001.ts").exists());
}

#[tokio::test]
async fn test_slow_download_is_retried() {
    let cdn = SegmentServer::start(3).await;
    cdn.slow_fetch(2, Duration::from_secs(3), 1).await;
    let dir = TempDir::new().unwrap();
    let mut config = fast_config(&cdn.base_url(), dir.path(), 10);
    config.retrieval.timeout = Duration::from_millis(300);

    let report = SegmentPipeline::new(config).unwrap().run().await.unwrap();

    assert_eq!(indices(&report), vec![0, 1, 2]);
    assert_eq!(cdn.count("GET", Some(2)).await, 2);
    assert_eq!(
        std::fs::read(dir.path().join("00002.ts")).unwrap(),
        segment_body(2)
    );
}

#[tokio::test]
async fn test_rerun_downloads_nothing() {
    let cdn = SegmentServer::start(12).await;
    let dir = TempDir::new().unwrap();
    let config = fast_config(&cdn.base_url(), dir.path(), 5);

    let first = SegmentPipeline::new(config.clone())
        .unwrap()
        .run()
        .await
        .unwrap();
    let gets_after_first = cdn.count("GET", None).await;
    assert_eq!(gets_after_first, 12);

    let second = SegmentPipeline::new(config).unwrap().run().await.unwrap();

    assert_eq!(cdn.count("GET", None).await, gets_after_first);
    let first_paths: Vec<PathBuf> = first.paths();
    assert_eq!(second.paths(), first_paths);
    assert_eq!(second.stats.reused, 12);
}

#[tokio::test]
async fn test_missing_first_segment_reports_no_segments() {
    let cdn = SegmentServer::start(0).await;
    let dir = TempDir::new().unwrap();
    let config = fast_config(&cdn.base_url(), dir.path(), 10);
    let pipeline = SegmentPipeline::new(config).unwrap();
    // Never invoked: delivery stops before merging
    let assembler = FfmpegAssembler::new(dir.path().join("missing-ffmpeg"));

    let err = pipeline
        .run_and_deliver(&assembler, &NoOpPlayer)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::NoSegments));
    assert_eq!(cdn.count("HEAD", None).await, 10);
    assert_eq!(cdn.count("GET", None).await, 0);
    assert!(!dir.path().join("merged.mp4").exists());
}

#[tokio::test]
async fn test_head_hang_ups_are_retried_then_skipped() {
    let server = HangUpServer::start(false).await;
    let dir = TempDir::new().unwrap();
    let config = fast_config(&server.base_url(), dir.path(), 2);

    let report = SegmentPipeline::new(config).unwrap().run().await.unwrap();

    // 2 indices x 3 attempts each
    assert_eq!(server.head_requests(), 6);
    assert_eq!(server.get_requests(), 0);
    assert!(report.is_empty());
    assert_eq!(report.termination, Termination::Exhausted);
    assert_eq!(report.stats.skipped, 2);
}

#[tokio::test]
async fn test_download_hang_ups_are_retried_then_excluded() {
    let server = HangUpServer::start(true).await;
    let dir = TempDir::new().unwrap();
    let config = fast_config(&server.base_url(), dir.path(), 2);

    let report = SegmentPipeline::new(config).unwrap().run().await.unwrap();

    assert_eq!(server.get_requests(), 5);
    assert!(report.is_empty());
    assert_eq!(report.stats.failed, 1);
    assert_eq!(
        report.termination,
        Termination::Terminal {
            index: SegmentIndex(1)
        }
    );
}
