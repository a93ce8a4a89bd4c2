use clap::Parser;
use std::path::PathBuf;
use std::process;
use tracing::{error, info, warn};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use segment_dl::assembly::deliver;
use segment_dl::{
    Config, Error, FfmpegAssembler, MpvPlayer, NoOpPlayer, Player, Result, RunReport,
    SegmentPipeline, cancel_on_signal,
};

/// Download an indexed segment sequence and merge it into one file
#[derive(Debug, Parser)]
#[command(name = "segment-dl", version, about)]
struct Args {
    /// Address prefix; segment N is fetched from {base-url}{N}{extension}
    #[arg(long)]
    base_url: Option<String>,

    /// Segment file extension, including the leading dot
    #[arg(long)]
    extension: Option<String>,

    /// Indices probed per batch, also the worker pool size
    #[arg(long)]
    batch_size: Option<usize>,

    /// Directory for downloaded segments
    #[arg(long)]
    download_dir: Option<PathBuf>,

    /// Path of the merged output file
    #[arg(long, short)]
    output: Option<PathBuf>,

    /// JSON configuration file; flags override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Stop discovery before this index
    #[arg(long)]
    max_index: Option<u64>,

    /// Only download, do not merge or play
    #[arg(long)]
    no_merge: bool,

    /// Merge but do not start the player
    #[arg(long)]
    no_play: bool,

    /// Enable debug logging
    #[arg(long, short)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logging(args.verbose);

    if let Err(e) = run(args).await {
        error!(code = e.error_code(), "{}", e);
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    let config = build_config(&args)?;
    let pipeline = SegmentPipeline::new(config)?;

    // Resolve the tools up front so a missing binary fails before any download
    let tools = &pipeline.config().tools;
    let delivery: Option<(FfmpegAssembler, Box<dyn Player>)> = if args.no_merge {
        None
    } else {
        let player: Box<dyn Player> = if args.no_play {
            Box::new(NoOpPlayer)
        } else {
            Box::new(MpvPlayer::from_config(tools)?)
        };
        Some((FfmpegAssembler::from_config(tools)?, player))
    };

    tokio::spawn(cancel_on_signal(pipeline.cancel_token()));
    let report = pipeline.run().await?;
    info!(
        segments = report.segments.len(),
        termination = ?report.termination,
        "Discovery complete"
    );
    ensure_segments(&report)?;

    let Some((assembler, player)) = delivery else {
        return Ok(());
    };
    let artifact = deliver(
        &report,
        &pipeline.config().download.output_file,
        &assembler,
        player.as_ref(),
    )
    .await?;
    info!(output = %artifact.display(), "Done");
    Ok(())
}

/// Fail an empty run, whether or not anything is merged afterwards
fn ensure_segments(report: &RunReport) -> Result<()> {
    if report.is_empty() {
        warn!(termination = ?report.termination, "No segments found");
        return Err(Error::NoSegments);
    }
    Ok(())
}

/// Load the config file (if any) and apply command line overrides
fn build_config(args: &Args) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::from_json_file(path)?,
        None => Config::default(),
    };

    if let Some(base_url) = &args.base_url {
        config.source.base_url = base_url.clone();
    }
    if config.source.base_url.is_empty() {
        return Err(Error::config(
            "source.base_url",
            "--base-url is required when no config file sets it",
        ));
    }
    if let Some(extension) = &args.extension {
        config.source.extension = extension.clone();
    }
    if let Some(batch_size) = args.batch_size {
        config.download.batch_size = batch_size;
    }
    if let Some(dir) = &args.download_dir {
        config.download.download_dir = dir.clone();
    }
    if let Some(output) = &args.output {
        config.download.output_file = output.clone();
    }
    if let Some(max_index) = args.max_index {
        config.download.max_index = Some(max_index);
    }
    Ok(config)
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("segment_dl=debug,info")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("segment_dl=info,warn"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(verbose))
        .init();
}
