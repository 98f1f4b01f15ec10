use anyhow::{Context, Result};
use clap::{value_parser, Arg, ArgAction, Command};
use std::alloc::System;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use kg_memory_manager::{
    http,
    memory::shutdown_signal,
    MallocTrimCollector, MemoryConfig, ResourceManager, TrackingAllocator,
};

#[global_allocator]
static GLOBAL: TrackingAllocator<System> = TrackingAllocator::new(System);

fn cli() -> Command {
    Command::new("kg-memory-profiler")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Samples process memory and writes a profiling report on shutdown")
        .arg(
            Arg::new("interval")
                .long("interval")
                .value_name("MS")
                .help("Sampling interval in milliseconds")
                .value_parser(value_parser!(u64)),
        )
        .arg(
            Arg::new("max-samples")
                .long("max-samples")
                .value_name("N")
                .help("Maximum samples kept in the window")
                .value_parser(value_parser!(usize)),
        )
        .arg(
            Arg::new("output")
                .long("output")
                .value_name("DIR")
                .help("Directory for report files")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("detailed")
                .long("detailed")
                .help("Capture detailed diagnostics with each sample")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("gc")
                .long("gc")
                .help("Enable the malloc_trim collector")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .value_name("FILE")
                .help("TOML configuration file")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("port")
                .long("port")
                .value_name("PORT")
                .help("Serve health and memory endpoints on this port")
                .value_parser(value_parser!(u16)),
        )
        .arg(
            Arg::new("duration")
                .long("duration")
                .value_name("SECONDS")
                .help("Stop automatically after this many seconds")
                .value_parser(value_parser!(u64)),
        )
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let matches = cli().get_matches();

    let mut config = MemoryConfig::load(matches.get_one::<PathBuf>("config").map(PathBuf::as_path))?;
    if let Some(interval) = matches.get_one::<u64>("interval") {
        config.sampling_interval_ms = *interval;
    }
    if let Some(max_samples) = matches.get_one::<usize>("max-samples") {
        config.max_samples = *max_samples;
    }
    if let Some(output) = matches.get_one::<PathBuf>("output") {
        config.output_directory = output.clone();
    }
    if matches.get_flag("detailed") {
        config.detailed_stats = true;
    }

    let manager = if matches.get_flag("gc") {
        if !MallocTrimCollector::supported() {
            warn!("malloc_trim is not available on this platform, collector cycles will be no-ops");
        }
        ResourceManager::with_collector(config, Arc::new(MallocTrimCollector::new()))
    } else {
        ResourceManager::new(config)
    }
    .context("Failed to initialize resource manager")?;
    let manager = Arc::new(manager);

    if !manager.start() {
        warn!("Sampling not started; the report will contain no samples");
    }

    let server = matches.get_one::<u16>("port").copied().map(|port| {
        let manager = Arc::clone(&manager);
        tokio::spawn(async move {
            if let Err(e) = http::serve(manager, port, shutdown_signal()).await {
                tracing::error!("HTTP server error: {}", e);
            }
        })
    });

    match matches.get_one::<u64>("duration") {
        Some(seconds) => {
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(*seconds)) => info!("Profiling duration elapsed"),
                _ = shutdown_signal() => info!("Shutdown signal received"),
            }
        }
        None => {
            shutdown_signal().await;
            info!("Shutdown signal received");
        }
    }

    if let Some(report) = manager.stop().await {
        info!(
            "Session {} finished with {} recommendations",
            report.session_id,
            report.recommendations.len()
        );
    }

    if let Some(server) = server {
        server.abort();
    }

    Ok(())
}
