//! Cluster transcoding CLI
//!
//! Owns everything spec.md declares out of scope for the core: argument
//! parsing, glob expansion, signal-handler wiring, YAML config loading, the
//! media probe, and the terminal status display.

mod agent;
mod config_loader;
mod probe;
mod render;

use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use cluster_core::{Cluster, MediaProbe, RuntimeOptions, StatusBus};
use colored::Colorize;
use tokio::sync::Mutex;
use tracing::{error, info};

use crate::probe::FfprobeMediaProbe;

#[derive(Parser)]
#[command(name = "cluster")]
#[command(about = "Distributed video transcoding workload dispatcher", long_about = None)]
#[command(version)]
struct Cli {
    /// Media file paths to process
    paths: Vec<PathBuf>,

    /// Verbose output
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,

    /// Keep the original source file
    #[arg(short = 'k', long = "keep-source")]
    keep_source: bool,

    /// Show media info and stop
    #[arg(short = 'i', long = "info")]
    show_info: bool,

    /// Print the planned command and exit without encoding
    #[arg(long = "dry-run")]
    dry_run: bool,

    /// Path to the YAML cluster config
    #[arg(short = 'y', long = "config")]
    config: Option<PathBuf>,

    /// Run in agent mode, listening for incoming jobs
    #[arg(long = "agent")]
    agent: bool,

    /// Template name
    #[arg(short = 't', long = "template")]
    template: Option<String>,

    /// Restrict scheduling to these hosts (comma-separated)
    #[arg(long = "hosts", value_delimiter = ',')]
    hosts: Option<Vec<String>>,

    /// Override the template's quality key
    #[arg(long = "vq")]
    quality_override: Option<String>,

    /// Read additional input paths from a file, one per line
    #[arg(long = "from-file")]
    from_file: Option<PathBuf>,

    /// Local host only
    #[arg(short = 'l', long = "local")]
    local_only: bool,

    /// Disable the rich renderer
    #[arg(long = "console")]
    console: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    cluster_core::init()?;
    let cli = Cli::parse();

    if cli.agent {
        return agent::serve(cluster_core::AGENT_PORT).await;
    }

    let config_path = cli
        .config
        .clone()
        .ok_or_else(|| anyhow::anyhow!("-y <config> is required"))?;
    let config = config_loader::load(&config_path)?;

    let template_name = if cli.show_info {
        None
    } else {
        Some(
            cli.template
                .clone()
                .ok_or_else(|| anyhow::anyhow!("-t <template> is required"))?,
        )
    };

    let mut files = cli.paths.clone();
    if let Some(from_file) = &cli.from_file {
        let extra = std::fs::read_to_string(from_file)
            .with_context(|| format!("reading {}", from_file.display()))?;
        files.extend(extra.lines().filter(|l| !l.trim().is_empty()).map(PathBuf::from));
    }

    if files.is_empty() {
        println!("nothing to do");
        return Ok(());
    }

    let probe = FfprobeMediaProbe::new()?;

    if cli.show_info {
        for file in &files {
            dump_job_info(&probe, file)?;
        }
        return Ok(());
    }

    let options = RuntimeOptions::new(
        cli.verbose,
        cli.keep_source,
        cli.dry_run,
        cli.show_info,
        PathBuf::from("/usr/bin/ssh"),
    );

    let restrict_hosts = if cli.local_only {
        Some(vec!["local".to_string()])
    } else {
        cli.hosts.clone()
    };

    let status_bus = StatusBus::new();
    let mut cluster = Cluster::new(config, options, status_bus.clone(), restrict_hosts)
        .await
        .context("constructing cluster")?;

    let template_name = template_name.expect("checked above");
    for file in &files {
        if let Err(e) = cluster.enqueue(&probe, file.clone(), &template_name, cli.quality_override.as_deref()) {
            error!(file = %file.display(), error = %e, "skipping file");
        }
    }

    let done = Arc::new(Mutex::new(false));
    let render_handle = if cli.console {
        tokio::spawn(render::render_console(status_bus.clone(), done.clone()))
    } else {
        tokio::spawn(render::render_rich(status_bus.clone(), done.clone()))
    };

    let cancel_flag = cluster.cancel_handle();
    let sigint = tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        info!("SIGINT received, terminating cluster");
        cancel_flag.store(true, Ordering::SeqCst);
    });

    let completions = cluster.run().await?;
    *done.lock().await = true;
    let _ = render_handle.await;
    sigint.abort();

    render::print_completion_report(&completions);

    if cluster.queues_empty() {
        Ok(())
    } else {
        bail!("cluster finished with non-empty queues")
    }
}

fn dump_job_info(probe: &dyn MediaProbe, file: &PathBuf) -> Result<()> {
    let info = probe.probe(file)?;
    println!("{}", file.display().to_string().bold());
    println!("  codec: {} {}x{}", info.video_codec, info.width, info.height);
    println!("  runtime: {}s  frames: {}", info.runtime_secs, info.frames);
    println!("  size: {:.1} MB", info.file_size_mb());
    println!("  audio streams: {}", info.audio.len());
    println!("  subtitle streams: {}", info.subtitle.len());
    Ok(())
}
