//! Terminal status rendering: consumes the status bus, polls liveness
//!
//! Pluggable per spec.md §1 — the core only emits `StatusEvent`s to a sink.
//! Two renderers mirror the original's rich/console split: a multi-bar
//! `indicatif` view, and a flat line-per-update fallback for `--console`.

use std::collections::HashMap;
use std::sync::Arc;

use cluster_core::{format_completion_report, CompletionRecord, StatusBus};
use colored::Colorize;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

/// Polls the bus with its built-in 2 s timeout until the cluster's run
/// future completes, rendering each event as it arrives.
pub async fn render_rich(bus: StatusBus, cluster: Arc<tokio::sync::Mutex<bool>>) {
    let multi = MultiProgress::new();
    let mut bars: HashMap<String, ProgressBar> = HashMap::new();
    let style = ProgressStyle::with_template("{prefix:.bold} [{bar:40}] {percent}% {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ");

    loop {
        if *cluster.lock().await {
            break;
        }
        let Some(event) = bus.recv_timeout() else {
            continue;
        };

        let bar = bars.entry(event.file.clone()).or_insert_with(|| {
            let bar = multi.add(ProgressBar::new(100));
            bar.set_style(style.clone());
            bar.set_prefix(event.file.clone());
            bar
        });

        bar.set_position(event.completed as u64);
        let message = event
            .status
            .clone()
            .unwrap_or_else(|| format!("{} {}", event.host, event.speed));
        bar.set_message(message);

        if event.completed >= 100 {
            bar.finish();
        }
    }
}

/// Flat console renderer for `--console`: one printed line per event.
pub async fn render_console(bus: StatusBus, cluster: Arc<tokio::sync::Mutex<bool>>) {
    loop {
        if *cluster.lock().await {
            break;
        }
        let Some(event) = bus.recv_timeout() else {
            continue;
        };
        let status = event.status.as_deref().unwrap_or("Running");
        println!(
            "{:>4}% {} {} {} {}",
            event.completed,
            event.host.cyan(),
            event.file.yellow(),
            event.speed,
            status
        );
    }
}

pub fn print_completion_report(completions: &[CompletionRecord]) {
    println!("{}", "cluster run complete".green().bold());
    println!("{}", format_completion_report(completions));
}
