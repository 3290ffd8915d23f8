//! Cluster scheduler (C6): builds workers from config, fans out jobs, joins

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::ClusterConfig;
use crate::error::{ClusterError, ClusterResult};
use crate::host::{HostDescriptor, HostVariant};
use crate::job::EncodeJob;
use crate::media::MediaProbe;
use crate::queue::QueueSet;
use crate::runtime::RuntimeOptions;
use crate::status::StatusBus;
use crate::worker::{host_ok, run_agent, run_local, run_mounted, run_streaming, CompletionRecord, WorkerContext};

/// One scheduled `(host, quality, cli-fragment)` triple, ready to become a
/// worker task (spec.md §4.1).
struct ScheduledWorker {
    host: HostDescriptor,
    quality: String,
    cli_fragment: String,
    engine_name: String,
}

/// Builds host workers from a parsed configuration, fans enqueued jobs out
/// to per-quality queues, and runs/joins every worker task.
pub struct Cluster {
    queues: QueueSet,
    scheduled: Vec<ScheduledWorker>,
    config: ClusterConfig,
    options: RuntimeOptions,
    status_bus: StatusBus,
    cancelled: Arc<AtomicBool>,
    completions: Vec<CompletionRecord>,
}

impl Cluster {
    /// Iterates enabled hosts × engines × qualities, probing reachability
    /// once per host and caching the result for the rest of construction
    /// (spec.md §4.1).
    pub async fn new(
        config: ClusterConfig,
        options: RuntimeOptions,
        status_bus: StatusBus,
        restrict_hosts: Option<Vec<String>>,
    ) -> ClusterResult<Self> {
        config.validate()?;

        let mut queues = QueueSet::new();
        let mut scheduled = Vec::new();
        let mut down_hosts: HashMap<String, bool> = HashMap::new();

        for host in config.enabled_hosts() {
            if let Some(allow) = &restrict_hosts {
                if !allow.iter().any(|h| h == &host.name) {
                    continue;
                }
            }

            let reachable = match down_hosts.get(&host.name) {
                Some(cached) => *cached,
                None => {
                    let ok = if matches!(host.variant, HostVariant::Local) {
                        true
                    } else {
                        host_ok(host, options.agent_port).await.unwrap_or(false)
                    };
                    down_hosts.insert(host.name.clone(), ok);
                    ok
                }
            };

            if !reachable {
                warn!(host = %host.name, "host unreachable, skipping");
                continue;
            }

            for engine_name in &host.engines {
                let Some(engine) = config.engines.get(engine_name) else {
                    continue;
                };
                for (quality, cli_fragment) in engine.qualities() {
                    queues.ensure(quality);
                    scheduled.push(ScheduledWorker {
                        host: host.clone(),
                        quality: quality.clone(),
                        cli_fragment: cli_fragment.clone(),
                        engine_name: engine_name.clone(),
                    });
                }
            }
        }

        Ok(Self {
            queues,
            scheduled,
            config,
            options,
            status_bus,
            cancelled: Arc::new(AtomicBool::new(false)),
            completions: Vec::new(),
        })
    }

    /// Resolves the template, probes the file, selects a quality, and
    /// places an `EncodeJob` into the chosen queue (spec.md §4.1).
    pub fn enqueue(
        &self,
        probe: &dyn MediaProbe,
        file: PathBuf,
        template_name: &str,
        quality_override: Option<&str>,
    ) -> ClusterResult<()> {
        let template = self.config.template(template_name)?.clone();
        let media_info = probe.probe(&file)?;
        let quality = quality_override.unwrap_or(&template.quality);

        if !self.queues.contains(quality) {
            return Err(ClusterError::UnmappedQuality(quality.to_string()));
        }

        let job = EncodeJob::new(file, media_info, template);
        self.queues.enqueue(quality, job)
    }

    /// Starts every scheduled worker concurrently, waits for all to finish,
    /// and aggregates completion records.
    pub async fn run(&mut self) -> ClusterResult<Vec<CompletionRecord>> {
        info!(workers = self.scheduled.len(), "starting cluster run");

        let mut handles: Vec<JoinHandle<Vec<CompletionRecord>>> = Vec::new();

        for scheduled in &self.scheduled {
            let queue = self
                .queues
                .get(&scheduled.quality)
                .expect("queue created during construction")
                .clone();
            let host = scheduled.host.clone();
            let cli_fragment = scheduled.cli_fragment.clone();
            let engine_label = scheduled.engine_name.clone();
            let options = self.options.clone();
            let status_bus = self.status_bus.clone();
            let remote_shell = self.options.remote_shell.clone();
            let cancelled = self.cancelled.clone();

            let handle = tokio::spawn(async move {
                let mut ctx = WorkerContext::new(
                    queue,
                    cli_fragment,
                    engine_label,
                    host.clone(),
                    options,
                    status_bus,
                    cancelled,
                );
                match host.variant {
                    HostVariant::Local => run_local(&mut ctx).await,
                    HostVariant::Mounted => {
                        run_mounted(&mut ctx).await;
                    }
                    HostVariant::Streaming => {
                        run_streaming(&mut ctx, &remote_shell.with_file_name("scp")).await;
                    }
                    HostVariant::Agent => {
                        let agent_port = ctx.options.agent_port;
                        run_agent(&mut ctx, agent_port).await;
                    }
                }
                ctx.completions
            });
            handles.push(handle);
        }

        let mut all_completions = Vec::new();
        for handle in handles {
            match handle.await {
                Ok(mut records) => all_completions.append(&mut records),
                Err(e) => warn!(error = %e, "worker task panicked"),
            }
        }

        self.completions = all_completions.clone();
        Ok(all_completions)
    }

    /// Cooperative termination: sets the shared flag; worker loops observe
    /// it between jobs and stop draining their queue (spec.md §5).
    pub fn terminate(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// A clone of the cancellation flag, for wiring a signal handler that
    /// outlives a `&mut self` borrow held across `run()`.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        self.cancelled.clone()
    }

    pub fn queues_empty(&self) -> bool {
        self.queues.all_empty()
    }
}

/// Renders the final per-run summary the CLI prints after `run()` returns
/// (the `dump_stats`-equivalent; spec.md §3's "Completion record" is the
/// input, rendering itself stays a CLI concern per spec.md §1).
pub fn format_completion_report(completions: &[CompletionRecord]) -> String {
    if completions.is_empty() {
        return "No files processed.".to_string();
    }
    let mut lines = vec![format!("{} file(s) processed:", completions.len())];
    for record in completions {
        lines.push(format!(
            "  {} ({:.1}s)",
            record.source.display(),
            record.elapsed_secs
        ));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_completion_list_reports_nothing_to_do() {
        assert_eq!(format_completion_report(&[]), "No files processed.");
    }

    #[test]
    fn report_lists_every_completion() {
        let records = vec![
            CompletionRecord {
                source: PathBuf::from("/tmp/a.mkv"),
                elapsed_secs: 12.5,
            },
            CompletionRecord {
                source: PathBuf::from("/tmp/b.mkv"),
                elapsed_secs: 30.0,
            },
        ];
        let report = format_completion_report(&records);
        assert!(report.contains("2 file(s) processed"));
        assert!(report.contains("/tmp/a.mkv"));
        assert!(report.contains("/tmp/b.mkv"));
    }
}
