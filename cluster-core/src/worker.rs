//! Host workers (C5): one task per (host, quality), four variants sharing a
//! common capability set instead of an inheritance hierarchy (spec.md §9).

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::net::TcpStream;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{info, warn};

use crate::driver::{monitor_agent_stream, DriverOutcome, EncoderDriver};
use crate::error::{ClusterError, ClusterResult};
use crate::host::{HostDescriptor, HostVariant};
use crate::job::EncodeJob;
use crate::protocol::{self, ControlToken, Greeting};
use crate::queue::JobQueue;
use crate::runtime::RuntimeOptions;
use crate::status::{StatusBus, StatusEvent};
use crate::threshold::ThresholdEvaluator;

const ICMP_TIMEOUT: Duration = Duration::from_secs(5);
const REMOTE_SHELL_PROBE_TIMEOUT: Duration = Duration::from_secs(10);
const AGENT_CONNECT_TIMEOUT: Duration = Duration::from_secs(2);
const AGENT_PING_TIMEOUT: Duration = Duration::from_secs(5);

/// One completed job: `(source path, elapsed seconds)` (spec.md §3).
#[derive(Debug, Clone)]
pub struct CompletionRecord {
    pub source: PathBuf,
    pub elapsed_secs: f64,
}

/// Post-conditions observable for testing the mounted variant (spec.md §8
/// scenario 2).
#[derive(Debug, Clone, Default)]
pub struct RemotePaths {
    pub remote_in_path: Option<String>,
    pub remote_out_path: Option<String>,
}

/// Shared state every host-worker variant carries (spec.md §4.2).
pub struct WorkerContext {
    pub queue: JobQueue,
    pub cli_fragment: String,
    pub engine_label: String,
    pub host: HostDescriptor,
    pub options: RuntimeOptions,
    pub status_bus: StatusBus,
    pub completions: Vec<CompletionRecord>,
    pub cancelled: Arc<AtomicBool>,
}

impl WorkerContext {
    pub fn new(
        queue: JobQueue,
        cli_fragment: impl Into<String>,
        engine_label: impl Into<String>,
        host: HostDescriptor,
        options: RuntimeOptions,
        status_bus: StatusBus,
        cancelled: Arc<AtomicBool>,
    ) -> Self {
        Self {
            queue,
            cli_fragment: cli_fragment.into(),
            engine_label: engine_label.into(),
            host,
            options,
            status_bus,
            completions: Vec::new(),
            cancelled,
        }
    }

    fn should_stop(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    fn worker_id(&self) -> String {
        format!("{}-{}", self.host.name, self.engine_label)
    }

    /// Status host label: undecorated on `Connect`, decorated
    /// `"hostname/engine"` on mid-flight progress (spec.md §6's schema note,
    /// grounded in the source's verbose host labeling).
    fn decorated_label(&self) -> String {
        if self.options.verbose {
            format!("{}/{}", self.host.name, self.engine_label)
        } else {
            self.host.name.clone()
        }
    }

    fn publish(&self, event: StatusEvent) {
        self.status_bus.publish(event);
    }
}

/// Reachability probe (`host_ok`), variant-specific (spec.md §4.2).
pub async fn host_ok(host: &HostDescriptor, agent_port: u16) -> ClusterResult<bool> {
    match host.variant {
        HostVariant::Local => Ok(true),
        HostVariant::Mounted | HostVariant::Streaming => {
            if !icmp_echo(host).await {
                return Ok(false);
            }
            Ok(remote_listing_ok(host).await)
        }
        HostVariant::Agent => {
            if !icmp_echo(host).await {
                return Ok(false);
            }
            Ok(agent_ping(host, agent_port).await)
        }
    }
}

async fn icmp_echo(host: &HostDescriptor) -> bool {
    let Some(address) = &host.address else {
        return false;
    };
    let ping = timeout(
        ICMP_TIMEOUT,
        Command::new("ping")
            .arg("-c")
            .arg("1")
            .arg(address)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status(),
    )
    .await;
    matches!(ping, Ok(Ok(status)) if status.success())
}

async fn remote_listing_ok(host: &HostDescriptor) -> bool {
    let Some(address) = &host.address else {
        return false;
    };
    let Some(user) = &host.user else {
        return false;
    };
    let listing = timeout(
        REMOTE_SHELL_PROBE_TIMEOUT,
        Command::new("ssh")
            .arg(format!("{user}@{address}"))
            .arg("ls")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status(),
    )
    .await;
    matches!(listing, Ok(Ok(status)) if status.success())
}

async fn agent_ping(host: &HostDescriptor, agent_port: u16) -> bool {
    let Some(address) = &host.address else {
        return false;
    };
    let connect = timeout(AGENT_CONNECT_TIMEOUT, TcpStream::connect((address.as_str(), agent_port))).await;
    let Ok(Ok(mut stream)) = connect else {
        return false;
    };
    let ping_exchange = timeout(AGENT_PING_TIMEOUT, async {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        stream.write_all(b"PING").await?;
        let mut buf = [0u8; 4];
        stream.read_exact(&mut buf).await?;
        Ok::<_, std::io::Error>(buf == *b"PONG")
    })
    .await;
    matches!(ping_exchange, Ok(Ok(true)))
}

/// Drains `ctx.queue` until empty, running `process_one` for each job. Any
/// error is logged and the loop continues (spec.md §4.2's defensive
/// contract).
pub async fn run_local(ctx: &mut WorkerContext) {
    while !ctx.should_stop() {
        let Some(job) = ctx.queue.get() else { break };
        if let Err(e) = process_local_job(ctx, &job).await {
            warn!(worker = %ctx.worker_id(), error = %e, "job failed");
        }
    }
}

async fn process_local_job(ctx: &mut WorkerContext, job: &EncodeJob) -> ClusterResult<()> {
    let start = Instant::now();
    let file_name = file_base_name(&job.in_path);
    ctx.publish(StatusEvent::new(&ctx.host.name, &file_name, 0).with_status("Connect"));

    let out_path = output_path(&job.in_path, &job.template.extension);
    let args = build_local_args(job, &ctx.cli_fragment, &job.in_path, &out_path);

    if ctx.options.dry_run {
        info!(cmd = ?args, "dry run");
        return Ok(());
    }

    let mut driver = EncoderDriver::new(ctx.worker_id());
    let job_clone = job.clone();
    let bus = ctx.status_bus.clone();
    let label = ctx.decorated_label();
    let file_name_cb = file_name.clone();
    let mut cb = move |job: &EncodeJob, stats: &crate::progress::EncoderStats| {
        let (pct_done, pct_comp) = crate::progress::calculate_progress(job, stats);
        bus.publish(
            StatusEvent::new(&label, &file_name_cb, pct_done.clamp(0, 100) as u8)
                .with_speed(stats.speed.clone().unwrap_or_else(|| "---".to_string()))
                .with_comp(format!("{pct_comp}%"))
                .with_status("Running"),
        );
        ThresholdEvaluator::should_veto(job, pct_done, pct_comp)
    };

    let encoder_path = PathBuf::from(&ctx.host.encoder_path);
    let outcome = driver.run(&encoder_path, &args, &job_clone, &mut cb).await?;

    match outcome {
        DriverOutcome::Vetoed => {
            let _ = tokio::fs::remove_file(&out_path).await;
            ctx.publish(
                StatusEvent::new(&ctx.host.name, &file_name, 100).with_status("Skipped (threshold)"),
            );
            ctx.completions.push(CompletionRecord {
                source: job.in_path.clone(),
                elapsed_secs: start.elapsed().as_secs_f64(),
            });
            Ok(())
        }
        DriverOutcome::Exited(0) => {
            finalize_local_success(ctx, job, &out_path, &file_name, start).await
        }
        DriverOutcome::Exited(code) => {
            warn!(
                worker = %ctx.worker_id(),
                code,
                log = ?driver.log_path(),
                "encoder exited non-zero"
            );
            let _ = tokio::fs::remove_file(&out_path).await;
            Err(ClusterError::EncoderFailed(format!("exit code {code}")))
        }
    }
}

async fn finalize_local_success(
    ctx: &mut WorkerContext,
    job: &EncodeJob,
    out_path: &Path,
    file_name: &str,
    start: Instant,
) -> ClusterResult<()> {
    let orig_size = job.media_info.file_size_bytes;
    let new_size = tokio::fs::metadata(out_path)
        .await
        .map(|m| m.len())
        .unwrap_or(0);

    if ThresholdEvaluator::is_exceeded_threshold(job, orig_size, new_size) {
        let _ = tokio::fs::remove_file(out_path).await;
        ctx.completions.push(CompletionRecord {
            source: job.in_path.clone(),
            elapsed_secs: start.elapsed().as_secs_f64(),
        });
        return Ok(());
    }

    if !ctx.options.keep_source {
        tokio::fs::remove_file(&job.in_path).await.map_err(ClusterError::Io)?;
        tokio::fs::rename(out_path, &job.in_path).await.map_err(ClusterError::Io)?;
    }

    // Report after the rename so the size reflects the final file
    // (spec.md §9's resolved open question on post-rename size reporting).
    let final_size = tokio::fs::metadata(&job.in_path)
        .await
        .map(|m| m.len())
        .unwrap_or(new_size);

    ctx.publish(
        StatusEvent::new(&ctx.host.name, file_name, 100).with_status(format!(
            "{}mb -> {}mb",
            orig_size / 1_048_576,
            final_size / 1_048_576
        )),
    );
    ctx.completions.push(CompletionRecord {
        source: job.in_path.clone(),
        elapsed_secs: start.elapsed().as_secs_f64(),
    });
    Ok(())
}

/// Mounted variant: same as local except paths are substituted for the
/// remote tree and the encoder runs through the remote shell.
pub async fn run_mounted(ctx: &mut WorkerContext) -> RemotePaths {
    let mut last = RemotePaths::default();
    while !ctx.should_stop() {
        let Some(job) = ctx.queue.get() else { break };
        match process_mounted_job(ctx, &job).await {
            Ok(paths) => last = paths,
            Err(e) => warn!(worker = %ctx.worker_id(), error = %e, "job failed"),
        }
    }
    last
}

async fn process_mounted_job(ctx: &mut WorkerContext, job: &EncodeJob) -> ClusterResult<RemotePaths> {
    let start = Instant::now();
    let file_name = file_base_name(&job.in_path);
    ctx.publish(StatusEvent::new(&ctx.host.name, &file_name, 0).with_status("Connect"));

    let local_out = output_path(&job.in_path, &job.template.extension);
    let (remote_in, remote_out) = ctx.host.substitute_paths(
        &job.in_path.to_string_lossy(),
        &local_out.to_string_lossy(),
    );
    let remote_in_q = ctx.host.quote_path(&remote_in);
    let remote_out_q = ctx.host.quote_path(&remote_out);

    let args = build_local_args(job, &ctx.cli_fragment, Path::new(&remote_in_q), Path::new(&remote_out_q));
    let remote_cmd = format!("{} {}", ctx.host.encoder_path, args.join(" "));

    if ctx.options.dry_run {
        info!(cmd = %remote_cmd, "dry run");
        return Ok(RemotePaths {
            remote_in_path: Some(remote_in),
            remote_out_path: Some(remote_out),
        });
    }

    let user_at_host = format!(
        "{}@{}",
        ctx.host.user.clone().unwrap_or_default(),
        ctx.host.address.clone().unwrap_or_default()
    );

    let mut driver = EncoderDriver::new(ctx.worker_id());
    let job_clone = job.clone();
    let bus = ctx.status_bus.clone();
    let label = ctx.decorated_label();
    let file_name_cb = file_name.clone();
    let mut cb = move |job: &EncodeJob, stats: &crate::progress::EncoderStats| {
        let (pct_done, pct_comp) = crate::progress::calculate_progress(job, stats);
        bus.publish(
            StatusEvent::new(&label, &file_name_cb, pct_done.clamp(0, 100) as u8)
                .with_speed(stats.speed.clone().unwrap_or_else(|| "---".to_string()))
                .with_comp(format!("{pct_comp}%"))
                .with_status("Running"),
        );
        ThresholdEvaluator::should_veto(job, pct_done, pct_comp)
    };

    let outcome = driver
        .run_remote(&ctx.options.remote_shell, &user_at_host, &remote_cmd, &job_clone, &mut cb)
        .await?;

    let paths = RemotePaths {
        remote_in_path: Some(remote_in),
        remote_out_path: Some(remote_out.clone()),
    };

    match outcome {
        DriverOutcome::Vetoed => {
            ctx.publish(
                StatusEvent::new(&ctx.host.name, &file_name, 100).with_status("Skipped (threshold)"),
            );
        }
        DriverOutcome::Exited(0) => {
            finalize_local_success(ctx, job, &local_out, &file_name, start).await?;
        }
        DriverOutcome::Exited(code) => {
            return Err(ClusterError::EncoderFailed(format!("exit code {code}")));
        }
    }

    Ok(paths)
}

/// Streaming variant: copies source to the remote `working_dir`, runs the
/// encoder there, pulls the result back (spec.md §4.2.3).
pub async fn run_streaming(ctx: &mut WorkerContext, scp_path: &Path) {
    while !ctx.should_stop() {
        let Some(job) = ctx.queue.get() else { break };
        if let Err(e) = process_streaming_job(ctx, &job, scp_path).await {
            warn!(worker = %ctx.worker_id(), error = %e, "job failed");
        }
    }
}

async fn process_streaming_job(
    ctx: &mut WorkerContext,
    job: &EncodeJob,
    scp_path: &Path,
) -> ClusterResult<()> {
    let start = Instant::now();
    let file_name = file_base_name(&job.in_path);
    ctx.publish(StatusEvent::new(&ctx.host.name, &file_name, 0).with_status("Connect"));

    let working_dir = ctx
        .host
        .working_dir
        .clone()
        .ok_or_else(|| ClusterError::InvalidHostDescriptor {
            host: ctx.host.name.clone(),
            reason: "missing working_dir".into(),
        })?;
    let address = ctx
        .host
        .address
        .clone()
        .ok_or_else(|| ClusterError::HostUnreachable(ctx.host.name.clone()))?;
    let user = ctx.host.user.clone().unwrap_or_default();

    let remote_in = format!("{working_dir}/{file_name}");
    let remote_out = format!("{remote_in}.tmp");
    let local_out = output_path(&job.in_path, &job.template.extension);

    ctx.publish(StatusEvent::new(&ctx.host.name, &file_name, 0).with_status("Copying"));
    let push = Command::new(scp_path)
        .arg(&job.in_path)
        .arg(format!("{user}@{address}:{remote_in}"))
        .status()
        .await
        .map_err(ClusterError::Io)?;
    if !push.success() {
        return Err(ClusterError::TransportFailure(format!(
            "secure copy to {address} failed"
        )));
    }

    let args = build_local_args(job, &ctx.cli_fragment, Path::new(&remote_in), Path::new(&remote_out));
    let remote_cmd = format!("{} {}", ctx.host.encoder_path, args.join(" "));
    let user_at_host = format!("{user}@{address}");

    let mut driver = EncoderDriver::new(ctx.worker_id());
    let job_clone = job.clone();
    let bus = ctx.status_bus.clone();
    let label = ctx.decorated_label();
    let file_name_cb = file_name.clone();
    let mut cb = move |job: &EncodeJob, stats: &crate::progress::EncoderStats| {
        let (pct_done, pct_comp) = crate::progress::calculate_progress(job, stats);
        bus.publish(
            StatusEvent::new(&label, &file_name_cb, pct_done.clamp(0, 100) as u8)
                .with_speed(stats.speed.clone().unwrap_or_else(|| "---".to_string()))
                .with_comp(format!("{pct_comp}%"))
                .with_status("Running"),
        );
        ThresholdEvaluator::should_veto(job, pct_done, pct_comp)
    };

    let outcome = driver
        .run_remote(&ctx.options.remote_shell, &user_at_host, &remote_cmd, &job_clone, &mut cb)
        .await;

    let delete_remote_tmp = async {
        let delete_cmd = ctx.host.delete_command(&remote_out);
        let _ = Command::new(&ctx.options.remote_shell)
            .arg(&user_at_host)
            .arg(&delete_cmd)
            .status()
            .await;
    };

    let outcome = match outcome {
        Ok(o) => o,
        Err(e) => {
            delete_remote_tmp.await;
            return Err(e);
        }
    };

    match outcome {
        DriverOutcome::Vetoed => {
            delete_remote_tmp.await;
            ctx.publish(
                StatusEvent::new(&ctx.host.name, &file_name, 100).with_status("Skipped (threshold)"),
            );
            ctx.completions.push(CompletionRecord {
                source: job.in_path.clone(),
                elapsed_secs: start.elapsed().as_secs_f64(),
            });
            Ok(())
        }
        DriverOutcome::Exited(0) => {
            ctx.publish(StatusEvent::new(&ctx.host.name, &file_name, 100).with_status("Retrieving"));
            let pull = Command::new(scp_path)
                .arg(format!("{user}@{address}:{remote_out}"))
                .arg(&local_out)
                .status()
                .await
                .map_err(ClusterError::Io)?;
            delete_remote_tmp.await;
            if !pull.success() {
                return Err(ClusterError::TransportFailure(format!(
                    "secure copy from {address} failed"
                )));
            }
            finalize_local_success(ctx, job, &local_out, &file_name, start).await
        }
        DriverOutcome::Exited(code) => {
            delete_remote_tmp.await;
            Err(ClusterError::EncoderFailed(format!("exit code {code}")))
        }
    }
}

/// Agent variant: speaks the wire protocol in §4.4, choosing the shared
/// (`HELLOS`) form when path substitutions are configured, else the
/// pushed-file (`HELLO`) form.
pub async fn run_agent(ctx: &mut WorkerContext, agent_port: u16) {
    while !ctx.should_stop() {
        let Some(job) = ctx.queue.get() else { break };
        if let Err(e) = process_agent_job(ctx, &job, agent_port).await {
            warn!(worker = %ctx.worker_id(), error = %e, "job failed");
        }
    }
}

async fn process_agent_job(ctx: &mut WorkerContext, job: &EncodeJob, agent_port: u16) -> ClusterResult<()> {
    let start = Instant::now();
    let file_name = file_base_name(&job.in_path);
    ctx.publish(StatusEvent::new(&ctx.host.name, &file_name, 0).with_status("Connect"));

    let address = ctx
        .host
        .address
        .clone()
        .ok_or_else(|| ClusterError::HostUnreachable(ctx.host.name.clone()))?;
    let mut stream = TcpStream::connect((address.as_str(), agent_port))
        .await
        .map_err(ClusterError::Io)?;

    let greeting = if ctx.host.has_path_substitutions() {
        let local_out = output_path(&job.in_path, &job.template.extension);
        let (remote_in, remote_out) = ctx.host.substitute_paths(
            &job.in_path.to_string_lossy(),
            &local_out.to_string_lossy(),
        );
        Greeting::HelloShared {
            client_version: protocol::PROTOCOL_VERSION.to_string(),
            shared_in_path: remote_in,
            shared_out_path: remote_out,
            cli_template: ctx.cli_fragment.clone(),
            keep_source: ctx.options.keep_source,
        }
    } else {
        let file_size = job.media_info.file_size_bytes;
        Greeting::Hello {
            client_version: protocol::PROTOCOL_VERSION.to_string(),
            file_size,
            working_dir: "/tmp".to_string(),
            basename: file_name.clone(),
            cli_template: ctx.cli_fragment.clone(),
        }
    };

    let echo = protocol::send_greeting(&mut stream, &greeting).await?;
    if let Some(reason) = echo.strip_prefix("NAK|") {
        return Err(ClusterError::Nak(reason.to_string()));
    }
    if echo != greeting.encode() {
        warn!(worker = %ctx.worker_id(), "greeting version mismatch, continuing");
    }

    if let Greeting::Hello { file_size, .. } = &greeting {
        ctx.publish(StatusEvent::new(&ctx.host.name, &file_name, 0).with_status("Copying"));
        let sent = protocol::push_file(&mut stream, &job.in_path).await?;
        if sent != *file_size {
            warn!(worker = %ctx.worker_id(), sent, expected = file_size, "short upload");
        }
    }

    let job_clone = job.clone();
    let bus = ctx.status_bus.clone();
    let label = ctx.decorated_label();
    let file_name_cb = file_name.clone();
    let mut cb = move |job: &EncodeJob, stats: &crate::progress::EncoderStats| {
        let (pct_done, pct_comp) = crate::progress::calculate_progress(job, stats);
        bus.publish(
            StatusEvent::new(&label, &file_name_cb, pct_done.clamp(0, 100) as u8)
                .with_speed(stats.speed.clone().unwrap_or_else(|| "---".to_string()))
                .with_comp(format!("{pct_comp}%"))
                .with_status("Running"),
        );
        ThresholdEvaluator::should_veto(job, pct_done, pct_comp)
    };

    let terminal = monitor_agent_stream(&mut stream, &job_clone, &mut cb).await?;

    if terminal == "VETOED" {
        ctx.publish(
            StatusEvent::new(&ctx.host.name, &file_name, 100).with_status("Skipped (threshold)"),
        );
        ctx.completions.push(CompletionRecord {
            source: job.in_path.clone(),
            elapsed_secs: start.elapsed().as_secs_f64(),
        });
        return Ok(());
    }

    if let Some(reason) = terminal.strip_prefix("ERR|") {
        return Err(ClusterError::EncoderFailed(format!("agent reported {reason}")));
    }

    let (_, result_size) = protocol::parse_done(&terminal)?;
    use tokio::io::AsyncWriteExt;
    stream
        .write_all(ControlToken::Ack.as_bytes())
        .await
        .map_err(ClusterError::Io)?;

    if matches!(greeting, Greeting::Hello { .. }) {
        let tmp_path = job.in_path.with_extension(format!(
            "{}.tmp",
            job.in_path.extension().and_then(|e| e.to_str()).unwrap_or("")
        ));
        protocol::pull_file(&mut stream, &tmp_path, result_size).await?;
        finalize_local_success(ctx, job, &tmp_path, &file_name, start).await
    } else {
        ctx.completions.push(CompletionRecord {
            source: job.in_path.clone(),
            elapsed_secs: start.elapsed().as_secs_f64(),
        });
        Ok(())
    }
}

/// Cooperative termination: a worker stops taking new jobs from its queue.
/// Already-open agent sockets send `STOP`; spawned children are killed by
/// the driver's own veto path. Forwarded from `Cluster::terminate()`
/// (spec.md §5).
pub fn terminate(_ctx: &WorkerContext) {
    // The queue-drain loops above simply stop on the next `queue.get()` once
    // the cluster's cancellation flag is observed by the caller; nothing to
    // do here beyond documenting the contract workers must honor.
}

fn file_base_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string_lossy().to_string())
}

fn output_path(in_path: &Path, extension: &str) -> PathBuf {
    let stem = in_path.with_extension("");
    PathBuf::from(format!("{}{}.tmp", stem.display(), extension))
}

fn build_local_args(job: &EncodeJob, cli_fragment: &str, input: &Path, output: &Path) -> Vec<String> {
    let mut args = vec!["-stats_period".to_string(), "2".to_string(), "-y".to_string()];
    args.extend(job.template.input_options_list().iter().cloned());
    args.push("-i".to_string());
    args.push(input.to_string_lossy().to_string());
    args.extend(cli_fragment.split_whitespace().map(String::from));
    args.extend(job.template.output_options_list());
    if let Some(map) = job.template.stream_map(
        &job.media_info.video_index,
        &job.media_info.audio,
        &job.media_info.subtitle,
    ) {
        args.extend(map);
    }
    args.push(output.to_string_lossy().to_string());
    args
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::OsFamily;
    use crate::media::MediaInfo;
    use crate::template::Template;

    fn job() -> EncodeJob {
        EncodeJob::new(
            PathBuf::from("/tmp/a.mkv"),
            MediaInfo {
                path: PathBuf::from("/tmp/a.mkv"),
                video_index: "0".into(),
                video_codec: "h264".into(),
                width: 1920,
                height: 1080,
                frame_rate: 24.0,
                color_space: "yuv420p".into(),
                runtime_secs: 3200,
                frames: 74426,
                file_size_bytes: 1_500_000_000,
                audio: vec![],
                subtitle: vec![],
            },
            Template {
                name: "tv".into(),
                input_options: vec![],
                audio_options: vec![],
                subtitle_options: vec![],
                extension: ".mkv".into(),
                quality: "medium".into(),
                audio_lang: vec![],
                subtitle_lang: vec![],
                threshold: 0,
                threshold_check: 100,
            },
        )
    }

    #[test]
    fn output_path_strips_extension_and_appends_tmp() {
        let p = output_path(Path::new("/tmp/a.mkv"), ".mkv");
        assert_eq!(p, PathBuf::from("/tmp/a.mkv.tmp"));
    }

    #[test]
    fn build_local_args_embeds_input_and_output() {
        let j = job();
        let args = build_local_args(&j, "-c:v libx264 -crf 23", Path::new("/tmp/a.mkv"), Path::new("/tmp/a.mkv.tmp"));
        assert!(args.contains(&"-i".to_string()));
        assert!(args.contains(&"/tmp/a.mkv".to_string()));
        assert!(args.contains(&"/tmp/a.mkv.tmp".to_string()));
        assert!(args.contains(&"-crf".to_string()));
    }

    #[tokio::test]
    async fn local_host_is_always_reachable() {
        let host = HostDescriptor {
            name: "localhost".into(),
            variant: HostVariant::Local,
            address: None,
            user: None,
            os: Some(OsFamily::Linux),
            working_dir: None,
            encoder_path: "/usr/bin/ffmpeg".into(),
            path_substitutions: vec![],
            enabled: true,
            engines: vec!["default".into()],
        };
        assert!(host_ok(&host, 9567).await.unwrap());
    }
}
