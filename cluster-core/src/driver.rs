//! Encoder driver: spawns the encoder, streams its output, enforces veto (C3)

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use rand::Rng;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::error::{ClusterError, ClusterResult};
use crate::progress::{calculate_progress, parse_status_line, EncoderStats};
use crate::job::EncodeJob;

const DEFAULT_MONITOR_INTERVAL: Duration = Duration::from_secs(10);

/// Outcome of a monitored encoder run.
#[derive(Debug)]
pub enum DriverOutcome {
    /// Process exited; carries its exit code.
    Exited(i32),
    /// The callback vetoed mid-flight; the child has already been killed.
    Vetoed,
}

/// What the monitoring loop hands back to the caller every `monitor_interval`.
pub type ProgressCallback<'a> = dyn FnMut(&EncodeJob, &EncoderStats) -> bool + Send + 'a;

/// Launches the encoder (locally or over a remote shell) and watches its
/// merged stdout/stderr for progress lines, per spec.md §4.3.
pub struct EncoderDriver {
    worker_id: String,
    monitor_interval: Duration,
    log_path: Option<PathBuf>,
}

impl EncoderDriver {
    pub fn new(worker_id: impl Into<String>) -> Self {
        Self {
            worker_id: worker_id.into(),
            monitor_interval: DEFAULT_MONITOR_INTERVAL,
            log_path: None,
        }
    }

    pub fn with_monitor_interval(mut self, interval: Duration) -> Self {
        self.monitor_interval = interval;
        self
    }

    /// Log-file path left behind by the most recent non-zero-exit run, if any.
    pub fn log_path(&self) -> Option<&Path> {
        self.log_path.as_deref()
    }

    fn fresh_log_path(&self) -> PathBuf {
        let suffix: u32 = rand::thread_rng().gen_range(100..1000);
        std::env::temp_dir().join(format!("cluster-{}-{}.log", self.worker_id, suffix))
    }

    /// Spawn the encoder as a local child process.
    pub async fn run(
        &mut self,
        encoder_path: &Path,
        args: &[String],
        job: &EncodeJob,
        callback: &mut ProgressCallback<'_>,
    ) -> ClusterResult<DriverOutcome> {
        let mut cmd = Command::new(encoder_path);
        cmd.args(args);
        self.drive(cmd, job, callback).await
    }

    /// Spawn the encoder through a remote-shell invocation (mounted/streaming
    /// variants).
    pub async fn run_remote(
        &mut self,
        remote_shell: &Path,
        user_at_host: &str,
        remote_command_line: &str,
        job: &EncodeJob,
        callback: &mut ProgressCallback<'_>,
    ) -> ClusterResult<DriverOutcome> {
        let mut cmd = Command::new(remote_shell);
        cmd.arg(user_at_host).arg(remote_command_line);
        self.drive(cmd, job, callback).await
    }

    async fn drive(
        &mut self,
        mut cmd: Command,
        job: &EncodeJob,
        callback: &mut ProgressCallback<'_>,
    ) -> ClusterResult<DriverOutcome> {
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd
            .spawn()
            .map_err(|e| ClusterError::EncoderFailed(format!("failed to spawn encoder: {e}")))?;

        let stdout = child.stdout.take().expect("piped stdout");
        let stderr = child.stderr.take().expect("piped stderr");

        let log_path = self.fresh_log_path();
        let mut log_file = tokio::fs::File::create(&log_path)
            .await
            .map_err(ClusterError::Io)?;

        let mut out_lines = BufReader::new(stdout).lines();
        let mut err_lines = BufReader::new(stderr).lines();
        let mut last_stats = EncoderStats::default();
        let mut last_invoke = Instant::now();

        loop {
            let line = tokio::select! {
                l = out_lines.next_line() => l,
                l = err_lines.next_line() => l,
            };
            let line = match line.map_err(ClusterError::Io)? {
                Some(l) => l,
                None => break,
            };

            let _ = log_file.write_all(line.as_bytes()).await;
            let _ = log_file.write_all(b"\n").await;

            if let Some(stats) = parse_status_line(&line) {
                last_stats = stats;
            } else {
                debug!(worker = %self.worker_id, "encoder: {line}");
            }

            if last_invoke.elapsed() >= self.monitor_interval {
                last_invoke = Instant::now();
                let (pct_done, pct_comp) = calculate_progress(job, &last_stats);
                debug!(pct_done, pct_comp, "progress sample");
                if callback(job, &last_stats) {
                    child.start_kill().ok();
                    let _ = child.wait().await;
                    self.log_path = Some(log_path);
                    return Ok(DriverOutcome::Vetoed);
                }
            }
        }

        // Final yield of the most recent stats before returning.
        callback(job, &last_stats);

        let status = child.wait().await.map_err(ClusterError::Io)?;
        let code = status.code().unwrap_or(-1);

        if code == 0 {
            let _ = tokio::fs::remove_file(&log_path).await;
            self.log_path = None;
        } else {
            warn!(worker = %self.worker_id, code, log = %log_path.display(), "encoder exited non-zero");
            self.log_path = Some(log_path);
        }

        Ok(DriverOutcome::Exited(code))
    }
}

/// Reads status lines from an agent socket instead of a child pipe,
/// forwarding `ACK!` after each and detecting the `DONE|`/`ERR|` terminal
/// transition (spec.md §4.3's agent-monitoring variant).
pub async fn monitor_agent_stream(
    stream: &mut TcpStream,
    job: &EncodeJob,
    callback: &mut ProgressCallback<'_>,
) -> ClusterResult<String> {
    let (read_half, mut write_half) = stream.split();
    let mut lines = BufReader::new(read_half).lines();

    loop {
        let line = lines
            .next_line()
            .await
            .map_err(ClusterError::Io)?
            .ok_or_else(|| ClusterError::ProtocolViolation("agent closed stream".into()))?;

        if line.starts_with("DONE|") || line.starts_with("ERR|") {
            return Ok(line);
        }

        if let Some(stats) = parse_status_line(&line) {
            if callback(job, &stats) {
                write_half.write_all(b"VETO").await.map_err(ClusterError::Io)?;
                return Ok("VETOED".to_string());
            }
        }

        write_half.write_all(b"ACK!").await.map_err(ClusterError::Io)?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::MediaInfo;
    use crate::template::Template;
    use std::path::PathBuf;

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
                runtime_secs: 100,
                frames: 1000,
                file_size_bytes: 1_000_000,
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

    #[tokio::test]
    async fn run_reports_exit_code_for_a_trivial_command() {
        let mut driver = EncoderDriver::new("test-worker").with_monitor_interval(Duration::from_millis(1));
        let j = job();
        let mut cb = |_: &EncodeJob, _: &EncoderStats| false;
        let outcome = driver
            .run(Path::new("/bin/echo"), &["frame=1 fps=1 q=1 size=1kB time=00:00:01.00 bitrate=1kbits/s speed=1x".to_string()], &j, &mut cb)
            .await
            .unwrap();
        assert!(matches!(outcome, DriverOutcome::Exited(0)));
        assert!(driver.log_path().is_none());
    }
}
