//! Agent-mode server loop: the listening side of spec.md §4.4's protocol

use std::path::PathBuf;
use std::process::Stdio;

use anyhow::{Context, Result};
use cluster_core::protocol::{self, ControlToken, Greeting};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::process::Command;
use tracing::{debug, error, info, warn};
use which::which;

pub async fn serve(port: u16) -> Result<()> {
    let listener = TcpListener::bind(("0.0.0.0", port))
        .await
        .with_context(|| format!("binding agent listener on port {port}"))?;
    info!(port, "agent listening");

    let mut connection_id: u64 = 0;
    loop {
        let (socket, peer) = listener.accept().await?;
        connection_id += 1;
        info!(connection_id, %peer, "accepted connection");
        tokio::spawn(async move {
            if let Err(e) = handle_connection(socket, connection_id).await {
                error!(connection_id, error = %e, "connection failed");
            }
        });
    }
}

async fn handle_connection(mut stream: TcpStream, connection_id: u64) -> Result<()> {
    let mut buf = vec![0u8; protocol::GREETING_MAX_BYTES];
    let n = stream.read(&mut buf).await?;
    let raw = String::from_utf8_lossy(&buf[..n]).to_string();

    let greeting = match Greeting::parse(&raw) {
        Ok(g) => g,
        Err(e) => {
            stream.write_all(format!("NAK|{e}").as_bytes()).await?;
            return Ok(());
        }
    };

    if matches!(greeting, Greeting::Ping) {
        stream.write_all(b"PONG").await?;
        return Ok(());
    }

    stream.write_all(raw.as_bytes()).await?;

    match greeting {
        Greeting::Ping => unreachable!(),
        Greeting::Hello {
            file_size,
            working_dir,
            basename,
            cli_template,
            ..
        } => {
            run_pushed_file_job(
                stream,
                connection_id,
                file_size,
                &working_dir,
                &basename,
                &cli_template,
            )
            .await
        }
        Greeting::HelloShared {
            shared_in_path,
            shared_out_path,
            cli_template,
            keep_source,
            ..
        } => {
            run_shared_job(
                stream,
                connection_id,
                &shared_in_path,
                &shared_out_path,
                &cli_template,
                keep_source,
            )
            .await
        }
    }
}

async fn run_pushed_file_job(
    mut stream: TcpStream,
    connection_id: u64,
    file_size: u64,
    working_dir: &str,
    basename: &str,
    cli_template: &str,
) -> Result<()> {
    let in_path = PathBuf::from(working_dir).join(basename);
    tokio::fs::create_dir_all(working_dir).await.ok();
    protocol::pull_file(&mut stream, &in_path, file_size).await?;

    let out_path = in_path.with_extension(format!(
        "{}.tmp",
        in_path.extension().and_then(|e| e.to_str()).unwrap_or("")
    ));

    let argv = protocol::build_argv(cli_template, &in_path.to_string_lossy());
    let result = run_encoder_and_stream(&mut stream, &argv).await?;

    match result {
        EncoderResult::Success(code) => {
            let result_size = tokio::fs::metadata(&out_path).await.map(|m| m.len()).unwrap_or(0);
            stream
                .write_all(format!("DONE|{code}|{result_size}\n").as_bytes())
                .await?;
            let mut ack = [0u8; 4];
            stream.read_exact(&mut ack).await?;
            protocol::push_file(&mut stream, &out_path).await?;
            let _ = tokio::fs::remove_file(&in_path).await;
            let _ = tokio::fs::remove_file(&out_path).await;
        }
        EncoderResult::Failed(code) => {
            stream.write_all(format!("ERR|{code}\n").as_bytes()).await?;
            let _ = tokio::fs::remove_file(&out_path).await;
        }
        EncoderResult::Aborted => {
            debug!(connection_id, "client stopped the stream");
        }
    }
    Ok(())
}

async fn run_shared_job(
    mut stream: TcpStream,
    connection_id: u64,
    shared_in_path: &str,
    shared_out_path: &str,
    cli_template: &str,
    keep_source: bool,
) -> Result<()> {
    if !PathBuf::from(shared_in_path).exists() {
        stream
            .write_all(format!("NAK|input not readable: {shared_in_path}").as_bytes())
            .await?;
        return Ok(());
    }

    let argv = protocol::build_argv(cli_template, shared_in_path);
    let argv = substitute_output(argv, shared_out_path);
    let result = run_encoder_and_stream(&mut stream, &argv).await?;

    match result {
        EncoderResult::Success(code) => {
            let result_size = tokio::fs::metadata(shared_out_path)
                .await
                .map(|m| m.len())
                .unwrap_or(0);
            stream
                .write_all(format!("DONE|{code}|{result_size}\n").as_bytes())
                .await?;
            let mut ack = [0u8; 4];
            stream.read_exact(&mut ack).await?;
            if !keep_source {
                let _ = tokio::fs::remove_file(shared_in_path).await;
                let _ = tokio::fs::rename(shared_out_path, shared_in_path).await;
            }
        }
        EncoderResult::Failed(code) => {
            stream.write_all(format!("ERR|{code}\n").as_bytes()).await?;
        }
        EncoderResult::Aborted => {
            debug!(connection_id, "client stopped the stream");
        }
    }
    Ok(())
}

fn substitute_output(mut argv: Vec<String>, out_path: &str) -> Vec<String> {
    argv.push(out_path.to_string());
    argv
}

enum EncoderResult {
    Success(i32),
    Failed(i32),
    Aborted,
}

/// EXEC/STREAM: spawns the encoder, sends each output line to the client,
/// and blocks for its control token before continuing (spec.md §4.4.1).
async fn run_encoder_and_stream(stream: &mut TcpStream, argv: &[String]) -> Result<EncoderResult> {
    let encoder_name = if cfg!(target_os = "windows") {
        "ffmpeg.exe"
    } else {
        "ffmpeg"
    };
    let encoder_path = which(encoder_name).context("ffmpeg not found in PATH")?;

    let mut child = Command::new(encoder_path)
        .args(argv)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    let stdout = child.stdout.take().expect("piped stdout");
    let mut lines = BufReader::new(stdout).lines();

    while let Some(line) = lines.next_line().await? {
        stream.write_all(format!("{line}\n").as_bytes()).await?;

        let mut control = [0u8; 20];
        let n = stream.read(&mut control).await?;
        match ControlToken::parse(&control[..n.min(4)]) {
            Ok(ControlToken::Ack) | Ok(ControlToken::Ping) => {}
            Ok(ControlToken::Stop) | Ok(ControlToken::Veto) => {
                child.start_kill().ok();
                let _ = child.wait().await;
                return Ok(EncoderResult::Aborted);
            }
            Err(e) => {
                warn!(error = %e, "protocol violation from client");
                child.start_kill().ok();
                let _ = child.wait().await;
                return Ok(EncoderResult::Aborted);
            }
        }

        if protocol::is_terminal_line(&line) {
            break;
        }
    }

    let status = child.wait().await?;
    let code = status.code().unwrap_or(-1);
    if code == 0 {
        Ok(EncoderResult::Success(code))
    } else {
        Ok(EncoderResult::Failed(code))
    }
}
