//! Agent wire protocol (C4): TCP framing between controller and agent
//!
//! ASCII, `|`-delimited control frames, with two raw-byte phases (file push
//! and file pull) kept on a separate byte-count-bounded reader. Control
//! frames and raw bytes are never interleaved on the same read call
//! (spec.md §9's design note).

use std::path::Path;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::error::{ClusterError, ClusterResult};

pub const PROTOCOL_VERSION: &str = "1";
pub const GREETING_MAX_BYTES: usize = 2048;
pub const CONTROL_READ_BYTES: usize = 1024;
pub const UPLOAD_CHUNK_BYTES: usize = 4096;
pub const DOWNLOAD_CHUNK_BYTES: usize = 1_000_000;

/// Parsed greeting, the first frame on every connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Greeting {
    Ping,
    /// Pushed-file variant: client version, file size, remote working dir,
    /// basename, `$`-separated argv template.
    Hello {
        client_version: String,
        file_size: u64,
        working_dir: String,
        basename: String,
        cli_template: String,
    },
    /// Shared-filesystem variant: same as `Hello` but the agent reads/writes
    /// in place via path substitution, so no byte transfer is needed.
    HelloShared {
        client_version: String,
        shared_in_path: String,
        shared_out_path: String,
        cli_template: String,
        keep_source: bool,
    },
}

impl Greeting {
    /// Render this greeting back to its wire form (used both to send it and
    /// to compare against the server's echo).
    pub fn encode(&self) -> String {
        match self {
            Greeting::Ping => "PING".to_string(),
            Greeting::Hello {
                client_version,
                file_size,
                working_dir,
                basename,
                cli_template,
            } => format!(
                "HELLO|{client_version}|{file_size}|{working_dir}|{basename}|{cli_template}"
            ),
            Greeting::HelloShared {
                client_version,
                shared_in_path,
                shared_out_path,
                cli_template,
                keep_source,
            } => format!(
                "HELLOS|{client_version}|{shared_in_path}|{shared_out_path}|{cli_template}|{}",
                if *keep_source { 1 } else { 0 }
            ),
        }
    }

    /// Parse a raw greeting frame. The 5-field historical `HELLO` form
    /// (without `client-ver`) is rejected per spec.md §9's resolved open
    /// question.
    pub fn parse(raw: &str) -> ClusterResult<Self> {
        let fields: Vec<&str> = raw.split('|').collect();
        match fields.as_slice() {
            ["PING"] => Ok(Greeting::Ping),
            ["HELLO", ver, size, dir, name, cli] => Ok(Greeting::Hello {
                client_version: ver.to_string(),
                file_size: size
                    .parse()
                    .map_err(|_| ClusterError::ProtocolViolation(format!("bad filesize: {size}")))?,
                working_dir: dir.to_string(),
                basename: name.to_string(),
                cli_template: cli.to_string(),
            }),
            ["HELLO", _, _, _, _] => Err(ClusterError::ProtocolViolation(
                "outdated client".to_string(),
            )),
            ["HELLOS", ver, in_path, out_path, cli, keep] => Ok(Greeting::HelloShared {
                client_version: ver.to_string(),
                shared_in_path: in_path.to_string(),
                shared_out_path: out_path.to_string(),
                cli_template: cli.to_string(),
                keep_source: *keep == "1",
            }),
            _ => Err(ClusterError::ProtocolViolation(format!(
                "unrecognized greeting: {raw}"
            ))),
        }
    }
}

/// Control tokens exchanged during the STREAM phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlToken {
    Ack,
    Ping,
    Stop,
    Veto,
}

impl ControlToken {
    pub fn as_bytes(self) -> &'static [u8] {
        match self {
            ControlToken::Ack => b"ACK!",
            ControlToken::Ping => b"PING",
            ControlToken::Stop => b"STOP",
            ControlToken::Veto => b"VETO",
        }
    }

    pub fn parse(raw: &[u8]) -> ClusterResult<Self> {
        match raw {
            b"ACK!" => Ok(ControlToken::Ack),
            b"PING" => Ok(ControlToken::Ping),
            b"STOP" => Ok(ControlToken::Stop),
            b"VETO" => Ok(ControlToken::Veto),
            other => Err(ClusterError::ProtocolViolation(format!(
                "unexpected control token: {:?}",
                String::from_utf8_lossy(other)
            ))),
        }
    }
}

/// Substitutes the literal `{FILENAME}` placeholder, then splits on `$` into
/// argv (spec.md §4.4.1).
pub fn build_argv(cli_template: &str, on_disk_path: &str) -> Vec<String> {
    cli_template
        .replace("{FILENAME}", on_disk_path)
        .split('$')
        .map(|s| s.to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// True once an encoder output line carries the completion sentinel. Fragile
/// by design — preserved exactly to match agent behavior (spec.md §9).
pub fn is_terminal_line(line: &str) -> bool {
    line.contains("video:")
}

/// Sends a greeting frame and reads back the server's echo (or a `NAK|...`).
pub async fn send_greeting(stream: &mut TcpStream, greeting: &Greeting) -> ClusterResult<String> {
    let wire = greeting.encode();
    stream
        .write_all(wire.as_bytes())
        .await
        .map_err(ClusterError::Io)?;

    let mut buf = vec![0u8; GREETING_MAX_BYTES];
    let n = stream.read(&mut buf).await.map_err(ClusterError::Io)?;
    Ok(String::from_utf8_lossy(&buf[..n]).to_string())
}

/// Pushes `path`'s bytes to the peer in `UPLOAD_CHUNK_BYTES`-sized chunks. A
/// short read from disk ends the transfer (spec.md §4.4.1's client
/// obligations).
pub async fn push_file(stream: &mut TcpStream, path: &Path) -> ClusterResult<u64> {
    let mut file = tokio::fs::File::open(path).await.map_err(ClusterError::Io)?;
    let mut buf = vec![0u8; UPLOAD_CHUNK_BYTES];
    let mut sent: u64 = 0;
    loop {
        let n = tokio::io::AsyncReadExt::read(&mut file, &mut buf)
            .await
            .map_err(ClusterError::Io)?;
        if n == 0 {
            break;
        }
        stream.write_all(&buf[..n]).await.map_err(ClusterError::Io)?;
        sent += n as u64;
    }
    Ok(sent)
}

/// Reads exactly `size` bytes from the peer into `dest`, in
/// `DOWNLOAD_CHUNK_BYTES`-sized reads.
pub async fn pull_file(stream: &mut TcpStream, dest: &Path, size: u64) -> ClusterResult<()> {
    let mut file = tokio::fs::File::create(dest).await.map_err(ClusterError::Io)?;
    let mut remaining = size;
    let mut buf = vec![0u8; DOWNLOAD_CHUNK_BYTES];
    while remaining > 0 {
        let want = remaining.min(DOWNLOAD_CHUNK_BYTES as u64) as usize;
        stream
            .read_exact(&mut buf[..want])
            .await
            .map_err(ClusterError::Io)?;
        tokio::io::AsyncWriteExt::write_all(&mut file, &buf[..want])
            .await
            .map_err(ClusterError::Io)?;
        remaining -= want as u64;
    }
    Ok(())
}

/// Parses a `DONE|<exit-code>|<result-filesize>` terminal frame.
pub fn parse_done(line: &str) -> ClusterResult<(i32, u64)> {
    let fields: Vec<&str> = line.split('|').collect();
    match fields.as_slice() {
        ["DONE", code, size] => {
            let code: i32 = code
                .parse()
                .map_err(|_| ClusterError::ProtocolViolation(format!("bad exit code: {code}")))?;
            let size: u64 = size
                .parse()
                .map_err(|_| ClusterError::ProtocolViolation(format!("bad filesize: {size}")))?;
            Ok((code, size))
        }
        _ => Err(ClusterError::ProtocolViolation(format!(
            "not a DONE frame: {line}"
        ))),
    }
}

/// Parses an `ERR|<exit-code>` terminal frame.
pub fn parse_err(line: &str) -> ClusterResult<i32> {
    let fields: Vec<&str> = line.split('|').collect();
    match fields.as_slice() {
        ["ERR", code] => code
            .parse()
            .map_err(|_| ClusterError::ProtocolViolation(format!("bad exit code: {code}"))),
        _ => Err(ClusterError::ProtocolViolation(format!(
            "not an ERR frame: {line}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_six_field_hello() {
        let greeting = Greeting::parse("HELLO|1|1572864000|/tmp|test.mkv|-i$$out.mkv").unwrap();
        assert_eq!(
            greeting,
            Greeting::Hello {
                client_version: "1".into(),
                file_size: 1572864000,
                working_dir: "/tmp".into(),
                basename: "test.mkv".into(),
                cli_template: "-i$$out.mkv".into(),
            }
        );
    }

    #[test]
    fn rejects_five_field_hello_as_outdated() {
        let err = Greeting::parse("HELLO|1572864000|/tmp|test.mkv|-i").unwrap_err();
        assert!(matches!(err, ClusterError::ProtocolViolation(_)));
    }

    #[test]
    fn parses_hellos_shared_variant() {
        let greeting =
            Greeting::parse("HELLOS|1|/mnt/in.mkv|/mnt/out.mkv|-i${FILENAME}|0").unwrap();
        assert_eq!(
            greeting,
            Greeting::HelloShared {
                client_version: "1".into(),
                shared_in_path: "/mnt/in.mkv".into(),
                shared_out_path: "/mnt/out.mkv".into(),
                cli_template: "-i${FILENAME}".into(),
                keep_source: false,
            }
        );
    }

    #[test]
    fn encode_round_trips_hello() {
        let greeting = Greeting::Hello {
            client_version: "1".into(),
            file_size: 42,
            working_dir: "/tmp".into(),
            basename: "a.mkv".into(),
            cli_template: "-i$a.mkv".into(),
        };
        assert_eq!(Greeting::parse(&greeting.encode()).unwrap(), greeting);
    }

    #[test]
    fn builds_argv_substituting_filename_and_splitting_on_dollar() {
        let argv = build_argv("-i${FILENAME}$-c:v$libx264", "/tmp/in.mkv");
        assert_eq!(argv, vec!["-i/tmp/in.mkv", "-c:v", "libx264"]);
    }

    #[test]
    fn terminal_sentinel_detects_video_colon() {
        assert!(is_terminal_line("video:1234kB audio:56kB subtitle:0kB"));
        assert!(!is_terminal_line("frame=100 fps=24"));
    }

    #[test]
    fn parses_done_and_err_frames() {
        assert_eq!(parse_done("DONE|0|1300000000").unwrap(), (0, 1300000000));
        assert_eq!(parse_err("ERR|1").unwrap(), 1);
        assert!(parse_done("ERR|1").is_err());
    }

    #[test]
    fn control_token_round_trip() {
        assert_eq!(ControlToken::parse(b"ACK!").unwrap(), ControlToken::Ack);
        assert_eq!(ControlToken::parse(b"VETO").unwrap(), ControlToken::Veto);
        assert!(ControlToken::parse(b"JUNK").is_err());
    }
}
