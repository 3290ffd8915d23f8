//! ffprobe-backed `MediaProbe` implementation

use std::path::{Path, PathBuf};
use std::process::Stdio;

use cluster_core::{ClusterError, ClusterResult, MediaInfo, MediaProbe, StreamInfo};
use serde::Deserialize;
use tokio::process::Command;
use tracing::debug;
use which::which;

/// Invokes `ffprobe -of json` and maps its stream list onto `MediaInfo`.
pub struct FfprobeMediaProbe {
    ffprobe_path: PathBuf,
}

impl FfprobeMediaProbe {
    pub fn new() -> ClusterResult<Self> {
        let name = if cfg!(target_os = "windows") {
            "ffprobe.exe"
        } else {
            "ffprobe"
        };
        let ffprobe_path = which(name).map_err(|_| {
            ClusterError::ProbeFailed(format!("ffprobe not found in PATH: {name}"))
        })?;
        Ok(Self { ffprobe_path })
    }

    fn probe_blocking(&self, path: &Path) -> ClusterResult<MediaInfo> {
        let handle = tokio::runtime::Handle::try_current();
        match handle {
            Ok(h) => tokio::task::block_in_place(|| h.block_on(self.probe_async(path))),
            Err(_) => {
                let rt = tokio::runtime::Runtime::new().map_err(ClusterError::Io)?;
                rt.block_on(self.probe_async(path))
            }
        }
    }

    async fn probe_async(&self, path: &Path) -> ClusterResult<MediaInfo> {
        let output = Command::new(&self.ffprobe_path)
            .args([
                "-v",
                "error",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
            ])
            .arg(path)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| ClusterError::ProbeFailed(format!("failed to run ffprobe: {e}")))?;

        if !output.status.success() {
            return Err(ClusterError::ProbeFailed(format!(
                "ffprobe exited with {:?}",
                output.status.code()
            )));
        }

        let parsed: FfprobeOutput = serde_json::from_slice(&output.stdout)?;
        debug!(streams = parsed.streams.len(), "probed {}", path.display());
        parsed.into_media_info(path)
    }
}

impl MediaProbe for FfprobeMediaProbe {
    fn probe(&self, path: &Path) -> ClusterResult<MediaInfo> {
        self.probe_blocking(path)
    }
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: FfprobeFormat,
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    #[serde(default)]
    duration: Option<String>,
    #[serde(default)]
    size: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    index: u32,
    codec_type: String,
    #[serde(default)]
    codec_name: Option<String>,
    #[serde(default)]
    width: Option<u32>,
    #[serde(default)]
    height: Option<u32>,
    #[serde(default)]
    avg_frame_rate: Option<String>,
    #[serde(default)]
    pix_fmt: Option<String>,
    #[serde(default)]
    nb_frames: Option<String>,
    #[serde(default)]
    tags: Option<std::collections::HashMap<String, String>>,
    #[serde(default)]
    disposition: Option<std::collections::HashMap<String, u32>>,
}

impl FfprobeOutput {
    fn into_media_info(self, path: &Path) -> ClusterResult<MediaInfo> {
        let video = self
            .streams
            .iter()
            .find(|s| s.codec_type == "video")
            .ok_or_else(|| ClusterError::ProbeFailed("no video stream found".to_string()))?;

        let frame_rate = video
            .avg_frame_rate
            .as_deref()
            .and_then(parse_fraction)
            .unwrap_or(0.0);

        let frames = video
            .nb_frames
            .as_deref()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(0);

        let runtime_secs = self
            .format
            .duration
            .as_deref()
            .and_then(|s| s.parse::<f64>().ok())
            .unwrap_or(0.0) as u64;

        let file_size_bytes = self
            .format
            .size
            .as_deref()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or_else(|| std::fs::metadata(path).map(|m| m.len()).unwrap_or(0));

        let audio = self
            .streams
            .iter()
            .filter(|s| s.codec_type == "audio")
            .map(to_stream_info)
            .collect();

        let subtitle = self
            .streams
            .iter()
            .filter(|s| s.codec_type == "subtitle")
            .map(to_stream_info)
            .collect();

        Ok(MediaInfo {
            path: path.to_path_buf(),
            video_index: video.index.to_string(),
            video_codec: video.codec_name.clone().unwrap_or_default(),
            width: video.width.unwrap_or(0),
            height: video.height.unwrap_or(0),
            frame_rate,
            color_space: video.pix_fmt.clone().unwrap_or_default(),
            runtime_secs,
            frames,
            file_size_bytes,
            audio,
            subtitle,
        })
    }
}

fn to_stream_info(s: &FfprobeStream) -> StreamInfo {
    let lang = s
        .tags
        .as_ref()
        .and_then(|t| t.get("language"))
        .cloned()
        .unwrap_or_else(|| "und".to_string());
    let is_default = s
        .disposition
        .as_ref()
        .and_then(|d| d.get("default"))
        .map(|v| *v == 1)
        .unwrap_or(false);

    StreamInfo {
        index: s.index.to_string(),
        lang,
        format: s.codec_name.clone().unwrap_or_default(),
        is_default,
    }
}

fn parse_fraction(raw: &str) -> Option<f64> {
    let mut parts = raw.splitn(2, '/');
    let num: f64 = parts.next()?.parse().ok()?;
    let den: f64 = parts.next()?.parse().ok()?;
    if den == 0.0 {
        None
    } else {
        Some(num / den)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_frame_rate_fraction() {
        assert_eq!(parse_fraction("24000/1001"), Some(24000.0 / 1001.0));
        assert_eq!(parse_fraction("0/0"), None);
    }

    #[test]
    fn stream_with_no_language_tag_defaults_to_und() {
        let stream = FfprobeStream {
            index: 1,
            codec_type: "audio".to_string(),
            codec_name: Some("aac".to_string()),
            width: None,
            height: None,
            avg_frame_rate: None,
            pix_fmt: None,
            nb_frames: None,
            tags: None,
            disposition: None,
        };
        let info = to_stream_info(&stream);
        assert_eq!(info.lang, "und");
        assert!(!info.is_default);
    }
}
