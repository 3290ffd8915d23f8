//! Immutable per-file probe results
//!
//! The probe itself (invoking the encoder's probe tool and parsing its
//! JSON/text output) is an external collaborator per spec.md §1 — this
//! module only defines the parsed shape and the trait a caller implements to
//! supply it.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ClusterResult;

/// One audio or subtitle stream within a media file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamInfo {
    pub index: String,
    /// ISO-ish language code, `"und"` if unknown.
    pub lang: String,
    pub format: String,
    pub is_default: bool,
}

/// Immutable per-file probe result (spec.md §3's `MediaInfo`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaInfo {
    pub path: PathBuf,
    pub video_index: String,
    pub video_codec: String,
    pub width: u32,
    pub height: u32,
    pub frame_rate: f64,
    pub color_space: String,
    pub runtime_secs: u64,
    /// Total frame count; may be 0 when the probe tool couldn't determine it.
    pub frames: u64,
    pub file_size_bytes: u64,
    pub audio: Vec<StreamInfo>,
    pub subtitle: Vec<StreamInfo>,
}

impl MediaInfo {
    pub fn is_multistream(&self) -> bool {
        self.audio.len() > 1 || self.subtitle.len() > 1
    }

    pub fn file_size_mb(&self) -> f64 {
        self.file_size_bytes as f64 / (1024.0 * 1024.0)
    }
}

/// External collaborator interface: turns a file path into a `MediaInfo`.
/// The core never invokes a probe tool itself; a caller (typically the CLI
/// binary) supplies an implementation backed by ffprobe or similar.
pub trait MediaProbe: Send + Sync {
    fn probe(&self, path: &Path) -> ClusterResult<MediaInfo>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> MediaInfo {
        MediaInfo {
            path: PathBuf::from("/tmp/a.mkv"),
            video_index: "0".into(),
            video_codec: "h264".into(),
            width: 1920,
            height: 1080,
            frame_rate: 23.976,
            color_space: "yuv420p".into(),
            runtime_secs: 3200,
            frames: 74426,
            file_size_bytes: 1_500_000_000,
            audio: vec![],
            subtitle: vec![],
        }
    }

    #[test]
    fn single_stream_is_not_multistream() {
        let mut mi = sample();
        mi.audio.push(StreamInfo {
            index: "1".into(),
            lang: "eng".into(),
            format: "aac".into(),
            is_default: true,
        });
        assert!(!mi.is_multistream());
    }

    #[test]
    fn multiple_audio_streams_is_multistream() {
        let mut mi = sample();
        mi.audio.push(StreamInfo {
            index: "1".into(),
            lang: "eng".into(),
            format: "aac".into(),
            is_default: true,
        });
        mi.audio.push(StreamInfo {
            index: "2".into(),
            lang: "jpn".into(),
            format: "aac".into(),
            is_default: false,
        });
        assert!(mi.is_multistream());
    }

    #[test]
    fn file_size_mb_converts_bytes() {
        let mi = sample();
        assert!((mi.file_size_mb() - 1430.51).abs() < 0.1);
    }
}
