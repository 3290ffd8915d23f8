//! Encoder status-line parsing and progress extrapolation

use once_cell::sync::Lazy;
use regex::Regex;

use crate::job::EncodeJob;

/// One parsed encoder status line (spec.md §4.4.2).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EncoderStats {
    pub frame: Option<u64>,
    pub fps: Option<f64>,
    pub q: Option<f64>,
    /// Size in bytes, converted from the `kB`/`KiB` unit in the source line.
    pub size_bytes: Option<u64>,
    /// Elapsed encode time in seconds; `None` when the line reports `N/A`.
    pub time_secs: Option<u64>,
    pub speed: Option<String>,
}

static STATUS_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"frame=\s*(?P<frame>\d+)\s+fps=\s*(?P<fps>[\d.]+)\s+q=\s*(?P<q>-?[\d.]+)\s+size=\s*(?P<size>\d+)(?P<unit>kB|KiB)\s+time=\s*(?P<time>N/A|\d{2}:\d{2}:\d{2}\.\d+)\s+bitrate=.*?speed=\s*(?P<speed>N/A|[\d.]+x)",
    )
    .expect("static regex is valid")
});

/// Parse one encoder status line. Lines that don't match the grammar are
/// log-only and yield `None`.
pub fn parse_status_line(line: &str) -> Option<EncoderStats> {
    let caps = STATUS_LINE.captures(line)?;

    let frame = caps.name("frame").and_then(|m| m.as_str().parse().ok());
    let fps = caps.name("fps").and_then(|m| m.as_str().parse().ok());
    let q = caps.name("q").and_then(|m| m.as_str().parse().ok());
    let size_bytes = caps.name("size").and_then(|m| m.as_str().parse::<u64>().ok()).map(|kb| kb * 1024);
    let time_secs = caps.name("time").and_then(|m| parse_timecode(m.as_str()));
    let speed = caps.name("speed").map(|m| m.as_str().to_string());

    Some(EncoderStats {
        frame,
        fps,
        q,
        size_bytes,
        time_secs,
        speed,
    })
}

fn parse_timecode(raw: &str) -> Option<u64> {
    if raw == "N/A" {
        return None;
    }
    let mut parts = raw.splitn(3, ':');
    let h: u64 = parts.next()?.parse().ok()?;
    let m: u64 = parts.next()?.parse().ok()?;
    let s: f64 = parts.next()?.parse().ok()?;
    Some(h * 3600 + m * 60 + s as u64)
}

/// `(pct_done, pct_comp)` per spec.md §4.6's extrapolation formula.
pub fn calculate_progress(job: &EncodeJob, stats: &EncoderStats) -> (i32, i32) {
    let media = &job.media_info;

    let pct_done = if media.frames > 0 {
        stats
            .frame
            .map(|f| ((f as f64 / media.frames as f64) * 100.0).floor() as i32)
            .unwrap_or(0)
    } else if media.runtime_secs > 0 {
        stats
            .time_secs
            .map(|t| ((t as f64 / media.runtime_secs as f64) * 100.0).floor() as i32)
            .unwrap_or(0)
    } else {
        0
    };

    let projected_source_bytes = (media.file_size_bytes as f64) * (pct_done as f64) / 100.0;
    if projected_source_bytes <= 0.0 {
        return (0, 0);
    }

    let current_size = stats.size_bytes.unwrap_or(0) as f64;
    let pct_dest = ((current_size / projected_source_bytes) * 100.0).floor() as i32;
    let pct_comp = 100 - pct_dest;

    (pct_done, pct_comp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::MediaInfo;
    use std::path::PathBuf;

    #[test]
    fn parses_a_well_formed_status_line() {
        let line = "frame=  120 fps= 24 q=28.0 size=    2048kB time=00:00:05.00 bitrate=3355.4kbits/s speed=1.2x";
        let stats = parse_status_line(line).unwrap();
        assert_eq!(stats.frame, Some(120));
        assert_eq!(stats.size_bytes, Some(2048 * 1024));
        assert_eq!(stats.time_secs, Some(5));
        assert_eq!(stats.speed.as_deref(), Some("1.2x"));
    }

    #[test]
    fn time_na_is_preserved_as_none() {
        let line = "frame=  10 fps= 5 q=0.0 size= 10kB time=N/A bitrate=N/A speed=N/A";
        let stats = parse_status_line(line).unwrap();
        assert_eq!(stats.time_secs, None);
        assert_eq!(stats.speed.as_deref(), Some("N/A"));
    }

    #[test]
    fn non_matching_line_is_log_only() {
        assert!(parse_status_line("Stream mapping:").is_none());
    }

    fn job_with_frames(frames: u64, file_size_bytes: u64) -> EncodeJob {
        use crate::template::Template;
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
                frames,
                file_size_bytes,
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
    fn calculate_progress_uses_frame_ratio_when_frames_known() {
        let job = job_with_frames(1000, 1_000_000);
        let stats = EncoderStats {
            frame: Some(500),
            size_bytes: Some(400_000),
            ..Default::default()
        };
        let (pct_done, pct_comp) = calculate_progress(&job, &stats);
        assert_eq!(pct_done, 50);
        assert_eq!(pct_comp, 20);
    }

    #[test]
    fn zero_projected_bytes_yields_zero_zero() {
        let job = job_with_frames(1000, 1_000_000);
        let stats = EncoderStats {
            frame: Some(0),
            size_bytes: Some(0),
            ..Default::default()
        };
        assert_eq!(calculate_progress(&job, &stats), (0, 0));
    }

    #[test]
    fn falls_back_to_time_ratio_when_frames_unknown() {
        let job = job_with_frames(0, 1_000_000);
        let stats = EncoderStats {
            time_secs: Some(25),
            size_bytes: Some(125_000),
            ..Default::default()
        };
        let (pct_done, pct_comp) = calculate_progress(&job, &stats);
        assert_eq!(pct_done, 25);
        assert_eq!(pct_comp, 60);
    }
}
