//! The unit of work handed to a host worker

use std::path::PathBuf;

use crate::media::MediaInfo;
use crate::template::Template;

/// `(source path, probe result, recipe)` triple (spec.md §3's `EncodeJob`).
#[derive(Debug, Clone)]
pub struct EncodeJob {
    pub in_path: PathBuf,
    pub media_info: MediaInfo,
    pub template: Template,
}

impl EncodeJob {
    pub fn new(in_path: PathBuf, media_info: MediaInfo, template: Template) -> Self {
        Self {
            in_path,
            media_info,
            template,
        }
    }

    /// True iff the job should be vetoed mid-flight at these stats, per
    /// spec.md §4.6's mid-flight veto policy.
    pub fn should_abort(&self, pct_done: i32, pct_comp: i32) -> bool {
        self.template.threshold_check < 100
            && pct_done >= self.template.threshold_check
            && pct_comp < self.template.threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::{MediaInfo, StreamInfo};
    use std::path::PathBuf as Pb;

    fn media() -> MediaInfo {
        MediaInfo {
            path: Pb::from("/tmp/a.mkv"),
            video_index: "0".into(),
            video_codec: "h264".into(),
            width: 1920,
            height: 1080,
            frame_rate: 23.976,
            color_space: "yuv420p".into(),
            runtime_secs: 3200,
            frames: 74426,
            file_size_bytes: 1_500_000_000,
            audio: vec![StreamInfo {
                index: "1".into(),
                lang: "eng".into(),
                format: "aac".into(),
                is_default: true,
            }],
            subtitle: vec![],
        }
    }

    fn job(threshold: i32, threshold_check: i32) -> EncodeJob {
        EncodeJob::new(
            Pb::from("/tmp/a.mkv"),
            media(),
            Template {
                name: "tv".into(),
                input_options: vec![],
                audio_options: vec![],
                subtitle_options: vec![],
                extension: ".mkv".into(),
                quality: "medium".into(),
                audio_lang: vec![],
                subtitle_lang: vec![],
                threshold,
                threshold_check,
            },
        )
    }

    #[test]
    fn threshold_check_of_100_disables_veto() {
        let j = job(50, 100);
        assert!(!j.should_abort(100, 0));
    }

    #[test]
    fn vetoes_when_past_check_point_and_under_threshold() {
        let j = job(20, 50);
        assert!(j.should_abort(55, 10));
    }

    #[test]
    fn no_veto_before_check_point() {
        let j = job(20, 50);
        assert!(!j.should_abort(40, 10));
    }

    #[test]
    fn should_abort_is_monotonic_in_pct_done() {
        let j = job(20, 50);
        assert!(j.should_abort(55, 10));
        assert!(j.should_abort(90, 10));
    }
}
