//! Compression-savings policy (spec.md §4.6)

use crate::job::EncodeJob;

/// Evaluates a job's mid-flight and post-encode savings policy.
///
/// Stateless: both checks are pure functions of the job's template and the
/// observed sizes, kept as a named type so callers (the host workers) read
/// clearly at the call site.
pub struct ThresholdEvaluator;

impl ThresholdEvaluator {
    /// Mid-flight veto check, called on every progress sample.
    pub fn should_veto(job: &EncodeJob, pct_done: i32, pct_comp: i32) -> bool {
        job.should_abort(pct_done, pct_comp)
    }

    /// Post-encode savings percentage: `100 - floor(new_size * 100 / orig_size)`.
    pub fn savings_percent(orig_size_bytes: u64, new_size_bytes: u64) -> i32 {
        if orig_size_bytes == 0 {
            return 0;
        }
        let pct_dest = ((new_size_bytes as f64 * 100.0) / orig_size_bytes as f64).floor() as i32;
        100 - pct_dest
    }

    /// True if the encoded output should be discarded: its savings fell
    /// short of `template.threshold`. A threshold of 0 disables this check.
    pub fn is_exceeded_threshold(job: &EncodeJob, orig_size_bytes: u64, new_size_bytes: u64) -> bool {
        if job.template.threshold == 0 {
            return false;
        }
        Self::savings_percent(orig_size_bytes, new_size_bytes) < job.template.threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::MediaInfo;
    use crate::template::Template;
    use std::path::PathBuf;

    fn job(threshold: i32, threshold_check: i32) -> EncodeJob {
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
                threshold,
                threshold_check,
            },
        )
    }

    #[test]
    fn threshold_zero_disables_post_filter() {
        let j = job(0, 100);
        assert!(!ThresholdEvaluator::is_exceeded_threshold(&j, 1_500_000_000, 1_490_000_000));
    }

    #[test]
    fn post_filter_rejects_insufficient_savings() {
        let j = job(40, 100);
        // 1500 -> 900 is 40% savings exactly, not < 40, so it passes.
        assert!(!ThresholdEvaluator::is_exceeded_threshold(&j, 1500, 900));
        // 1500 -> 1000 is 33% savings, below 40.
        assert!(ThresholdEvaluator::is_exceeded_threshold(&j, 1500, 1000));
    }

    #[test]
    fn savings_percent_matches_spec_formula() {
        assert_eq!(ThresholdEvaluator::savings_percent(1500, 900), 40);
    }

    #[test]
    fn mid_flight_veto_delegates_to_job() {
        let j = job(20, 50);
        assert!(ThresholdEvaluator::should_veto(&j, 55, 10));
        assert!(!ThresholdEvaluator::should_veto(&j, 40, 10));
    }
}
