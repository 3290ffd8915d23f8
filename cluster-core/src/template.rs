//! Job recipes: quality selection, language filters, and stream mapping

use crate::media::StreamInfo;
use serde::{Deserialize, Serialize};

/// User-facing recipe combining a quality, language filters, extension, and
/// threshold policy (spec.md §3's `Template`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Template {
    pub name: String,
    #[serde(default)]
    pub input_options: Vec<String>,
    #[serde(default)]
    pub audio_options: Vec<String>,
    #[serde(default)]
    pub subtitle_options: Vec<String>,
    pub extension: String,
    pub quality: String,
    #[serde(default)]
    pub audio_lang: Vec<String>,
    #[serde(default)]
    pub subtitle_lang: Vec<String>,
    #[serde(default)]
    pub threshold: i32,
    #[serde(default = "default_threshold_check")]
    pub threshold_check: i32,
}

fn default_threshold_check() -> i32 {
    100
}

const UNKNOWN_LANGS: [&str; 2] = ["und", "???"];

impl Template {
    pub fn input_options_list(&self) -> &[String] {
        &self.input_options
    }

    pub fn output_options_list(&self) -> Vec<String> {
        let mut opts = self.audio_options.clone();
        opts.extend(self.subtitle_options.clone());
        opts
    }

    /// Build the `-map` argument list per spec.md §4.5.
    ///
    /// Returns `None` when the caller should skip this file entirely (the
    /// audio language filter excluded every stream).
    pub fn stream_map(
        &self,
        video_index: &str,
        audio: &[StreamInfo],
        subtitle: &[StreamInfo],
    ) -> Option<Vec<String>> {
        if self.audio_lang.is_empty() && self.subtitle_lang.is_empty() {
            return Some(vec!["-map".to_string(), "0".to_string()]);
        }

        let mut args = vec!["-map".to_string(), format!("0:{}", video_index)];

        let audio_mapped = map_one_kind("a", audio, &self.audio_lang);
        if audio_mapped.mapped_args.is_empty() {
            return None;
        }
        args.extend(audio_mapped.mapped_args);

        let subtitle_mapped = map_one_kind("s", subtitle, &self.subtitle_lang);
        args.extend(subtitle_mapped.mapped_args);

        Some(args)
    }
}

struct MappedStreams {
    mapped_args: Vec<String>,
}

fn map_one_kind(kind: &str, streams: &[StreamInfo], lang_filter: &[String]) -> MappedStreams {
    let mut mapped_args = Vec::new();
    let mut mapped_positions: Vec<&StreamInfo> = Vec::new();
    let mut default_excluded = false;

    for s in streams {
        let is_unknown = UNKNOWN_LANGS.contains(&s.lang.as_str());
        let included = is_unknown || lang_filter.iter().any(|l| l == &s.lang);
        if !included {
            if s.is_default {
                default_excluded = true;
            }
            continue;
        }
        mapped_args.push("-map".to_string());
        mapped_args.push(format!("0:{}", s.index));
        mapped_positions.push(s);
    }

    if default_excluded {
        if let Some(first_lang) = lang_filter.first() {
            if let Some(pos) = mapped_positions.iter().position(|s| &s.lang == first_lang) {
                mapped_args.push(format!("-disposition:{}:{}", kind, pos));
                mapped_args.push("default".to_string());
            }
        }
    }

    MappedStreams { mapped_args }
}
