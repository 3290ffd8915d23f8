//! Engines: named collections of quality presets

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A named capability on a host (e.g. a hardware-acceleration path) exposing
/// one or more quality presets, each a string of encoder command-line
/// fragments (spec.md §3's `Engine`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Engine {
    pub name: String,
    pub quality: HashMap<String, String>,
}

impl Engine {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            quality: HashMap::new(),
        }
    }

    pub fn qualities(&self) -> &HashMap<String, String> {
        &self.quality
    }

    pub fn cli_fragment(&self, quality: &str) -> Option<&str> {
        self.quality.get(quality).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn looks_up_cli_fragment_by_quality() {
        let mut engine = Engine::new("default");
        engine
            .quality
            .insert("medium".to_string(), "-c:v libx264 -crf 23".to_string());

        assert_eq!(
            engine.cli_fragment("medium"),
            Some("-c:v libx264 -crf 23")
        );
        assert_eq!(engine.cli_fragment("missing"), None);
    }
}
