//! Parsed configuration shape (C8's sibling): the core's input, not its parser
//!
//! YAML loading itself is an external collaborator (spec.md §1); this module
//! only defines the shape handed to `Cluster::new` and its own validation.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::engine::Engine;
use crate::error::{ClusterError, ClusterResult};
use crate::host::HostDescriptor;
use crate::template::Template;

/// `config:` section: process-wide encoder/shell settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalSettings {
    pub encoder_path: String,
    #[serde(default)]
    pub remote_shell: Option<String>,
    #[serde(default)]
    pub rich: bool,
}

/// The fully parsed config file (spec.md §6's YAML shape).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    pub config: GlobalSettings,
    pub cluster: HashMap<String, HostDescriptor>,
    pub engines: HashMap<String, Engine>,
    pub templates: HashMap<String, Template>,
}

impl ClusterConfig {
    /// Validates every enabled host descriptor, collecting all violations
    /// rather than failing on the first (spec.md §7: validation errors are
    /// fatal to the process, so the operator should see every problem at
    /// once).
    pub fn validate(&self) -> ClusterResult<()> {
        let mut problems = Vec::new();
        for host in self.cluster.values().filter(|h| h.enabled) {
            if let Err(e) = host.validate() {
                problems.push(e.to_string());
            }
        }
        if problems.is_empty() {
            Ok(())
        } else {
            Err(ClusterError::InvalidConfig(problems.join("; ")))
        }
    }

    pub fn template(&self, name: &str) -> ClusterResult<&Template> {
        self.templates
            .get(name)
            .ok_or_else(|| ClusterError::TemplateNotFound(name.to_string()))
    }

    pub fn enabled_hosts(&self) -> impl Iterator<Item = &HostDescriptor> {
        self.cluster.values().filter(|h| h.enabled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{HostVariant, OsFamily};

    fn sample_config() -> ClusterConfig {
        let mut cluster = HashMap::new();
        cluster.insert(
            "ws".to_string(),
            HostDescriptor {
                name: "ws".into(),
                variant: HostVariant::Local,
                address: None,
                user: None,
                os: Some(OsFamily::Linux),
                working_dir: None,
                encoder_path: "/usr/bin/ffmpeg".into(),
                path_substitutions: vec![],
                enabled: true,
                engines: vec!["default".into()],
            },
        );
        let mut engines = HashMap::new();
        engines.insert("default".to_string(), Engine::new("default"));
        let mut templates = HashMap::new();
        templates.insert(
            "tv".to_string(),
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
        );
        ClusterConfig {
            config: GlobalSettings {
                encoder_path: "/usr/bin/ffmpeg".into(),
                remote_shell: None,
                rich: true,
            },
            cluster,
            engines,
            templates,
        }
    }

    #[test]
    fn validates_a_well_formed_config() {
        assert!(sample_config().validate().is_ok());
    }

    #[test]
    fn template_lookup_errors_on_unknown_name() {
        let cfg = sample_config();
        assert!(matches!(
            cfg.template("missing"),
            Err(ClusterError::TemplateNotFound(_))
        ));
    }

    #[test]
    fn disabled_hosts_are_excluded_from_validation_and_scheduling() {
        let mut cfg = sample_config();
        cfg.cluster.get_mut("ws").unwrap().enabled = false;
        cfg.cluster.get_mut("ws").unwrap().os = None; // would fail validation if checked
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.enabled_hosts().count(), 0);
    }
}
