//! YAML configuration loading (external to `cluster-core` per spec)

use std::path::Path;

use anyhow::{Context, Result};
use cluster_core::ClusterConfig;

/// Reads and parses the cluster config file. The core only ever sees the
/// resulting `ClusterConfig`.
pub fn load(path: &Path) -> Result<ClusterConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading config file {}", path.display()))?;
    let config: ClusterConfig = serde_yaml::from_str(&raw)
        .with_context(|| format!("parsing config file {}", path.display()))?;
    config.validate().context("validating cluster config")?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_a_minimal_config() {
        let yaml = r#"
config:
  encoder_path: /usr/bin/ffmpeg
cluster:
  ws:
    name: ws
    variant: local
    encoder_path: /usr/bin/ffmpeg
engines:
  default:
    name: default
    quality:
      medium: "-c:v libx264 -crf 23"
templates:
  tv:
    name: tv
    extension: ".mkv"
    quality: medium
"#;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(yaml.as_bytes()).unwrap();

        let config = load(file.path()).unwrap();
        assert_eq!(config.cluster.len(), 1);
        assert!(config.template("tv").is_ok());
    }

    #[test]
    fn rejects_a_config_with_invalid_host() {
        let yaml = r#"
config:
  encoder_path: /usr/bin/ffmpeg
cluster:
  edit01:
    name: edit01
    variant: mounted
    encoder_path: /usr/bin/ffmpeg
engines: {}
templates: {}
"#;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(yaml.as_bytes()).unwrap();
        assert!(load(file.path()).is_err());
    }
}
