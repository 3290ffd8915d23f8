//! Host descriptors: identity, reachability, and variant-specific settings

use crate::error::{ClusterError, ClusterResult};
use serde::{Deserialize, Serialize};

/// The four host runtime variants (spec.md §3 / §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HostVariant {
    Local,
    Mounted,
    Streaming,
    Agent,
}

/// OS family of a host, used for path quoting and delete syntax.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OsFamily {
    Macos,
    Linux,
    Windows,
}

impl OsFamily {
    /// OS family of the machine this process is running on.
    pub fn local() -> Self {
        cfg_if::cfg_if! {
            if #[cfg(target_os = "windows")] {
                OsFamily::Windows
            } else if #[cfg(target_os = "macos")] {
                OsFamily::Macos
            } else {
                OsFamily::Linux
            }
        }
    }

    pub fn is_windows(self) -> bool {
        matches!(self, OsFamily::Windows)
    }
}

/// One `(src-prefix, dst-prefix)` path substitution rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathSubstitution {
    pub src_prefix: String,
    pub dst_prefix: String,
}

impl PathSubstitution {
    pub fn new(src_prefix: impl Into<String>, dst_prefix: impl Into<String>) -> Self {
        Self {
            src_prefix: src_prefix.into(),
            dst_prefix: dst_prefix.into(),
        }
    }

    /// Parse the original config-file form: a single string `"<src> <dst>"`.
    pub fn parse(raw: &str) -> Option<Self> {
        let mut parts = raw.splitn(2, ' ');
        let src = parts.next()?;
        let dst = parts.next()?;
        Some(Self::new(src, dst))
    }
}

/// Identity, reachability, and capabilities of one cluster host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostDescriptor {
    pub name: String,
    pub variant: HostVariant,
    pub address: Option<String>,
    pub user: Option<String>,
    pub os: Option<OsFamily>,
    pub working_dir: Option<String>,
    pub encoder_path: String,
    #[serde(default)]
    pub path_substitutions: Vec<PathSubstitution>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub engines: Vec<String>,
}

fn default_enabled() -> bool {
    true
}

impl HostDescriptor {
    pub fn has_path_substitutions(&self) -> bool {
        !self.path_substitutions.is_empty()
    }

    /// Apply the first matching substitution rule to both paths. First rule
    /// whose `src_prefix` matches the input path wins (spec.md §4.2.2).
    pub fn substitute_paths(&self, in_path: &str, out_path: &str) -> (String, String) {
        for rule in &self.path_substitutions {
            if in_path.starts_with(&rule.src_prefix) {
                return (
                    in_path.replacen(&rule.src_prefix, &rule.dst_prefix, 1),
                    out_path.replacen(&rule.src_prefix, &rule.dst_prefix, 1),
                );
            }
        }
        (in_path.to_string(), out_path.to_string())
    }

    /// Quote/escape a path the way the target OS's shell expects it.
    pub fn quote_path(&self, path: &str) -> String {
        let os = match self.variant {
            HostVariant::Local => OsFamily::local(),
            _ => self.os.unwrap_or(OsFamily::Linux),
        };
        if os.is_windows() {
            if path.contains(' ') {
                format!("\"{}\"", path)
            } else {
                path.to_string()
            }
        } else if path.contains(' ') {
            format!("\"{}\"", path)
        } else {
            path.to_string()
        }
    }

    /// The OS-appropriate delete command for a remote path (used by the
    /// streaming variant to remove its remote `.tmp` file, spec.md §4.2.3).
    pub fn delete_command(&self, path: &str) -> String {
        let os = self.os.unwrap_or(OsFamily::Linux);
        if os.is_windows() {
            format!("del \"{}\"", path)
        } else {
            format!("rm {}", path)
        }
    }

    /// Validate required settings per spec.md §3's invariants. Returns all
    /// violations found rather than failing fast, matching the original
    /// implementation's "collect then report" validation style.
    pub fn validate(&self) -> ClusterResult<()> {
        let mut problems = Vec::new();

        match self.variant {
            HostVariant::Mounted | HostVariant::Streaming | HostVariant::Agent => {
                if self.address.is_none() {
                    problems.push("missing address".to_string());
                }
                if self.user.is_none() {
                    problems.push("missing user".to_string());
                }
                if self.variant != HostVariant::Agent && self.os.is_none() {
                    problems.push("missing os".to_string());
                }
            }
            HostVariant::Local => {}
        }

        if matches!(self.variant, HostVariant::Streaming) && self.working_dir.is_none() {
            problems.push("missing working_dir (required for streaming hosts)".to_string());
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(ClusterError::InvalidHostDescriptor {
                host: self.name.clone(),
                reason: problems.join("; "),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mounted_host() -> HostDescriptor {
        HostDescriptor {
            name: "edit01".into(),
            variant: HostVariant::Mounted,
            address: Some("10.0.0.5".into()),
            user: Some("render".into()),
            os: Some(OsFamily::Macos),
            working_dir: None,
            encoder_path: "/usr/local/bin/ffmpeg".into(),
            path_substitutions: vec![PathSubstitution::new("/Volumes/media/", "/mnt/media/")],
            enabled: true,
            engines: vec!["default".into()],
        }
    }

    #[test]
    fn mounted_host_requires_address_user_os() {
        let mut h = mounted_host();
        h.address = None;
        let err = h.validate().unwrap_err();
        assert!(matches!(err, ClusterError::InvalidHostDescriptor { .. }));
    }

    #[test]
    fn streaming_host_requires_working_dir() {
        let mut h = mounted_host();
        h.variant = HostVariant::Streaming;
        assert!(h.validate().is_err());
        h.working_dir = Some("/tmp/incoming".into());
        assert!(h.validate().is_ok());
    }

    #[test]
    fn local_host_has_no_reachability_requirements() {
        let h = HostDescriptor {
            name: "localhost".into(),
            variant: HostVariant::Local,
            address: None,
            user: None,
            os: None,
            working_dir: None,
            encoder_path: "/usr/bin/ffmpeg".into(),
            path_substitutions: vec![],
            enabled: true,
            engines: vec!["default".into()],
        };
        assert!(h.validate().is_ok());
    }

    #[test]
    fn substitute_paths_rewrites_matching_prefix() {
        let h = mounted_host();
        let (i, o) = h.substitute_paths("/Volumes/media/test.mkv", "/Volumes/media/test.mkv.tmp");
        assert_eq!(i, "/mnt/media/test.mkv");
        assert_eq!(o, "/mnt/media/test.mkv.tmp");
    }

    #[test]
    fn substitute_paths_is_noop_without_matching_rule() {
        let h = mounted_host();
        let (i, o) = h.substitute_paths("/other/test.mkv", "/other/test.mkv.tmp");
        assert_eq!(i, "/other/test.mkv");
        assert_eq!(o, "/other/test.mkv.tmp");
    }

    #[test]
    fn parse_path_substitution_from_config_string() {
        let sub = PathSubstitution::parse("/Volumes/media/ /mnt/media/").unwrap();
        assert_eq!(sub.src_prefix, "/Volumes/media/");
        assert_eq!(sub.dst_prefix, "/mnt/media/");
    }
}
