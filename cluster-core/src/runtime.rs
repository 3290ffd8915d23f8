//! Immutable process-wide options threaded through the scheduler and workers
//!
//! Replaces the original implementation's module-level mutable globals
//! (`verbose`, `keep_source`, `dry_run`, `show_info`, a shared ssh path) with
//! a single struct constructed once from the CLI and passed by reference.

use std::path::PathBuf;

/// Default TCP port the agent wire protocol listens on.
pub const AGENT_PORT: u16 = 9567;

#[derive(Debug, Clone)]
pub struct RuntimeOptions {
    pub verbose: bool,
    pub keep_source: bool,
    pub dry_run: bool,
    pub show_info: bool,
    pub remote_shell: PathBuf,
    pub agent_port: u16,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            verbose: false,
            keep_source: false,
            dry_run: false,
            show_info: false,
            remote_shell: PathBuf::from("/usr/bin/ssh"),
            agent_port: AGENT_PORT,
        }
    }
}

impl RuntimeOptions {
    pub fn new(
        verbose: bool,
        keep_source: bool,
        dry_run: bool,
        show_info: bool,
        remote_shell: PathBuf,
    ) -> Self {
        Self {
            verbose,
            keep_source,
            dry_run,
            show_info,
            remote_shell,
            agent_port: AGENT_PORT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_conservative() {
        let opts = RuntimeOptions::default();
        assert!(!opts.verbose);
        assert!(!opts.keep_source);
        assert!(!opts.dry_run);
        assert_eq!(opts.agent_port, AGENT_PORT);
    }
}
