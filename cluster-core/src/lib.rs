//! Distributed transcoding cluster core
//!
//! Drives a heterogeneous pool of worker hosts against a shared work queue,
//! monitors encoder progress in real time, and enforces a compression
//! savings policy. CLI parsing, YAML loading, the media probe, and terminal
//! rendering are external collaborators; this crate consumes their output.

pub mod cluster;
pub mod config;
pub mod driver;
pub mod engine;
pub mod error;
pub mod host;
pub mod job;
pub mod media;
pub mod progress;
pub mod protocol;
pub mod queue;
pub mod runtime;
pub mod status;
pub mod template;
pub mod threshold;
pub mod worker;

pub use cluster::{format_completion_report, Cluster};
pub use config::{ClusterConfig, GlobalSettings};
pub use engine::Engine;
pub use error::{ClusterError, ClusterResult};
pub use host::{HostDescriptor, HostVariant, OsFamily, PathSubstitution};
pub use job::EncodeJob;
pub use media::{MediaInfo, MediaProbe, StreamInfo};
pub use queue::{JobQueue, QueueSet};
pub use runtime::{RuntimeOptions, AGENT_PORT};
pub use status::{StatusBus, StatusEvent};
pub use template::Template;
pub use threshold::ThresholdEvaluator;
pub use worker::{CompletionRecord, RemotePaths, WorkerContext};

/// Initializes structured logging from `RUST_LOG`, defaulting to `info`.
pub fn init() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_does_not_error() {
        assert!(init().is_ok());
    }
}
