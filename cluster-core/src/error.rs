//! Error types for the cluster dispatcher

use thiserror::Error;

pub type ClusterResult<T> = Result<T, ClusterError>;

#[derive(Error, Debug)]
pub enum ClusterError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("encoder not found in system PATH")]
    EncoderNotFound,

    #[error("encoder execution failed: {0}")]
    EncoderFailed(String),

    #[error("invalid input file: {0}")]
    InvalidInput(String),

    #[error("invalid output path: {0}")]
    InvalidOutput(String),

    #[error("host unreachable: {0}")]
    HostUnreachable(String),

    #[error("host descriptor validation failed for '{host}': {reason}")]
    InvalidHostDescriptor { host: String, reason: String },

    #[error("template not found: {0}")]
    TemplateNotFound(String),

    #[error("no host engine maps quality '{0}'")]
    UnmappedQuality(String),

    #[error("media probe failed for '{0}'")]
    ProbeFailed(String),

    #[error("transport failure: {0}")]
    TransportFailure(String),

    #[error("agent protocol violation: {0}")]
    ProtocolViolation(String),

    #[error("agent handshake rejected: {0}")]
    Nak(String),

    #[error("job vetoed by threshold policy")]
    Vetoed,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("job cancelled")]
    Cancelled,
}
