use thiserror::Error;

/// Errors raised by an [`AudioHost`](crate::host::AudioHost) implementation.
#[derive(Clone, Debug, Error)]
pub enum HostError {
    #[error("analyser window size {0} is not supported (expected a power of two in 32..=32768)")]
    UnsupportedWindowSize(usize),
    #[error("unknown node {0:?}")]
    UnknownNode(crate::host::NodeId),
    #[error("node {0:?} cannot be used as {1}")]
    WrongNodeKind(crate::host::NodeId, &'static str),
    #[error("connecting {from:?} -> {to:?} would create a cycle")]
    Cycle {
        from: crate::host::NodeId,
        to: crate::host::NodeId,
    },
    #[error("invalid {name}: {value}")]
    InvalidParameter { name: &'static str, value: f32 },
    #[error("failed to resample buffer: {0}")]
    Resample(String),
}

/// Errors raised while building a pipeline. All of them are fatal at
/// construction time; no graph is left wired.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid analysis window size {window_size}: {source}")]
    WindowSize {
        window_size: usize,
        #[source]
        source: HostError,
    },
    #[error("invalid band '{key}': {reason}")]
    InvalidBand { key: String, reason: String },
    #[error("duplicate band key '{0}'")]
    DuplicateBand(String),
    #[error("at least one band is required")]
    NoBands,
    #[error("audio host error: {0}")]
    Host(#[from] HostError),
}

/// Outcome of a failed `load()`.
#[derive(Clone, Debug, Error)]
pub enum LoadError {
    #[error("failed to fetch {url}: {reason}")]
    Fetch { url: String, reason: String },
    #[error("failed to decode {url}: {reason}")]
    Decode { url: String, reason: String },
    #[error("loader worker for {0} exited without a result")]
    Disconnected(String),
    #[error("audio host rejected buffer: {0}")]
    Host(#[from] HostError),
}
