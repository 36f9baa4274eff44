use thiserror::Error;

/// Errors surfaced by the streaming core to its HTTP collaborator.
///
/// Kinds match the error taxonomy of the coordinator/facade design:
/// validation failures, analysis failures, and build failures are kept
/// distinct so the HTTP layer can map each to the right status code
/// without inspecting message text.
/// `Clone` so the single-flight `OnceCell` latches in `analysis.rs` and
/// `coordinator.rs` can hand the same outcome to every waiter without
/// forcing `std::io::Error` (not `Clone`) into the enum; `CacheIoError`
/// carries the formatted message instead of the original error.
#[derive(Error, Debug, Clone)]
pub enum HlsError {
    #[error("media not found: {0}")]
    MediaNotFound(String),

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("invalid segment name: {0}")]
    InvalidSegmentName(String),

    #[error("unknown quality: {0}")]
    UnknownQuality(String),

    #[error(transparent)]
    Probe(#[from] ProbeError),

    #[error("segment plan invariant violated: {0}")]
    PlanInvariantViolation(String),

    #[error(transparent)]
    Encoder(#[from] EncoderError),

    #[error("cache i/o error: {0}")]
    CacheIoError(String),
}

impl From<std::io::Error> for HlsError {
    fn from(err: std::io::Error) -> Self {
        HlsError::CacheIoError(err.to_string())
    }
}

/// Failures specific to the probe adapter (§4.1).
#[derive(Error, Debug, Clone)]
pub enum ProbeError {
    #[error("failed to spawn probe binary: {0}")]
    Spawn(String),

    #[error("probe exited with status {code:?}: {stderr_tail}")]
    ExitStatus { code: Option<i32>, stderr_tail: String },

    #[error("probe output could not be parsed: {0}")]
    Parse(String),

    #[error("probe produced no keyframes")]
    NoKeyframes,

    #[error("probe output exceeded buffer limit of {limit} bytes")]
    BufferOverflow { limit: usize },

    #[error("probe timed out after {0:?}")]
    Timeout(std::time::Duration),
}

/// Failures specific to the encoder adapter (§4.8).
#[derive(Error, Debug, Clone)]
pub enum EncoderError {
    #[error("failed to spawn encoder binary: {0}")]
    Spawn(String),

    #[error("encoder exited with status {code:?}: {stderr_tail}")]
    ExitStatus { code: Option<i32>, stderr_tail: String },

    #[error("encoder timed out after {0:?}")]
    Timeout(std::time::Duration),
}

pub type Result<T> = std::result::Result<T, HlsError>;
