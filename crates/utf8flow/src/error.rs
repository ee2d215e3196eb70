use alloc::string::String;

use thiserror::Error;

/// An invalid configuration value, detected when a component is built.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("target usage fraction must be in (0, 1], got {0}")]
    TargetUsageOutOfRange(f64),
    #[error("smoothing factor must be in (0, 1], got {0}")]
    SmoothingOutOfRange(f64),
    #[error("progress threshold must be positive")]
    ZeroProgressThreshold,
    #[error("chunk size must be positive")]
    ZeroChunkSize,
    #[error("output capacity must be positive")]
    ZeroOutputCapacity,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EncodeError {
    #[error("output has no capacity but {pending} byte(s) are waiting to be written")]
    ZeroCapacity { pending: usize },
}

/// A chunk source could not produce its next chunk.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SourceError {
    #[error("read failed: {0}")]
    Io(String),
    #[error("{0}")]
    Other(String),
}

#[cfg(feature = "std")]
impl From<std::io::Error> for SourceError {
    fn from(err: std::io::Error) -> Self {
        use alloc::string::ToString;
        Self::Io(err.to_string())
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum PipelineError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("encode error: {0}")]
    Encode(#[from] EncodeError),
    #[error("source error: {0}")]
    Source(#[from] SourceError),
}
