use std::path::PathBuf;

use sertel_frame::{FrameError, LayoutError};
use sertel_transport::TransportError;

/// Errors raised while loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The configuration file is not valid TOML for this schema.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// The frame geometry is impossible.
    #[error("invalid frame layout: {0}")]
    Layout(#[from] LayoutError),

    /// A value parsed but is not usable.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Errors that can occur while running the pipeline.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Transport-level error (port open, collector socket).
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// An output log could not be opened at startup.
    #[error("failed to open log {path}: {source}")]
    OpenLog {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Writing or flushing an output log failed.
    #[error("failed writing {log} log for stream {stream}: {source}")]
    Sink {
        stream: String,
        log: &'static str,
        source: std::io::Error,
    },

    /// The collector did not accept an export line.
    #[error("collector send failed: {0}")]
    Export(std::io::Error),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
