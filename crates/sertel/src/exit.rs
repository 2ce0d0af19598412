use std::fmt;
use std::io;

use sertel_frame::FrameError;
use sertel_pipeline::{ConfigError, PipelineError};
use sertel_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::NotFound | io::ErrorKind::ConnectionRefused => FAILURE,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Bind { .. } | TransportError::Connect { .. } => {
            CliError::new(TRANSPORT_ERROR, format!("{context}: {err}"))
        }
        TransportError::Io(source) => io_error(context, source),
        TransportError::Closed => CliError::new(FAILURE, format!("{context}: {err}")),
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::Transport(err) => transport_error(context, err),
        FrameError::Framing { .. } | FrameError::Decode { .. } => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
    }
}

pub fn config_error(context: &str, err: ConfigError) -> CliError {
    match err {
        ConfigError::Read { source, path } => {
            io_error(&format!("{context}: {}", path.display()), source)
        }
        ConfigError::Parse(_) | ConfigError::Layout(_) | ConfigError::Invalid(_) => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
    }
}

pub fn pipeline_error(context: &str, err: PipelineError) -> CliError {
    match err {
        PipelineError::Config(err) => config_error(context, err),
        PipelineError::Transport(err) => transport_error(context, err),
        PipelineError::Frame(err) => frame_error(context, err),
        PipelineError::OpenLog { .. } | PipelineError::Sink { .. } => {
            CliError::new(FAILURE, format!("{context}: {err}"))
        }
        PipelineError::Export(source) => io_error(context, source),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_errors_are_data_invalid() {
        let err = config_error("invalid config", ConfigError::Invalid("no streams".into()));
        assert_eq!(err.code, DATA_INVALID);
        assert_eq!(err.to_string(), "invalid config: invalid configuration: no streams");
    }

    #[test]
    fn missing_config_file_is_failure() {
        let err = config_error(
            "cannot load config",
            ConfigError::Read {
                path: "/nonexistent.toml".into(),
                source: io::Error::from(io::ErrorKind::NotFound),
            },
        );
        assert_eq!(err.code, FAILURE);
        assert!(err.message.contains("/nonexistent.toml"));
    }

    #[test]
    fn collector_connect_failure_is_transport_error() {
        let err = pipeline_error(
            "startup failed",
            PipelineError::Transport(TransportError::Connect {
                addr: "127.0.0.1:8089".parse().unwrap(),
                source: io::Error::from(io::ErrorKind::AddrNotAvailable),
            }),
        );
        assert_eq!(err.code, TRANSPORT_ERROR);
        assert!(err.message.contains("127.0.0.1:8089"));
    }

    #[test]
    fn framing_errors_are_data_invalid() {
        let err = frame_error(
            "decode failed",
            FrameError::Framing {
                bytes: vec![0u8; 42].into(),
            },
        );
        assert_eq!(err.code, DATA_INVALID);
    }
}
