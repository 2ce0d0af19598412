//! TOML configuration for a pipeline run.
//!
//! ```toml
//! [frame]
//! size = 42
//! stop_marker = [13, 10]
//! queue_capacity = 20
//! read_timeout = "5ms"
//!
//! [sampler]
//! interval = "100ms"
//! collector = "127.0.0.1:8089"
//! metric = "pressurevals"
//!
//! [shutdown]
//! grace = "2s"
//!
//! [[streams]]
//! name = "hv"
//! port = "/dev/ttyACM0"
//! raw_log = "hv_raw.log"
//! calibrated_log = "hv_cal.log"
//! scale = [1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0]
//! ```

use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Deserializer};
use sertel_frame::{FrameLayout, CHANNELS, DEFAULT_FRAME_SIZE, DEFAULT_STOP_MARKER, PACKET_SIZE};

use crate::calibration::Calibration;
use crate::error::ConfigError;

/// Default baud rate of the acquisition boards.
pub const DEFAULT_BAUD_RATE: u32 = 460_800;

/// Default per-stream queue capacity in frames.
pub const DEFAULT_QUEUE_CAPACITY: usize = 20;

/// Default metric name for exported lines.
pub const DEFAULT_METRIC: &str = "pressurevals";

/// Complete configuration for one run.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub frame: FrameConfig,
    pub sampler: SamplerConfig,
    #[serde(default)]
    pub shutdown: ShutdownConfig,
    /// Ordered; the order fixes the channel layout of exported lines.
    #[serde(default)]
    pub streams: Vec<StreamConfig>,
}

/// Frame geometry and reader tuning shared by all streams.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct FrameConfig {
    pub size: usize,
    pub stop_marker: Vec<u8>,
    pub queue_capacity: usize,
    #[serde(deserialize_with = "deserialize_duration")]
    pub read_timeout: Duration,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            size: DEFAULT_FRAME_SIZE,
            stop_marker: DEFAULT_STOP_MARKER.to_vec(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            read_timeout: Duration::from_millis(5),
        }
    }
}

/// Export settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SamplerConfig {
    #[serde(default = "default_interval", deserialize_with = "deserialize_duration")]
    pub interval: Duration,
    pub collector: SocketAddr,
    #[serde(default = "default_metric")]
    pub metric: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ShutdownConfig {
    /// How long shutdown waits for tasks to finish before giving up.
    #[serde(deserialize_with = "deserialize_duration")]
    pub grace: Duration,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            grace: Duration::from_secs(2),
        }
    }
}

/// One physical source and its outputs.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StreamConfig {
    pub name: String,
    pub port: String,
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    pub raw_log: PathBuf,
    pub calibrated_log: PathBuf,
    #[serde(default = "default_scale")]
    pub scale: Vec<f32>,
    #[serde(default = "default_offset")]
    pub offset: Vec<f32>,
}

impl StreamConfig {
    /// Build the calibration for this stream.
    pub fn calibration(&self) -> Result<Calibration, ConfigError> {
        let scale = coefficients(&self.name, "scale", &self.scale)?;
        let offset = coefficients(&self.name, "offset", &self.offset)?;
        Ok(Calibration::new(scale, offset))
    }
}

fn coefficients(stream: &str, field: &str, values: &[f32]) -> Result<[f32; CHANNELS], ConfigError> {
    let array: [f32; CHANNELS] = values.try_into().map_err(|_| {
        ConfigError::Invalid(format!(
            "stream {stream}: {field} must have {CHANNELS} values, got {}",
            values.len()
        ))
    })?;
    if let Some(index) = array.iter().position(|v| !v.is_finite()) {
        return Err(ConfigError::Invalid(format!(
            "stream {stream}: {field}[{index}] is not a finite number"
        )));
    }
    Ok(array)
}

impl Config {
    /// Read, parse and validate a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Parse and validate configuration text.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Frame layout described by `[frame]`.
    pub fn layout(&self) -> Result<FrameLayout, ConfigError> {
        let layout = FrameLayout::new(self.frame.size, self.frame.stop_marker.clone())?;
        if layout.payload_size() < PACKET_SIZE {
            return Err(ConfigError::Invalid(format!(
                "frame payload is {} bytes; a packet needs {PACKET_SIZE}",
                layout.payload_size()
            )));
        }
        Ok(layout)
    }

    /// Look up a stream by name.
    pub fn stream(&self, name: &str) -> Option<&StreamConfig> {
        self.streams.iter().find(|s| s.name == name)
    }

    /// Check every cross-field constraint.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.layout()?;

        if self.frame.queue_capacity == 0 {
            return Err(invalid("frame.queue_capacity must be greater than zero"));
        }
        if self.frame.read_timeout.is_zero() {
            return Err(invalid("frame.read_timeout must be greater than zero"));
        }
        if self.sampler.interval.is_zero() {
            return Err(invalid("sampler.interval must be greater than zero"));
        }
        if self.shutdown.grace.is_zero() {
            return Err(invalid("shutdown.grace must be greater than zero"));
        }
        validate_metric(&self.sampler.metric)?;

        if self.streams.is_empty() {
            return Err(invalid("at least one [[streams]] entry is required"));
        }

        let mut names = HashSet::new();
        let mut paths = HashSet::new();
        for stream in &self.streams {
            if stream.name.trim().is_empty() {
                return Err(invalid("stream name must not be empty"));
            }
            if !names.insert(stream.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate stream name: {}",
                    stream.name
                )));
            }
            if stream.port.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "stream {}: port must not be empty",
                    stream.name
                )));
            }
            if stream.baud_rate == 0 {
                return Err(ConfigError::Invalid(format!(
                    "stream {}: baud_rate must be greater than zero",
                    stream.name
                )));
            }
            for (field, path) in [
                ("raw_log", &stream.raw_log),
                ("calibrated_log", &stream.calibrated_log),
            ] {
                if path.as_os_str().is_empty() {
                    return Err(ConfigError::Invalid(format!(
                        "stream {}: {field} must not be empty",
                        stream.name
                    )));
                }
                if !paths.insert(path.as_path()) {
                    return Err(ConfigError::Invalid(format!(
                        "stream {}: {field} {} is already used by another log",
                        stream.name,
                        path.display()
                    )));
                }
            }
            stream.calibration()?;
        }

        Ok(())
    }
}

fn validate_metric(metric: &str) -> Result<(), ConfigError> {
    if metric.is_empty() {
        return Err(invalid("sampler.metric must not be empty"));
    }
    if metric.chars().any(|c| c.is_whitespace() || c == ',') {
        return Err(ConfigError::Invalid(format!(
            "sampler.metric {metric:?} must not contain whitespace or commas"
        )));
    }
    Ok(())
}

fn invalid(message: &str) -> ConfigError {
    ConfigError::Invalid(message.to_string())
}

fn default_interval() -> Duration {
    Duration::from_millis(100)
}

fn default_metric() -> String {
    DEFAULT_METRIC.to_string()
}

fn default_baud_rate() -> u32 {
    DEFAULT_BAUD_RATE
}

fn default_scale() -> Vec<f32> {
    vec![1.0; CHANNELS]
}

fn default_offset() -> Vec<f32> {
    vec![0.0; CHANNELS]
}

/// Parse `"150ms"`, `"2s"` or a bare number of seconds.
pub fn parse_duration(input: &str) -> Result<Duration, String> {
    let input = input.trim();
    if input.is_empty() {
        return Err("duration must not be empty".to_string());
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .trim()
        .parse()
        .map_err(|_| format!("invalid duration value: {input}"))?;

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let text = String::deserialize(deserializer)?;
    parse_duration(&text).map_err(serde::de::Error::custom)
}
