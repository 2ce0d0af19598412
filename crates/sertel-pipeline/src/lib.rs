//! Concurrent telemetry pipeline.
//!
//! One [`StreamPipeline`] per physical source (a blocking reader feeding a
//! bounded queue, and a [`Processor`] draining it into a [`SampleStore`]),
//! plus a single [`Sampler`] exporting all stores on a fixed period. The
//! [`Orchestrator`] wires them together and drives coordinated shutdown.

pub mod calibration;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod processor;
pub mod sampler;
pub mod store;
pub mod stream;

pub use calibration::Calibration;
pub use config::{Config, FrameConfig, SamplerConfig, ShutdownConfig, StreamConfig};
pub use error::{ConfigError, PipelineError, Result};
pub use orchestrator::{open_log, LogFile, Orchestrator, ShutdownReport, StreamOutcome, StreamParts};
pub use processor::{write_log_line, Processor, ProcessorStats};
pub use sampler::{format_line, send_all, Export, Sampler, SamplerAnchor, SamplerStats};
pub use store::{Sample, SampleStore};
pub use stream::{pump, spawn_stream, StreamPipeline};
