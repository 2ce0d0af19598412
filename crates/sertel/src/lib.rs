//! Serial telemetry acquisition.
//!
//! sertel reads fixed-size binary frames from data-acquisition boards over
//! serial lines, recovers frame alignment after corruption, calibrates the
//! readings, logs them, and exports a combined snapshot to a metrics
//! collector over UDP.
//!
//! # Crate Structure
//!
//! - [`transport`]: Byte sources (serial ports, captures) and the collector sink
//! - [`frame`]: Stop-marker framing, resynchronisation and the packet codec
//! - [`pipeline`]: Processors, sample stores, the sampler and the orchestrator

/// Re-export transport types.
pub mod transport {
    pub use sertel_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use sertel_frame::*;
}

/// Re-export pipeline types.
pub mod pipeline {
    pub use sertel_pipeline::*;
}
