//! Byte-stream sources and datagram sinks for sertel.
//!
//! This is the lowest layer of sertel. It provides:
//! - [`ByteSource`]: the narrow read/timeout/reset/close surface the framer needs
//! - [`SerialSource`]: a serial port opened at a fixed baud rate
//! - [`StreamSource`]: any [`std::io::Read`], used for capture replay
//! - [`DatagramSink`]: the send half of the collector connection
//!
//! Everything above this crate talks to hardware only through these types.

pub mod datagram;
pub mod error;
pub mod traits;

#[cfg(feature = "serial")]
pub mod serial;

pub use datagram::{connect_collector, DatagramSink};
pub use error::{Result, TransportError};
pub use traits::{ByteSource, StreamSource};

#[cfg(feature = "serial")]
pub use serial::SerialSource;
