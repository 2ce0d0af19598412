//! Fixed-size stop-marker framing and telemetry packet codec.
//!
//! The boards emit frames with no header and no length prefix:
//! - A fixed-size payload (a little-endian [`Packet`])
//! - A trailing stop marker (`\r\n` by default)
//!
//! [`FrameReader`] recovers frame alignment from the raw byte stream and
//! re-synchronises after corruption. Callers always get complete frames.

pub mod codec;
pub mod error;
pub mod reader;

pub use codec::{
    decode_packet, encode_frame, encode_packet, Frame, FrameLayout, Packet, CHANNELS,
    DEFAULT_FRAME_SIZE, DEFAULT_STOP_MARKER, PACKET_SIZE,
};
pub use error::{FrameError, LayoutError, Result};
pub use reader::{FrameReader, ReaderStats, SyncState};
