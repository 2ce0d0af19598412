use bytes::Bytes;
use sertel_transport::TransportError;

/// Errors that can occur while framing or decoding a byte stream.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The underlying byte source failed. Fatal for the stream.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The stop marker was not where the frame length says it should be.
    /// Carries the rejected frame for diagnostics.
    #[error("stop marker mismatch, frame discarded ({} bytes)", .bytes.len())]
    Framing { bytes: Bytes },

    /// A framed payload could not be decoded into a packet.
    #[error("malformed packet: {reason} ({} bytes)", .bytes.len())]
    Decode { bytes: Bytes, reason: &'static str },
}

/// Errors in a frame layout definition.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LayoutError {
    /// The stop marker has no bytes.
    #[error("stop marker must not be empty")]
    EmptyMarker,

    /// The frame has no room for a payload.
    #[error("frame size {size} must be larger than the {marker}-byte stop marker")]
    FrameTooSmall { size: usize, marker: usize },
}

pub type Result<T> = std::result::Result<T, FrameError>;
