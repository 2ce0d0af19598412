use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{FrameError, LayoutError, Result};

/// Sensor channels carried by one packet.
pub const CHANNELS: usize = 8;

/// Packet size: sequence (4) + timestamp (4) + 8 readings (4 each) = 40 bytes.
pub const PACKET_SIZE: usize = 8 + CHANNELS * 4;

/// Stop marker emitted by the board firmware: `\r\n`.
pub const DEFAULT_STOP_MARKER: [u8; 2] = *b"\r\n";

/// Default frame size: one packet plus the stop marker.
pub const DEFAULT_FRAME_SIZE: usize = PACKET_SIZE + DEFAULT_STOP_MARKER.len();

/// Fixed frame geometry: total size and the trailing stop marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameLayout {
    frame_size: usize,
    stop_marker: Bytes,
}

impl FrameLayout {
    /// Create a layout. The frame must leave at least one payload byte.
    pub fn new(
        frame_size: usize,
        stop_marker: impl Into<Bytes>,
    ) -> std::result::Result<Self, LayoutError> {
        let stop_marker = stop_marker.into();
        if stop_marker.is_empty() {
            return Err(LayoutError::EmptyMarker);
        }
        if frame_size <= stop_marker.len() {
            return Err(LayoutError::FrameTooSmall {
                size: frame_size,
                marker: stop_marker.len(),
            });
        }
        Ok(Self {
            frame_size,
            stop_marker,
        })
    }

    /// Total frame size in bytes (payload + marker).
    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    /// Payload size in bytes.
    pub fn payload_size(&self) -> usize {
        self.frame_size - self.stop_marker.len()
    }

    /// The stop marker bytes.
    pub fn stop_marker(&self) -> &[u8] {
        &self.stop_marker
    }

    /// Whether `bytes` is exactly one frame ending in the stop marker.
    pub fn is_valid_frame(&self, bytes: &[u8]) -> bool {
        bytes.len() == self.frame_size && bytes.ends_with(&self.stop_marker)
    }
}

impl Default for FrameLayout {
    fn default() -> Self {
        Self {
            frame_size: DEFAULT_FRAME_SIZE,
            stop_marker: Bytes::from_static(&DEFAULT_STOP_MARKER),
        }
    }
}

/// One validated frame. Owns its bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    bytes: Bytes,
    payload_len: usize,
}

impl Frame {
    /// Validate `bytes` against `layout`.
    ///
    /// Returns `FrameError::Framing` if the length or stop marker is wrong.
    pub fn new(bytes: impl Into<Bytes>, layout: &FrameLayout) -> Result<Self> {
        let bytes = bytes.into();
        if !layout.is_valid_frame(&bytes) {
            return Err(FrameError::Framing { bytes });
        }
        Ok(Self {
            bytes,
            payload_len: layout.payload_size(),
        })
    }

    /// Payload bytes (everything before the stop marker).
    pub fn payload(&self) -> &[u8] {
        &self.bytes[..self.payload_len]
    }

    /// The trailing stop marker.
    pub fn stop_marker(&self) -> &[u8] {
        &self.bytes[self.payload_len..]
    }

    /// The whole frame as received.
    pub fn as_bytes(&self) -> &Bytes {
        &self.bytes
    }

    /// Total frame length.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Frames are never empty; provided for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Consume the frame and return its bytes.
    pub fn into_bytes(self) -> Bytes {
        self.bytes
    }
}

/// One decoded telemetry record.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Packet {
    /// Producer-assigned counter.
    pub sequence: u32,
    /// Producer-relative clock in milliseconds.
    pub timestamp: u32,
    /// One reading per sensor channel.
    pub readings: [f32; CHANNELS],
}

/// Encode a packet into its wire layout.
///
/// Wire format (little-endian, no padding):
/// ```text
/// ┌────────────┬────────────┬──────────────────────────────┐
/// │ Sequence   │ Timestamp  │ Readings                     │
/// │ (4B LE)    │ (4B LE ms) │ (8 × f32 LE)                 │
/// └────────────┴────────────┴──────────────────────────────┘
/// ```
pub fn encode_packet(packet: &Packet, dst: &mut BytesMut) {
    dst.reserve(PACKET_SIZE);
    dst.put_u32_le(packet.sequence);
    dst.put_u32_le(packet.timestamp);
    for reading in packet.readings {
        dst.put_f32_le(reading);
    }
}

/// Decode a packet from the start of a frame payload.
///
/// Bytes beyond [`PACKET_SIZE`] are ignored.
pub fn decode_packet(payload: &[u8]) -> Result<Packet> {
    if payload.len() < PACKET_SIZE {
        return Err(FrameError::Decode {
            bytes: Bytes::copy_from_slice(payload),
            reason: "payload shorter than packet",
        });
    }

    let mut src = &payload[..PACKET_SIZE];
    let sequence = src.get_u32_le();
    let timestamp = src.get_u32_le();
    let mut readings = [0f32; CHANNELS];
    for reading in &mut readings {
        *reading = src.get_f32_le();
    }

    Ok(Packet {
        sequence,
        timestamp,
        readings,
    })
}

/// Encode a packet as a complete frame: payload (zero-padded to the layout's
/// payload size) followed by the stop marker.
pub fn encode_frame(packet: &Packet, layout: &FrameLayout, dst: &mut BytesMut) {
    dst.reserve(layout.frame_size());
    let start = dst.len();
    encode_packet(packet, dst);
    dst.truncate(start + layout.payload_size());
    dst.resize(start + layout.payload_size(), 0);
    dst.put_slice(layout.stop_marker());
}
