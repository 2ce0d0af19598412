use std::time::Duration;

use bytes::{Buf, Bytes, BytesMut};
use sertel_transport::ByteSource;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::codec::{Frame, FrameLayout};
use crate::error::{FrameError, Result};

/// Whether frame boundaries are currently known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// Scanning for a stop marker; boundaries are not trusted.
    Unsynced,
    /// The next byte read starts a frame.
    Synced,
}

/// Counters kept by a [`FrameReader`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReaderStats {
    /// Frames returned to the caller.
    pub frames: u64,
    /// Frames rejected because the stop marker was missing.
    pub framing_errors: u64,
    /// Times alignment was (re)acquired.
    pub resyncs: u64,
    /// Frames recovered during resync after a damaged stop marker.
    pub recovered: u64,
    /// Bytes dropped while searching for alignment.
    pub discarded_bytes: u64,
}

enum Resync {
    Boundary,
    Recovered(Frame),
    Cancelled,
}

/// Reads fixed-size, stop-marker-terminated frames from a [`ByteSource`].
///
/// Starts `Unsynced` and scans byte by byte until the stop marker has been
/// seen; from then on it reads whole frames, handling short reads
/// internally. A frame whose trailing bytes are not the stop marker is
/// returned as `FrameError::Framing` and the reader drops back to scanning.
///
/// The rescan starts from the rejected frame, so one damaged frame costs one
/// error:
/// - a marker at the tail of the rejected bytes (a byte was lost) marks the
///   boundary
/// - a marker completed by the next few bytes (a byte was inserted) marks it
///
/// Markers elsewhere in that window are payload bytes and are skipped.
/// - a marker about one frame length later (the marker itself was damaged)
///   closes a complete frame, which is returned directly
///
/// Every read checks the cancellation token first, so with a short transport
/// timeout cancellation is observed promptly even on a silent line.
pub struct FrameReader<S> {
    source: S,
    layout: FrameLayout,
    state: SyncState,
    /// Unsynced: bytes scanned since the last trusted boundary.
    /// Synced: bytes already read that begin the next frame.
    carry: BytesMut,
    /// `carry[0]` sits on a trusted frame boundary.
    anchored: bool,
    stats: ReaderStats,
}

impl<S: ByteSource> FrameReader<S> {
    /// Create an unsynchronised reader.
    pub fn new(source: S, layout: FrameLayout) -> Self {
        let capacity = 2 * layout.frame_size() + layout.stop_marker().len();
        Self {
            source,
            layout,
            state: SyncState::Unsynced,
            carry: BytesMut::with_capacity(capacity),
            anchored: false,
            stats: ReaderStats::default(),
        }
    }

    /// Apply the read timeout, discard stale transport input and restart
    /// synchronisation.
    pub fn prepare(&mut self, read_timeout: Duration) -> Result<()> {
        self.source.set_read_timeout(read_timeout)?;
        self.source.reset_input()?;
        self.reset();
        Ok(())
    }

    /// Forget alignment; the next read scans for a stop marker.
    pub fn reset(&mut self) {
        self.state = SyncState::Unsynced;
        self.carry.clear();
        self.anchored = false;
    }

    /// Read the next complete frame (blocking).
    ///
    /// Returns `Ok(None)` once `cancel` has fired. A partially read frame is
    /// dropped in that case.
    pub fn read_frame(&mut self, cancel: &CancellationToken) -> Result<Option<Frame>> {
        if self.state == SyncState::Unsynced {
            match self.resync(cancel)? {
                Resync::Cancelled => return Ok(None),
                Resync::Recovered(frame) => {
                    self.stats.frames += 1;
                    return Ok(Some(frame));
                }
                Resync::Boundary => {}
            }
        }

        let Some(bytes) = self.fill(cancel)? else {
            return Ok(None);
        };

        match Frame::new(bytes, &self.layout) {
            Ok(frame) => {
                self.stats.frames += 1;
                Ok(Some(frame))
            }
            Err(FrameError::Framing { bytes }) => {
                self.stats.framing_errors += 1;
                self.state = SyncState::Unsynced;
                self.carry.clear();
                self.carry.extend_from_slice(&bytes);
                self.anchored = true;
                Err(FrameError::Framing { bytes })
            }
            Err(err) => Err(err),
        }
    }

    /// Collect exactly one frame worth of bytes into a fresh buffer.
    fn fill(&mut self, cancel: &CancellationToken) -> Result<Option<Bytes>> {
        let frame_size = self.layout.frame_size();
        let mut buf = BytesMut::zeroed(frame_size);

        let mut filled = self.carry.len().min(frame_size);
        buf[..filled].copy_from_slice(&self.carry[..filled]);
        self.carry.advance(filled);

        while filled < frame_size {
            if cancel.is_cancelled() {
                return Ok(None);
            }
            filled += self.source.read(&mut buf[filled..])?;
        }

        Ok(Some(buf.freeze()))
    }

    fn resync(&mut self, cancel: &CancellationToken) -> Result<Resync> {
        let frame_size = self.layout.frame_size();
        let marker_len = self.layout.stop_marker().len();

        if self.anchored {
            if let Some(end) = last_marker_end(&self.carry, self.layout.stop_marker()) {
                if end + marker_len >= frame_size {
                    return Ok(self.lock_at(end));
                }
            }
        }

        let mut byte = [0u8; 1];
        loop {
            if self.anchored && self.carry.len() > 2 * frame_size + marker_len {
                self.anchored = false;
            }
            if !self.anchored && self.carry.len() >= marker_len {
                let excess = self.carry.len() + 1 - marker_len;
                self.carry.advance(excess);
                self.stats.discarded_bytes += excess as u64;
            }

            if cancel.is_cancelled() {
                return Ok(Resync::Cancelled);
            }
            if self.source.read(&mut byte)? == 0 {
                continue;
            }
            self.carry.extend_from_slice(&byte);

            let end = self.carry.len();
            if end < marker_len || !self.carry.ends_with(self.layout.stop_marker()) {
                continue;
            }

            if self.anchored && end >= frame_size && end.abs_diff(2 * frame_size) <= marker_len {
                let frame = Frame::new(
                    Bytes::copy_from_slice(&self.carry[end - frame_size..end]),
                    &self.layout,
                )?;
                self.stats.discarded_bytes += (end - frame_size) as u64;
                self.stats.resyncs += 1;
                self.stats.recovered += 1;
                self.carry.clear();
                self.anchored = false;
                self.state = SyncState::Synced;
                debug!(offset = end - frame_size, "recovered frame behind damaged stop marker");
                return Ok(Resync::Recovered(frame));
            }
            if self.anchored && end.abs_diff(frame_size) > marker_len {
                continue;
            }

            return Ok(self.lock_at(end));
        }
    }

    fn lock_at(&mut self, end: usize) -> Resync {
        self.carry.advance(end);
        self.stats.discarded_bytes += end as u64;
        self.stats.resyncs += 1;
        self.anchored = false;
        self.state = SyncState::Synced;
        debug!(skipped = end, pending = self.carry.len(), "stream synchronised");
        Resync::Boundary
    }

    /// Current synchronisation state.
    pub fn state(&self) -> SyncState {
        self.state
    }

    /// Counters since construction.
    pub fn stats(&self) -> ReaderStats {
        self.stats
    }

    /// Frame geometry this reader enforces.
    pub fn layout(&self) -> &FrameLayout {
        &self.layout
    }

    /// Borrow the underlying source.
    pub fn get_ref(&self) -> &S {
        &self.source
    }

    /// Mutably borrow the underlying source.
    pub fn get_mut(&mut self) -> &mut S {
        &mut self.source
    }

    /// Close the underlying source.
    pub fn close(&mut self) {
        self.source.close();
    }

    /// Consume the reader and return the source.
    pub fn into_inner(self) -> S {
        self.source
    }
}

/// End offset of the last complete occurrence of `marker` in `haystack`.
fn last_marker_end(haystack: &[u8], marker: &[u8]) -> Option<usize> {
    haystack
        .windows(marker.len())
        .rposition(|window| window == marker)
        .map(|start| start + marker.len())
}
