use std::io::Write;
use std::sync::Arc;

use sertel_frame::{decode_packet, Frame, FrameError, Packet, CHANNELS};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::calibration::Calibration;
use crate::error::{PipelineError, Result};
use crate::store::SampleStore;

/// Counters kept by one processor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessorStats {
    /// Packets decoded, logged and published.
    pub packets: u64,
    /// Frames dropped because the payload did not decode.
    pub decode_errors: u64,
    /// Frames that were already queued when cancellation arrived.
    pub drained_on_cancel: u64,
}

/// Write one log record: `seq,ts,v0,...,v7` with two decimals per value.
pub fn write_log_line<W: Write + ?Sized>(
    out: &mut W,
    sequence: u32,
    timestamp: u32,
    values: &[f32; CHANNELS],
) -> std::io::Result<()> {
    write!(out, "{sequence},{timestamp}")?;
    for value in values {
        write!(out, ",{value:.2}")?;
    }
    out.write_all(b"\n")
}

/// Decodes frames of one stream, persists raw and calibrated records, and
/// publishes the calibrated readings to the stream's [`SampleStore`].
pub struct Processor<W> {
    stream: String,
    calibration: Calibration,
    store: Arc<SampleStore>,
    raw_log: W,
    calibrated_log: W,
    stats: ProcessorStats,
}

impl<W: Write> Processor<W> {
    pub fn new(
        stream: impl Into<String>,
        calibration: Calibration,
        store: Arc<SampleStore>,
        raw_log: W,
        calibrated_log: W,
    ) -> Self {
        Self {
            stream: stream.into(),
            calibration,
            store,
            raw_log,
            calibrated_log,
            stats: ProcessorStats::default(),
        }
    }

    pub fn stream(&self) -> &str {
        &self.stream
    }

    pub fn stats(&self) -> ProcessorStats {
        self.stats
    }

    /// Handle one frame.
    ///
    /// Writes the raw record, then the calibrated record, then publishes to
    /// the store. A decode failure returns `PipelineError::Frame` and leaves
    /// logs and store untouched.
    pub fn process_frame(&mut self, frame: &Frame) -> Result<Packet> {
        let packet = decode_packet(frame.payload())?;
        let calibrated = self.calibration.apply(&packet.readings);

        write_log_line(
            &mut self.raw_log,
            packet.sequence,
            packet.timestamp,
            &packet.readings,
        )
        .map_err(|source| self.sink_error("raw", source))?;
        write_log_line(
            &mut self.calibrated_log,
            packet.sequence,
            packet.timestamp,
            &calibrated,
        )
        .map_err(|source| self.sink_error("calibrated", source))?;

        self.store.update(calibrated, packet.timestamp);
        self.stats.packets += 1;
        Ok(packet)
    }

    /// Flush both logs.
    pub fn flush(&mut self) -> Result<()> {
        self.raw_log
            .flush()
            .map_err(|source| self.sink_error("raw", source))?;
        self.calibrated_log
            .flush()
            .map_err(|source| self.sink_error("calibrated", source))
    }

    /// Consume frames until the queue closes or `cancel` fires.
    ///
    /// On cancellation the queue is closed, frames already buffered are
    /// processed without waiting for new ones, and the logs are flushed.
    /// Decode failures are logged and skipped; a log write failure stops the
    /// processor.
    pub async fn run(
        mut self,
        mut frames: mpsc::Receiver<Frame>,
        cancel: CancellationToken,
    ) -> Result<ProcessorStats> {
        let outcome = loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    break self.drain(&mut frames);
                }
                frame = frames.recv() => match frame {
                    Some(frame) => {
                        if let Err(err) = self.handle(&frame) {
                            break Err(err);
                        }
                    }
                    None => {
                        debug!(stream = %self.stream, "frame queue closed");
                        break Ok(());
                    }
                },
            }
        };

        let flushed = self.flush();
        if let Err(err) = outcome.and(flushed) {
            error!(stream = %self.stream, error = %err, "processor stopped");
            return Err(err);
        }

        info!(
            stream = %self.stream,
            packets = self.stats.packets,
            decode_errors = self.stats.decode_errors,
            drained = self.stats.drained_on_cancel,
            "processor finished"
        );
        Ok(self.stats)
    }

    fn drain(&mut self, frames: &mut mpsc::Receiver<Frame>) -> Result<()> {
        frames.close();
        while let Ok(frame) = frames.try_recv() {
            self.stats.drained_on_cancel += 1;
            self.handle(&frame)?;
        }
        Ok(())
    }

    /// Process one frame, absorbing decode failures.
    fn handle(&mut self, frame: &Frame) -> Result<()> {
        match self.process_frame(frame) {
            Ok(_) => Ok(()),
            Err(PipelineError::Frame(FrameError::Decode { bytes, reason })) => {
                self.stats.decode_errors += 1;
                warn!(stream = %self.stream, reason, bytes = ?bytes, "dropping undecodable frame");
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    fn sink_error(&self, log: &'static str, source: std::io::Error) -> PipelineError {
        PipelineError::Sink {
            stream: self.stream.clone(),
            log,
            source,
        }
    }
}

impl<W> std::fmt::Debug for Processor<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Processor")
            .field("stream", &self.stream)
            .field("calibration", &self.calibration)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}
