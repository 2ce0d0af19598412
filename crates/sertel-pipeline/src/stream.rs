//! Reader and processor wiring for one stream.

use std::io::Write;
use std::time::Duration;

use sertel_frame::{Frame, FrameError, FrameReader, ReaderStats};
use sertel_transport::ByteSource;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::error::Result;
use crate::processor::{Processor, ProcessorStats};

/// Pull frames from `reader` into `frames` until cancellation, a transport
/// failure, or the consumer going away.
///
/// Framing errors are logged with the discarded bytes and reading
/// continues. Blocks when the queue is full.
pub fn pump<S: ByteSource>(
    stream: &str,
    reader: &mut FrameReader<S>,
    frames: &mpsc::Sender<Frame>,
    cancel: &CancellationToken,
) -> std::result::Result<(), FrameError> {
    loop {
        match reader.read_frame(cancel) {
            Ok(Some(frame)) => {
                if frames.blocking_send(frame).is_err() {
                    info!(stream, "frame queue closed, reader stopping");
                    return Ok(());
                }
            }
            Ok(None) => {
                info!(stream, "reader cancelled");
                return Ok(());
            }
            Err(FrameError::Framing { bytes }) => {
                warn!(stream, len = bytes.len(), bytes = ?bytes, "stop marker mismatch, frame discarded");
            }
            Err(FrameError::Decode { bytes, reason }) => {
                warn!(stream, reason, bytes = ?bytes, "frame discarded");
            }
            Err(FrameError::Transport(err)) => {
                error!(stream, error = %err, "transport failed, reader stopping");
                return Err(FrameError::Transport(err));
            }
        }
    }
}

/// Handles of one running stream.
#[derive(Debug)]
pub struct StreamPipeline {
    pub name: String,
    pub reader: JoinHandle<std::result::Result<ReaderStats, FrameError>>,
    pub processor: JoinHandle<Result<ProcessorStats>>,
}

/// Start a stream: a blocking reader task feeding a bounded queue of
/// `capacity` frames, drained by `processor` on the async runtime.
///
/// The reader drops its end of the queue when it stops, which lets the
/// processor finish once the remaining frames are handled.
pub fn spawn_stream<S, W>(
    mut reader: FrameReader<S>,
    read_timeout: Duration,
    processor: Processor<W>,
    capacity: usize,
    cancel: CancellationToken,
) -> StreamPipeline
where
    S: ByteSource + 'static,
    W: Write + Send + 'static,
{
    let name = processor.stream().to_string();
    let (tx, rx) = mpsc::channel(capacity);

    let reader = {
        let name = name.clone();
        let cancel = cancel.clone();
        tokio::task::spawn_blocking(move || {
            let result = reader
                .prepare(read_timeout)
                .and_then(|()| pump(&name, &mut reader, &tx, &cancel));
            drop(tx);
            reader.close();

            let stats = reader.stats();
            info!(
                stream = %name,
                frames = stats.frames,
                framing_errors = stats.framing_errors,
                resyncs = stats.resyncs,
                recovered = stats.recovered,
                discarded_bytes = stats.discarded_bytes,
                "reader finished"
            );
            result.map(|()| stats)
        })
    };

    let processor = tokio::spawn(processor.run(rx, cancel));

    StreamPipeline {
        name,
        reader,
        processor,
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use bytes::BytesMut;
    use sertel_frame::{encode_frame, FrameLayout, Packet, CHANNELS};
    use sertel_transport::{StreamSource, TransportError};

    use super::*;

    fn wire(sequences: impl IntoIterator<Item = u32>) -> Vec<u8> {
        let layout = FrameLayout::default();
        let mut buf = BytesMut::new();
        buf.extend_from_slice(b"\r\n");
        for sequence in sequences {
            let packet = Packet {
                sequence,
                timestamp: sequence * 10,
                readings: [sequence as f32; CHANNELS],
            };
            encode_frame(&packet, &layout, &mut buf);
        }
        buf.to_vec()
    }

    fn reader(bytes: Vec<u8>) -> FrameReader<StreamSource<Cursor<Vec<u8>>>> {
        FrameReader::new(StreamSource::new(Cursor::new(bytes)), FrameLayout::default())
    }

    #[test]
    fn pump_forwards_frames_and_reports_end_of_stream() {
        let mut reader = reader(wire(1..=3));
        let (tx, mut rx) = mpsc::channel(8);

        let err = pump("hv", &mut reader, &tx, &CancellationToken::new()).unwrap_err();
        assert!(matches!(err, FrameError::Transport(TransportError::Closed)));

        let mut sequences = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            sequences.push(sertel_frame::decode_packet(frame.payload()).unwrap().sequence);
        }
        assert_eq!(sequences, vec![1, 2, 3]);
    }

    #[test]
    fn pump_skips_framing_errors() {
        let mut bytes = wire(1..=3);
        // Damage the stop marker of frame 2.
        bytes[2 + 2 * 42 - 1] = b'x';
        let mut reader = reader(bytes);
        let (tx, mut rx) = mpsc::channel(8);

        let _ = pump("hv", &mut reader, &tx, &CancellationToken::new());

        let mut sequences = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            sequences.push(sertel_frame::decode_packet(frame.payload()).unwrap().sequence);
        }
        assert_eq!(sequences, vec![1, 3]);
        assert_eq!(reader.stats().framing_errors, 1);
    }

    #[test]
    fn pump_stops_when_consumer_is_gone() {
        let mut reader = reader(wire(1..=3));
        let (tx, rx) = mpsc::channel(8);
        drop(rx);

        assert!(pump("hv", &mut reader, &tx, &CancellationToken::new()).is_ok());
        assert_eq!(reader.stats().frames, 1);
    }

    #[test]
    fn pump_returns_on_cancel() {
        let mut reader = reader(wire(1..=3));
        let (tx, _rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();
        cancel.cancel();

        assert!(pump("hv", &mut reader, &tx, &cancel).is_ok());
    }
}
