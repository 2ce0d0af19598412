use std::fs::File;
use std::io::BufReader;

use sertel_frame::{decode_packet, FrameError, FrameReader};
use sertel_pipeline::Calibration;
use sertel_transport::{StreamSource, TransportError};
use tokio_util::sync::CancellationToken;

use crate::cmd::{load_config, DecodeArgs};
use crate::exit::{config_error, frame_error, io_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{hex, DecodeEvent, DecodePrinter, OutputFormat};

pub fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    let config = load_config(&args.config)?;
    let stream = config.stream(&args.stream).ok_or_else(|| {
        CliError::new(
            USAGE,
            format!("stream {:?} is not defined in {}", args.stream, args.config.display()),
        )
    })?;
    let calibration = if args.raw {
        Calibration::identity()
    } else {
        stream
            .calibration()
            .map_err(|err| config_error("cannot use configuration", err))?
    };
    let layout = config
        .layout()
        .map_err(|err| config_error("cannot use configuration", err))?;

    let capture = File::open(&args.capture)
        .map_err(|err| io_error(&format!("cannot open {}", args.capture.display()), err))?;
    let mut reader = FrameReader::new(StreamSource::new(BufReader::new(capture)), layout);
    let never = CancellationToken::new();
    let mut printer = DecodePrinter::new(format);
    let name = stream.name.as_str();

    loop {
        match reader.read_frame(&never) {
            Ok(Some(frame)) => match decode_packet(frame.payload()) {
                Ok(packet) => {
                    let readings = calibration.apply(&packet.readings);
                    printer.print(&DecodeEvent::packet(name, &packet, &readings, !args.raw));
                }
                Err(FrameError::Decode { bytes, reason }) => {
                    printer.print(&DecodeEvent::DecodeError {
                        stream: name,
                        reason,
                        bytes: hex(&bytes),
                    });
                }
                Err(err) => return Err(frame_error("decode failed", err)),
            },
            Ok(None) | Err(FrameError::Transport(TransportError::Closed)) => break,
            Err(FrameError::Framing { bytes }) => {
                printer.print(&DecodeEvent::FramingError {
                    stream: name,
                    len: bytes.len(),
                    bytes: hex(&bytes),
                });
            }
            Err(err) => return Err(frame_error("capture read failed", err)),
        }
    }

    printer.finish(&reader.stats());
    Ok(SUCCESS)
}
