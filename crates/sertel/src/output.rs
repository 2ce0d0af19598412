use std::io::IsTerminal;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use sertel_frame::{Packet, ReaderStats};
use sertel_pipeline::{Config, ShutdownReport};

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

fn new_table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    table
}

fn format_values(values: &[f32]) -> String {
    values
        .iter()
        .map(|v| format!("{v:.2}"))
        .collect::<Vec<_>>()
        .join(",")
}

#[derive(Serialize)]
struct StreamSummary<'a> {
    name: &'a str,
    port: &'a str,
    baud_rate: u32,
    raw_log: String,
    calibrated_log: String,
    scale: &'a [f32],
    offset: &'a [f32],
}

#[derive(Serialize)]
struct ConfigSummary<'a> {
    valid: bool,
    frame_size: usize,
    stop_marker: &'a [u8],
    queue_capacity: usize,
    read_timeout_ms: u128,
    sampler_interval_ms: u128,
    collector: String,
    metric: &'a str,
    shutdown_grace_ms: u128,
    streams: Vec<StreamSummary<'a>>,
}

pub fn print_config_summary(config: &Config, format: OutputFormat) {
    let summary = ConfigSummary {
        valid: true,
        frame_size: config.frame.size,
        stop_marker: &config.frame.stop_marker,
        queue_capacity: config.frame.queue_capacity,
        read_timeout_ms: config.frame.read_timeout.as_millis(),
        sampler_interval_ms: config.sampler.interval.as_millis(),
        collector: config.sampler.collector.to_string(),
        metric: &config.sampler.metric,
        shutdown_grace_ms: config.shutdown.grace.as_millis(),
        streams: config
            .streams
            .iter()
            .map(|s| StreamSummary {
                name: &s.name,
                port: &s.port,
                baud_rate: s.baud_rate,
                raw_log: s.raw_log.display().to_string(),
                calibrated_log: s.calibrated_log.display().to_string(),
                scale: &s.scale,
                offset: &s.offset,
            })
            .collect(),
    };

    match format {
        OutputFormat::Json => print_json(&summary),
        OutputFormat::Table => {
            let mut table = new_table(vec!["STREAM", "PORT", "BAUD", "RAW LOG", "CALIBRATED LOG"]);
            for s in &summary.streams {
                table.add_row(vec![
                    s.name.to_string(),
                    s.port.to_string(),
                    s.baud_rate.to_string(),
                    s.raw_log.clone(),
                    s.calibrated_log.clone(),
                ]);
            }
            println!(
                "frame {} bytes, marker {:02x?}, queue {}; export {} every {}ms to {}",
                summary.frame_size,
                summary.stop_marker,
                summary.queue_capacity,
                summary.metric,
                summary.sampler_interval_ms,
                summary.collector
            );
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "config ok: frame={} marker={:02x?} queue={} interval={}ms collector={} metric={} grace={}ms",
                summary.frame_size,
                summary.stop_marker,
                summary.queue_capacity,
                summary.sampler_interval_ms,
                summary.collector,
                summary.metric,
                summary.shutdown_grace_ms
            );
            for s in &summary.streams {
                println!(
                    "stream={} port={} baud={} raw_log={} calibrated_log={}",
                    s.name, s.port, s.baud_rate, s.raw_log, s.calibrated_log
                );
            }
        }
    }
}

/// One event produced while replaying a capture.
#[derive(Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DecodeEvent<'a> {
    Packet {
        stream: &'a str,
        sequence: u32,
        timestamp: u32,
        calibrated: bool,
        readings: Vec<f32>,
    },
    FramingError {
        stream: &'a str,
        len: usize,
        bytes: String,
    },
    DecodeError {
        stream: &'a str,
        reason: &'a str,
        bytes: String,
    },
}

impl<'a> DecodeEvent<'a> {
    pub fn packet(stream: &'a str, packet: &Packet, readings: &[f32], calibrated: bool) -> Self {
        Self::Packet {
            stream,
            sequence: packet.sequence,
            timestamp: packet.timestamp,
            calibrated,
            readings: readings.to_vec(),
        }
    }
}

pub fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Prints decode events as they arrive; table output is buffered until
/// [`DecodePrinter::finish`].
pub struct DecodePrinter {
    format: OutputFormat,
    table: Option<Table>,
}

impl DecodePrinter {
    pub fn new(format: OutputFormat) -> Self {
        let table = matches!(format, OutputFormat::Table)
            .then(|| new_table(vec!["EVENT", "SEQ", "TIMESTAMP", "VALUES"]));
        Self { format, table }
    }

    pub fn print(&mut self, event: &DecodeEvent<'_>) {
        match (self.format, &mut self.table) {
            (OutputFormat::Json, _) => print_json(event),
            (OutputFormat::Table, Some(table)) => {
                table.add_row(match event {
                    DecodeEvent::Packet {
                        sequence,
                        timestamp,
                        readings,
                        ..
                    } => vec![
                        "packet".to_string(),
                        sequence.to_string(),
                        timestamp.to_string(),
                        format_values(readings),
                    ],
                    DecodeEvent::FramingError { len, .. } => vec![
                        "framing error".to_string(),
                        String::new(),
                        String::new(),
                        format!("{len} bytes discarded"),
                    ],
                    DecodeEvent::DecodeError { reason, .. } => vec![
                        "decode error".to_string(),
                        String::new(),
                        String::new(),
                        reason.to_string(),
                    ],
                });
            }
            (_, _) => match event {
                DecodeEvent::Packet {
                    stream,
                    sequence,
                    timestamp,
                    readings,
                    ..
                } => println!(
                    "stream={stream} seq={sequence} ts={timestamp} values={}",
                    format_values(readings)
                ),
                DecodeEvent::FramingError { stream, len, bytes } => {
                    println!("stream={stream} framing_error len={len} bytes={bytes}")
                }
                DecodeEvent::DecodeError {
                    stream,
                    reason,
                    bytes,
                } => println!("stream={stream} decode_error reason={reason:?} bytes={bytes}"),
            },
        }
    }

    pub fn finish(self, stats: &ReaderStats) {
        #[derive(Serialize)]
        struct Summary {
            event: &'static str,
            frames: u64,
            framing_errors: u64,
            resyncs: u64,
            recovered: u64,
            discarded_bytes: u64,
        }

        let summary = Summary {
            event: "summary",
            frames: stats.frames,
            framing_errors: stats.framing_errors,
            resyncs: stats.resyncs,
            recovered: stats.recovered,
            discarded_bytes: stats.discarded_bytes,
        };

        match self.format {
            OutputFormat::Json => print_json(&summary),
            OutputFormat::Table | OutputFormat::Pretty => {
                if let Some(table) = self.table {
                    println!("{table}");
                }
                println!(
                    "frames={} framing_errors={} resyncs={} recovered={} discarded_bytes={}",
                    summary.frames,
                    summary.framing_errors,
                    summary.resyncs,
                    summary.recovered,
                    summary.discarded_bytes
                );
            }
        }
    }
}

#[derive(Serialize)]
struct StreamReportOutput<'a> {
    name: &'a str,
    frames: Option<u64>,
    framing_errors: Option<u64>,
    packets: Option<u64>,
    decode_errors: Option<u64>,
    drained_on_cancel: Option<u64>,
    errors: &'a [String],
}

#[derive(Serialize)]
struct ShutdownOutput<'a> {
    clean: bool,
    timed_out: bool,
    exports_sent: Option<u64>,
    export_errors: Option<u64>,
    streams: Vec<StreamReportOutput<'a>>,
}

pub fn print_shutdown_report(report: &ShutdownReport, format: OutputFormat) {
    let out = ShutdownOutput {
        clean: report.is_clean(),
        timed_out: report.timed_out,
        exports_sent: report.sampler.map(|s| s.sent),
        export_errors: report.sampler.map(|s| s.send_errors),
        streams: report
            .streams
            .iter()
            .map(|s| StreamReportOutput {
                name: &s.name,
                frames: s.reader.map(|r| r.frames),
                framing_errors: s.reader.map(|r| r.framing_errors),
                packets: s.processor.map(|p| p.packets),
                decode_errors: s.processor.map(|p| p.decode_errors),
                drained_on_cancel: s.processor.map(|p| p.drained_on_cancel),
                errors: &s.errors,
            })
            .collect(),
    };

    let show = |v: Option<u64>| v.map_or_else(|| "-".to_string(), |v| v.to_string());

    match format {
        OutputFormat::Json => print_json(&out),
        OutputFormat::Table => {
            let mut table = new_table(vec![
                "STREAM", "FRAMES", "FRAMING ERRORS", "PACKETS", "DECODE ERRORS", "DRAINED", "ERRORS",
            ]);
            for s in &out.streams {
                table.add_row(vec![
                    s.name.to_string(),
                    show(s.frames),
                    show(s.framing_errors),
                    show(s.packets),
                    show(s.decode_errors),
                    show(s.drained_on_cancel),
                    s.errors.join("; "),
                ]);
            }
            println!("{table}");
            println!(
                "exports sent={} failed={} timed_out={}",
                show(out.exports_sent),
                show(out.export_errors),
                out.timed_out
            );
        }
        OutputFormat::Pretty => {
            for s in &out.streams {
                println!(
                    "stream={} frames={} framing_errors={} packets={} decode_errors={} drained={} errors={:?}",
                    s.name,
                    show(s.frames),
                    show(s.framing_errors),
                    show(s.packets),
                    show(s.decode_errors),
                    show(s.drained_on_cancel),
                    s.errors
                );
            }
            println!(
                "exports sent={} failed={} timed_out={}",
                show(out.exports_sent),
                show(out.export_errors),
                out.timed_out
            );
        }
    }
}
