//! Periodic cross-stream export.
//!
//! Every tick the sampler reads all stores in configuration order, joins
//! their readings into one line-protocol record and sends it to the
//! collector:
//!
//! ```text
//! pressurevals pt0=1.00,pt1=2.00,...,pt15=16.00 1717000000000000000
//! ```
//!
//! The trailing instant (ns since epoch) advances with the board clock of
//! the last stream, anchored to the wall time at which the sampler started.

use std::io;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use sertel_transport::DatagramSink;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{PipelineError, Result};
use crate::store::SampleStore;

const NANOS_PER_MILLI: i64 = 1_000_000;

/// Format one export record.
///
/// Fields are labelled `pt0..ptN` in the order given, two decimals each.
pub fn format_line(metric: &str, values: &[f32], instant_ns: i64) -> String {
    let fields: Vec<String> = values
        .iter()
        .enumerate()
        .map(|(index, value)| format!("pt{index}={value:.2}"))
        .collect();
    if fields.is_empty() {
        format!("{metric} {instant_ns}")
    } else {
        format!("{metric} {} {instant_ns}", fields.join(","))
    }
}

/// Send `buf` completely, re-sending the unsent remainder after a partial
/// acceptance.
pub async fn send_all<D: DatagramSink + ?Sized>(sink: &D, mut buf: &[u8]) -> io::Result<()> {
    while !buf.is_empty() {
        let sent = sink.send(buf).await?;
        if sent == 0 {
            return Err(io::Error::new(
                io::ErrorKind::WriteZero,
                "collector accepted zero bytes",
            ));
        }
        buf = &buf[sent.min(buf.len())..];
    }
    Ok(())
}

/// Reference point mapping board milliseconds to wall-clock nanoseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplerAnchor {
    /// Board timestamp of the last stream when the anchor was taken.
    pub board_ms: u32,
    /// Wall-clock time (ns since epoch) the sampler started.
    pub start_ns: i64,
}

impl SamplerAnchor {
    /// Wall-clock instant for a board timestamp.
    pub fn instant(&self, board_ms: u32) -> i64 {
        let delta_ms = i64::from(board_ms) - i64::from(self.board_ms);
        self.start_ns.saturating_add(delta_ms.saturating_mul(NANOS_PER_MILLI))
    }
}

/// One combined snapshot of all stores.
#[derive(Debug, Clone, PartialEq)]
pub struct Export {
    pub values: Vec<f32>,
    pub instant_ns: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SamplerStats {
    pub ticks: u64,
    pub sent: u64,
    pub send_errors: u64,
}

/// Periodic exporter over an ordered set of stores.
pub struct Sampler<D> {
    metric: String,
    interval: Duration,
    stores: Vec<Arc<SampleStore>>,
    sink: D,
    start_ns: i64,
    anchor: Option<SamplerAnchor>,
    stats: SamplerStats,
}

impl<D: DatagramSink> Sampler<D> {
    /// The start instant is the current wall-clock time.
    pub fn new(
        metric: impl Into<String>,
        interval: Duration,
        stores: Vec<Arc<SampleStore>>,
        sink: D,
    ) -> Self {
        Self {
            metric: metric.into(),
            interval,
            stores,
            sink,
            start_ns: now_unix_nanos(),
            anchor: None,
            stats: SamplerStats::default(),
        }
    }

    /// Override the start instant.
    pub fn with_start_ns(mut self, start_ns: i64) -> Self {
        self.start_ns = start_ns;
        self
    }

    pub fn anchor(&self) -> Option<SamplerAnchor> {
        self.anchor
    }

    pub fn stats(&self) -> SamplerStats {
        self.stats
    }

    pub fn sink(&self) -> &D {
        &self.sink
    }

    /// Read all stores and compute the export instant.
    ///
    /// The anchor is taken from the last store the first time it has been
    /// written; until then the instant is the start time.
    pub fn sample(&mut self) -> Export {
        let mut values = Vec::with_capacity(self.stores.len() * sertel_frame::CHANNELS);
        let mut last = None;
        for store in &self.stores {
            let sample = store.read();
            values.extend_from_slice(&sample.readings);
            last = Some(sample);
        }

        let instant_ns = match (self.anchor, last) {
            (Some(anchor), Some(sample)) => anchor.instant(sample.timestamp),
            (None, Some(sample)) if sample.is_populated() => {
                let anchor = SamplerAnchor {
                    board_ms: sample.timestamp,
                    start_ns: self.start_ns,
                };
                debug!(board_ms = anchor.board_ms, start_ns = anchor.start_ns, "export clock anchored");
                self.anchor = Some(anchor);
                anchor.start_ns
            }
            _ => self.start_ns,
        };

        Export { values, instant_ns }
    }

    /// One export tick: sample, format and send.
    pub async fn tick(&mut self) -> Result<String> {
        self.stats.ticks += 1;
        let export = self.sample();
        let line = format_line(&self.metric, &export.values, export.instant_ns);
        match send_all(&self.sink, line.as_bytes()).await {
            Ok(()) => {
                self.stats.sent += 1;
                Ok(line)
            }
            Err(err) => {
                self.stats.send_errors += 1;
                Err(PipelineError::Export(err))
            }
        }
    }

    /// Export every interval until `cancel` fires.
    ///
    /// Missed ticks are skipped rather than bursted. A failed send is
    /// logged and the next tick proceeds normally.
    pub async fn run(mut self, cancel: CancellationToken) -> SamplerStats {
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(err) = self.tick().await {
                        warn!(error = %err, "export tick failed");
                    }
                }
            }
        }

        info!(
            ticks = self.stats.ticks,
            sent = self.stats.sent,
            send_errors = self.stats.send_errors,
            "sampler finished"
        );
        self.stats
    }
}

impl<D> std::fmt::Debug for Sampler<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sampler")
            .field("metric", &self.metric)
            .field("interval", &self.interval)
            .field("stores", &self.stores.len())
            .field("anchor", &self.anchor)
            .finish_non_exhaustive()
    }
}

fn now_unix_nanos() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_nanos()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}
