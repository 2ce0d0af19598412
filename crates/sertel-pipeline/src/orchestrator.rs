//! Startup wiring and coordinated shutdown.

use std::fs::{File, OpenOptions};
use std::future::Future;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use sertel_frame::{FrameReader, ReaderStats};
use sertel_transport::{ByteSource, DatagramSink};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::calibration::Calibration;
use crate::config::Config;
use crate::error::{PipelineError, Result};
use crate::processor::{Processor, ProcessorStats};
use crate::sampler::{Sampler, SamplerStats};
use crate::store::SampleStore;
use crate::stream::{spawn_stream, StreamPipeline};

/// Everything one stream needs from the outside world.
#[derive(Debug)]
pub struct StreamParts<S, W> {
    pub name: String,
    pub source: S,
    pub raw_log: W,
    pub calibrated_log: W,
    pub calibration: Calibration,
}

/// Final state of one stream after shutdown.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamOutcome {
    pub name: String,
    pub reader: Option<ReaderStats>,
    pub processor: Option<ProcessorStats>,
    pub errors: Vec<String>,
}

/// Result of [`Orchestrator::shutdown`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShutdownReport {
    pub streams: Vec<StreamOutcome>,
    pub sampler: Option<SamplerStats>,
    /// Some tasks were still running when the grace period ran out.
    pub timed_out: bool,
}

impl ShutdownReport {
    /// Every task finished in time and without error.
    pub fn is_clean(&self) -> bool {
        !self.timed_out
            && self.sampler.is_some()
            && self
                .streams
                .iter()
                .all(|s| s.errors.is_empty() && s.reader.is_some() && s.processor.is_some())
    }

    pub fn stream(&self, name: &str) -> Option<&StreamOutcome> {
        self.streams.iter().find(|s| s.name == name)
    }
}

/// Owns every running task of a pipeline.
#[derive(Debug)]
pub struct Orchestrator {
    cancel: CancellationToken,
    streams: Vec<StreamPipeline>,
    stores: Vec<Arc<SampleStore>>,
    sampler: JoinHandle<SamplerStats>,
    grace: Duration,
}

impl Orchestrator {
    /// Open every log and serial port named in `config`, connect to the
    /// collector, and start all tasks.
    ///
    /// Any open failure aborts startup before a task is spawned.
    #[cfg(feature = "serial")]
    pub async fn start(config: &Config) -> Result<Self> {
        use sertel_transport::{connect_collector, SerialSource};

        let mut parts = Vec::with_capacity(config.streams.len());
        for stream in &config.streams {
            let raw_log = open_log(&stream.raw_log)?;
            let calibrated_log = open_log(&stream.calibrated_log)?;
            let source = SerialSource::open(&stream.port, stream.baud_rate)?;
            parts.push(StreamParts {
                name: stream.name.clone(),
                source,
                raw_log,
                calibrated_log,
                calibration: stream.calibration()?,
            });
        }

        let sink = connect_collector(config.sampler.collector).await?;
        Self::launch(config, parts, sink)
    }

    /// Start all tasks over already-opened parts.
    ///
    /// `parts` are exported in the order given. Must be called from within a
    /// tokio runtime.
    pub fn launch<S, W, D>(config: &Config, parts: Vec<StreamParts<S, W>>, sink: D) -> Result<Self>
    where
        S: ByteSource + 'static,
        W: Write + Send + 'static,
        D: DatagramSink + 'static,
    {
        let layout = config.layout()?;
        let cancel = CancellationToken::new();
        let mut streams = Vec::with_capacity(parts.len());
        let mut stores = Vec::with_capacity(parts.len());

        for part in parts {
            let store = Arc::new(SampleStore::new());
            let processor = Processor::new(
                part.name,
                part.calibration,
                Arc::clone(&store),
                part.raw_log,
                part.calibrated_log,
            );
            let reader = FrameReader::new(part.source, layout.clone());
            info!(stream = processor.stream(), "starting stream");
            streams.push(spawn_stream(
                reader,
                config.frame.read_timeout,
                processor,
                config.frame.queue_capacity,
                cancel.clone(),
            ));
            stores.push(store);
        }

        let sampler = Sampler::new(
            config.sampler.metric.clone(),
            config.sampler.interval,
            stores.clone(),
            sink,
        );
        let sampler = tokio::spawn(sampler.run(cancel.clone()));

        Ok(Self {
            cancel,
            streams,
            stores,
            sampler,
            grace: config.shutdown.grace,
        })
    }

    /// Token shared by every task; cancelling it begins shutdown.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stores in export order.
    pub fn stores(&self) -> &[Arc<SampleStore>] {
        &self.stores
    }

    /// Run until `signal` completes or the token is cancelled, then shut down.
    pub async fn run_until<F>(self, signal: F) -> ShutdownReport
    where
        F: Future<Output = ()>,
    {
        tokio::select! {
            _ = signal => info!("shutdown requested"),
            _ = self.cancel.cancelled() => info!("cancellation requested"),
        }
        self.shutdown().await
    }

    /// Cancel every task and wait up to the grace period for them.
    pub async fn shutdown(self) -> ShutdownReport {
        self.cancel.cancel();

        let mut report = ShutdownReport {
            streams: self
                .streams
                .iter()
                .map(|s| StreamOutcome {
                    name: s.name.clone(),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        };

        let joined = tokio::time::timeout(
            self.grace,
            collect(self.streams, self.sampler, &mut report),
        )
        .await;
        if joined.is_err() {
            report.timed_out = true;
            warn!(grace = ?self.grace, "tasks still running after grace period");
        }

        info!(clean = report.is_clean(), "shutdown complete");
        report
    }
}

async fn collect(
    streams: Vec<StreamPipeline>,
    sampler: JoinHandle<SamplerStats>,
    report: &mut ShutdownReport,
) {
    for (pipeline, outcome) in streams.into_iter().zip(report.streams.iter_mut()) {
        match pipeline.reader.await {
            Ok(Ok(stats)) => outcome.reader = Some(stats),
            Ok(Err(err)) => outcome.errors.push(format!("reader: {err}")),
            Err(err) => {
                error!(stream = %outcome.name, error = %err, "reader task failed");
                outcome.errors.push(format!("reader task: {err}"));
            }
        }
        match pipeline.processor.await {
            Ok(Ok(stats)) => outcome.processor = Some(stats),
            Ok(Err(err)) => outcome.errors.push(format!("processor: {err}")),
            Err(err) => {
                error!(stream = %outcome.name, error = %err, "processor task failed");
                outcome.errors.push(format!("processor task: {err}"));
            }
        }
    }

    match sampler.await {
        Ok(stats) => report.sampler = Some(stats),
        Err(err) => error!(error = %err, "sampler task failed"),
    }
}

/// Buffered append-only log file.
///
/// `flush` empties the buffer and then syncs the file data to disk.
#[derive(Debug)]
pub struct LogFile {
    inner: BufWriter<File>,
}

impl Write for LogFile {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()?;
        self.inner.get_ref().sync_data()
    }
}

/// Open a log for appending, creating it if absent.
pub fn open_log(path: &Path) -> Result<LogFile> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| PipelineError::OpenLog {
            path: path.to_path_buf(),
            source,
        })?;
    info!(path = %path.display(), "opened log");
    Ok(LogFile {
        inner: BufWriter::new(file),
    })
}
