mod common;

use std::time::{Duration, Instant};

use common::{packet, wait_for, wire, Collector, ScriptedSource, SharedLog, CONFIG};
use sertel_pipeline::{Calibration, Config, Orchestrator, StreamParts};

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn shutdown_with_full_queue_finishes_within_grace() {
    let config = Config::from_toml_str(CONFIG).unwrap();
    let packets: Vec<_> = (1..=500).map(|seq| packet(seq, seq * 10, 0.0)).collect();

    let raw = SharedLog::slow(Duration::from_millis(5));
    let calibrated = SharedLog::default();
    let hv = StreamParts {
        name: "hv".to_string(),
        source: ScriptedSource::new(wire(&packets), 4096),
        raw_log: raw.clone(),
        calibrated_log: calibrated.clone(),
        calibration: Calibration::identity(),
    };

    let orchestrator = Orchestrator::launch(&config, vec![hv], Collector::default()).unwrap();

    // The slow log keeps the queue full while the reader blocks on it.
    assert!(wait_for(Duration::from_secs(5), || raw.lines().len() >= 10).await);

    let started = Instant::now();
    let report = orchestrator.shutdown().await;
    assert!(started.elapsed() < config.shutdown.grace);
    assert!(!report.timed_out, "{report:?}");
    assert!(report.is_clean(), "{report:?}");

    let outcome = report.stream("hv").unwrap();
    let processor = outcome.processor.unwrap();
    let reader = outcome.reader.unwrap();

    assert!(processor.packets < 500);
    assert!(processor.drained_on_cancel <= config.frame.queue_capacity as u64);
    assert!(reader.frames >= processor.packets);
    assert_eq!(raw.lines().len() as u64, processor.packets);
    assert_eq!(calibrated.lines().len() as u64, processor.packets);

    // Per-stream order is preserved.
    let sequences: Vec<u32> = raw
        .lines()
        .iter()
        .map(|line| line.split(',').next().unwrap().parse().unwrap())
        .collect();
    assert!(sequences.windows(2).all(|w| w[1] == w[0] + 1));
    assert_eq!(sequences[0], 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn run_until_returns_after_signal() {
    let config = Config::from_toml_str(CONFIG).unwrap();
    let hv = StreamParts {
        name: "hv".to_string(),
        source: ScriptedSource::new(Vec::new(), 1),
        raw_log: SharedLog::default(),
        calibrated_log: SharedLog::default(),
        calibration: Calibration::identity(),
    };
    let collector = Collector::default();
    let orchestrator = Orchestrator::launch(&config, vec![hv], collector.clone()).unwrap();

    let report = orchestrator
        .run_until(tokio::time::sleep(Duration::from_millis(60)))
        .await;

    assert!(report.is_clean(), "{report:?}");
    assert!(report.sampler.unwrap().ticks >= 1);
    // Nothing published yet: zeros at the sampler start instant.
    assert!(collector.lines()[0].starts_with("pressurevals pt0=0.00,"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cancellation_token_stops_run_until() {
    let config = Config::from_toml_str(CONFIG).unwrap();
    let hv = StreamParts {
        name: "hv".to_string(),
        source: ScriptedSource::new(Vec::new(), 1),
        raw_log: SharedLog::default(),
        calibrated_log: SharedLog::default(),
        calibration: Calibration::identity(),
    };
    let orchestrator = Orchestrator::launch(&config, vec![hv], Collector::default()).unwrap();
    let token = orchestrator.cancellation_token();

    let task = tokio::spawn(orchestrator.run_until(std::future::pending::<()>()));
    token.cancel();
    let report = task.await.unwrap();
    assert!(!report.timed_out);
}
