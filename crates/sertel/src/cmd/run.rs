use sertel_pipeline::Orchestrator;
use tracing::info;

use crate::cmd::{load_config, RunArgs};
use crate::exit::{io_error, pipeline_error, CliResult, FAILURE, SUCCESS};
use crate::output::{print_shutdown_report, OutputFormat};

pub fn run(args: RunArgs, format: OutputFormat) -> CliResult<i32> {
    let config = load_config(&args.config)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| io_error("runtime setup failed", err))?;

    let report = runtime.block_on(async {
        let orchestrator = Orchestrator::start(&config)
            .await
            .map_err(|err| pipeline_error("startup failed", err))?;
        info!(
            streams = config.streams.len(),
            collector = %config.sampler.collector,
            "pipeline running"
        );
        Ok::<_, crate::exit::CliError>(orchestrator.run_until(shutdown_signal()).await)
    })?;

    // Blocking readers that missed the grace period must not hold the process.
    runtime.shutdown_background();

    print_shutdown_report(&report, format);
    let failed = report.streams.iter().any(|s| !s.errors.is_empty());
    Ok(if failed { FAILURE } else { SUCCESS })
}

/// Resolves on SIGINT or, on unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %err, "ctrl-c handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                tracing::warn!(error = %err, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT"),
        _ = terminate => info!("received SIGTERM"),
    }
}
