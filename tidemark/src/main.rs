use std::collections::HashMap;
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tidemark_core::metrics::CollectorMetrics;
use tidemark_core::poll::{PollLoop, PollTask};
use tidemark_core::sink::StdoutSink;
use tidemark_core::vendor::{bitsight, google_reports, harfanglab};
use tidemark_core::watermark::WatermarkStore;
use tidemark_shared::kv::file::FileKVStore;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

mod cmdline;
mod setup_tracing;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    setup_tracing::register();

    if let Err(e) = run().await {
        error!("{e}");
        return Err(e);
    }
    info!("Exiting...");

    Ok(())
}

async fn run() -> Result<(), Box<dyn Error>> {
    let matches = cmdline::root_cli().get_matches();
    let Some(("collect", args)) = matches.subcommand() else {
        return Err("Unknown command".into());
    };
    let vendor = args
        .get_one::<String>("vendor")
        .ok_or("Vendor is required")?;
    let data_path = args
        .get_one::<PathBuf>("data-path")
        .ok_or("--data-path is required")?;
    let instance = args
        .get_one::<String>("instance")
        .map_or("default", String::as_str);

    let env_vars: HashMap<String, String> = std::env::vars().collect();
    let kv = FileKVStore::open("watermarks", data_path).await?;
    let store = WatermarkStore::new(Arc::new(kv));
    let sink = StdoutSink::new();

    let cln_token = CancellationToken::new();
    let shutdown_cln_token = cln_token.clone();
    // wait for SIG{INT,TERM} and invoke cancellation token.
    let shutdown_handle = tokio::spawn(async move {
        shutdown_signal().await;
        shutdown_cln_token.cancel();
    });

    info!(vendor = %vendor, instance, data_path = %data_path.display(), "Starting collector");
    let result = match vendor.as_str() {
        harfanglab::NAME => {
            let (collector, config) = harfanglab::collector(&env_vars, instance, store, sink)?;
            let metrics = collector.metrics().clone();
            poll(collector, config.frequency, metrics, cln_token).await
        }
        google_reports::NAME => {
            let (collector, config) =
                google_reports::collector(&env_vars, instance, store, sink)?;
            let metrics = collector.metrics().clone();
            poll(collector, config.frequency, metrics, cln_token).await
        }
        bitsight::NAME => {
            let (collector, config) = bitsight::collector(&env_vars, store, sink)?;
            let metrics = collector.metrics().clone();
            poll(collector, config.frequency, metrics, cln_token).await
        }
        other => Err(format!("Unknown vendor {other}").into()),
    };

    if !shutdown_handle.is_finished() {
        shutdown_handle.abort();
    }
    result
}

async fn poll<T: PollTask>(
    task: T,
    frequency: Duration,
    metrics: CollectorMetrics,
    cln_token: CancellationToken,
) -> Result<(), Box<dyn Error>> {
    let result = PollLoop::new(task, frequency, cln_token)
        .with_metrics(metrics.clone())
        .run()
        .await;

    match metrics.encode() {
        Ok(exposition) => debug!(%exposition, "Collector metrics"),
        Err(e) => warn!(error = %e, "Failed to encode collector metrics"),
    }
    info!(
        incoming = metrics.incoming_total(),
        forwarded = metrics.forwarded_total(),
        "Collector stopped"
    );
    result?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C signal"),
            Err(e) => {
                error!(error = %e, "Failed to install Ctrl+C handler");
                std::future::pending::<()>().await;
            }
        }
    };

    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut terminate) => {
                terminate.recv().await;
                info!("Received terminate signal");
            }
            Err(e) => {
                error!(error = %e, "Failed to install terminate handler");
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
