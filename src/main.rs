//! Weather Gateway: binary entrypoint.
//! Reads `<topic> <payload>` lines on stdin, aggregates them and reports
//! periodically to an Ecowitt-compatible receiver.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::watch;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use weather_gateway::config::load_config_default;
use weather_gateway::engine::{Engine, EngineSnapshot};
use weather_gateway::ingest::lines::LineSource;
use weather_gateway::ingest::scheduler::spawn_engine_loop;
use weather_gateway::ingest::{event_queue, pump, TopicRouter};
use weather_gateway::metrics::Metrics;
use weather_gateway::report::ecowitt::EcowittReporter;
use weather_gateway::report::spawn_report_task;
use weather_gateway::store::StateStore;
use weather_gateway::{create_router, AppState};

/// Logs go to stderr so stdin/stdout stay free for the line transport.
/// `GATEWAY_LOG_JSON=1` switches to JSON lines.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("weather_gateway=info,warn"));

    let json = std::env::var("GATEWAY_LOG_JSON")
        .ok()
        .is_some_and(|v| v == "1");

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().compact().with_writer(std::io::stderr))
            .init();
    }
}

#[cfg(unix)]
async fn terminate_signal() {
    use tokio::signal::unix::{signal, SignalKind};
    match signal(SignalKind::terminate()) {
        Ok(mut s) => {
            s.recv().await;
        }
        Err(e) => {
            tracing::warn!("cannot listen for SIGTERM: {e}");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn terminate_signal() {
    std::future::pending::<()>().await;
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = load_config_default().context("loading gateway config")?;
    tracing::info!(
        sensors = cfg.sensors.len(),
        tick_ms = cfg.engine.tick_ms,
        report = cfg.report.enabled,
        "gateway starting"
    );

    let metrics = match Metrics::init() {
        Ok(m) => Some(m),
        Err(e) => {
            tracing::warn!("metrics disabled: {e:#}");
            None
        }
    };

    let store = StateStore::new(&cfg.engine.state_path);
    let record = store.load().await;
    let engine = Engine::from_config(&cfg, record);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (snap_tx, snap_rx) = watch::channel(Arc::new(EngineSnapshot::default()));
    let (sender, rx) = event_queue(cfg.engine.queue_capacity);

    let engine_task = spawn_engine_loop(
        engine,
        rx,
        snap_tx,
        Duration::from_millis(cfg.engine.tick_ms),
        shutdown_rx.clone(),
    );

    let router = TopicRouter::from_sensors(&cfg.sensors);
    if router.is_empty() {
        tracing::warn!("no sensor topics configured; input will be ignored");
    }
    let pump_task = tokio::spawn(async move {
        let mut source = LineSource::stdin();
        pump(&mut source, &router, &sender).await
    });

    let report_task = if cfg.report.enabled {
        let reporter = EcowittReporter::from_config(&cfg.report);
        tracing::info!(url = reporter.url(), every_secs = cfg.report.interval_secs, "reporting enabled");
        Some(spawn_report_task(
            reporter,
            snap_rx.clone(),
            Duration::from_secs(cfg.report.interval_secs),
            shutdown_rx.clone(),
        ))
    } else {
        None
    };

    let api_task = match cfg.api.listen.as_deref() {
        Some(addr) => {
            let listener = tokio::net::TcpListener::bind(addr)
                .await
                .with_context(|| format!("binding API listener on {addr}"))?;
            tracing::info!(%addr, "API listening");
            let mut state = AppState::new(snap_rx.clone());
            if let Some(m) = &metrics {
                state = state.with_metrics(m.handle.clone());
            }
            let app = create_router(state);
            let mut stop = shutdown_rx.clone();
            Some(tokio::spawn(async move {
                let res = axum::serve(listener, app)
                    .with_graceful_shutdown(async move {
                        let _ = stop.wait_for(|v| *v).await;
                    })
                    .await;
                if let Err(e) = res {
                    tracing::error!("API server failed: {e}");
                }
            }))
        }
        None => None,
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => tracing::info!("interrupt received"),
        _ = terminate_signal() => tracing::info!("terminate received"),
    }
    let _ = shutdown_tx.send(true);
    pump_task.abort();

    let engine = engine_task.await.context("aggregation loop panicked")?;
    if let Err(e) = store.save(&engine.record()).await {
        tracing::error!("cannot persist history: {e:#}");
    }

    if let Some(t) = report_task {
        let _ = t.await;
    }
    if let Some(t) = api_task {
        let _ = t.await;
    }
    tracing::info!("gateway stopped");
    // The blocking stdin read cannot be cancelled and would hold the
    // runtime open until the next line arrives.
    std::process::exit(0)
}
