//! Waypost server binary

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use waypost::config::AppConfig;
use waypost::{build_router, metrics, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load().context("Failed to load configuration")?;
    init_tracing(&config);
    metrics::init_metrics();

    tracing::info!(
        domain = %config.server.domain,
        database = %config.database.path.display(),
        "Starting waypost"
    );

    let state = AppState::new(config).await?;

    if state.config.federation.reconcile_enabled {
        spawn_reconcile_task(&state);
    }

    let addr = format!(
        "{}:{}",
        state.config.server.host, state.config.server.port
    );
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!(addr = %listener.local_addr()?, "Listening");

    let app = build_router(state);
    axum::serve(listener, app).await?;

    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if config.logging.format == "json" {
        builder.json().init();
    } else {
        builder.pretty().init();
    }
}

/// Periodically re-dispatch activities whose side effects failed against a
/// remote server.
fn spawn_reconcile_task(state: &AppState) {
    let inbox = state.inbox.clone();
    let interval = std::time::Duration::from_secs(state.config.federation.reconcile_interval_seconds);
    let batch_size = state.config.federation.reconcile_batch_size;

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The first tick fires immediately; nothing can be pending yet.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            match inbox.process_pending(batch_size).await {
                Ok(0) => {}
                Ok(count) => tracing::info!(count, "Reconciled pending activities"),
                Err(e) => tracing::error!(error = %e, "Reconciliation pass failed"),
            }
        }
    });
}
