use anyhow::Result;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use dp_api_datasource::app_state::build_app_state;
use dp_api_datasource::core::settings::env_loader::load_from_env;
use dp_api_datasource::routes::app_router;

const LOG_FILE_PREFIX: &str = "dp-api-datasource.log";

/// Console logging, plus a daily file under `log_dir` when set.
fn init_tracing(log_dir: Option<&str>) -> Option<WorkerGuard> {
    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dp_api_datasource=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .init();

    guard
}

async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        return;
    }
    info!("Received Ctrl+C, shutting down...");
}

#[tokio::main]
async fn main() -> Result<()> {
    let settings = load_from_env()?;
    let _guard = init_tracing(settings.log_dir.as_deref());

    info!(
        url = %settings.datasource.url,
        root = %settings.datasource.root_url(),
        resolution = settings.datasource.resolution.as_code(),
        "Starting data provider API datasource"
    );

    let state = build_app_state(settings.datasource);
    let app = app_router().with_state(state);

    let listener = TcpListener::bind(&settings.bind_addr).await?;
    info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}
