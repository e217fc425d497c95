use std::env;
use std::path::PathBuf;

use anyhow::anyhow;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use kokoro_serve::{ServerConfig, routes, state::AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,kokoro_serve=debug")),
        )
        .init();

    // Handle CLI arguments
    let mut config_path: Option<PathBuf> = None;
    let mut args = env::args();
    let _ = args.next();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-c" | "--config" => {
                let path = args
                    .next()
                    .ok_or_else(|| anyhow!("--config requires a file path"))?;
                config_path = Some(PathBuf::from(path));
            }
            other => {
                anyhow::bail!("Unknown argument '{other}'. Usage: kokoro-serve [-c|--config <file>]");
            }
        }
    }

    // Load configuration
    let config = match &config_path {
        Some(path) => ServerConfig::from_file(path),
        None => ServerConfig::from_env(),
    }
    .map_err(|e| anyhow!(e.to_string()))?;
    let address = config.address();
    let warmup = config.warmup_on_startup;
    let default_voice = config.default_voice.clone();

    // Create application state
    let app_state = AppState::new(config);
    let core = &app_state.core_state;

    if warmup {
        let report = core
            .initialize(&default_voice)
            .await
            .map_err(|e| anyhow!("Model initialization failed: {e}"))?;
        info!(
            "Warmup finished in {:?}, {} voices available",
            report.elapsed, report.voice_count
        );
    } else {
        info!("Warmup disabled; the model loads on the first request");
        core.lifecycle.start_idle_watchdog();
    }

    let app = routes::create_app(app_state.clone());

    // Create listener
    let listener = TcpListener::bind(&address).await?;
    info!("Server listening on {address}");

    // Start server
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    app_state.core_state.lifecycle.stop_idle_watchdog();
    app_state.core_state.lifecycle.unload().await;
    info!("Server stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
