//! Match clipping pipeline binary.

use anyhow::Context;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use matchcut_pipeline::{run_pipeline, Credentials, EventConfig, LogObserver};

fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env()
        .add_directive("matchcut=info".parse().expect("static directive"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let mut args = std::env::args().skip(1);
    let config_path = args
        .next()
        .or_else(|| std::env::var("MATCHCUT_CONFIG").ok())
        .unwrap_or_else(|| "config.json".to_string());
    let credentials_path = args
        .next()
        .or_else(|| std::env::var("MATCHCUT_CREDENTIALS").ok())
        .unwrap_or_else(|| "credentials.json".to_string());

    let config = EventConfig::load(&config_path)
        .with_context(|| format!("loading event config from {}", config_path))?;
    let credentials = Credentials::load(&credentials_path)
        .with_context(|| format!("loading credentials from {}", credentials_path))?;

    info!(event = %config.event_code, season = config.season, "starting matchcut");

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    if let Err(e) = run_pipeline(config, credentials, shutdown_rx, Box::new(LogObserver)).await {
        error!(error = %e, "pipeline failed");
        std::process::exit(1);
    }
    Ok(())
}
