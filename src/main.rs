use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use dotenvy::dotenv;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info};

use transit_stops::api::{self, AppState, GuideArtifact};
use transit_stops::clients::{Enrichment, GeminiClient, HafasTransitClient};
use transit_stops::config::Config;
use transit_stops::{dal, telemetry};

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<()> {
    _ = dotenv();
    let config = Config::parse();

    let telemetry = telemetry::init(&config.log_dir, config.otlp_endpoint.as_deref())?;

    let pool = dal::connect(&config.database_url).await?;

    let transit = HafasTransitClient::new(&config.transit_api_url, config.request_timeout())
        .context("Error building transit client")?;
    let gemini = GeminiClient::new(
        &config.gemini_api_url,
        &config.gemini_model,
        &config.google_api_key,
        config.request_timeout(),
    )
    .context("Error building text generation client")?;

    let state = AppState {
        pool: pool.clone(),
        transit: Arc::new(transit),
        enrichment: Enrichment::new(Arc::new(gemini)),
        guide: Arc::new(GuideArtifact::new(config.guide_path.clone())),
        timezone: config.tz()?,
        public_host: config.public_host.clone(),
    };

    let listener = TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("Error binding {}", config.bind))?;
    info!("listening on {}", config.bind);

    if let Err(e) = axum::serve(listener, api::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("server error: {e}");
    }

    info!("shutting down");
    pool.close().await;
    telemetry.shutdown();

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        error!("failed to listen for ctrl-c: {e}");
    }
}
