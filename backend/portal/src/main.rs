//! Sabil al-Khair portal — entry point.
//!
//! Serves the public donation board (projects, statements, settings and the
//! carried-forward balance) and the password-gated admin API that records
//! collections and distributes them across projects. A background task
//! sweeps expired admin sessions.

mod api;
mod auth;
mod config;
mod cycle;
mod db;
mod drafting;
mod errors;
mod media;

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use config::Config;
use drafting::Drafter;
use media::MediaClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialise structured logging (RUST_LOG controls verbosity).
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // Load optional .env file (ignored if missing).
    let _ = dotenvy::dotenv();

    let config = Config::from_env().map_err(|e| anyhow::anyhow!("{e}"))?;

    // Set up the SQLite connection pool and run migrations.
    let pool = db::init_pool(&config.database_url).await?;

    // Shared by the media host and the drafting service.
    let client = Client::builder()
        .timeout(Duration::from_secs(60))
        .build()?;

    let media = match config.media.clone() {
        Some(media_config) => {
            info!("Image uploads enabled (folder {})", media_config.folder);
            Some(MediaClient::new(client.clone(), media_config))
        }
        None => {
            info!("Cloudinary credentials not set — image uploads disabled");
            None
        }
    };

    if config.drafter_url.is_none() {
        info!("DRAFTER_URL not set — statements use the numeric template");
    }
    let drafter = Drafter::new(
        client,
        config.drafter_url.clone(),
        Duration::from_secs(config.drafter_timeout_secs),
    );

    // ─── Background session sweeper ───────────────────────
    let shutdown = CancellationToken::new();
    let sweeper = tokio::spawn(auth::run_purge(
        pool.clone(),
        Duration::from_secs(config.session_purge_interval_secs),
        shutdown.clone(),
    ));

    // ─── REST API ─────────────────────────────────────────
    let addr = format!("0.0.0.0:{}", config.api_port);
    let app = api::router(Arc::new(api::ApiState {
        pool,
        config,
        media,
        drafter,
    }));

    info!("API listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await?;

    shutdown.cancel();
    let _ = sweeper.await;

    Ok(())
}
