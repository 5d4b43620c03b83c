// =============================================================================
// fluxchart: Main Entry Point
// =============================================================================
//
// Builds the feeds and the chart session from the runtime config, spawns the
// chart driver and serves the REST/WebSocket API until Ctrl+C.
// =============================================================================

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use fluxchart::api;
use fluxchart::app_state::AppState;
use fluxchart::driver::{Command, CommandRequest, Driver};
use fluxchart::feeds::{Catalog, DataGenerator, Feeds, GdaxClient, GdaxStream, QuandlClient, SourceKind};
use fluxchart::runtime_config::RuntimeConfig;
use fluxchart::session::ChartSession;

const CONFIG_PATH: &str = "fluxchart.json";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("fluxchart starting up");

    let mut config = RuntimeConfig::load_or_default(CONFIG_PATH);
    if !std::path::Path::new(CONFIG_PATH).exists() {
        // Write the defaults out once so they can be edited.
        if let Err(e) = config.save(CONFIG_PATH) {
            warn!(error = %e, "failed to write default runtime config");
        }
    }
    config.apply_env();

    // ── 2. Feeds ─────────────────────────────────────────────────────────
    let gdax = Arc::new(
        GdaxClient::new(
            config.gdax_rest_url.clone(),
            Duration::from_millis(config.gdax_request_interval_ms),
        )
        .context("failed to build GDAX client")?,
    );
    let quandl = QuandlClient::new(config.quandl_url.clone(), config.quandl_api_key.clone())
        .context("failed to build Quandl client")?;

    let feeds = Feeds::new()
        .with_historic(SourceKind::Generated, Arc::new(DataGenerator::new(config.generator_seed)))
        .with_historic(SourceKind::Gdax, gdax.clone())
        .with_historic(SourceKind::Quandl, Arc::new(quandl))
        .with_streaming(SourceKind::Gdax, Arc::new(GdaxStream::new(config.gdax_ws_url.clone())));

    // ── 3. Session & shared state ────────────────────────────────────────
    let mut session = ChartSession::new(config.session_config(), Catalog::with_defaults(&config.quandl_products));
    let (commands_tx, commands_rx) = mpsc::unbounded_channel::<CommandRequest>();

    if config.fetch_gdax_products {
        match gdax.get_products().await {
            Ok(products) => {
                let added = session.add_products(products);
                info!(added, "GDAX products added to catalog");
            }
            Err(e) => {
                warn!(error = %e, "failed to fetch GDAX products");
                // Surfaced as a notification once the driver is running.
                let _ = commands_tx.send(CommandRequest {
                    command: Command::ProductsLoaded(Err(e)),
                    reply: None,
                });
            }
        }
    }

    let default_product = config.default_product.clone();
    let default_period = config.default_period.clone();
    let frame_interval = Duration::from_millis(config.frame_interval_ms.max(1));
    let bind_addr = config.bind_addr.clone();

    let state = Arc::new(AppState::new(config, commands_tx));

    // ── 4. Chart driver ──────────────────────────────────────────────────
    let mut driver = Driver::new(session, feeds, state.clone(), commands_rx, frame_interval);
    driver.start(&default_product, &default_period);
    tokio::spawn(driver.run());

    // ── 5. API server ────────────────────────────────────────────────────
    let app = api::rest::router(state.clone());
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind API server to {bind_addr}"))?;
    info!(addr = %bind_addr, "API server listening");

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!(error = %e, "API server failed");
        }
    });

    // ── 6. Graceful shutdown ─────────────────────────────────────────────
    tokio::signal::ctrl_c().await.context("failed to listen for Ctrl+C")?;
    warn!("shutdown signal received");
    info!("fluxchart shut down");
    Ok(())
}
