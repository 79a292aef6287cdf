// Diagon Exchange server entry point.
//
// Startup sequence:
// 1. Initialize tracing
// 2. Load config (copying defaults/ into config/ on first run)
// 3. Create the session directory
// 4. Bind and serve WebSocket connections until Ctrl+C

use std::sync::Arc;

use anyhow::Context;
use diagon_core::config;
use diagon_core::directory::SessionDirectory;
use diagon_server::ws_server;
use tokio::net::TcpListener;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing()?;
    info!("Diagon server starting up");

    let config = config::load_config().context("failed to load configuration")?;
    info!(
        "Config loaded: up to {} players, {}-card hands, portfolio moves {}",
        config.rules.max_players,
        config.rules.hand_size,
        if config.rules.apply_portfolio_moves {
            "applied"
        } else {
            "validated only"
        }
    );

    let directory = Arc::new(SessionDirectory::new(config.rules.clone()));

    let bind_addr = config.server.bind_addr();
    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;

    tokio::select! {
        result = ws_server::run(listener, directory, config.server.outbound_buffer) => {
            if let Err(e) = &result {
                error!("WebSocket server error: {}", e);
            }
            result.context("WebSocket server stopped")?;
        }
        signal = tokio::signal::ctrl_c() => {
            signal.context("failed to listen for Ctrl+C")?;
            info!("Received Ctrl+C");
        }
    }

    info!("Diagon server shut down cleanly");
    Ok(())
}

fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("diagon_server=info,diagon_core=info,warn")),
        )
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
