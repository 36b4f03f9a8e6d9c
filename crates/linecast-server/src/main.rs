//! # linecast server
//!
//! Line-oriented TCP publish/subscribe relay.
//!
//! ## Usage
//!
//! ```bash
//! # Reads $LINECAST_CONF_DIR/linecast.toml, which must set `port`
//! LINECAST_CONF_DIR=/etc/linecast linecast
//!
//! # Adjust log verbosity
//! RUST_LOG=linecast=debug,linecast_core=debug LINECAST_CONF_DIR=. linecast
//! ```

mod config;
mod handlers;
mod metrics;

use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "linecast=info,linecast_core=info,linecast_transport=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = config::Config::load()?;

    tracing::info!("Starting linecast server on {}:{}", config.host, config.port);

    metrics::init_metrics();

    handlers::run_server(config).await?;

    Ok(())
}
