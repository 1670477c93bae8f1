//! linktrap server binary.
//!
//! Reads `config.toml` (or the path specified with `--config`), opens the
//! SQLite click log and the optional approximate-location table, and serves
//! HTTP.

use std::{net::SocketAddr, path::PathBuf, sync::Arc};

use anyhow::Context as _;
use clap::Parser;
use linktrap_core::geo::{GeoLookup, GeoTable};
use linktrap_server::{AppState, ServerConfig};
use linktrap_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "linktrap click capture server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Initialise tracing.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  // Load configuration.
  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("LINKTRAP"))
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  // Open the click log.
  let store = SqliteStore::open(&server_cfg.store_path)
    .await
    .with_context(|| {
      format!("failed to open store at {:?}", server_cfg.store_path)
    })?;

  // Load the approximate-location table, if configured.
  let geo: Arc<dyn GeoLookup> = match &server_cfg.geo_table_path {
    Some(path) => {
      let table = GeoTable::load(path)
        .with_context(|| format!("failed to load geo table at {path:?}"))?;
      Arc::new(table)
    }
    None => Arc::new(GeoTable::empty()),
  };

  // Build application state.
  let state = AppState {
    store: Arc::new(store),
    geo,
    config: Arc::new(server_cfg.clone()),
  };

  let app = linktrap_server::router(state).layer(TraceLayer::new_for_http());
  let address = format!("{}:{}", server_cfg.host, server_cfg.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  // Connect-info make-service so the capture flow can fall back to the
  // transport peer address when no forwarded header is present.
  axum::serve(
    listener,
    app.into_make_service_with_connect_info::<SocketAddr>(),
  )
  .await
  .context("server error")?;

  Ok(())
}
