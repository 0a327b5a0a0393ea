//! Planner · Course Plan Backend
//!
//! - Axum HTTP + WebSocket API for the plan editor, student viewer and coverage report
//! - Reference data and plans from a local directory or a static site
//! - Optional commits of edited plans through the GitHub Contents API
//! - Static SPA fallback (<static_dir>/index.html)
//!
//! Important env variables:
//!   PORT                : u16 (default 3000)
//!   PLANNER_CONFIG_PATH : path to TOML config (classes, data source, store, GitHub)
//!   PLANNER_DATA_DIR    : overrides `data_dir`
//!   PLANNER_DATA_URL    : overrides `data_url` (remote data source)
//!   PLANNER_STORE_PATH  : overrides `store_path` (empty keeps annotations in memory)
//!   LOG_LEVEL           : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT          : "pretty" (default) or "json"

mod annotations;
mod client;
mod config;
mod coverage;
mod domain;
mod error;
mod github;
mod plan;
mod protocol;
mod reference;
mod routes;
mod selection;
mod sketch;
mod source;
mod state;
mod store;
mod telemetry;
mod util;
mod view;
mod workspace;

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::{info, instrument};

use crate::routes::build_router;
use crate::state::AppState;

#[instrument(level = "info", skip_all)]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  let config = config::load_config_from_env();

  // Shared state: data source, local store, sessions, GitHub client.
  let state = Arc::new(AppState::new(config)?);
  let _sweeper = state.spawn_session_sweeper();

  let app = build_router(state.clone());

  let addr: SocketAddr = std::env::var("PORT")
    .ok()
    .and_then(|p| p.parse::<u16>().ok())
    .map(|port| SocketAddr::from(([0, 0, 0, 0], port)))
    .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

  let listener = TcpListener::bind(addr).await?;
  info!(target: "planner_backend", %addr, "HTTP server listening");
  axum::serve(listener, app)
    .with_graceful_shutdown(async {
      let _ = tokio::signal::ctrl_c().await;
      info!(target: "planner_backend", "Shutdown signal received");
    })
    .await?;
  Ok(())
}
