//! VisuEquation · Visual Algebra Game Backend
//!
//! - Axum HTTP + WebSocket API over the game session controller
//! - Curriculum catalog from a JSON problem bank (or the built-in course)
//! - Optional OpenAI coaching (via environment variables), local coach otherwise
//! - Static SPA fallback (./static/index.html)
//!
//! Important env variables:
//!   PORT                : u16 (default 3000)
//!   OPENAI_API_KEY      : enables OpenAI integration if present
//!   OPENAI_BASE_URL     : default "https://api.openai.com/v1"
//!   OPENAI_FAST_MODEL   : default "gpt-4o-mini"
//!   OPENAI_STRONG_MODEL : default "gpt-4o"
//!   GAME_CONFIG_PATH    : path to TOML config (game rules + prompts)
//!   CATALOG_PATH        : JSON problem bank, overrides the config entry
//!   DATA_DIR            : directory for progress and attempt documents (memory only if unset)
//!   LOG_LEVEL           : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT          : "pretty" (default) or "json"

mod telemetry;
mod util;
mod domain;
mod config;
mod catalog;
mod seeds;
mod evaluation;
mod scoring;
mod progression;
mod store;
mod session;
mod openai;
mod assist;
mod state;
mod protocol;
mod logic;
mod routes;

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::{info, instrument};

use crate::routes::build_router;
use crate::state::AppState;

#[instrument(level = "info", skip_all)]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  // Catalog, store, coach and game rules. A broken catalog stops startup here.
  let state = Arc::new(AppState::new().await?);

  let app = build_router(state.clone());

  // Read port from env or default to 3000.
  let addr: SocketAddr = std::env::var("PORT")
    .ok()
    .and_then(|p| p.parse::<u16>().ok())
    .map(|port| SocketAddr::from(([0, 0, 0, 0], port)))
    .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

  let listener = TcpListener::bind(addr).await?;
  info!(target: "visuequation_backend", %addr, "HTTP server listening");
  axum::serve(listener, app).await?;
  Ok(())
}
