use std::{sync::Arc, time::Duration};

use axum::{
  extract::State,
  headers::ContentType,
  http::header,
  response::IntoResponse,
  routing::get,
  Json, Router, TypedHeader,
};
use serde_json::json;
use tokio_graceful_shutdown::{SubsystemBuilder, SubsystemHandle, Toplevel};
use tracing::info;

mod classify;
mod config;
mod download;
mod error;
mod extractor;
mod materialize;
mod orchestrator;
mod util;
mod workspace;
mod youtube_url;

pub use config::Config;
pub use error::{Error, Result};

use extractor::{Extractor, Ytdlp};

#[derive(Clone)]
pub struct AppState {
  pub config: Arc<Config>,
  pub extractor: Arc<dyn Extractor>,
}

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let config = Config::from_env()?;
  let state = AppState {
    extractor: Arc::new(Ytdlp::new(&config.ytdlp)),
    config: Arc::new(config),
  };

  Toplevel::new(|s| async move {
    s.start(SubsystemBuilder::new("http", |subsys| serve(subsys, state)));
  })
  .catch_signals()
  .handle_shutdown_requests(Duration::from_secs(10))
  .await
  .map_err(|e| Error::Server(e.to_string()))
}

async fn serve(subsys: SubsystemHandle, state: AppState) -> Result<()> {
  let addr = state.config.bind_addr;
  let app = router(state);

  info!("Listening on {}", addr);

  axum::Server::bind(&addr)
    .serve(app.into_make_service())
    .with_graceful_shutdown(subsys.on_shutdown_requested())
    .await
    .map_err(|e| Error::Server(e.to_string()))
}

pub fn router(state: AppState) -> Router {
  Router::new()
    .route("/", get(homepage))
    .route("/static/script.js", get(script))
    .route("/health", get(health))
    .route("/status", get(status))
    .route("/download", get(download::get_download))
    .with_state(state)
}

pub const HOMEPAGE_HTML: &str = include_str!("../html/homepage.html");
pub const SCRIPT_JS: &str = include_str!("../html/script.js");

async fn homepage() -> impl IntoResponse {
  (
    TypedHeader::<ContentType>(ContentType::html()),
    HOMEPAGE_HTML,
  )
}

async fn script() -> impl IntoResponse {
  ([(header::CONTENT_TYPE, "application/javascript")], SCRIPT_JS)
}

async fn health() -> impl IntoResponse {
  Json(json!({ "status": "healthy" }))
}

async fn status(State(state): State<AppState>) -> impl IntoResponse {
  Json(json!({
    "status": "healthy",
    "max_attempts": state.config.retry.max_attempts,
    "concurrency": state.config.ytdlp.concurrency,
  }))
}
