use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;

use transcription_application::TranscriptionUseCase;

pub mod error;
pub mod handlers;

pub use error::{error_mapper, HttpError};
pub use handlers::*;

// Room for multipart boundaries and headers on top of the file itself.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub usecase: Arc<dyn TranscriptionUseCase>,
    pub upload_directory: PathBuf,
    pub field_name: String,
    pub max_upload_bytes: usize,
}

pub fn build_router(state: AppState) -> Router {
    let upload_route = post(upload_audio).layer(DefaultBodyLimit::max(
        state.max_upload_bytes.saturating_add(MULTIPART_OVERHEAD_BYTES),
    ));

    Router::new()
        .route("/", get(banner))
        .route("/health", get(health_check))
        .route("/upload", upload_route)
        .with_state(state)
}

pub async fn run_server(router: Router, bind_addr: &str) -> anyhow::Result<()> {
    let listener = TcpListener::bind(bind_addr)
        .await
        .map_err(|err| anyhow::anyhow!("bind {bind_addr} failed: {err}"))?;
    tracing::info!(address = %bind_addr, "transcription http server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| anyhow::anyhow!("server error: {err}"))
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "cannot listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
