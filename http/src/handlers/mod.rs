mod upload;

use axum::response::Json;
use serde_json::{json, Value};

pub use upload::upload_audio;

pub async fn banner() -> &'static str {
    "Whisper Transcription Backend is running"
}

pub async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
