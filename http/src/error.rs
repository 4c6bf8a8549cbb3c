use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use transcription_application::ApplicationError;

#[derive(Debug)]
pub enum HttpError {
    NoFile,
    UploadRejected { details: String },
    Internal { message: String },
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            HttpError::NoFile => (
                StatusCode::BAD_REQUEST,
                json!({ "error": "No file uploaded" }),
            ),
            HttpError::UploadRejected { details } => (
                StatusCode::BAD_REQUEST,
                json!({ "error": "File upload error", "details": details }),
            ),
            HttpError::Internal { message } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": "Server error", "details": message }),
            ),
        };

        (status, Json(body)).into_response()
    }
}

pub fn error_mapper(error: ApplicationError) -> HttpError {
    match error {
        ApplicationError::Validation(details) => HttpError::UploadRejected { details },
    }
}
