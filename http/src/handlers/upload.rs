use std::path::{Path, PathBuf};

use axum::{
    extract::{multipart::Field, Multipart, State},
    http::StatusCode,
    response::Json,
};
use tokio::io::AsyncWriteExt;

use transcription_application::TranscribeUploadRequest;
use transcription_domain::{unique_token, FailureKind, PipelineOutcome};

use crate::error::{error_mapper, HttpError};
use crate::AppState;

struct SavedUpload {
    path: PathBuf,
    original_name: String,
    media_type: String,
}

pub async fn upload_audio(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<PipelineOutcome>), HttpError> {
    let Some(saved) = receive_upload(&state, &mut multipart).await? else {
        return Err(HttpError::NoFile);
    };

    tracing::info!(
        original_name = %saved.original_name,
        media_type = %saved.media_type,
        "received upload"
    );

    let upload_path = saved.path.clone();
    let result = state
        .usecase
        .transcribe(TranscribeUploadRequest {
            upload_path: saved.path,
            original_name: saved.original_name,
            media_type: saved.media_type,
            request_id: None,
        })
        .await;
    // Staging moves the upload away on success; anything still here is stale.
    discard(&upload_path).await;

    match result {
        Ok(response) => {
            let status = status_for(&response.outcome);
            if response.outcome.is_success() {
                tracing::info!(request_id = %response.request_id, "upload transcribed");
            } else {
                tracing::error!(
                    request_id = %response.request_id,
                    status = status.as_u16(),
                    "upload transcription failed"
                );
            }
            Ok((status, Json(response.outcome)))
        }
        Err(error) => {
            tracing::warn!(error = %error, "upload rejected");
            Err(error_mapper(error))
        }
    }
}

fn status_for(outcome: &PipelineOutcome) -> StatusCode {
    match outcome.failure_kind() {
        None => StatusCode::OK,
        Some(FailureKind::WorkerTimeout) => StatusCode::GATEWAY_TIMEOUT,
        Some(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

async fn receive_upload(
    state: &AppState,
    multipart: &mut Multipart,
) -> Result<Option<SavedUpload>, HttpError> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(state.field_name.as_str()) {
            continue;
        }

        let original_name = field.file_name().unwrap_or("upload").to_string();
        let media_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        if !media_type.to_ascii_lowercase().starts_with("audio/") {
            return Err(HttpError::UploadRejected {
                details: "Only audio files are allowed!".to_string(),
            });
        }

        let path = save_field(state, &original_name, field).await?;
        return Ok(Some(SavedUpload {
            path,
            original_name,
            media_type,
        }));
    }
    Ok(None)
}

async fn save_field(
    state: &AppState,
    original_name: &str,
    mut field: Field<'_>,
) -> Result<PathBuf, HttpError> {
    tokio::fs::create_dir_all(&state.upload_directory)
        .await
        .map_err(|err| HttpError::Internal {
            message: format!("cannot create upload directory: {err}"),
        })?;
    let path = state
        .upload_directory
        .join(format!("{}{}", unique_token(), extension_of(original_name)));
    let mut file = tokio::fs::File::create(&path)
        .await
        .map_err(|err| HttpError::Internal {
            message: format!("cannot store upload: {err}"),
        })?;

    let mut written = 0usize;
    let copied = async {
        while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
            written += chunk.len();
            if written > state.max_upload_bytes {
                return Err(HttpError::UploadRejected {
                    details: format!("File too large (limit {} bytes)", state.max_upload_bytes),
                });
            }
            file.write_all(&chunk)
                .await
                .map_err(|err| HttpError::Internal {
                    message: format!("cannot store upload: {err}"),
                })?;
        }
        file.flush().await.map_err(|err| HttpError::Internal {
            message: format!("cannot store upload: {err}"),
        })
    }
    .await;

    if let Err(err) = copied {
        drop(file);
        discard(&path).await;
        return Err(err);
    }
    Ok(path)
}

fn extension_of(original_name: &str) -> String {
    Path::new(original_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|ext| format!(".{ext}"))
        .unwrap_or_default()
}

fn multipart_error(err: axum::extract::multipart::MultipartError) -> HttpError {
    HttpError::UploadRejected {
        details: err.body_text(),
    }
}

async fn discard(path: &Path) {
    if let Err(err) = tokio::fs::remove_file(path).await {
        if err.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(path = %path.display(), error = %err, "could not remove upload");
        }
    }
}
