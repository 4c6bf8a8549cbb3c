use async_trait::async_trait;
use tracing::Instrument;
use uuid::Uuid;
use validator::Validate;

use crate::{ApplicationError, TranscribeUploadRequest, TranscribeUploadResponse, TranscriptionPipeline};

#[async_trait]
pub trait TranscriptionUseCase: Send + Sync {
    /// Runs one upload through the pipeline. Only request validation is an
    /// `Err`; every pipeline failure is carried in the response outcome. A
    /// rejected request leaves the upload file to the caller.
    async fn transcribe(
        &self,
        request: TranscribeUploadRequest,
    ) -> Result<TranscribeUploadResponse, ApplicationError>;
}

pub struct TranscriptionUseCaseImpl {
    pipeline: TranscriptionPipeline,
}

impl TranscriptionUseCaseImpl {
    pub fn new(pipeline: TranscriptionPipeline) -> Self {
        Self { pipeline }
    }
}

#[async_trait]
impl TranscriptionUseCase for TranscriptionUseCaseImpl {
    async fn transcribe(
        &self,
        request: TranscribeUploadRequest,
    ) -> Result<TranscribeUploadResponse, ApplicationError> {
        request.validate()?;

        let request_id = request
            .request_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let span = tracing::info_span!(
            "transcription",
            request_id = %request_id,
            staged = tracing::field::Empty
        );

        let outcome = async {
            tracing::debug!(
                original_name = %request.original_name,
                media_type = %request.media_type,
                "starting transcription pipeline"
            );
            self.pipeline.run(request.into_upload()).await
        }
        .instrument(span)
        .await;

        Ok(TranscribeUploadResponse {
            request_id,
            outcome,
        })
    }
}
