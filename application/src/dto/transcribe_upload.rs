use std::path::PathBuf;

use validator::{Validate, ValidationError};

use transcription_domain::{PipelineOutcome, UploadedFile};

#[derive(Debug, Clone, Validate)]
pub struct TranscribeUploadRequest {
    pub upload_path: PathBuf,
    #[validate(length(min = 1, max = 255))]
    pub original_name: String,
    #[validate(custom(function = "validate_audio_media_type"))]
    pub media_type: String,
    #[validate(length(min = 1, max = 64))]
    pub request_id: Option<String>,
}

impl TranscribeUploadRequest {
    pub fn into_upload(self) -> UploadedFile {
        UploadedFile {
            path: self.upload_path,
            original_name: self.original_name,
            media_type: self.media_type,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TranscribeUploadResponse {
    pub request_id: String,
    pub outcome: PipelineOutcome,
}

fn validate_audio_media_type(media_type: &str) -> Result<(), ValidationError> {
    if media_type.to_ascii_lowercase().starts_with("audio/") {
        Ok(())
    } else {
        Err(ValidationError::new("audio_media_type")
            .with_message("Only audio files are allowed!".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(media_type: &str) -> TranscribeUploadRequest {
        TranscribeUploadRequest {
            upload_path: PathBuf::from("uploads/1.webm"),
            original_name: "note.webm".to_string(),
            media_type: media_type.to_string(),
            request_id: None,
        }
    }

    #[test]
    fn audio_media_types_are_accepted() {
        assert!(request("audio/webm").validate().is_ok());
        assert!(request("Audio/WAV").validate().is_ok());
    }

    #[test]
    fn non_audio_media_types_are_rejected() {
        let errors = request("video/mp4").validate().expect_err("rejected");
        assert!(errors.field_errors().contains_key("media_type"));
    }
}
