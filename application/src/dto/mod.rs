mod transcribe_upload;

pub use transcribe_upload::{TranscribeUploadRequest, TranscribeUploadResponse};
