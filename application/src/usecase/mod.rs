mod transcribe_upload;

pub use transcribe_upload::{TranscriptionUseCase, TranscriptionUseCaseImpl};
