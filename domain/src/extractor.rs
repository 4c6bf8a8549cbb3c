use serde::Deserialize;

use crate::TranscriptionResult;

#[derive(Debug, Deserialize)]
struct WorkerReply {
    #[serde(default)]
    transcription: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Recovers the worker's answer from its captured stdout.
///
/// Workers may print progress lines before their final object, so decoding
/// starts at the last `{` and runs to the end of the text.
pub fn extract(stdout: &str) -> TranscriptionResult {
    let Some(start) = stdout.rfind('{') else {
        return TranscriptionResult::Malformed(stdout.to_string());
    };

    match serde_json::from_str::<WorkerReply>(&stdout[start..]) {
        Ok(WorkerReply {
            transcription: Some(text),
            ..
        }) => TranscriptionResult::Transcription(text),
        Ok(WorkerReply {
            transcription: None,
            error: Some(message),
        }) => TranscriptionResult::WorkerError(message),
        Ok(_) | Err(_) => TranscriptionResult::Malformed(stdout.to_string()),
    }
}
