use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FailureKind {
    UploadProcessing,
    WorkerStart,
    WorkerExecution,
    WorkerTimeout,
    Parse,
    WorkerReported,
    #[default]
    Internal,
}

impl FailureKind {
    pub fn label(&self) -> &'static str {
        match self {
            FailureKind::UploadProcessing => "File processing failed",
            FailureKind::WorkerStart => "Worker process failed to start",
            FailureKind::WorkerExecution | FailureKind::WorkerReported => "Transcription failed",
            FailureKind::WorkerTimeout => "Transcription timed out",
            FailureKind::Parse => "Failed to extract JSON from worker output",
            FailureKind::Internal => "Server error",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::UploadProcessing => "upload_processing_error",
            FailureKind::WorkerStart => "worker_start_error",
            FailureKind::WorkerExecution => "worker_execution_error",
            FailureKind::WorkerTimeout => "worker_timeout_error",
            FailureKind::Parse => "parse_error",
            FailureKind::WorkerReported => "worker_reported_error",
            FailureKind::Internal => "internal_error",
        }
    }
}

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("upload processing failed: {0}")]
    UploadProcessing(String),

    #[error("worker failed to start: {0}")]
    WorkerStart(String),

    #[error("worker exited with code {code:?}: {stderr}")]
    WorkerExecution { code: Option<i32>, stderr: String },

    #[error("worker timed out after {elapsed:?}")]
    WorkerTimeout { elapsed: Duration },

    #[error("worker output is not a transcription result: {0}")]
    Parse(String),

    #[error("worker reported an error: {0}")]
    WorkerReported(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl DomainError {
    pub fn internal_error(message: &str) -> Self {
        DomainError::Internal(message.to_string())
    }

    pub fn upload_io(context: &str, err: std::io::Error) -> Self {
        DomainError::UploadProcessing(format!("{context}: {err}"))
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            DomainError::UploadProcessing(_) => FailureKind::UploadProcessing,
            DomainError::WorkerStart(_) => FailureKind::WorkerStart,
            DomainError::WorkerExecution { .. } => FailureKind::WorkerExecution,
            DomainError::WorkerTimeout { .. } => FailureKind::WorkerTimeout,
            DomainError::Parse(_) => FailureKind::Parse,
            DomainError::WorkerReported(_) => FailureKind::WorkerReported,
            DomainError::Internal(_) => FailureKind::Internal,
        }
    }

    /// Free-form diagnostic text returned to the client as `details`.
    pub fn details(&self) -> String {
        match self {
            DomainError::UploadProcessing(message)
            | DomainError::WorkerStart(message)
            | DomainError::WorkerReported(message)
            | DomainError::Internal(message) => message.clone(),
            DomainError::WorkerExecution { code, stderr } => {
                if stderr.is_empty() {
                    match code {
                        Some(code) => format!("worker process exited with code {code}"),
                        None => "worker process was terminated by a signal".to_string(),
                    }
                } else {
                    stderr.clone()
                }
            }
            DomainError::WorkerTimeout { elapsed } => format!(
                "worker process did not finish in time and was killed after {:.1}s",
                elapsed.as_secs_f64()
            ),
            DomainError::Parse(raw) => raw.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn execution_details_fall_back_when_stderr_is_empty() {
        let err = DomainError::WorkerExecution {
            code: Some(2),
            stderr: String::new(),
        };
        assert_eq!(err.details(), "worker process exited with code 2");
        assert_eq!(err.kind().label(), "Transcription failed");
    }

    #[test]
    fn timeout_details_mention_elapsed_time() {
        let err = DomainError::WorkerTimeout {
            elapsed: Duration::from_millis(1500),
        };
        assert!(err.details().contains("1.5s"));
        assert_eq!(err.kind(), FailureKind::WorkerTimeout);
    }
}
