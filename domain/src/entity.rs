use std::path::PathBuf;
use std::process::ExitStatus;
use std::time::{Duration, SystemTime};

use serde::Serialize;

use crate::{DomainError, FailureKind};

#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub path: PathBuf,
    pub original_name: String,
    pub media_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedFile {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub created_at: SystemTime,
}

impl StagedFile {
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone)]
pub struct WorkerCommand {
    pub executable: String,
    pub entrypoint: Option<String>,
    pub timeout: Option<Duration>,
    pub max_output_bytes: usize,
}

impl WorkerCommand {
    pub fn arguments(&self, staged_path: &std::path::Path) -> Vec<String> {
        let mut args = Vec::with_capacity(2);
        if let Some(entrypoint) = self.entrypoint.as_deref().filter(|e| !e.is_empty()) {
            args.push(entrypoint.to_string());
        }
        args.push(staged_path.to_string_lossy().into_owned());
        args
    }
}

#[derive(Debug, Clone)]
pub struct WorkerInvocation {
    pub program: String,
    pub args: Vec<String>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub status: ExitStatus,
    pub elapsed: Duration,
}

impl WorkerInvocation {
    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr).trim().to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscriptionResult {
    Transcription(String),
    WorkerError(String),
    Malformed(String),
}

impl TranscriptionResult {
    pub fn into_text(self) -> Result<String, DomainError> {
        match self {
            TranscriptionResult::Transcription(text) => Ok(text),
            TranscriptionResult::WorkerError(message) => Err(DomainError::WorkerReported(message)),
            TranscriptionResult::Malformed(raw) => Err(DomainError::Parse(raw)),
        }
    }
}

/// Value handed back to the HTTP layer; serialized as `{transcription}` or
/// `{error, details}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum PipelineOutcome {
    Succeeded {
        transcription: String,
    },
    Failed {
        #[serde(skip)]
        kind: FailureKind,
        error: String,
        details: String,
    },
}

impl PipelineOutcome {
    pub fn succeeded(transcription: impl Into<String>) -> Self {
        PipelineOutcome::Succeeded {
            transcription: transcription.into(),
        }
    }

    pub fn failed(error: &DomainError) -> Self {
        let kind = error.kind();
        PipelineOutcome::Failed {
            kind,
            error: kind.label().to_string(),
            details: error.details(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, PipelineOutcome::Succeeded { .. })
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            PipelineOutcome::Succeeded { .. } => None,
            PipelineOutcome::Failed { kind, .. } => Some(*kind),
        }
    }
}
