use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;

use transcription_domain::{
    extract, DomainError, PipelineOutcome, StagedFile, StagingPort, UploadedFile, WorkerCommand,
    WorkerPort,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Received,
    Staged,
    Invoked,
    Parsed,
    Succeeded,
    Failed,
}

impl PipelineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineState::Received => "received",
            PipelineState::Staged => "staged",
            PipelineState::Invoked => "invoked",
            PipelineState::Parsed => "parsed",
            PipelineState::Succeeded => "succeeded",
            PipelineState::Failed => "failed",
        }
    }
}

/// Stage → invoke → extract, with the staged file released exactly once on
/// every path out of `Staged`.
pub struct TranscriptionPipeline {
    staging: Arc<dyn StagingPort>,
    worker: Arc<dyn WorkerPort>,
    command: WorkerCommand,
}

impl TranscriptionPipeline {
    pub fn new(
        staging: Arc<dyn StagingPort>,
        worker: Arc<dyn WorkerPort>,
        command: WorkerCommand,
    ) -> Self {
        Self {
            staging,
            worker,
            command,
        }
    }

    pub async fn run(&self, upload: UploadedFile) -> PipelineOutcome {
        let staged = match self.staging.stage(upload).await {
            Ok(staged) => staged,
            Err(err) => return fail(PipelineState::Received, err),
        };
        tracing::Span::current().record("staged", staged.file_name().as_str());
        tracing::debug!(staged = %staged.file_name(), "pipeline state: staged");

        let guard = StagedFileGuard::new(self.staging.clone(), staged);
        let mut state = PipelineState::Staged;
        let processed = AssertUnwindSafe(self.process(guard.file(), &mut state))
            .catch_unwind()
            .await;
        guard.release().await;

        match processed {
            Ok(Ok(transcription)) => {
                tracing::info!(
                    characters = transcription.chars().count(),
                    "pipeline state: succeeded"
                );
                PipelineOutcome::succeeded(transcription)
            }
            Ok(Err(err)) => fail(state, err),
            Err(panic) => fail(state, DomainError::Internal(panic_message(panic))),
        }
    }

    async fn process(
        &self,
        staged: &StagedFile,
        state: &mut PipelineState,
    ) -> Result<String, DomainError> {
        let invocation = self.worker.invoke(&self.command, &staged.path).await?;
        *state = PipelineState::Invoked;
        tracing::debug!(
            exit_code = invocation.status.code(),
            stdout_bytes = invocation.stdout.len(),
            "pipeline state: invoked"
        );

        let result = extract(&invocation.stdout_text());
        *state = PipelineState::Parsed;
        tracing::debug!("pipeline state: parsed");
        result.into_text()
    }
}

fn fail(state: PipelineState, err: DomainError) -> PipelineOutcome {
    let outcome = PipelineOutcome::failed(&err);
    tracing::error!(
        failed_after = state.as_str(),
        kind = err.kind().as_str(),
        error = %err,
        "pipeline state: {}",
        PipelineState::Failed.as_str()
    );
    outcome
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        format!("transcription pipeline panicked: {message}")
    } else if let Some(message) = panic.downcast_ref::<String>() {
        format!("transcription pipeline panicked: {message}")
    } else {
        "transcription pipeline panicked".to_string()
    }
}

/// Owns a staged file for the duration of one request.
///
/// `release` is the normal path. If the request future is dropped before
/// that (client gone, task aborted), `Drop` removes the file synchronously.
struct StagedFileGuard {
    staging: Arc<dyn StagingPort>,
    file: StagedFile,
    released: bool,
}

impl StagedFileGuard {
    fn new(staging: Arc<dyn StagingPort>, file: StagedFile) -> Self {
        Self {
            staging,
            file,
            released: false,
        }
    }

    fn file(&self) -> &StagedFile {
        &self.file
    }

    async fn release(mut self) {
        self.released = true;
        if let Err(err) = self.staging.release(&self.file).await {
            tracing::warn!(
                path = %self.file.path.display(),
                error = %err,
                "staged file cleanup failed"
            );
        }
    }
}

impl Drop for StagedFileGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        // Abort path only: a single blocking unlink on the runtime thread.
        if let Err(err) = self.staging.release_blocking(&self.file) {
            tracing::warn!(
                path = %self.file.path.display(),
                error = %err,
                "staged file cleanup failed"
            );
        }
    }
}
