use std::path::Path;

use async_trait::async_trait;

use crate::{DomainError, StagedFile, UploadedFile, WorkerCommand, WorkerInvocation};

#[async_trait]
pub trait StagingPort: Send + Sync {
    async fn stage(&self, upload: UploadedFile) -> Result<StagedFile, DomainError>;

    /// Removes the staged file. A file that is already gone is not an error.
    async fn release(&self, staged: &StagedFile) -> Result<(), DomainError>;

    /// Synchronous variant used from drop guards, where no executor is
    /// guaranteed to be available.
    fn release_blocking(&self, staged: &StagedFile) -> Result<(), DomainError>;
}

#[async_trait]
pub trait WorkerPort: Send + Sync {
    /// Runs the worker against `staged_path` and returns the captured
    /// invocation when it exits successfully.
    async fn invoke(
        &self,
        command: &WorkerCommand,
        staged_path: &Path,
    ) -> Result<WorkerInvocation, DomainError>;
}
