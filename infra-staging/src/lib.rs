use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use async_trait::async_trait;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use transcription_domain::{unique_token, DomainError, StagedFile, StagingPort, UploadedFile};

#[derive(Debug, Clone)]
pub struct FsStagingStore {
    directory: PathBuf,
    target_extension: String,
}

impl FsStagingStore {
    pub fn new(directory: impl Into<PathBuf>, target_extension: impl Into<String>) -> Self {
        let target_extension = target_extension.into();
        Self {
            directory: directory.into(),
            target_extension: target_extension.trim_start_matches('.').to_string(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    async fn prepare_directory(&self) -> io::Result<PathBuf> {
        fs::create_dir_all(&self.directory).await?;
        fs::canonicalize(&self.directory).await
    }
}

#[async_trait]
impl StagingPort for FsStagingStore {
    async fn stage(&self, upload: UploadedFile) -> Result<StagedFile, DomainError> {
        let directory = self
            .prepare_directory()
            .await
            .map_err(|err| DomainError::upload_io("cannot prepare staging directory", err))?;
        let destination = directory.join(format!("{}.{}", unique_token(), self.target_extension));

        let mut target = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&destination)
            .await
            .map_err(|err| DomainError::upload_io("cannot create staged file", err))?;

        let staged = async {
            let size_bytes = copy_into(&upload.path, &mut target)
                .await
                .map_err(|err| DomainError::upload_io("cannot copy upload", err))?;
            drop(target);

            fs::remove_file(&upload.path)
                .await
                .map_err(|err| DomainError::upload_io("cannot remove original upload", err))?;

            verify_readable(&destination, size_bytes)
                .await
                .map_err(|err| DomainError::upload_io("staged file is not readable", err))?;

            Ok::<_, DomainError>(StagedFile {
                path: destination.clone(),
                size_bytes,
                created_at: SystemTime::now(),
            })
        }
        .await;

        match staged {
            Ok(staged) => {
                tracing::debug!(
                    original_name = %upload.original_name,
                    media_type = %upload.media_type,
                    staged_path = %staged.path.display(),
                    size_bytes = staged.size_bytes,
                    "upload staged"
                );
                Ok(staged)
            }
            Err(err) => {
                if let Err(cleanup) = fs::remove_file(&destination).await {
                    if cleanup.kind() != io::ErrorKind::NotFound {
                        tracing::warn!(
                            path = %destination.display(),
                            error = %cleanup,
                            "could not discard partially staged file"
                        );
                    }
                }
                Err(err)
            }
        }
    }

    async fn release(&self, staged: &StagedFile) -> Result<(), DomainError> {
        match fs::remove_file(&staged.path).await {
            Ok(()) => {
                tracing::debug!(path = %staged.path.display(), "staged file released");
                Ok(())
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(release_error(staged, err)),
        }
    }

    fn release_blocking(&self, staged: &StagedFile) -> Result<(), DomainError> {
        match std::fs::remove_file(&staged.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(release_error(staged, err)),
        }
    }
}

async fn copy_into(source: &Path, target: &mut File) -> io::Result<u64> {
    let mut source_file = File::open(source).await?;
    let expected = source_file.metadata().await?.len();
    let copied = tokio::io::copy(&mut source_file, target).await?;
    target.flush().await?;
    target.sync_all().await?;
    if copied != expected {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("copied {copied} of {expected} bytes"),
        ));
    }
    Ok(copied)
}

async fn verify_readable(path: &Path, expected: u64) -> io::Result<()> {
    let file = File::open(path).await?;
    let actual = file.metadata().await?.len();
    if actual != expected {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("expected {expected} bytes on disk, found {actual}"),
        ));
    }
    Ok(())
}

fn release_error(staged: &StagedFile, err: io::Error) -> DomainError {
    DomainError::Internal(format!(
        "cannot remove staged file {}: {err}",
        staged.path.display()
    ))
}
