#![cfg(unix)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use transcription_application::{
    ApplicationError, TranscribeUploadRequest, TranscriptionPipeline, TranscriptionUseCase,
    TranscriptionUseCaseImpl,
};
use transcription_domain::{FailureKind, PipelineOutcome, StagingPort, WorkerCommand, WorkerPort};
use transcription_infra_staging::FsStagingStore;
use transcription_infra_worker::SubprocessWorker;

struct Harness {
    _root: tempfile::TempDir,
    uploads: PathBuf,
    staging: PathBuf,
    usecase: TranscriptionUseCaseImpl,
}

fn harness(worker_script: &str, timeout: Option<Duration>) -> Harness {
    let root = tempfile::tempdir().expect("tempdir");
    let uploads = root.path().join("uploads");
    let staging = root.path().join("processed_audio");
    std::fs::create_dir_all(&uploads).expect("uploads dir");
    let script = root.path().join("transcribe.sh");
    std::fs::write(&script, worker_script).expect("write worker");

    let store: Arc<dyn StagingPort> = Arc::new(FsStagingStore::new(&staging, "wav"));
    let worker: Arc<dyn WorkerPort> = Arc::new(SubprocessWorker::new());
    let pipeline = TranscriptionPipeline::new(
        store,
        worker,
        WorkerCommand {
            executable: "sh".to_string(),
            entrypoint: Some(script.to_string_lossy().into_owned()),
            timeout,
            max_output_bytes: 64 * 1024,
        },
    );

    Harness {
        _root: root,
        uploads,
        staging,
        usecase: TranscriptionUseCaseImpl::new(pipeline),
    }
}

fn upload(dir: &Path, name: &str) -> TranscribeUploadRequest {
    let path = dir.join(name);
    std::fs::write(&path, b"RIFF....WAVEfmt ").expect("write upload");
    TranscribeUploadRequest {
        upload_path: path,
        original_name: name.to_string(),
        media_type: "audio/wav".to_string(),
        request_id: Some("it-session".to_string()),
    }
}

fn staged_files(dir: &Path) -> usize {
    match std::fs::read_dir(dir) {
        Ok(entries) => entries.count(),
        Err(_) => 0,
    }
}

#[tokio::test]
async fn worker_sees_staged_wav_and_file_is_removed_afterwards() {
    let h = harness(
        "echo 'loading model...'\ncase \"$1\" in *.wav) ;; *) exit 3 ;; esac\ntest -r \"$1\" || exit 4\nprintf '{\"transcription\":\"hello world\"}'\n",
        Some(Duration::from_secs(10)),
    );
    let request = upload(&h.uploads, "memo.m4a");
    let original = request.upload_path.clone();

    let response = h.usecase.transcribe(request).await.expect("transcribe");

    assert_eq!(response.request_id, "it-session");
    assert_eq!(response.outcome, PipelineOutcome::succeeded("hello world"));
    assert!(!original.exists());
    assert_eq!(staged_files(&h.staging), 0);
}

#[tokio::test]
async fn empty_transcription_is_success() {
    let h = harness("echo '{\"transcription\":\"\"}'\n", None);

    let response = h
        .usecase
        .transcribe(upload(&h.uploads, "silence.wav"))
        .await
        .expect("transcribe");

    assert_eq!(response.outcome, PipelineOutcome::succeeded(""));
    assert_eq!(staged_files(&h.staging), 0);
}

#[tokio::test]
async fn malformed_output_is_parse_error_with_raw_text() {
    let h = harness("printf 'no json here'\n", None);

    let response = h
        .usecase
        .transcribe(upload(&h.uploads, "a.wav"))
        .await
        .expect("transcribe");

    match response.outcome {
        PipelineOutcome::Failed { kind, details, .. } => {
            assert_eq!(kind, FailureKind::Parse);
            assert_eq!(details, "no json here");
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    assert_eq!(staged_files(&h.staging), 0);
}

#[tokio::test]
async fn non_zero_exit_is_execution_error() {
    let h = harness("echo 'model load failed' >&2\nexit 1\n", None);

    let response = h
        .usecase
        .transcribe(upload(&h.uploads, "a.wav"))
        .await
        .expect("transcribe");

    match response.outcome {
        PipelineOutcome::Failed {
            kind,
            error,
            details,
        } => {
            assert_eq!(kind, FailureKind::WorkerExecution);
            assert_eq!(error, "Transcription failed");
            assert_eq!(details, "model load failed");
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    assert_eq!(staged_files(&h.staging), 0);
}

#[tokio::test]
async fn hanging_worker_times_out_and_is_cleaned_up() {
    let h = harness("exec sleep 30\n", Some(Duration::from_millis(300)));

    let response = h
        .usecase
        .transcribe(upload(&h.uploads, "a.wav"))
        .await
        .expect("transcribe");

    assert_eq!(
        response.outcome.failure_kind(),
        Some(FailureKind::WorkerTimeout)
    );
    assert_eq!(staged_files(&h.staging), 0);
}

#[tokio::test]
async fn missing_upload_is_upload_processing_error() {
    let h = harness("echo '{\"transcription\":\"never\"}'\n", None);
    let mut request = upload(&h.uploads, "a.wav");
    request.upload_path = h.uploads.join("does-not-exist.wav");

    let response = h.usecase.transcribe(request).await.expect("transcribe");

    assert_eq!(
        response.outcome.failure_kind(),
        Some(FailureKind::UploadProcessing)
    );
    assert_eq!(staged_files(&h.staging), 0);
}

#[tokio::test]
async fn non_audio_upload_is_rejected_before_staging() {
    let h = harness("echo '{\"transcription\":\"never\"}'\n", None);
    let mut request = upload(&h.uploads, "clip.mp4");
    request.media_type = "video/mp4".to_string();
    let original = request.upload_path.clone();

    let err = h.usecase.transcribe(request).await.expect_err("rejected");

    assert!(matches!(err, ApplicationError::Validation(_)));
    assert!(original.exists());
}

#[tokio::test]
async fn concurrent_requests_do_not_interfere() {
    let h = Arc::new(harness(
        "sleep 0.1\nprintf '{\"transcription\":\"%s\"}' \"$(basename \"$1\")\"\n",
        Some(Duration::from_secs(10)),
    ));

    let mut handles = Vec::new();
    for idx in 0..8 {
        let h = h.clone();
        handles.push(tokio::spawn(async move {
            let mut request = upload(&h.uploads, &format!("{idx}.wav"));
            request.request_id = None;
            h.usecase.transcribe(request).await.expect("transcribe")
        }));
    }

    let mut names = std::collections::HashSet::new();
    for handle in handles {
        match handle.await.expect("join").outcome {
            PipelineOutcome::Succeeded { transcription } => {
                assert!(transcription.ends_with(".wav"));
                names.insert(transcription);
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }
    assert_eq!(names.len(), 8);
    assert_eq!(staged_files(&h.staging), 0);
}
