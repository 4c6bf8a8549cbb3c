use std::io;
use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use transcription_domain::{DomainError, WorkerCommand, WorkerInvocation, WorkerPort};

const READ_CHUNK_BYTES: usize = 8 * 1024;

// How long the pipes may stay open once the worker itself has exited.
const OUTPUT_GRACE: Duration = Duration::from_millis(500);

const MAX_LOG_LINE_BYTES: usize = 4 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamKind {
    Stdout,
    Stderr,
}

impl StreamKind {
    fn as_str(&self) -> &'static str {
        match self {
            StreamKind::Stdout => "stdout",
            StreamKind::Stderr => "stderr",
        }
    }
}

/// Runs the transcription worker as a child process.
#[derive(Debug, Default, Clone)]
pub struct SubprocessWorker;

impl SubprocessWorker {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl WorkerPort for SubprocessWorker {
    async fn invoke(
        &self,
        command: &WorkerCommand,
        staged_path: &Path,
    ) -> Result<WorkerInvocation, DomainError> {
        let args = command.arguments(staged_path);
        tracing::info!(
            program = %command.executable,
            args = ?args,
            timeout = ?command.timeout,
            "starting worker process"
        );

        let started = Instant::now();
        let mut child = Command::new(&command.executable)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|err| {
                DomainError::WorkerStart(format!(
                    "could not start `{}`: {err}",
                    command.executable
                ))
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| DomainError::internal_error("worker stdout was not captured"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| DomainError::internal_error("worker stderr was not captured"))?;

        // Dropping `stop` (early return, cancelled request) also ends both readers.
        let (stop, stop_rx) = watch::channel(false);
        let limit = command.max_output_bytes;
        let stdout_task = tokio::spawn(drain(stdout, limit, StreamKind::Stdout, stop_rx.clone()));
        let stderr_task = tokio::spawn(drain(stderr, limit, StreamKind::Stderr, stop_rx));

        let status = match command.timeout {
            Some(deadline) => match tokio::time::timeout(deadline, child.wait()).await {
                Ok(status) => status,
                Err(_) => {
                    terminate(&mut child).await;
                    let elapsed = started.elapsed();
                    tracing::warn!(
                        program = %command.executable,
                        elapsed = ?elapsed,
                        "worker process timed out and was killed"
                    );
                    return Err(DomainError::WorkerTimeout { elapsed });
                }
            },
            None => child.wait().await,
        }
        .map_err(|err| {
            DomainError::internal_error(&format!("failed while waiting for worker: {err}"))
        })?;
        let elapsed = started.elapsed();

        let grace_end = tokio::time::Instant::now() + OUTPUT_GRACE;
        let stdout = collect(stdout_task, grace_end, &stop, StreamKind::Stdout).await?;
        let stderr = collect(stderr_task, grace_end, &stop, StreamKind::Stderr).await?;

        let invocation = WorkerInvocation {
            program: command.executable.clone(),
            args,
            stdout,
            stderr,
            status,
            elapsed,
        };

        if !invocation.status.success() {
            tracing::error!(
                program = %invocation.program,
                exit_code = invocation.status.code(),
                elapsed = ?invocation.elapsed,
                "worker process exited with failure"
            );
            return Err(DomainError::WorkerExecution {
                code: invocation.status.code(),
                stderr: invocation.stderr_text(),
            });
        }

        tracing::info!(
            program = %invocation.program,
            elapsed = ?invocation.elapsed,
            stdout_bytes = invocation.stdout.len(),
            "worker process finished"
        );
        Ok(invocation)
    }
}

async fn terminate(child: &mut Child) {
    if let Err(err) = child.kill().await {
        tracing::warn!(error = %err, "could not kill worker process");
    }
}

/// Waits for a reader until `grace_end`; past that, stops both readers and
/// keeps whatever they captured. A background process that inherited the
/// pipes can hold them open long after the worker exited.
async fn collect(
    mut task: JoinHandle<io::Result<Vec<u8>>>,
    grace_end: tokio::time::Instant,
    stop: &watch::Sender<bool>,
    stream: StreamKind,
) -> Result<Vec<u8>, DomainError> {
    let joined = match tokio::time::timeout_at(grace_end, &mut task).await {
        Ok(joined) => joined,
        Err(_) => {
            tracing::debug!(
                stream = stream.as_str(),
                "worker output still open after exit, keeping what was captured"
            );
            let _ = stop.send(true);
            task.await
        }
    };

    match joined {
        Ok(Ok(captured)) => Ok(captured),
        Ok(Err(err)) => Err(DomainError::internal_error(&format!(
            "failed to read worker {}: {err}",
            stream.as_str()
        ))),
        Err(err) => Err(DomainError::internal_error(&format!(
            "worker {} reader stopped: {err}",
            stream.as_str()
        ))),
    }
}

/// Reads `reader` until EOF or until `stop` fires, keeping at most the last
/// `limit` bytes.
///
/// The worker's answer sits at the end of its output, so the tail is what
/// survives when a stream overflows.
async fn drain<R>(
    mut reader: R,
    limit: usize,
    stream: StreamKind,
    mut stop: watch::Receiver<bool>,
) -> io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut captured = Vec::new();
    let mut chunk = vec![0u8; READ_CHUNK_BYTES];
    let mut lines = LineBuffer::default();
    let mut overflowed = false;

    loop {
        let read = tokio::select! {
            read = reader.read(&mut chunk) => read?,
            _ = stop.changed() => break,
        };
        if read == 0 {
            break;
        }
        let data = &chunk[..read];
        if stream == StreamKind::Stderr {
            for line in lines.push(data) {
                tracing::debug!(stream = stream.as_str(), "{line}");
            }
        }

        captured.extend_from_slice(data);
        if captured.len() > limit.saturating_mul(2).max(READ_CHUNK_BYTES) {
            let excess = captured.len() - limit;
            captured.drain(..excess);
            if !overflowed {
                overflowed = true;
                tracing::warn!(
                    stream = stream.as_str(),
                    limit_bytes = limit,
                    "worker output exceeds capture limit, keeping the tail"
                );
            }
        }
    }

    if let Some(line) = lines.finish() {
        tracing::debug!(stream = stream.as_str(), "{line}");
    }
    if captured.len() > limit {
        let excess = captured.len() - limit;
        captured.drain(..excess);
    }
    Ok(captured)
}

/// Splits a byte stream into text lines, holding a partial line (and any
/// split UTF-8 sequence) until the rest of it arrives.
#[derive(Debug, Default)]
struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    fn push(&mut self, data: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(data);
        let mut lines = Vec::new();
        while let Some(end) = self.pending.iter().position(|byte| *byte == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=end).collect();
            lines.extend(decode_line(&line));
        }
        if self.pending.len() > MAX_LOG_LINE_BYTES {
            let line = std::mem::take(&mut self.pending);
            lines.extend(decode_line(&line));
        }
        lines
    }

    fn finish(&mut self) -> Option<String> {
        let line = std::mem::take(&mut self.pending);
        decode_line(&line)
    }
}

fn decode_line(raw: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(raw);
    let text = text.trim_end();
    (!text.is_empty()).then(|| text.to_string())
}
