use std::net::TcpListener;
use std::path::PathBuf;
use std::time::Duration;

use reqwest::Client;

use transcription_configuration::AppConfig;
use transcription_setup::build_and_run;

pub struct TestFixture {
    pub root: tempfile::TempDir,
    pub staging_dir: PathBuf,
    pub upload_dir: PathBuf,
}

impl TestFixture {
    pub fn staged_count(&self) -> usize {
        std::fs::read_dir(&self.staging_dir)
            .map(|entries| entries.count())
            .unwrap_or(0)
    }

    pub fn upload_count(&self) -> usize {
        std::fs::read_dir(&self.upload_dir)
            .map(|entries| entries.count())
            .unwrap_or(0)
    }
}

fn free_port() -> Result<u16, Box<dyn std::error::Error>> {
    let listener = TcpListener::bind("127.0.0.1:0")?;
    Ok(listener.local_addr()?.port())
}

pub async fn setup_test_server(
    worker_script: &str,
    timeout_secs: Option<u64>,
) -> Result<(TestFixture, String, Client), Box<dyn std::error::Error>> {
    setup_test_server_with(worker_script, timeout_secs, |_| Ok(())).await
}

/// Like `setup_test_server`, with a hook to adjust the fixture's config
/// before the service starts.
pub async fn setup_test_server_with<F>(
    worker_script: &str,
    timeout_secs: Option<u64>,
    customize: F,
) -> Result<(TestFixture, String, Client), Box<dyn std::error::Error>>
where
    F: FnOnce(&mut AppConfig) -> Result<(), Box<dyn std::error::Error>>,
{
    let root = tempfile::tempdir()?;
    let script = root.path().join("transcribe.sh");
    std::fs::write(&script, worker_script)?;
    let staging_dir = root.path().join("processed_audio");
    let upload_dir = root.path().join("uploads");

    let mut config = AppConfig::default();
    config.server.host = "127.0.0.1".to_string();
    config.server.port = free_port()?;
    config.service.worker.executable_path = "sh".to_string();
    config.service.worker.entrypoint_path = script.to_string_lossy().into_owned();
    config.service.worker.invocation_timeout_secs = timeout_secs;
    config.service.staging.directory = staging_dir.to_string_lossy().into_owned();
    config.service.upload.directory = upload_dir.to_string_lossy().into_owned();
    customize(&mut config)?;

    let base_url = format!("http://127.0.0.1:{}", config.server.port);
    tokio::spawn(async move {
        if let Err(err) = build_and_run(config).await {
            eprintln!("test server stopped: {err}");
        }
    });

    let client = Client::new();
    for _ in 0..50 {
        if client
            .get(format!("{base_url}/health"))
            .send()
            .await
            .is_ok()
        {
            let fixture = TestFixture {
                root,
                staging_dir,
                upload_dir,
            };
            return Ok((fixture, base_url, client));
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    Err("test server did not become ready".into())
}
