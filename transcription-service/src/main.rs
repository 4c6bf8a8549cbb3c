use anyhow::Result;
use transcription_configuration::{load_config, setup_logging};
use transcription_setup::Application;

#[tokio::main]
async fn main() -> Result<()> {
    let config = load_config()?;
    setup_logging(&config);
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        "Whisper Transcription Backend starting"
    );
    let app = Application::new(config).await?;
    app.run().await?;
    Ok(())
}
