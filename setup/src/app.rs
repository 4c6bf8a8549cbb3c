use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Error;
use axum::Router;
use transcription_application::{
    TranscriptionPipeline, TranscriptionUseCase, TranscriptionUseCaseImpl,
};
use transcription_configuration::AppConfig;
use transcription_domain::{StagingPort, WorkerCommand, WorkerPort};
use transcription_http_server::{build_router, run_server, AppState};
use transcription_infra_staging::FsStagingStore;
use transcription_infra_worker::SubprocessWorker;

pub async fn build_and_run(config: AppConfig) -> Result<(), Error> {
    let app = Application::new(config).await?;
    app.run().await
}

pub struct Application {
    pub config: AppConfig,
    pub state: AppState,
}

impl Application {
    pub async fn new(config: AppConfig) -> Result<Self, Error> {
        let worker_config = &config.service.worker;
        let staging_config = &config.service.staging;
        let upload_config = &config.service.upload;

        if worker_config.executable_path.trim().is_empty() {
            anyhow::bail!("service.worker.executable_path must not be empty");
        }
        if upload_config.max_bytes == 0 {
            anyhow::bail!("service.upload.max_bytes must be greater than zero");
        }

        tracing::info!(
            executable = %worker_config.executable_path,
            entrypoint = %worker_config.entrypoint_path,
            timeout_secs = ?worker_config.invocation_timeout().map(|t| t.as_secs()),
            staging_directory = %staging_config.directory,
            upload_directory = %upload_config.directory,
            "initializing transcription application"
        );

        let staging: Arc<dyn StagingPort> = Arc::new(FsStagingStore::new(
            &staging_config.directory,
            staging_config.target_extension.as_str(),
        ));
        let worker: Arc<dyn WorkerPort> = Arc::new(SubprocessWorker::new());
        let command = WorkerCommand {
            executable: worker_config.executable_path.clone(),
            entrypoint: Some(worker_config.entrypoint_path.clone())
                .filter(|entrypoint| !entrypoint.trim().is_empty()),
            timeout: worker_config.invocation_timeout(),
            max_output_bytes: worker_config.max_output_bytes,
        };

        let pipeline = TranscriptionPipeline::new(staging, worker, command);
        let usecase: Arc<dyn TranscriptionUseCase> =
            Arc::new(TranscriptionUseCaseImpl::new(pipeline));
        let state = AppState {
            usecase,
            upload_directory: PathBuf::from(&upload_config.directory),
            field_name: upload_config.field_name.clone(),
            max_upload_bytes: upload_config.max_bytes,
        };

        Ok(Self { config, state })
    }

    pub fn router(&self) -> Router {
        build_router(self.state.clone())
    }

    pub async fn run(self) -> Result<(), Error> {
        let bind_addr = self.config.server.bind_address();
        tracing::info!(
            host = %self.config.server.host,
            port = self.config.server.port,
            "starting transcription HTTP routes"
        );

        run_server(self.router(), &bind_addr)
            .await
            .map_err(|err| anyhow::anyhow!("server startup failed: {err}"))
    }
}
