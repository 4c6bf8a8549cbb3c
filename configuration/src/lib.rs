use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

mod logging;

pub use logging::setup_logging;

pub type AppConfig = TranscriptionConfig;

const ENV_PREFIX: &str = "TRANSCRIPTION_SERVICE";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("invalid value for {key}: {value}")]
    InvalidEnv { key: String, value: String },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TranscriptionConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub service: ServiceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default)]
    pub worker: WorkerConfig,
    #[serde(default)]
    pub staging: StagingConfig,
    #[serde(default)]
    pub upload: UploadConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    #[serde(default = "default_executable_path")]
    pub executable_path: String,
    #[serde(default = "default_entrypoint_path")]
    pub entrypoint_path: String,
    #[serde(default)]
    pub invocation_timeout_secs: Option<u64>,
    #[serde(default = "default_max_output_bytes")]
    pub max_output_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StagingConfig {
    #[serde(default = "default_staging_directory")]
    pub directory: String,
    #[serde(default = "default_target_extension")]
    pub target_extension: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    #[serde(default = "default_upload_directory")]
    pub directory: String,
    #[serde(default = "default_max_upload_bytes")]
    pub max_bytes: usize,
    #[serde(default = "default_field_name")]
    pub field_name: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            executable_path: default_executable_path(),
            entrypoint_path: default_entrypoint_path(),
            invocation_timeout_secs: None,
            max_output_bytes: default_max_output_bytes(),
        }
    }
}

impl WorkerConfig {
    pub fn invocation_timeout(&self) -> Option<Duration> {
        self.invocation_timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}

impl Default for StagingConfig {
    fn default() -> Self {
        Self {
            directory: default_staging_directory(),
            target_extension: default_target_extension(),
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            directory: default_upload_directory(),
            max_bytes: default_max_upload_bytes(),
            field_name: default_field_name(),
        }
    }
}

impl TranscriptionConfig {
    /// Layers `default.toml` and `<run_env>.toml` from `dir`; both optional.
    pub fn from_dir(dir: &Path, run_env: &str) -> Result<Self, ConfigError> {
        let mut merged = toml::Table::new();
        for name in ["default".to_string(), run_env.to_string()] {
            let path = dir.join(format!("{name}.toml"));
            if !path.is_file() {
                continue;
            }
            let raw = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
                path: path.clone(),
                source,
            })?;
            let table: toml::Table = toml::from_str(&raw).map_err(|source| ConfigError::Parse {
                path: path.clone(),
                source,
            })?;
            merge_tables(&mut merged, table);
        }

        toml::Value::Table(merged)
            .try_into()
            .map_err(|source| ConfigError::Parse {
                path: dir.to_path_buf(),
                source,
            })
    }

    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |suffix: &str| {
            let key = format!("{ENV_PREFIX}_{suffix}");
            lookup(&key).map(|value| (key, value))
        };

        if let Some((_, value)) = get("HOST") {
            self.server.host = value;
        }
        if let Some((key, value)) = get("PORT") {
            self.server.port = parse_env(&key, &value)?;
        }
        if let Some((_, value)) = get("LOG_LEVEL") {
            self.logging.level = value;
        }
        if let Some((_, value)) = get("WORKER_EXECUTABLE_PATH") {
            self.service.worker.executable_path = value;
        }
        if let Some((_, value)) = get("WORKER_ENTRYPOINT_PATH") {
            self.service.worker.entrypoint_path = value;
        }
        if let Some((key, value)) = get("WORKER_TIMEOUT_SECS") {
            self.service.worker.invocation_timeout_secs = Some(parse_env(&key, &value)?);
        }
        if let Some((_, value)) = get("STAGING_DIRECTORY") {
            self.service.staging.directory = value;
        }
        if let Some((_, value)) = get("UPLOAD_DIRECTORY") {
            self.service.upload.directory = value;
        }
        if let Some((key, value)) = get("MAX_UPLOAD_BYTES") {
            self.service.upload.max_bytes = parse_env(&key, &value)?;
        }
        Ok(())
    }
}

pub fn load_config() -> Result<TranscriptionConfig, ConfigError> {
    let run_env = std::env::var("RUN_ENV").unwrap_or_else(|_| "development".to_string());
    let dir = std::env::var(format!("{ENV_PREFIX}_CONFIG_DIR"))
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config"));
    let mut config = TranscriptionConfig::from_dir(&dir, &run_env)?;
    config.apply_env_overrides(|key| std::env::var(key).ok())?;
    Ok(config)
}

fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match value {
            toml::Value::Table(incoming) => {
                if let Some(toml::Value::Table(existing)) = base.get_mut(&key) {
                    merge_tables(existing, incoming);
                } else {
                    base.insert(key, toml::Value::Table(incoming));
                }
            }
            value => {
                base.insert(key, value);
            }
        }
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_executable_path() -> String {
    "python".to_string()
}

fn default_entrypoint_path() -> String {
    "transcribe.py".to_string()
}

fn default_max_output_bytes() -> usize {
    8 * 1024 * 1024
}

fn default_staging_directory() -> String {
    "processed_audio".to_string()
}

fn default_target_extension() -> String {
    "wav".to_string()
}

fn default_upload_directory() -> String {
    "uploads".to_string()
}

fn default_max_upload_bytes() -> usize {
    50 * 1024 * 1024
}

fn default_field_name() -> String {
    "audioFile".to_string()
}
