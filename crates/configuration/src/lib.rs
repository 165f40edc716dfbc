use std::path::Path;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::ConfigError;
use crate::settings::Config;

// Declare the modules that make up this crate.
pub mod error;
pub mod settings;

// Re-export the core types to provide a clean public API.
pub use settings::{
    ApiConfig, ApiKeyPair, BrokerConfig, Config, DatabaseConfig, LiveEngineConfig, LoggingConfig,
    SentimentProvidersConfig, TelegramConfig, WorkflowConfig,
};

const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Loads the application configuration from a TOML file.
///
/// `path` defaults to `config.toml` in the working directory when `None`.
/// This is the primary entry point for this crate: it reads the file,
/// deserializes it into our strongly-typed `Config`, and returns it.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

    let builder = config::Config::builder()
        .add_source(config::File::with_name(&path))
        // Lets deployment secrets and overrides flow in as `APP__SECTION__FIELD`.
        .add_source(config::Environment::with_prefix("APP").separator("__"))
        .build()?;

    let config = builder.try_deserialize::<Config>()?;

    Ok(config)
}

/// Installs the global `tracing` subscriber from the `[logging]` section.
///
/// Stdout logging is always enabled, filtered by `logging.level` (or the
/// `RUST_LOG` environment variable, which takes precedence). When
/// `logging.file_logging` is set, a daily-rotating file appender is layered
/// on top, writing to `logging.log_directory/logging.log_filename.<date>`.
///
/// Returns the `WorkerGuard` for the file appender, which must be kept alive
/// for the lifetime of the process for buffered file writes to flush.
pub fn init_tracing(logging: &LoggingConfig) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>, ConfigError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(logging.level.clone()));

    let stdout_layer = fmt::layer().with_target(true);

    if logging.file_logging {
        std::fs::create_dir_all(&logging.log_directory)?;
        let appender = tracing_appender::rolling::daily(&logging.log_directory, &logging.log_filename);
        let (non_blocking, guard) = tracing_appender::non_blocking(appender);
        let file_layer = fmt::layer().with_ansi(false).with_writer(non_blocking);

        tracing_subscriber::registry()
            .with(filter)
            .with(stdout_layer)
            .with(file_layer)
            .try_init()
            .map_err(|e| ConfigError::TracingInit(e.to_string()))?;

        Ok(Some(guard))
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(stdout_layer)
            .try_init()
            .map_err(|e| ConfigError::TracingInit(e.to_string()))?;

        Ok(None)
    }
}
