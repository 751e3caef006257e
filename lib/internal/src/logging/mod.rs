pub mod file;
pub mod stdout;
pub mod utils;

use conductor_config::log::{LogOutput, LoggingConfig};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Registry};

use crate::logging::{file::build_file_layer, stdout::build_stdout_layer, utils::DynLayer};

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("Invalid log filter \"{0}\": {1}")]
    InvalidFilter(String, String),
    #[error("Failed to open log directory \"{0}\": {1}")]
    FileAppender(String, String),
    #[error("A global logger is already installed: {0}")]
    AlreadyInitialized(String),
}

/// Builds the layer described by `config`. The returned guard flushes buffered lines
/// when dropped and must be kept alive for as long as logging is needed.
pub fn logging_layer_from_config<S>(
    config: &LoggingConfig,
) -> Result<(DynLayer<S>, WorkerGuard), LoggingError>
where
    S: tracing::Subscriber
        + for<'span> tracing_subscriber::registry::LookupSpan<'span>
        + Send
        + Sync,
{
    match &config.output {
        LogOutput::Stdout => build_stdout_layer(config),
        LogOutput::File {
            directory,
            file_name_prefix,
        } => build_file_layer(config, directory, file_name_prefix),
    }
}

/// Installs the global subscriber.
pub fn init_logging(config: &LoggingConfig) -> Result<WorkerGuard, LoggingError> {
    let (layer, guard) = logging_layer_from_config::<Registry>(config)?;

    tracing_subscriber::registry()
        .with(layer)
        .try_init()
        .map_err(|e| LoggingError::AlreadyInitialized(e.to_string()))?;

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use conductor_config::log::{LogFormat, LogOutput, LoggingConfig};
    use tracing_subscriber::Registry;

    use super::{logging_layer_from_config, LoggingError};

    #[test]
    fn every_format_builds_a_layer() {
        for format in [LogFormat::Json, LogFormat::PrettyCompact, LogFormat::PrettyTree] {
            let config = LoggingConfig {
                format,
                ..Default::default()
            };

            assert!(logging_layer_from_config::<Registry>(&config).is_ok());
        }
    }

    #[test]
    fn filters_are_validated() {
        let config = LoggingConfig {
            filter: Some("conductor_plan_executor=loud".to_string()),
            ..Default::default()
        };

        assert!(matches!(
            logging_layer_from_config::<Registry>(&config),
            Err(LoggingError::InvalidFilter(_, _))
        ));
    }

    #[test]
    fn file_output_writes_into_the_directory() {
        let directory = std::env::temp_dir().join("conductor-logging-test");
        let config = LoggingConfig {
            format: LogFormat::Json,
            output: LogOutput::File {
                directory: directory.to_string_lossy().to_string(),
                file_name_prefix: "conductor.log".to_string(),
            },
            ..Default::default()
        };

        assert!(logging_layer_from_config::<Registry>(&config).is_ok());
        assert!(directory.is_dir());
    }
}
