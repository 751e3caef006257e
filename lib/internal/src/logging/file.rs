use conductor_config::log::{LogFormat, LoggingConfig};
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling::{RollingFileAppender, Rotation},
};
use tracing_subscriber::{fmt::time::UtcTime, Layer};

use crate::logging::{
    utils::{create_env_filter, DynLayer},
    LoggingError,
};

/// Daily-rotated file output. The tree format has no meaning in a file and is written
/// as compact lines.
pub fn build_file_layer<S>(
    config: &LoggingConfig,
    directory: &str,
    file_name_prefix: &str,
) -> Result<(DynLayer<S>, WorkerGuard), LoggingError>
where
    S: tracing::Subscriber
        + for<'span> tracing_subscriber::registry::LookupSpan<'span>
        + Send
        + Sync,
{
    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(file_name_prefix)
        .build(directory)
        .map_err(|e| LoggingError::FileAppender(directory.to_string(), e.to_string()))?;

    let (file_writer, file_guard) = tracing_appender::non_blocking(appender);
    let filter = create_env_filter(config)?;
    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(file_writer)
        .with_ansi(false);

    let layer = match config.format {
        LogFormat::Json => file_layer
            .json()
            .with_timer(UtcTime::rfc_3339())
            .with_thread_ids(false)
            .with_target(false)
            .flatten_event(true)
            .with_filter(filter)
            .boxed(),
        LogFormat::PrettyCompact | LogFormat::PrettyTree => file_layer
            .compact()
            .with_thread_ids(false)
            .with_target(false)
            .with_timer(UtcTime::rfc_3339())
            .with_filter(filter)
            .boxed(),
    };

    Ok((layer, file_guard))
}
