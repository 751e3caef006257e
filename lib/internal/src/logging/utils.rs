use conductor_config::log::LoggingConfig;
use tracing_subscriber::{EnvFilter, Layer};

use crate::logging::LoggingError;

pub type DynLayer<S> = Box<dyn Layer<S> + Send + Sync + 'static>;

pub fn create_env_filter(config: &LoggingConfig) -> Result<EnvFilter, LoggingError> {
    let directive = config.env_filter_str();
    EnvFilter::try_new(directive)
        .map_err(|e| LoggingError::InvalidFilter(directive.to_string(), e.to_string()))
}
