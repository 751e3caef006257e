use config::{builder::BuilderState, ConfigBuilder, ConfigError};
use envconfig::Envconfig;
use tracing::debug;

use crate::log::{LogFormat, LogLevel};

#[derive(Envconfig, Default)]
pub struct EnvVarOverrides {
    // Logger overrides
    #[envconfig(from = "LOG_LEVEL")]
    pub log_level: Option<LogLevel>,
    #[envconfig(from = "LOG_FORMAT")]
    pub log_format: Option<LogFormat>,
    #[envconfig(from = "LOG_FILTER")]
    pub log_filter: Option<String>,

    // Planner overrides
    #[envconfig(from = "QUERY_PLANNER_TIMEOUT")]
    pub query_planner_timeout: Option<String>,

    // Traffic shaping overrides
    #[envconfig(from = "DEFAULT_SUBGRAPH_TIMEOUT")]
    pub default_subgraph_timeout: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum EnvVarOverridesError {
    #[error("Failed to override configuration: {0}")]
    FailedToOverrideConfig(#[from] ConfigError),
    #[error("Invalid duration in {0}: {1}")]
    InvalidDuration(&'static str, String),
}

impl EnvVarOverrides {
    pub fn apply_overrides<T: BuilderState>(
        mut self,
        mut config: ConfigBuilder<T>,
    ) -> Result<ConfigBuilder<T>, EnvVarOverridesError> {
        if let Some(log_level) = self.log_level.take() {
            debug!("[config-override] 'log.level' = {:?}", log_level);
            config = config.set_override("log.level", log_level.as_str())?;
        }
        if let Some(log_format) = self.log_format.take() {
            debug!("[config-override] 'log.format' = {:?}", log_format);
            config = config.set_override("log.format", log_format.as_str())?;
        }
        if let Some(log_filter) = self.log_filter.take() {
            debug!("[config-override] 'log.filter' = {:?}", log_filter);
            config = config.set_override("log.filter", log_filter)?;
        }

        if let Some(timeout) = self.query_planner_timeout.take() {
            validate_duration("QUERY_PLANNER_TIMEOUT", &timeout)?;
            debug!("[config-override] 'query_planner.timeout' = {}", timeout);
            config = config.set_override("query_planner.timeout", timeout)?;
        }

        if let Some(timeout) = self.default_subgraph_timeout.take() {
            validate_duration("DEFAULT_SUBGRAPH_TIMEOUT", &timeout)?;
            debug!("[config-override] 'traffic_shaping.all.timeout' = {}", timeout);
            config = config.set_override("traffic_shaping.all.timeout", timeout)?;
        }

        Ok(config)
    }
}

fn validate_duration(variable: &'static str, value: &str) -> Result<(), EnvVarOverridesError> {
    humantime::parse_duration(value)
        .map(|_| ())
        .map_err(|e| EnvVarOverridesError::InvalidDuration(variable, e.to_string()))
}
