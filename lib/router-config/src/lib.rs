mod env_overrides;
pub mod log;
pub mod query_planner;
pub mod traffic_shaping;

use std::path::PathBuf;

use config::{Config, File, FileFormat, FileSourceFile};
use envconfig::Envconfig;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub use crate::env_overrides::{EnvVarOverrides, EnvVarOverridesError};
use crate::{
    log::LoggingConfig, query_planner::QueryPlannerConfig, traffic_shaping::TrafficShapingConfig,
};

#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct RouterConfig {
    /// The logger configuration.
    ///
    /// Mostly silent (`info`) by default: only important messages, warnings, and errors.
    #[serde(default)]
    pub log: LoggingConfig,

    /// Query planning configuration.
    #[serde(default)]
    pub query_planner: QueryPlannerConfig,

    /// Controls how sub-requests to subgraphs are executed.
    #[serde(default)]
    pub traffic_shaping: TrafficShapingConfig,
}

#[derive(Debug, thiserror::Error)]
pub enum RouterConfigError {
    #[error("Failed to load configuration: {0}")]
    ConfigLoadError(#[from] config::ConfigError),
    #[error("Failed to apply configuration overrides: {0}")]
    EnvVarOverridesError(#[from] EnvVarOverridesError),
    #[error("Failed to load the environment variables: {0}")]
    EnvVarLoadError(#[from] envconfig::Error),
}

static DEFAULT_FILE_NAMES: &[&str] = &[
    "conductor.config.yaml",
    "conductor.config.yml",
    "conductor.config.json",
];

/// Loads the configuration from `config_path`, or from the first default file name
/// found in the working directory, then applies environment overrides.
pub fn load_config(config_path: Option<PathBuf>) -> Result<RouterConfig, RouterConfigError> {
    let env_overrides = EnvVarOverrides::init_from_env()?;
    let mut config = Config::builder();

    match config_path {
        Some(path) => {
            let as_file: File<FileSourceFile, _> = path.into();
            config = config.add_source(as_file.required(true));
        }
        None => {
            for name in DEFAULT_FILE_NAMES {
                config = config.add_source(File::with_name(name).required(false));
            }
        }
    }

    config = env_overrides.apply_overrides(config)?;

    Ok(config.build()?.try_deserialize::<RouterConfig>()?)
}

pub fn parse_yaml_config(config_raw: &str) -> Result<RouterConfig, RouterConfigError> {
    parse_yaml_config_with_overrides(config_raw, EnvVarOverrides::default())
}

pub fn parse_yaml_config_with_overrides(
    config_raw: &str,
    env_overrides: EnvVarOverrides,
) -> Result<RouterConfig, RouterConfigError> {
    let config = Config::builder().add_source(File::from_str(config_raw, FileFormat::Yaml));
    let config = env_overrides.apply_overrides(config)?;

    Ok(config.build()?.try_deserialize::<RouterConfig>()?)
}
