use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment, File, FileFormat};
use farmx_mission::{DetectionFilter, MissionSettings, SpraySettings};
use farmx_targeting::{DEFAULT_GRID_SIZE, LinearDrift, ServoLimits};
use serde::Deserialize;
use tracing::{error, info};

use crate::sim::SimSettings;

const DEFAULT_CONFIG_PATH: &str = "config/default.toml";
const ENV_PREFIX: &str = "FARMX";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    pub size: u32,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self { size: DEFAULT_GRID_SIZE }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct WindConfig {
    pub compensation_factor: f64,
}

impl Default for WindConfig {
    fn default() -> Self {
        Self {
            compensation_factor: LinearDrift::DEFAULT_COMPENSATION_FACTOR,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory for per-waypoint coordinate lists. Unset disables them.
    pub coords_dir: Option<PathBuf>,
}

/// Everything the CLI needs to assemble a mission.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct FarmxConfig {
    pub grid: GridConfig,
    pub servo: ServoLimits,
    pub wind: WindConfig,
    pub detection: DetectionFilter,
    pub spray: SpraySettings,
    pub mission: MissionSettings,
    pub output: OutputConfig,
    pub sim: SimSettings,
}

/// Layer built-in defaults, the TOML file and `FARMX__*` environment variables.
///
/// With no explicit `path` the default file is optional; an explicit one must
/// exist.
pub fn load_config(path: Option<&Path>) -> Result<FarmxConfig, ConfigError> {
    let (path, required) = match path {
        Some(path) => (path, true),
        None => (Path::new(DEFAULT_CONFIG_PATH), false),
    };
    info!("Attempting to load configuration from {}", path.display());

    let file = File::from(path).format(FileFormat::Toml).required(required);
    match build(file, env_source()) {
        Ok(config) => {
            info!("Successfully loaded configuration: {:?}", config);
            Ok(config)
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            Err(e)
        }
    }
}

fn env_source() -> Environment {
    Environment::with_prefix(ENV_PREFIX).separator("__").try_parsing(true)
}

fn build<S>(file: S, env: Environment) -> Result<FarmxConfig, ConfigError>
where
    S: config::Source + Send + Sync + 'static,
{
    Config::builder()
        .add_source(file)
        .add_source(env)
        .build()?
        .try_deserialize()
}
