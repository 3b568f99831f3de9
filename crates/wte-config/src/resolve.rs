//! Config resolution: CLI flag → environment → XDG config dir → defaults.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::pipeline::{ConfigError, PipelineConfig};

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV_VAR: &str = "WTE_CONFIG";

const CONFIG_DIR_NAME: &str = "warehouse_efficiency";
const CONFIG_FILE_STEMS: [&str; 2] = ["pipeline.json", "pipeline.toml"];

/// Where the effective configuration came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "path", rename_all = "snake_case")]
pub enum ConfigSource {
    Cli(PathBuf),
    Env(PathBuf),
    Xdg(PathBuf),
    Defaults,
}

/// Candidate config locations, gathered once and resolved in priority order.
#[derive(Debug, Clone, Default)]
pub struct ConfigPaths {
    pub cli: Option<PathBuf>,
    pub env: Option<PathBuf>,
    pub xdg_dir: Option<PathBuf>,
}

impl ConfigPaths {
    /// Collect candidates from the CLI flag, `WTE_CONFIG` and the XDG config dir.
    pub fn discover(cli: Option<&Path>) -> Self {
        Self {
            cli: cli.map(Path::to_path_buf),
            env: std::env::var_os(CONFIG_ENV_VAR)
                .filter(|v| !v.is_empty())
                .map(PathBuf::from),
            xdg_dir: dirs::config_dir().map(|d| d.join(CONFIG_DIR_NAME)),
        }
    }
}

/// The effective configuration and its origin.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub config: PipelineConfig,
    pub source: ConfigSource,
}

/// Resolve the configuration from the given candidates.
///
/// An explicit CLI or env path must exist; a missing XDG file silently falls
/// through to the built-in defaults.
pub fn resolve_config(paths: &ConfigPaths) -> Result<ResolvedConfig, ConfigError> {
    if let Some(path) = &paths.cli {
        return Ok(ResolvedConfig {
            config: PipelineConfig::load(path)?,
            source: ConfigSource::Cli(path.clone()),
        });
    }

    if let Some(path) = &paths.env {
        return Ok(ResolvedConfig {
            config: PipelineConfig::load(path)?,
            source: ConfigSource::Env(path.clone()),
        });
    }

    if let Some(dir) = &paths.xdg_dir {
        for stem in CONFIG_FILE_STEMS {
            let candidate = dir.join(stem);
            if candidate.exists() {
                return Ok(ResolvedConfig {
                    config: PipelineConfig::load(&candidate)?,
                    source: ConfigSource::Xdg(candidate),
                });
            }
        }
    }

    Ok(ResolvedConfig {
        config: PipelineConfig::default(),
        source: ConfigSource::Defaults,
    })
}
