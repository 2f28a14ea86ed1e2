use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use std::path::Path;
use thiserror::Error;

use crate::domain::models::config::Config;

/// Directory holding project-local configuration files
pub const CONFIG_DIR: &str = ".impartial";

/// Prefix of environment overrides (`IMPARTIAL_EXPERIMENT__N=20`)
pub const ENV_PREFIX: &str = "IMPARTIAL_";

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid experiment parameters: {0}")]
    InvalidExperiment(String),

    #[error("Sweep axis '{0}' cannot be empty")]
    EmptySweepAxis(&'static str),

    #[error("Invalid sweep value for '{axis}': {reason}")]
    InvalidSweepValue { axis: &'static str, reason: String },

    #[error("Invalid score spread: {0}. Must be at least 1")]
    InvalidSpread(u64),

    #[error("Output directory cannot be empty")]
    EmptyOutputDir,

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .impartial/config.yaml (project config)
    /// 3. .impartial/local.yaml (project local overrides, optional)
    /// 4. Environment variables (IMPARTIAL_* prefix, highest priority)
    pub fn load() -> Result<Config> {
        Self::load_from_dir(".")
    }

    /// Same as [`ConfigLoader::load`] with `.impartial/` resolved under `root`
    pub fn load_from_dir(root: impl AsRef<Path>) -> Result<Config> {
        let dir = root.as_ref().join(CONFIG_DIR);
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(dir.join("config.yaml")))
            .merge(Yaml::file(dir.join("local.yaml")))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file, still honouring env overrides
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .context(format!(
                "Failed to load config from {}",
                path.as_ref().display()
            ))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        config
            .experiment
            .validate()
            .map_err(|e| ConfigError::InvalidExperiment(e.to_string()))?;

        let sweep = &config.sweep;
        let axes: [(&'static str, bool); 7] = [
            ("ls", sweep.ls.is_empty()),
            ("ns", sweep.ns.is_empty()),
            ("ks", sweep.ks.is_empty()),
            ("ms", sweep.ms.is_empty()),
            ("scores_modes", sweep.scores_modes.is_empty()),
            ("off_chain", sweep.off_chain.is_empty()),
            ("rev_percs", sweep.rev_percs.is_empty()),
        ];
        if let Some((axis, _)) = axes.iter().find(|(_, empty)| *empty) {
            return Err(ConfigError::EmptySweepAxis(*axis));
        }

        for (axis, values) in [
            ("ls", &sweep.ls),
            ("ns", &sweep.ns),
            ("ks", &sweep.ks),
            ("ms", &sweep.ms),
        ] {
            if values.contains(&0) {
                return Err(ConfigError::InvalidSweepValue {
                    axis,
                    reason: "values must be at least 1".to_string(),
                });
            }
        }
        if let Some(p) = sweep.rev_percs.iter().find(|p| !(**p > 0.0 && **p <= 1.0)) {
            return Err(ConfigError::InvalidSweepValue {
                axis: "rev_percs",
                reason: format!("{p} is outside (0, 1]"),
            });
        }

        if config.evaluation.spread == 0 {
            return Err(ConfigError::InvalidSpread(config.evaluation.spread));
        }

        if config.output.dir.as_os_str().is_empty() {
            return Err(ConfigError::EmptyOutputDir);
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        Ok(())
    }
}
