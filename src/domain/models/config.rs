use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::experiment::{ExperimentParams, ScoresMode};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Parameters of a single `run`
    #[serde(default)]
    pub experiment: ExperimentParams,

    /// Parameter axes of a `sweep`
    #[serde(default)]
    pub sweep: SweepConfig,

    /// Synthetic evaluation scores
    #[serde(default)]
    pub evaluation: EvaluationConfig,

    /// Where run records are written
    #[serde(default)]
    pub output: OutputConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Axes of the parameter sweep; every feasible combination is run once
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SweepConfig {
    #[serde(default = "default_ls")]
    pub ls: Vec<usize>,

    #[serde(default = "default_ns")]
    pub ns: Vec<usize>,

    #[serde(default = "default_ks")]
    pub ks: Vec<usize>,

    #[serde(default = "default_ms")]
    pub ms: Vec<usize>,

    #[serde(default = "default_scores_modes")]
    pub scores_modes: Vec<ScoresMode>,

    #[serde(default = "default_off_chain")]
    pub off_chain: Vec<bool>,

    #[serde(default = "default_rev_percs")]
    pub rev_percs: Vec<f64>,
}

fn default_ls() -> Vec<usize> {
    vec![3, 4, 5]
}

fn default_ns() -> Vec<usize> {
    vec![10, 15, 20, 30, 50, 75]
}

fn default_ks() -> Vec<usize> {
    vec![5, 15, 25]
}

fn default_ms() -> Vec<usize> {
    vec![3, 7, 11, 15]
}

fn default_scores_modes() -> Vec<ScoresMode> {
    vec![ScoresMode::Map, ScoresMode::Matrix]
}

fn default_off_chain() -> Vec<bool> {
    vec![true, false]
}

fn default_rev_percs() -> Vec<f64> {
    vec![0.75, 1.0]
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            ls: default_ls(),
            ns: default_ns(),
            ks: default_ks(),
            ms: default_ms(),
            scores_modes: default_scores_modes(),
            off_chain: default_off_chain(),
            rev_percs: default_rev_percs(),
        }
    }
}

/// Range of synthetic evaluation scores: `min_score .. min_score + spread`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct EvaluationConfig {
    #[serde(default = "default_min_score")]
    pub min_score: u64,

    #[serde(default = "default_spread")]
    pub spread: u64,
}

const fn default_min_score() -> u64 {
    50
}

const fn default_spread() -> u64 {
    50
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            min_score: default_min_score(),
            spread: default_spread(),
        }
    }
}

/// Result sink configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct OutputConfig {
    /// Directory receiving one JSON document per run
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,

    /// Skip sweep combinations whose record already exists
    #[serde(default)]
    pub skip_existing: bool,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("results/OPTIMIZED")
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            skip_existing: false,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format
    #[serde(default)]
    pub format: LogFormat,

    /// Directory for log files (if None, logs only go to stdout)
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    /// Enable stdout logging
    #[serde(default = "default_true")]
    pub enable_stdout: bool,

    /// Log file rotation policy
    #[serde(default)]
    pub rotation: RotationPolicy,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    #[default]
    Pretty,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RotationPolicy {
    #[default]
    Daily,
    Hourly,
    Never,
}

fn default_log_level() -> String {
    "info".to_string()
}

const fn default_true() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
            log_dir: None,
            enable_stdout: true,
            rotation: RotationPolicy::default(),
        }
    }
}
