//! Run configuration: the option mapping a caller passes to `run`, and its typed form

use log::warn;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::io::IoError;

/// Errors in the option mapping
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing {0}")]
    Missing(&'static str),

    #[error("Invalid value for {key}: expected {expected}, got {value}")]
    InvalidValue {
        key: String,
        expected: &'static str,
        value: String,
    },

    #[error("{0}")]
    Invalid(String),

    #[error("Option {0} is not supported")]
    Unsupported(String),

    #[error("Parameter line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("Invalid JSON parameters: {0}")]
    Json(#[from] serde_json::Error),
}

/// A single option value as a scripting caller passes it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<String>),
}

impl std::fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigValue::Bool(b) => write!(f, "{}", b),
            ConfigValue::Int(i) => write!(f, "{}", i),
            ConfigValue::Float(x) => write!(f, "{}", x),
            ConfigValue::Str(s) => write!(f, "{}", s),
            ConfigValue::List(items) => write!(f, "[{}]", items.join(", ")),
        }
    }
}

impl From<bool> for ConfigValue {
    fn from(value: bool) -> Self {
        ConfigValue::Bool(value)
    }
}

impl From<i32> for ConfigValue {
    fn from(value: i32) -> Self {
        ConfigValue::Int(value as i64)
    }
}

impl From<i64> for ConfigValue {
    fn from(value: i64) -> Self {
        ConfigValue::Int(value)
    }
}

impl From<f64> for ConfigValue {
    fn from(value: f64) -> Self {
        ConfigValue::Float(value)
    }
}

impl From<&str> for ConfigValue {
    fn from(value: &str) -> Self {
        ConfigValue::Str(value.to_string())
    }
}

impl From<String> for ConfigValue {
    fn from(value: String) -> Self {
        ConfigValue::Str(value)
    }
}

impl From<&Path> for ConfigValue {
    fn from(value: &Path) -> Self {
        ConfigValue::Str(value.display().to_string())
    }
}

impl From<Vec<String>> for ConfigValue {
    fn from(value: Vec<String>) -> Self {
        ConfigValue::List(value)
    }
}

/// Option name to value, ordered by name
pub type ConfigMap = BTreeMap<String, ConfigValue>;

/// Keys for flexible receptor residues, which are not supported
const FLEX_KEYS: [&str; 5] = ["flex", "flexres", "flexdist", "flexdist_ligand", "out_flex"];

fn scalar_from_str(value: &str) -> ConfigValue {
    match value {
        "true" => ConfigValue::Bool(true),
        "false" => ConfigValue::Bool(false),
        _ => {
            if let Ok(i) = value.parse::<i64>() {
                ConfigValue::Int(i)
            } else if let Ok(x) = value.parse::<f64>() {
                ConfigValue::Float(x)
            } else {
                ConfigValue::Str(value.to_string())
            }
        }
    }
}

/// Parse `key = value` lines; `#` starts a comment and repeated `ligand` keys accumulate
pub fn parse_key_value(text: &str) -> Result<ConfigMap, ConfigError> {
    let mut map = ConfigMap::new();

    for (n, line) in text.lines().enumerate() {
        let line = match line.find('#') {
            Some(pos) => &line[..pos],
            None => line,
        }
        .trim();
        if line.is_empty() {
            continue;
        }

        let (key, value) = line.split_once('=').ok_or_else(|| ConfigError::Parse {
            line: n + 1,
            message: format!("expected key = value, got '{}'", line),
        })?;
        let key = key.trim();
        let value = value.trim();
        if key.is_empty() {
            return Err(ConfigError::Parse {
                line: n + 1,
                message: "empty option name".to_string(),
            });
        }

        if key == "ligand" {
            match map
                .entry(key.to_string())
                .or_insert_with(|| ConfigValue::List(Vec::new()))
            {
                ConfigValue::List(items) => items.push(value.to_string()),
                other => *other = ConfigValue::List(vec![value.to_string()]),
            }
        } else {
            map.insert(key.to_string(), scalar_from_str(value));
        }
    }

    Ok(map)
}

/// Parse a JSON object of options
pub fn parse_json(text: &str) -> Result<ConfigMap, ConfigError> {
    Ok(serde_json::from_str(text)?)
}

/// Read a parameter file, JSON when it looks like a JSON object and `key = value` otherwise
pub fn read_params_file<P: AsRef<Path>>(path: P) -> crate::Result<ConfigMap> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| IoError::Open {
        path: path.to_path_buf(),
        mode: "reading",
        source,
    })?;
    let is_json = path.extension().map_or(false, |e| e == "json") || text.trim_start().starts_with('{');
    let map = if is_json {
        parse_json(&text)?
    } else {
        parse_key_value(&text)?
    };
    Ok(map)
}

/// Which of the four procedures a run performs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Dock,
    ScoreOnly,
    LocalOnly,
    RandomizeOnly,
}

/// Typed docking options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DockingConfig {
    pub center: Vector3<f64>,
    pub size: Vector3<f64>,
    pub receptor: Option<PathBuf>,
    pub ligands: Vec<PathBuf>,
    pub autobox_ligand: Option<PathBuf>,
    pub autobox_add: f64,
    pub scoring: String,
    pub custom_scoring: Option<PathBuf>,
    pub score_only: bool,
    pub local_only: bool,
    pub minimize: bool,
    pub randomize_only: bool,
    /// 0 picks the iteration count from the ligand size
    pub minimize_iters: usize,
    pub accurate_line: bool,
    pub force_cap: f64,
    pub user_grid: Option<PathBuf>,
    pub user_grid_lambda: f64,
    pub atom_terms: Option<PathBuf>,
    pub atom_term_data: bool,
    pub out: Option<PathBuf>,
    pub log: Option<PathBuf>,
    /// 0 uses every available core
    pub cpu: usize,
    pub seed: Option<u64>,
    pub exhaustiveness: usize,
    /// 0 picks the step count from the ligand size
    pub mc_steps: usize,
    pub num_modes: usize,
    pub energy_range: f64,
    pub min_rmsd_filter: f64,
    pub verbosity: i64,
    pub quiet: bool,
}

impl Default for DockingConfig {
    fn default() -> Self {
        Self {
            center: Vector3::zeros(),
            size: Vector3::zeros(),
            receptor: None,
            ligands: Vec::new(),
            autobox_ligand: None,
            autobox_add: 4.0,
            scoring: "vina".to_string(),
            custom_scoring: None,
            score_only: false,
            local_only: false,
            minimize: false,
            randomize_only: false,
            minimize_iters: 0,
            accurate_line: false,
            force_cap: 1000.0,
            user_grid: None,
            user_grid_lambda: -1.0,
            atom_terms: None,
            atom_term_data: false,
            out: None,
            log: None,
            cpu: 0,
            seed: None,
            exhaustiveness: 8,
            mc_steps: 0,
            num_modes: 9,
            energy_range: 3.0,
            min_rmsd_filter: 1.0,
            verbosity: 0,
            quiet: true,
        }
    }
}

fn invalid(key: &str, expected: &'static str, value: &ConfigValue) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        expected,
        value: value.to_string(),
    }
}

fn as_f64(key: &str, value: &ConfigValue) -> Result<f64, ConfigError> {
    match value {
        ConfigValue::Int(i) => Ok(*i as f64),
        ConfigValue::Float(x) => Ok(*x),
        ConfigValue::Str(s) => s.trim().parse().map_err(|_| invalid(key, "a number", value)),
        _ => Err(invalid(key, "a number", value)),
    }
}

fn as_i64(key: &str, value: &ConfigValue) -> Result<i64, ConfigError> {
    match value {
        ConfigValue::Int(i) => Ok(*i),
        ConfigValue::Float(x) if x.fract() == 0.0 => Ok(*x as i64),
        ConfigValue::Str(s) => s.trim().parse().map_err(|_| invalid(key, "an integer", value)),
        _ => Err(invalid(key, "an integer", value)),
    }
}

fn as_usize(key: &str, value: &ConfigValue) -> Result<usize, ConfigError> {
    let i = as_i64(key, value)?;
    usize::try_from(i).map_err(|_| invalid(key, "a non-negative integer", value))
}

fn as_bool(key: &str, value: &ConfigValue) -> Result<bool, ConfigError> {
    match value {
        ConfigValue::Bool(b) => Ok(*b),
        ConfigValue::Int(0) => Ok(false),
        ConfigValue::Int(1) => Ok(true),
        // a bare flag carries no value
        ConfigValue::Str(s) => match s.trim() {
            "" | "true" | "1" => Ok(true),
            "false" | "0" => Ok(false),
            _ => Err(invalid(key, "a boolean", value)),
        },
        _ => Err(invalid(key, "a boolean", value)),
    }
}

fn as_string(key: &str, value: &ConfigValue) -> Result<String, ConfigError> {
    match value {
        ConfigValue::Str(s) => Ok(s.clone()),
        _ => Err(invalid(key, "a string", value)),
    }
}

fn as_path(key: &str, value: &ConfigValue) -> Result<PathBuf, ConfigError> {
    as_string(key, value).map(PathBuf::from)
}

fn as_paths(key: &str, value: &ConfigValue) -> Result<Vec<PathBuf>, ConfigError> {
    match value {
        ConfigValue::Str(s) => Ok(vec![PathBuf::from(s)]),
        ConfigValue::List(items) => Ok(items.iter().map(PathBuf::from).collect()),
        _ => Err(invalid(key, "a path or list of paths", value)),
    }
}

impl DockingConfig {
    /// Convert and validate an option mapping.
    ///
    /// `minimize` turns on `local_only` and the accurate line search, and
    /// softens `force_cap` and raises `minimize_iters` unless they were given.
    pub fn from_map(map: &ConfigMap) -> Result<Self, ConfigError> {
        let mut config = DockingConfig::default();

        for (key, value) in map {
            let key = key.as_str();
            match key {
                "center_x" => config.center.x = as_f64(key, value)?,
                "center_y" => config.center.y = as_f64(key, value)?,
                "center_z" => config.center.z = as_f64(key, value)?,
                "size_x" => config.size.x = as_f64(key, value)?,
                "size_y" => config.size.y = as_f64(key, value)?,
                "size_z" => config.size.z = as_f64(key, value)?,
                "receptor" => config.receptor = Some(as_path(key, value)?),
                "ligand" => config.ligands = as_paths(key, value)?,
                "autobox_ligand" => config.autobox_ligand = Some(as_path(key, value)?),
                "autobox_add" => config.autobox_add = as_f64(key, value)?,
                "scoring" => config.scoring = as_string(key, value)?,
                "custom_scoring" => config.custom_scoring = Some(as_path(key, value)?),
                "score_only" => config.score_only = as_bool(key, value)?,
                "local_only" => config.local_only = as_bool(key, value)?,
                "minimize" => config.minimize = as_bool(key, value)?,
                "randomize_only" => config.randomize_only = as_bool(key, value)?,
                "minimize_iters" => config.minimize_iters = as_usize(key, value)?,
                "accurate_line" => config.accurate_line = as_bool(key, value)?,
                "force_cap" => config.force_cap = as_f64(key, value)?,
                "user_grid" => config.user_grid = Some(as_path(key, value)?),
                "user_grid_lambda" => config.user_grid_lambda = as_f64(key, value)?,
                "atom_terms" => config.atom_terms = Some(as_path(key, value)?),
                "atom_term_data" => config.atom_term_data = as_bool(key, value)?,
                "out" => config.out = Some(as_path(key, value)?),
                "log" => config.log = Some(as_path(key, value)?),
                "cpu" => config.cpu = as_usize(key, value)?,
                "seed" => {
                    let seed = as_i64(key, value)?;
                    config.seed = Some(seed as u64);
                }
                "exhaustiveness" => config.exhaustiveness = as_usize(key, value)?,
                "mc_steps" => config.mc_steps = as_usize(key, value)?,
                "num_modes" => config.num_modes = as_usize(key, value)?,
                "energy_range" => config.energy_range = as_f64(key, value)?,
                "min_rmsd_filter" => config.min_rmsd_filter = as_f64(key, value)?,
                "verbosity" => config.verbosity = as_i64(key, value)?,
                "quiet" => config.quiet = as_bool(key, value)?,
                _ if FLEX_KEYS.contains(&key) => return Err(ConfigError::Unsupported(key.to_string())),
                _ => warn!("Ignoring unknown option '{}'", key),
            }
        }

        if config.minimize {
            if !map.contains_key("force_cap") {
                config.force_cap = 10.0;
            }
            if config.minimize_iters == 0 {
                config.minimize_iters = 10_000;
            }
            config.local_only = true;
            config.accurate_line = true;
        }

        config.validate()?;
        Ok(config)
    }

    /// Check the invariants between options
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ligands.is_empty() {
            return Err(ConfigError::Missing("ligand"));
        }
        if self.receptor.is_none() && !self.randomize_only {
            return Err(ConfigError::Missing("receptor"));
        }
        if self.exhaustiveness < 1 {
            return Err(ConfigError::Invalid("exhaustiveness must be 1 or greater".to_string()));
        }
        if self.num_modes < 1 {
            return Err(ConfigError::Invalid("num_modes must be 1 or greater".to_string()));
        }
        if !(self.force_cap > 0.0) {
            return Err(ConfigError::Invalid("force_cap must be positive".to_string()));
        }
        if self.needs_search_box() && self.autobox_ligand.is_none() {
            for (axis, size) in ["size_x", "size_y", "size_z"].iter().zip(self.size.iter()) {
                if !(size.is_finite() && *size > 0.0) {
                    return Err(ConfigError::Invalid(format!(
                        "{} must be positive when no autobox_ligand is given",
                        axis
                    )));
                }
            }
        }
        Ok(())
    }

    /// The procedure to run; randomization wins over scoring, which wins over local search
    pub fn mode(&self) -> Mode {
        if self.randomize_only {
            Mode::RandomizeOnly
        } else if self.score_only {
            Mode::ScoreOnly
        } else if self.local_only {
            Mode::LocalOnly
        } else {
            Mode::Dock
        }
    }

    /// Docking and randomization search a fixed box; scoring and local search do not
    pub fn needs_search_box(&self) -> bool {
        !(self.score_only || self.local_only)
    }
}
