//! Configuration loading for keytuner.
//!
//! Every value has a compiled default, so an empty environment yields a
//! usable config. Files and environment variables only override.
//!
//! # Usage
//!
//! ```rust,no_run
//! use keyconf::KeyConfig;
//!
//! let config = KeyConfig::load().expect("Failed to load config");
//! println!("population: {}", config.optimizer.population_size);
//! println!("workers: {}", config.evaluation.workers);
//! ```
//!
//! # Config File Locations
//!
//! Files are loaded in order (later wins):
//! 1. `/etc/keytuner/config.toml` (system)
//! 2. `~/.config/keytuner/config.toml` (user)
//! 3. `./keytuner.toml` (local override, replaced by an explicit path)
//! 4. Environment variables (`KEYTUNER_*`, `RUST_LOG`)
//!
//! # Example Config
//!
//! ```toml
//! [optimizer]
//! population_size = 10
//! evolution_swap_threshold = 3
//! initial_key_profiles = ["sapp", "temperley"]
//! initial_key_transitions = ["ktg_exponential10"]
//! max_generations = 500
//! seed = 7
//!
//! [evaluation]
//! workers = 8
//! dataset = "~/datasets/keys/manifest.txt"
//!
//! [telemetry]
//! log_level = "info,keytuner=debug"
//! ```

pub mod loader;
pub mod settings;

pub use loader::{discover_config_files_with_override, ConfigSources};
pub use settings::{EvaluationConfig, OptimizerConfig, TelemetryConfig};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Complete keytuner configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct KeyConfig {
    #[serde(default)]
    pub optimizer: OptimizerConfig,

    #[serde(default)]
    pub evaluation: EvaluationConfig,

    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl KeyConfig {
    /// Load configuration from all sources.
    pub fn load() -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(None)?;
        Ok(config)
    }

    /// Load configuration, letting `config_path` replace `./keytuner.toml`.
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(config_path)?;
        Ok(config)
    }

    /// Load configuration from optional path and return information about sources.
    pub fn load_with_sources_from(
        config_path: Option<&Path>,
    ) -> Result<(Self, ConfigSources), ConfigError> {
        let mut sources = ConfigSources::default();
        let mut merged = toml::Table::new();

        for path in loader::discover_config_files_with_override(config_path) {
            let table = loader::load_table(&path)?;
            loader::merge_tables(&mut merged, table);
            sources.files.push(path);
        }

        let origin = sources
            .files
            .last()
            .cloned()
            .unwrap_or_else(|| PathBuf::from("<defaults>"));
        let mut config = loader::table_to_config(merged, &origin)?;

        loader::apply_env_overrides(&mut config, &mut sources);

        if let Some(dataset) = config.evaluation.dataset.take() {
            let expanded = loader::expand_path(&dataset.to_string_lossy());
            config.evaluation.dataset = Some(expanded);
        }

        Ok((config, sources))
    }

    /// Reject values the optimizer cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let opt = &self.optimizer;
        if opt.population_size == 0 {
            return Err(ConfigError::Invalid("population_size must be at least 1".into()));
        }
        if self.evaluation.workers == 0 {
            return Err(ConfigError::Invalid("workers must be at least 1".into()));
        }
        if !(opt.kp_max_range > 0.0) || !(opt.kt_max_range > 0.0) {
            return Err(ConfigError::Invalid(
                "kp_max_range and kt_max_range must be positive".into(),
            ));
        }
        for (name, value) in [
            ("retain", opt.retain),
            ("random_select", opt.random_select),
            ("mutate_rate", opt.mutate_rate),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Invalid(format!(
                    "{name} must be within [0, 1], got {value}"
                )));
            }
        }
        Ok(())
    }

    /// Serialize config to TOML string.
    pub fn to_toml(&self) -> String {
        // Built by hand so unset optionals show up as commented hints
        let opt = &self.optimizer;
        let mut output = String::new();

        output.push_str("# keytuner configuration\n\n");

        output.push_str("[optimizer]\n");
        output.push_str(&format!("population_size = {}\n", opt.population_size));
        output.push_str(&format!("kp_max_range = {:?}\n", opt.kp_max_range));
        output.push_str(&format!("kt_max_range = {:?}\n", opt.kt_max_range));
        output.push_str(&format!(
            "evolution_swap_threshold = {}\n",
            opt.evolution_swap_threshold
        ));
        output.push_str(&format!(
            "initial_key_profiles = {}\n",
            quoted_list(&opt.initial_key_profiles)
        ));
        output.push_str(&format!(
            "initial_key_transitions = {}\n",
            quoted_list(&opt.initial_key_transitions)
        ));
        match opt.max_generations {
            Some(n) => output.push_str(&format!("max_generations = {n}\n")),
            None => output.push_str("# max_generations = 1000\n"),
        }
        output.push_str(&format!("retain = {:?}\n", opt.retain));
        output.push_str(&format!("random_select = {:?}\n", opt.random_select));
        output.push_str(&format!("mutate_rate = {:?}\n", opt.mutate_rate));
        match opt.seed {
            Some(seed) => output.push_str(&format!("seed = {seed}\n")),
            None => output.push_str("# seed = 0\n"),
        }

        output.push_str("\n[evaluation]\n");
        output.push_str(&format!("workers = {}\n", self.evaluation.workers));
        match &self.evaluation.dataset {
            Some(path) => output.push_str(&format!("dataset = {:?}\n", path.display().to_string())),
            None => output.push_str("# dataset = \"manifest.txt\"\n"),
        }

        output.push_str("\n[telemetry]\n");
        output.push_str(&format!("log_level = {:?}\n", self.telemetry.log_level));

        output
    }
}

fn quoted_list(items: &[String]) -> String {
    let quoted: Vec<String> = items.iter().map(|s| format!("{s:?}")).collect();
    format!("[{}]", quoted.join(", "))
}
