//! Configuration sections: optimizer search, evaluation, telemetry.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Genetic search parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OptimizerConfig {
    /// Candidates per axis. Raised to the seed count when smaller.
    /// Default: 3
    #[serde(default = "OptimizerConfig::default_population_size")]
    pub population_size: usize,

    /// Upper bound for raw key-profile weights drawn by the generator.
    /// Default: 100
    #[serde(default = "OptimizerConfig::default_kp_max_range")]
    pub kp_max_range: f64,

    /// Upper bound for raw stochastic key-transition weights.
    /// Default: 256
    #[serde(default = "OptimizerConfig::default_kt_max_range")]
    pub kt_max_range: f64,

    /// Rejected generations tolerated before switching axis.
    /// Default: 3
    #[serde(default = "OptimizerConfig::default_evolution_swap_threshold")]
    pub evolution_swap_threshold: u32,

    /// Named key profiles seeding the first generation.
    #[serde(default = "OptimizerConfig::default_initial_key_profiles")]
    pub initial_key_profiles: Vec<String>,

    /// Named key transitions seeding the first generation.
    #[serde(default = "OptimizerConfig::default_initial_key_transitions")]
    pub initial_key_transitions: Vec<String>,

    /// Stop after this many evolved generations. Unbounded when absent.
    #[serde(default)]
    pub max_generations: Option<u64>,

    /// Fraction of each generation kept as parents.
    #[serde(default = "OptimizerConfig::default_retain")]
    pub retain: f64,

    /// Survival probability for candidates outside the retained fraction.
    #[serde(default = "OptimizerConfig::default_random_select")]
    pub random_select: f64,

    /// Mutation probability per parent.
    #[serde(default = "OptimizerConfig::default_mutate_rate")]
    pub mutate_rate: f64,

    /// RNG seed. Drawn from OS entropy when absent.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl OptimizerConfig {
    fn default_population_size() -> usize {
        3
    }

    fn default_kp_max_range() -> f64 {
        100.0
    }

    fn default_kt_max_range() -> f64 {
        256.0
    }

    fn default_evolution_swap_threshold() -> u32 {
        3
    }

    fn default_initial_key_profiles() -> Vec<String> {
        [
            "sapp",
            "temperley",
            "krumhansl_kessler",
            "aarden_essen",
            "albrecht_shanahan1",
            "albrecht_shanahan2",
            "bellman_budge",
            "simple_natural_minor",
            "simple_harmonic_minor",
            "simple_melodic_minor",
        ]
        .into_iter()
        .map(String::from)
        .collect()
    }

    fn default_initial_key_transitions() -> Vec<String> {
        ["ktg_exponential5", "ktg_exponential10", "ktg_exponential15"]
            .into_iter()
            .map(String::from)
            .collect()
    }

    fn default_retain() -> f64 {
        0.5
    }

    fn default_random_select() -> f64 {
        0.02
    }

    fn default_mutate_rate() -> f64 {
        0.1
    }
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            population_size: Self::default_population_size(),
            kp_max_range: Self::default_kp_max_range(),
            kt_max_range: Self::default_kt_max_range(),
            evolution_swap_threshold: Self::default_evolution_swap_threshold(),
            initial_key_profiles: Self::default_initial_key_profiles(),
            initial_key_transitions: Self::default_initial_key_transitions(),
            max_generations: None,
            retain: Self::default_retain(),
            random_select: Self::default_random_select(),
            mutate_rate: Self::default_mutate_rate(),
            seed: None,
        }
    }
}

/// Fitness evaluation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EvaluationConfig {
    /// Worker threads used to score dataset files.
    /// Default: 4
    #[serde(default = "EvaluationConfig::default_workers")]
    pub workers: usize,

    /// Dataset manifest, one music file per line.
    #[serde(default)]
    pub dataset: Option<PathBuf>,
}

impl EvaluationConfig {
    fn default_workers() -> usize {
        4
    }
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            workers: Self::default_workers(),
            dataset: None,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TelemetryConfig {
    /// Filter directive handed to the log subscriber.
    /// Default: "info"
    #[serde(default = "TelemetryConfig::default_log_level")]
    pub log_level: String,
}

impl TelemetryConfig {
    fn default_log_level() -> String {
        "info".to_string()
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: Self::default_log_level(),
        }
    }
}
