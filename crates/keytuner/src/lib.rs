//! Search for key profiles and key transitions that make the two-pass key
//! finder agree with a labelled dataset.
//!
//! The optimizer alternates between evolving profiles (transition fixed at
//! its current best) and evolving transitions (profile fixed), switching
//! axis after a run of generations that failed to improve.

pub mod dataset;
pub mod evaluator;
pub mod evolver;
pub mod generator;
pub mod optimizer;
pub mod telemetry;

pub use dataset::{Dataset, DatasetEntry};
pub use evaluator::{Evaluator, FileOutcome, Grade, FAILURE_PENALTY};
pub use evolver::{Candidate, Evolver};
pub use generator::Generator;
pub use optimizer::{EvolutionMode, OptimizationOutcome, Optimizer};

use keyfinder::{ParameterKind, ParameterRegistry};
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("dataset {path}: {reason}")]
    Dataset { path: PathBuf, reason: String },

    #[error("unknown {kind} seed {name:?}")]
    UnknownSeed { kind: ParameterKind, name: String },

    #[error("population is empty")]
    EmptyPopulation,

    #[error("{name} must be a positive finite number, got {value}")]
    InvalidRange { name: &'static str, value: f64 },

    #[error("failed to start worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),

    #[error(transparent)]
    KeyFinder(#[from] keyfinder::Error),

    #[error(transparent)]
    Config(#[from] keyconf::ConfigError),
}

pub type Result<T> = std::result::Result<T, Error>;

/// The run's two parameter stores.
#[derive(Debug, Clone)]
pub struct Registries {
    pub profiles: ParameterRegistry,
    pub transitions: ParameterRegistry,
}

impl Registries {
    /// Stores preloaded with the bundled library.
    pub fn defaults() -> Result<Self> {
        Ok(Self {
            profiles: keyfinder::default_key_profiles()?,
            transitions: keyfinder::default_key_transitions()?,
        })
    }

    pub fn get(&self, kind: ParameterKind) -> &ParameterRegistry {
        match kind {
            ParameterKind::KeyProfile => &self.profiles,
            ParameterKind::KeyTransition => &self.transitions,
        }
    }
}
