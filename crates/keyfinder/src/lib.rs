//! Key finding with a two-pass hidden Markov model.
//!
//! The first Viterbi pass labels every pitch class with a local key using a
//! key profile (emissions) and a key transition (how keys drift). The second
//! pass reads those local keys as observations and settles on one global key.
//!
//! ```rust,no_run
//! use keyfinder::{default_key_profiles, default_key_transitions, KeyFinder};
//! use pitch_slices::Observation;
//!
//! let profiles = default_key_profiles()?;
//! let transitions = default_key_transitions()?;
//! let finder = KeyFinder::from_registries(&profiles, &transitions, "sapp", "ktg_exponential10")?;
//! let analysis = finder.find(&Observation::from_sequence("0,4,7").expect("valid sequence"))?;
//! println!("{}", analysis.global_key);
//! # Ok::<(), keyfinder::Error>(())
//! ```

pub mod engine;
pub mod key;
pub mod library;
pub mod registry;
pub mod tables;
pub mod viterbi;

pub use engine::{KeyAnalysis, KeyFinder};
pub use key::{Key, KeyMode};
pub use library::{default_key_profiles, default_key_transitions};
pub use registry::{ParameterKind, ParameterRegistry, SUM_TOLERANCE};

/// Hidden states: 12 major keys then 12 minor keys.
pub const NUM_KEYS: usize = 24;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("parameter not found: {0}")]
    ParameterNotFound(String),

    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("observation has no pitch classes")]
    EmptyInput,

    #[error("unknown key: {0:?}")]
    UnknownKey(String),
}

pub type Result<T> = std::result::Result<T, Error>;
