pub mod midi;
pub mod slice;
pub mod source;
pub mod text;

pub use midi::observation_from_midi;
pub use slice::{majority_by_slice, Observation, PitchClassSlice};
pub use source::{FileSource, ObservationSource};
pub use text::{observation_from_text, parse_pitch_class};

use std::path::PathBuf;

/// Errors from reading pitch-class input.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("MIDI parse error: {0}")]
    MidiParse(String),

    #[error("line {line}: invalid pitch class {token:?}")]
    InvalidPitchClass { line: usize, token: String },

    #[error("pitch class {0} is outside 0..=11")]
    PitchClassOutOfRange(i64),

    #[error("unsupported input format: {0}")]
    UnsupportedFormat(PathBuf),
}

pub type Result<T> = std::result::Result<T, Error>;
