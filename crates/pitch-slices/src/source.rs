use std::path::Path;

use crate::midi::observation_from_midi;
use crate::slice::Observation;
use crate::text::observation_from_text;
use crate::{Error, Result};

/// Anything that can turn a music file into pitch-class slices.
///
/// Key finding only depends on this trait, so new input formats plug in
/// without touching the decoder.
pub trait ObservationSource: Send + Sync {
    fn parse(&self, path: &Path) -> Result<Observation>;
}

/// Reads MIDI (`.mid`, `.midi`) and pitch-class text (`.txt`, `.pcs`, `.csv`).
#[derive(Debug, Clone, Copy, Default)]
pub struct FileSource;

impl ObservationSource for FileSource {
    fn parse(&self, path: &Path) -> Result<Observation> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        match extension.as_str() {
            "mid" | "midi" => {
                let bytes = std::fs::read(path).map_err(|e| io_error(path, e))?;
                observation_from_midi(&bytes)
            }
            "txt" | "pcs" | "csv" => {
                let contents = std::fs::read_to_string(path).map_err(|e| io_error(path, e))?;
                observation_from_text(&contents)
            }
            _ => Err(Error::UnsupportedFormat(path.to_path_buf())),
        }
    }
}

fn io_error(path: &Path, source: std::io::Error) -> Error {
    Error::Io {
        path: path.to_path_buf(),
        source,
    }
}
