//! Labelled music files listed in a manifest.
//!
//! Manifest lines are `path` or `path<TAB>key`; `#` starts a comment.
//! Without an explicit key the label comes from a sidecar `<path>.key` file,
//! then from the file name suffix after the last `_` (`fugue_c#.mid`).

use keyfinder::Key;
use pitch_slices::{Observation, ObservationSource};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::{Error, Result};

#[derive(Debug, Clone)]
pub enum DatasetEntry {
    Ready {
        path: PathBuf,
        observation: Observation,
        key: Key,
    },
    /// Unreadable or unlabelled file. Scored as maximally wrong.
    Failed { path: PathBuf, reason: String },
}

impl DatasetEntry {
    pub fn path(&self) -> &Path {
        match self {
            DatasetEntry::Ready { path, .. } | DatasetEntry::Failed { path, .. } => path,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, DatasetEntry::Failed { .. })
    }
}

/// Every file parsed once up front; read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    entries: Vec<DatasetEntry>,
}

impl Dataset {
    pub fn from_entries(entries: Vec<DatasetEntry>) -> Self {
        Self { entries }
    }

    /// Read a manifest and parse every file it lists.
    ///
    /// Relative paths resolve against the manifest's directory. Only an
    /// unreadable or empty manifest is an error; bad files become
    /// [`DatasetEntry::Failed`].
    pub fn load(manifest: &Path, source: &dyn ObservationSource) -> Result<Self> {
        let contents = std::fs::read_to_string(manifest).map_err(|e| Error::Dataset {
            path: manifest.to_path_buf(),
            reason: e.to_string(),
        })?;
        let base_dir = manifest.parent().unwrap_or_else(|| Path::new("."));

        let dataset = Self::from_manifest(&contents, base_dir, source);
        if dataset.is_empty() {
            return Err(Error::Dataset {
                path: manifest.to_path_buf(),
                reason: "manifest lists no files".into(),
            });
        }

        info!(
            manifest = %manifest.display(),
            files = dataset.len(),
            failed = dataset.failed_count(),
            "loaded dataset"
        );
        Ok(dataset)
    }

    /// Build from manifest text without touching the manifest file itself.
    pub fn from_manifest(contents: &str, base_dir: &Path, source: &dyn ObservationSource) -> Self {
        let entries = contents
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(|line| {
                let (path, explicit_key) = match line.split_once('\t') {
                    Some((path, key)) => (path.trim(), Some(key.trim())),
                    None => (line, None),
                };
                load_entry(base_dir.join(path), explicit_key, source)
            })
            .collect();

        Self { entries }
    }

    pub fn entries(&self) -> &[DatasetEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn failed_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_failed()).count()
    }
}

fn load_entry(path: PathBuf, explicit_key: Option<&str>, source: &dyn ObservationSource) -> DatasetEntry {
    let labelled = ground_truth(&path, explicit_key).and_then(|key| {
        source
            .parse(&path)
            .map(|observation| (observation, key))
            .map_err(|e| e.to_string())
    });

    match labelled {
        Ok((observation, key)) => DatasetEntry::Ready {
            path,
            observation,
            key,
        },
        Err(reason) => {
            warn!(path = %path.display(), %reason, "dataset file will score as a miss");
            DatasetEntry::Failed { path, reason }
        }
    }
}

/// Resolve the labelled key of `path`.
pub fn ground_truth(path: &Path, explicit: Option<&str>) -> std::result::Result<Key, String> {
    if let Some(text) = explicit {
        return text.parse().map_err(|e: keyfinder::Error| e.to_string());
    }

    let mut sidecar = path.as_os_str().to_os_string();
    sidecar.push(".key");
    if let Ok(text) = std::fs::read_to_string(&sidecar) {
        return text.trim().parse().map_err(|e: keyfinder::Error| {
            format!("sidecar {}: {e}", Path::new(&sidecar).display())
        });
    }

    path.file_stem()
        .and_then(|stem| stem.to_str())
        .and_then(|stem| stem.rsplit_once('_'))
        .and_then(|(_, suffix)| suffix.parse().ok())
        .ok_or_else(|| "no key in manifest, sidecar, or file name".to_string())
}
