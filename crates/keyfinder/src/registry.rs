//! Named parameter stores for key profiles and key transitions.
//!
//! A registry is an owned value. Evaluation borrows it shared while the
//! optimizer holds the only `&mut` between generations.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use tracing::{debug, warn};

use crate::{Error, Result, NUM_KEYS};

/// Allowed deviation of a distribution's sum from 1.
pub const SUM_TOLERANCE: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterKind {
    /// Major half (0-11) and minor half (12-23), each a distribution.
    KeyProfile,
    /// One distribution over the 24 tonic-relative transition slots.
    KeyTransition,
}

impl ParameterKind {
    /// Prefix used for generated names.
    pub fn prefix(self) -> &'static str {
        match self {
            ParameterKind::KeyProfile => "kp",
            ParameterKind::KeyTransition => "kt",
        }
    }

    /// Rescale in place so every distribution of this kind sums to 1.
    ///
    /// A block with no mass becomes uniform.
    pub fn normalize(self, values: &mut [f64]) {
        match self {
            ParameterKind::KeyProfile => {
                let (major, minor) = values.split_at_mut(values.len() / 2);
                normalize_block(major);
                normalize_block(minor);
            }
            ParameterKind::KeyTransition => normalize_block(values),
        }
    }

    fn block_sums(self, values: &[f64]) -> Vec<f64> {
        match self {
            ParameterKind::KeyProfile => values.chunks(values.len() / 2).map(|c| c.iter().sum()).collect(),
            ParameterKind::KeyTransition => vec![values.iter().sum()],
        }
    }
}

impl fmt::Display for ParameterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterKind::KeyProfile => write!(f, "key profile"),
            ParameterKind::KeyTransition => write!(f, "key transition"),
        }
    }
}

fn normalize_block(block: &mut [f64]) {
    let sum: f64 = block.iter().sum();
    if sum > 0.0 {
        block.iter_mut().for_each(|v| *v /= sum);
    } else if !block.is_empty() {
        let uniform = 1.0 / block.len() as f64;
        block.iter_mut().for_each(|v| *v = uniform);
    }
}

#[derive(Debug, Clone)]
pub struct ParameterRegistry {
    kind: ParameterKind,
    entries: BTreeMap<String, Vec<f64>>,
    ratios: HashMap<String, f64>,
    next_id: u64,
}

impl ParameterRegistry {
    pub fn new(kind: ParameterKind) -> Self {
        Self {
            kind,
            entries: BTreeMap::new(),
            ratios: HashMap::new(),
            next_id: 0,
        }
    }

    pub fn kind(&self) -> ParameterKind {
        self.kind
    }

    /// Add or overwrite an entry.
    ///
    /// Wrong length, negative or non-finite values are rejected. A sum off
    /// by more than [`SUM_TOLERANCE`] is only logged.
    pub fn insert(&mut self, name: impl Into<String>, values: Vec<f64>) -> Result<()> {
        let name = name.into();
        if values.len() != NUM_KEYS {
            return Err(Error::InvalidParameter {
                name,
                reason: format!("expected {NUM_KEYS} values, got {}", values.len()),
            });
        }
        if let Some(bad) = values.iter().find(|v| !v.is_finite() || **v < 0.0) {
            return Err(Error::InvalidParameter {
                name,
                reason: format!("value {bad} is not a finite non-negative number"),
            });
        }

        for sum in self.kind.block_sums(&values) {
            if (sum - 1.0).abs() > SUM_TOLERANCE {
                warn!(kind = %self.kind, name = %name, sum, "distribution does not sum to 1");
            }
        }

        self.entries.insert(name, values);
        Ok(())
    }

    /// Register `values` under a name nobody has used yet.
    pub fn insert_fresh(&mut self, prefix: &str, values: Vec<f64>) -> Result<String> {
        let name = self.fresh_name(prefix);
        self.insert(name.clone(), values)?;
        Ok(name)
    }

    /// Next unused `<prefix><id>` name. Ids are never handed out twice.
    pub fn fresh_name(&mut self, prefix: &str) -> String {
        loop {
            let name = format!("{prefix}{}", self.next_id);
            self.next_id += 1;
            if !self.entries.contains_key(&name) {
                return name;
            }
        }
    }

    pub fn get(&self, name: &str) -> Result<&[f64]> {
        self.entries
            .get(name)
            .map(Vec::as_slice)
            .ok_or_else(|| Error::ParameterNotFound(name.to_string()))
    }

    /// Space-separated values at 12 decimal places.
    pub fn get_as_text(&self, name: &str) -> Result<String> {
        let values = self.get(name)?;
        Ok(values
            .iter()
            .map(|v| format!("{v:.12}"))
            .collect::<Vec<_>>()
            .join(" "))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry names in sorted order.
    pub fn names(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[f64])> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Remove the named entries. Missing names are ignored.
    pub fn flush<S: AsRef<str>>(&mut self, names: &[S]) {
        for name in names {
            self.entries.remove(name.as_ref());
            self.ratios.remove(name.as_ref());
        }
    }

    /// Remove every entry not named in `names`.
    pub fn keep<S: AsRef<str>>(&mut self, names: &[S]) {
        let keep = |name: &String| names.iter().any(|n| n.as_ref() == name);
        self.entries.retain(|name, _| keep(name));
        self.ratios.retain(|name, _| keep(name));
    }

    pub fn store_ratio(&mut self, name: impl Into<String>, ratio: f64) {
        self.ratios.insert(name.into(), ratio);
    }

    /// Ratio a geometric transition was generated from, if any.
    pub fn ratio(&self, name: &str) -> Option<f64> {
        self.ratios.get(name).copied()
    }

    /// Register the major half of one profile joined with the minor half of
    /// another as `"<major>+<minor>"`.
    pub fn mix(&mut self, major: &str, minor: &str) -> Result<String> {
        if self.kind != ParameterKind::KeyProfile {
            return Err(Error::InvalidParameter {
                name: format!("{major}+{minor}"),
                reason: "only key profiles have major and minor halves".into(),
            });
        }
        let mut values = self.get(major)?[..12].to_vec();
        values.extend_from_slice(&self.get(minor)?[12..]);

        let name = format!("{major}+{minor}");
        self.insert(name.clone(), values)?;
        Ok(name)
    }

    /// Dump every entry at debug level.
    pub fn log_contents(&self) {
        for name in self.entries.keys() {
            if let Ok(text) = self.get_as_text(name) {
                debug!(kind = %self.kind, name = %name, values = %text, "registry entry");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn uniform() -> Vec<f64> {
        vec![1.0 / 12.0; 24]
    }

    #[test]
    fn insert_and_get() {
        let mut reg = ParameterRegistry::new(ParameterKind::KeyProfile);
        reg.insert("flat", uniform()).unwrap();

        assert_eq!(reg.get("flat").unwrap().len(), 24);
        assert!(matches!(reg.get("missing"), Err(Error::ParameterNotFound(_))));
    }

    #[test]
    fn wrong_length_rejected() {
        let mut reg = ParameterRegistry::new(ParameterKind::KeyTransition);
        let err = reg.insert("short", vec![1.0; 12]).unwrap_err();
        assert!(matches!(err, Error::InvalidParameter { .. }));
        assert!(reg.insert("neg", {
            let mut v = vec![0.0; 24];
            v[0] = -1.0;
            v
        })
        .is_err());
    }

    #[test]
    fn bad_sum_is_accepted() {
        let mut reg = ParameterRegistry::new(ParameterKind::KeyTransition);
        reg.insert("heavy", vec![1.0; 24]).unwrap();
        assert!(reg.contains("heavy"));
    }

    #[test]
    fn text_form_is_stable() {
        let mut reg = ParameterRegistry::new(ParameterKind::KeyTransition);
        let mut values = vec![0.0; 24];
        values[0] = 0.25;
        values[1] = 0.75;
        reg.insert("t", values).unwrap();

        let text = reg.get_as_text("t").unwrap();
        assert!(text.starts_with("0.250000000000 0.750000000000 0.000000000000"));
        assert_eq!(text.split(' ').count(), 24);
        assert_eq!(text, reg.get_as_text("t").unwrap());
    }

    #[test]
    fn flush_and_keep() {
        let mut reg = ParameterRegistry::new(ParameterKind::KeyProfile);
        for name in ["a", "b", "c", "d"] {
            reg.insert(name, uniform()).unwrap();
        }
        reg.store_ratio("b", 3.0);

        reg.flush(&["a", "zzz"]);
        assert_eq!(reg.names(), vec!["b", "c", "d"]);

        reg.keep(&["c", "d"]);
        assert_eq!(reg.names(), vec!["c", "d"]);
        assert_eq!(reg.ratio("b"), None);
    }

    #[test]
    fn fresh_names_skip_existing_and_never_repeat() {
        let mut reg = ParameterRegistry::new(ParameterKind::KeyProfile);
        reg.insert("kp0", uniform()).unwrap();

        let first = reg.insert_fresh("kp", uniform()).unwrap();
        assert_eq!(first, "kp1");

        reg.flush(&[first.as_str()]);
        assert_eq!(reg.fresh_name("kp"), "kp2");
    }

    #[test]
    fn mix_joins_halves() {
        let mut reg = ParameterRegistry::new(ParameterKind::KeyProfile);
        let mut major = vec![0.0; 24];
        major[0] = 1.0;
        major[12] = 1.0;
        let mut minor = vec![0.0; 24];
        minor[7] = 1.0;
        minor[19] = 1.0;
        reg.insert("x", major).unwrap();
        reg.insert("y", minor).unwrap();

        let name = reg.mix("x", "y").unwrap();
        let mixed = reg.get(&name).unwrap();

        assert_eq!(name, "x+y");
        assert_eq!(mixed[0], 1.0);
        assert_eq!(mixed[12], 0.0);
        assert_eq!(mixed[19], 1.0);
    }

    #[test]
    fn normalize_by_kind() {
        let mut profile = vec![2.0; 24];
        profile[12..].iter_mut().for_each(|v| *v = 0.0);
        ParameterKind::KeyProfile.normalize(&mut profile);
        assert!((profile[..12].iter().sum::<f64>() - 1.0).abs() < 1e-12);
        assert!((profile[12] - 1.0 / 12.0).abs() < 1e-12);

        let mut transition = vec![2.0; 24];
        ParameterKind::KeyTransition.normalize(&mut transition);
        assert!((transition.iter().sum::<f64>() - 1.0).abs() < 1e-12);
    }
}
