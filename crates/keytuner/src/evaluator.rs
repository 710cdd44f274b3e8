//! Fitness of (key profile, key transition) pairs against a dataset.
//!
//! Per-file error is `1 - score^2` where `score` is the MIREX weighting of
//! the guessed global key. Files that cannot be decoded cost
//! [`FAILURE_PENALTY`]. Files run in parallel; totals are summed in dataset
//! order so they do not depend on scheduling.

use keyfinder::{Key, KeyFinder};
use rayon::prelude::*;
use serde::Serialize;
use std::path::PathBuf;
use tracing::{debug, warn};

use crate::dataset::{Dataset, DatasetEntry};
use crate::{Registries, Result};

/// Error charged for a file that produced no guess.
pub const FAILURE_PENALTY: f64 = 1.0;

/// Total error of one pair over the whole dataset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Grade {
    pub error: f64,
    pub key_profile: String,
    pub key_transition: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileOutcome {
    pub path: PathBuf,
    pub truth: Option<Key>,
    pub guess: Option<Key>,
    pub score: f64,
    pub error: f64,
}

impl FileOutcome {
    fn failed(path: PathBuf, truth: Option<Key>) -> Self {
        Self {
            path,
            truth,
            guess: None,
            score: 0.0,
            error: FAILURE_PENALTY,
        }
    }
}

pub struct Evaluator<'a> {
    dataset: &'a Dataset,
    pool: rayon::ThreadPool,
}

impl<'a> Evaluator<'a> {
    /// Evaluator over `dataset` with its own pool of `workers` threads.
    pub fn new(dataset: &'a Dataset, workers: usize) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers.max(1))
            .thread_name(|i| format!("keytuner-eval-{i}"))
            .build()?;
        Ok(Self { dataset, pool })
    }

    pub fn dataset(&self) -> &Dataset {
        self.dataset
    }

    /// Decode every file with one pair. Never fails: problems become
    /// penalised outcomes.
    pub fn evaluate_files(
        &self,
        registries: &Registries,
        key_profile: &str,
        key_transition: &str,
    ) -> Vec<FileOutcome> {
        let finder = match KeyFinder::from_registries(
            &registries.profiles,
            &registries.transitions,
            key_profile,
            key_transition,
        ) {
            Ok(finder) => finder,
            Err(e) => {
                warn!(
                    profile = %key_profile,
                    transition = %key_transition,
                    error = %e,
                    "pair cannot be decoded, charging every file"
                );
                return self
                    .dataset
                    .entries()
                    .iter()
                    .map(|entry| FileOutcome::failed(entry.path().to_path_buf(), truth_of(entry)))
                    .collect();
            }
        };

        self.pool.install(|| {
            self.dataset
                .entries()
                .par_iter()
                .map(|entry| evaluate_entry(&finder, entry))
                .collect()
        })
    }

    /// Summed error of one pair.
    pub fn evaluate(&self, registries: &Registries, key_profile: &str, key_transition: &str) -> Grade {
        let error = self
            .evaluate_files(registries, key_profile, key_transition)
            .iter()
            .map(|outcome| outcome.error)
            .sum();
        debug!(profile = %key_profile, transition = %key_transition, error, "evaluated pair");
        Grade {
            error,
            key_profile: key_profile.to_string(),
            key_transition: key_transition.to_string(),
        }
    }

    /// Evaluate every pair, best first. Equal errors keep input order.
    pub fn grade<P, T>(&self, registries: &Registries, pairs: &[(P, T)]) -> Vec<Grade>
    where
        P: AsRef<str>,
        T: AsRef<str>,
    {
        let mut grades: Vec<Grade> = pairs
            .iter()
            .map(|(p, t)| self.evaluate(registries, p.as_ref(), t.as_ref()))
            .collect();
        grades.sort_by(|a, b| a.error.total_cmp(&b.error));
        grades
    }

    /// Grade profiles against one fixed transition.
    pub fn grade_key_profiles<S: AsRef<str>>(
        &self,
        registries: &Registries,
        key_profiles: &[S],
        key_transition: &str,
    ) -> Vec<Grade> {
        let pairs: Vec<(&str, &str)> = key_profiles
            .iter()
            .map(|p| (p.as_ref(), key_transition))
            .collect();
        self.grade(registries, &pairs)
    }

    /// Grade transitions against one fixed profile.
    pub fn grade_key_transitions<S: AsRef<str>>(
        &self,
        registries: &Registries,
        key_profile: &str,
        key_transitions: &[S],
    ) -> Vec<Grade> {
        let pairs: Vec<(&str, &str)> = key_transitions
            .iter()
            .map(|t| (key_profile, t.as_ref()))
            .collect();
        self.grade(registries, &pairs)
    }
}

fn truth_of(entry: &DatasetEntry) -> Option<Key> {
    match entry {
        DatasetEntry::Ready { key, .. } => Some(*key),
        DatasetEntry::Failed { .. } => None,
    }
}

fn evaluate_entry(finder: &KeyFinder, entry: &DatasetEntry) -> FileOutcome {
    let (path, observation, truth) = match entry {
        DatasetEntry::Ready {
            path,
            observation,
            key,
        } => (path, observation, *key),
        DatasetEntry::Failed { path, .. } => return FileOutcome::failed(path.clone(), None),
    };

    match finder.find(observation) {
        Ok(analysis) => {
            let score = analysis.global_key.mirex_score(truth);
            FileOutcome {
                path: path.clone(),
                truth: Some(truth),
                guess: Some(analysis.global_key),
                score,
                error: 1.0 - score * score,
            }
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "decoding failed");
            FileOutcome::failed(path.clone(), Some(truth))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pitch_slices::Observation;
    use pretty_assertions::assert_eq;

    fn ready(path: &str, sequence: &str, key: &str) -> DatasetEntry {
        DatasetEntry::Ready {
            path: PathBuf::from(path),
            observation: Observation::from_sequence(sequence).unwrap(),
            key: key.parse().unwrap(),
        }
    }

    fn cadences() -> Dataset {
        Dataset::from_entries(vec![
            ready("c_major_C.pcs", "0,4,7,5,9,0,7,11,2,0,4,7", "C"),
            ready("g_major_G.pcs", "7,11,2,0,4,7,2,6,9,7,11,2", "G"),
        ])
    }

    #[test]
    fn unreadable_file_costs_the_penalty_without_failing() {
        let dataset = Dataset::from_entries(vec![
            ready("c_major_C.pcs", "0,4,7,5,9,0,7,11,2,0,4,7", "C"),
            DatasetEntry::Failed {
                path: PathBuf::from("broken.mid"),
                reason: "truncated header".into(),
            },
        ]);
        let registries = Registries::defaults().unwrap();
        let evaluator = Evaluator::new(&dataset, 2).unwrap();

        let outcomes = evaluator.evaluate_files(&registries, "sapp", "ktg_exponential10");
        let grade = evaluator.evaluate(&registries, "sapp", "ktg_exponential10");

        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[1].guess, None);
        assert_eq!(outcomes[1].error, FAILURE_PENALTY);
        assert!(grade.error.is_finite());
        assert!(grade.error <= 2.0 * FAILURE_PENALTY);
        assert!(grade.error >= FAILURE_PENALTY);
    }

    #[test]
    fn unknown_parameter_charges_every_file() {
        let dataset = cadences();
        let registries = Registries::defaults().unwrap();
        let evaluator = Evaluator::new(&dataset, 1).unwrap();

        let grade = evaluator.evaluate(&registries, "no_such_profile", "linear");

        assert_eq!(grade.error, 2.0 * FAILURE_PENALTY);
    }

    #[test]
    fn clear_cadences_are_found() {
        let dataset = cadences();
        let registries = Registries::defaults().unwrap();
        let evaluator = Evaluator::new(&dataset, 2).unwrap();

        let outcomes = evaluator.evaluate_files(&registries, "krumhansl_kessler", "ktg_exponential10");

        for outcome in &outcomes {
            assert_eq!(outcome.guess, outcome.truth, "{}", outcome.path.display());
            assert_eq!(outcome.error, 0.0);
        }
    }

    #[test]
    fn grade_is_sorted_best_first() {
        let dataset = cadences();
        let registries = Registries::defaults().unwrap();
        let evaluator = Evaluator::new(&dataset, 2).unwrap();
        let profiles = ["krumhansl_kessler", "sapp", "no_such_profile"];

        let grades = evaluator.grade_key_profiles(&registries, &profiles, "ktg_exponential10");

        assert_eq!(grades.len(), 3);
        assert!(grades.windows(2).all(|w| w[0].error <= w[1].error));
        assert_eq!(grades[2].key_profile, "no_such_profile");
        let min = grades.iter().map(|g| g.error).fold(f64::INFINITY, f64::min);
        assert_eq!(grades[0].error, min);
    }

    #[test]
    fn totals_do_not_depend_on_worker_count() {
        let dataset = cadences();
        let registries = Registries::defaults().unwrap();

        let single = Evaluator::new(&dataset, 1).unwrap();
        let many = Evaluator::new(&dataset, 4).unwrap();

        for transition in ["linear", "symmetrical", "ktg_exponential2"] {
            assert_eq!(
                single.evaluate(&registries, "temperley", transition),
                many.evaluate(&registries, "temperley", transition)
            );
        }
    }
}
