//! End-to-end runs over a dataset written to a temporary directory.

use keyconf::OptimizerConfig;
use keytuner::{Dataset, Evaluator, Optimizer, Registries, FAILURE_PENALTY};
use pitch_slices::FileSource;
use pretty_assertions::assert_eq;
use std::path::{Path, PathBuf};

fn write_dataset(dir: &Path) -> PathBuf {
    // C major and G major cadences, one slice per line
    std::fs::write(dir.join("cadence_C.pcs"), "0 4 7\n5 9 0\n7 11 2\n0 4 7\n").unwrap();
    std::fs::write(dir.join("cadence_G.pcs"), "G B D\nC E G\nD F# A\nG B D\n").unwrap();
    // Not a MIDI file despite the extension
    std::fs::write(dir.join("broken_D.mid"), b"not midi").unwrap();

    let manifest = dir.join("manifest.txt");
    std::fs::write(
        &manifest,
        "# two cadences and one broken file\ncadence_C.pcs\ncadence_G.pcs\nbroken_D.mid\n",
    )
    .unwrap();
    manifest
}

fn config() -> OptimizerConfig {
    OptimizerConfig {
        population_size: 2,
        initial_key_profiles: vec!["krumhansl_kessler".into(), "sapp".into()],
        initial_key_transitions: vec!["ktg_exponential10".into()],
        max_generations: Some(3),
        seed: Some(1),
        ..OptimizerConfig::default()
    }
}

#[test]
fn broken_file_is_charged_not_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let dataset = Dataset::load(&write_dataset(dir.path()), &FileSource).unwrap();
    assert_eq!(dataset.len(), 3);
    assert_eq!(dataset.failed_count(), 1);

    let evaluator = Evaluator::new(&dataset, 2).unwrap();
    let registries = Registries::defaults().unwrap();
    let grade = evaluator.evaluate(&registries, "krumhansl_kessler", "ktg_exponential10");

    assert_eq!(grade.error, FAILURE_PENALTY);
}

#[test]
fn capped_search_reports_the_best_pair() {
    let dir = tempfile::tempdir().unwrap();
    let dataset = Dataset::load(&write_dataset(dir.path()), &FileSource).unwrap();
    let evaluator = Evaluator::new(&dataset, 2).unwrap();
    let mut registries = Registries::defaults().unwrap();

    let outcome = Optimizer::new(config(), &evaluator).unwrap().run(&mut registries).unwrap();

    // The broken file keeps the error from ever reaching zero
    assert!(!outcome.converged);
    assert_eq!(outcome.error, FAILURE_PENALTY);
    assert_eq!(outcome.profile_generations + outcome.transition_generations, 3);
    assert!(registries.profiles.contains(&outcome.key_profile));
    assert!(registries.transitions.contains(&outcome.key_transition));
}

#[test]
fn just_evaluate_scores_every_seed() {
    let dir = tempfile::tempdir().unwrap();
    let dataset = Dataset::load(&write_dataset(dir.path()), &FileSource).unwrap();
    let evaluator = Evaluator::new(&dataset, 1).unwrap();
    let mut registries = Registries::defaults().unwrap();

    let outcome = Optimizer::new(config(), &evaluator)
        .unwrap()
        .just_evaluate(true)
        .run(&mut registries)
        .unwrap();

    assert_eq!(outcome.key_profile, "krumhansl_kessler");
    assert_eq!(outcome.key_transition, "ktg_exponential10");
    assert_eq!(outcome.scores.len(), 2);
    assert_eq!(outcome.profile_generations, 0);
    assert_eq!(outcome.transition_generations, 0);
}
