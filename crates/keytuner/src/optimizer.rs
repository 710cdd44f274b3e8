//! Coordinator for the genetic search.
//!
//! One axis evolves at a time while the other stays pinned to its best
//! member. A generation is accepted when its best error is lower, or equal
//! with a total no larger than the accepted one. Too many rejections in a
//! row switch the axis. Registries are only written here, between
//! evaluation batches.

use keyconf::OptimizerConfig;
use keyfinder::ParameterKind;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::fmt;
use tracing::{debug, info, warn};

use crate::evaluator::{Evaluator, Grade};
use crate::evolver::{Candidate, Evolver};
use crate::generator::Generator;
use crate::{Error, Registries, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EvolutionMode {
    KeyProfiles,
    KeyTransitions,
}

impl EvolutionMode {
    pub fn other(self) -> Self {
        match self {
            EvolutionMode::KeyProfiles => EvolutionMode::KeyTransitions,
            EvolutionMode::KeyTransitions => EvolutionMode::KeyProfiles,
        }
    }
}

impl fmt::Display for EvolutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvolutionMode::KeyProfiles => write!(f, "key profiles"),
            EvolutionMode::KeyTransitions => write!(f, "key transitions"),
        }
    }
}

/// Best pair found and how the search ended.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptimizationOutcome {
    pub key_profile: String,
    pub key_transition: String,
    pub error: f64,
    /// Errors of the last accepted population, best first.
    pub scores: Vec<f64>,
    pub profile_generations: u64,
    pub transition_generations: u64,
    /// The dataset was fit exactly.
    pub converged: bool,
}

/// Mutable search state between generations.
struct Search {
    best_profile: String,
    best_transition: String,
    lowest_error: f64,
    scores: Vec<f64>,
    profiles: Vec<Candidate>,
    transitions: Vec<Candidate>,
}

impl Search {
    fn outcome(&self, profile_generations: u64, transition_generations: u64) -> OptimizationOutcome {
        OptimizationOutcome {
            key_profile: self.best_profile.clone(),
            key_transition: self.best_transition.clone(),
            error: self.lowest_error,
            scores: self.scores.clone(),
            profile_generations,
            transition_generations,
            converged: self.lowest_error == 0.0,
        }
    }
}

/// Axis under evolution and the rejected generations in a row on it.
#[derive(Debug, Clone, PartialEq)]
struct Stagnation {
    mode: EvolutionMode,
    bad_generations: u32,
    swap_threshold: u32,
}

impl Stagnation {
    fn new(swap_threshold: u32) -> Self {
        Self {
            mode: EvolutionMode::KeyProfiles,
            bad_generations: 0,
            swap_threshold,
        }
    }

    /// Count one generation. Switches axis once rejections in a row exceed
    /// the threshold; returns whether it switched.
    fn record(&mut self, accepted: bool) -> bool {
        if accepted {
            self.bad_generations = 0;
            return false;
        }
        self.bad_generations += 1;
        if self.bad_generations > self.swap_threshold {
            self.mode = self.mode.other();
            self.bad_generations = 0;
            return true;
        }
        false
    }
}

pub struct Optimizer<'e, 'd> {
    config: OptimizerConfig,
    evaluator: &'e Evaluator<'d>,
    generator: Generator,
    evolver: Evolver,
    just_evaluate: bool,
}

impl<'e, 'd> Optimizer<'e, 'd> {
    /// Fails when the generator ranges are not positive and finite.
    pub fn new(config: OptimizerConfig, evaluator: &'e Evaluator<'d>) -> Result<Self> {
        Ok(Self {
            generator: Generator::new(config.kp_max_range, config.kt_max_range)?,
            evolver: Evolver::from_config(&config),
            config,
            evaluator,
            just_evaluate: false,
        })
    }

    /// Stop after scoring the initial populations.
    pub fn just_evaluate(mut self, just_evaluate: bool) -> Self {
        self.just_evaluate = just_evaluate;
        self
    }

    /// Run with the configured seed, or OS entropy when none is set.
    pub fn run(&self, registries: &mut Registries) -> Result<OptimizationOutcome> {
        let mut rng = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        self.run_with_rng(&mut rng, registries)
    }

    pub fn run_with_rng<R: Rng>(
        &self,
        rng: &mut R,
        registries: &mut Registries,
    ) -> Result<OptimizationOutcome> {
        let (profiles, transitions) = self.initial_populations(rng, registries)?;
        info!(
            profiles = profiles.len(),
            transitions = transitions.len(),
            files = self.evaluator.dataset().len(),
            "finding the best pair among the initial populations"
        );

        let mut search = self.scan(registries, profiles, transitions)?;
        info!(
            profile = %search.best_profile,
            transition = %search.best_transition,
            error = search.lowest_error,
            "best initial pair"
        );
        debug!(scores = ?search.scores, "initial scores");

        if self.just_evaluate {
            return Ok(search.outcome(0, 0));
        }

        let mut profile_generations = 0u64;
        let mut transition_generations = 0u64;
        let mut stagnation = Stagnation::new(self.config.evolution_swap_threshold);

        while search.lowest_error > 0.0 {
            if let Some(cap) = self.config.max_generations {
                if profile_generations + transition_generations >= cap {
                    warn!(
                        cap,
                        profile = %search.best_profile,
                        transition = %search.best_transition,
                        error = search.lowest_error,
                        "generation cap reached"
                    );
                    break;
                }
            }

            info!(
                profile_generation = profile_generations + 1,
                transition_generation = transition_generations + 1,
                evolving = %stagnation.mode,
                bad_generations = stagnation.bad_generations,
                "new generation"
            );

            let accepted = match stagnation.mode {
                EvolutionMode::KeyProfiles => {
                    profile_generations += 1;
                    self.evolve_profiles(rng, registries, &mut search)?
                }
                EvolutionMode::KeyTransitions => {
                    transition_generations += 1;
                    self.evolve_transitions(rng, registries, &mut search)?
                }
            };

            if !accepted {
                warn!(evolving = %stagnation.mode, "generation did no better");
            }
            if stagnation.record(accepted) {
                warn!(evolving = %stagnation.mode, "switching evolution axis");
            }

            info!(
                profile = %search.best_profile,
                transition = %search.best_transition,
                error = search.lowest_error,
                "best pair so far"
            );
        }

        let outcome = search.outcome(profile_generations, transition_generations);
        if outcome.converged {
            info!(
                profile = %outcome.key_profile,
                transition = %outcome.key_transition,
                "optimization converged"
            );
        }
        Ok(outcome)
    }

    /// Seeds first, then generated members up to the population size.
    fn initial_populations<R: Rng>(
        &self,
        rng: &mut R,
        registries: &mut Registries,
    ) -> Result<(Vec<String>, Vec<String>)> {
        check_seeds(registries, ParameterKind::KeyProfile, &self.config.initial_key_profiles)?;
        check_seeds(registries, ParameterKind::KeyTransition, &self.config.initial_key_transitions)?;

        let mut population_size = self.config.population_size;
        for (kind, seeds) in [
            (ParameterKind::KeyProfile, &self.config.initial_key_profiles),
            (ParameterKind::KeyTransition, &self.config.initial_key_transitions),
        ] {
            if population_size < seeds.len() {
                warn!(
                    %kind,
                    seeds = seeds.len(),
                    population_size,
                    "more seeds than population slots, raising population size"
                );
                population_size = seeds.len();
            }
        }

        let mut profiles = self.config.initial_key_profiles.clone();
        let generated_profiles = population_size - profiles.len();
        profiles.extend(self.generator.generate_key_profiles(
            rng,
            &mut registries.profiles,
            generated_profiles,
        )?);

        let mut transitions = self.config.initial_key_transitions.clone();
        let generated_transitions = population_size - transitions.len();
        transitions.extend(self.generator.generate_key_transitions(
            rng,
            &mut registries.transitions,
            generated_transitions,
        )?);

        info!(
            population_size,
            generated_profiles,
            generated_transitions,
            "initial populations ready"
        );
        if profiles.is_empty() || transitions.is_empty() {
            return Err(Error::EmptyPopulation);
        }
        Ok((profiles, transitions))
    }

    /// Grade every profile against each transition in turn. Stops early on
    /// a perfect fit.
    fn scan(
        &self,
        registries: &Registries,
        profiles: Vec<String>,
        transitions: Vec<String>,
    ) -> Result<Search> {
        let mut search = Search {
            best_profile: String::new(),
            best_transition: String::new(),
            lowest_error: f64::INFINITY,
            scores: Vec::new(),
            profiles: as_candidates(&profiles),
            transitions: Vec::new(),
        };

        for transition in &transitions {
            let grades = self.evaluator.grade_key_profiles(registries, &profiles, transition);
            let best = grades.first().ok_or(Error::EmptyPopulation)?;
            search.transitions.push(Candidate {
                error: best.error,
                name: transition.clone(),
            });

            if best.error < search.lowest_error {
                search.lowest_error = best.error;
                search.best_profile = best.key_profile.clone();
                search.best_transition = transition.clone();
                search.scores = grades.iter().map(|g| g.error).collect();
                search.profiles = profile_candidates(&grades);
                if search.lowest_error == 0.0 {
                    break;
                }
            }
            debug!(
                profile = %search.best_profile,
                transition = %search.best_transition,
                "best pair so far"
            );
        }

        search.transitions.sort_by(|a, b| a.error.total_cmp(&b.error));
        Ok(search)
    }

    fn evolve_profiles<R: Rng>(
        &self,
        rng: &mut R,
        registries: &mut Registries,
        search: &mut Search,
    ) -> Result<bool> {
        let offspring = self
            .evolver
            .evolve(rng, &mut registries.profiles, &search.profiles)?;
        let grades = self
            .evaluator
            .grade_key_profiles(registries, &offspring, &search.best_transition);

        let Some(best) = grades.first() else {
            return Err(Error::EmptyPopulation);
        };
        let new_scores: Vec<f64> = grades.iter().map(|g| g.error).collect();
        info!(error = best.error, profile = %best.key_profile, scores = ?new_scores, "graded key profiles");

        if improves(best.error, &new_scores, search.lowest_error, &search.scores) {
            search.lowest_error = best.error;
            search.best_profile = best.key_profile.clone();
            search.scores = new_scores;
            search.profiles = profile_candidates(&grades);
            let names: Vec<&str> = search.profiles.iter().map(|c| c.name.as_str()).collect();
            registries.profiles.keep(&names);
            registries.profiles.log_contents();
            Ok(true)
        } else {
            let losers = losers(&offspring, &search.profiles);
            registries.profiles.flush(&losers);
            Ok(false)
        }
    }

    fn evolve_transitions<R: Rng>(
        &self,
        rng: &mut R,
        registries: &mut Registries,
        search: &mut Search,
    ) -> Result<bool> {
        let offspring = self
            .evolver
            .evolve(rng, &mut registries.transitions, &search.transitions)?;
        let grades = self
            .evaluator
            .grade_key_transitions(registries, &search.best_profile, &offspring);

        let Some(best) = grades.first() else {
            return Err(Error::EmptyPopulation);
        };
        let new_scores: Vec<f64> = grades.iter().map(|g| g.error).collect();
        info!(error = best.error, transition = %best.key_transition, scores = ?new_scores, "graded key transitions");

        if improves(best.error, &new_scores, search.lowest_error, &search.scores) {
            search.lowest_error = best.error;
            search.best_transition = best.key_transition.clone();
            search.scores = new_scores;
            search.transitions = grades
                .iter()
                .map(|g| Candidate {
                    error: g.error,
                    name: g.key_transition.clone(),
                })
                .collect();
            let names: Vec<&str> = search.transitions.iter().map(|c| c.name.as_str()).collect();
            registries.transitions.keep(&names);
            registries.transitions.log_contents();
            Ok(true)
        } else {
            let losers = losers(&offspring, &search.transitions);
            registries.transitions.flush(&losers);
            Ok(false)
        }
    }
}

fn check_seeds(registries: &Registries, kind: ParameterKind, seeds: &[String]) -> Result<()> {
    let registry = registries.get(kind);
    match seeds.iter().find(|name| !registry.contains(name)) {
        Some(name) => Err(Error::UnknownSeed {
            kind,
            name: name.clone(),
        }),
        None => Ok(()),
    }
}

/// Lower best error, or the same best error with a total no larger.
fn improves(new_error: f64, new_scores: &[f64], error: f64, scores: &[f64]) -> bool {
    new_error < error
        || (new_error == error && new_scores.iter().sum::<f64>() <= scores.iter().sum::<f64>())
}

/// Offspring that are not members of the surviving population.
fn losers(offspring: &[String], population: &[Candidate]) -> Vec<String> {
    offspring
        .iter()
        .filter(|name| !population.iter().any(|c| &c.name == *name))
        .cloned()
        .collect()
}

fn profile_candidates(grades: &[Grade]) -> Vec<Candidate> {
    grades
        .iter()
        .map(|g| Candidate {
            error: g.error,
            name: g.key_profile.clone(),
        })
        .collect()
}

/// Ungraded members, all at zero error.
fn as_candidates(names: &[String]) -> Vec<Candidate> {
    names
        .iter()
        .map(|name| Candidate {
            error: 0.0,
            name: name.clone(),
        })
        .collect()
}
