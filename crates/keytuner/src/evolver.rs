//! Next generation from a graded population: keep the best, keep a few
//! stragglers, mutate some, then breed children until the population is
//! back to size.

use keyconf::OptimizerConfig;
use keyfinder::{ParameterKind, ParameterRegistry};
use rand::Rng;
use std::ops::Range;
use tracing::{debug, warn};

use crate::evaluator::Grade;
use crate::{Error, Registries, Result};

/// One graded member of a population.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub error: f64,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct Evolver {
    retain: f64,
    random_select: f64,
    mutate_rate: f64,
}

impl Default for Evolver {
    fn default() -> Self {
        Self {
            retain: 0.5,
            random_select: 0.02,
            mutate_rate: 0.1,
        }
    }
}

impl Evolver {
    pub fn new(retain: f64, random_select: f64, mutate_rate: f64) -> Self {
        Self {
            retain,
            random_select,
            mutate_rate,
        }
    }

    pub fn from_config(config: &OptimizerConfig) -> Self {
        Self::new(config.retain, config.random_select, config.mutate_rate)
    }

    /// Breed a new population of the same size as `graded`.
    ///
    /// Every new vector is registered in `registry` under a fresh name.
    /// Names missing from the registry are skipped.
    pub fn evolve<R: Rng>(
        &self,
        rng: &mut R,
        registry: &mut ParameterRegistry,
        graded: &[Candidate],
    ) -> Result<Vec<String>> {
        let target = graded.len();
        let mut ranked: Vec<&Candidate> = graded
            .iter()
            .filter(|candidate| {
                let known = registry.contains(&candidate.name);
                if !known {
                    warn!(kind = %registry.kind(), name = %candidate.name, "skipping unregistered candidate");
                }
                known
            })
            .collect();
        if ranked.is_empty() {
            return Err(Error::EmptyPopulation);
        }
        ranked.sort_by(|a, b| a.error.total_cmp(&b.error));

        let retain_length = ((ranked.len() as f64 * self.retain) as usize).clamp(1, ranked.len());
        let mut parents: Vec<String> = ranked[..retain_length]
            .iter()
            .map(|candidate| candidate.name.clone())
            .collect();

        for straggler in &ranked[retain_length..] {
            if rng.random::<f64>() < self.random_select {
                parents.push(straggler.name.clone());
            }
        }

        for parent in parents.iter_mut() {
            if rng.random::<f64>() < self.mutate_rate {
                let mutant = mutate(rng, registry, parent)?;
                *parent = mutant;
            }
        }

        let mut population = parents.clone();
        while population.len() < target {
            let child = if parents.len() < 2 {
                mutate(rng, registry, &parents[0])?
            } else {
                let male = rng.random_range(0..parents.len());
                let female = rng.random_range(0..parents.len());
                if male == female {
                    continue;
                }
                crossover(registry, &parents[male], &parents[female])?
            };
            population.push(child);
        }

        debug!(
            kind = %registry.kind(),
            parents = parents.len(),
            children = population.len() - parents.len(),
            "evolved population"
        );
        Ok(population)
    }

    /// Evolve the profile axis from grades that share one transition.
    pub fn evolve_key_profiles<R: Rng>(
        &self,
        rng: &mut R,
        registries: &mut Registries,
        grades: &[Grade],
    ) -> Result<Vec<String>> {
        let graded: Vec<Candidate> = grades
            .iter()
            .map(|grade| Candidate {
                error: grade.error,
                name: grade.key_profile.clone(),
            })
            .collect();
        self.evolve(rng, &mut registries.profiles, &graded)
    }

    /// Evolve the transition axis from grades that share one profile.
    pub fn evolve_key_transitions<R: Rng>(
        &self,
        rng: &mut R,
        registries: &mut Registries,
        grades: &[Grade],
    ) -> Result<Vec<String>> {
        let graded: Vec<Candidate> = grades
            .iter()
            .map(|grade| Candidate {
                error: grade.error,
                name: grade.key_transition.clone(),
            })
            .collect();
        self.evolve(rng, &mut registries.transitions, &graded)
    }
}

/// Slots normalized together with `slot`.
fn block_of(kind: ParameterKind, len: usize, slot: usize) -> Range<usize> {
    match kind {
        ParameterKind::KeyProfile if slot < len / 2 => 0..len / 2,
        ParameterKind::KeyProfile => len / 2..len,
        ParameterKind::KeyTransition => 0..len,
    }
}

/// Redraw one slot below its block's peak and register the result.
fn mutate<R: Rng>(rng: &mut R, registry: &mut ParameterRegistry, name: &str) -> Result<String> {
    let kind = registry.kind();
    let mut values = registry.get(name)?.to_vec();

    let slot = rng.random_range(0..values.len());
    let peak = values[block_of(kind, values.len(), slot)]
        .iter()
        .copied()
        .fold(0.0, f64::max);
    values[slot] = rng.random::<f64>() * peak;
    kind.normalize(&mut values);

    let mutant = registry.insert_fresh(kind.prefix(), values)?;
    debug!(parent = %name, mutant = %mutant, slot, "mutated");
    Ok(mutant)
}

/// First half of `male`, second half of `female`.
fn crossover(registry: &mut ParameterRegistry, male: &str, female: &str) -> Result<String> {
    let kind = registry.kind();
    let head = registry.get(male)?;
    let tail = registry.get(female)?;
    let half = head.len() / 2;

    let mut values: Vec<f64> = head[..half].iter().chain(&tail[half..]).copied().collect();
    kind.normalize(&mut values);

    let child = registry.insert_fresh(kind.prefix(), values)?;
    debug!(male = %male, female = %female, child = %child, "crossed over");
    Ok(child)
}
