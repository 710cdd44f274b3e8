use pitch_slices::{majority_by_slice, Observation};
use serde::Serialize;
use tracing::trace;

use crate::key::Key;
use crate::library::NULL_TRANSITION;
use crate::registry::ParameterRegistry;
use crate::tables::{emission_matrix, log_table, transition_matrix, EmissionMatrix, KeyMatrix};
use crate::viterbi::decode;
use crate::{Error, Result, NUM_KEYS};

/// Output of two-pass decoding for one observation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeyAnalysis {
    pub global_key: Key,
    /// One key per flat observation with the slice it belongs to.
    pub local_keys: Vec<(Key, usize)>,
    /// Log probability of the first-pass path.
    pub log_probability: f64,
    pub slice_count: usize,
}

impl KeyAnalysis {
    /// Majority local key per slice; `None` for slices without notes.
    pub fn slice_keys(&self) -> Vec<Option<Key>> {
        majority_by_slice(self.slice_count, self.local_keys.iter().copied())
    }
}

/// Decoder for one (key profile, key transition) pair.
///
/// Log tables are built once, so a finder is cheap to reuse across files
/// and can be shared between threads.
#[derive(Debug, Clone)]
pub struct KeyFinder {
    log_transition: KeyMatrix,
    log_emission: EmissionMatrix,
    log_global_transition: KeyMatrix,
}

impl KeyFinder {
    pub fn new(profile: &[f64], transition: &[f64]) -> Result<Self> {
        let profile = as_vector("key profile", profile)?;
        let transition = as_vector("key transition", transition)?;

        Ok(Self {
            log_transition: log_table(&transition_matrix(&transition)),
            log_emission: log_table(&emission_matrix(&profile)),
            log_global_transition: log_table(&transition_matrix(&NULL_TRANSITION)),
        })
    }

    /// Resolve both parameters by name.
    pub fn from_registries(
        profiles: &ParameterRegistry,
        transitions: &ParameterRegistry,
        profile_name: &str,
        transition_name: &str,
    ) -> Result<Self> {
        let profile = profiles.get(profile_name)?;
        let transition = transitions.get(transition_name)?;
        Self::new(profile, transition).map_err(|e| match e {
            Error::InvalidParameter { reason, .. } => Error::InvalidParameter {
                name: format!("{profile_name}/{transition_name}"),
                reason,
            },
            other => other,
        })
    }

    /// Decode local keys, then decode the local keys once more for a
    /// single global key.
    pub fn find(&self, observation: &Observation) -> Result<KeyAnalysis> {
        let symbols: Vec<usize> = observation
            .pitch_classes()
            .iter()
            .map(|&pc| pc as usize)
            .collect();

        let local = decode(&symbols, &self.log_transition, &self.log_emission)
            .ok_or(Error::EmptyInput)?;

        // Local keys are emitted through the first-pass transition table and
        // chained by the identity, so the whole path is one key.
        let global = decode(&local.states, &self.log_global_transition, &self.log_transition)
            .ok_or(Error::EmptyInput)?;

        let to_key = |index: usize| Key::from_index(index).ok_or(Error::EmptyInput);
        let global_key = to_key(global.states[0])?;
        let local_keys = local
            .states
            .iter()
            .zip(observation.slice_indices())
            .map(|(&state, &slice)| Ok((to_key(state)?, slice)))
            .collect::<Result<Vec<_>>>()?;

        trace!(
            global = %global_key,
            observations = symbols.len(),
            log_probability = local.log_probability,
            "decoded key"
        );

        Ok(KeyAnalysis {
            global_key,
            local_keys,
            log_probability: local.log_probability,
            slice_count: observation.slice_count(),
        })
    }
}

fn as_vector(what: &str, values: &[f64]) -> Result<[f64; NUM_KEYS]> {
    values.try_into().map_err(|_| Error::InvalidParameter {
        name: what.to_string(),
        reason: format!("expected {NUM_KEYS} values, got {}", values.len()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::{default_key_profiles, default_key_transitions};
    use pitch_slices::PitchClassSlice;
    use pretty_assertions::assert_eq;

    fn observation(slices: &[&[i64]]) -> Observation {
        Observation::new(
            slices
                .iter()
                .map(|s| PitchClassSlice::new(s.iter().copied()).unwrap())
                .collect(),
        )
    }

    fn finder(profile: &str, transition: &str) -> KeyFinder {
        let profiles = default_key_profiles().unwrap();
        let transitions = default_key_transitions().unwrap();
        KeyFinder::from_registries(&profiles, &transitions, profile, transition).unwrap()
    }

    fn key(name: &str) -> Key {
        name.parse().unwrap()
    }

    #[test]
    fn c_major_triad_is_c() {
        for transition in ["symmetrical", "linear", "ktg_exponential2"] {
            let analysis = finder("sapp", transition)
                .find(&observation(&[&[0, 4, 7]]))
                .unwrap();

            assert_eq!(analysis.global_key, key("C"), "{transition}");
            assert_eq!(analysis.local_keys.len(), 3);
            assert!(analysis.local_keys.iter().all(|(_, slice)| *slice == 0));
        }
    }

    #[test]
    fn cadence_in_d_major() {
        // D  G  A7  D
        let obs = observation(&[&[2, 6, 9], &[7, 11, 2], &[9, 1, 4, 7], &[2, 6, 9]]);
        let analysis = finder("krumhansl_kessler", "ktg_exponential10").find(&obs).unwrap();

        assert_eq!(analysis.global_key, key("D"));
        assert_eq!(analysis.slice_keys().len(), 4);
    }

    #[test]
    fn minor_cadence() {
        // a  d  E  a
        let obs = observation(&[&[9, 0, 4], &[2, 5, 9], &[4, 8, 11], &[9, 0, 4], &[9, 0, 4]]);
        let analysis = finder("temperley", "ktg_exponential10").find(&obs).unwrap();

        assert_eq!(analysis.global_key, key("a"));
    }

    #[test]
    fn empty_observation_is_an_error() {
        let result = finder("sapp", "linear").find(&observation(&[&[]]));
        assert!(matches!(result, Err(Error::EmptyInput)));
    }

    #[test]
    fn missing_parameter_is_reported() {
        let profiles = default_key_profiles().unwrap();
        let transitions = default_key_transitions().unwrap();
        let result = KeyFinder::from_registries(&profiles, &transitions, "nope", "linear");
        assert!(matches!(result, Err(Error::ParameterNotFound(name)) if name == "nope"));
    }

    #[test]
    fn wrong_length_is_invalid() {
        assert!(matches!(
            KeyFinder::new(&[0.5; 12], &[1.0 / 24.0; 24]),
            Err(Error::InvalidParameter { .. })
        ));
    }

    #[test]
    fn slice_keys_follow_majority() {
        let analysis = KeyAnalysis {
            global_key: key("C"),
            local_keys: vec![(key("C"), 0), (key("G"), 0), (key("G"), 0), (key("F"), 2)],
            log_probability: -3.0,
            slice_count: 3,
        };
        assert_eq!(analysis.slice_keys(), vec![Some(key("G")), None, Some(key("F"))]);
    }
}
