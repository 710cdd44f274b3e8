//! Default key profiles and key transitions from the key-finding literature.

use crate::registry::{ParameterKind, ParameterRegistry};
use crate::Result;

/// Transition slots grouped from closest to most distant key relation.
///
/// Slot `i < 12` moves to the major key `i` semitones above a major source;
/// slot `12 + i` moves to the minor key `i` semitones above it.
pub const KEY_TRANSITION_GROUPS: [&[usize]; 9] = [
    &[0],
    &[5, 7, 12, 21],
    &[14, 16, 17, 19],
    &[2, 3, 9, 10],
    &[4, 8, 22, 23],
    &[1, 11],
    &[15, 18],
    &[13, 20],
    &[6],
];

/// Major-mode pitch classes by hierarchy: tonic/dominant, diatonic, chromatic.
pub const MAJOR_PROFILE_GROUPS: [&[usize]; 3] = [&[0, 7], &[2, 4, 5, 9, 11], &[1, 3, 6, 8, 10]];

/// Minor-mode pitch classes by hierarchy: tonic/dominant, harmonic,
/// natural/melodic, chromatic.
pub const MINOR_PROFILE_GROUPS: [&[usize]; 4] = [&[0, 7], &[2, 3, 5, 8, 11], &[9, 10], &[1, 4, 6]];

/// Transition that always stays in the current key.
pub const NULL_TRANSITION: [f64; 24] = [
    1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0,
    0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0,
];

const SAPP_MAJOR: [f64; 12] = [2.0, 0.0, 1.0, 0.0, 1.0, 1.0, 0.0, 2.0, 0.0, 1.0, 0.0, 1.0];

const RAW_KEY_PROFILES: [(&str, [f64; 12], [f64; 12]); 10] = [
    (
        "krumhansl_kessler",
        [6.35, 2.23, 3.48, 2.33, 4.38, 4.09, 2.52, 5.19, 2.39, 3.66, 2.29, 2.88],
        [6.33, 2.68, 3.52, 5.38, 2.60, 3.53, 2.54, 4.75, 3.98, 2.69, 3.34, 3.17],
    ),
    (
        "aarden_essen",
        [
            17.7661, 0.145624, 14.9265, 0.160186, 19.8049, 11.3587, 0.291248, 22.062, 0.145624,
            8.15494, 0.232998, 4.95122,
        ],
        [
            18.2648, 0.737619, 14.0499, 16.8599, 0.702494, 14.4362, 0.702494, 18.6161, 4.56621,
            1.93186, 7.37619, 1.75623,
        ],
    ),
    (
        "sapp",
        SAPP_MAJOR,
        [2.0, 0.0, 1.0, 1.0, 0.0, 1.0, 0.0, 2.0, 1.0, 0.0, 0.5, 0.5],
    ),
    (
        "bellman_budge",
        [16.8, 0.86, 12.95, 1.41, 13.49, 11.93, 1.25, 20.28, 1.8, 8.04, 0.62, 10.57],
        [18.16, 0.69, 12.99, 13.34, 1.07, 11.15, 1.38, 21.07, 7.49, 1.53, 0.92, 10.21],
    ),
    (
        "temperley",
        [0.748, 0.06, 0.488, 0.082, 0.67, 0.46, 0.096, 0.715, 0.104, 0.366, 0.057, 0.4],
        [0.712, 0.084, 0.474, 0.618, 0.049, 0.46, 0.105, 0.747, 0.404, 0.067, 0.133, 0.33],
    ),
    (
        "albrecht_shanahan1",
        [0.238, 0.006, 0.111, 0.006, 0.137, 0.094, 0.016, 0.214, 0.009, 0.080, 0.008, 0.081],
        [0.220, 0.006, 0.104, 0.123, 0.019, 0.103, 0.012, 0.214, 0.062, 0.022, 0.061, 0.052],
    ),
    (
        "albrecht_shanahan2",
        [
            0.21169, 0.00892766, 0.120448, 0.0100265, 0.131444, 0.0911768, 0.0215947, 0.204703,
            0.012894, 0.0900445, 0.012617, 0.0844338,
        ],
        [
            0.201933, 0.009335, 0.107284, 0.124169, 0.0199224, 0.108324, 0.014314, 0.202699,
            0.0653907, 0.0252515, 0.071959, 0.049419,
        ],
    ),
    (
        "simple_natural_minor",
        SAPP_MAJOR,
        [2.0, 0.0, 1.0, 1.0, 0.0, 1.0, 0.0, 2.0, 1.0, 0.0, 1.0, 0.0],
    ),
    (
        "simple_harmonic_minor",
        SAPP_MAJOR,
        [2.0, 0.0, 1.0, 1.0, 0.0, 1.0, 0.0, 2.0, 1.0, 0.0, 0.0, 1.0],
    ),
    (
        "simple_melodic_minor",
        SAPP_MAJOR,
        [2.0, 0.0, 1.0, 1.0, 0.0, 1.0, 0.0, 2.0, 0.5, 0.5, 0.5, 0.5],
    ),
];

const GEOMETRIC_TRANSITIONS: [(&str, f64); 4] = [
    ("ktg_exponential2", 2.0),
    ("ktg_exponential5", 5.0),
    ("ktg_exponential10", 10.0),
    ("ktg_exponential15", 15.0),
];

/// Names of the bundled key profiles.
pub fn key_profile_names() -> impl Iterator<Item = &'static str> {
    RAW_KEY_PROFILES.iter().map(|(name, _, _)| *name)
}

/// Transition whose group `g` weighs `ratio^(8 - g)`, normalized.
pub fn geometric_transition(ratio: f64) -> Vec<f64> {
    let last = (KEY_TRANSITION_GROUPS.len() - 1) as i32;
    grouped_transition(|group| ratio.powi(last - group as i32))
}

/// Transition whose group `g` weighs `9 - g`, normalized.
pub fn linear_transition() -> Vec<f64> {
    let count = KEY_TRANSITION_GROUPS.len();
    grouped_transition(|group| (count - group) as f64)
}

/// Fill every slot with `weight(group)` and normalize.
pub fn grouped_transition(mut weight: impl FnMut(usize) -> f64) -> Vec<f64> {
    let mut values = vec![0.0; 24];
    for (group, slots) in KEY_TRANSITION_GROUPS.iter().enumerate() {
        for &slot in slots.iter() {
            values[slot] = weight(group);
        }
    }
    ParameterKind::KeyTransition.normalize(&mut values);
    values
}

/// Registry holding every bundled key profile.
pub fn default_key_profiles() -> Result<ParameterRegistry> {
    let mut registry = ParameterRegistry::new(ParameterKind::KeyProfile);
    for (name, major, minor) in RAW_KEY_PROFILES.iter() {
        let mut values: Vec<f64> = major.iter().chain(minor.iter()).copied().collect();
        ParameterKind::KeyProfile.normalize(&mut values);
        registry.insert(*name, values)?;
    }
    Ok(registry)
}

/// Registry holding every bundled key transition.
pub fn default_key_transitions() -> Result<ParameterRegistry> {
    let mut registry = ParameterRegistry::new(ParameterKind::KeyTransition);
    for (name, ratio) in GEOMETRIC_TRANSITIONS {
        registry.insert(name, geometric_transition(ratio))?;
        registry.store_ratio(name, ratio);
    }
    registry.insert("linear", linear_transition())?;
    registry.insert("symmetrical", vec![1.0 / 24.0; 24])?;
    registry.insert("null", NULL_TRANSITION.to_vec())?;
    Ok(registry)
}
