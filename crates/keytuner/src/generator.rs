use keyfinder::library::{MAJOR_PROFILE_GROUPS, MINOR_PROFILE_GROUPS};
use keyfinder::{ParameterKind, ParameterRegistry};
use rand::Rng;
use tracing::debug;

use crate::{Error, Result};

/// Probability of drawing a geometric rather than a stochastic transition.
const GEOMETRIC_SHARE: f64 = 0.9;

/// Random, music-theoretically shaped parameter vectors.
///
/// Weights shrink by half per hierarchy level, so tonic and dominant stay
/// strong while chromatic tones stay weak.
#[derive(Debug, Clone)]
pub struct Generator {
    kp_max_range: f64,
    kt_max_range: f64,
}

impl Generator {
    /// Both ranges must be positive and finite, or no draw could ever
    /// carry weight.
    pub fn new(kp_max_range: f64, kt_max_range: f64) -> Result<Self> {
        for (name, value) in [("kp_max_range", kp_max_range), ("kt_max_range", kt_max_range)] {
            if !(value.is_finite() && value > 0.0) {
                return Err(Error::InvalidRange { name, value });
            }
        }
        Ok(Self {
            kp_max_range,
            kt_max_range,
        })
    }

    /// Register a random key profile as `kp<id>`.
    pub fn generate_key_profile<R: Rng>(
        &self,
        rng: &mut R,
        registry: &mut ParameterRegistry,
    ) -> Result<String> {
        let mut values = hierarchical_half(rng, &MAJOR_PROFILE_GROUPS, self.kp_max_range);
        values.extend(hierarchical_half(rng, &MINOR_PROFILE_GROUPS, self.kp_max_range));
        ParameterKind::KeyProfile.normalize(&mut values);

        let name = registry.fresh_name("kp");
        registry.insert(name.clone(), values)?;
        debug!(name = %name, "generated key profile");
        Ok(name)
    }

    pub fn generate_key_profiles<R: Rng>(
        &self,
        rng: &mut R,
        registry: &mut ParameterRegistry,
        count: usize,
    ) -> Result<Vec<String>> {
        (0..count)
            .map(|_| self.generate_key_profile(rng, registry))
            .collect()
    }

    /// Register a random key transition as `ktg<id>` (geometric, ratio
    /// stored) or `kts<id>` (stochastic).
    pub fn generate_key_transition<R: Rng>(
        &self,
        rng: &mut R,
        registry: &mut ParameterRegistry,
    ) -> Result<String> {
        if rng.random_bool(GEOMETRIC_SHARE) {
            let ratio = 2.0 + rng.random::<f64>() * 48.0;
            let name = registry.fresh_name("ktg");
            registry.insert(name.clone(), keyfinder::library::geometric_transition(ratio))?;
            registry.store_ratio(name.clone(), ratio);
            debug!(name = %name, ratio, "generated geometric key transition");
            Ok(name)
        } else {
            let values = loop {
                let values = keyfinder::library::grouped_transition(|group| {
                    rng.random::<f64>() * self.kt_max_range / 2f64.powi(group as i32)
                });
                // All-zero draws normalize to uniform; redraw instead
                if values.iter().any(|v| *v != values[0]) {
                    break values;
                }
            };
            let name = registry.fresh_name("kts");
            registry.insert(name.clone(), values)?;
            debug!(name = %name, "generated stochastic key transition");
            Ok(name)
        }
    }

    pub fn generate_key_transitions<R: Rng>(
        &self,
        rng: &mut R,
        registry: &mut ParameterRegistry,
        count: usize,
    ) -> Result<Vec<String>> {
        (0..count)
            .map(|_| self.generate_key_transition(rng, registry))
            .collect()
    }
}

/// Twelve raw weights, level `h` drawn from `[0, max_range / 2^h)`.
fn hierarchical_half<R: Rng>(rng: &mut R, groups: &[&[usize]], max_range: f64) -> Vec<f64> {
    loop {
        let mut half = vec![0.0; 12];
        for (level, members) in groups.iter().enumerate() {
            let bound = max_range / 2f64.powi(level as i32);
            for &pc in members.iter() {
                half[pc] = rng.random::<f64>() * bound;
            }
        }
        if half.iter().sum::<f64>() > 0.0 {
            return half;
        }
    }
}
