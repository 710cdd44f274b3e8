//! Decode sequences sampled from a known key and check the key comes back.

use keyfinder::{default_key_profiles, default_key_transitions, Key, KeyFinder};
use pitch_slices::{Observation, PitchClassSlice};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn sample_pitch_class(rng: &mut StdRng, key: Key, profile: &[f64]) -> i64 {
    let half = if key.index() < 12 { &profile[..12] } else { &profile[12..] };
    let mut target = rng.random::<f64>() * half.iter().sum::<f64>();
    for (interval, weight) in half.iter().enumerate() {
        target -= weight;
        if target <= 0.0 {
            return ((key.tonic() as usize + interval) % 12) as i64;
        }
    }
    key.tonic() as i64
}

#[test]
fn sampled_keys_are_recovered_well_above_chance() {
    let profiles = default_key_profiles().unwrap();
    let transitions = default_key_transitions().unwrap();
    let profile = profiles.get("krumhansl_kessler").unwrap().to_vec();
    let finder =
        KeyFinder::from_registries(&profiles, &transitions, "krumhansl_kessler", "ktg_exponential10")
            .unwrap();

    let mut rng = StdRng::seed_from_u64(0x5eed);
    let trials = 48;
    let mut correct = 0;

    for _ in 0..trials {
        let truth = Key::from_index(rng.random_range(0..24)).unwrap();
        let slices = (0..60)
            .map(|_| PitchClassSlice::new([sample_pitch_class(&mut rng, truth, &profile)]).unwrap())
            .collect();
        let analysis = finder.find(&Observation::new(slices)).unwrap();
        if analysis.global_key == truth {
            correct += 1;
        }
    }

    // Chance is 1 in 24
    assert!(
        correct * 2 >= trials,
        "recovered {correct} of {trials} sampled keys"
    );
}

#[test]
fn decoding_twice_gives_identical_results() {
    let profiles = default_key_profiles().unwrap();
    let transitions = default_key_transitions().unwrap();
    let finder = KeyFinder::from_registries(&profiles, &transitions, "aarden_essen", "linear").unwrap();
    let obs = Observation::from_sequence("7,11,2,5,4,0,7,9,11,0,2,7").unwrap();

    assert_eq!(finder.find(&obs).unwrap(), finder.find(&obs).unwrap());
}
