//! Probability tables derived from profile and transition vectors.

use crate::NUM_KEYS;

/// `[from][to]` over the 24 key states.
pub type KeyMatrix = [[f64; NUM_KEYS]; NUM_KEYS];

/// `[key][pitch_class]`.
pub type EmissionMatrix = [[f64; 12]; NUM_KEYS];

/// Probabilities at or below this are treated as impossible.
pub const PROBABILITY_FLOOR: f64 = 8.7565e-27;

pub fn ln_floor(p: f64) -> f64 {
    if p > PROBABILITY_FLOOR {
        p.ln()
    } else {
        f64::NEG_INFINITY
    }
}

#[inline]
fn interval(from: usize, to: usize) -> usize {
    (to + 12 - from % 12) % 12
}

/// Expand a 24-slot transition vector into a full transition matrix.
///
/// Each row is the vector re-centred on the source tonic, so `T[k][k]` is
/// always slot 0. For a minor source the blocks swap: moves to minor keys
/// read the first block and moves to major keys read the second, offset by
/// the three semitones between a minor tonic and its relative major.
pub fn transition_matrix(kt: &[f64; NUM_KEYS]) -> KeyMatrix {
    let mut table = [[0.0; NUM_KEYS]; NUM_KEYS];
    for (from, row) in table.iter_mut().enumerate() {
        for to in 0..12 {
            let up = interval(from, to);
            if from < 12 {
                row[to] = kt[up];
                row[12 + to] = kt[12 + up];
            } else {
                row[to] = kt[12 + (up + 9) % 12];
                row[12 + to] = kt[up];
            }
        }
    }
    table
}

/// Rotate the major half onto keys 0-11 and the minor half onto 12-23.
pub fn emission_matrix(profile: &[f64; NUM_KEYS]) -> EmissionMatrix {
    let mut table = [[0.0; 12]; NUM_KEYS];
    for (key, row) in table.iter_mut().enumerate() {
        let half = if key < 12 { &profile[..12] } else { &profile[12..] };
        for (pc, p) in row.iter_mut().enumerate() {
            *p = half[interval(key, pc)];
        }
    }
    table
}

/// Elementwise [`ln_floor`].
pub fn log_table<const M: usize>(table: &[[f64; M]; NUM_KEYS]) -> [[f64; M]; NUM_KEYS] {
    let mut out = [[0.0; M]; NUM_KEYS];
    for (dst, src) in out.iter_mut().zip(table.iter()) {
        for (d, s) in dst.iter_mut().zip(src.iter()) {
            *d = ln_floor(*s);
        }
    }
    out
}
