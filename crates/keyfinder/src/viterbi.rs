use crate::tables::KeyMatrix;
use crate::NUM_KEYS;

/// Most likely state sequence and its log probability.
#[derive(Debug, Clone, PartialEq)]
pub struct ViterbiPath {
    pub states: Vec<usize>,
    pub log_probability: f64,
}

/// Viterbi decoding over the 24 key states with a uniform start.
///
/// `log_emission[state][symbol]` must cover every symbol in `observations`.
/// Ties resolve to the lowest state index, both for the best predecessor
/// and for the final state. Returns `None` for an empty sequence.
pub fn decode<const M: usize>(
    observations: &[usize],
    log_transition: &KeyMatrix,
    log_emission: &[[f64; M]; NUM_KEYS],
) -> Option<ViterbiPath> {
    let (&first, rest) = observations.split_first()?;
    let log_start = (1.0 / NUM_KEYS as f64).ln();

    let mut scores = [0.0; NUM_KEYS];
    for (state, score) in scores.iter_mut().enumerate() {
        *score = log_start + log_emission[state][first];
    }

    let mut backpointers: Vec<[u8; NUM_KEYS]> = Vec::with_capacity(rest.len());
    for &symbol in rest {
        let mut next = [0.0; NUM_KEYS];
        let mut pointers = [0u8; NUM_KEYS];
        for state in 0..NUM_KEYS {
            let mut best_prev = 0;
            let mut best = scores[0] + log_transition[0][state];
            for prev in 1..NUM_KEYS {
                let candidate = scores[prev] + log_transition[prev][state];
                if candidate > best {
                    best = candidate;
                    best_prev = prev;
                }
            }
            next[state] = best + log_emission[state][symbol];
            pointers[state] = best_prev as u8;
        }
        scores = next;
        backpointers.push(pointers);
    }

    let mut last = 0;
    for state in 1..NUM_KEYS {
        if scores[state] > scores[last] {
            last = state;
        }
    }
    let log_probability = scores[last];

    let mut states = Vec::with_capacity(observations.len());
    states.push(last);
    for pointers in backpointers.iter().rev() {
        last = pointers[last] as usize;
        states.push(last);
    }
    states.reverse();

    Some(ViterbiPath {
        states,
        log_probability,
    })
}
