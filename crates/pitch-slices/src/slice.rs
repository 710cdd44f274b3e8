use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Pitch classes sounding together at one time position.
///
/// Stored sorted and deduplicated; every element is in `0..=11`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PitchClassSlice(Vec<u8>);

impl PitchClassSlice {
    /// Build a slice, collapsing duplicates.
    pub fn new<I>(pitch_classes: I) -> Result<Self>
    where
        I: IntoIterator<Item = i64>,
    {
        let mut pcs = Vec::new();
        for pc in pitch_classes {
            if !(0..12).contains(&pc) {
                return Err(Error::PitchClassOutOfRange(pc));
            }
            pcs.push(pc as u8);
        }
        pcs.sort_unstable();
        pcs.dedup();
        Ok(Self(pcs))
    }

    /// Slice holding the pitch classes of MIDI note numbers.
    pub fn from_midi_keys<I>(keys: I) -> Self
    where
        I: IntoIterator<Item = u8>,
    {
        let mut pcs: Vec<u8> = keys.into_iter().map(|k| k % 12).collect();
        pcs.sort_unstable();
        pcs.dedup();
        Self(pcs)
    }

    pub fn pitch_classes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, pc: u8) -> bool {
        self.0.binary_search(&pc).is_ok()
    }
}

/// An ordered sequence of slices with its flattened observation stream.
///
/// Decoding runs over the flat stream: one pitch class per position, each
/// tagged with the index of the slice it came from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    slices: Vec<PitchClassSlice>,
    flat: Vec<u8>,
    slice_indices: Vec<usize>,
}

impl Observation {
    pub fn new(slices: Vec<PitchClassSlice>) -> Self {
        let mut flat = Vec::new();
        let mut slice_indices = Vec::new();
        for (index, slice) in slices.iter().enumerate() {
            for &pc in slice.pitch_classes() {
                flat.push(pc);
                slice_indices.push(index);
            }
        }
        Self {
            slices,
            flat,
            slice_indices,
        }
    }

    /// One single-note slice per comma-separated pitch class, e.g. `"0,4,7"`.
    pub fn from_sequence(sequence: &str) -> Result<Self> {
        let mut slices = Vec::new();
        for token in sequence.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            let pc = crate::text::parse_pitch_class(token).ok_or_else(|| {
                Error::InvalidPitchClass {
                    line: 1,
                    token: token.to_string(),
                }
            })?;
            slices.push(PitchClassSlice::new([pc as i64])?);
        }
        Ok(Self::new(slices))
    }

    pub fn slices(&self) -> &[PitchClassSlice] {
        &self.slices
    }

    pub fn slice_count(&self) -> usize {
        self.slices.len()
    }

    /// Flat pitch-class observations in time order.
    pub fn pitch_classes(&self) -> &[u8] {
        &self.flat
    }

    /// Originating slice of each flat observation.
    pub fn slice_indices(&self) -> &[usize] {
        &self.slice_indices
    }

    /// `(pitch_class, slice_index)` pairs in time order.
    pub fn iter(&self) -> impl Iterator<Item = (u8, usize)> + '_ {
        self.flat.iter().copied().zip(self.slice_indices.iter().copied())
    }

    /// Number of flat observations.
    pub fn len(&self) -> usize {
        self.flat.len()
    }

    /// True when there is nothing to decode, even if empty slices exist.
    pub fn is_empty(&self) -> bool {
        self.flat.is_empty()
    }

    /// Per-slice majority vote over labels aligned with the flat stream.
    ///
    /// Empty slices yield `None`. Ties go to the label seen first.
    pub fn majority_by_slice<T: Copy + Eq>(&self, labels: &[T]) -> Vec<Option<T>> {
        majority_by_slice(
            self.slices.len(),
            labels.iter().copied().zip(self.slice_indices.iter().copied()),
        )
    }
}

/// Majority vote over `(label, slice_index)` pairs for `slice_count` slices.
pub fn majority_by_slice<T, I>(slice_count: usize, labelled: I) -> Vec<Option<T>>
where
    T: Copy + Eq,
    I: IntoIterator<Item = (T, usize)>,
{
    let mut tallies: Vec<Vec<(T, usize)>> = vec![Vec::new(); slice_count];
    for (label, index) in labelled {
        let Some(tally) = tallies.get_mut(index) else {
            continue;
        };
        match tally.iter_mut().find(|(l, _)| *l == label) {
            Some((_, count)) => *count += 1,
            None => tally.push((label, 1)),
        }
    }

    tallies
        .into_iter()
        .map(|tally| {
            let mut best: Option<(T, usize)> = None;
            for (label, count) in tally {
                if best.map_or(true, |(_, c)| count > c) {
                    best = Some((label, count));
                }
            }
            best.map(|(label, _)| label)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn slice(pcs: &[i64]) -> PitchClassSlice {
        PitchClassSlice::new(pcs.iter().copied()).unwrap()
    }

    #[test]
    fn duplicates_collapse() {
        let s = slice(&[7, 0, 4, 0, 7]);
        assert_eq!(s.pitch_classes(), &[0, 4, 7]);
        assert!(s.contains(4));
        assert!(!s.contains(5));
    }

    #[test]
    fn out_of_range_rejected() {
        assert!(matches!(
            PitchClassSlice::new([3, 12]),
            Err(Error::PitchClassOutOfRange(12))
        ));
        assert!(PitchClassSlice::new([-1]).is_err());
    }

    #[test]
    fn flat_stream_tracks_slice_indices() {
        let obs = Observation::new(vec![slice(&[0, 4, 7]), slice(&[]), slice(&[2, 7])]);

        assert_eq!(obs.pitch_classes(), &[0, 4, 7, 2, 7]);
        assert_eq!(obs.slice_indices(), &[0, 0, 0, 2, 2]);
        assert_eq!(obs.len(), 5);
        assert_eq!(obs.slice_count(), 3);
        assert_eq!(obs.iter().nth(3), Some((2, 2)));
    }

    #[test]
    fn majority_vote_prefers_first_on_tie() {
        let obs = Observation::new(vec![slice(&[0, 4, 7]), slice(&[]), slice(&[2, 7])]);
        let labels = ['a', 'b', 'b', 'x', 'y'];

        assert_eq!(obs.majority_by_slice(&labels), vec![Some('b'), None, Some('x')]);
    }

    #[test]
    fn sequence_builds_single_note_slices() {
        let obs = Observation::from_sequence("0, 4,7,E").unwrap();
        assert_eq!(obs.slice_count(), 4);
        assert_eq!(obs.pitch_classes(), &[0, 4, 7, 4]);
        assert!(Observation::from_sequence("0,13").is_err());
    }

    #[test]
    fn empty_observation() {
        let obs = Observation::new(vec![slice(&[])]);
        assert!(obs.is_empty());
        assert_eq!(obs.slice_count(), 1);
    }
}
