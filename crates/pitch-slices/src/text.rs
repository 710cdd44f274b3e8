//! Plain-text pitch-class input.
//!
//! One slice per line. Tokens are integers 0-11 or note names (`C`, `F#`,
//! `Bb`, `ebb`) separated by commas or whitespace. A `#` that starts a token
//! begins a comment; blank lines are skipped.

use crate::slice::{Observation, PitchClassSlice};
use crate::{Error, Result};

const NATURALS: [(char, i32); 7] = [
    ('c', 0),
    ('d', 2),
    ('e', 4),
    ('f', 5),
    ('g', 7),
    ('a', 9),
    ('b', 11),
];

/// Parse one token as a pitch class.
pub fn parse_pitch_class(token: &str) -> Option<u8> {
    if let Ok(n) = token.parse::<i64>() {
        return (0..12).contains(&n).then_some(n as u8);
    }

    let mut chars = token.chars();
    let letter = chars.next()?.to_ascii_lowercase();
    let &(_, base) = NATURALS.iter().find(|(c, _)| *c == letter)?;

    let mut offset = 0i32;
    for c in chars {
        match c {
            '#' => offset += 1,
            'b' => offset -= 1,
            _ => return None,
        }
    }
    Some((base + offset).rem_euclid(12) as u8)
}

/// Parse a whole text document into an observation.
pub fn observation_from_text(contents: &str) -> Result<Observation> {
    let mut slices = Vec::new();

    for (line_index, raw) in contents.lines().enumerate() {
        let line = strip_comment(raw);
        let tokens: Vec<&str> = line
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|t| !t.is_empty())
            .collect();
        if tokens.is_empty() {
            continue;
        }

        let mut pcs = Vec::with_capacity(tokens.len());
        for token in tokens {
            let pc = parse_pitch_class(token).ok_or_else(|| Error::InvalidPitchClass {
                line: line_index + 1,
                token: token.to_string(),
            })?;
            pcs.push(pc as i64);
        }
        slices.push(PitchClassSlice::new(pcs)?);
    }

    Ok(Observation::new(slices))
}

fn strip_comment(line: &str) -> &str {
    let mut previous: Option<char> = None;
    for (i, c) in line.char_indices() {
        let token_start = previous.map_or(true, |p| p == ',' || p.is_whitespace());
        if c == '#' && token_start {
            return &line[..i];
        }
        previous = Some(c);
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn note_names_and_numbers() {
        assert_eq!(parse_pitch_class("0"), Some(0));
        assert_eq!(parse_pitch_class("11"), Some(11));
        assert_eq!(parse_pitch_class("12"), None);
        assert_eq!(parse_pitch_class("C#"), Some(1));
        assert_eq!(parse_pitch_class("Db"), Some(1));
        assert_eq!(parse_pitch_class("bb"), Some(10));
        assert_eq!(parse_pitch_class("Cb"), Some(11));
        assert_eq!(parse_pitch_class("B#"), Some(0));
        assert_eq!(parse_pitch_class("H"), None);
        assert_eq!(parse_pitch_class("C-"), None);
    }

    #[test]
    fn lines_become_slices() {
        let text = "# progression in C\n0 4 7\n\nF, A, C  # subdominant\n7,11,2\n";
        let obs = observation_from_text(text).unwrap();

        assert_eq!(obs.slice_count(), 3);
        assert_eq!(obs.slices()[0].pitch_classes(), &[0, 4, 7]);
        assert_eq!(obs.slices()[1].pitch_classes(), &[0, 5, 9]);
        assert_eq!(obs.slices()[2].pitch_classes(), &[2, 7, 11]);
    }

    #[test]
    fn sharp_is_not_a_comment_inside_a_token() {
        let obs = observation_from_text("F# A# C#").unwrap();
        assert_eq!(obs.slices()[0].pitch_classes(), &[1, 6, 10]);
    }

    #[test]
    fn bad_token_reports_line() {
        let err = observation_from_text("0 4 7\n2 x 9\n").unwrap_err();
        match err {
            Error::InvalidPitchClass { line, token } => {
                assert_eq!(line, 2);
                assert_eq!(token, "x");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
