use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{Error, NUM_KEYS};

const MAJOR_NAMES: [&str; 12] = ["C", "Db", "D", "Eb", "E", "F", "F#", "G", "Ab", "A", "Bb", "B"];
const MINOR_NAMES: [&str; 12] = ["c", "c#", "d", "eb", "e", "f", "f#", "g", "ab", "a", "bb", "b"];

const NATURALS: [(char, u8); 7] = [
    ('c', 0),
    ('d', 2),
    ('e', 4),
    ('f', 5),
    ('g', 7),
    ('a', 9),
    ('b', 11),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyMode {
    Major,
    Minor,
}

impl fmt::Display for KeyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyMode::Major => write!(f, "major"),
            KeyMode::Minor => write!(f, "minor"),
        }
    }
}

/// One of the 24 hidden states: indices 0-11 are major keys on C..B,
/// 12-23 the minor keys in the same chromatic order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Key(u8);

impl Key {
    pub fn from_index(index: usize) -> Option<Self> {
        (index < NUM_KEYS).then_some(Key(index as u8))
    }

    pub fn new(tonic: u8, mode: KeyMode) -> Self {
        let tonic = tonic % 12;
        match mode {
            KeyMode::Major => Key(tonic),
            KeyMode::Minor => Key(tonic + 12),
        }
    }

    /// Iterate over all 24 keys in state order.
    pub fn all() -> impl Iterator<Item = Key> {
        (0..NUM_KEYS as u8).map(Key)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// Pitch class of the tonic, 0 = C.
    pub fn tonic(self) -> u8 {
        self.0 % 12
    }

    pub fn mode(self) -> KeyMode {
        if self.0 < 12 {
            KeyMode::Major
        } else {
            KeyMode::Minor
        }
    }

    /// Short name: upper case for major (`Eb`), lower case for minor (`c#`).
    pub fn name(self) -> &'static str {
        match self.mode() {
            KeyMode::Major => MAJOR_NAMES[self.tonic() as usize],
            KeyMode::Minor => MINOR_NAMES[self.tonic() as usize],
        }
    }

    /// `"Eb major"`, `"c# minor"`.
    pub fn long_name(self) -> String {
        format!("{} {}", MAJOR_NAMES[self.tonic() as usize], self.mode())
    }

    /// C major <-> A minor.
    pub fn relative(self) -> Key {
        match self.mode() {
            KeyMode::Major => Key::new(self.tonic() + 9, KeyMode::Minor),
            KeyMode::Minor => Key::new(self.tonic() + 3, KeyMode::Major),
        }
    }

    /// C major <-> C minor.
    pub fn parallel(self) -> Key {
        match self.mode() {
            KeyMode::Major => Key::new(self.tonic(), KeyMode::Minor),
            KeyMode::Minor => Key::new(self.tonic(), KeyMode::Major),
        }
    }

    pub fn dominant(self) -> Key {
        Key::new(self.tonic() + 7, self.mode())
    }

    pub fn subdominant(self) -> Key {
        Key::new(self.tonic() + 5, self.mode())
    }

    /// MIREX weighted correctness of `self` as a guess for `truth`.
    ///
    /// 1.0 exact, 0.5 a fifth above in the same mode, 0.3 relative,
    /// 0.2 parallel, otherwise 0.
    pub fn mirex_score(self, truth: Key) -> f64 {
        if self == truth {
            1.0
        } else if self == truth.dominant() {
            0.5
        } else if self == truth.relative() {
            0.3
        } else if self == truth.parallel() {
            0.2
        } else {
            0.0
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Key {
    type Err = Error;

    /// Accepts any enharmonic spelling in short form (`Db`, `C#`, `a#`,
    /// `Fb`) or long form (`D major`, `bb minor`, `F#:minor`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unknown = || Error::UnknownKey(s.to_string());
        let trimmed = s.trim();

        let (tonic_text, explicit_mode) = match trimmed.split_once([' ', ':']) {
            Some((tonic, mode)) => {
                let mode = match mode.trim().to_ascii_lowercase().as_str() {
                    "major" | "maj" => KeyMode::Major,
                    "minor" | "min" => KeyMode::Minor,
                    _ => return Err(unknown()),
                };
                (tonic, Some(mode))
            }
            None => (trimmed, None),
        };

        let mut chars = tonic_text.chars();
        let letter = chars.next().ok_or_else(unknown)?;
        let &(_, natural) = NATURALS
            .iter()
            .find(|(c, _)| *c == letter.to_ascii_lowercase())
            .ok_or_else(unknown)?;

        let mut offset: i32 = 0;
        for c in chars {
            match c {
                '#' => offset += 1,
                'b' => offset -= 1,
                _ => return Err(unknown()),
            }
        }
        if offset.abs() > 1 {
            return Err(unknown());
        }

        let mode = explicit_mode.unwrap_or(if letter.is_ascii_uppercase() {
            KeyMode::Major
        } else {
            KeyMode::Minor
        });
        let tonic = (natural as i32 + offset).rem_euclid(12) as u8;
        Ok(Key::new(tonic, mode))
    }
}

impl TryFrom<String> for Key {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Key> for String {
    fn from(key: Key) -> Self {
        key.name().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn key(name: &str) -> Key {
        name.parse().unwrap()
    }

    #[test]
    fn state_order_is_fixed() {
        let names: Vec<&str> = Key::all().map(Key::name).collect();
        assert_eq!(
            names,
            vec![
                "C", "Db", "D", "Eb", "E", "F", "F#", "G", "Ab", "A", "Bb", "B", "c", "c#", "d",
                "eb", "e", "f", "f#", "g", "ab", "a", "bb", "b"
            ]
        );
    }

    #[test]
    fn enharmonic_spellings_parse() {
        assert_eq!(key("C#"), key("Db"));
        assert_eq!(key("B#"), key("C"));
        assert_eq!(key("Fb"), key("E"));
        assert_eq!(key("E#"), key("F"));
        assert_eq!(key("Cb"), key("B"));
        assert_eq!(key("a#").index(), 22);
        assert_eq!(key("db").index(), 13);
        assert_eq!(key("Gb").name(), "F#");
    }

    #[test]
    fn long_forms_parse() {
        assert_eq!(key("Eb major"), key("Eb"));
        assert_eq!(key("F#:minor"), key("f#"));
        assert_eq!(key("A min"), key("a"));
        assert!("H".parse::<Key>().is_err());
        assert!("C lydian".parse::<Key>().is_err());
        assert!("Cbb".parse::<Key>().is_err());
        assert!("".parse::<Key>().is_err());
    }

    #[test]
    fn relations() {
        assert_eq!(key("C").relative(), key("a"));
        assert_eq!(key("a").relative(), key("C"));
        assert_eq!(key("eb").relative(), key("Gb"));
        assert_eq!(key("E").parallel(), key("e"));
        assert_eq!(key("G").dominant(), key("D"));
        assert_eq!(key("f").subdominant(), key("bb"));
    }

    #[test]
    fn mirex_weights() {
        let truth = key("C");
        assert_eq!(key("C").mirex_score(truth), 1.0);
        assert_eq!(key("G").mirex_score(truth), 0.5);
        assert_eq!(key("F").mirex_score(truth), 0.0);
        assert_eq!(key("a").mirex_score(truth), 0.3);
        assert_eq!(key("c").mirex_score(truth), 0.2);
        assert_eq!(key("e").mirex_score(key("a")), 0.5);
        assert_eq!(key("C").mirex_score(key("a")), 0.3);
    }

    #[test]
    fn string_conversion_uses_names() {
        assert_eq!(String::from(key("f#")), "f#");
        assert_eq!(Key::try_from("Bb".to_string()).unwrap().index(), 10);
        assert_eq!(key("ab").long_name(), "Ab minor");
    }
}
