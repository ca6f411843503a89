// Diatonic triads of a key.
//
// Each scale degree i gets the stacked-thirds triad scale[i], scale[i+2],
// scale[i+4] (indices mod 7), labelled with its Roman numeral. Major keys use
// I ii iii IV V vi vii°, minor keys (natural minor) use i ii° III iv v VI VII.
//
// A triad is three pitch-class names. For output it can be voiced in close
// root position above a chosen octave (`Triad::voiced`).

use crate::key::{Key, Mode};
use crate::pitch::{Pitch, PitchName};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;

pub const MAJOR_DEGREE_LABELS: [&str; 7] = ["I", "ii", "iii", "IV", "V", "vi", "vii°"];
pub const MINOR_DEGREE_LABELS: [&str; 7] = ["i", "ii°", "III", "iv", "v", "VI", "VII"];

pub fn degree_labels(mode: Mode) -> &'static [&'static str; 7] {
    match mode {
        Mode::Major => &MAJOR_DEGREE_LABELS,
        Mode::Minor => &MINOR_DEGREE_LABELS,
    }
}

/// Root, third and fifth as pitch-class names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Triad {
    pub root: PitchName,
    pub third: PitchName,
    pub fifth: PitchName,
}

impl Triad {
    pub fn pitch_names(&self) -> [PitchName; 3] {
        [self.root, self.third, self.fifth]
    }

    pub fn name_set(&self) -> BTreeSet<PitchName> {
        self.pitch_names().into_iter().collect()
    }

    /// Close root-position voicing with the root in `octave`.
    pub fn voiced(&self, octave: i8) -> [Pitch; 3] {
        let root = Pitch::new(self.root, octave);
        let third = Pitch::lowest_above(self.third, root.midi());
        let fifth = Pitch::lowest_above(self.fifth, third.midi());
        [root, third, fifth]
    }
}

impl fmt::Display for Triad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.root, self.third, self.fifth)
    }
}

/// A triad together with its position in the key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DiatonicTriad {
    /// 0-based scale degree.
    pub degree: usize,
    pub label: &'static str,
    pub triad: Triad,
}

/// The seven diatonic triads of `key`, in scale-degree order.
pub fn build_triads(key: &Key) -> [DiatonicTriad; 7] {
    let scale = key.scale();
    let labels = degree_labels(key.mode);
    std::array::from_fn(|i| DiatonicTriad {
        degree: i,
        label: labels[i],
        triad: Triad {
            root: scale[i],
            third: scale[(i + 2) % 7],
            fifth: scale[(i + 4) % 7],
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pitch::Step;

    fn key(s: &str) -> Key {
        s.parse().unwrap()
    }

    fn spelled(t: &Triad) -> String {
        t.to_string()
    }

    #[test]
    fn test_c_major_triads() {
        let triads = build_triads(&key("C major"));
        let shown: Vec<(String, &str)> =
            triads.iter().map(|t| (spelled(&t.triad), t.label)).collect();
        assert_eq!(
            shown,
            vec![
                ("C E G".to_string(), "I"),
                ("D F A".to_string(), "ii"),
                ("E G B".to_string(), "iii"),
                ("F A C".to_string(), "IV"),
                ("G B D".to_string(), "V"),
                ("A C E".to_string(), "vi"),
                ("B D F".to_string(), "vii°"),
            ]
        );
    }

    #[test]
    fn test_minor_labels_and_spelling() {
        let triads = build_triads(&key("C minor"));
        let labels: Vec<&str> = triads.iter().map(|t| t.label).collect();
        assert_eq!(labels, MINOR_DEGREE_LABELS.to_vec());
        assert_eq!(spelled(&triads[0].triad), "C Eb G");
        assert_eq!(spelled(&triads[1].triad), "D F Ab");
        assert_eq!(spelled(&triads[6].triad), "Bb D F");
    }

    #[test]
    fn test_every_key_has_seven_three_note_triads() {
        for fifths in -7..=7 {
            for mode in [Mode::Major, Mode::Minor] {
                let k = Key::new(PitchName::from_fifths(fifths), mode);
                let triads = build_triads(&k);
                assert_eq!(triads.len(), 7);
                for (i, t) in triads.iter().enumerate() {
                    assert_eq!(t.degree, i);
                    assert_eq!(t.triad.name_set().len(), 3, "{} degree {}", k, i);
                    assert_eq!(t.label, degree_labels(mode)[i]);
                    assert_eq!(t.triad.root, k.scale()[i]);
                }
            }
        }
    }

    #[test]
    fn test_voiced_close_position() {
        let g_major = build_triads(&key("C major"))[4].triad;
        let voiced: Vec<String> = g_major.voiced(3).iter().map(|p| p.to_string()).collect();
        assert_eq!(voiced, vec!["G3", "B3", "D4"]);

        let b_flat = Triad {
            root: PitchName::new(Step::B, -1),
            third: PitchName::natural(Step::D),
            fifth: PitchName::natural(Step::F),
        };
        let midi: Vec<i32> = b_flat.voiced(2).iter().map(|p| p.midi()).collect();
        assert_eq!(midi, vec![46, 50, 53]);
    }
}
