// Home-key estimation for melodies that do not declare one.
//
// Krumhansl-Schmuckler: build a duration-weighted pitch-class histogram of
// the line, correlate it (Pearson) with the Krumhansl-Kessler major and minor
// profiles rotated to each of the 12 tonics, and take the best of the 24
// keys. Exact ties keep the first key in the order C..B major, then C..B
// minor.
//
// Detection gives up (returns None) when nothing is pitched or the histogram
// is flat, since every key then correlates equally.

use crate::key::{Key, Mode};
use crate::melody::MeasureGroup;
use crate::pitch::{PitchName, Step};

/// Krumhansl-Kessler probe-tone ratings, tonic first.
const KK_MAJOR: [f64; 12] = [6.35, 2.23, 3.48, 2.33, 4.38, 4.09, 2.52, 5.19, 2.39, 3.66, 2.29, 2.88];
const KK_MINOR: [f64; 12] = [6.33, 2.68, 3.52, 5.38, 2.60, 3.53, 2.54, 4.75, 3.98, 2.69, 3.34, 3.17];

/// Tonic spellings for detected major keys, indexed by pitch class.
const MAJOR_TONICS: [PitchName; 12] = [
    PitchName::natural(Step::C),
    PitchName::new(Step::D, -1),
    PitchName::natural(Step::D),
    PitchName::new(Step::E, -1),
    PitchName::natural(Step::E),
    PitchName::natural(Step::F),
    PitchName::new(Step::F, 1),
    PitchName::natural(Step::G),
    PitchName::new(Step::A, -1),
    PitchName::natural(Step::A),
    PitchName::new(Step::B, -1),
    PitchName::natural(Step::B),
];

/// Tonic spellings for detected minor keys, indexed by pitch class.
const MINOR_TONICS: [PitchName; 12] = [
    PitchName::natural(Step::C),
    PitchName::new(Step::C, 1),
    PitchName::natural(Step::D),
    PitchName::new(Step::E, -1),
    PitchName::natural(Step::E),
    PitchName::natural(Step::F),
    PitchName::new(Step::F, 1),
    PitchName::natural(Step::G),
    PitchName::new(Step::G, 1),
    PitchName::natural(Step::A),
    PitchName::new(Step::B, -1),
    PitchName::natural(Step::B),
];

/// Total sounding duration per pitch class, tied continuations included.
pub fn pitch_class_histogram(measures: &[MeasureGroup]) -> [f64; 12] {
    let mut histogram = [0.0; 12];
    for measure in measures {
        for element in &measure.elements {
            if let Some(pitch) = element.sounding_pitch() {
                histogram[pitch.pitch_class() as usize] += element.duration();
            }
        }
    }
    histogram
}

/// Best-correlating key for a pitch-class histogram.
pub fn detect_key_from_histogram(histogram: &[f64; 12]) -> Option<Key> {
    let total: f64 = histogram.iter().sum();
    if total <= 0.0 || !total.is_finite() {
        return None;
    }

    let mut best: Option<(f64, Key)> = None;
    for (mode, profile, tonics) in [
        (Mode::Major, &KK_MAJOR, &MAJOR_TONICS),
        (Mode::Minor, &KK_MINOR, &MINOR_TONICS),
    ] {
        for tonic_pc in 0..12 {
            let rotated: [f64; 12] = std::array::from_fn(|pc| profile[(pc + 12 - tonic_pc) % 12]);
            let r = pearson(histogram, &rotated)?;
            if best.is_none_or(|(best_r, _)| r > best_r) {
                best = Some((r, Key::new(tonics[tonic_pc], mode)));
            }
        }
    }
    best.map(|(_, key)| key)
}

pub fn detect_key(measures: &[MeasureGroup]) -> Option<Key> {
    detect_key_from_histogram(&pitch_class_histogram(measures))
}

/// Pearson correlation; None when either side has zero variance.
fn pearson(a: &[f64; 12], b: &[f64; 12]) -> Option<f64> {
    let mean_a = a.iter().sum::<f64>() / 12.0;
    let mean_b = b.iter().sum::<f64>() / 12.0;
    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for (x, y) in a.iter().zip(b) {
        let da = x - mean_a;
        let db = y - mean_b;
        cov += da * db;
        var_a += da * da;
        var_b += db * db;
    }
    if var_a <= f64::EPSILON || var_b <= f64::EPSILON {
        return None;
    }
    Some(cov / (var_a.sqrt() * var_b.sqrt()))
}
