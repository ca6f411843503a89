// Chord matching: which diatonic triad best explains a group of notes.
//
// Distance between a triad and a note group is the size of the symmetric
// difference of their pitch-class name sets (octaves ignored, each name
// counted once). Only attacked notes count: rests and tie continuations are
// left out. 0 means the notes spell exactly the triad.
//
// The search covers 4 candidate keys x 7 triads = 28 comparisons, in fixed
// order (modulation.rs, then scale degree). The running best is replaced only
// on a strictly smaller distance, so ties go to the earlier key, then to the
// lower degree. With no pitched notes every triad is at distance 3 and the
// result is the home key's first degree.

use crate::key::Key;
use crate::melody::MelodicElement;
use crate::modulation::{KeyRelation, candidates};
use crate::pitch::PitchName;
use crate::triads::{Triad, build_triads};
use serde::Serialize;
use std::collections::BTreeSet;

/// The winning triad for one note group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HarmonyResult {
    pub triad: Triad,
    pub key: Key,
    pub relation: KeyRelation,
    /// 0-based scale degree within `key`.
    pub degree: usize,
    pub label: &'static str,
    pub distance: usize,
}

/// Pitch-class names of the attacked notes in a group.
pub fn sounding_names(group: &[MelodicElement]) -> BTreeSet<PitchName> {
    group.iter().filter_map(|e| e.attacked_pitch()).map(|p| p.name).collect()
}

/// Symmetric-difference distance between a triad and a note group.
pub fn distance(triad: &Triad, group: &[MelodicElement]) -> usize {
    names_distance(triad, &sounding_names(group))
}

fn names_distance(triad: &Triad, names: &BTreeSet<PitchName>) -> usize {
    triad.name_set().symmetric_difference(names).count()
}

/// Best triad over the home key and its closely related keys.
pub fn best_match(group: &[MelodicElement], home: &Key) -> HarmonyResult {
    let names = sounding_names(group);
    let tonic = build_triads(home)[0];
    let mut best = HarmonyResult {
        triad: tonic.triad,
        key: *home,
        relation: KeyRelation::Home,
        degree: tonic.degree,
        label: tonic.label,
        distance: names_distance(&tonic.triad, &names),
    };

    for candidate in candidates(home) {
        for diatonic in build_triads(&candidate.key) {
            let d = names_distance(&diatonic.triad, &names);
            if d < best.distance {
                best = HarmonyResult {
                    triad: diatonic.triad,
                    key: candidate.key,
                    relation: candidate.relation,
                    degree: diatonic.degree,
                    label: diatonic.label,
                    distance: d,
                };
            }
        }
    }
    best
}
