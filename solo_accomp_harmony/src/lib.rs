// Solo Accompaniment Harmonizer
//
// Adds a chordal accompaniment to monophonic melodies and turns harmonized
// pieces into a chord-feature training table. Each measure of a melody is
// matched against the diatonic triads of its home key and three closely
// related keys (dominant, subdominant, relative); the best triad becomes
// the accompaniment for that measure, written with the melody as MIDI and
// MusicXML. Reading the harmonized files back, every chord is encoded as a
// fixed-schema feature row and the rows of all pieces are concatenated into
// one CSV.
//
// Architecture:
// - pitch.rs: Spelled pitch names, octaves, MIDI numbers, line-of-fifths spelling
// - key.rs: Major/minor keys, scales, key signatures, related keys
// - triads.rs: The seven diatonic triads of a key with Roman-numeral labels
// - modulation.rs: Ordered candidate keys (home, fifth up, fifth down, relative)
// - matcher.rs: Symmetric-difference chord matching over all candidates
// - key_detect.rs: Krumhansl-Schmuckler home-key estimation
// - melody.rs: Melody / measure / note / rest model consumed by the harmonizer
// - harmonizer.rs: Measure-by-measure harmonization and home-key resolution
// - score.rs: Combined score assembly, output paths, artifact writing
// - midi.rs: MIDI writing (combined score) and reading (melodies, harmonized pieces)
// - musicxml.rs: MusicXML notation output
// - source.rs: Melody loading from JSON documents or MIDI files
// - features.rs: Chord event -> feature row encoding and chord naming
// - corpus.rs: Corpus walk, per-piece failure isolation, training table CSV
// - pipeline.rs: Single-file and directory harmonization batches
// - config.rs: JSON-loadable configuration for all stages
// - error.rs: Per-piece failure taxonomy
//
// Everything is deterministic: the same inputs always give the same
// accompaniment and the same table.

pub mod config;
pub mod corpus;
pub mod error;
pub mod features;
pub mod harmonizer;
pub mod key;
pub mod key_detect;
pub mod matcher;
pub mod melody;
pub mod midi;
pub mod modulation;
pub mod musicxml;
pub mod pipeline;
pub mod pitch;
pub mod score;
pub mod source;
pub mod triads;
