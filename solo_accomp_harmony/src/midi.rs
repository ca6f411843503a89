// MIDI input and output.
//
// Writing: a CombinedScore becomes a Standard MIDI File (SMF Format 1, 480
// ticks per quarter) with three tracks:
// - track 0: title, tempo, time signature and key signature
// - track 1 "Melody": the melodic line on channel 0, tied notes merged
// - track 2 "Accompaniment": one close-position triad per harmonized
//   measure on channel 1, with the degree label as a text event, and a
//   "measure N" marker at the start of every melody measure
// Events are collected with absolute ticks, sorted (note-offs before
// note-ons at the same tick) and only then converted to deltas.
//
// Reading goes the other way, in two flavors:
// - `read_melody`: the first note-bearing track as a monophonic Melody,
//   cut into measures by the file's time signature. Notes crossing a
//   barline are split with tie continuations, gaps become rests, and
//   overlapping notes are truncated at the next onset.
// - `read_harmonized`: the accompaniment track of a harmonized file as
//   chords grouped by onset tick, for feature extraction (corpus.rs).
//   Measure numbers and beats come from the measure markers, so pickups and
//   irregular bars survive; files without markers fall back to fixed bars
//   of the time signature.
// In both cases the key comes from the key-signature event when present,
// otherwise from key detection, and MIDI pitches are spelled in that key.
//
// Uses the `midly` crate for both directions.

use crate::corpus::HarmonizedPiece;
use crate::features::SoundingChord;
use crate::harmonizer::AccompanimentEvent;
use crate::key::{Key, Mode};
use crate::key_detect::{detect_key, detect_key_from_histogram};
use crate::melody::{MeasureGroup, MelodicElement, Melody, TimeSignature};
use crate::pitch::{Pitch, PitchName, Step};
use crate::score::CombinedScore;
use midly::{
    Arena, Format, Header, MetaMessage, MidiMessage, Smf, Timing, Track, TrackEvent, TrackEventKind,
    num::{u4, u7, u15, u24, u28},
};
use std::collections::{BTreeMap, HashMap, VecDeque};
use thiserror::Error;

/// Ticks per quarter note in MIDI output.
pub const TICKS_PER_QUARTER: u16 = 480;

const MELODY_TRACK_NAME: &str = "Melody";
const ACCOMPANIMENT_TRACK_NAME: &str = "Accompaniment";
const MEASURE_MARKER_PREFIX: &str = "measure ";
const MELODY_CHANNEL: u8 = 0;
const ACCOMPANIMENT_CHANNEL: u8 = 1;
const MELODY_VELOCITY: u8 = 80;
const CHORD_VELOCITY: u8 = 64;

#[derive(Debug, Error)]
pub enum MidiReadError {
    #[error("invalid MIDI data: {0}")]
    Smf(#[from] midly::Error),
    #[error("SMPTE timecode timing is not supported")]
    Timecode,
    #[error("no track contains notes")]
    NoNotes,
    #[error("track length exceeds the tick range")]
    TickOverflow,
}

// ---------------------------------------------------------------------------
// Writing
// ---------------------------------------------------------------------------

fn to_ticks(quarters: f64) -> u32 {
    (quarters * TICKS_PER_QUARTER as f64).round().max(0.0) as u32
}

fn midi_key(pitch: Pitch) -> u7 {
    u7::new(pitch.midi().clamp(0, 127) as u8)
}

/// Sort position of simultaneous events: setup, then note-offs, then note-ons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Slot {
    Setup,
    Off,
    On,
}

/// Events with absolute ticks, turned into a delta-timed track on demand.
struct TrackBuilder<'a> {
    events: Vec<(u32, Slot, TrackEventKind<'a>)>,
}

impl<'a> TrackBuilder<'a> {
    fn new() -> Self {
        TrackBuilder { events: Vec::new() }
    }

    fn push(&mut self, tick: u32, slot: Slot, kind: TrackEventKind<'a>) {
        self.events.push((tick, slot, kind));
    }

    fn meta(&mut self, tick: u32, message: MetaMessage<'a>) {
        self.push(tick, Slot::Setup, TrackEventKind::Meta(message));
    }

    fn note(&mut self, channel: u8, key: u7, velocity: u8, start: u32, end: u32) {
        let channel = u4::new(channel);
        self.push(
            start,
            Slot::On,
            TrackEventKind::Midi { channel, message: MidiMessage::NoteOn { key, vel: u7::new(velocity) } },
        );
        self.push(
            end,
            Slot::Off,
            TrackEventKind::Midi { channel, message: MidiMessage::NoteOff { key, vel: u7::new(0) } },
        );
    }

    fn build(mut self) -> Track<'a> {
        // Stable sort keeps insertion order within a slot.
        self.events.sort_by_key(|(tick, slot, _)| (*tick, *slot));
        let mut track: Track<'a> = Vec::with_capacity(self.events.len() + 1);
        let mut last_tick = 0;
        for (tick, _, kind) in self.events {
            track.push(TrackEvent { delta: u28::new(tick - last_tick), kind });
            last_tick = tick;
        }
        track.push(TrackEvent { delta: u28::new(0), kind: TrackEventKind::Meta(MetaMessage::EndOfTrack) });
        track
    }
}

fn conductor_track(score: &CombinedScore) -> Track<'_> {
    let mut track = TrackBuilder::new();
    track.meta(0, MetaMessage::TrackName(score.title.as_bytes()));
    let tempo_microseconds = 60_000_000 / score.tempo_bpm.max(4);
    track.meta(0, MetaMessage::Tempo(u24::new(tempo_microseconds)));
    let ts = score.time_signature;
    track.meta(0, MetaMessage::TimeSignature(ts.numerator, ts.denominator.max(1).ilog2() as u8, 24, 8));
    let sharps = score.key.signature().clamp(-7, 7) as i8;
    track.meta(0, MetaMessage::KeySignature(sharps, score.key.mode == Mode::Minor));
    track.build()
}

fn melody_track(score: &CombinedScore) -> Track<'_> {
    let mut track = TrackBuilder::new();
    track.meta(0, MetaMessage::TrackName(MELODY_TRACK_NAME.as_bytes()));
    track.push(
        0,
        Slot::Setup,
        TrackEventKind::Midi {
            channel: u4::new(MELODY_CHANNEL),
            message: MidiMessage::ProgramChange { program: u7::new(score.melody_program.min(127)) },
        },
    );

    // (key, start tick, end tick) of the note currently sounding.
    let mut sounding: Option<(u7, u32, u32)> = None;
    let offsets = score.measure_offsets();
    for (measure, bar_start) in score.melody.iter().zip(&offsets) {
        for (offset, element) in measure.positioned() {
            let start = to_ticks(bar_start + offset);
            let end = to_ticks(bar_start + offset + element.duration());
            match element {
                MelodicElement::Note(note) => {
                    let key = midi_key(note.pitch);
                    let extends = note.tie_continuation && sounding.is_some_and(|(k, _, _)| k == key);
                    if extends {
                        if let Some((_, _, e)) = sounding.as_mut() {
                            *e = end;
                        }
                    } else {
                        if let Some((k, s, e)) = sounding.take() {
                            track.note(MELODY_CHANNEL, k, MELODY_VELOCITY, s, e);
                        }
                        sounding = Some((key, start, end));
                    }
                }
                MelodicElement::Rest(_) => {
                    if let Some((k, s, e)) = sounding.take() {
                        track.note(MELODY_CHANNEL, k, MELODY_VELOCITY, s, e);
                    }
                }
            }
        }
    }
    if let Some((k, s, e)) = sounding {
        track.note(MELODY_CHANNEL, k, MELODY_VELOCITY, s, e);
    }
    track.build()
}

fn measure_marker(number: u32) -> String {
    format!("{}{}", MEASURE_MARKER_PREFIX, number)
}

fn parse_measure_marker(text: &[u8]) -> Option<u32> {
    std::str::from_utf8(text).ok()?.strip_prefix(MEASURE_MARKER_PREFIX)?.trim().parse().ok()
}

fn accompaniment_track<'a>(score: &'a CombinedScore, arena: &'a Arena) -> Track<'a> {
    let mut track = TrackBuilder::new();
    track.meta(0, MetaMessage::TrackName(ACCOMPANIMENT_TRACK_NAME.as_bytes()));
    track.push(
        0,
        Slot::Setup,
        TrackEventKind::Midi {
            channel: u4::new(ACCOMPANIMENT_CHANNEL),
            message: MidiMessage::ProgramChange { program: u7::new(score.accompaniment_program.min(127)) },
        },
    );

    let offsets = score.measure_offsets();
    for (measure, bar_start) in score.melody.iter().zip(&offsets) {
        let marker = arena.add(measure_marker(measure.number).as_bytes());
        track.meta(to_ticks(*bar_start), MetaMessage::Marker(marker));
    }
    for (event, bar_start) in score.accompaniment.events.iter().zip(&offsets) {
        let AccompanimentEvent::Chord(chord) = event else {
            continue;
        };
        let start = to_ticks(*bar_start);
        let end = to_ticks(bar_start + chord.duration);
        if let Some(text) = &chord.annotation {
            track.meta(start, MetaMessage::Text(text.as_bytes()));
        }
        for pitch in chord.harmony.triad.voiced(score.accompaniment_octave) {
            track.note(ACCOMPANIMENT_CHANNEL, midi_key(pitch), CHORD_VELOCITY, start, end);
        }
    }
    track.build()
}

/// Convert a CombinedScore to an in-memory SMF. Generated marker text is
/// stored in `arena`.
pub fn score_to_smf<'a>(score: &'a CombinedScore, arena: &'a Arena) -> Smf<'a> {
    let mut smf = Smf::new(Header::new(Format::Parallel, Timing::Metrical(u15::new(TICKS_PER_QUARTER))));
    smf.tracks.push(conductor_track(score));
    smf.tracks.push(melody_track(score));
    smf.tracks.push(accompaniment_track(score, arena));
    smf
}

pub fn score_to_bytes(score: &CombinedScore) -> std::io::Result<Vec<u8>> {
    let arena = Arena::new();
    let mut buf = Vec::new();
    score_to_smf(score, &arena).write_std(&mut buf)?;
    Ok(buf)
}

// ---------------------------------------------------------------------------
// Reading
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RawNote {
    start: u32,
    end: u32,
    key: u8,
}

#[derive(Debug, Default)]
struct RawTrack {
    name: Option<String>,
    notes: Vec<RawNote>,
    /// (tick, measure number) of every measure marker, in tick order.
    markers: Vec<(u32, u32)>,
}

/// Everything the readers need from a file, in absolute ticks.
#[derive(Debug)]
struct MidiScan {
    ticks_per_quarter: u32,
    time_signature: Option<TimeSignature>,
    key: Option<Key>,
    tracks: Vec<RawTrack>,
}

impl MidiScan {
    fn note_tracks(&self) -> impl Iterator<Item = &RawTrack> + '_ {
        self.tracks.iter().filter(|t| !t.notes.is_empty())
    }

    fn quarters(&self, ticks: u32) -> f64 {
        ticks as f64 / self.ticks_per_quarter as f64
    }

    fn measure_ticks(&self) -> u32 {
        let ts = self.time_signature.unwrap_or_default();
        ((ts.measure_length() * self.ticks_per_quarter as f64).round() as u32).max(1)
    }
}

fn scan(bytes: &[u8]) -> Result<MidiScan, MidiReadError> {
    let smf = Smf::parse(bytes)?;
    let ticks_per_quarter = match smf.header.timing {
        Timing::Metrical(tpq) => (tpq.as_int() as u32).max(1),
        Timing::Timecode(..) => return Err(MidiReadError::Timecode),
    };

    let mut time_signature = None;
    let mut key = None;
    let mut tracks = Vec::with_capacity(smf.tracks.len());
    for events in &smf.tracks {
        let mut track = RawTrack::default();
        let mut tick: u32 = 0;
        // Open note starts per (channel, key); repeated keys close first-in first-out.
        let mut open: HashMap<(u8, u8), VecDeque<u32>> = HashMap::new();
        for event in events {
            tick = tick.checked_add(event.delta.as_int()).ok_or(MidiReadError::TickOverflow)?;
            match event.kind {
                TrackEventKind::Midi { channel, message } => {
                    let (note_key, on) = match message {
                        MidiMessage::NoteOn { key, vel } => (key.as_int(), vel.as_int() > 0),
                        MidiMessage::NoteOff { key, .. } => (key.as_int(), false),
                        _ => continue,
                    };
                    let slot = open.entry((channel.as_int(), note_key)).or_default();
                    if on {
                        slot.push_back(tick);
                    } else if let Some(start) = slot.pop_front() {
                        track.notes.push(RawNote { start, end: tick, key: note_key });
                    }
                }
                TrackEventKind::Meta(MetaMessage::Marker(text)) => {
                    if let Some(number) = parse_measure_marker(text) {
                        track.markers.push((tick, number));
                    }
                }
                TrackEventKind::Meta(MetaMessage::TrackName(name)) if track.name.is_none() => {
                    track.name = Some(String::from_utf8_lossy(name).into_owned());
                }
                TrackEventKind::Meta(MetaMessage::TimeSignature(numerator, denominator_pow, _, _))
                    if time_signature.is_none() && numerator > 0 =>
                {
                    time_signature = Some(TimeSignature {
                        numerator,
                        denominator: 1u8 << denominator_pow.min(6),
                    });
                }
                TrackEventKind::Meta(MetaMessage::KeySignature(sharps, minor)) if key.is_none() => {
                    let mode = if minor { Mode::Minor } else { Mode::Major };
                    key = Some(Key::from_signature(sharps as i32, mode));
                }
                _ => {}
            }
        }
        // Notes still held at the end of the track stop there.
        for ((_, note_key), starts) in open {
            track.notes.extend(starts.into_iter().map(|start| RawNote { start, end: tick, key: note_key }));
        }
        track.notes.sort_by_key(|n| (n.start, n.key));
        tracks.push(track);
    }

    Ok(MidiScan { ticks_per_quarter, time_signature, key, tracks })
}

/// Highest note per onset, each cut off at the next onset.
fn monophonic_line(notes: &[RawNote]) -> Vec<RawNote> {
    let mut by_onset: BTreeMap<u32, RawNote> = BTreeMap::new();
    for note in notes {
        let entry = by_onset.entry(note.start).or_insert(*note);
        if note.key > entry.key {
            *entry = *note;
        }
    }
    let mut line: Vec<RawNote> = by_onset.into_values().collect();
    for i in 1..line.len() {
        let next_start = line[i].start;
        let previous = &mut line[i - 1];
        previous.end = previous.end.min(next_start);
    }
    line.retain(|n| n.end > n.start);
    line
}

fn build_measures(scan: &MidiScan, line: &[RawNote], spell: impl Fn(u8) -> Pitch) -> Vec<MeasureGroup> {
    let bar = scan.measure_ticks();
    let end = line.iter().map(|n| n.end).max().unwrap_or(0);
    let count = end.div_ceil(bar).max(1);

    (0..count)
        .map(|index| {
            let bar_start = index * bar;
            let bar_end = bar_start + bar;
            let mut elements = Vec::new();
            let mut cursor = bar_start;
            for note in line.iter().filter(|n| n.start < bar_end && n.end > bar_start) {
                let start = note.start.max(bar_start);
                let stop = note.end.min(bar_end);
                if start > cursor {
                    elements.push(MelodicElement::rest(scan.quarters(start - cursor)));
                }
                let pitch = spell(note.key);
                let duration = scan.quarters(stop - start);
                elements.push(if note.start < bar_start {
                    MelodicElement::tied_note(pitch, duration)
                } else {
                    MelodicElement::note(pitch, duration)
                });
                cursor = stop;
            }
            if cursor < bar_end {
                elements.push(MelodicElement::rest(scan.quarters(bar_end - cursor)));
            }
            MeasureGroup::new(index + 1, elements)
        })
        .collect()
}

/// Read a monophonic melody from SMF bytes.
pub fn read_melody(bytes: &[u8], title: &str) -> Result<Melody, MidiReadError> {
    let scan = scan(bytes)?;
    let track = scan.note_tracks().next().ok_or(MidiReadError::NoNotes)?;
    let line = monophonic_line(&track.notes);

    let key = match scan.key {
        Some(key) => Some(key),
        None => {
            // Any spelling works for the histogram; respell once the key is known.
            let provisional = build_measures(&scan, &line, |k| Pitch::spelled_from_midi(k, 2));
            detect_key(&provisional)
        }
    };
    let spelling = key.unwrap_or(Key::major(PitchName::natural(Step::C)));
    let measures = build_measures(&scan, &line, |k| spelling.spell_midi(k));

    Ok(Melody {
        title: title.to_string(),
        key,
        time_signature: scan.time_signature.unwrap_or_default(),
        measures,
    })
}

/// Read the accompaniment chords of a harmonized SMF.
///
/// The accompaniment is the track named "Accompaniment", else the second
/// note-bearing track, else the first.
pub fn read_harmonized(bytes: &[u8], name: &str) -> Result<HarmonizedPiece, MidiReadError> {
    let scan = scan(bytes)?;
    let note_tracks: Vec<&RawTrack> = scan.note_tracks().collect();
    // A named accompaniment track wins even when it holds only rests.
    let accompaniment = scan
        .tracks
        .iter()
        .find(|t| t.name.as_deref() == Some(ACCOMPANIMENT_TRACK_NAME))
        .or_else(|| note_tracks.get(1).copied())
        .or_else(|| note_tracks.first().copied());

    let key = scan.key.or_else(|| {
        let mut histogram = [0.0; 12];
        for note in note_tracks.iter().flat_map(|t| &t.notes) {
            histogram[(note.key % 12) as usize] += scan.quarters(note.end - note.start);
        }
        detect_key_from_histogram(&histogram)
    });
    let spelling = key.unwrap_or(Key::major(PitchName::natural(Step::C)));

    let ts = scan.time_signature.unwrap_or_default();
    let bar = scan.measure_ticks();
    let markers = accompaniment.map(|t| t.markers.as_slice()).unwrap_or_default();
    // Measure number and start tick of the measure containing `tick`.
    let locate = |tick: u32| match markers.iter().rev().find(|(at, _)| *at <= tick) {
        Some(&(at, number)) => (number, at),
        None => (tick / bar + 1, tick - tick % bar),
    };
    let mut onsets: BTreeMap<u32, Vec<RawNote>> = BTreeMap::new();
    for note in accompaniment.map(|t| t.notes.as_slice()).unwrap_or_default() {
        onsets.entry(note.start).or_default().push(*note);
    }

    let chords = onsets
        .into_iter()
        .map(|(start, mut notes)| {
            notes.sort_by_key(|n| n.key);
            let end = notes.iter().map(|n| n.end).max().unwrap_or(start);
            let (measure, measure_start) = locate(start);
            SoundingChord {
                measure,
                beat: ts.beat_at(scan.quarters(start - measure_start)),
                duration: scan.quarters(end - start),
                pitches: notes.iter().map(|n| spelling.spell_midi(n.key)).collect(),
            }
        })
        .collect();

    Ok(HarmonizedPiece { name: name.to_string(), key, chords })
}
