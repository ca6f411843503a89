// MusicXML notation output from combined scores.
//
// Renders a CombinedScore as a partwise MusicXML 4.0 document with two
// parts: the melody (P1) and the chordal accompaniment (P2). Both parts
// share divisions (480 per quarter), key, time signature and measure
// numbering; P1 also carries the metronome marking.
//
// Durations that are not a single (optionally dotted) note value are
// decomposed greedily into tied parts, largest first, down to a 32nd note.
// A leftover smaller than that becomes one last part with no <type>. Tie
// continuations from the melody become tie stops on the following notes.
// Each accompaniment chord is written as stacked notes joined with <chord/>,
// with the degree label as a lyric under the first one. Rests spanning a
// whole accompaniment measure use <rest measure="yes"/>.

use crate::harmonizer::AccompanimentEvent;
use crate::melody::{MeasureGroup, MelodicElement};
use crate::pitch::Pitch;
use crate::score::CombinedScore;
use std::fmt::Write;

/// Divisions per quarter note.
pub const DIVISIONS: u32 = 480;

/// Note values in divisions, with their <type> name and dot count.
const NOTE_VALUES: [(u32, &str, u8); 10] = [
    (1920, "whole", 0),
    (1440, "half", 1),
    (960, "half", 0),
    (720, "quarter", 1),
    (480, "quarter", 0),
    (360, "eighth", 1),
    (240, "eighth", 0),
    (180, "16th", 1),
    (120, "16th", 0),
    (60, "32nd", 0),
];

/// One notated part of a (possibly tied) duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotatedValue {
    pub divisions: u32,
    pub note_type: Option<&'static str>,
    pub dots: u8,
}

fn to_divisions(quarters: f64) -> u32 {
    (quarters * DIVISIONS as f64).round().max(0.0) as u32
}

/// Split a duration into notatable values, largest first.
///
/// For example 1200 divisions (a half tied to an eighth) = 960 + 240.
pub fn decompose_duration(mut divisions: u32) -> Vec<NotatedValue> {
    let mut parts = Vec::new();
    for &(value, note_type, dots) in &NOTE_VALUES {
        while divisions >= value {
            parts.push(NotatedValue { divisions: value, note_type: Some(note_type), dots });
            divisions -= value;
        }
    }
    if divisions > 0 {
        parts.push(NotatedValue { divisions, note_type: None, dots: 0 });
    }
    parts
}

/// Escape text for XML content and attribute values.
pub fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Clef {
    Treble,
    Bass,
}

impl Clef {
    fn sign_and_line(self) -> (&'static str, u8) {
        match self {
            Clef::Treble => ("G", 2),
            Clef::Bass => ("F", 4),
        }
    }
}

/// Bass clef for low lines (average below middle C), treble otherwise.
fn melody_clef(measures: &[MeasureGroup]) -> Clef {
    let pitches: Vec<i32> =
        measures.iter().flat_map(|m| m.elements.iter()).filter_map(|e| e.sounding_pitch()).map(|p| p.midi()).collect();
    if pitches.is_empty() {
        return Clef::Treble;
    }
    let average = pitches.iter().sum::<i32>() as f64 / pitches.len() as f64;
    if average < 60.0 { Clef::Bass } else { Clef::Treble }
}

/// Ties attached to one written note.
#[derive(Debug, Clone, Copy)]
struct Ties {
    stop: bool,
    start: bool,
}

fn write_pitch(out: &mut String, pitch: Pitch) {
    let _ = write!(out, "<pitch><step>{}</step>", pitch.name.step.letter());
    if pitch.name.alter != 0 {
        let _ = write!(out, "<alter>{}</alter>", pitch.name.alter);
    }
    let _ = write!(out, "<octave>{}</octave></pitch>", pitch.octave);
}

fn write_value(out: &mut String, value: &NotatedValue) {
    let _ = write!(out, "<duration>{}</duration>", value.divisions);
}

fn write_type(out: &mut String, value: &NotatedValue) {
    if let Some(note_type) = value.note_type {
        let _ = write!(out, "<type>{}</type>", note_type);
    }
    for _ in 0..value.dots {
        out.push_str("<dot/>");
    }
}

/// A note (or one note of a chord) with its ties and optional lyric.
fn write_note(out: &mut String, pitch: Pitch, value: &NotatedValue, in_chord: bool, ties: Ties, lyric: Option<&str>) {
    out.push_str("      <note>");
    if in_chord {
        out.push_str("<chord/>");
    }
    write_pitch(out, pitch);
    write_value(out, value);
    if ties.stop {
        out.push_str("<tie type=\"stop\"/>");
    }
    if ties.start {
        out.push_str("<tie type=\"start\"/>");
    }
    write_type(out, value);
    if ties.stop || ties.start {
        out.push_str("<notations>");
        if ties.stop {
            out.push_str("<tied type=\"stop\"/>");
        }
        if ties.start {
            out.push_str("<tied type=\"start\"/>");
        }
        out.push_str("</notations>");
    }
    if let Some(text) = lyric {
        let _ = write!(out, "<lyric number=\"1\"><syllabic>single</syllabic><text>{}</text></lyric>", escape_xml(text));
    }
    out.push_str("</note>\n");
}

fn write_rest(out: &mut String, value: &NotatedValue, whole_measure: bool) {
    out.push_str("      <note>");
    out.push_str(if whole_measure { "<rest measure=\"yes\"/>" } else { "<rest/>" });
    write_value(out, value);
    if !whole_measure {
        write_type(out, value);
    }
    out.push_str("</note>\n");
}

fn write_attributes(out: &mut String, score: &CombinedScore, clef: Clef) {
    let (sign, line) = clef.sign_and_line();
    let ts = score.time_signature;
    let _ = writeln!(
        out,
        "      <attributes><divisions>{}</divisions><key><fifths>{}</fifths><mode>{}</mode></key>\
         <time><beats>{}</beats><beat-type>{}</beat-type></time>\
         <clef><sign>{}</sign><line>{}</line></clef></attributes>",
        DIVISIONS,
        score.key.signature().clamp(-7, 7),
        score.key.mode.name(),
        ts.numerator,
        ts.denominator,
        sign,
        line
    );
}

fn write_tempo(out: &mut String, tempo_bpm: u32) {
    let _ = writeln!(
        out,
        "      <direction placement=\"above\"><direction-type><metronome>\
         <beat-unit>quarter</beat-unit><per-minute>{}</per-minute></metronome></direction-type>\
         <sound tempo=\"{}\"/></direction>",
        tempo_bpm, tempo_bpm
    );
}

/// Whether each melody element (flattened across measures) is tied into
/// the next one.
fn tied_forward(measures: &[MeasureGroup]) -> Vec<bool> {
    let elements: Vec<&MelodicElement> = measures.iter().flat_map(|m| m.elements.iter()).collect();
    elements
        .iter()
        .enumerate()
        .map(|(i, element)| match (element.sounding_pitch(), elements.get(i + 1)) {
            (Some(pitch), Some(next)) => next.is_tie_continuation() && next.sounding_pitch() == Some(pitch),
            _ => false,
        })
        .collect()
}

fn render_melody_part(score: &CombinedScore, out: &mut String) {
    let clef = melody_clef(&score.melody);
    let ties_forward = tied_forward(&score.melody);
    let mut flat_index = 0;

    for (i, measure) in score.melody.iter().enumerate() {
        let _ = writeln!(out, "    <measure number=\"{}\">", measure.number);
        if i == 0 {
            write_attributes(out, score, clef);
            write_tempo(out, score.tempo_bpm);
        }
        for element in &measure.elements {
            let parts = decompose_duration(to_divisions(element.duration()));
            match element {
                MelodicElement::Note(note) => {
                    let last = parts.len().saturating_sub(1);
                    let tied_on = ties_forward.get(flat_index).copied().unwrap_or(false);
                    for (j, value) in parts.iter().enumerate() {
                        let ties = Ties { stop: j > 0 || note.tie_continuation, start: j < last || tied_on };
                        write_note(out, note.pitch, value, false, ties, None);
                    }
                }
                MelodicElement::Rest(_) => {
                    for value in &parts {
                        write_rest(out, value, false);
                    }
                }
            }
            flat_index += 1;
        }
        // Pad short measures so both parts stay aligned.
        let gap = to_divisions(measure.duration()).saturating_sub(to_divisions(measure.content_duration()));
        if measure.elements.is_empty() {
            for value in decompose_duration(gap) {
                write_rest(out, &value, true);
            }
        } else {
            for value in decompose_duration(gap) {
                write_rest(out, &value, false);
            }
        }
        out.push_str("    </measure>\n");
    }
}

fn render_accompaniment_part(score: &CombinedScore, out: &mut String) {
    for (i, (measure, event)) in score.melody.iter().zip(&score.accompaniment.events).enumerate() {
        let _ = writeln!(out, "    <measure number=\"{}\">", measure.number);
        if i == 0 {
            write_attributes(out, score, Clef::Bass);
        }
        let parts = decompose_duration(to_divisions(event.duration()));
        match event {
            AccompanimentEvent::Chord(chord) => {
                let pitches = chord.harmony.triad.voiced(score.accompaniment_octave);
                let last = parts.len().saturating_sub(1);
                for (j, value) in parts.iter().enumerate() {
                    let ties = Ties { stop: j > 0, start: j < last };
                    for (k, pitch) in pitches.iter().enumerate() {
                        let lyric = if j == 0 && k == 0 { chord.annotation.as_deref() } else { None };
                        write_note(out, *pitch, value, k > 0, ties, lyric);
                    }
                }
            }
            AccompanimentEvent::Rest { .. } => {
                for value in &parts {
                    write_rest(out, value, true);
                }
            }
        }
        out.push_str("    </measure>\n");
    }
}

/// Generate a complete MusicXML document from a CombinedScore.
pub fn score_to_musicxml(score: &CombinedScore) -> String {
    let mut xml = String::new();
    xml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"no\"?>\n");
    xml.push_str(
        "<!DOCTYPE score-partwise PUBLIC \"-//Recordare//DTD MusicXML 4.0 Partwise//EN\" \
         \"http://www.musicxml.org/dtds/partwise.dtd\">\n",
    );
    xml.push_str("<score-partwise version=\"4.0\">\n");
    let _ = writeln!(xml, "  <work><work-title>{}</work-title></work>", escape_xml(&score.title));

    xml.push_str("  <part-list>\n");
    for (id, name, channel, program) in [
        ("P1", "Melody", 1, score.melody_program),
        ("P2", "Accompaniment", 2, score.accompaniment_program),
    ] {
        let _ = writeln!(
            xml,
            "    <score-part id=\"{id}\"><part-name>{name}</part-name>\
             <midi-instrument id=\"{id}-I1\"><midi-channel>{channel}</midi-channel>\
             <midi-program>{}</midi-program></midi-instrument></score-part>",
            program as u32 + 1
        );
    }
    xml.push_str("  </part-list>\n");

    xml.push_str("  <part id=\"P1\">\n");
    render_melody_part(score, &mut xml);
    xml.push_str("  </part>\n");
    xml.push_str("  <part id=\"P2\">\n");
    render_accompaniment_part(score, &mut xml);
    xml.push_str("  </part>\n");
    xml.push_str("</score-partwise>\n");
    xml
}
