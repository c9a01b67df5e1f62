use serde::{Deserialize, Serialize};

use super::note_tracker::NoteTransition;

const NOTE_NAMES: [&str; 12] = ["C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B"];

/// Scientific pitch name of a MIDI number, e.g. 60 is `C4`.
pub fn midi_to_note_name(midi: u8) -> String {
    let octave = (midi / 12) as i32 - 1;
    format!("{}{}", NOTE_NAMES[(midi % 12) as usize], octave)
}

/// Round seconds to millisecond resolution.
pub fn round_ms(seconds: f64) -> f64 {
    (seconds * 1000.0).round() / 1000.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttackKind {
    NewAttack,
    ReTrigger,
}

/// A finished note, timed relative to the first note of the session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletedNote {
    pub note: String,
    pub midi: u8,
    pub start_time: f64,
    pub duration: f64,
}

impl CompletedNote {
    pub fn new(midi: u8, relative_start: f64, duration: f64) -> Self {
        Self {
            note: midi_to_note_name(midi),
            midi,
            start_time: round_ms(relative_start),
            duration: round_ms(duration),
        }
    }
}

/// JSON messages sent back to the client.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutgoingMessage {
    Volume {
        value: f32,
    },
    NoteOn {
        note: String,
        midi: u8,
        event: AttackKind,
        start_time: f64,
    },
    NoteOff(CompletedNote),
    SilenceReset,
}

impl From<NoteTransition> for OutgoingMessage {
    fn from(transition: NoteTransition) -> Self {
        match transition {
            NoteTransition::On { midi, kind, relative_start } => OutgoingMessage::NoteOn {
                note: midi_to_note_name(midi),
                midi,
                event: kind,
                start_time: round_ms(relative_start),
            },
            NoteTransition::Off(completed) => OutgoingMessage::NoteOff(completed),
        }
    }
}
