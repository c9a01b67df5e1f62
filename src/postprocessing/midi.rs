use midly::num::{u15, u24, u28, u4, u7};
use midly::Format;
use midly::Header;
use midly::MetaMessage;
use midly::MidiMessage;
use midly::Smf;
use midly::Timing;
use midly::Track;
use midly::TrackEvent;
use midly::TrackEventKind;

use crate::constants::{EXPORT_VELOCITY, TICKS_PER_BEAT};

use super::events::CompletedNote;

/// Slowest tempo whose microseconds-per-beat still fits in 24 bits.
pub const MIN_BPM: u32 = 4;

#[derive(Debug, Clone)]
struct TrackEventAbsolute<'a> {
    tick: u32,
    kind: TrackEventKind<'a>,
}

fn is_note_on(kind: &TrackEventKind) -> bool {
    matches!(kind, TrackEventKind::Midi { message: MidiMessage::NoteOn { .. }, .. })
}

pub fn generate_ordered_midi_events(notes: &[CompletedNote], ticks_per_second: f64) -> Vec<TrackEvent<'static>> {
    let mut track_events_absolute: Vec<TrackEventAbsolute> = vec![];
    for note in notes {
        let key = u7::new(note.midi);
        let vel = u7::new(EXPORT_VELOCITY);

        let start_tick = (note.start_time * ticks_per_second).round() as u32;
        track_events_absolute.push(TrackEventAbsolute {
            tick: start_tick,
            kind: TrackEventKind::Midi {
                channel: u4::new(0),
                message: MidiMessage::NoteOn { key, vel },
            },
        });

        let end_tick = (note.duration * ticks_per_second).round() as u32 + start_tick;
        track_events_absolute.push(TrackEventAbsolute {
            tick: end_tick,
            kind: TrackEventKind::Midi {
                channel: u4::new(0),
                message: MidiMessage::NoteOff { key, vel },
            },
        });
    }

    // A re-triggered note ends on the tick its successor starts, so offs go first
    track_events_absolute.sort_by_key(|event| (event.tick, is_note_on(&event.kind)));

    let mut track_events = vec![];
    let mut previous_tick = 0;
    for track_event_absolute in track_events_absolute {
        track_events.push(TrackEvent {
            delta: u28::new(track_event_absolute.tick - previous_tick),
            kind: track_event_absolute.kind,
        });
        previous_tick = track_event_absolute.tick;
    }

    track_events
}

/// Generate MIDI file data from a session's completed notes.
///
/// # Arguments
///
/// * `notes` - Completed notes with session-relative times in seconds.
/// * `beats_per_minute` - Tempo written to the file, raised to [`MIN_BPM`].
///
/// # Returns
///
/// * The bytes of a single-track Standard MIDI File.
pub fn generate_midi_file_data(notes: &[CompletedNote], beats_per_minute: u32) -> std::io::Result<Vec<u8>> {
    let beats_per_minute = beats_per_minute.max(MIN_BPM);
    let timing = Timing::Metrical(u15::new(TICKS_PER_BEAT));
    let ticks_per_second = TICKS_PER_BEAT as f64 * beats_per_minute as f64 / 60.0;

    let mut smf = Smf::new(Header {
        format: Format::SingleTrack,
        timing,
    });
    let mut track = Track::new();

    // Set tempo to match the BPM
    track.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(MetaMessage::Tempo(u24::new(60_000_000 / beats_per_minute))),
    });

    track.extend(generate_ordered_midi_events(notes, ticks_per_second));
    track.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    });

    smf.tracks.push(track);

    let mut buffer = Vec::new();
    smf.write_std(&mut buffer)?;

    Ok(buffer)
}
