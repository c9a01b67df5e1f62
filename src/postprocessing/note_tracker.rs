use std::collections::BTreeMap;

use tracing::debug;

use crate::config::DetectorConfig;
use crate::constants::{index_to_midi, midi_to_index, N_NOTES};

use super::aggregate::FrameConfidences;
use super::events::{AttackKind, CompletedNote};
use super::timeline::SessionTimeline;

/// A sounding note. The relative start is fixed when the note opens, so
/// closing it never needs the session anchor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActiveNote {
    pub onset: f64,
    pub relative_start: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NoteTransition {
    On {
        midi: u8,
        kind: AttackKind,
        relative_start: f64,
    },
    Off(CompletedNote),
}

/// Per-key hysteresis tracker. A key is in the active map exactly while it
/// is sounding.
#[derive(Debug, Clone, Default)]
pub struct NoteTracker {
    active: BTreeMap<u8, ActiveNote>,
}

impl NoteTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance every key by one hop.
    ///
    /// # Arguments
    ///
    /// * `frame` - Confidences after sub-octave suppression.
    /// * `config` - Detector thresholds.
    /// * `now` - Hop timestamp in seconds.
    /// * `timeline` - Receives the anchor and every completed note.
    ///
    /// # Returns
    ///
    /// * Transitions in ascending MIDI order, followed by releases.
    pub fn update(
        &mut self,
        frame: &FrameConfidences,
        config: &DetectorConfig,
        now: f64,
        timeline: &mut SessionTimeline,
    ) -> Vec<NoteTransition> {
        let mut transitions = vec![];
        let mut detected = [false; N_NOTES];

        for (index, (&note, &onset)) in frame.notes.iter().zip(frame.onsets.iter()).enumerate() {
            let midi = index_to_midi(index);
            let thresholds = config.thresholds_for(midi);

            match self.active.get(&midi).copied() {
                None => {
                    if note > thresholds.start {
                        detected[index] = true;
                        transitions.push(self.open(midi, AttackKind::NewAttack, now, timeline));
                    }
                }
                Some(active) => {
                    if note <= thresholds.keep {
                        continue;
                    }
                    detected[index] = true;

                    let cooled_down = now - active.onset > config.retrigger_cooldown;
                    if onset > thresholds.onset && cooled_down {
                        transitions.push(NoteTransition::Off(close(midi, active, now, timeline)));
                        transitions.push(self.open(midi, AttackKind::ReTrigger, now, timeline));
                    }
                }
            }
        }

        let released: Vec<u8> = self
            .active
            .keys()
            .copied()
            .filter(|&midi| !midi_to_index(midi).is_some_and(|index| detected[index]))
            .collect();

        for midi in released {
            if let Some(active) = self.active.remove(&midi) {
                transitions.push(NoteTransition::Off(close(midi, active, now, timeline)));
            }
        }

        transitions
    }

    /// Close every sounding note, e.g. when the input goes silent.
    pub fn release_all(&mut self, now: f64, timeline: &mut SessionTimeline) -> Vec<NoteTransition> {
        std::mem::take(&mut self.active)
            .into_iter()
            .map(|(midi, active)| NoteTransition::Off(close(midi, active, now, timeline)))
            .collect()
    }

    pub fn is_active(&self, midi: u8) -> bool {
        self.active.contains_key(&midi)
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    fn open(&mut self, midi: u8, kind: AttackKind, now: f64, timeline: &mut SessionTimeline) -> NoteTransition {
        let relative_start = timeline.mark_onset(now);
        self.active.insert(midi, ActiveNote { onset: now, relative_start });
        debug!(midi, ?kind, relative_start, "note on");

        NoteTransition::On { midi, kind, relative_start }
    }
}

fn close(midi: u8, active: ActiveNote, now: f64, timeline: &mut SessionTimeline) -> CompletedNote {
    let completed = CompletedNote::new(midi, active.relative_start, now - active.onset);
    debug!(midi, duration = completed.duration, "note off");
    timeline.record(completed.clone());
    completed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(notes: &[(u8, f32)], onsets: &[(u8, f32)]) -> FrameConfidences {
        let mut frame = FrameConfidences::default();
        for &(midi, confidence) in notes {
            frame.notes[midi_to_index(midi).unwrap()] = confidence;
        }
        for &(midi, confidence) in onsets {
            frame.onsets[midi_to_index(midi).unwrap()] = confidence;
        }
        frame
    }

    fn ons(transitions: &[NoteTransition]) -> Vec<(u8, AttackKind)> {
        transitions
            .iter()
            .filter_map(|t| match t {
                NoteTransition::On { midi, kind, .. } => Some((*midi, *kind)),
                NoteTransition::Off(_) => None,
            })
            .collect()
    }

    fn offs(transitions: &[NoteTransition]) -> Vec<u8> {
        transitions
            .iter()
            .filter_map(|t| match t {
                NoteTransition::Off(note) => Some(note.midi),
                NoteTransition::On { .. } => None,
            })
            .collect()
    }

    #[test]
    fn test_first_attack_starts_at_zero() {
        let config = DetectorConfig::default();
        let mut tracker = NoteTracker::new();
        let mut timeline = SessionTimeline::new();

        let transitions = tracker.update(&frame(&[(60, 0.9)], &[(60, 0.9)]), &config, 100.0, &mut timeline);
        assert_eq!(
            transitions,
            vec![NoteTransition::On {
                midi: 60,
                kind: AttackKind::NewAttack,
                relative_start: 0.0
            }]
        );
        assert_eq!(timeline.anchor(), Some(100.0));
        assert!(tracker.is_active(60));
    }

    #[test]
    fn test_below_start_threshold_stays_inactive() {
        let config = DetectorConfig::default();
        let mut tracker = NoteTracker::new();
        let mut timeline = SessionTimeline::new();

        let transitions = tracker.update(&frame(&[(60, 0.35)], &[]), &config, 0.0, &mut timeline);
        assert!(transitions.is_empty());
        assert_eq!(timeline.anchor(), None);
    }

    #[test]
    fn test_hysteresis_keeps_note_between_thresholds() {
        let config = DetectorConfig::default();
        let mut tracker = NoteTracker::new();
        let mut timeline = SessionTimeline::new();

        tracker.update(&frame(&[(60, 0.9)], &[]), &config, 0.0, &mut timeline);
        for (step, confidence) in [0.35, 0.39, 0.31, 0.38, 0.33].into_iter().enumerate() {
            let now = 0.1 * (step + 1) as f64;
            let transitions = tracker.update(&frame(&[(60, confidence)], &[]), &config, now, &mut timeline);
            assert!(transitions.is_empty(), "flicker at confidence {confidence}");
        }
        assert!(tracker.is_active(60));
        assert!(timeline.notes().is_empty());
    }

    #[test]
    fn test_drop_below_keep_threshold_releases() {
        let config = DetectorConfig::default();
        let mut tracker = NoteTracker::new();
        let mut timeline = SessionTimeline::new();

        tracker.update(&frame(&[(60, 0.9)], &[]), &config, 10.0, &mut timeline);
        let transitions = tracker.update(&frame(&[(60, 0.2)], &[]), &config, 10.5, &mut timeline);

        assert_eq!(offs(&transitions), vec![60]);
        assert!(!tracker.is_active(60));
        assert_eq!(timeline.notes(), &[CompletedNote::new(60, 0.0, 0.5)]);
    }

    #[test]
    fn test_retrigger_closes_and_reopens() {
        let config = DetectorConfig::default();
        let mut tracker = NoteTracker::new();
        let mut timeline = SessionTimeline::new();

        tracker.update(&frame(&[(60, 0.9)], &[(60, 0.9)]), &config, 1.0, &mut timeline);
        tracker.update(&frame(&[(60, 0.8)], &[(60, 0.1)]), &config, 1.1, &mut timeline);
        let transitions = tracker.update(&frame(&[(60, 0.8)], &[(60, 0.9)]), &config, 1.6, &mut timeline);

        assert_eq!(offs(&transitions), vec![60]);
        assert_eq!(ons(&transitions), vec![(60, AttackKind::ReTrigger)]);
        assert_eq!(
            transitions[1],
            NoteTransition::On {
                midi: 60,
                kind: AttackKind::ReTrigger,
                relative_start: 1.6 - 1.0
            }
        );
        assert_eq!(timeline.notes(), &[CompletedNote::new(60, 0.0, 0.6)]);
        assert!(tracker.is_active(60));
    }

    #[test]
    fn test_retrigger_respects_cooldown() {
        let config = DetectorConfig::default();
        let mut tracker = NoteTracker::new();
        let mut timeline = SessionTimeline::new();

        let first = tracker.update(&frame(&[(60, 0.9)], &[(60, 0.9)]), &config, 1.0, &mut timeline);
        let second = tracker.update(&frame(&[(60, 0.9)], &[(60, 0.9)]), &config, 1.05, &mut timeline);
        let flush = tracker.release_all(1.3, &mut timeline);

        assert_eq!(ons(&first), vec![(60, AttackKind::NewAttack)]);
        assert!(second.is_empty());
        assert_eq!(offs(&flush), vec![60]);
        assert_eq!(timeline.notes().len(), 1);
    }

    #[test]
    fn test_bass_notes_use_lower_thresholds() {
        let config = DetectorConfig::default();
        let mut tracker = NoteTracker::new();
        let mut timeline = SessionTimeline::new();

        let transitions = tracker.update(&frame(&[(40, 0.3), (60, 0.3)], &[]), &config, 0.0, &mut timeline);
        assert_eq!(ons(&transitions), vec![(40, AttackKind::NewAttack)]);
    }

    #[test]
    fn test_relative_start_follows_first_note() {
        let config = DetectorConfig::default();
        let mut tracker = NoteTracker::new();
        let mut timeline = SessionTimeline::new();

        tracker.update(&frame(&[(60, 0.9)], &[]), &config, 5.0, &mut timeline);
        let transitions = tracker.update(&frame(&[(60, 0.9), (64, 0.9)], &[]), &config, 5.25, &mut timeline);

        assert_eq!(
            transitions,
            vec![NoteTransition::On {
                midi: 64,
                kind: AttackKind::NewAttack,
                relative_start: 0.25
            }]
        );
    }

    #[test]
    fn test_release_all_empties_tracker() {
        let config = DetectorConfig::default();
        let mut tracker = NoteTracker::new();
        let mut timeline = SessionTimeline::new();

        tracker.update(&frame(&[(60, 0.9), (67, 0.9)], &[]), &config, 0.0, &mut timeline);
        let flush = tracker.release_all(2.0, &mut timeline);

        assert_eq!(offs(&flush), vec![60, 67]);
        assert_eq!(tracker.active_count(), 0);
        assert!(tracker.release_all(3.0, &mut timeline).is_empty());
    }
}
