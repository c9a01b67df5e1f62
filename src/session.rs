use std::time::Instant;

use tracing::{debug, warn};

use crate::config::DetectorConfig;
use crate::error::InferenceError;
use crate::inference::{InferenceAdapter, ModelOutput, PitchModel};
use crate::postprocessing::aggregate::aggregate_recent_frames;
use crate::postprocessing::events::{CompletedNote, OutgoingMessage};
use crate::postprocessing::harmonics::suppress_sub_octaves;
use crate::postprocessing::note_tracker::NoteTracker;
use crate::postprocessing::timeline::SessionTimeline;
use crate::preprocessing::hop_accumulator::{decode_pcm, rms, HopAccumulator};
use crate::preprocessing::rolling_window::RollingWindow;

/// Source of hop timestamps, in seconds.
pub trait Clock {
    fn now(&self) -> f64;
}

/// Seconds elapsed since the clock was started.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn start() -> Self {
        Self { origin: Instant::now() }
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

impl<F: Fn() -> f64> Clock for F {
    fn now(&self) -> f64 {
        self()
    }
}

/// Everything one connected client needs, from raw samples to note events.
pub struct AudioSession {
    config: DetectorConfig,
    accumulator: HopAccumulator,
    window: RollingWindow,
    tracker: NoteTracker,
    timeline: SessionTimeline,
}

impl AudioSession {
    pub fn new(config: DetectorConfig) -> Self {
        Self {
            accumulator: HopAccumulator::new(config.hop_size),
            window: RollingWindow::new(config.window_length),
            tracker: NoteTracker::new(),
            timeline: SessionTimeline::new(),
            config,
        }
    }

    /// Queue a binary payload of little-endian `f32` samples. Malformed
    /// payloads are dropped and reported as `false`.
    pub fn push_fragment(&mut self, bytes: &[u8]) -> bool {
        match decode_pcm(bytes) {
            Some(samples) => {
                self.accumulator.push(&samples);
                true
            }
            None => false,
        }
    }

    pub fn push_samples(&mut self, samples: &[f32]) {
        self.accumulator.push(samples);
    }

    pub fn take_hop(&mut self) -> Option<Vec<f32>> {
        self.accumulator.try_take_hop()
    }

    /// Process one hop, running the model on a blocking worker.
    pub async fn process_hop<C: Clock>(
        &mut self,
        hop: &[f32],
        adapter: &InferenceAdapter,
        clock: &C,
    ) -> Vec<OutgoingMessage> {
        let (mut messages, silent) = self.begin_hop(hop);
        if silent {
            messages.extend(self.flush_silence(clock.now()));
            return messages;
        }

        let result = adapter.infer(&mut self.window).await;
        messages.extend(self.apply_inference(result, clock.now()));
        messages
    }

    /// Process one hop on the calling thread.
    pub fn process_hop_with(&mut self, hop: &[f32], model: &dyn PitchModel, now: f64) -> Vec<OutgoingMessage> {
        let (mut messages, silent) = self.begin_hop(hop);
        if silent {
            messages.extend(self.flush_silence(now));
            return messages;
        }

        let result = model.predict(self.window.as_slice());
        messages.extend(self.apply_inference(result, now));
        messages
    }

    /// End the session, closing any notes still sounding into the log.
    pub fn finish(mut self, now: f64) -> Vec<CompletedNote> {
        self.tracker.release_all(now, &mut self.timeline);
        self.timeline.into_notes()
    }

    pub fn notes(&self) -> &[CompletedNote] {
        self.timeline.notes()
    }

    pub fn active_notes(&self) -> usize {
        self.tracker.active_count()
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    fn begin_hop(&mut self, hop: &[f32]) -> (Vec<OutgoingMessage>, bool) {
        self.window.advance(hop);
        let volume = rms(hop);
        (vec![OutgoingMessage::Volume { value: volume }], volume < self.config.min_volume)
    }

    fn flush_silence(&mut self, now: f64) -> Vec<OutgoingMessage> {
        if self.tracker.active_count() == 0 {
            return vec![];
        }

        debug!(active = self.tracker.active_count(), "silence detected, closing active notes");
        let mut messages: Vec<OutgoingMessage> = self
            .tracker
            .release_all(now, &mut self.timeline)
            .into_iter()
            .map(OutgoingMessage::from)
            .collect();
        messages.push(OutgoingMessage::SilenceReset);
        messages
    }

    fn apply_inference(&mut self, result: Result<ModelOutput, InferenceError>, now: f64) -> Vec<OutgoingMessage> {
        let output = match result {
            Ok(output) => output,
            Err(err) => {
                warn!(error = %err, "skipping hop after inference failure");
                return vec![];
            }
        };

        let mut frame = aggregate_recent_frames(&output, self.config.focus_window);
        suppress_sub_octaves(
            &mut frame.notes,
            self.config.harmonic_presence_threshold,
            self.config.harmonic_ratio,
        );

        self.tracker
            .update(&frame, &self.config, now, &mut self.timeline)
            .into_iter()
            .map(OutgoingMessage::from)
            .collect()
    }
}
