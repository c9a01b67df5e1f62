use super::events::CompletedNote;

/// Anchors session time to the first note and keeps the finished-note log.
///
/// The only way to read relative time is [`SessionTimeline::mark_onset`],
/// which sets the anchor first if needed.
#[derive(Debug, Clone, Default)]
pub struct SessionTimeline {
    anchor: Option<f64>,
    log: Vec<CompletedNote>,
}

impl SessionTimeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an onset at `now` and return its session-relative time.
    pub fn mark_onset(&mut self, now: f64) -> f64 {
        let anchor = *self.anchor.get_or_insert(now);
        now - anchor
    }

    pub fn record(&mut self, note: CompletedNote) {
        self.log.push(note);
    }

    pub fn anchor(&self) -> Option<f64> {
        self.anchor
    }

    pub fn notes(&self) -> &[CompletedNote] {
        &self.log
    }

    pub fn into_notes(self) -> Vec<CompletedNote> {
        self.log
    }
}
