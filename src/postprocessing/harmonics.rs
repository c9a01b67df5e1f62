use crate::constants::N_NOTES;

/// Lowest channel that can shadow anything two octaves down.
const LOWEST_SHADOWING_INDEX: usize = 24;
const OCTAVE_OFFSETS: [usize; 2] = [12, 24];

/// Zero out sub-octave ghosts excited by the overtones of a stronger note.
///
/// Walks from the highest channel down in a single pass. A channel above
/// `presence_threshold` clears the channels one and two octaves below unless
/// they reach `ratio` of its confidence. A channel cleared earlier in the
/// pass no longer shadows anything, and nothing is restored afterwards.
pub fn suppress_sub_octaves(notes: &mut [f32; N_NOTES], presence_threshold: f32, ratio: f32) {
    for index in (LOWEST_SHADOWING_INDEX..N_NOTES).rev() {
        let strength = notes[index];
        if strength <= presence_threshold {
            continue;
        }

        for offset in OCTAVE_OFFSETS {
            if let Some(low) = index.checked_sub(offset) {
                if notes[low] < strength * ratio {
                    notes[low] = 0.0;
                }
            }
        }
    }
}
