use ndarray::{s, ArrayView2, Axis};

use crate::constants::N_NOTES;
use crate::inference::ModelOutput;

/// One confidence per piano key for the current hop. Index `i` is MIDI
/// number `i + 21`.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameConfidences {
    pub notes: [f32; N_NOTES],
    pub onsets: [f32; N_NOTES],
}

impl Default for FrameConfidences {
    fn default() -> Self {
        Self {
            notes: [0.0; N_NOTES],
            onsets: [0.0; N_NOTES],
        }
    }
}

/// Reduce the last `focus_window` frames of the model output to a single
/// confidence per note with an element-wise maximum.
///
/// # Arguments
///
/// * `output` - Validated model output.
/// * `focus_window` - Number of trailing frames to consider. All frames are
///   used when the output is shorter.
pub fn aggregate_recent_frames(output: &ModelOutput, focus_window: usize) -> FrameConfidences {
    FrameConfidences {
        notes: trailing_max(output.notes().view(), focus_window),
        onsets: trailing_max(output.onsets().view(), focus_window),
    }
}

fn trailing_max(matrix: ArrayView2<f32>, focus_window: usize) -> [f32; N_NOTES] {
    let start = matrix.nrows().saturating_sub(focus_window);
    let recent = matrix.slice(s![start.., ..]);

    let mut maxima = [0.0; N_NOTES];
    for (max, column) in maxima.iter_mut().zip(recent.axis_iter(Axis(1))) {
        *max = column.fold(0.0f32, |acc, &v| acc.max(v));
    }
    maxima
}
