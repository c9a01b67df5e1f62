use std::path::Path;
use std::sync::Arc;

use ndarray::{Array2, Axis, Ix2};
use ort::{GraphOptimizationLevel, Session, Tensor};
use tracing::info;

use crate::constants::{N_NOTES, NOTE_OUTPUT_NAME, ONSET_OUTPUT_NAME};
use crate::error::InferenceError;
use crate::preprocessing::rolling_window::RollingWindow;

/// Per-frame probabilities produced for one audio window, each of shape
/// (n_times, 88).
///
/// Only the shape is validated. Values are expected in `[0, 1]` but not
/// checked; a NaN entry is ignored by the frame aggregator's maximum, so a
/// NaN column reads as zero confidence.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelOutput {
    notes: Array2<f32>,
    onsets: Array2<f32>,
}

impl ModelOutput {
    pub fn new(notes: Array2<f32>, onsets: Array2<f32>) -> Result<Self, InferenceError> {
        for (name, matrix) in [("note", &notes), ("onset", &onsets)] {
            if matrix.ncols() != N_NOTES {
                return Err(InferenceError::Shape(format!(
                    "{name} matrix has {} channels, expected {N_NOTES}",
                    matrix.ncols()
                )));
            }
            if matrix.nrows() == 0 {
                return Err(InferenceError::Shape(format!("{name} matrix has no frames")));
            }
        }
        if notes.nrows() != onsets.nrows() {
            return Err(InferenceError::Shape(format!(
                "note matrix has {} frames but onset matrix has {}",
                notes.nrows(),
                onsets.nrows()
            )));
        }

        Ok(Self { notes, onsets })
    }

    pub fn notes(&self) -> &Array2<f32> {
        &self.notes
    }

    pub fn onsets(&self) -> &Array2<f32> {
        &self.onsets
    }
}

/// A pitch model maps one fixed-size audio window to note and onset
/// probabilities. Implementations must be stateless between calls.
pub trait PitchModel: Send + Sync {
    fn predict(&self, window: &[f32]) -> Result<ModelOutput, InferenceError>;
}

/// The Basic Pitch ONNX model.
pub struct OnnxPitchModel {
    session: Session,
    window_length: usize,
}

impl OnnxPitchModel {
    pub fn load<P: AsRef<Path>>(model_path: P, window_length: usize) -> Result<Self, InferenceError> {
        let model_path = model_path.as_ref();
        info!(path = %model_path.display(), "loading pitch model");

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(4)?
            .commit_from_file(model_path)?;

        info!(window_length, "pitch model loaded");
        Ok(Self {
            session,
            window_length,
        })
    }
}

impl PitchModel for OnnxPitchModel {
    fn predict(&self, window: &[f32]) -> Result<ModelOutput, InferenceError> {
        if window.len() != self.window_length {
            return Err(InferenceError::WindowLength {
                expected: self.window_length,
                actual: window.len(),
            });
        }

        // The model takes (batch, samples, 1)
        let input_shape: Vec<i64> = vec![1, window.len() as i64, 1];
        let input_tensor = Tensor::from_array((input_shape, window.to_vec()))?;
        let outputs = self.session.run(ort::inputs![input_tensor]?)?;

        let extract = |name: &'static str| -> Result<Array2<f32>, InferenceError> {
            let value = outputs.get(name).ok_or(InferenceError::MissingOutput(name))?;
            Ok(value
                .try_extract_tensor::<f32>()?
                .index_axis(Axis(0), 0)
                .into_dimensionality::<Ix2>()?
                .to_owned())
        };

        ModelOutput::new(extract(NOTE_OUTPUT_NAME)?, extract(ONSET_OUTPUT_NAME)?)
    }
}

/// Runs a shared model off the async runtime.
#[derive(Clone)]
pub struct InferenceAdapter {
    model: Arc<dyn PitchModel>,
}

impl InferenceAdapter {
    pub fn new(model: Arc<dyn PitchModel>) -> Self {
        Self { model }
    }

    /// Run the model on a blocking worker. The window is lent to the worker
    /// and put back before this returns; if the worker dies the window is
    /// reset to silence.
    pub async fn infer(&self, window: &mut RollingWindow) -> Result<ModelOutput, InferenceError> {
        let length = window.len();
        let lent = std::mem::take(window);
        let model = Arc::clone(&self.model);

        let joined = tokio::task::spawn_blocking(move || {
            let result = model.predict(lent.as_slice());
            (lent, result)
        })
        .await;

        match joined {
            Ok((returned, result)) => {
                *window = returned;
                result
            }
            Err(err) => {
                *window = RollingWindow::new(length);
                Err(InferenceError::Join(err))
            }
        }
    }
}
