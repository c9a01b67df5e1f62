use std::path::PathBuf;

/// Failures of a single model call. None of these end a session.
#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    #[error("ONNX runtime error: {0}")]
    Runtime(#[from] ort::Error),

    #[error("Unexpected tensor shape: {0}")]
    Tensor(#[from] ndarray::ShapeError),

    #[error("Model output `{0}` missing")]
    MissingOutput(&'static str),

    #[error("Malformed model output: {0}")]
    Shape(String),

    #[error("Window holds {actual} samples, model expects {expected}")]
    WindowLength { expected: usize, actual: usize },

    #[error("Inference task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    #[error("Resampler setup failed: {0}")]
    ResamplerSetup(#[from] rubato::ResamplerConstructionError),

    #[error("Resampling failed: {0}")]
    Resample(#[from] rubato::ResampleError),

    #[error("Audio file contains no samples")]
    Empty,

    #[error("Unsupported channel count: {0}")]
    Channels(u16),
}
