pub mod config;
pub mod constants;
pub mod error;
pub mod inference;
pub mod preprocessing {
    pub mod hop_accumulator;
    pub mod load_audio;
    pub mod rolling_window;
}
pub mod postprocessing {
    pub mod aggregate;
    pub mod events;
    pub mod harmonics;
    pub mod midi;
    pub mod note_tracker;
    pub mod timeline;
}
pub mod replay;
pub mod server;
pub mod session;
