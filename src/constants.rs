// Inference
pub const AUDIO_SAMPLE_RATE: usize = 22050;
pub const FFT_HOP: usize = 256;
pub const AUDIO_WINDOW_LENGTH: usize = 2;
pub const AUDIO_N_SAMPLES: usize = AUDIO_SAMPLE_RATE * AUDIO_WINDOW_LENGTH - FFT_HOP;
pub const MODEL_PATH: &str = "./model/icassp_2022_nmp.onnx";
pub const NOTE_OUTPUT_NAME: &str = "StatefulPartitionedCall:1";
pub const ONSET_OUTPUT_NAME: &str = "StatefulPartitionedCall:2";

// Streaming
pub const DEFAULT_HOP_SIZE: usize = 2048;
pub const DEFAULT_FOCUS_WINDOW: usize = 5;

// MIDI Conversion
pub const N_NOTES: usize = 88;
pub const MIDI_OFFSET: usize = 21;
pub const MAX_MIDI: usize = MIDI_OFFSET + N_NOTES - 1;
pub const TICKS_PER_BEAT: u16 = 480;
pub const EXPORT_VELOCITY: u8 = 100;

/// Converts a model note channel into its MIDI number.
pub fn index_to_midi(index: usize) -> u8 {
    (index + MIDI_OFFSET) as u8
}

/// Converts a MIDI number into its model note channel, if it is on the piano.
pub fn midi_to_index(midi: u8) -> Option<usize> {
    let midi = midi as usize;
    if (MIDI_OFFSET..=MAX_MIDI).contains(&midi) {
        Some(midi - MIDI_OFFSET)
    } else {
        None
    }
}
