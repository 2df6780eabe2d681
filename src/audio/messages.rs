//! Messages exchanged between the UI thread and the audio callbacks.
//!
//! Every message is `Copy` and fixed-size, so passing one through a
//! [`crate::audio::Fifo`] never allocates.

use serde::{Deserialize, Serialize};

/// Tone parameters requested by the UI.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ToneParameters {
    /// Frequency in Hz
    pub frequency: f32,
    /// Linear amplitude in [0, 1]
    pub amplitude: f32,
}

/// UI -> audio thread.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControlMessage {
    SetFrequency(f32),
    SetAmplitude(f32),
}

/// Audio thread -> UI.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MeterMessage {
    InputLevel(f32),
    OutputLevel(f32),
}

/// Latest meter values as seen by the UI, each in [0, 1].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LevelReading {
    pub input_level: f32,
    pub output_level: f32,
}
