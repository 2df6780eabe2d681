// Public API: process-wide engine instance and free-function entry points
//
// Platform glue (a UI layer's display link, a JNI shim, the CLI) calls these
// functions instead of owning an AudioEngine itself.

use std::sync::Arc;

use anyhow::Result;
use once_cell::sync::Lazy;
use tokio::sync::broadcast;

use crate::audio::LevelReading;
use crate::config::AppConfig;
use crate::engine::{AudioEngine, EngineState, LevelMeterDelegate, TelemetryEvent};
use crate::error::AudioError;

// Re-export error code constants for callers across the FFI boundary
pub use crate::error::AudioErrorCodes;

/// Global engine instance
///
/// Built on first use from the platform configuration and the platform's
/// default device backend. No streams are opened until `start()`.
static ENGINE: Lazy<AudioEngine> = Lazy::new(|| AudioEngine::new(AppConfig::load_platform()));

/// The process-wide engine.
pub fn shared_instance() -> &'static AudioEngine {
    &ENGINE
}

/// Get the version of the tone engine
pub fn get_version() -> Result<String> {
    Ok(env!("CARGO_PKG_VERSION").to_string())
}

/// Start the audio engine
///
/// # Errors
/// - Engine already started or suspended
/// - Invalid configuration
/// - Audio streams cannot be opened (device busy, permissions denied)
pub fn start() -> Result<(), AudioError> {
    ENGINE.start()
}

/// Stop the audio engine and close its streams
pub fn stop() -> Result<(), AudioError> {
    ENGINE.stop()
}

/// Pause the streams, e.g. when the app moves to the background
pub fn suspend() -> Result<(), AudioError> {
    ENGINE.suspend()
}

/// Resume streams paused by `suspend()`
pub fn resume() -> Result<(), AudioError> {
    ENGINE.resume()
}

/// Poll level readings; call at display rate
pub fn update() {
    ENGINE.update()
}

pub fn set_tone_frequency(hz: f32) {
    ENGINE.set_tone_frequency(hz)
}

pub fn set_tone_amplitude(amplitude: f32) {
    ENGINE.set_tone_amplitude(amplitude)
}

pub fn tone_frequency() -> f32 {
    ENGINE.tone_frequency()
}

pub fn tone_amplitude() -> f32 {
    ENGINE.tone_amplitude()
}

/// Register the level delegate; the engine keeps only a weak reference
pub fn set_delegate<D>(delegate: &Arc<D>)
where
    D: LevelMeterDelegate + 'static,
{
    ENGINE.set_delegate(delegate)
}

pub fn engine_state() -> EngineState {
    ENGINE.state()
}

pub fn level_reading() -> LevelReading {
    ENGINE.level_reading()
}

/// Lifecycle telemetry of the shared engine
pub fn telemetry_stream() -> broadcast::Receiver<TelemetryEvent> {
    ENGINE.subscribe_telemetry()
}
