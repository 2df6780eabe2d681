//! Backend abstractions for the engine core.
//!
//! A backend owns the device streams and drives the callbacks it is handed
//! in [`EngineStartContext`]. The engine core only sees the trait, so the
//! same lifecycle code runs against cpal, Oboe, or the offline renderer.

use crate::audio::{InputCallback, OutputCallback, StreamFormat};
use crate::config::EngineOptions;
use crate::error::AudioError;

/// Context provided to audio backends when starting the engine.
///
/// The callbacks move onto the backend's real-time threads and are dropped
/// there when the streams close.
pub struct EngineStartContext {
    pub options: EngineOptions,
    /// `None` when `options.input_channels == 0`
    pub input: Option<Box<dyn InputCallback>>,
    pub output: Box<dyn OutputCallback>,
}

/// Trait implemented by platform-specific audio backends.
///
/// The engine serializes every call, so implementations only need to be
/// `Send`. Lifecycle ordering is enforced by the engine; backends only
/// report what the device did.
pub trait AudioBackend: Send {
    /// Short identifier used in logs.
    fn name(&self) -> &'static str;

    /// Open and start the streams, returning the format actually opened.
    ///
    /// Implementations call `prepare()` on both callbacks with that format
    /// before the first buffer is processed.
    fn start(&mut self, ctx: EngineStartContext) -> Result<StreamFormat, AudioError>;

    /// Stop and close the streams, dropping the callbacks.
    fn stop(&mut self) -> Result<(), AudioError>;

    /// Pause the streams without closing them.
    fn suspend(&mut self) -> Result<(), AudioError>;

    /// Restart streams paused by [`AudioBackend::suspend`].
    fn resume(&mut self) -> Result<(), AudioError>;
}

mod offline;
pub use offline::{OfflineBackend, OfflineDriver};

#[cfg(target_os = "android")]
mod oboe;
#[cfg(target_os = "android")]
pub use oboe::OboeBackend;

#[cfg(not(target_os = "android"))]
mod cpal;
#[cfg(not(target_os = "android"))]
pub use cpal::CpalBackend;

mod worker;

cfg_if::cfg_if! {
    if #[cfg(target_os = "android")] {
        /// Device backend for the current platform.
        pub fn default_backend() -> Box<dyn AudioBackend> {
            Box::new(OboeBackend::new())
        }
    } else {
        /// Device backend for the current platform.
        pub fn default_backend() -> Box<dyn AudioBackend> {
            Box::new(CpalBackend::new())
        }
    }
}
