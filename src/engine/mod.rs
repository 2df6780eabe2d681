//! Engine module housing the audio core.
//!
//! This module exposes the lifecycle state machine (`state`), trait-based
//! backends (`backend`), the `AudioEngine` orchestration layer (`core`),
//! lifecycle telemetry, and the `update()` poller.

pub mod backend;
pub mod core;
pub mod poller;
pub mod state;
pub mod telemetry;

#[cfg(target_os = "android")]
pub use backend::OboeBackend;
#[cfg(not(target_os = "android"))]
pub use backend::CpalBackend;
pub use backend::{default_backend, AudioBackend, EngineStartContext, OfflineBackend, OfflineDriver};
pub use core::{AudioEngine, LevelMeterDelegate};
pub use poller::{UpdatePoller, DEFAULT_UPDATE_INTERVAL};
pub use state::{EngineState, LifecycleOp};
pub use telemetry::{SystemTimeSource, TelemetryEvent, TelemetryEventKind, TimeSource};
