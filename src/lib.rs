// Tone Engine Core - Rust Audio Engine
// Real-time sine tone generation with lock-free parameter and level hand-off

// Module declarations
pub mod api;
pub mod audio;
pub mod config;
pub mod engine;
pub mod error;

// Re-exports for convenience
pub use audio::{LevelReading, StreamFormat, ToneParameters};
pub use config::{AppConfig, EngineOptions};
pub use engine::{AudioEngine, EngineState, LevelMeterDelegate, UpdatePoller};
pub use error::{AudioError, ErrorCode};

#[cfg(target_os = "android")]
use log::info;

/// Initialize Android logging
///
/// Routes `log` and `tracing` records to logcat. Safe to call more than
/// once; later calls are no-ops.
#[cfg(target_os = "android")]
pub fn init_logging() {
    use tracing_subscriber::prelude::*;

    match tracing_android::layer("ToneEngine") {
        Ok(layer) => {
            let _ = tracing_subscriber::registry().with(layer).try_init();
        }
        Err(err) => eprintln!("Failed to create logcat layer: {}", err),
    }
}

/// Initialize desktop logging
///
/// Formats `log` and `tracing` records to stderr, filtered by `RUST_LOG`
/// (default `info`). Safe to call more than once.
#[cfg(not(target_os = "android"))]
pub fn init_logging() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// JNI_OnLoad is called when the native library is loaded by Android
/// This function initializes the Android context required by oboe-rs
#[cfg(target_os = "android")]
#[no_mangle]
pub extern "system" fn JNI_OnLoad(
    vm: jni::JavaVM,
    _reserved: *mut std::ffi::c_void,
) -> jni::sys::jint {
    init_logging();

    info!("JNI_OnLoad called - initializing Android context");

    // SAFETY: This function must be called before any Oboe operations.
    // The JavaVM pointer is guaranteed to be valid by the Android runtime,
    // and no application context is available at load time.
    unsafe {
        ndk_context::initialize_android_context(
            vm.get_java_vm_pointer().cast(),
            std::ptr::null_mut(),
        );
    }

    info!("Android context initialized successfully");

    jni::sys::JNI_VERSION_1_6
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_is_idempotent() {
        init_logging();
        init_logging();
        log::info!("logging initialized twice");
    }
}
