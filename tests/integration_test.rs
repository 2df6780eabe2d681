//! Integration tests for the engine core
//!
//! These tests drive the full engine through its public API against the
//! offline backend, including:
//! - Lifecycle start/suspend/resume/stop
//! - Parameter hand-off to the renderer
//! - Level delivery through update() and the poller
//! - Telemetry and error codes
//!
//! No audio device is required.

use std::io::Write;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use tone_engine::config::AppConfig;
use tone_engine::engine::{
    AudioEngine, EngineState, LevelMeterDelegate, OfflineBackend, OfflineDriver,
    TelemetryEventKind, UpdatePoller,
};
use tone_engine::error::{AudioError, AudioErrorCodes, ErrorCode};

#[derive(Default)]
struct LevelLog {
    input: Mutex<Vec<f32>>,
    output: Mutex<Vec<f32>>,
}

impl LevelMeterDelegate for LevelLog {
    fn input_level_changed(&self, level: f32) {
        self.input.lock().unwrap().push(level);
    }

    fn output_level_changed(&self, level: f32) {
        self.output.lock().unwrap().push(level);
    }
}

fn config() -> AppConfig {
    let mut config = AppConfig::default();
    config.audio.sample_rate = 48_000.0;
    config.audio.output_channels = 1;
    config.audio.buffer_size_in_frames = 480;
    config
}

fn engine_with(config: AppConfig) -> (Arc<AudioEngine>, OfflineDriver) {
    let (backend, driver) = OfflineBackend::new();
    (
        Arc::new(AudioEngine::with_backend(config, Box::new(backend))),
        driver,
    )
}

fn rising_zero_crossings(samples: &[f32]) -> usize {
    samples
        .windows(2)
        .filter(|w| w[0] < 0.0 && w[1] >= 0.0)
        .count()
}

/// Test a full session: start, play, suspend, resume, stop
#[test]
fn test_full_session_lifecycle() {
    let (engine, driver) = engine_with(config());
    let levels = Arc::new(LevelLog::default());
    engine.set_delegate(&levels);
    engine.set_tone_amplitude(0.5);

    engine.start().expect("offline start should succeed");
    assert_eq!(engine.state(), EngineState::Started);

    driver.render(4_800).unwrap();
    driver.feed_input(&[0.25; 960]).unwrap();
    engine.update();
    assert!(engine.output_level() > 0.3);
    assert!(engine.input_level() > 0.1);

    engine.suspend().unwrap();
    let silent = driver.render(960).unwrap();
    assert!(silent.iter().all(|s| *s == 0.0));
    let calls_before = levels.output.lock().unwrap().len();
    engine.update();
    assert_eq!(
        levels.output.lock().unwrap().len(),
        calls_before,
        "no readings while suspended"
    );

    engine.resume().unwrap();
    assert!(driver.render(960).unwrap().iter().any(|s| *s != 0.0));

    engine.stop().unwrap();
    engine.update();
    assert_eq!(engine.output_level(), 0.0);
    assert_eq!(engine.input_level(), 0.0);
    assert_eq!(levels.output.lock().unwrap().last(), Some(&0.0));
    assert_eq!(levels.input.lock().unwrap().last(), Some(&0.0));
}

/// Test that the engine can be restarted after stop with fresh FIFOs
#[test]
fn test_restart_after_stop() {
    let (engine, driver) = engine_with(config());
    for round in 0..3 {
        engine.start().unwrap_or_else(|e| panic!("round {}: {}", round, e));
        engine.set_tone_amplitude(0.3);
        driver.render(960).unwrap();
        engine.update();
        assert!(engine.output_level() > 0.0);
        engine.stop().unwrap();
    }
}

/// Test that frequency changes while running reach the renderer
#[test]
fn test_frequency_change_while_running() {
    let (engine, driver) = engine_with(config());
    engine.set_tone_frequency(500.0);
    engine.set_tone_amplitude(0.8);
    engine.start().unwrap();

    let first = driver.render(48_000).unwrap();
    let crossings = rising_zero_crossings(&first);
    assert!((498..=501).contains(&crossings), "got {}", crossings);

    engine.set_tone_frequency(2_000.0);
    // Let the 20ms glide settle
    driver.render(9_600).unwrap();
    let second = driver.render(48_000).unwrap();
    let crossings = rising_zero_crossings(&second);
    assert!((1_998..=2_001).contains(&crossings), "got {}", crossings);
}

/// Test that amplitude changes glide instead of jumping
#[test]
fn test_amplitude_change_is_smoothed() {
    let (engine, driver) = engine_with(config());
    engine.set_tone_frequency(1_000.0);
    engine.start().unwrap();

    engine.set_tone_amplitude(1.0);
    let samples = driver.render(480).unwrap();
    let early_peak = samples[..48]
        .iter()
        .fold(0.0_f32, |p, s| p.max(s.abs()));
    assert!(early_peak < 0.2, "early peak {}", early_peak);
}

/// Test that a poller thread drives update() while audio renders elsewhere
#[test]
fn test_poller_delivers_levels() {
    let (engine, driver) = engine_with(config());
    let levels = Arc::new(LevelLog::default());
    engine.set_delegate(&levels);
    engine.set_tone_amplitude(0.6);
    engine.start().unwrap();

    let polled = Arc::clone(&engine);
    let mut poller =
        UpdatePoller::spawn(Duration::from_millis(5), move || polled.update()).unwrap();

    let deadline = Instant::now() + Duration::from_secs(5);
    while levels.output.lock().unwrap().is_empty() && Instant::now() < deadline {
        driver.render(480).unwrap();
        thread::sleep(Duration::from_millis(2));
    }
    poller.stop();

    let output = levels.output.lock().unwrap();
    assert!(!output.is_empty(), "poller never delivered a level");
    assert!(output.iter().all(|l| (0.0..=1.0).contains(l)));
}

/// Test telemetry delivery to an async subscriber
#[test]
fn test_telemetry_stream() {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("failed to build test runtime");

    let (engine, _driver) = engine_with(config());
    let mut rx = engine.subscribe_telemetry();

    engine.start().unwrap();
    engine.stop().unwrap();

    runtime.block_on(async move {
        let started = rx.recv().await.unwrap();
        assert!(matches!(
            started.kind,
            TelemetryEventKind::EngineStarted {
                buffer_size_in_frames: 480,
                ..
            }
        ));
        let stopped = rx.recv().await.unwrap();
        assert_eq!(stopped.kind, TelemetryEventKind::EngineStopped);
        assert!(stopped.timestamp_ms >= started.timestamp_ms);
    });
}

/// Test that configuration loaded from disk reaches the backend
#[test]
fn test_config_file_drives_stream_format() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{ "audio": {{ "sample_rate": 22050.0, "output_channels": 2, "buffer_size_in_frames": 64 }} }}"#
    )
    .unwrap();

    let (engine, driver) = engine_with(AppConfig::load_from_file(file.path()));
    engine.start().unwrap();

    let format = engine.stream_format().unwrap();
    assert_eq!(format.sample_rate, 22_050.0);
    assert_eq!(format.output_channels, 2);
    assert_eq!(format.buffer_size_in_frames, 64);
    assert_eq!(driver.render(100).unwrap().len(), 200);
}

/// Test error propagation and typed error codes
#[test]
fn test_error_codes_across_api() {
    let (engine, _driver) = engine_with(config());

    let err = engine.suspend().unwrap_err();
    assert_eq!(err, AudioError::NotRunning);
    assert_eq!(err.code(), AudioErrorCodes::NOT_RUNNING);

    engine.start().unwrap();
    let err = engine.start().unwrap_err();
    assert_eq!(err.code(), AudioErrorCodes::ALREADY_RUNNING);

    engine.suspend().unwrap();
    let err = engine.suspend().unwrap_err();
    assert_eq!(err.code(), AudioErrorCodes::INVALID_TRANSITION);
    assert!(err.to_string().contains("code 1003"));
}
