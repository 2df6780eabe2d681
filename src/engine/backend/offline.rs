//! Offline backend: no device, frames are pulled on demand.
//!
//! [`OfflineBackend`] plays the device role for the engine while the paired
//! [`OfflineDriver`] plays the role of the hardware clock: every
//! `render()` call runs the output callback in device-sized blocks on the
//! caller's thread. Used by the integration tests and by `tone_cli render`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::audio::{InputCallback, OutputCallback, StreamFormat};
use crate::engine::state::LifecycleOp;
use crate::error::AudioError;

use super::{AudioBackend, EngineStartContext};

#[derive(Default)]
struct OfflineState {
    input: Option<Box<dyn InputCallback>>,
    output: Option<Box<dyn OutputCallback>>,
    format: Option<StreamFormat>,
    playing: bool,
    frames_rendered: u64,
    /// Failures to report on the next matching lifecycle call
    failures: HashMap<LifecycleOp, AudioError>,
}

type Shared = Arc<Mutex<OfflineState>>;

fn lock(shared: &Shared) -> Result<MutexGuard<'_, OfflineState>, AudioError> {
    shared.lock().map_err(|_| AudioError::LockPoisoned {
        component: "OfflineBackend".to_string(),
    })
}

/// Backend half, handed to the engine.
pub struct OfflineBackend {
    shared: Shared,
    sample_rate_override: Option<f32>,
}

impl OfflineBackend {
    /// Create a backend and the driver that pulls audio from it.
    #[allow(clippy::new_ret_no_self)]
    pub fn new() -> (Self, OfflineDriver) {
        let shared: Shared = Arc::default();
        (
            Self {
                shared: Arc::clone(&shared),
                sample_rate_override: None,
            },
            OfflineDriver { shared },
        )
    }

    /// Open at `sample_rate` regardless of the requested rate, the way a
    /// device that cannot honor the request would.
    pub fn with_sample_rate(mut self, sample_rate: f32) -> Self {
        self.sample_rate_override = Some(sample_rate);
        self
    }

    fn take_failure(state: &mut OfflineState, op: LifecycleOp) -> Result<(), AudioError> {
        match state.failures.remove(&op) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl AudioBackend for OfflineBackend {
    fn name(&self) -> &'static str {
        "offline"
    }

    fn start(&mut self, ctx: EngineStartContext) -> Result<StreamFormat, AudioError> {
        let mut state = lock(&self.shared)?;
        Self::take_failure(&mut state, LifecycleOp::Start)?;
        if state.output.is_some() {
            return Err(AudioError::AlreadyRunning);
        }

        let EngineStartContext {
            options,
            input,
            mut output,
        } = ctx;

        let input = input.filter(|_| options.input_channels > 0);
        let format = StreamFormat {
            sample_rate: self.sample_rate_override.unwrap_or(options.sample_rate),
            input_channels: if input.is_some() {
                options.input_channels
            } else {
                0
            },
            output_channels: options.output_channels,
            buffer_size_in_frames: options.buffer_size_in_frames,
        };

        output.prepare(&format);
        let input = input.map(|mut callback| {
            callback.prepare(&format);
            callback
        });

        state.input = input;
        state.output = Some(output);
        state.format = Some(format);
        state.playing = true;
        state.frames_rendered = 0;
        log::debug!("[OfflineBackend] Started: {:?}", format);
        Ok(format)
    }

    fn stop(&mut self) -> Result<(), AudioError> {
        let mut state = lock(&self.shared)?;
        if state.output.is_none() {
            return Err(AudioError::NotRunning);
        }
        // Callbacks are released even when the stop reports a failure.
        state.input = None;
        state.output = None;
        state.playing = false;
        Self::take_failure(&mut state, LifecycleOp::Stop)
    }

    fn suspend(&mut self) -> Result<(), AudioError> {
        let mut state = lock(&self.shared)?;
        Self::take_failure(&mut state, LifecycleOp::Suspend)?;
        if state.output.is_none() {
            return Err(AudioError::NotRunning);
        }
        state.playing = false;
        Ok(())
    }

    fn resume(&mut self) -> Result<(), AudioError> {
        let mut state = lock(&self.shared)?;
        Self::take_failure(&mut state, LifecycleOp::Resume)?;
        if state.output.is_none() {
            return Err(AudioError::NotRunning);
        }
        state.playing = true;
        Ok(())
    }
}

/// Clock half: pulls output and pushes input.
#[derive(Clone)]
pub struct OfflineDriver {
    shared: Shared,
}

impl OfflineDriver {
    /// Render `num_frames` interleaved frames.
    ///
    /// The output callback runs once per `buffer_size_in_frames` block.
    /// Returns silence, without running any callback, while the backend is
    /// suspended or stopped.
    pub fn render(&self, num_frames: usize) -> Result<Vec<f32>, AudioError> {
        let mut state = lock(&self.shared)?;
        let channels = state
            .format
            .map_or(1, |format| format.output_channels.max(1) as usize);
        let block_frames = state
            .format
            .map_or(num_frames, |format| format.buffer_size_in_frames as usize)
            .max(1);

        let mut samples = vec![0.0_f32; num_frames * channels];
        if !state.playing {
            return Ok(samples);
        }

        if let Some(output) = state.output.as_mut() {
            for block in samples.chunks_mut(block_frames * channels) {
                output.on_output(channels, block);
            }
        }
        state.frames_rendered += num_frames as u64;
        Ok(samples)
    }

    /// Deliver interleaved capture samples to the input callback.
    ///
    /// Returns false when nothing consumed them (no input stream, or not
    /// playing).
    pub fn feed_input(&self, samples: &[f32]) -> Result<bool, AudioError> {
        let mut state = lock(&self.shared)?;
        let Some(format) = state.format else {
            return Ok(false);
        };
        if !state.playing {
            return Ok(false);
        }

        let channels = format.input_channels.max(1) as usize;
        let block = (format.buffer_size_in_frames as usize).max(1) * channels;
        match state.input.as_mut() {
            Some(input) => {
                for chunk in samples.chunks(block) {
                    input.on_input(channels, chunk);
                }
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Make the next `op` on the backend fail with `err`.
    pub fn fail_next(&self, op: LifecycleOp, err: AudioError) -> Result<(), AudioError> {
        lock(&self.shared)?.failures.insert(op, err);
        Ok(())
    }

    /// True while callbacks would run.
    pub fn is_playing(&self) -> bool {
        lock(&self.shared).map(|state| state.playing).unwrap_or(false)
    }

    /// True while the backend holds callbacks (started or suspended).
    pub fn is_open(&self) -> bool {
        lock(&self.shared)
            .map(|state| state.output.is_some())
            .unwrap_or(false)
    }

    /// Format of the most recent start.
    pub fn format(&self) -> Option<StreamFormat> {
        lock(&self.shared).ok().and_then(|state| state.format)
    }

    /// Frames rendered since the most recent start.
    pub fn frames_rendered(&self) -> u64 {
        lock(&self.shared)
            .map(|state| state.frames_rendered)
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineOptions;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn options(input_channels: u16) -> EngineOptions {
        EngineOptions {
            sample_rate: 48_000.0,
            input_channels,
            output_channels: 2,
            buffer_size_in_frames: 128,
        }
    }

    fn ones() -> Box<dyn OutputCallback> {
        Box::new(|_: usize, out: &mut [f32]| out.fill(1.0))
    }

    #[test]
    fn test_render_runs_callback_in_blocks() {
        let (mut backend, driver) = OfflineBackend::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        let format = backend
            .start(EngineStartContext {
                options: options(0),
                input: None,
                output: Box::new(move |channels: usize, out: &mut [f32]| {
                    assert_eq!(channels, 2);
                    counter.fetch_add(1, Ordering::SeqCst);
                    out.fill(0.5);
                }),
            })
            .unwrap();
        assert_eq!(format.output_channels, 2);
        assert_eq!(format.input_channels, 0);

        let samples = driver.render(300).unwrap();
        assert_eq!(samples.len(), 600);
        assert!(samples.iter().all(|s| *s == 0.5));
        // 128 + 128 + 44
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(driver.frames_rendered(), 300);
    }

    #[test]
    fn test_suspended_backend_renders_silence() {
        let (mut backend, driver) = OfflineBackend::new();
        backend
            .start(EngineStartContext {
                options: options(0),
                input: None,
                output: ones(),
            })
            .unwrap();

        backend.suspend().unwrap();
        assert!(!driver.is_playing());
        assert!(driver.is_open());
        assert!(driver.render(64).unwrap().iter().all(|s| *s == 0.0));

        backend.resume().unwrap();
        assert!(driver.render(64).unwrap().iter().all(|s| *s == 1.0));

        backend.stop().unwrap();
        assert!(!driver.is_open());
        assert!(driver.render(64).unwrap().iter().all(|s| *s == 0.0));
    }

    #[test]
    fn test_feed_input_reaches_input_callback() {
        let (mut backend, driver) = OfflineBackend::new();
        let received = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&received);

        backend
            .start(EngineStartContext {
                options: options(1),
                input: Some(Box::new(move |_: usize, samples: &[f32]| {
                    counter.fetch_add(samples.len(), Ordering::SeqCst);
                })),
                output: ones(),
            })
            .unwrap();

        assert!(driver.feed_input(&[0.1; 200]).unwrap());
        assert_eq!(received.load(Ordering::SeqCst), 200);
    }

    #[test]
    fn test_sample_rate_override() {
        let (backend, driver) = OfflineBackend::new();
        let mut backend = backend.with_sample_rate(22_050.0);
        let format = backend
            .start(EngineStartContext {
                options: options(0),
                input: None,
                output: ones(),
            })
            .unwrap();
        assert_eq!(format.sample_rate, 22_050.0);
        assert_eq!(driver.format(), Some(format));
    }

    #[test]
    fn test_injected_failure_fires_once() {
        let (mut backend, driver) = OfflineBackend::new();
        driver
            .fail_next(
                LifecycleOp::Start,
                AudioError::StreamOpenFailed {
                    reason: "unplugged".to_string(),
                },
            )
            .unwrap();

        let ctx = || EngineStartContext {
            options: options(0),
            input: None,
            output: ones(),
        };
        assert!(matches!(
            backend.start(ctx()),
            Err(AudioError::StreamOpenFailed { .. })
        ));
        assert!(!driver.is_open());
        assert!(backend.start(ctx()).is_ok());
    }

    #[test]
    fn test_failed_stop_releases_callbacks() {
        let (mut backend, driver) = OfflineBackend::new();
        let ctx = || EngineStartContext {
            options: options(0),
            input: None,
            output: ones(),
        };
        backend.start(ctx()).unwrap();
        driver
            .fail_next(
                LifecycleOp::Stop,
                AudioError::HardwareError {
                    details: "close failed".to_string(),
                },
            )
            .unwrap();

        assert!(matches!(
            backend.stop(),
            Err(AudioError::HardwareError { .. })
        ));
        assert!(!driver.is_open());
        assert!(backend.start(ctx()).is_ok());
    }
}
