//! AudioEngine: lifecycle, parameter hand-off, and level polling.
//!
//! The engine is the non-real-time half of the tone generator. It owns the
//! backend and the UI-side FIFO ends; the audio callbacks built by
//! [`SineSynth`] own the other ends.
//!
//! Lock order: `lifecycle` -> `params` -> `meters`. None of them is ever
//! taken on an audio thread, and the delegate is always called with every
//! lock released.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, Weak};

use tokio::sync::broadcast;

use crate::audio::{
    frequency_ceiling, ControlMessage, FifoConsumer, FifoProducer, InputCallback, LevelReading,
    MeterMessage, SineSynth, StreamFormat, ToneParameters,
};
use crate::config::AppConfig;
use crate::engine::backend::{default_backend, AudioBackend, EngineStartContext};
use crate::engine::state::{EngineState, LifecycleOp};
use crate::engine::telemetry::{Telemetry, TelemetryEvent, TelemetryEventKind, TimeSource};
use crate::error::{log_audio_error, AudioError, ErrorCode};

/// Receiver of level changes, called from [`AudioEngine::update`].
///
/// The engine holds the delegate weakly; dropping the last `Arc` silently
/// unregisters it.
pub trait LevelMeterDelegate: Send + Sync {
    fn input_level_changed(&self, level: f32);
    fn output_level_changed(&self, level: f32);
}

struct Lifecycle {
    state: EngineState,
    backend: Box<dyn AudioBackend>,
    format: Option<StreamFormat>,
}

/// UI side of the control FIFO.
struct ParameterLink {
    targets: ToneParameters,
    control: Option<FifoProducer<ControlMessage>>,
    pending_frequency: Option<f32>,
    pending_amplitude: Option<f32>,
    /// True from the first rejected push until every pending value is sent
    backpressure: bool,
    frequency_limit: f32,
}

/// UI side of the meter FIFOs.
struct MeterLink {
    output: Option<FifoConsumer<MeterMessage>>,
    input: Option<FifoConsumer<MeterMessage>>,
    /// Set by stop(); the next update() reports zero levels
    reset_pending: bool,
}

pub struct AudioEngine {
    config: AppConfig,
    lifecycle: Mutex<Lifecycle>,
    params: Mutex<ParameterLink>,
    meters: Mutex<MeterLink>,
    input_level: AtomicU32,
    output_level: AtomicU32,
    delegate: RwLock<Option<Weak<dyn LevelMeterDelegate>>>,
    telemetry: Telemetry,
}

impl AudioEngine {
    /// Create an engine driving the platform's default device backend.
    pub fn new(config: AppConfig) -> Self {
        Self::with_backend(config, default_backend())
    }

    pub fn with_backend(config: AppConfig, backend: Box<dyn AudioBackend>) -> Self {
        let frequency_limit =
            frequency_ceiling(config.synth.max_frequency_hz, config.audio.sample_rate);
        let targets = ToneParameters {
            frequency: sanitize_frequency(config.synth.initial_frequency_hz, frequency_limit)
                .unwrap_or(0.0),
            amplitude: sanitize_amplitude(config.synth.initial_amplitude).unwrap_or(0.0),
        };

        log::info!(
            "[AudioEngine] Created with {} backend ({} Hz requested)",
            backend.name(),
            config.audio.sample_rate
        );

        Self {
            config,
            lifecycle: Mutex::new(Lifecycle {
                state: EngineState::Stopped,
                backend,
                format: None,
            }),
            params: Mutex::new(ParameterLink {
                targets,
                control: None,
                pending_frequency: None,
                pending_amplitude: None,
                backpressure: false,
                frequency_limit,
            }),
            meters: Mutex::new(MeterLink {
                output: None,
                input: None,
                reset_pending: false,
            }),
            input_level: AtomicU32::new(0.0_f32.to_bits()),
            output_level: AtomicU32::new(0.0_f32.to_bits()),
            delegate: RwLock::new(None),
            telemetry: Telemetry::default(),
        }
    }

    /// Replace the clock used for telemetry timestamps.
    pub fn with_time_source(mut self, time_source: Arc<dyn TimeSource>) -> Self {
        self.telemetry = Telemetry::new(time_source);
        self
    }

    // ========================================================================
    // LIFECYCLE
    // ========================================================================

    /// Open the streams and start producing the tone.
    pub fn start(&self) -> Result<(), AudioError> {
        let mut lifecycle = self.lock_lifecycle()?;
        let next = lifecycle.state.transition(LifecycleOp::Start)?;
        self.config.validate().inspect_err(|err| log_audio_error(err, "start"))?;

        let options = self.config.audio.clone();
        let snapshot = self.lock_params().targets;
        let parts = SineSynth::build(
            snapshot,
            &self.config.synth,
            &self.config.metering,
            options.sample_rate,
        );

        let input = (options.input_channels > 0)
            .then(|| Box::new(parts.input_meter) as Box<dyn InputCallback>);
        let ctx = EngineStartContext {
            options,
            input,
            output: Box::new(parts.renderer),
        };

        let format = lifecycle
            .backend
            .start(ctx)
            .inspect_err(|err| log_audio_error(err, "start"))?;

        let channels = parts.channels;
        {
            let mut params = self.lock_params();
            params.frequency_limit =
                frequency_ceiling(self.config.synth.max_frequency_hz, format.sample_rate);
            params.targets.frequency = params.targets.frequency.min(params.frequency_limit);
            params.pending_frequency = None;
            params.pending_amplitude = None;
            params.backpressure = false;
            params.control = Some(channels.control_producer);

            // Writes that raced with the renderer build.
            if params.targets.frequency != snapshot.frequency {
                params.pending_frequency = Some(params.targets.frequency);
            }
            if params.targets.amplitude != snapshot.amplitude {
                params.pending_amplitude = Some(params.targets.amplitude);
            }
            self.flush_pending(&mut params);
        }
        {
            let mut meters = self.lock_meters();
            meters.output = Some(channels.output_meter_consumer);
            meters.input = (format.input_channels > 0).then_some(channels.input_meter_consumer);
        }

        lifecycle.state = next;
        lifecycle.format = Some(format);
        log::info!(
            "[AudioEngine] Started on {}: {} Hz, {} in / {} out",
            lifecycle.backend.name(),
            format.sample_rate,
            format.input_channels,
            format.output_channels
        );
        self.telemetry.publish(
            TelemetryEventKind::EngineStarted {
                sample_rate: format.sample_rate,
                buffer_size_in_frames: format.buffer_size_in_frames,
            },
            None,
        );
        if format.sample_rate != self.config.audio.sample_rate {
            self.telemetry.publish(
                TelemetryEventKind::Warning,
                Some(format!(
                    "requested {} Hz, device opened at {} Hz",
                    self.config.audio.sample_rate, format.sample_rate
                )),
            );
        }
        Ok(())
    }

    /// Close the streams. Always ends Stopped; a backend failure is still
    /// returned.
    pub fn stop(&self) -> Result<(), AudioError> {
        let mut lifecycle = self.lock_lifecycle()?;
        let next = lifecycle.state.transition(LifecycleOp::Stop)?;

        let result = lifecycle
            .backend
            .stop()
            .inspect_err(|err| log_audio_error(err, "stop"));

        {
            let mut params = self.lock_params();
            params.control = None;
            params.pending_frequency = None;
            params.pending_amplitude = None;
            params.backpressure = false;
            params.frequency_limit =
                frequency_ceiling(self.config.synth.max_frequency_hz, self.config.audio.sample_rate);
        }
        {
            let mut meters = self.lock_meters();
            meters.output = None;
            meters.input = None;
            meters.reset_pending = true;
        }

        lifecycle.state = next;
        lifecycle.format = None;
        log::info!("[AudioEngine] Stopped");
        self.telemetry.publish(
            TelemetryEventKind::EngineStopped,
            result.as_ref().err().map(|err| err.message()),
        );
        result
    }

    /// Pause the device streams, keeping them open.
    pub fn suspend(&self) -> Result<(), AudioError> {
        let mut lifecycle = self.lock_lifecycle()?;
        let next = lifecycle.state.transition(LifecycleOp::Suspend)?;

        lifecycle
            .backend
            .suspend()
            .map_err(|err| match err {
                AudioError::SessionDeactivationFailed { .. } => err,
                other => AudioError::SessionDeactivationFailed {
                    reason: other.message(),
                },
            })
            .inspect_err(|err| log_audio_error(err, "suspend"))?;

        lifecycle.state = next;
        log::info!("[AudioEngine] Suspended");
        self.telemetry
            .publish(TelemetryEventKind::EngineSuspended, None);
        Ok(())
    }

    /// Restart streams paused by [`AudioEngine::suspend`].
    pub fn resume(&self) -> Result<(), AudioError> {
        let mut lifecycle = self.lock_lifecycle()?;
        let next = lifecycle.state.transition(LifecycleOp::Resume)?;

        lifecycle
            .backend
            .resume()
            .map_err(|err| match err {
                AudioError::SessionActivationFailed { .. } => err,
                other => AudioError::SessionActivationFailed {
                    reason: other.message(),
                },
            })
            .inspect_err(|err| log_audio_error(err, "resume"))?;

        lifecycle.state = next;
        log::info!("[AudioEngine] Resumed");
        self.telemetry.publish(TelemetryEventKind::EngineResumed, None);
        Ok(())
    }

    // ========================================================================
    // POLLING
    // ========================================================================

    /// Deliver pending level readings to the delegate.
    ///
    /// Call at display rate from any non-real-time thread. Each meter reports
    /// at most once per call, with its newest reading.
    pub fn update(&self) {
        {
            let mut params = self.lock_params();
            self.flush_pending(&mut params);
        }

        let mut input_latest = None;
        let mut output_latest = None;
        {
            let mut meters = self.lock_meters();
            if meters.reset_pending {
                meters.reset_pending = false;
                if self.input_level() != 0.0 {
                    input_latest = Some(0.0);
                }
                if self.output_level() != 0.0 {
                    output_latest = Some(0.0);
                }
            }

            let MeterLink { output, input, .. } = &mut *meters;
            for consumer in [output.as_mut(), input.as_mut()].into_iter().flatten() {
                for message in consumer.drain() {
                    match message {
                        MeterMessage::InputLevel(level) => input_latest = Some(level),
                        MeterMessage::OutputLevel(level) => output_latest = Some(level),
                    }
                }
            }
        }

        if let Some(level) = input_latest {
            self.input_level.store(level.to_bits(), Ordering::Relaxed);
        }
        if let Some(level) = output_latest {
            self.output_level.store(level.to_bits(), Ordering::Relaxed);
        }

        if input_latest.is_none() && output_latest.is_none() {
            return;
        }
        let Some(delegate) = self.current_delegate() else {
            return;
        };
        if let Some(level) = input_latest {
            delegate.input_level_changed(level);
        }
        if let Some(level) = output_latest {
            delegate.output_level_changed(level);
        }
    }

    // ========================================================================
    // PARAMETERS
    // ========================================================================

    /// Set the tone frequency in Hz. Non-finite values are ignored.
    pub fn set_tone_frequency(&self, hz: f32) {
        let mut params = self.lock_params();
        let Some(hz) = sanitize_frequency(hz, params.frequency_limit) else {
            log::warn!("[AudioEngine] Ignoring non-finite frequency {}", hz);
            return;
        };
        params.targets.frequency = hz;
        if params.control.is_some() {
            params.pending_frequency = Some(hz);
            self.flush_pending(&mut params);
        }
    }

    /// Set the tone amplitude in [0, 1]. Non-finite values are ignored.
    pub fn set_tone_amplitude(&self, amplitude: f32) {
        let mut params = self.lock_params();
        let Some(amplitude) = sanitize_amplitude(amplitude) else {
            log::warn!("[AudioEngine] Ignoring non-finite amplitude {}", amplitude);
            return;
        };
        params.targets.amplitude = amplitude;
        if params.control.is_some() {
            params.pending_amplitude = Some(amplitude);
            self.flush_pending(&mut params);
        }
    }

    /// Last requested frequency (after clamping).
    pub fn tone_frequency(&self) -> f32 {
        self.lock_params().targets.frequency
    }

    /// Last requested amplitude (after clamping).
    pub fn tone_amplitude(&self) -> f32 {
        self.lock_params().targets.amplitude
    }

    pub fn tone_parameters(&self) -> ToneParameters {
        self.lock_params().targets
    }

    /// Push held-back values, oldest kind first.
    fn flush_pending(&self, params: &mut ParameterLink) {
        let ParameterLink {
            control,
            pending_frequency,
            pending_amplitude,
            backpressure,
            ..
        } = params;
        let Some(control) = control.as_mut() else {
            return;
        };

        if let Some(hz) = *pending_frequency {
            if control.push(ControlMessage::SetFrequency(hz)).is_ok() {
                *pending_frequency = None;
            }
        }
        if let Some(amplitude) = *pending_amplitude {
            if control.push(ControlMessage::SetAmplitude(amplitude)).is_ok() {
                *pending_amplitude = None;
            }
        }

        let held = pending_frequency.is_some() || pending_amplitude.is_some();
        if held && !*backpressure {
            log::warn!("[AudioEngine] Control FIFO full, holding parameter change");
            self.telemetry.publish(
                TelemetryEventKind::ParameterBackpressure,
                Some(format!("control FIFO capacity {}", control.capacity())),
            );
        }
        *backpressure = held;
    }

    // ========================================================================
    // DELEGATE & ACCESSORS
    // ========================================================================

    /// Register the level delegate (held weakly), replacing any previous one.
    pub fn set_delegate<D>(&self, delegate: &Arc<D>)
    where
        D: LevelMeterDelegate + 'static,
    {
        let weak = Arc::downgrade(delegate);
        let weak: Weak<dyn LevelMeterDelegate> = weak;
        *self.delegate.write().unwrap_or_else(PoisonError::into_inner) = Some(weak);
    }

    pub fn clear_delegate(&self) {
        *self.delegate.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    fn current_delegate(&self) -> Option<Arc<dyn LevelMeterDelegate>> {
        self.delegate
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .and_then(Weak::upgrade)
    }

    pub fn input_level(&self) -> f32 {
        f32::from_bits(self.input_level.load(Ordering::Relaxed))
    }

    pub fn output_level(&self) -> f32 {
        f32::from_bits(self.output_level.load(Ordering::Relaxed))
    }

    pub fn level_reading(&self) -> LevelReading {
        LevelReading {
            input_level: self.input_level(),
            output_level: self.output_level(),
        }
    }

    /// Current lifecycle state; `Stopped` if the lifecycle lock is poisoned.
    pub fn state(&self) -> EngineState {
        self.lock_lifecycle()
            .map(|lifecycle| lifecycle.state)
            .unwrap_or_default()
    }

    /// Format opened by the backend while started or suspended.
    pub fn stream_format(&self) -> Option<StreamFormat> {
        self.lock_lifecycle()
            .ok()
            .and_then(|lifecycle| lifecycle.format)
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn subscribe_telemetry(&self) -> broadcast::Receiver<TelemetryEvent> {
        self.telemetry.subscribe()
    }

    // ========================================================================
    // LOCKING
    // ========================================================================

    fn lock_lifecycle(&self) -> Result<MutexGuard<'_, Lifecycle>, AudioError> {
        self.lifecycle.lock().map_err(|_| AudioError::LockPoisoned {
            component: "lifecycle".to_string(),
        })
    }

    // Parameter and meter links hold plain values, so a poisoned lock is
    // still consistent.
    fn lock_params(&self) -> MutexGuard<'_, ParameterLink> {
        self.params.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_meters(&self) -> MutexGuard<'_, MeterLink> {
        self.meters.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for AudioEngine {
    fn drop(&mut self) {
        if let Ok(lifecycle) = self.lifecycle.get_mut() {
            if lifecycle.state.is_running() {
                if let Err(err) = lifecycle.backend.stop() {
                    log_audio_error(&err, "drop");
                }
            }
        }
    }
}

fn sanitize_frequency(hz: f32, limit: f32) -> Option<f32> {
    hz.is_finite().then(|| hz.clamp(0.0, limit))
}

fn sanitize_amplitude(amplitude: f32) -> Option<f32> {
    amplitude.is_finite().then(|| amplitude.clamp(0.0, 1.0))
}
