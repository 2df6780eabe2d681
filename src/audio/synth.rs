//! Sine tone synthesizer - the audio-thread half of the engine
//!
//! [`SineSynth::build`] wires three FIFOs and returns both ends:
//! - [`ToneRenderer`] (output callback): drains control messages, renders a
//!   smoothed sine into every output channel, reports the output level
//! - [`InputMeter`] (input callback): reports the input level
//! - [`SynthChannels`]: the UI-side producer/consumers kept by the engine
//!
//! Input and output run on different device threads, so each reports
//! through its own meter FIFO to keep every queue single-producer.

use std::f32::consts::TAU;

use super::callback::{InputCallback, OutputCallback, StreamFormat};
use super::fifo::{Fifo, FifoConsumer, FifoProducer};
use super::messages::{ControlMessage, MeterMessage, ToneParameters};
use super::meter::PeakMeter;
use super::smoothing::OnePoleSmoother;
use crate::config::{MeteringConfig, SynthConfig};

/// Highest frequency the renderer will produce at `sample_rate`.
#[inline]
pub fn frequency_ceiling(max_frequency_hz: f32, sample_rate: f32) -> f32 {
    max_frequency_hz.min(sample_rate * 0.5).max(0.0)
}

/// UI-side ends of the synth FIFOs.
pub struct SynthChannels {
    pub control_producer: FifoProducer<ControlMessage>,
    pub output_meter_consumer: FifoConsumer<MeterMessage>,
    pub input_meter_consumer: FifoConsumer<MeterMessage>,
}

/// Everything produced by [`SineSynth::build`].
pub struct SynthParts {
    pub renderer: ToneRenderer,
    pub input_meter: InputMeter,
    pub channels: SynthChannels,
}

pub struct SineSynth;

impl SineSynth {
    /// Build a renderer/meter pair starting at `initial` with no glide.
    ///
    /// `sample_rate` is provisional; backends call `prepare()` with the
    /// rate they actually opened.
    pub fn build(
        initial: ToneParameters,
        synth: &SynthConfig,
        metering: &MeteringConfig,
        sample_rate: f32,
    ) -> SynthParts {
        let (control_producer, control_consumer) = Fifo::new(synth.control_fifo_capacity);
        let (output_meter_producer, output_meter_consumer) =
            Fifo::new(metering.meter_fifo_capacity);
        let (input_meter_producer, input_meter_consumer) =
            Fifo::new(metering.meter_fifo_capacity);

        let renderer = ToneRenderer::new(
            initial,
            control_consumer,
            output_meter_producer,
            synth,
            metering,
            sample_rate,
        );
        let input_meter = InputMeter::new(input_meter_producer, metering);

        SynthParts {
            renderer,
            input_meter,
            channels: SynthChannels {
                control_producer,
                output_meter_consumer,
                input_meter_consumer,
            },
        }
    }
}

/// Output callback rendering the sine tone.
pub struct ToneRenderer {
    controls: FifoConsumer<ControlMessage>,
    meters: FifoProducer<MeterMessage>,
    frequency: OnePoleSmoother,
    amplitude: OnePoleSmoother,
    meter: PeakMeter,
    /// Normalized phase in [0, 1)
    phase: f32,
    sample_rate: f32,
    smoothing_ms: f32,
    max_frequency_hz: f32,
    frequency_limit: f32,
}

impl ToneRenderer {
    pub fn new(
        initial: ToneParameters,
        controls: FifoConsumer<ControlMessage>,
        meters: FifoProducer<MeterMessage>,
        synth: &SynthConfig,
        metering: &MeteringConfig,
        sample_rate: f32,
    ) -> Self {
        let frequency_limit = frequency_ceiling(synth.max_frequency_hz, sample_rate);
        let smoothing_ms = synth.parameter_smoothing_ms;
        Self {
            controls,
            meters,
            frequency: OnePoleSmoother::new(
                initial.frequency.clamp(0.0, frequency_limit),
                smoothing_ms,
                sample_rate,
            ),
            amplitude: OnePoleSmoother::new(
                initial.amplitude.clamp(0.0, 1.0),
                smoothing_ms,
                sample_rate,
            ),
            meter: PeakMeter::new(metering.attack, metering.release),
            phase: 0.0,
            sample_rate,
            smoothing_ms,
            max_frequency_hz: synth.max_frequency_hz,
            frequency_limit,
        }
    }

    /// Apply every queued control message.
    fn apply_controls(&mut self) {
        while let Some(message) = self.controls.pop() {
            match message {
                ControlMessage::SetFrequency(hz) if hz.is_finite() => {
                    self.frequency
                        .set_target(hz.clamp(0.0, self.frequency_limit));
                }
                ControlMessage::SetAmplitude(gain) if gain.is_finite() => {
                    self.amplitude.set_target(gain.clamp(0.0, 1.0));
                }
                _ => {}
            }
        }
    }

    /// Render one interleaved buffer and report its level.
    pub fn render(&mut self, num_channels: usize, samples: &mut [f32]) {
        self.apply_controls();

        let num_channels = num_channels.max(1);
        let phase_scale = 1.0 / self.sample_rate;

        let mut frames = samples.chunks_exact_mut(num_channels);
        for frame in &mut frames {
            let frequency = self.frequency.next_value();
            let amplitude = self.amplitude.next_value();

            frame.fill((TAU * self.phase).sin() * amplitude);

            self.phase += frequency * phase_scale;
            if self.phase >= 1.0 {
                self.phase -= self.phase.floor();
            }
        }
        frames.into_remainder().fill(0.0);

        let level = self.meter.process_buffer(samples);
        // A full FIFO means the UI is not polling; dropping is fine.
        let _ = self.meters.push(MeterMessage::OutputLevel(level));
    }

    /// Current (smoothed) frequency and amplitude.
    pub fn current_parameters(&self) -> ToneParameters {
        ToneParameters {
            frequency: self.frequency.value(),
            amplitude: self.amplitude.value(),
        }
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }
}

impl OutputCallback for ToneRenderer {
    fn prepare(&mut self, format: &StreamFormat) {
        if format.sample_rate.is_finite() && format.sample_rate > 0.0 {
            self.sample_rate = format.sample_rate;
        }
        self.frequency_limit = frequency_ceiling(self.max_frequency_hz, self.sample_rate);
        self.frequency
            .set_time_constant(self.smoothing_ms, self.sample_rate);
        self.amplitude
            .set_time_constant(self.smoothing_ms, self.sample_rate);
        let frequency = self.frequency.target().min(self.frequency_limit);
        self.frequency.snap_to(frequency);
        self.phase = 0.0;
    }

    fn on_output(&mut self, num_channels: usize, samples: &mut [f32]) {
        self.render(num_channels, samples);
    }
}

/// Input callback measuring the capture level.
pub struct InputMeter {
    meters: FifoProducer<MeterMessage>,
    meter: PeakMeter,
}

impl InputMeter {
    pub fn new(meters: FifoProducer<MeterMessage>, metering: &MeteringConfig) -> Self {
        Self {
            meters,
            meter: PeakMeter::new(metering.attack, metering.release),
        }
    }
}

impl InputCallback for InputMeter {
    fn on_input(&mut self, _num_channels: usize, samples: &[f32]) {
        let level = self.meter.process_buffer(samples);
        let _ = self.meters.push(MeterMessage::InputLevel(level));
    }
}
