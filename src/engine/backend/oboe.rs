//! Oboe-based audio backend for Android
//!
//! Low-latency exclusive streams (AAudio/OpenSL ES) with f32 mono samples,
//! so the reported format always has one output channel and at most one
//! input channel. Both streams are callback driven and live on a
//! [`StreamWorker`] thread.

use oboe::{
    AudioInputCallback, AudioInputStreamSafe, AudioOutputCallback, AudioOutputStreamSafe,
    AudioStream, AudioStreamAsync, AudioStreamBase, AudioStreamBuilder, DataCallbackResult, Input,
    Output, PerformanceMode, SharingMode,
};

use crate::audio::{InputCallback, OutputCallback, StreamFormat};
use crate::error::AudioError;

use super::worker::{StreamSet, StreamWorker};
use super::{AudioBackend, EngineStartContext};

/// Adapts an engine output callback to Oboe's callback trait.
///
/// The device may not honor the requested rate, so `prepare()` runs on the
/// first callback with the rate the stream reports.
struct OboeOutput {
    callback: Box<dyn OutputCallback>,
    format: StreamFormat,
    prepared: bool,
}

impl AudioOutputCallback for OboeOutput {
    type FrameType = (f32, oboe::Mono);

    fn on_audio_ready(
        &mut self,
        stream: &mut dyn AudioOutputStreamSafe,
        frames: &mut [f32],
    ) -> DataCallbackResult {
        if !self.prepared {
            self.format.sample_rate = stream.get_sample_rate() as f32;
            self.callback.prepare(&self.format);
            self.prepared = true;
        }
        self.callback.on_output(1, frames);
        DataCallbackResult::Continue
    }
}

/// Adapts an engine input callback to Oboe's callback trait.
struct OboeInput {
    callback: Box<dyn InputCallback>,
    format: StreamFormat,
    prepared: bool,
}

impl AudioInputCallback for OboeInput {
    type FrameType = (f32, oboe::Mono);

    fn on_audio_ready(
        &mut self,
        stream: &mut dyn AudioInputStreamSafe,
        frames: &[f32],
    ) -> DataCallbackResult {
        if !self.prepared {
            self.format.sample_rate = stream.get_sample_rate() as f32;
            self.callback.prepare(&self.format);
            self.prepared = true;
        }
        self.callback.on_input(1, frames);
        DataCallbackResult::Continue
    }
}

struct OboeStreams {
    input: Option<AudioStreamAsync<Input, OboeInput>>,
    output: AudioStreamAsync<Output, OboeOutput>,
}

impl StreamSet for OboeStreams {
    fn play(&mut self) -> Result<(), AudioError> {
        if let Some(input) = self.input.as_mut() {
            input.start().map_err(|e| AudioError::HardwareError {
                details: format!("Failed to start input stream: {:?}", e),
            })?;
        }
        self.output.start().map_err(|e| AudioError::HardwareError {
            details: format!("Failed to start output stream: {:?}", e),
        })
    }

    fn pause(&mut self) -> Result<(), AudioError> {
        self.output.pause().map_err(|e| AudioError::HardwareError {
            details: format!("Failed to pause output stream: {:?}", e),
        })?;
        // Input streams cannot be paused; stopping keeps them open.
        if let Some(input) = self.input.as_mut() {
            input.stop().map_err(|e| AudioError::HardwareError {
                details: format!("Failed to stop input stream: {:?}", e),
            })?;
        }
        Ok(())
    }

    fn close(&mut self) -> Result<(), AudioError> {
        // Stop output first (master)
        self.output.stop().map_err(|e| AudioError::HardwareError {
            details: format!("Failed to stop output stream: {:?}", e),
        })?;
        if let Some(input) = self.input.as_mut() {
            input.stop().map_err(|e| AudioError::HardwareError {
                details: format!("Failed to stop input stream: {:?}", e),
            })?;
        }
        Ok(())
    }
}

/// Runs on the stream thread.
fn open_streams(ctx: EngineStartContext) -> Result<(OboeStreams, StreamFormat), AudioError> {
    let EngineStartContext {
        options,
        input,
        output,
    } = ctx;

    let requested_rate = options.sample_rate.round() as i32;
    let frames_per_callback = options.buffer_size_in_frames as i32;

    // The output stream decides the rate; input follows it.
    let builder = AudioStreamBuilder::default()
        .set_performance_mode(PerformanceMode::LowLatency)
        .set_sharing_mode(SharingMode::Exclusive)
        .set_direction::<Output>()
        .set_sample_rate(requested_rate)
        .set_channel_count::<oboe::Mono>()
        .set_format::<f32>()
        .set_frames_per_callback(frames_per_callback);

    let mut format = StreamFormat {
        sample_rate: requested_rate as f32,
        input_channels: u16::from(input.is_some() && options.input_channels > 0),
        output_channels: 1,
        buffer_size_in_frames: options.buffer_size_in_frames,
    };

    let output_stream = builder
        .set_callback(OboeOutput {
            callback: output,
            format,
            prepared: false,
        })
        .open_stream()
        .map_err(|e| AudioError::StreamOpenFailed {
            reason: format!("Output stream: {:?}", e),
        })?;

    let actual_rate = output_stream.get_sample_rate();
    if actual_rate != requested_rate {
        log::warn!(
            "[OboeBackend] Requested {} Hz, device opened {} Hz",
            requested_rate,
            actual_rate
        );
    }
    format.sample_rate = actual_rate as f32;

    let input_stream = match input {
        Some(callback) if format.input_channels > 0 => {
            let opened = AudioStreamBuilder::default()
                .set_performance_mode(PerformanceMode::LowLatency)
                .set_sharing_mode(SharingMode::Exclusive)
                .set_direction::<Input>()
                .set_sample_rate(actual_rate)
                .set_channel_count::<oboe::Mono>()
                .set_format::<f32>()
                .set_frames_per_callback(frames_per_callback)
                .set_callback(OboeInput {
                    callback,
                    format,
                    prepared: false,
                })
                .open_stream();
            match opened {
                Ok(stream) => Some(stream),
                Err(e) => {
                    log::warn!("[OboeBackend] Running without input: {:?}", e);
                    format.input_channels = 0;
                    None
                }
            }
        }
        _ => None,
    };

    log::info!(
        "[OboeBackend] Opened streams: {} Hz, {} in / 1 out, buffer {}",
        format.sample_rate,
        format.input_channels,
        format.buffer_size_in_frames
    );

    Ok((
        OboeStreams {
            input: input_stream,
            output: output_stream,
        },
        format,
    ))
}

/// Android backend that drives Oboe streams.
#[derive(Default)]
pub struct OboeBackend {
    worker: Option<StreamWorker>,
}

impl OboeBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AudioBackend for OboeBackend {
    fn name(&self) -> &'static str {
        "oboe"
    }

    fn start(&mut self, ctx: EngineStartContext) -> Result<StreamFormat, AudioError> {
        if self.worker.is_some() {
            return Err(AudioError::AlreadyRunning);
        }

        let (worker, format) = StreamWorker::spawn("tone-engine-oboe", move || open_streams(ctx))?;
        worker.play()?;
        self.worker = Some(worker);
        Ok(format)
    }

    fn stop(&mut self) -> Result<(), AudioError> {
        match self.worker.take() {
            Some(worker) => worker.shutdown(),
            None => Err(AudioError::NotRunning),
        }
    }

    fn suspend(&mut self) -> Result<(), AudioError> {
        self.worker
            .as_ref()
            .ok_or(AudioError::NotRunning)?
            .pause()
    }

    fn resume(&mut self) -> Result<(), AudioError> {
        self.worker
            .as_ref()
            .ok_or(AudioError::NotRunning)?
            .play()
    }
}
