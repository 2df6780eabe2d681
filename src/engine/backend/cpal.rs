//! CPAL-based audio backend for desktop platforms (Linux, macOS, Windows)
//!
//! Opens the default output device (and the default input device when input
//! channels are requested) with f32 samples. Streams live on a
//! [`StreamWorker`] thread because `cpal::Stream` is not `Send`.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use crate::audio::{InputCallback, OutputCallback, StreamFormat};
use crate::config::EngineOptions;
use crate::error::{AudioError, ErrorCode};

use super::worker::{StreamSet, StreamWorker};
use super::{AudioBackend, EngineStartContext};

/// CPAL-based audio backend
#[derive(Default)]
pub struct CpalBackend {
    worker: Option<StreamWorker>,
}

impl CpalBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

struct CpalStreams {
    input: Option<cpal::Stream>,
    output: cpal::Stream,
}

impl StreamSet for CpalStreams {
    fn play(&mut self) -> Result<(), AudioError> {
        if let Some(input) = &self.input {
            input.play().map_err(|e| AudioError::HardwareError {
                details: format!("Input start failed: {}", e),
            })?;
        }
        self.output.play().map_err(|e| AudioError::HardwareError {
            details: format!("Output start failed: {}", e),
        })
    }

    fn pause(&mut self) -> Result<(), AudioError> {
        self.output.pause().map_err(|e| AudioError::HardwareError {
            details: format!("Output pause failed: {}", e),
        })?;
        if let Some(input) = &self.input {
            input.pause().map_err(|e| AudioError::HardwareError {
                details: format!("Input pause failed: {}", e),
            })?;
        }
        Ok(())
    }
}

/// Pick an f32 config with the requested channel count and sample rate.
fn select_config<I>(
    ranges: I,
    channels: u16,
    sample_rate: u32,
    buffer_frames: u32,
) -> Option<cpal::StreamConfig>
where
    I: Iterator<Item = cpal::SupportedStreamConfigRange>,
{
    ranges
        .filter(|range| range.sample_format() == cpal::SampleFormat::F32)
        .filter(|range| range.channels() == channels)
        .find(|range| {
            range.min_sample_rate().0 <= sample_rate && sample_rate <= range.max_sample_rate().0
        })
        .map(|range| {
            let buffer_size = fixed_buffer_size(range.buffer_size(), buffer_frames);
            let mut config: cpal::StreamConfig =
                range.with_sample_rate(cpal::SampleRate(sample_rate)).into();
            config.buffer_size = buffer_size;
            config
        })
}

fn fixed_buffer_size(supported: &cpal::SupportedBufferSize, frames: u32) -> cpal::BufferSize {
    match supported {
        cpal::SupportedBufferSize::Range { min, max } if (*min..=*max).contains(&frames) => {
            cpal::BufferSize::Fixed(frames)
        }
        _ => cpal::BufferSize::Default,
    }
}

fn nominal_frames(config: &cpal::StreamConfig) -> u32 {
    match config.buffer_size {
        cpal::BufferSize::Fixed(frames) => frames,
        cpal::BufferSize::Default => 0,
    }
}

fn output_config(
    device: &cpal::Device,
    options: &EngineOptions,
) -> Result<cpal::StreamConfig, AudioError> {
    let sample_rate = options.sample_rate.round() as u32;
    if let Ok(ranges) = device.supported_output_configs() {
        if let Some(config) = select_config(
            ranges,
            options.output_channels,
            sample_rate,
            options.buffer_size_in_frames,
        ) {
            return Ok(config);
        }
    }

    log::warn!(
        "[CpalBackend] No f32 output config for {} ch @ {} Hz, using device default",
        options.output_channels,
        sample_rate
    );
    let default = device
        .default_output_config()
        .map_err(|e| AudioError::StreamOpenFailed {
            reason: format!("Failed to get default output config: {:?}", e),
        })?;
    if default.sample_format() != cpal::SampleFormat::F32 {
        return Err(AudioError::StreamOpenFailed {
            reason: "Only F32 sample format is currently supported for output".to_string(),
        });
    }
    Ok(default.into())
}

fn input_config(
    device: &cpal::Device,
    channels: u16,
    sample_rate: u32,
    buffer_frames: u32,
) -> Result<cpal::StreamConfig, AudioError> {
    let ranges = device
        .supported_input_configs()
        .map_err(|e| AudioError::StreamOpenFailed {
            reason: format!("Failed to query input configs: {:?}", e),
        })?;

    select_config(ranges, channels, sample_rate, buffer_frames)
        .or_else(|| {
            // Any channel count at the output rate; the meter takes every channel.
            device.supported_input_configs().ok().and_then(|ranges| {
                ranges
                    .filter(|range| range.sample_format() == cpal::SampleFormat::F32)
                    .find(|range| {
                        range.min_sample_rate().0 <= sample_rate
                            && sample_rate <= range.max_sample_rate().0
                    })
                    .map(|range| {
                        cpal::StreamConfig::from(
                            range.with_sample_rate(cpal::SampleRate(sample_rate)),
                        )
                    })
            })
        })
        .ok_or_else(|| AudioError::StreamOpenFailed {
            reason: format!("No f32 input config at {} Hz", sample_rate),
        })
}

fn build_output_stream(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut callback: Box<dyn OutputCallback>,
) -> Result<cpal::Stream, AudioError> {
    let channels = config.channels as usize;
    let err_fn = |err| log::error!("[CpalBackend] Output stream error: {}", err);

    device
        .build_output_stream(
            config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                callback.on_output(channels, data);
            },
            err_fn,
            None,
        )
        .map_err(|e| AudioError::StreamOpenFailed {
            reason: format!("Output stream: {:?}", e),
        })
}

fn build_input_stream(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut callback: Box<dyn InputCallback>,
) -> Result<cpal::Stream, AudioError> {
    let channels = config.channels as usize;
    let err_fn = |err| log::error!("[CpalBackend] Input stream error: {}", err);

    device
        .build_input_stream(
            config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                callback.on_input(channels, data);
            },
            err_fn,
            None,
        )
        .map_err(|e| AudioError::StreamOpenFailed {
            reason: format!("Input stream: {:?}", e),
        })
}

/// Drop to output only when the input side failed to open.
fn output_only_on_error<S>(format: &mut StreamFormat, input: Result<S, AudioError>) -> Option<S> {
    match input {
        Ok(stream) => Some(stream),
        Err(err) => {
            log::warn!("[CpalBackend] Running without input: {}", err.message());
            format.input_channels = 0;
            None
        }
    }
}

/// Runs on the stream thread.
fn open_streams(ctx: EngineStartContext) -> Result<(CpalStreams, StreamFormat), AudioError> {
    let EngineStartContext {
        options,
        input,
        mut output,
    } = ctx;

    let host = cpal::default_host();
    let output_device = host
        .default_output_device()
        .ok_or_else(|| AudioError::StreamOpenFailed {
            reason: "No default output device found".to_string(),
        })?;
    let out_config = output_config(&output_device, &options)?;
    let sample_rate = out_config.sample_rate.0;

    // Input is optional: a missing microphone leaves the input meter at zero.
    let input_side = match input {
        Some(callback) if options.input_channels > 0 => {
            let opened = host
                .default_input_device()
                .ok_or_else(|| AudioError::StreamOpenFailed {
                    reason: "No default input device found".to_string(),
                })
                .and_then(|device| {
                    let config = input_config(
                        &device,
                        options.input_channels,
                        sample_rate,
                        options.buffer_size_in_frames,
                    )?;
                    Ok((device, config))
                });
            match opened {
                Ok((device, config)) => Some((device, config, callback)),
                Err(err) => {
                    log::warn!(
                        "[CpalBackend] Running without input: {}",
                        err.message()
                    );
                    None
                }
            }
        }
        _ => None,
    };

    let mut format = StreamFormat {
        sample_rate: sample_rate as f32,
        input_channels: input_side
            .as_ref()
            .map_or(0, |(_, config, _)| config.channels),
        output_channels: out_config.channels,
        buffer_size_in_frames: nominal_frames(&out_config),
    };

    let input_stream = match input_side {
        Some((device, config, mut callback)) => {
            callback.prepare(&format);
            output_only_on_error(&mut format, build_input_stream(&device, &config, callback))
        }
        None => None,
    };

    output.prepare(&format);
    let output_stream = build_output_stream(&output_device, &out_config, output)?;

    log::info!(
        "[CpalBackend] Opened streams: {} Hz, {} in / {} out, buffer {}",
        format.sample_rate,
        format.input_channels,
        format.output_channels,
        format.buffer_size_in_frames
    );

    Ok((
        CpalStreams {
            input: input_stream,
            output: output_stream,
        },
        format,
    ))
}

impl AudioBackend for CpalBackend {
    fn name(&self) -> &'static str {
        "cpal"
    }

    fn start(&mut self, ctx: EngineStartContext) -> Result<StreamFormat, AudioError> {
        if self.worker.is_some() {
            return Err(AudioError::AlreadyRunning);
        }

        let (worker, format) = StreamWorker::spawn("tone-engine-cpal", move || open_streams(ctx))?;
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
