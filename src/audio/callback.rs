//! Audio callbacks - the contract between a backend and the code it drives
//!
//! Backends own the device streams and invoke these callbacks on their
//! real-time threads. Implementations must therefore be real-time safe:
//! - No heap allocations during audio processing
//! - No mutex locks (only lock-free queues and atomics)
//! - No blocking I/O or syscalls
//! - Bounded execution time
//!
//! # Architecture
//! ```text
//! AudioEngine::start()
//!   └─> AudioBackend::start(EngineStartContext { input, output })
//!       ├─> InputCallback::prepare() / OutputCallback::prepare()
//!       └─> device streams running                                [real-time threads]
//!           ├─> InputCallback::on_input()   (interleaved capture buffer)
//!           └─> OutputCallback::on_output() (interleaved playback buffer)
//! ```

use serde::{Deserialize, Serialize};

/// Stream format a backend actually opened.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StreamFormat {
    /// Sample rate in Hz
    pub sample_rate: f32,
    /// Input channels; 0 when no input stream is open
    pub input_channels: u16,
    /// Output channels
    pub output_channels: u16,
    /// Nominal callback size in frames; 0 when the device picks its own
    pub buffer_size_in_frames: u32,
}

/// Consumer of captured audio.
pub trait InputCallback: Send + 'static {
    /// Called once with the opened format before the first `on_input`.
    fn prepare(&mut self, _format: &StreamFormat) {}

    /// Process `samples`, interleaved with `num_channels` channels.
    fn on_input(&mut self, num_channels: usize, samples: &[f32]);
}

/// Producer of playback audio.
pub trait OutputCallback: Send + 'static {
    /// Called once with the opened format before the first `on_output`.
    fn prepare(&mut self, _format: &StreamFormat) {}

    /// Fill `samples`, interleaved with `num_channels` channels.
    fn on_output(&mut self, num_channels: usize, samples: &mut [f32]);
}

impl<F> InputCallback for F
where
    F: FnMut(usize, &[f32]) + Send + 'static,
{
    fn on_input(&mut self, num_channels: usize, samples: &[f32]) {
        self(num_channels, samples)
    }
}

impl<F> OutputCallback for F
where
    F: FnMut(usize, &mut [f32]) + Send + 'static,
{
    fn on_output(&mut self, num_channels: usize, samples: &mut [f32]) {
        self(num_channels, samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closures_are_callbacks() {
        let mut output: Box<dyn OutputCallback> = Box::new(|_channels: usize, out: &mut [f32]| {
            out.fill(0.5);
        });
        let mut buffer = [0.0_f32; 4];
        output.on_output(2, &mut buffer);
        assert_eq!(buffer, [0.5; 4]);

        let mut seen = 0usize;
        {
            let mut input = |channels: usize, samples: &[f32]| {
                seen = samples.len() / channels;
            };
            input(2, &[0.0; 8]);
        }
        assert_eq!(seen, 4);
    }

    #[test]
    fn test_default_prepare_is_noop() {
        let format = StreamFormat {
            sample_rate: 48_000.0,
            input_channels: 1,
            output_channels: 2,
            buffer_size_in_frames: 256,
        };
        let mut input: Box<dyn InputCallback> = Box::new(|_: usize, _: &[f32]| {});
        input.prepare(&format);
        input.on_input(1, &[0.1, 0.2]);
    }
}
