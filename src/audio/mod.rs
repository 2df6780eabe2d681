// Audio module - real-time tone generation, metering, and lock-free messaging

pub mod callback;
pub mod fifo;
pub mod messages;
pub mod meter;
pub mod smoothing;
pub mod synth;

// Re-export commonly used types for convenience
pub use callback::{InputCallback, OutputCallback, StreamFormat};
pub use fifo::{Fifo, FifoConsumer, FifoProducer};
pub use messages::{ControlMessage, LevelReading, MeterMessage, ToneParameters};
pub use meter::{buffer_peak, PeakMeter};
pub use smoothing::OnePoleSmoother;
pub use synth::{frequency_ceiling, InputMeter, SineSynth, SynthChannels, SynthParts, ToneRenderer};
