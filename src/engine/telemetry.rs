//! Lifecycle telemetry published on a broadcast channel.

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Capacity of the telemetry broadcast channel.
pub const TELEMETRY_CHANNEL_CAPACITY: usize = 128;

/// Telemetry event emitted by the engine core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryEvent {
    pub timestamp_ms: u64,
    pub kind: TelemetryEventKind,
    pub detail: Option<String>,
}

/// Types of telemetry events supported by the core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TelemetryEventKind {
    EngineStarted {
        sample_rate: f32,
        buffer_size_in_frames: u32,
    },
    EngineStopped,
    EngineSuspended,
    EngineResumed,
    /// The control FIFO was full; the newest value is held back
    ParameterBackpressure,
    /// Non-fatal condition, e.g. the device picked another sample rate
    Warning,
}

/// Trait representing a monotonic time source used for telemetry timestamps.
pub trait TimeSource: Send + Sync {
    fn now(&self) -> Instant;
}

/// Default time source backed by `Instant::now`.
#[derive(Default)]
pub struct SystemTimeSource {
    _unit: (),
}

impl TimeSource for SystemTimeSource {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Broadcast publisher stamping events relative to its creation.
pub struct Telemetry {
    tx: broadcast::Sender<TelemetryEvent>,
    time_source: Arc<dyn TimeSource>,
    start_instant: Instant,
}

impl Telemetry {
    pub fn new(time_source: Arc<dyn TimeSource>) -> Self {
        let (tx, _) = broadcast::channel(TELEMETRY_CHANNEL_CAPACITY);
        let start_instant = time_source.now();
        Self {
            tx,
            time_source,
            start_instant,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TelemetryEvent> {
        self.tx.subscribe()
    }

    /// Publish an event; dropped silently when nobody is subscribed.
    pub fn publish(&self, kind: TelemetryEventKind, detail: Option<String>) {
        let timestamp_ms = self
            .time_source
            .now()
            .saturating_duration_since(self.start_instant)
            .as_millis() as u64;
        log::debug!("[Telemetry] {:?} {:?}", kind, detail);
        let _ = self.tx.send(TelemetryEvent {
            timestamp_ms,
            kind,
            detail,
        });
    }
}

impl Default for Telemetry {
    fn default() -> Self {
        Self::new(Arc::new(SystemTimeSource::default()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::Duration;

    /// Advances 10ms per reading.
    struct SteppingTimeSource {
        start: Instant,
        offset_ms: AtomicU64,
    }

    impl TimeSource for SteppingTimeSource {
        fn now(&self) -> Instant {
            let offset = self.offset_ms.fetch_add(10, Ordering::SeqCst);
            self.start + Duration::from_millis(offset)
        }
    }

    #[test]
    fn test_events_reach_subscribers_with_timestamps() {
        let telemetry = Telemetry::new(Arc::new(SteppingTimeSource {
            start: Instant::now(),
            offset_ms: AtomicU64::new(0),
        }));
        let mut rx = telemetry.subscribe();

        telemetry.publish(TelemetryEventKind::EngineStopped, None);
        telemetry.publish(TelemetryEventKind::Warning, Some("late".to_string()));

        let first = rx.try_recv().unwrap();
        assert_eq!(first.kind, TelemetryEventKind::EngineStopped);
        assert_eq!(first.timestamp_ms, 10);

        let second = rx.try_recv().unwrap();
        assert_eq!(second.timestamp_ms, 20);
        assert_eq!(second.detail.as_deref(), Some("late"));
    }

    #[test]
    fn test_publish_without_subscribers_is_harmless() {
        let telemetry = Telemetry::default();
        telemetry.publish(TelemetryEventKind::EngineResumed, None);

        let mut rx = telemetry.subscribe();
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_event_serializes() {
        let event = TelemetryEvent {
            timestamp_ms: 5,
            kind: TelemetryEventKind::EngineStarted {
                sample_rate: 48_000.0,
                buffer_size_in_frames: 256,
            },
            detail: None,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("EngineStarted"));
        assert!(json.contains("48000"));
    }
}
