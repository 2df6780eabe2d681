//! Fixed-interval ticker driving `update()` from a background thread.
//!
//! Stands in for a display link: platforms without one (the CLI, tests)
//! spawn an `UpdatePoller` that calls the engine at roughly frame rate.

use std::thread::{self, JoinHandle};
use std::time::Duration;

use tokio::sync::oneshot;

use crate::error::AudioError;

/// Default poll interval: two frames at 60 Hz.
pub const DEFAULT_UPDATE_INTERVAL: Duration = Duration::from_millis(33);

pub struct UpdatePoller {
    shutdown: Option<oneshot::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl UpdatePoller {
    /// Call `tick` every `interval` until [`UpdatePoller::stop`] or drop.
    ///
    /// The first tick fires immediately. Missed ticks are skipped rather
    /// than bursted.
    pub fn spawn<F>(interval: Duration, mut tick: F) -> Result<Self, AudioError>
    where
        F: FnMut() + Send + 'static,
    {
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
        let interval = interval.max(Duration::from_millis(1));

        let thread = thread::Builder::new()
            .name("tone-engine-poller".to_string())
            .spawn(move || {
                // Dedicated runtime; callers may not have one.
                let rt = match tokio::runtime::Builder::new_current_thread()
                    .enable_time()
                    .build()
                {
                    Ok(rt) => rt,
                    Err(err) => {
                        log::error!("[UpdatePoller] Failed to build runtime: {}", err);
                        return;
                    }
                };

                tracing::debug!(interval_ms = interval.as_millis() as u64, "update poller started");
                rt.block_on(async move {
                    let mut ticker = tokio::time::interval(interval);
                    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
                    loop {
                        tokio::select! {
                            _ = &mut shutdown_rx => break,
                            _ = ticker.tick() => tick(),
                        }
                    }
                });
                tracing::debug!("update poller stopped");
            })
            .map_err(|err| AudioError::StreamFailure {
                reason: format!("failed to spawn poller thread: {}", err),
            })?;

        Ok(Self {
            shutdown: Some(shutdown_tx),
            thread: Some(thread),
        })
    }

    /// Stop ticking and join the thread. No tick runs after this returns.
    pub fn stop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            // Fails only when the thread already exited.
            let _ = shutdown.send(());
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::error!("[UpdatePoller] Poller thread panicked");
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.thread
            .as_ref()
            .is_some_and(|thread| !thread.is_finished())
    }
}

impl Drop for UpdatePoller {
    fn drop(&mut self) {
        self.stop();
    }
}
