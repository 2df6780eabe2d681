//! Dedicated stream thread for device backends.
//!
//! Device stream handles (cpal, Oboe) are not `Send`, so they are opened,
//! driven, and dropped on one thread. The backend talks to it with
//! request/reply commands over std channels; every command is acknowledged
//! before the caller returns.

use std::sync::mpsc;
use std::thread::{self, JoinHandle};

use crate::audio::StreamFormat;
use crate::error::AudioError;

/// Streams owned by a [`StreamWorker`].
pub(crate) trait StreamSet {
    fn play(&mut self) -> Result<(), AudioError>;
    fn pause(&mut self) -> Result<(), AudioError>;

    /// Called before the streams are dropped.
    fn close(&mut self) -> Result<(), AudioError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
enum StreamCommand {
    Play,
    Pause,
    Shutdown,
}

struct Request {
    command: StreamCommand,
    reply: mpsc::Sender<Result<(), AudioError>>,
}

pub(crate) struct StreamWorker {
    requests: mpsc::Sender<Request>,
    thread: Option<JoinHandle<()>>,
}

impl StreamWorker {
    /// Spawn the stream thread and run `open` on it.
    ///
    /// Returns once the streams are open (not yet playing), or with the
    /// error `open` produced.
    pub fn spawn<S, F>(name: &str, open: F) -> Result<(Self, StreamFormat), AudioError>
    where
        S: StreamSet + 'static,
        F: FnOnce() -> Result<(S, StreamFormat), AudioError> + Send + 'static,
    {
        let (request_tx, request_rx) = mpsc::channel::<Request>();
        let (ready_tx, ready_rx) = mpsc::channel::<Result<StreamFormat, AudioError>>();
        let thread_name = name.to_string();

        let thread = thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || {
                let span = tracing::debug_span!("stream_worker", thread = %thread_name);
                let _entered = span.enter();

                // The spawner blocks on ready_rx, so these sends only fail if it panicked.
                let mut streams = match open() {
                    Ok((streams, format)) => {
                        let _ = ready_tx.send(Ok(format));
                        streams
                    }
                    Err(err) => {
                        tracing::debug!(error = %err, "stream open failed");
                        let _ = ready_tx.send(Err(err));
                        return;
                    }
                };
                tracing::debug!("streams opened");

                while let Ok(Request { command, reply }) = request_rx.recv() {
                    tracing::trace!(?command, "stream command");
                    // A caller that gave up waiting has dropped its reply receiver.
                    let result = match command {
                        StreamCommand::Play => streams.play(),
                        StreamCommand::Pause => streams.pause(),
                        StreamCommand::Shutdown => {
                            let _ = reply.send(streams.close());
                            break;
                        }
                    };
                    let _ = reply.send(result);
                }
                tracing::debug!("stream thread exiting");
                // Streams (and the callbacks they own) are dropped here.
            })
            .map_err(|err| AudioError::StreamFailure {
                reason: format!("failed to spawn stream thread: {}", err),
            })?;

        let opened = ready_rx.recv().unwrap_or_else(|_| {
            Err(AudioError::StreamFailure {
                reason: "stream thread exited before opening streams".to_string(),
            })
        });

        match opened {
            Ok(format) => Ok((
                Self {
                    requests: request_tx,
                    thread: Some(thread),
                },
                format,
            )),
            Err(err) => {
                // The open error is the one worth reporting.
                let _ = thread.join();
                Err(err)
            }
        }
    }

    pub fn play(&self) -> Result<(), AudioError> {
        self.request(StreamCommand::Play)
    }

    pub fn pause(&self) -> Result<(), AudioError> {
        self.request(StreamCommand::Pause)
    }

    /// Close the streams and join the thread.
    pub fn shutdown(mut self) -> Result<(), AudioError> {
        let result = self.request(StreamCommand::Shutdown);
        self.join();
        result
    }

    fn request(&self, command: StreamCommand) -> Result<(), AudioError> {
        let (reply_tx, reply_rx) = mpsc::channel();
        self.requests
            .send(Request {
                command,
                reply: reply_tx,
            })
            .map_err(|_| AudioError::StreamFailure {
                reason: format!("stream thread gone while sending {:?}", command),
            })?;
        reply_rx.recv().map_err(|_| AudioError::StreamFailure {
            reason: format!("stream thread gone while handling {:?}", command),
        })?
    }

    fn join(&mut self) {
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::error!("[StreamWorker] Stream thread panicked");
            }
        }
    }
}

impl Drop for StreamWorker {
    fn drop(&mut self) {
        if self.thread.is_some() {
            // Close errors have nowhere to go from drop.
            let _ = self.request(StreamCommand::Shutdown);
            self.join();
        }
    }
}
