//! Trailing-edge debouncer.
//!
//! Each pushed value replaces the pending one and restarts the timer; the
//! sink sees only the latest value once the window has passed without new
//! input. Shutting down flushes whatever is still pending, so the last value
//! is never lost.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};

use crate::error::{Error, Result};

pub struct Debouncer<T> {
    tx: mpsc::UnboundedSender<T>,
    handle: JoinHandle<()>,
}

impl<T: Send + 'static> Debouncer<T> {
    /// Spawn the debounce loop on the current tokio runtime.
    pub fn spawn<F>(window: Duration, mut sink: F) -> Self
    where
        F: FnMut(T) + Send + 'static,
    {
        let (tx, mut rx) = mpsc::unbounded_channel::<T>();
        let handle = tokio::spawn(async move {
            let mut pending: Option<T> = None;
            let timer = time::sleep(window);
            tokio::pin!(timer);

            loop {
                tokio::select! {
                    received = rx.recv() => match received {
                        Some(value) => {
                            pending = Some(value);
                            timer.as_mut().reset(Instant::now() + window);
                        }
                        None => break,
                    },
                    () = &mut timer, if pending.is_some() => {
                        if let Some(value) = pending.take() {
                            sink(value);
                        }
                    }
                }
            }

            if let Some(value) = pending.take() {
                tracing::debug!("flushing pending debounced value on shutdown");
                sink(value);
            }
        });
        Self { tx, handle }
    }

    /// Queue `value`, superseding any pending one. Returns false once the
    /// loop has stopped.
    pub fn push(&self, value: T) -> bool {
        self.tx.send(value).is_ok()
    }

    /// Stop accepting values, flush the pending one, and wait for the sink.
    pub async fn shutdown(self) -> Result<()> {
        drop(self.tx);
        self.handle
            .await
            .map_err(|e| Error::Transport(format!("debounce task failed: {e}")))
    }
}
