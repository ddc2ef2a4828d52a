use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, unbounded, RecvTimeoutError, Sender};

use punchbuggy_types::error::Result;

enum Command {
    Notify(String),
    Cancel,
    Take(Sender<Option<String>>),
    Shutdown,
}

/// Collapses bursts of change notifications into one delayed action.
///
/// A dedicated worker thread owns the deadline. Each `notify` re-arms it with
/// the newest reason; when it expires the action runs once on the worker.
/// Dropping the scheduler stops the worker without waiting for it.
pub struct DebounceScheduler {
    tx: Sender<Command>,
    pending: Arc<AtomicBool>,
    delay: Duration,
}

impl DebounceScheduler {
    pub fn spawn<F>(name: &str, delay: Duration, action: F) -> Result<Self>
    where
        F: Fn(String) + Send + 'static,
    {
        let (tx, rx) = unbounded::<Command>();
        let pending = Arc::new(AtomicBool::new(false));
        let worker_pending = Arc::clone(&pending);
        let label = name.to_string();

        thread::Builder::new()
            .name(format!("{name}-debounce"))
            .spawn(move || {
                let mut armed: Option<(Instant, String)> = None;
                loop {
                    let received = match &armed {
                        Some((deadline, _)) => rx.recv_deadline(*deadline),
                        None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
                    };
                    match received {
                        Ok(Command::Notify(reason)) => {
                            worker_pending.store(true, Ordering::SeqCst);
                            armed = Some((Instant::now() + delay, reason));
                        }
                        Ok(Command::Cancel) => {
                            armed = None;
                            worker_pending.store(false, Ordering::SeqCst);
                        }
                        Ok(Command::Take(reply)) => {
                            let reason = armed.take().map(|(_, reason)| reason);
                            worker_pending.store(false, Ordering::SeqCst);
                            let _ = reply.send(reason);
                        }
                        Ok(Command::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
                        Err(RecvTimeoutError::Timeout) => {
                            if let Some((_, reason)) = armed.take() {
                                worker_pending.store(false, Ordering::SeqCst);
                                tracing::debug!(scheduler = %label, reason = %reason, "debounce fired");
                                if catch_unwind(AssertUnwindSafe(|| action(reason))).is_err() {
                                    tracing::error!(scheduler = %label, "debounced action panicked");
                                }
                            }
                        }
                    }
                }
                tracing::trace!(scheduler = %label, "debounce worker stopped");
            })?;

        Ok(Self { tx, pending, delay })
    }

    /// Cancel any armed deadline and arm a new one for `reason`.
    pub fn notify(&self, reason: &str) {
        self.pending.store(true, Ordering::SeqCst);
        if self.tx.send(Command::Notify(reason.to_string())).is_err() {
            self.pending.store(false, Ordering::SeqCst);
            tracing::warn!("debounce worker is gone, dropping notification");
        }
    }

    pub fn cancel(&self) {
        self.pending.store(false, Ordering::SeqCst);
        let _ = self.tx.send(Command::Cancel);
    }

    /// Disarm and hand back the reason that was waiting, if any.
    pub fn take_pending(&self) -> Option<String> {
        let (reply_tx, reply_rx) = bounded(1);
        if self.tx.send(Command::Take(reply_tx)).is_err() {
            return None;
        }
        reply_rx.recv().ok().flatten()
    }

    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::SeqCst)
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }
}

impl Drop for DebounceScheduler {
    fn drop(&mut self) {
        let _ = self.tx.send(Command::Shutdown);
    }
}
