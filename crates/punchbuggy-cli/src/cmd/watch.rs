use std::time::{Duration, Instant};

use punchbuggy_core::backend::BackupBackend;

use crate::context::AppContext;
use crate::signal::{install_signal_handlers, shutdown_requested};

const SLICE: Duration = Duration::from_millis(100);

/// Poll the stored game and let both engines schedule a backup whenever it
/// changes. A pending backup is flushed on shutdown.
pub(crate) fn run_watch(ctx: &AppContext, interval_ms: u64) -> Result<(), Box<dyn std::error::Error>> {
    install_signal_handlers();
    let interval = Duration::from_millis(interval_ms.max(100));
    let backends = ctx.backends();

    let mut last = ctx.states.fingerprint()?;
    tracing::info!(interval_ms = interval.as_millis() as u64, "watching game state");
    eprintln!("Watching for changes. Press Ctrl-C to stop.");

    while !shutdown_requested() {
        let next = Instant::now() + interval;
        while Instant::now() < next && !shutdown_requested() {
            std::thread::sleep(SLICE);
        }
        if shutdown_requested() {
            break;
        }

        let current = match ctx.states.fingerprint() {
            Ok(current) => current,
            Err(e) => {
                tracing::warn!(error = %e, "unable to read game state");
                continue;
            }
        };
        if current != last {
            tracing::debug!("game state changed");
            for backend in &backends {
                backend.handle_store_save("state-change");
            }
            last = current;
        }
    }

    eprintln!("Shutting down.");
    for backend in &backends {
        if let Some(outcome) = backend.flush_pending() {
            tracing::info!(engine = %backend.kind(), %outcome, "flushed pending backup");
        }
    }
    Ok(())
}
