use punchbuggy_core::backend::BackupBackend;

use crate::context::AppContext;

pub(crate) fn run_toggle(ctx: &AppContext, enabled: bool) -> Result<(), Box<dyn std::error::Error>> {
    if !ctx.auto.capability().is_supported() {
        return Err("automatic backups are not available on this system".into());
    }
    ctx.auto.set_enabled(enabled);
    // Turning backups on schedules one; run it before the process exits
    if let Some(outcome) = ctx.auto.flush_pending() {
        tracing::debug!(%outcome, "flushed backup after toggle");
    }
    let word = if ctx.auto.is_enabled() { "enabled" } else { "disabled" };
    println!("Automatic backups {word}.");
    Ok(())
}
