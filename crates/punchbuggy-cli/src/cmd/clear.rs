use punchbuggy_core::backend::BackupBackend;

use crate::context::AppContext;

/// Delete the stored game and every engine's backups.
pub(crate) fn run_clear(ctx: &AppContext) -> Result<(), Box<dyn std::error::Error>> {
    let mut failed = Vec::new();
    if let Err(e) = ctx.states.clear() {
        eprintln!("Error: game: {e}");
        failed.push("game");
    }
    for backend in ctx.backends() {
        if let Err(e) = backend.clear_backup_data() {
            eprintln!("Error: {}: {e}", backend.kind());
            failed.push(backend.kind().as_str());
        }
    }
    if failed.is_empty() {
        println!("Game and backup data cleared.");
        Ok(())
    } else {
        Err(format!("unable to clear: {}", failed.join(", ")).into())
    }
}
