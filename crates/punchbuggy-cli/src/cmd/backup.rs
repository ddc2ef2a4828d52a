use punchbuggy_core::backend::{BackupBackend, BackupOutcome};

use crate::cli::EngineArg;
use crate::context::AppContext;

pub(crate) fn run_backup(
    ctx: &AppContext,
    engine: Option<EngineArg>,
    reason: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let backend = ctx.backend(engine)?;
    let kind = backend.kind();
    match backend.perform_backup(reason) {
        BackupOutcome::Failed(e) => Err(format!("{kind} backup failed: {e}").into()),
        outcome => {
            println!("{kind} backup: {outcome}");
            Ok(())
        }
    }
}
