use punchbuggy_core::backend::BackupBackend;

use crate::cli::EngineArg;
use crate::context::AppContext;

pub(crate) fn run_restore(
    ctx: &AppContext,
    id: &str,
    engine: Option<EngineArg>,
) -> Result<(), Box<dyn std::error::Error>> {
    let backend = ctx.backend(engine)?;
    let state = backend.restore(id)?;
    println!(
        "Restored {} backup '{id}': round {}, {} {} - {} {}",
        backend.kind(),
        state.round,
        state.players.a.name,
        state.players.a.score,
        state.players.b.name,
        state.players.b.score,
    );
    Ok(())
}
