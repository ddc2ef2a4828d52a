use std::path::PathBuf;

use punchbuggy_core::config::expand_tilde;
use punchbuggy_core::export::export_state;
use punchbuggy_core::import::read_import_file;
use punchbuggy_types::error::PunchError;

use crate::context::AppContext;

/// Write a timestamped backup file into the export directory.
pub(crate) fn run_download(ctx: &AppContext) -> Result<(), Box<dyn std::error::Error>> {
    let path = ctx.auto.manual_backup()?;
    println!("Backup written to: {}", path.display());
    Ok(())
}

pub(crate) fn run_export(
    ctx: &AppContext,
    dest: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let state = ctx.states.load()?.ok_or(PunchError::NoState)?;
    let dir = match dest {
        Some(d) => PathBuf::from(expand_tilde(d)),
        None => ctx.config.export_dir()?,
    };
    let path = export_state(&dir, &state, ctx.clock.as_ref())?;
    println!("Game exported to: {}", path.display());
    Ok(())
}

/// Replace the current game with an imported one and back it up.
pub(crate) fn run_import(ctx: &AppContext, file: &str) -> Result<(), Box<dyn std::error::Error>> {
    let path = PathBuf::from(expand_tilde(file));
    let state = read_import_file(&path)?;
    ctx.states.save(&state)?;
    println!(
        "Imported round {} ({} rounds played, {} history entries).",
        state.round,
        state.round_winners.len(),
        state.history.len()
    );
    ctx.state_saved("import");
    Ok(())
}
