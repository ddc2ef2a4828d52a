use std::path::PathBuf;

use punchbuggy_core::backend::BackupBackend;
use punchbuggy_core::config::expand_tilde;

use crate::context::AppContext;

pub(crate) fn run_connect(
    ctx: &AppContext,
    path: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(path) = path {
        ctx.set_preset_directory(PathBuf::from(expand_tilde(path)));
    }

    match ctx.directory.choose_directory()? {
        None => println!("Folder selection cancelled."),
        Some(outcome) => {
            let name = ctx.directory.handle_name().unwrap_or_default();
            println!("Connected to {name}. Initial backup: {outcome}");
        }
    }
    Ok(())
}

pub(crate) fn run_disconnect(ctx: &AppContext) -> Result<(), Box<dyn std::error::Error>> {
    ctx.directory.clear_backup_data()?;
    println!("Backup folder disconnected.");
    Ok(())
}
