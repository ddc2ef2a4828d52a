use punchbuggy_core::migrate::{migrate_if_needed, MigrationOutcome};

use crate::context::AppContext;

pub(crate) fn run_migrate(ctx: &AppContext) -> Result<(), Box<dyn std::error::Error>> {
    match migrate_if_needed(ctx.states.storage(), ctx.clock.as_ref())? {
        MigrationOutcome::Migrated { backup_key } => {
            match backup_key {
                Some(key) => println!("Game upgraded. Original kept as {key}."),
                None => println!("Game upgraded. The original could not be kept."),
            }
            ctx.state_saved("migration");
        }
        MigrationOutcome::AlreadyCurrent => println!("Game is already up to date."),
        MigrationOutcome::NoState => println!("No game to upgrade."),
        MigrationOutcome::InvalidJson => {
            return Err("stored game is not valid JSON; it was left untouched".into());
        }
    }
    Ok(())
}
