use crate::cli::Commands;
use crate::cmd;
use crate::context::AppContext;

pub(crate) fn dispatch_command(
    command: &Commands,
    ctx: &AppContext,
) -> Result<(), Box<dyn std::error::Error>> {
    if !matches!(command, Commands::Status | Commands::List { .. }) {
        ctx.follow_status();
    }

    match command {
        // Handled in main before the context is built
        Commands::Config { .. } => Ok(()),
        Commands::Status => cmd::status::run_status(ctx),
        Commands::Connect { path } => cmd::connect::run_connect(ctx, path.as_deref()),
        Commands::Disconnect => cmd::connect::run_disconnect(ctx),
        Commands::Backup { engine, reason } => cmd::backup::run_backup(ctx, *engine, reason),
        Commands::List { engine } => cmd::list::run_list(ctx, *engine),
        Commands::Restore { id, engine } => cmd::restore::run_restore(ctx, id, *engine),
        Commands::Download => cmd::transfer::run_download(ctx),
        Commands::Export { dest } => cmd::transfer::run_export(ctx, dest.as_deref()),
        Commands::Import { file } => cmd::transfer::run_import(ctx, file),
        Commands::Migrate => cmd::migrate::run_migrate(ctx),
        Commands::Enable => cmd::toggle::run_toggle(ctx, true),
        Commands::Disable => cmd::toggle::run_toggle(ctx, false),
        Commands::Score { player, correction } => {
            cmd::game::run_score(ctx, player, *correction)
        }
        Commands::NextRound => cmd::game::run_next_round(ctx),
        Commands::Reset => cmd::game::run_reset(ctx),
        Commands::Clear => cmd::clear::run_clear(ctx),
        Commands::Watch { interval_ms } => cmd::watch::run_watch(ctx, *interval_ms),
    }
}
