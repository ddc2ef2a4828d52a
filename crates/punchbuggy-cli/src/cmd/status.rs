use comfy_table::Cell;

use punchbuggy_core::backend::BackupBackend;
use punchbuggy_core::clock::iso_timestamp;
use punchbuggy_types::state::ApplicationState;

use crate::context::AppContext;
use crate::table::{add_kv_row, CliTableTheme};

pub(crate) fn run_status(ctx: &AppContext) -> Result<(), Box<dyn std::error::Error>> {
    let theme = CliTableTheme::detect();

    match ctx.states.load()? {
        Some(state) => print_game(&state, theme),
        None => println!("No game in progress."),
    }
    println!();

    let mut table = theme.new_data_table(&["Engine", "Status", "Enabled", "Last backup", "Message"]);
    for backend in ctx.backends() {
        let record = backend.status();
        let last = record
            .last_backup_at
            .or(record.metadata.last_backup_at)
            .map(|at| iso_timestamp(&at))
            .unwrap_or_else(|| "-".to_string());
        let enabled = match (record.enabled, record.pending) {
            (true, true) => "yes (pending)",
            (true, false) => "yes",
            (false, _) => "no",
        };
        table.add_row(vec![
            Cell::new(backend.kind()),
            Cell::new(record.code),
            Cell::new(enabled),
            Cell::new(last),
            Cell::new(record.message),
        ]);
    }
    println!("{table}");

    if let Some(name) = ctx.directory.handle_name() {
        println!("Backup folder: {name}");
    }
    Ok(())
}

fn print_game(state: &ApplicationState, theme: CliTableTheme) {
    let mut table = theme.new_kv_table();
    add_kv_row(&mut table, theme, "Round", state.round);
    for player in [&state.players.a, &state.players.b] {
        add_kv_row(
            &mut table,
            theme,
            &player.name,
            format!("{} (streak {})", player.score, player.streak),
        );
    }
    add_kv_row(&mut table, theme, "Rounds played", state.round_winners.len());
    if let Some(line) = state.history.last() {
        add_kv_row(&mut table, theme, "Last event", line);
    }
    println!("{table}");
}
