use comfy_table::Cell;

use punchbuggy_core::backend::BackupBackend;
use punchbuggy_core::clock::iso_timestamp;

use crate::cli::EngineArg;
use crate::context::AppContext;
use crate::table::CliTableTheme;

pub(crate) fn run_list(
    ctx: &AppContext,
    engine: Option<EngineArg>,
) -> Result<(), Box<dyn std::error::Error>> {
    let backends = match engine {
        Some(_) => vec![ctx.backend(engine)?],
        None => ctx
            .backends()
            .into_iter()
            .filter(|b| b.capability().is_supported())
            .collect(),
    };

    let theme = CliTableTheme::detect();
    let mut table = theme.new_data_table(&["Engine", "ID", "Saved", "Version"]);
    let mut rows = 0;
    for backend in &backends {
        let listings = match backend.list_backups() {
            Ok(listings) => listings,
            // Listing every engine; an unconnected folder simply has nothing
            Err(e) if engine.is_none() => {
                tracing::debug!(engine = %backend.kind(), error = %e, "skipping engine");
                continue;
            }
            Err(e) => return Err(e.into()),
        };
        for listing in listings {
            table.add_row(vec![
                Cell::new(backend.kind()),
                Cell::new(listing.id),
                Cell::new(
                    listing
                        .saved_at
                        .map(|at| iso_timestamp(&at))
                        .unwrap_or_else(|| "-".to_string()),
                ),
                Cell::new(listing.app_version),
            ]);
            rows += 1;
        }
    }

    if rows == 0 {
        println!("No backups found.");
    } else {
        println!("{table}");
    }
    Ok(())
}
