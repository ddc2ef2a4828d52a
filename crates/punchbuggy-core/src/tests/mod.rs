mod app_state;
mod auto_backup;
mod import;
