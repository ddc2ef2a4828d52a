pub mod app_state;
pub mod backend;
pub mod cache;
pub mod capability;
pub mod clock;
pub mod config;
pub mod debounce;
pub mod directory;
pub mod export;
pub mod hasher;
pub mod import;
pub mod metadata;
pub mod migrate;
pub mod snapshot;
pub mod source;
pub mod status;
pub mod store;

#[cfg(test)]
mod tests;
#[cfg(test)]
mod testutil;
