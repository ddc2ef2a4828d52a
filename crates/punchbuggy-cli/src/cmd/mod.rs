pub mod backup;
pub mod clear;
pub mod connect;
pub mod game;
pub mod list;
pub mod migrate;
pub mod restore;
pub mod status;
pub mod toggle;
pub mod transfer;
pub mod watch;
