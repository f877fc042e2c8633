//! Local persistence for LinkLog state

mod connection;
mod migrations;
mod state_store;

pub use connection::Database;
pub use state_store::{load_json, update_json, MemoryStateStore, SqliteStateStore, StateStore};
