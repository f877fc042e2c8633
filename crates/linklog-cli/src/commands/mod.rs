pub mod common;
pub mod completions;
pub mod config;
pub mod export;
pub mod flush;
pub mod run;
pub mod save;
pub mod status;
pub mod test_connection;
