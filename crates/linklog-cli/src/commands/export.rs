use std::path::Path;

use chrono::Utc;
use linklog_core::export::{render_csv_export, suggested_export_file_name};

use crate::commands::common::Context;
use crate::error::CliError;

/// Write queued records as CSV to `output_path` (a file, or a directory to
/// receive a timestamped file), or to stdout.
pub fn run_export(output_path: Option<&Path>, context: &Context) -> Result<(), CliError> {
    let engine = context.open_engine()?;
    let records = engine
        .queue
        .snapshot()?
        .into_iter()
        .map(|item| item.record)
        .collect::<Vec<_>>();
    let rendered = render_csv_export(&records);

    match output_path {
        Some(path) => {
            let path = if path.is_dir() {
                path.join(suggested_export_file_name(Utc::now()))
            } else {
                path.to_path_buf()
            };
            std::fs::write(&path, rendered)?;
            println!("{}", path.display());
        }
        None => print!("{rendered}"),
    }

    Ok(())
}
