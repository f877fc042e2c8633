use std::io::{self, Read};
use std::path::{Path, PathBuf};

use linklog_core::{Record, RecordFields, WriteOutcome};

use crate::commands::common::Context;
use crate::error::CliError;

/// Record fields as given on the command line.
#[derive(Debug, Default)]
pub struct SaveInput {
    pub url: Option<String>,
    pub name: Option<String>,
    pub title: Option<String>,
    pub company: Option<String>,
    pub requested_at: Option<String>,
    pub follow_up: Option<String>,
    pub tag: Option<String>,
    pub notes: Option<String>,
    pub json: Option<PathBuf>,
}

pub async fn run_save(input: SaveInput, context: &Context) -> Result<WriteOutcome, CliError> {
    let fields = resolve_fields(input)?;
    let record = Record::new(fields)?;
    let sink = context.load_config()?.sink_config()?;

    // No scheduler here: a one-shot save exits right after the write, so a
    // write-failure drain is left to `linklog run` or `linklog flush`.
    let engine = context.open_engine()?;
    let key = record.key().clone();
    let outcome = engine.coordinator().write(&sink, record).await?;

    if outcome.success {
        match &outcome.remote_id {
            Some(row) => println!("Saved {key} ({}, row {row})", outcome.mode),
            None => println!("Saved {key} ({})", outcome.mode),
        }
        return Ok(outcome);
    }

    let message = outcome.error.clone().unwrap_or_default();
    if outcome.queued {
        let pending = engine.queue.len()?;
        println!("Remote unavailable: {message}");
        println!(
            "Queued {key} for retry ({pending} pending). A running `linklog run` picks it up; `linklog flush` retries now."
        );
        return Ok(outcome);
    }

    match outcome.error_kind {
        Some(kind) => Err(CliError::WriteRejected { kind, message }),
        None => Ok(outcome),
    }
}

pub fn resolve_fields(input: SaveInput) -> Result<RecordFields, CliError> {
    if let Some(path) = input.json {
        return read_fields_json(&path);
    }

    Ok(RecordFields {
        name: input.name.unwrap_or_default(),
        title: input.title.unwrap_or_default(),
        company: input.company.unwrap_or_default(),
        profile_url: input.url.unwrap_or_default(),
        requested_at: input.requested_at.unwrap_or_default(),
        follow_up_date: input.follow_up.unwrap_or_default(),
        tag: input.tag.unwrap_or_default(),
        notes: input.notes.unwrap_or_default(),
    })
}

fn read_fields_json(path: &Path) -> Result<RecordFields, CliError> {
    let raw = if path == Path::new("-") {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        buffer
    } else {
        std::fs::read_to_string(path)?
    };
    Ok(serde_json::from_str(&raw)?)
}
