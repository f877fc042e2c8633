use linklog_core::RetryPolicy;
use serde::Serialize;

use crate::commands::common::{
    format_index_lines, format_queue_lines, index_entry_to_list_item, queue_item_to_list_item,
    Context, IndexListItem, QueueListItem,
};
use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub state_path: String,
    pub config_path: String,
    pub endpoint_url: Option<String>,
    pub configured: bool,
    pub queue_depth: usize,
    pub max_retry_count: Option<u32>,
    pub oldest_enqueued_at: Option<String>,
    pub index_size: usize,
}

pub fn collect_status(context: &Context) -> Result<StatusReport, CliError> {
    let engine = context.open_engine()?;
    let items = engine.queue.snapshot()?;
    let sink = context.load_config()?.sink_config().ok();

    Ok(StatusReport {
        state_path: context.state_path.display().to_string(),
        config_path: context.config_path.display().to_string(),
        endpoint_url: sink.as_ref().map(|sink| sink.endpoint_url().to_string()),
        configured: sink.is_some(),
        queue_depth: items.len(),
        max_retry_count: items.iter().map(|item| item.retry_count).max(),
        oldest_enqueued_at: items
            .iter()
            .map(|item| item.enqueued_at)
            .min()
            .map(crate::commands::common::format_timestamp),
        index_size: engine.index.len()?,
    })
}

pub fn run_status(as_json: bool, context: &Context) -> Result<(), CliError> {
    let status = collect_status(context)?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!("State:     {}", status.state_path);
    println!("Config:    {}", status.config_path);
    println!(
        "Endpoint:  {}",
        status.endpoint_url.as_deref().unwrap_or("not configured")
    );
    println!("Indexed:   {} record(s)", status.index_size);
    match (&status.oldest_enqueued_at, status.max_retry_count) {
        (Some(oldest), Some(retries)) => println!(
            "Queued:    {} write(s), oldest {oldest}, most retries {retries}",
            status.queue_depth
        ),
        _ => println!("Queued:    none"),
    }
    Ok(())
}

pub fn list_queue(context: &Context) -> Result<Vec<QueueListItem>, CliError> {
    let engine = context.open_engine()?;
    let policy = RetryPolicy::default();
    Ok(engine
        .queue
        .snapshot()?
        .iter()
        .map(|item| queue_item_to_list_item(item, &policy))
        .collect())
}

pub fn run_queue(as_json: bool, context: &Context) -> Result<(), CliError> {
    let items = list_queue(context)?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&items)?);
    } else if items.is_empty() {
        println!("Queue is empty.");
    } else {
        for line in format_queue_lines(&items) {
            println!("{line}");
        }
    }
    Ok(())
}

pub fn list_index(context: &Context) -> Result<Vec<IndexListItem>, CliError> {
    let engine = context.open_engine()?;
    Ok(engine
        .index
        .entries()?
        .iter()
        .map(|(key, entry)| index_entry_to_list_item(key, entry))
        .collect())
}

pub fn run_index(as_json: bool, context: &Context) -> Result<(), CliError> {
    let items = list_index(context)?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&items)?);
    } else if items.is_empty() {
        println!("No records synced yet.");
    } else {
        for line in format_index_lines(&items) {
            println!("{line}");
        }
    }
    Ok(())
}
