use linklog_core::{DrainReport, DrainTrigger};
use tokio::sync::watch;

use crate::commands::common::Context;
use crate::error::CliError;

pub async fn run_flush(as_json: bool, context: &Context) -> Result<DrainReport, CliError> {
    let config = context.load_config()?;
    let sink = config.sink_config()?;
    let settings = config.scheduler_config()?;

    let engine = context.open_engine()?;
    let (_config_tx, config_rx) = watch::channel(sink);
    let scheduler = engine.scheduler(config_rx, settings);

    let report = scheduler
        .request_drain(DrainTrigger::Manual)
        .await
        .unwrap_or_default();

    if as_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for line in format_report_lines(&report) {
            println!("{line}");
        }
    }
    Ok(report)
}

pub fn format_report_lines(report: &DrainReport) -> Vec<String> {
    let mut lines = vec![format!(
        "Delivered {}, requeued {}, dropped {}, exhausted {}; {} still queued",
        report.delivered, report.requeued, report.dropped, report.exhausted, report.remaining
    )];
    if report.halted {
        lines.push(format!(
            "Remote rejected the credentials; {} item(s) left for the next pass. Check the token with `linklog test`.",
            report.deferred
        ));
    }
    lines
}
