use linklog_core::HttpUpsertClient;

use crate::commands::common::Context;
use crate::error::CliError;

pub async fn run_test_connection(context: &Context) -> Result<(), CliError> {
    let sink = context.load_config()?.sink_config()?;

    HttpUpsertClient::new()?.test_connection(&sink).await?;
    println!("Connected to {}", sink.endpoint_url());
    Ok(())
}
