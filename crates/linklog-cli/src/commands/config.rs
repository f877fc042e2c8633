use linklog_core::config::{is_http_url, non_blank};
use linklog_core::SinkConfig;
use serde::Serialize;

use crate::cli::ConfigCommands;
use crate::commands::common::Context;
use crate::config::CliConfig;
use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct ConfigView {
    pub config_path: String,
    pub endpoint_url: Option<String>,
    pub token: Option<String>,
    pub request_timeout_secs: Option<u64>,
    pub drain_interval_secs: u64,
}

pub fn run_config(command: ConfigCommands, context: &Context) -> Result<(), CliError> {
    match command {
        ConfigCommands::Init {
            endpoint_url,
            token,
            request_timeout_secs,
            drain_interval_secs,
        } => {
            let config = run_config_init(
                context,
                endpoint_url,
                token,
                request_timeout_secs,
                drain_interval_secs,
            )?;
            println!("Saved config to {}", context.config_path.display());
            if config.sink_config().is_err() {
                println!("Endpoint URL and token are both required before saving records.");
            }
            Ok(())
        }
        ConfigCommands::Show { json } => run_config_show(json, context),
    }
}

pub fn run_config_init(
    context: &Context,
    endpoint_url: Option<String>,
    token: Option<String>,
    request_timeout_secs: Option<u64>,
    drain_interval_secs: Option<u64>,
) -> Result<CliConfig, CliError> {
    let mut config = context.load_config()?;

    if let Some(endpoint_url) = non_blank(endpoint_url) {
        if !is_http_url(&endpoint_url) {
            return Err(CliError::Config(
                "Endpoint URL must include http:// or https://".to_string(),
            ));
        }
        config.endpoint_url = Some(endpoint_url);
    }
    if let Some(token) = non_blank(token) {
        config.token = Some(token);
    }
    for (name, value) in [
        ("request timeout", request_timeout_secs),
        ("drain interval", drain_interval_secs),
    ] {
        if value == Some(0) {
            return Err(CliError::Config(format!(
                "The {name} must be greater than zero"
            )));
        }
    }
    if request_timeout_secs.is_some() {
        config.request_timeout_secs = request_timeout_secs;
    }
    if drain_interval_secs.is_some() {
        config.drain_interval_secs = drain_interval_secs;
    }

    if let (Some(endpoint_url), Some(token)) = (&config.endpoint_url, &config.token) {
        SinkConfig::new(endpoint_url.as_str(), token.as_str())?;
    }

    config.save_to_path(&context.config_path)?;
    Ok(config)
}

pub fn config_view(context: &Context) -> Result<ConfigView, CliError> {
    let config = context.load_config()?;
    let sink = config.sink_config().ok();
    let settings = config.scheduler_config()?;

    Ok(ConfigView {
        config_path: context.config_path.display().to_string(),
        endpoint_url: sink.as_ref().map(|sink| sink.endpoint_url().to_string()),
        token: sink.as_ref().map(|sink| redact_token(sink.token())),
        request_timeout_secs: sink.as_ref().map(|sink| sink.request_timeout().as_secs()),
        drain_interval_secs: settings.drain_interval.as_secs(),
    })
}

pub fn run_config_show(as_json: bool, context: &Context) -> Result<(), CliError> {
    let view = config_view(context)?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&view)?);
        return Ok(());
    }

    println!("Config file:      {}", view.config_path);
    println!(
        "Endpoint URL:     {}",
        view.endpoint_url.as_deref().unwrap_or("(not set)")
    );
    println!(
        "Token:            {}",
        view.token.as_deref().unwrap_or("(not set)")
    );
    if let Some(secs) = view.request_timeout_secs {
        println!("Request timeout:  {secs}s");
    }
    println!("Drain interval:   {}s", view.drain_interval_secs);
    Ok(())
}

/// Keep only the last four characters of a secret.
pub fn redact_token(token: &str) -> String {
    let visible = token.chars().count().saturating_sub(4);
    let tail = token.chars().skip(visible).collect::<String>();
    if visible == 0 {
        "****".to_string()
    } else {
        format!("****{tail}")
    }
}
