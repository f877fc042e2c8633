use linklog_core::SinkConfig;
use tokio::sync::watch;

use crate::commands::common::Context;
use crate::error::CliError;

/// Drain at startup and then periodically until Ctrl-C.
///
/// The config file is re-read before every drain interval so endpoint or
/// token changes apply from the next pass on.
pub async fn run_daemon(context: &Context) -> Result<(), CliError> {
    let config = context.load_config()?;
    let sink = config.sink_config()?;
    let settings = config.scheduler_config()?;

    let engine = context.open_engine()?;
    let (config_tx, config_rx) = watch::channel(sink);
    let scheduler = engine.scheduler(config_rx, settings);

    let reload = {
        let context = context.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(settings.drain_interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                reload_sink_config(&context, &config_tx);
            }
        })
    };

    println!(
        "Draining {} queued write(s) now and every {}s. Press Ctrl-C to stop.",
        engine.queue.len()?,
        settings.drain_interval.as_secs()
    );
    scheduler
        .run(async {
            if let Err(error) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for Ctrl-C: {error}");
            }
        })
        .await;

    reload.abort();
    println!("Stopped with {} queued write(s)", engine.queue.len()?);
    Ok(())
}

fn reload_sink_config(context: &Context, config_tx: &watch::Sender<SinkConfig>) {
    match context.load_config().and_then(|config| config.sink_config()) {
        Ok(sink) => {
            config_tx.send_if_modified(|current| {
                if *current == sink {
                    false
                } else {
                    tracing::info!(endpoint = sink.endpoint_url(), "Reloaded sink configuration");
                    *current = sink;
                    true
                }
            });
        }
        Err(error) => tracing::warn!("Keeping previous sink configuration: {error}"),
    }
}
