//! `watch`: follow the registry live until Ctrl-C or connection loss.

use std::sync::Arc;

use chrono::Local;
use secrecy::SecretString;
use tracing::{debug, info};

use phimon_core::{Controller, EnginePhase, SensorRecord};

use crate::cli::{OutputFormat, WatchArgs};
use crate::error::{CliError, connect_error};

use super::{Context, require_session, sensors};

pub async fn handle(controller: &Controller, args: WatchArgs, ctx: &Context) -> Result<(), CliError> {
    match args.address {
        Some(address) => {
            let port = args.port.unwrap_or(ctx.server.port);
            let password = args.password.map(SecretString::from);
            controller
                .connect(&address, port, password.as_ref())
                .await
                .map_err(connect_error(&address, port))?;
        }
        None => require_session(controller).await?,
    }

    let result = follow(controller, ctx).await;
    controller.stop().await;
    result
}

async fn follow(controller: &Controller, ctx: &Context) -> Result<(), CliError> {
    let server = controller
        .server()
        .map(|s| s.to_string())
        .unwrap_or_default();
    info!(server = %server, "watching sensors");

    let mut sensors = controller.sensors();
    let mut phase = controller.watch_phase();
    render(&sensors.latest(), &server, ctx)?;

    loop {
        tokio::select! {
            biased;
            _ = tokio::signal::ctrl_c() => {
                debug!("interrupted");
                return Ok(());
            }
            changed = phase.changed() => {
                if changed.is_err() || *phase.borrow_and_update() != EnginePhase::Connected {
                    return Err(CliError::ConnectionLost {
                        server,
                        message: controller
                            .last_error()
                            .unwrap_or_else(|| "server reports no hardware link".into()),
                    });
                }
            }
            snapshot = sensors.changed() => {
                let Some(snapshot) = snapshot else {
                    return Ok(());
                };
                render(&snapshot, &server, ctx)?;
            }
        }
    }
}

fn render(snapshot: &[Arc<SensorRecord>], server: &str, ctx: &Context) -> Result<(), CliError> {
    if ctx.quiet {
        return Ok(());
    }
    let records: Vec<SensorRecord> = snapshot.iter().map(|r| r.as_ref().clone()).collect();
    match ctx.format {
        OutputFormat::Table => {
            println!(
                "{server}  {}  ({} sensors)",
                Local::now().format("%H:%M:%S"),
                records.len()
            );
            println!("{}", sensors::sensor_table(&records, ctx.color));
        }
        // One JSON document per line so the stream can be piped.
        OutputFormat::Json => {
            let line = serde_json::to_string(&records)
                .map_err(|e| CliError::Other(format!("failed to encode output: {e}")))?;
            println!("{line}");
        }
    }
    Ok(())
}
