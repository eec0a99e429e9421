//! Connection command handlers: connect, disconnect, status.

use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::Serialize;

use phimon_core::{Controller, EnginePhase};

use crate::cli::ConnectArgs;
use crate::error::{CliError, connect_error};
use crate::output;

use super::{Context, sensors};

// ── connect ─────────────────────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ConnectView {
    server_address: String,
    port: u16,
    message: String,
    sensors: Vec<phimon_core::SensorRecord>,
}

pub async fn connect(controller: &Controller, args: ConnectArgs, ctx: &Context) -> Result<(), CliError> {
    let Some(address) = args.address.or_else(|| ctx.server.address.clone()) else {
        return Err(CliError::Validation {
            field: "address".into(),
            reason: "pass an address or set [server] address in the config file".into(),
        });
    };
    let port = args.port.unwrap_or(ctx.server.port);
    let password = args.password.map(SecretString::from);

    let status = controller
        .connect(&address, port, password.as_ref())
        .await
        .map_err(connect_error(&address, port))?;
    let snapshot = controller.sensors_snapshot();
    controller.stop().await;

    let view = ConnectView {
        server_address: address,
        port,
        message: status.message,
        sensors: snapshot.iter().map(|r| r.as_ref().clone()).collect(),
    };
    let out = output::render_single(ctx.format, &view, |v| {
        let mut text = format!("Connected to {}:{}", v.server_address, v.port);
        if !v.message.is_empty() {
            text.push_str(&format!(" ({})", v.message));
        }
        text.push('\n');
        text.push_str(&sensors::sensor_table(&v.sensors, ctx.color));
        text
    })?;
    output::print_output(&out, ctx.quiet);
    Ok(())
}

// ── disconnect ──────────────────────────────────────────────────────

pub async fn disconnect(controller: &Controller, ctx: &Context) -> Result<(), CliError> {
    let phase = controller.start().await;
    let server = controller.server();
    controller.disconnect().await;

    if !ctx.quiet {
        match (phase, server) {
            (EnginePhase::Connected, Some(server)) => eprintln!("Disconnected from {server}"),
            _ => eprintln!("No active session; local state cleared"),
        }
    }
    Ok(())
}

// ── status ──────────────────────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusView {
    state: String,
    server_address: Option<String>,
    port: Option<u16>,
    session_established: Option<DateTime<Utc>>,
    sensor_count: usize,
    last_update: Option<DateTime<Utc>>,
    last_error: Option<String>,
}

pub async fn status(controller: &Controller, ctx: &Context) -> Result<(), CliError> {
    // The saved record as it was before restore touches it.
    let saved = controller.sessions().load();
    controller.start().await;

    let server = controller.server();
    let view = StatusView {
        state: controller.connection_state().to_string(),
        server_address: server
            .as_ref()
            .map(|s| s.address.clone())
            .or_else(|| saved.as_ref().map(|s| s.server_address.clone())),
        port: server.as_ref().map(|s| s.port).or_else(|| saved.as_ref().map(|s| s.port)),
        session_established: saved.as_ref().map(|s| s.established_at),
        sensor_count: controller.registry().len(),
        last_update: controller.registry().last_update(),
        last_error: controller.last_error(),
    };
    controller.stop().await;

    let out = output::render_single(ctx.format, &view, |v| {
        let mut pairs = vec![("State", output::paint_state(&v.state, ctx.color))];
        if let (Some(address), Some(port)) = (&v.server_address, v.port) {
            pairs.push(("Server", format!("{address}:{port}")));
        }
        if let Some(at) = v.session_established {
            pairs.push(("Session since", at.format("%Y-%m-%d %H:%M:%S UTC").to_string()));
        }
        pairs.push(("Sensors", v.sensor_count.to_string()));
        if let Some(err) = &v.last_error {
            pairs.push(("Last error", err.clone()));
        }
        output::detail_lines(&pairs)
    })?;
    output::print_output(&out, ctx.quiet);
    Ok(())
}
