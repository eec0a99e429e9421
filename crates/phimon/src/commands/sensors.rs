//! Sensor command handlers.

use chrono::Utc;
use tabled::{Table, Tabled, settings::Style};

use phimon_core::{Controller, NewSensor, SensorRecord, SensorType};

use crate::cli::{RegisterArgs, SensorsArgs, SensorsCommand};
use crate::error::CliError;
use crate::output;

use super::{Context, require_session};

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct SensorRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Type")]
    sensor_type: String,
    #[tabled(rename = "Port")]
    port: String,
    #[tabled(rename = "Value")]
    value: String,
    #[tabled(rename = "Attached")]
    attached: String,
    #[tabled(rename = "Updated")]
    updated: String,
}

impl SensorRow {
    fn new(r: &SensorRecord, color: bool) -> Self {
        Self {
            id: r.sensor_id.clone(),
            name: r.sensor_name.clone(),
            sensor_type: r.sensor_type.to_string(),
            port: format!("{}/{}", r.hub_port, r.channel),
            value: r.display_value(),
            attached: output::paint_attached(r.attached, color),
            updated: format_age(r.age(Utc::now())),
        }
    }
}

/// Compact "how long ago" for the Updated column.
fn format_age(age: chrono::Duration) -> String {
    let secs = age.num_seconds().max(0);
    match secs {
        0..60 => format!("{secs}s ago"),
        60..3600 => format!("{}m ago", secs / 60),
        _ => format!("{}h ago", secs / 3600),
    }
}

/// Sensor table shared by `sensors list`, `connect` and `watch`.
pub(crate) fn sensor_table(records: &[SensorRecord], color: bool) -> String {
    if records.is_empty() {
        return "No sensors registered".into();
    }
    let rows: Vec<SensorRow> = records.iter().map(|r| SensorRow::new(r, color)).collect();
    Table::new(rows).with(Style::rounded()).to_string()
}

fn detail(r: &SensorRecord) -> String {
    output::detail_lines(&[
        ("ID", r.sensor_id.clone()),
        ("Name", r.sensor_name.clone()),
        ("Type", r.sensor_type.to_string()),
        ("Hub port", r.hub_port.to_string()),
        ("Channel", r.channel.to_string()),
        ("Value", r.display_value()),
        ("Attached", r.attached.to_string()),
        ("Timestamp", r.timestamp.format("%Y-%m-%d %H:%M:%S UTC").to_string()),
    ])
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(controller: &Controller, args: SensorsArgs, ctx: &Context) -> Result<(), CliError> {
    require_session(controller).await?;
    let result = run(controller, args.command, ctx).await;
    controller.stop().await;
    result
}

async fn run(controller: &Controller, command: SensorsCommand, ctx: &Context) -> Result<(), CliError> {
    match command {
        SensorsCommand::List => {
            let records: Vec<SensorRecord> = controller
                .sensors_snapshot()
                .iter()
                .map(|r| r.as_ref().clone())
                .collect();
            let out = output::render_list(ctx.format, &records, |r| SensorRow::new(r, ctx.color))?;
            output::print_output(&out, ctx.quiet);
            Ok(())
        }

        SensorsCommand::Read { id } => {
            let record = controller.sensor_reading(&id).await?;
            let out = output::render_single(ctx.format, &record, detail)?;
            output::print_output(&out, ctx.quiet);
            Ok(())
        }

        SensorsCommand::Register(args) => {
            let sensor = new_sensor(args);
            let record = controller.register_sensor(&sensor).await?;
            let out = output::render_single(ctx.format, &record, detail)?;
            output::print_output(&out, ctx.quiet);
            Ok(())
        }

        SensorsCommand::Unregister { id } => {
            controller.unregister_sensor(&id).await?;
            if !ctx.quiet {
                eprintln!("Sensor {id} unregistered");
            }
            Ok(())
        }
    }
}

fn new_sensor(args: RegisterArgs) -> NewSensor {
    NewSensor {
        sensor_type: SensorType::parse(&args.sensor_type),
        hub_port: args.hub_port,
        channel: args.channel,
        serial_number: args.serial,
        sensor_name: args.name,
    }
}
