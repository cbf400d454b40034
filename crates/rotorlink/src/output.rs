use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use rotorlink_frame::{Packet, PacketType};
use rotorlink_port::{ControlMessage, Dispatched, PortStats, Record};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct PacketOutput<'a> {
    packet_type: String,
    type_value: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    action: Option<&'a str>,
    payload_size: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    record: Option<Record>,
    #[serde(skip_serializing_if = "Option::is_none")]
    control: Option<ControlMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    payload_hex: Option<String>,
    timestamp: String,
}

/// Print a received packet and, when known, what the dispatcher did with it.
pub fn print_packet(packet: &Packet, dispatched: Option<&Dispatched>, format: OutputFormat) {
    if let OutputFormat::Raw = format {
        print_raw(packet.payload.as_ref());
        return;
    }

    let record = Record::decode(packet.packet_type, packet.payload.as_ref())
        .ok()
        .flatten();
    let control = match dispatched {
        Some(Dispatched::Control(message)) => Some(*message),
        _ => None,
    };
    let payload_hex = match (&record, &control) {
        (None, None) => Some(hex(packet.payload.as_ref())),
        _ => None,
    };
    let out = PacketOutput {
        packet_type: packet.packet_type.to_string(),
        type_value: packet.packet_type.as_u8(),
        action: dispatched.map(action_name),
        payload_size: packet.payload.len(),
        record,
        control,
        payload_hex,
        timestamp: now_unix_seconds(),
    };

    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["TYPE", "ACTION", "SIZE", "CONTENT"])
                .add_row(vec![
                    out.packet_type.clone(),
                    out.action.unwrap_or("-").to_string(),
                    out.payload_size.to_string(),
                    content_summary(&out),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "type={} ({:#04x}) action={} size={} {}",
                out.packet_type,
                out.type_value,
                out.action.unwrap_or("-"),
                out.payload_size,
                content_summary(&out)
            );
        }
        OutputFormat::Raw => {}
    }
}

#[derive(Debug, Serialize)]
pub struct EstimateRow {
    pub line: usize,
    pub z: f64,
    pub ddz: f64,
    pub dt: f64,
    /// Altitude and acceleration as fed to the Kalman filter; equal to the
    /// raw values unless pre-filtering is on.
    pub filtered_z: f64,
    pub filtered_ddz: f64,
    pub position: f64,
    pub velocity: f64,
}

pub fn print_estimates(rows: &[EstimateRow], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            for row in rows {
                println!(
                    "{}",
                    serde_json::to_string(row).unwrap_or_else(|_| "{}".to_string())
                );
            }
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec![
                    "LINE", "Z", "DDZ", "DT", "FILTERED Z", "FILTERED DDZ", "POSITION", "VELOCITY",
                ]);
            for row in rows {
                table.add_row(vec![
                    row.line.to_string(),
                    format!("{:.3}", row.z),
                    format!("{:.3}", row.ddz),
                    format!("{:.4}", row.dt),
                    format!("{:.3}", row.filtered_z),
                    format!("{:.3}", row.filtered_ddz),
                    format!("{:.4}", row.position),
                    format!("{:.4}", row.velocity),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for row in rows {
                println!(
                    "line={} z={:.3} position={:.4} velocity={:.4}",
                    row.line, row.z, row.position, row.velocity
                );
            }
        }
        OutputFormat::Raw => {
            for row in rows {
                println!("{} {}", row.position, row.velocity);
            }
        }
    }
}

pub fn print_stats(stats: &PortStats, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string(&serde_json::json!({ "stats": stats }))
                    .unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_header(vec!["STORED", "CONTROL", "FORWARDED", "UNROUTED", "INVALID"])
                .add_row(vec![
                    stats.stored.to_string(),
                    stats.control.to_string(),
                    stats.forwarded.to_string(),
                    stats.unrouted.to_string(),
                    stats.invalid.to_string(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "stored={} control={} forwarded={} unrouted={} invalid={}",
                stats.stored, stats.control, stats.forwarded, stats.unrouted, stats.invalid
            );
        }
        OutputFormat::Raw => {}
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

pub fn hex(data: &[u8]) -> String {
    data.iter().map(|b| format!("{b:02x}")).collect()
}

fn action_name(dispatched: &Dispatched) -> &'static str {
    match dispatched {
        Dispatched::Stored(_) => "stored",
        Dispatched::Control(_) => "control",
        Dispatched::Forwarded(_) => "forwarded",
        Dispatched::Unrouted(_) => "unrouted",
    }
}

fn content_summary(out: &PacketOutput<'_>) -> String {
    if let Some(record) = &out.record {
        return serde_json::to_string(record).unwrap_or_default();
    }
    if let Some(control) = &out.control {
        return serde_json::to_string(control).unwrap_or_default();
    }
    out.payload_hex.clone().unwrap_or_default()
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}

/// Parse a packet type by name (`yaw_params`, `SHUT_DOWN`) or wire value
/// (`0x2a`, `42`).
pub fn parse_packet_type(input: &str) -> Option<PacketType> {
    if let Some(ty) = PacketType::from_name(input) {
        return Some(ty);
    }
    let value = match input.strip_prefix("0x").or_else(|| input.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16).ok()?,
        None => input.parse::<u8>().ok()?,
    };
    Some(PacketType::from(value))
}
