use std::time::Duration;

use rotorlink_frame::{FrameConfig, PacketSink, PacketSource, PacketType};
use rotorlink_port::{
    connect, CommandData, ControlMessage, CtrlParams, GroundReport, MotorSignals, Payload,
    SensorData, StateAndMode, TraceData,
};
use serde::de::DeserializeOwned;

use crate::cmd::SendArgs;
use crate::exit::{frame_error, port_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{parse_packet_type, print_packet, OutputFormat};

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let wait_timeout = parse_duration(&args.wait_timeout)?;
    let packet_type = parse_packet_type(&args.packet_type).ok_or_else(|| {
        CliError::new(
            USAGE,
            format!("unknown packet type: {}", args.packet_type),
        )
    })?;
    let payload = resolve_payload(packet_type, &args)?;

    let config = FrameConfig {
        nonblocking: false,
        read_timeout: Some(wait_timeout),
        write_timeout: Some(wait_timeout),
    };
    let mut channel =
        connect(&args.path, config).map_err(|err| port_error("connect failed", err))?;

    channel
        .send(packet_type, &payload)
        .map_err(|err| frame_error("send failed", err))?;

    if args.wait {
        let packet = channel
            .receive()
            .map_err(|err| frame_error("receive failed", err))?;
        print_packet(&packet, None, format);
    }

    Ok(SUCCESS)
}

fn resolve_payload(packet_type: PacketType, args: &SendArgs) -> CliResult<Vec<u8>> {
    if let Some(json) = &args.json {
        return json_payload(packet_type, json);
    }
    if let Some(data) = &args.data {
        return parse_hex(data);
    }
    Ok(Vec::new())
}

/// Build the payload for `packet_type` from its JSON form.
///
/// Records accept their field object (or a positional array), control
/// types accept a bare value.
fn json_payload(packet_type: PacketType, json: &str) -> CliResult<Vec<u8>> {
    let payload = match packet_type {
        PacketType::CommandData | PacketType::MotorOffsets => record::<CommandData>(json)?,
        PacketType::RollPitchParams
        | PacketType::YawParams
        | PacketType::AltitudeParams
        | PacketType::XyParams => record::<CtrlParams>(json)?,
        PacketType::MotorSignals => record::<MotorSignals>(json)?,
        PacketType::SensorData => record::<SensorData>(json)?,
        PacketType::TraceData => record::<TraceData>(json)?,
        PacketType::StateMode => record::<StateAndMode>(json)?,
        PacketType::GroundReport => record::<GroundReport>(json)?,
        PacketType::IdleLimit => {
            ControlMessage::IdleLimit(value::<i16>(json)?).to_payload().to_vec()
        }
        PacketType::TestMode => {
            ControlMessage::TestMode(value::<bool>(json)?).to_payload().to_vec()
        }
        PacketType::SwitchMode | PacketType::ShutDown | PacketType::Other(_) => {
            return Err(CliError::new(
                USAGE,
                format!("{packet_type} has no JSON form; use --data"),
            ))
        }
    };
    Ok(payload)
}

fn record<T: Payload + DeserializeOwned>(json: &str) -> CliResult<Vec<u8>> {
    Ok(value::<T>(json)?.encode().to_vec())
}

fn value<T: DeserializeOwned>(json: &str) -> CliResult<T> {
    serde_json::from_str(json)
        .map_err(|err| CliError::new(USAGE, format!("--json does not fit the packet type: {err}")))
}

fn parse_hex(input: &str) -> CliResult<Vec<u8>> {
    let digits: String = input.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    if digits.len() % 2 != 0 {
        return Err(CliError::new(USAGE, "--data must have an even number of hex digits"));
    }
    (0..digits.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&digits[i..i + 2], 16)
                .map_err(|_| CliError::new(USAGE, format!("invalid hex in --data: {input}")))
        })
        .collect()
}

fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    Ok(match unit {
        "ms" => Duration::from_millis(value),
        _ => Duration::from_secs(value),
    })
}
