use clap::{Args, Subcommand};
use std::path::PathBuf;

use crate::exit::CliResult;
use crate::output::OutputFormat;

pub mod estimate;
pub mod listen;
pub mod send;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Act as the flight controller's ground port: bind, accept one
    /// station, dispatch its packets and answer with ground reports.
    Listen(ListenArgs),
    /// Send a single packet to a listening port.
    Send(SendArgs),
    /// Run the altitude Kalman filter over recorded samples.
    Estimate(EstimateArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Listen(args) => listen::run(args, format),
        Command::Send(args) => send::run(args, format),
        Command::Estimate(args) => estimate::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    /// Socket path to bind.
    pub path: PathBuf,
    /// Exit after dispatching N packets.
    #[arg(long)]
    pub count: Option<usize>,
    /// Send a ground report on every N-th received packet.
    #[arg(long, default_value_t = 1)]
    pub report_divisor: u32,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Socket path to connect to.
    pub path: PathBuf,
    /// Packet type: a name such as `command_data` or a wire value (`0x07`).
    #[arg(long = "type", short = 't', value_name = "TYPE")]
    pub packet_type: String,
    /// JSON payload: a record object/array, or a number/bool for control types.
    #[arg(long, conflicts_with = "data")]
    pub json: Option<String>,
    /// Raw payload as hex.
    #[arg(long, conflicts_with = "json")]
    pub data: Option<String>,
    /// Wait for one packet back and print it.
    #[arg(long)]
    pub wait: bool,
    /// Maximum time to wait when --wait is set (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub wait_timeout: String,
}

#[derive(Args, Debug)]
pub struct EstimateArgs {
    /// Sample file with `z,ddz[,dt]` lines. Reads stdin when omitted.
    #[arg(long, value_name = "FILE")]
    pub input: Option<PathBuf>,
    /// Period in seconds for samples without a `dt` column.
    #[arg(long, default_value_t = 0.01)]
    pub period: f64,
    /// Time lines without a `dt` column by their arrival instead of --period.
    #[arg(long)]
    pub live: bool,
    /// Median-filter `z` and low-pass `ddz` before the Kalman filter.
    #[arg(long)]
    pub filter: bool,
    /// Weight of each new `ddz` sample when --filter is set, in (0, 1].
    #[arg(long, default_value_t = rotorlink_estimate::DDZ_SMOOTHING, requires = "filter")]
    pub alpha: f64,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}
