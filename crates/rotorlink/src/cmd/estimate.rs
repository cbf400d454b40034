use std::fs::File;
use std::io::{self, BufRead, BufReader};

use rotorlink_estimate::{AltitudeEstimator, Estimate, KalmanFilter, PeriodClock};

use crate::cmd::EstimateArgs;
use crate::exit::{estimate_error, io_error, CliError, CliResult, DATA_INVALID, SUCCESS, USAGE};
use crate::output::{print_estimates, EstimateRow, OutputFormat};

/// One parsed input line.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Sample {
    z: f64,
    ddz: f64,
    dt: Option<f64>,
}

pub fn run(args: EstimateArgs, format: OutputFormat) -> CliResult<i32> {
    if !(args.period.is_finite() && args.period > 0.0) {
        return Err(CliError::new(USAGE, "--period must be a positive number"));
    }

    let input: Box<dyn BufRead> = match &args.input {
        Some(path) => Box::new(BufReader::new(File::open(path).map_err(|err| {
            io_error(&format!("failed reading {}", path.display()), err)
        })?)),
        None => Box::new(BufReader::new(io::stdin().lock())),
    };

    let pipeline = if args.filter {
        let estimator = AltitudeEstimator::new(args.alpha)
            .map_err(|err| CliError::new(USAGE, format!("--alpha: {err}")))?;
        Pipeline::Filtered(estimator)
    } else {
        Pipeline::Kalman(KalmanFilter::new())
    };
    let clock = args.live.then(PeriodClock::new);
    let rows = estimate(input, args.period, clock, pipeline)?;
    print_estimates(&rows, format);
    Ok(SUCCESS)
}

/// Bare Kalman filter, or the full pre-filtered altitude pipeline.
enum Pipeline {
    Kalman(KalmanFilter),
    Filtered(AltitudeEstimator),
}

impl Pipeline {
    fn apply(&mut self, z: f64, ddz: f64, dt: f64) -> rotorlink_estimate::Result<Estimate> {
        match self {
            Self::Kalman(filter) => {
                filter.try_apply(z, ddz, dt)?;
                Ok(Estimate {
                    filtered_z: z,
                    filtered_ddz: ddz,
                    position: filter.position(),
                    velocity: filter.velocity(),
                })
            }
            Self::Filtered(estimator) => estimator.apply(z, ddz, dt),
        }
    }
}

fn estimate(
    input: impl BufRead,
    period: f64,
    mut clock: Option<PeriodClock>,
    mut pipeline: Pipeline,
) -> CliResult<Vec<EstimateRow>> {
    let mut rows = Vec::new();

    for (index, line) in input.lines().enumerate() {
        let line_no = index + 1;
        let line = line.map_err(|err| io_error("failed reading samples", err))?;
        let Some(sample) = parse_sample(&line).map_err(|msg| {
            CliError::new(DATA_INVALID, format!("line {line_no}: {msg}"))
        })?
        else {
            continue;
        };

        let measured = clock
            .as_mut()
            .and_then(PeriodClock::tick)
            .filter(|dt| *dt > 0.0);
        let dt = sample.dt.or(measured).unwrap_or(period);
        let estimate = pipeline
            .apply(sample.z, sample.ddz, dt)
            .map_err(|err| estimate_error(&format!("line {line_no}"), err))?;

        rows.push(EstimateRow {
            line: line_no,
            z: sample.z,
            ddz: sample.ddz,
            dt,
            filtered_z: estimate.filtered_z,
            filtered_ddz: estimate.filtered_ddz,
            position: estimate.position,
            velocity: estimate.velocity,
        });
    }

    Ok(rows)
}

/// Parse `z,ddz[,dt]`, separated by commas or whitespace. Blank lines and
/// `#` comments yield `None`.
fn parse_sample(line: &str) -> Result<Option<Sample>, String> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let fields = line
        .split(|c: char| c == ',' || c.is_ascii_whitespace())
        .filter(|field| !field.is_empty())
        .map(|field| {
            field
                .parse::<f64>()
                .map_err(|_| format!("not a number: {field}"))
        })
        .collect::<Result<Vec<_>, _>>()?;

    match fields.as_slice() {
        [z, ddz] => Ok(Some(Sample {
            z: *z,
            ddz: *ddz,
            dt: None,
        })),
        [z, ddz, dt] => Ok(Some(Sample {
            z: *z,
            ddz: *ddz,
            dt: Some(*dt),
        })),
        other => Err(format!("expected 2 or 3 fields, found {}", other.len())),
    }
}
