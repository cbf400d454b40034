use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::time::Duration;

use rotorlink_frame::{Packet, PacketSink};
use rotorlink_port::{
    spawn_port_thread, split_port, Dispatched, GroundReport, PortConfig, PortHandle,
    PortListener, PortSender, ThreadConfig,
};
use tracing::{debug, info, warn};

use crate::cmd::ListenArgs;
use crate::exit::{port_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_packet, print_stats, OutputFormat};

const EVENT_WAIT: Duration = Duration::from_millis(100);

pub fn run(args: ListenArgs, format: OutputFormat) -> CliResult<i32> {
    if args.report_divisor == 0 {
        return Err(CliError::new(USAGE, "--report-divisor must be at least 1"));
    }
    let config = PortConfig {
        report_divisor: args.report_divisor,
        thread: ThreadConfig::below_current(),
        ..PortConfig::default()
    };
    let listener = PortListener::bind(&args.path)
        .map_err(|err| port_error("bind failed", err))?
        .with_config(config.clone());

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let channel = loop {
        if !running.load(Ordering::SeqCst) {
            info!("interrupted before a ground station connected");
            return Ok(SUCCESS);
        }
        if let Some(channel) = listener
            .accept_timeout(EVENT_WAIT)
            .map_err(|err| port_error("accept failed", err))?
        {
            break channel;
        }
    };
    let (dispatcher, mut sender) =
        split_port(channel, &config).map_err(|err| port_error("port setup failed", err))?;

    let (events, received) = mpsc::channel::<(Packet, Dispatched)>();
    let dispatcher = dispatcher.with_observer(move |packet, dispatched| {
        // The receiver is gone once the main loop has stopped.
        let _ = events.send((packet.clone(), *dispatched));
    });
    let port = spawn_port_thread(dispatcher, config.thread.clone())
        .map_err(|err| port_error("spawn failed", err))?;
    let handle = port.handle().clone();

    let mut printed = 0usize;
    while running.load(Ordering::SeqCst) {
        let (packet, dispatched) = match received.recv_timeout(EVENT_WAIT) {
            Ok(event) => event,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };

        print_packet(&packet, Some(&dispatched), format);
        answer_with_report(&mut sender, &handle);

        printed = printed.saturating_add(1);
        if args.count.is_some_and(|count| printed >= count) {
            break;
        }
    }

    port.stop();
    let stats = port
        .join()
        .map_err(|err| port_error("port thread failed", err))?;
    info!(?stats, "port stopped");
    if handle.is_shut_down() {
        info!("shutdown requested by ground station");
    }
    print_stats(&stats, format);

    Ok(SUCCESS)
}

/// Echo the latest command set-points back as motor offsets, throttled by
/// the sender's report divisor.
fn answer_with_report<S: PacketSink>(sender: &mut PortSender<S>, handle: &PortHandle) {
    let state = handle.snapshot();
    let report = GroundReport {
        offsets: state.command_data.peek(),
        ..GroundReport::default()
    };
    match sender.send_report(&report) {
        Ok(true) => debug!("ground report sent"),
        Ok(false) => {}
        Err(err) if err.is_busy() => warn!("link busy, report dropped"),
        Err(err) => warn!(error = %err, "cannot send ground report"),
    }
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| {
        CliError::new(
            crate::exit::INTERNAL,
            format!("signal handler setup failed: {err}"),
        )
    })
}
