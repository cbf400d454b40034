//! The link-polling thread.
//!
//! The polling thread runs one real-time priority level below the control
//! thread, so servicing the link never preempts control computation.

use std::thread::{self, JoinHandle};
use std::time::Duration;

use rotorlink_frame::{PacketSink, PacketSource};
use tracing::{debug, warn};

use crate::dispatcher::{PortDispatcher, PortStats};
use crate::error::{PortError, Result};
use crate::handle::PortHandle;

/// Scheduling class for the polling thread.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SchedPolicy {
    /// Keep whatever the spawning thread has.
    #[default]
    Inherit,
    /// Normal time-sharing.
    Other,
    Fifo,
    RoundRobin,
}

/// Polling thread parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadConfig {
    pub name: String,
    pub policy: SchedPolicy,
    /// Static priority; `None` uses the policy's minimum.
    pub priority: Option<i32>,
    /// Bound on each readiness wait, so a stop request is seen promptly.
    pub poll_timeout: Option<Duration>,
}

impl Default for ThreadConfig {
    fn default() -> Self {
        Self {
            name: "port-poll".to_string(),
            policy: SchedPolicy::Inherit,
            priority: None,
            poll_timeout: Some(Duration::from_millis(100)),
        }
    }
}

impl ThreadConfig {
    /// FIFO scheduling one level below the calling thread's real-time
    /// priority. Falls back to the default when the caller is not real-time
    /// or is already at the lowest real-time level.
    pub fn below_current() -> Self {
        match current_realtime_priority() {
            Some(priority) if priority > 1 => Self {
                policy: SchedPolicy::Fifo,
                priority: Some(priority - 1),
                ..Self::default()
            },
            _ => Self::default(),
        }
    }
}

/// A running polling thread.
#[derive(Debug)]
pub struct PortThread {
    handle: PortHandle,
    join: JoinHandle<Result<PortStats>>,
}

impl PortThread {
    /// Handle to the port this thread is servicing.
    pub fn handle(&self) -> &PortHandle {
        &self.handle
    }

    /// Ask the loop to exit; it notices within one poll timeout.
    pub fn stop(&self) {
        self.handle.request_stop();
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Wait for the thread and return the dispatcher's counters.
    pub fn join(self) -> Result<PortStats> {
        self.join.join().map_err(|_| PortError::ThreadPanicked)?
    }
}

/// Run `dispatcher` on a new thread configured by `config`.
///
/// Failing to apply the scheduling parameters is logged and the thread
/// carries on with whatever it inherited.
pub fn spawn_port_thread<C, R>(
    mut dispatcher: PortDispatcher<C, R>,
    config: ThreadConfig,
) -> Result<PortThread>
where
    C: PacketSource + Send + 'static,
    R: PacketSink + Send + 'static,
{
    let handle = dispatcher.handle();
    let ThreadConfig {
        name,
        policy,
        priority,
        poll_timeout,
    } = config;

    let join = thread::Builder::new()
        .name(name)
        .spawn(move || {
            match apply_scheduling(policy, priority) {
                Ok(()) => debug!(?policy, ?priority, "polling thread scheduled"),
                Err(err) => warn!(?policy, ?priority, error = %err, "cannot set thread scheduling"),
            }
            dispatcher.run(poll_timeout)?;
            Ok(dispatcher.stats())
        })
        .map_err(PortError::Spawn)?;

    Ok(PortThread { handle, join })
}

#[cfg(unix)]
fn current_realtime_priority() -> Option<i32> {
    let mut policy: libc::c_int = 0;
    // SAFETY: sched_param is plain data; zeroed is a valid value.
    let mut param: libc::sched_param = unsafe { std::mem::zeroed() };
    // SAFETY: both out-pointers are valid for writes and pthread_self() is
    // always a live thread.
    let rc = unsafe { libc::pthread_getschedparam(libc::pthread_self(), &mut policy, &mut param) };
    if rc == 0 && (policy == libc::SCHED_FIFO || policy == libc::SCHED_RR) {
        Some(param.sched_priority)
    } else {
        None
    }
}

#[cfg(not(unix))]
fn current_realtime_priority() -> Option<i32> {
    None
}

#[cfg(unix)]
fn apply_scheduling(policy: SchedPolicy, priority: Option<i32>) -> std::io::Result<()> {
    let policy = match policy {
        SchedPolicy::Inherit => return Ok(()),
        SchedPolicy::Other => libc::SCHED_OTHER,
        SchedPolicy::Fifo => libc::SCHED_FIFO,
        SchedPolicy::RoundRobin => libc::SCHED_RR,
    };
    // SAFETY: sched_get_priority_min only reads its argument.
    let priority = priority.unwrap_or_else(|| unsafe { libc::sched_get_priority_min(policy) });

    // SAFETY: sched_param is plain data; zeroed is a valid value.
    let mut param: libc::sched_param = unsafe { std::mem::zeroed() };
    param.sched_priority = priority;

    // SAFETY: `param` is a valid sched_param and pthread_self() is the
    // calling thread.
    let rc = unsafe { libc::pthread_setschedparam(libc::pthread_self(), policy, &param) };
    if rc == 0 {
        Ok(())
    } else {
        Err(std::io::Error::from_raw_os_error(rc))
    }
}

#[cfg(not(unix))]
fn apply_scheduling(policy: SchedPolicy, _priority: Option<i32>) -> std::io::Result<()> {
    match policy {
        SchedPolicy::Inherit => Ok(()),
        _ => Err(std::io::Error::new(
            std::io::ErrorKind::Unsupported,
            "thread scheduling policies need a Unix target",
        )),
    }
}
