use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::control::ControlMessage;
use crate::fresh::Fresh;
use crate::payload::{CommandData, CtrlParams};

/// Everything the ground station can set, guarded by one lock.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PortState {
    pub command_data: Fresh<CommandData>,
    pub roll_pitch_params: Fresh<CtrlParams>,
    pub yaw_params: Fresh<CtrlParams>,
    pub altitude_params: Fresh<CtrlParams>,
    pub xy_params: Fresh<CtrlParams>,
    pub idle_limit: i16,
    pub test_mode: bool,
    pub mode_switch: bool,
    pub shut_down: bool,
}

impl PortState {
    pub(crate) fn apply_control(&mut self, message: ControlMessage) {
        match message {
            ControlMessage::IdleLimit(limit) => self.idle_limit = limit,
            ControlMessage::TestMode(on) => self.test_mode = on,
            ControlMessage::SwitchMode => self.mode_switch = true,
            ControlMessage::ShutDown => self.shut_down = true,
        }
    }
}

#[derive(Debug)]
pub(crate) struct PortShared {
    state: Mutex<PortState>,
    running: AtomicBool,
}

impl PortShared {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(PortState::default()),
            running: AtomicBool::new(true),
        })
    }

    /// Critical section. Callers copy in or out and nothing else.
    pub(crate) fn lock(&self) -> MutexGuard<'_, PortState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Control-loop view of the port: cheap to clone, safe to share.
#[derive(Debug, Clone)]
pub struct PortHandle {
    shared: Arc<PortShared>,
}

macro_rules! record_accessors {
    ($($field:ident: $ty:ty => $is_new:ident, $take:ident;)+) => {
        $(
            #[doc = concat!("True when `", stringify!($field), "` changed since the last take.")]
            pub fn $is_new(&self) -> bool {
                self.shared.lock().$field.is_new()
            }

            #[doc = concat!("Copy `", stringify!($field), "` and clear its new-data flag.")]
            pub fn $take(&self) -> $ty {
                self.shared.lock().$field.take()
            }
        )+
    };
}

impl PortHandle {
    pub(crate) fn new(shared: Arc<PortShared>) -> Self {
        Self { shared }
    }

    record_accessors! {
        command_data: CommandData => is_new_command_data, take_command_data;
        roll_pitch_params: CtrlParams => is_new_roll_pitch_params, take_roll_pitch_params;
        yaw_params: CtrlParams => is_new_yaw_params, take_yaw_params;
        altitude_params: CtrlParams => is_new_altitude_params, take_altitude_params;
        xy_params: CtrlParams => is_new_xy_params, take_xy_params;
    }

    /// Base motor speed while idling.
    pub fn idle_limit(&self) -> i16 {
        self.shared.lock().idle_limit
    }

    pub fn is_test_mode(&self) -> bool {
        self.shared.lock().test_mode
    }

    /// Read and clear a pending mode-switch request.
    pub fn take_mode_switch(&self) -> bool {
        std::mem::take(&mut self.shared.lock().mode_switch)
    }

    pub fn is_shut_down(&self) -> bool {
        self.shared.lock().shut_down
    }

    pub fn reset_shut_down(&self) {
        self.shared.lock().shut_down = false;
    }

    /// Copy of the whole state, flags included.
    pub fn snapshot(&self) -> PortState {
        *self.shared.lock()
    }

    /// Ask the polling loop to exit after its current cycle.
    pub fn request_stop(&self) {
        self.shared.running.store(false, Ordering::Release);
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }
}
