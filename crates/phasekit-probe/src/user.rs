//! User / non-user retired instruction counting.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::listener::{RetireListener, Retired};

/// Run-wide totals shared by every unit's [`UserInstCounter`].
#[derive(Debug, Default)]
pub struct UserInstManager {
    user: u64,
    other: u64,
}

pub type SharedUserInstManager = Arc<Mutex<UserInstManager>>;

impl UserInstManager {
    pub fn shared() -> SharedUserInstManager {
        Arc::new(Mutex::new(Self::default()))
    }

    pub const fn user_insts(&self) -> u64 {
        self.user
    }

    pub const fn non_user_insts(&self) -> u64 {
        self.other
    }

    pub fn reset_user_insts(&mut self) {
        self.user = 0;
    }

    pub fn reset_non_user_insts(&mut self) {
        self.other = 0;
    }
}

/// Per-unit listener feeding a [`UserInstManager`].
pub struct UserInstCounter {
    manager: SharedUserInstManager,
    listening: bool,
}

impl UserInstCounter {
    pub const fn new(manager: SharedUserInstManager, listen_from_start: bool) -> Self {
        Self {
            manager,
            listening: listen_from_start,
        }
    }
}

impl RetireListener for UserInstCounter {
    fn on_retire(&mut self, inst: Retired) {
        if !self.listening {
            return;
        }
        let mut manager = self.manager.lock();
        if inst.user {
            manager.user += 1;
        } else {
            manager.other += 1;
        }
    }

    fn start_listening(&mut self) {
        self.listening = true;
    }

    fn stop_listening(&mut self) {
        self.listening = false;
    }

    fn is_listening(&self) -> bool {
        self.listening
    }
}
