//! Whole-run instruction counting toward one global target.
//!
//! Unlike the PC-count probes every retired instruction counts, whatever its
//! address. Each unit batches its instructions locally and flushes exactly
//! `update_threshold` at a time into the shared [`GlobalInstCounter`], which
//! resets and raises an event when the combined count reaches the target.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, trace};

use crate::counter::DEFAULT_UPDATE_THRESHOLD;
use crate::listener::{RetireListener, Retired};
use crate::{ConfigError, metrics};

/// Instruction-count tracking configuration.
#[derive(Clone, Debug)]
pub struct InstCountConfig {
    /// Instructions across all units between two events.
    pub target: u64,
    pub update_threshold: u64,
    pub listen_from_start: bool,
}

impl InstCountConfig {
    pub const fn new(target: u64) -> Self {
        Self {
            target,
            update_threshold: DEFAULT_UPDATE_THRESHOLD,
            listen_from_start: true,
        }
    }

    #[must_use]
    pub const fn with_update_threshold(mut self, threshold: u64) -> Self {
        self.update_threshold = threshold;
        self
    }

    #[must_use]
    pub const fn with_listen_from_start(mut self, listen: bool) -> Self {
        self.listen_from_start = listen;
        self
    }

    pub const fn validate(&self) -> Result<(), ConfigError> {
        if self.target == 0 {
            return Err(ConfigError::ZeroInstTarget);
        }
        if self.update_threshold == 0 {
            return Err(ConfigError::ZeroThreshold);
        }
        Ok(())
    }
}

/// Combined instruction count of all units.
pub struct GlobalInstCounter {
    target: u64,
    count: u64,
    pending: u64,
    updates: u64,
}

/// Handle shared by every local instruction counter of a run.
pub type SharedInstCounter = Arc<Mutex<GlobalInstCounter>>;

impl GlobalInstCounter {
    pub fn new(target: u64) -> Result<Self, ConfigError> {
        if target == 0 {
            return Err(ConfigError::ZeroInstTarget);
        }
        debug!(target, "instruction target registered");
        Ok(Self {
            target,
            count: 0,
            pending: 0,
            updates: 0,
        })
    }

    pub fn from_config(config: &InstCountConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Self::new(config.target)
    }

    pub fn into_shared(self) -> SharedInstCounter {
        Arc::new(Mutex::new(self))
    }

    /// Add `delta` instructions. Returns true if this reached the target, in
    /// which case the count is back at zero and an event is pending.
    pub fn update(&mut self, delta: u64) -> bool {
        self.count += delta;
        self.updates += 1;
        trace!(count = self.count, target = self.target, "global instruction update");
        if self.count < self.target {
            return false;
        }

        self.count = 0;
        self.pending += 1;
        metrics::record_inst_target();
        info!(target = self.target, "instruction target reached");
        true
    }

    pub const fn count(&self) -> u64 {
        self.count
    }

    pub const fn target(&self) -> u64 {
        self.target
    }

    /// Move the target. A count already at or above it fires on the next update.
    pub fn set_target(&mut self, target: u64) -> Result<(), ConfigError> {
        if target == 0 {
            return Err(ConfigError::ZeroInstTarget);
        }
        self.target = target;
        debug!(target, "instruction target updated");
        Ok(())
    }

    pub fn clear(&mut self) {
        self.count = 0;
    }

    /// Consume one pending event, returning the target it reached.
    pub fn take_event(&mut self) -> Option<u64> {
        if self.pending == 0 {
            return None;
        }
        self.pending -= 1;
        Some(self.target)
    }

    pub const fn has_pending_event(&self) -> bool {
        self.pending > 0
    }

    pub const fn updates(&self) -> u64 {
        self.updates
    }
}

/// Per-unit instruction counter.
pub struct LocalInstCounter {
    unit: usize,
    global: SharedInstCounter,
    count: u64,
    update_threshold: u64,
    listening: bool,
}

impl LocalInstCounter {
    pub fn new(
        unit: usize,
        global: SharedInstCounter,
        config: &InstCountConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        debug!(
            unit,
            threshold = config.update_threshold,
            "local instruction counter attached"
        );
        Ok(Self {
            unit,
            global,
            count: 0,
            update_threshold: config.update_threshold,
            listening: config.listen_from_start,
        })
    }

    /// Count one retired instruction. Returns true if it triggered a flush.
    #[inline]
    pub fn record(&mut self) -> bool {
        if !self.listening {
            return false;
        }
        self.count += 1;
        if self.count < self.update_threshold {
            return false;
        }

        let delta = std::mem::take(&mut self.count);
        metrics::record_flush(self.unit);
        self.global.lock().update(delta);
        true
    }

    /// Instructions since the last flush.
    pub const fn count(&self) -> u64 {
        self.count
    }

    /// Drop unflushed instructions. The global count is not touched.
    pub const fn clear(&mut self) {
        self.count = 0;
    }

    pub fn set_update_threshold(&mut self, threshold: u64) -> Result<(), ConfigError> {
        if threshold == 0 {
            return Err(ConfigError::ZeroThreshold);
        }
        self.update_threshold = threshold;
        Ok(())
    }

    pub const fn update_threshold(&self) -> u64 {
        self.update_threshold
    }

    pub const fn unit(&self) -> usize {
        self.unit
    }
}

impl RetireListener for LocalInstCounter {
    fn on_retire(&mut self, _inst: Retired) {
        self.record();
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
