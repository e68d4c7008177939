//! PC-count tracking split into per-unit local counters and one shared
//! global aggregator.
//!
//! Each unit counts retirements of target PCs locally and forwards a batch
//! only when a local count reaches `update_threshold`, so the aggregator sees
//! at most `total_hits / update_threshold` updates no matter how many units
//! feed it.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tracing::{debug, info, trace};

use crate::listener::{RetireListener, Retired};
use crate::{ConfigError, metrics};

/// Default number of local hits batched before a flush.
pub const DEFAULT_UPDATE_THRESHOLD: u64 = 100;

/// Fire when `pc` has retired `count` times across all units.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PcCountPair {
    pub pc: u64,
    pub count: u64,
}

impl PcCountPair {
    pub const fn new(pc: u64, count: u64) -> Self {
        Self { pc, count }
    }
}

/// A target PC reached its count. Raised once per crossing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SignificantEvent {
    pub pc: u64,
    pub target: u64,
}

/// PC-count tracking configuration.
#[derive(Clone, Debug)]
pub struct CounterConfig {
    pub targets: Vec<PcCountPair>,
    /// Local hits per target batched before flushing to the aggregator.
    pub update_threshold: u64,
    /// Whether local counters react to events right after construction.
    pub listen_from_start: bool,
}

impl Default for CounterConfig {
    fn default() -> Self {
        Self {
            targets: Vec::new(),
            update_threshold: DEFAULT_UPDATE_THRESHOLD,
            listen_from_start: true,
        }
    }
}

impl CounterConfig {
    #[must_use]
    pub fn with_target(mut self, pc: u64, count: u64) -> Self {
        self.targets.push(PcCountPair::new(pc, count));
        self
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

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.targets.is_empty() {
            return Err(ConfigError::NoTargets);
        }
        if let Some(pair) = self.targets.iter().find(|p| p.count == 0) {
            return Err(ConfigError::ZeroTarget { pc: pair.pc });
        }
        if self.update_threshold == 0 {
            return Err(ConfigError::ZeroThreshold);
        }
        Ok(())
    }
}

/// Cumulative per-target counts across all units.
///
/// The only mutation entry points are [`GlobalAggregator::update`] (called by
/// local counters on flush) and the explicit clear/retarget operations.
pub struct GlobalAggregator {
    targets: FxHashMap<u64, u64>,
    counts: FxHashMap<u64, u64>,
    events: VecDeque<SignificantEvent>,
    updates: u64,
}

/// Handle shared by every local counter of a run.
pub type SharedAggregator = Arc<Mutex<GlobalAggregator>>;

impl GlobalAggregator {
    /// Create an aggregator for the given targets.
    ///
    /// A PC listed twice keeps the last count.
    pub fn new(targets: &[PcCountPair]) -> Result<Self, ConfigError> {
        if targets.is_empty() {
            return Err(ConfigError::NoTargets);
        }
        let mut map = FxHashMap::default();
        for pair in targets {
            if pair.count == 0 {
                return Err(ConfigError::ZeroTarget { pc: pair.pc });
            }
            map.insert(pair.pc, pair.count);
            debug!(pc = format!("{:#x}", pair.pc), count = pair.count, "target registered");
        }
        Ok(Self {
            counts: map.keys().map(|&pc| (pc, 0)).collect(),
            targets: map,
            events: VecDeque::new(),
            updates: 0,
        })
    }

    pub fn from_config(config: &CounterConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Self::new(&config.targets)
    }

    /// Wrap into the handle given to local counters.
    pub fn into_shared(self) -> SharedAggregator {
        Arc::new(Mutex::new(self))
    }

    /// Add `delta` hits for `pc`.
    ///
    /// When the cumulative count reaches the target it resets to zero and a
    /// significant event is queued and returned. Non-target PCs are ignored.
    pub fn update(&mut self, pc: u64, delta: u64) -> Option<SignificantEvent> {
        let target = *self.targets.get(&pc)?;
        let count = self.counts.entry(pc).or_insert(0);
        *count += delta;
        self.updates += 1;
        trace!(pc = format!("{:#x}", pc), count = *count, target, "global update");
        if *count < target {
            return None;
        }

        *count = 0;
        let event = SignificantEvent { pc, target };
        self.events.push_back(event);
        metrics::record_significant(pc);
        info!(pc = format!("{:#x}", pc), target, "target count reached");
        Some(event)
    }

    /// Cumulative count for `pc` (zero for unknown PCs).
    pub fn count(&self, pc: u64) -> u64 {
        self.counts.get(&pc).copied().unwrap_or(0)
    }

    pub fn target(&self, pc: u64) -> Option<u64> {
        self.targets.get(&pc).copied()
    }

    pub fn is_target(&self, pc: u64) -> bool {
        self.targets.contains_key(&pc)
    }

    /// Change the count at which an existing target fires.
    ///
    /// A count already at or above the new target fires on the next update.
    pub fn set_target(&mut self, pc: u64, count: u64) -> Result<(), ConfigError> {
        if count == 0 {
            return Err(ConfigError::ZeroTarget { pc });
        }
        let slot = self
            .targets
            .get_mut(&pc)
            .ok_or(ConfigError::UnknownTarget { pc })?;
        *slot = count;
        debug!(pc = format!("{:#x}", pc), count, "target updated");
        Ok(())
    }

    /// Iterate over the configured targets in no particular order.
    pub fn targets(&self) -> impl Iterator<Item = PcCountPair> + '_ {
        self.targets
            .iter()
            .map(|(&pc, &count)| PcCountPair::new(pc, count))
    }

    /// Zero every cumulative count. Pending events are kept.
    pub fn clear(&mut self) {
        for count in self.counts.values_mut() {
            *count = 0;
        }
    }

    /// Pop the oldest unconsumed significant event.
    pub fn take_event(&mut self) -> Option<SignificantEvent> {
        self.events.pop_front()
    }

    pub fn has_pending_event(&self) -> bool {
        !self.events.is_empty()
    }

    /// Number of flushes received so far.
    pub const fn updates(&self) -> u64 {
        self.updates
    }
}

/// Per-unit counter of target PC retirements.
pub struct LocalCounter {
    unit: usize,
    global: SharedAggregator,
    counts: FxHashMap<u64, u64>,
    update_threshold: u64,
    listening: bool,
    flushes: u64,
}

impl LocalCounter {
    /// Create the counter for execution unit `unit`.
    ///
    /// The tracked PCs are the aggregator's targets at construction time.
    pub fn new(
        unit: usize,
        global: SharedAggregator,
        config: &CounterConfig,
    ) -> Result<Self, ConfigError> {
        if config.update_threshold == 0 {
            return Err(ConfigError::ZeroThreshold);
        }
        let counts = global.lock().targets().map(|p| (p.pc, 0)).collect();
        debug!(
            unit,
            threshold = config.update_threshold,
            listening = config.listen_from_start,
            "local counter attached"
        );
        Ok(Self {
            unit,
            global,
            counts,
            update_threshold: config.update_threshold,
            listening: config.listen_from_start,
            flushes: 0,
        })
    }

    /// Count one retirement of `pc`. Returns true if it triggered a flush.
    #[inline]
    pub fn record(&mut self, pc: u64) -> bool {
        if !self.listening {
            return false;
        }
        let Some(count) = self.counts.get_mut(&pc) else {
            return false;
        };
        *count += 1;
        if *count < self.update_threshold {
            return false;
        }

        let delta = std::mem::take(count);
        self.flushes += 1;
        metrics::record_flush(self.unit);
        self.global.lock().update(pc, delta);
        true
    }

    /// Local hits of `pc` since its last flush.
    pub fn count(&self, pc: u64) -> u64 {
        self.counts.get(&pc).copied().unwrap_or(0)
    }

    /// Drop unflushed local hits. The aggregator is not touched.
    pub fn clear(&mut self) {
        for count in self.counts.values_mut() {
            *count = 0;
        }
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

    pub const fn flushes(&self) -> u64 {
        self.flushes
    }

    pub const fn unit(&self) -> usize {
        self.unit
    }

    pub fn start_listening(&mut self) {
        if !self.listening {
            debug!(unit = self.unit, "local counter listening");
        }
        self.listening = true;
    }

    pub fn stop_listening(&mut self) {
        if self.listening {
            debug!(unit = self.unit, "local counter stopped");
        }
        self.listening = false;
    }

    pub const fn is_listening(&self) -> bool {
        self.listening
    }
}

impl RetireListener for LocalCounter {
    fn on_retire(&mut self, inst: Retired) {
        self.record(inst.pc);
    }

    fn start_listening(&mut self) {
        Self::start_listening(self);
    }

    fn stop_listening(&mut self) {
        Self::stop_listening(self);
    }

    fn is_listening(&self) -> bool {
        self.listening
    }
}
