//! Phase (region) detection from basic-block vectors and marker PCs.
//!
//! Every unit runs a [`RegionDetector`] that classifies its retired
//! instructions by address:
//!
//! 1. excluded range: ignored (exclusion wins over every other range)
//! 2. basic-block range: counted into the BBV of the open region
//! 3. marker range: reported as a candidate region boundary
//!
//! All detectors feed one [`RegionManager`] which merges the counts into the
//! global BBV, decides when a region closes, snapshots it, and assigns ids
//! starting at 1. Id 0 means "no boundary".
//!
//! Closed regions are announced through a pulse queue: each boundary is
//! returned by exactly one [`RegionManager::take_pulse`] call, every other
//! call returns 0.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tracing::{debug, info, trace};

use crate::listener::{RetireListener, Retired};
use crate::{AddrRange, ConfigError, metrics};

/// Default region length in counted instructions.
pub const DEFAULT_REGION_LEN: u64 = 100_000_000;

/// Basic-block vector: block entry address -> instructions executed in it.
pub type Bbv = FxHashMap<u64, u64>;

/// When the open region closes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RegionPolicy {
    /// Close once the running count exceeds `region_len`, or at any marker.
    #[default]
    LengthOrMarker,
    /// Close only on length. Markers are still counted.
    Length,
    /// Close only at markers.
    Marker,
    /// Close at the first marker seen after the running count reached `region_len`.
    MarkerAfterLength,
}

/// What closed a region.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BoundaryCause {
    Length,
    Marker,
}

impl BoundaryCause {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Length => "length",
            Self::Marker => "marker",
        }
    }
}

/// Marker hits at a region boundary.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RelativeCount {
    /// Marker PC that closed the region.
    pub pc: u64,
    /// Hits of `pc` since the start of the run.
    pub total: u64,
    /// Hits of `pc` since the previous boundary.
    pub relative: u64,
}

/// A closed region.
#[derive(Clone, Debug)]
pub struct Region {
    pub id: u64,
    pub bbv: Bbv,
    /// Most recent PC the manager saw when the region closed.
    pub most_recent_pc: u64,
    /// Counted instructions in the region.
    pub inst_count: u64,
    pub cause: BoundaryCause,
    /// Filled in by [`RegionManager::update_relative_counts`].
    pub relative: Option<RelativeCount>,
}

/// Region detection configuration.
#[derive(Clone, Debug)]
pub struct RegionConfig {
    pub region_len: u64,
    /// Instructions in this range are counted into the BBV.
    pub bb_range: AddrRange,
    /// Instructions in this range (and not in `bb_range`) are markers.
    pub marker_range: AddrRange,
    /// Ignored ranges; they take precedence over both ranges above.
    pub excluded: Vec<AddrRange>,
    pub policy: RegionPolicy,
    pub listen_from_start: bool,
}

impl Default for RegionConfig {
    fn default() -> Self {
        Self {
            region_len: DEFAULT_REGION_LEN,
            bb_range: AddrRange::all(),
            marker_range: AddrRange::empty(),
            excluded: Vec::new(),
            policy: RegionPolicy::default(),
            listen_from_start: true,
        }
    }
}

impl RegionConfig {
    #[must_use]
    pub const fn with_region_len(mut self, region_len: u64) -> Self {
        self.region_len = region_len;
        self
    }

    #[must_use]
    pub const fn with_bb_range(mut self, range: AddrRange) -> Self {
        self.bb_range = range;
        self
    }

    #[must_use]
    pub const fn with_marker_range(mut self, range: AddrRange) -> Self {
        self.marker_range = range;
        self
    }

    #[must_use]
    pub fn with_excluded(mut self, range: AddrRange) -> Self {
        self.excluded.push(range);
        self
    }

    #[must_use]
    pub const fn with_policy(mut self, policy: RegionPolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub const fn with_listen_from_start(mut self, listen: bool) -> Self {
        self.listen_from_start = listen;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.region_len == 0 {
            return Err(ConfigError::ZeroRegionLength);
        }
        self.bb_range.validate()?;
        self.marker_range.validate()?;
        // Basic-block classification comes first.
        if !self.marker_range.is_empty() && self.bb_range.covers(&self.marker_range) {
            return Err(ConfigError::MarkerRangeShadowed {
                marker_start: self.marker_range.start,
                marker_end: self.marker_range.end,
                bb_start: self.bb_range.start,
                bb_end: self.bb_range.end,
            });
        }
        self.excluded.iter().try_for_each(AddrRange::validate)
    }
}

/// Global region state shared by all detectors of a run.
pub struct RegionManager {
    region_len: u64,
    policy: RegionPolicy,
    next_id: u64,
    bbv: Bbv,
    running: u64,
    most_recent_pc: u64,
    epoch: u64,
    marker_hits: FxHashMap<u64, u64>,
    hits_since_boundary: FxHashMap<u64, u64>,
    block_totals: FxHashMap<u64, u64>,
    regions: Vec<Region>,
    pulses: VecDeque<u64>,
    // Collected only while a consumer asked for relative counts.
    track_relative: bool,
    pending_relative: Vec<(u64, RelativeCount)>,
    // Set by a length close until the next counted instruction.
    reopened_by_length: bool,
}

/// Handle shared by every detector of a run.
pub type SharedRegionManager = Arc<Mutex<RegionManager>>;

impl RegionManager {
    pub fn new(config: &RegionConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        debug!(
            region_len = config.region_len,
            policy = ?config.policy,
            "region manager created"
        );
        Ok(Self {
            region_len: config.region_len,
            policy: config.policy,
            next_id: 1,
            bbv: Bbv::default(),
            running: 0,
            most_recent_pc: 0,
            epoch: 0,
            marker_hits: FxHashMap::default(),
            hits_since_boundary: FxHashMap::default(),
            block_totals: FxHashMap::default(),
            regions: Vec::new(),
            pulses: VecDeque::new(),
            track_relative: false,
            pending_relative: Vec::new(),
            reopened_by_length: false,
        })
    }

    pub fn into_shared(self) -> SharedRegionManager {
        Arc::new(Mutex::new(self))
    }

    /// Count one basic-block-range instruction of `block`.
    ///
    /// Returns the id of the region this closed, if any.
    pub fn count_instruction(&mut self, block: u64, pc: u64) -> Option<u64> {
        if self.reopened_by_length {
            self.reopened_by_length = false;
            self.hits_since_boundary.clear();
        }
        *self.bbv.entry(block).or_insert(0) += 1;
        *self.block_totals.entry(block).or_insert(0) += 1;
        self.running += 1;
        self.most_recent_pc = pc;

        let length_closes = matches!(
            self.policy,
            RegionPolicy::Length | RegionPolicy::LengthOrMarker
        );
        if length_closes && self.running > self.region_len {
            let id = self.close(BoundaryCause::Length, None);
            self.reopened_by_length = true;
            return Some(id);
        }
        None
    }

    /// Report a marker PC observed by some unit.
    ///
    /// Returns the id of a newly closed region, if the marker closed one.
    /// A marker arriving right after a length close, before any instruction
    /// was counted, takes over that boundary instead of opening an empty
    /// region.
    pub fn report_marker(&mut self, pc: u64) -> Option<u64> {
        *self.marker_hits.entry(pc).or_insert(0) += 1;
        *self.hits_since_boundary.entry(pc).or_insert(0) += 1;
        self.most_recent_pc = pc;
        trace!(pc = format!("{:#x}", pc), running = self.running, "marker");

        let closes = match self.policy {
            RegionPolicy::Length => false,
            RegionPolicy::Marker | RegionPolicy::LengthOrMarker => true,
            RegionPolicy::MarkerAfterLength => self.running >= self.region_len,
        };
        if !closes {
            return None;
        }

        if self.reopened_by_length {
            self.reopened_by_length = false;
            let relative = self.relative_for(pc);
            self.hits_since_boundary.clear();
            if let Some(region) = self.regions.last_mut() {
                region.cause = BoundaryCause::Marker;
                region.most_recent_pc = pc;
                if self.track_relative {
                    self.pending_relative.push((region.id, relative));
                }
                debug!(region = region.id, pc = format!("{:#x}", pc), "boundary taken over by marker");
            }
            return None;
        }

        let relative = self.relative_for(pc);
        self.hits_since_boundary.clear();
        Some(self.close(BoundaryCause::Marker, Some(relative)))
    }

    fn relative_for(&self, pc: u64) -> RelativeCount {
        RelativeCount {
            pc,
            total: self.marker_hits.get(&pc).copied().unwrap_or(0),
            relative: self.hits_since_boundary.get(&pc).copied().unwrap_or(0),
        }
    }

    fn close(&mut self, cause: BoundaryCause, relative: Option<RelativeCount>) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        let region = Region {
            id,
            bbv: std::mem::take(&mut self.bbv),
            most_recent_pc: self.most_recent_pc,
            inst_count: self.running,
            cause,
            relative: None,
        };
        info!(
            region = id,
            cause = cause.as_str(),
            insts = region.inst_count,
            blocks = region.bbv.len(),
            pc = format!("{:#x}", self.most_recent_pc),
            "region closed"
        );
        metrics::record_region(cause.as_str(), region.inst_count);
        if let Some(relative) = relative
            && self.track_relative
        {
            self.pending_relative.push((id, relative));
        }
        self.regions.push(region);
        self.pulses.push_back(id);
        self.running = 0;
        self.epoch += 1;
        id
    }

    /// Pop the next unreported boundary id, or 0 if there is none.
    pub fn take_pulse(&mut self) -> u64 {
        self.pulses.pop_front().unwrap_or(0)
    }

    /// Boundaries not yet returned by [`Self::take_pulse`].
    pub fn pending_pulses(&self) -> usize {
        self.pulses.len()
    }

    /// Drop unreported boundaries at the end of a host cycle.
    pub fn clear_pulses(&mut self) {
        self.pulses.clear();
    }

    /// Collect marker hit counts at boundaries for
    /// [`Self::update_relative_counts`]. Off by default; turning it off drops
    /// what was collected.
    pub fn set_track_relative(&mut self, track: bool) {
        self.track_relative = track;
        if !track {
            self.pending_relative.clear();
        }
    }

    pub const fn tracks_relative(&self) -> bool {
        self.track_relative
    }

    /// Attach marker hit counts to the regions closed since the last call.
    ///
    /// Returns how many regions were annotated.
    pub fn update_relative_counts(&mut self) -> usize {
        let pending = std::mem::take(&mut self.pending_relative);
        let mut updated = 0;
        for (id, relative) in pending {
            if let Some(region) = self.regions.iter_mut().rev().find(|r| r.id == id) {
                region.relative = Some(relative);
                updated += 1;
            }
        }
        updated
    }

    /// Incremented at every boundary; detectors use it to reset local state.
    pub const fn epoch(&self) -> u64 {
        self.epoch
    }

    pub const fn global_bbv(&self) -> &Bbv {
        &self.bbv
    }

    pub fn clear_global_bbv(&mut self) {
        self.bbv.clear();
    }

    /// Counted instructions in the open region.
    pub const fn running_count(&self) -> u64 {
        self.running
    }

    pub fn clear_running_count(&mut self) {
        self.running = 0;
    }

    pub const fn most_recent_pc(&self) -> u64 {
        self.most_recent_pc
    }

    /// Hits per marker PC since the start of the run.
    pub const fn marker_hits(&self) -> &FxHashMap<u64, u64> {
        &self.marker_hits
    }

    /// Instructions per block since the start of the run.
    pub const fn block_totals(&self) -> &FxHashMap<u64, u64> {
        &self.block_totals
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    pub fn region(&self, id: u64) -> Option<&Region> {
        self.regions.iter().find(|r| r.id == id)
    }

    pub const fn region_len(&self) -> u64 {
        self.region_len
    }

    pub const fn policy(&self) -> RegionPolicy {
        self.policy
    }
}

/// Per-unit region detector.
pub struct RegionDetector {
    unit: usize,
    manager: SharedRegionManager,
    bb_range: AddrRange,
    marker_range: AddrRange,
    excluded: Vec<AddrRange>,
    listening: bool,
    block: Option<u64>,
    local_bbv: Bbv,
    epoch: u64,
}

impl RegionDetector {
    pub fn new(
        unit: usize,
        manager: SharedRegionManager,
        config: &RegionConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let epoch = manager.lock().epoch();
        debug!(
            unit,
            bb = %config.bb_range,
            marker = %config.marker_range,
            excluded = config.excluded.len(),
            "region detector attached"
        );
        Ok(Self {
            unit,
            manager,
            bb_range: config.bb_range,
            marker_range: config.marker_range,
            excluded: config.excluded.clone(),
            listening: config.listen_from_start,
            block: None,
            local_bbv: Bbv::default(),
            epoch,
        })
    }

    /// Note the entry of a new basic block.
    #[inline]
    pub fn enter_block(&mut self, pc: u64) {
        if self.listening {
            self.block = Some(pc);
        }
    }

    /// Classify one retired instruction.
    ///
    /// Returns the id of the region it closed, if any.
    pub fn observe(&mut self, pc: u64) -> Option<u64> {
        if !self.listening || self.excluded.iter().any(|r| r.contains(pc)) {
            return None;
        }

        if self.bb_range.contains(pc) {
            let block = self.block.unwrap_or(pc);
            let shared = Arc::clone(&self.manager);
            let mut manager = shared.lock();
            self.sync_epoch(manager.epoch());
            *self.local_bbv.entry(block).or_insert(0) += 1;
            return manager.count_instruction(block, pc);
        }

        if self.marker_range.contains(pc) {
            let shared = Arc::clone(&self.manager);
            let mut manager = shared.lock();
            self.sync_epoch(manager.epoch());
            return manager.report_marker(pc);
        }
        None
    }

    fn sync_epoch(&mut self, epoch: u64) {
        if self.epoch != epoch {
            self.local_bbv.clear();
            self.epoch = epoch;
        }
    }

    /// This unit's share of the open region's BBV.
    ///
    /// Reset lazily: after a boundary it still holds the closed region's
    /// counts until this unit observes its next instruction.
    pub const fn local_bbv(&self) -> &Bbv {
        &self.local_bbv
    }

    pub fn clear_local_bbv(&mut self) {
        self.local_bbv.clear();
    }

    pub const fn unit(&self) -> usize {
        self.unit
    }

    pub fn start_listening(&mut self) {
        self.listening = true;
    }

    pub fn stop_listening(&mut self) {
        self.listening = false;
        self.block = None;
    }

    pub const fn is_listening(&self) -> bool {
        self.listening
    }
}

impl RetireListener for RegionDetector {
    fn on_block(&mut self, pc: u64) {
        self.enter_block(pc);
    }

    fn on_retire(&mut self, inst: Retired) {
        self.observe(inst.pc);
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

#[cfg(test)]
mod tests {
    use super::*;

    const BB: (u64, u64) = (0x1000, 0x2000);
    const MARKER: (u64, u64) = (0x8000, 0x9000);

    fn config(region_len: u64, policy: RegionPolicy) -> RegionConfig {
        RegionConfig::default()
            .with_region_len(region_len)
            .with_bb_range(AddrRange::new(BB.0, BB.1).unwrap())
            .with_marker_range(AddrRange::new(MARKER.0, MARKER.1).unwrap())
            .with_policy(policy)
    }

    fn setup(region_len: u64, policy: RegionPolicy) -> (SharedRegionManager, RegionDetector) {
        let config = config(region_len, policy);
        let manager = RegionManager::new(&config).unwrap().into_shared();
        let detector = RegionDetector::new(0, Arc::clone(&manager), &config).unwrap();
        (manager, detector)
    }

    #[test]
    fn test_config_validation() {
        assert_eq!(
            RegionConfig::default().with_region_len(0).validate(),
            Err(ConfigError::ZeroRegionLength)
        );
        let bad = RegionConfig::default().with_excluded(AddrRange { start: 9, end: 1 });
        assert!(matches!(
            bad.validate(),
            Err(ConfigError::MalformedRange { start: 9, end: 1 })
        ));
        assert!(RegionManager::new(&bad).is_err());

        // The default basic-block range covers everything.
        let shadowed =
            RegionConfig::default().with_marker_range(AddrRange::new(0x8000, 0x9000).unwrap());
        assert_eq!(
            shadowed.validate(),
            Err(ConfigError::MarkerRangeShadowed {
                marker_start: 0x8000,
                marker_end: 0x9000,
                bb_start: 0,
                bb_end: u64::MAX,
            })
        );
        assert!(RegionManager::new(&shadowed).is_err());

        let overlapping = shadowed.with_bb_range(AddrRange::new(0x1000, 0x8800).unwrap());
        assert!(overlapping.validate().is_ok());
        assert!(config(10, RegionPolicy::Marker).validate().is_ok());
    }

    #[test]
    fn test_length_boundary() {
        let (manager, mut det) = setup(4, RegionPolicy::LengthOrMarker);
        det.enter_block(0x1000);
        for i in 0..4 {
            assert_eq!(det.observe(0x1000 + i * 4), None);
        }
        assert_eq!(det.observe(0x1010), Some(1));

        let mut m = manager.lock();
        assert_eq!(m.running_count(), 0);
        assert!(m.global_bbv().is_empty());
        let region = m.region(1).unwrap();
        assert_eq!(region.inst_count, 5);
        assert_eq!(region.bbv.get(&0x1000), Some(&5));
        assert_eq!(region.cause, BoundaryCause::Length);
        assert_eq!(region.most_recent_pc, 0x1010);
        assert_eq!(m.take_pulse(), 1);
        assert_eq!(m.take_pulse(), 0);
    }

    #[test]
    fn test_marker_closes_immediately() {
        let (manager, mut det) = setup(1_000, RegionPolicy::LengthOrMarker);
        det.observe(0x1000);
        det.observe(0x1004);
        assert_eq!(det.observe(0x8000), Some(1));
        assert_eq!(det.observe(0x8000), Some(2));

        let m = manager.lock();
        assert_eq!(m.region(1).unwrap().inst_count, 2);
        assert_eq!(m.region(1).unwrap().cause, BoundaryCause::Marker);
        assert_eq!(m.region(2).unwrap().inst_count, 0);
        assert_eq!(m.marker_hits().get(&0x8000), Some(&2));
        assert_eq!(m.most_recent_pc(), 0x8000);
    }

    #[test]
    fn test_exclusion_wins() {
        let config = config(1_000, RegionPolicy::LengthOrMarker)
            .with_excluded(AddrRange::new(0x1800, 0x1900).unwrap())
            .with_excluded(AddrRange::new(0x8000, 0x8004).unwrap());
        let manager = RegionManager::new(&config).unwrap().into_shared();
        let mut det = RegionDetector::new(0, Arc::clone(&manager), &config).unwrap();

        det.observe(0x1800);
        det.observe(0x18fc);
        assert_eq!(det.observe(0x8000), None);
        det.observe(0x1900);
        det.observe(0x3000);

        let m = manager.lock();
        assert_eq!(m.running_count(), 1);
        assert_eq!(m.pending_pulses(), 0);
        assert!(m.marker_hits().is_empty());
    }

    #[test]
    fn test_marker_takes_over_length_boundary() {
        let (manager, mut det) = setup(2, RegionPolicy::LengthOrMarker);
        det.observe(0x1000);
        det.observe(0x1004);
        assert_eq!(det.observe(0x1008), Some(1));
        // No instruction counted since the length close: same boundary.
        assert_eq!(det.observe(0x8010), None);

        let mut m = manager.lock();
        assert_eq!(m.regions().len(), 1);
        assert_eq!(m.region(1).unwrap().cause, BoundaryCause::Marker);
        assert_eq!(m.region(1).unwrap().most_recent_pc, 0x8010);
        assert_eq!(m.take_pulse(), 1);
        assert_eq!(m.take_pulse(), 0);
        drop(m);

        det.observe(0x1000);
        assert_eq!(det.observe(0x8010), Some(2));
    }

    #[test]
    fn test_policy_length_ignores_markers() {
        let (manager, mut det) = setup(3, RegionPolicy::Length);
        det.observe(0x1000);
        assert_eq!(det.observe(0x8000), None);
        assert_eq!(manager.lock().marker_hits().get(&0x8000), Some(&1));
    }

    #[test]
    fn test_policy_marker_ignores_length() {
        let (manager, mut det) = setup(2, RegionPolicy::Marker);
        for _ in 0..10 {
            assert_eq!(det.observe(0x1000), None);
        }
        assert_eq!(manager.lock().running_count(), 10);
        assert_eq!(det.observe(0x8000), Some(1));
    }

    #[test]
    fn test_policy_marker_after_length() {
        let (_manager, mut det) = setup(3, RegionPolicy::MarkerAfterLength);
        det.observe(0x1000);
        det.observe(0x1004);
        assert_eq!(det.observe(0x8000), None);
        det.observe(0x1008);
        assert_eq!(det.observe(0x8000), Some(1));
    }

    #[test]
    fn test_ids_strictly_increase_and_pulse_once() {
        let (manager, mut det) = setup(3, RegionPolicy::LengthOrMarker);
        let pcs = [
            0x1000, 0x8000, 0x1000, 0x1004, 0x1008, 0x100c, 0x8000, 0x3000, 0x1000, 0x8004,
            0x1000, 0x1000, 0x1000, 0x1000, 0x1000,
        ];
        let mut closed = Vec::new();
        let mut pulses = Vec::new();
        for pc in pcs {
            if let Some(id) = det.observe(pc) {
                closed.push(id);
            }
            let pulse = manager.lock().take_pulse();
            if pulse != 0 {
                pulses.push(pulse);
            }
        }
        assert!(closed.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(closed, pulses);
        assert_eq!(closed, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_local_bbv_reset_on_new_region() {
        let (manager, mut det) = setup(1_000, RegionPolicy::LengthOrMarker);
        det.enter_block(0x1000);
        det.observe(0x1000);
        det.observe(0x1004);
        det.enter_block(0x1100);
        det.observe(0x1100);
        assert_eq!(det.local_bbv().get(&0x1000), Some(&2));
        assert_eq!(det.local_bbv().get(&0x1100), Some(&1));

        det.observe(0x8000);
        det.observe(0x1104);
        assert_eq!(det.local_bbv().len(), 1);
        assert_eq!(det.local_bbv().get(&0x1100), Some(&1));
        assert_eq!(manager.lock().block_totals().get(&0x1100), Some(&2));
    }

    #[test]
    fn test_units_merge_into_global_bbv() {
        let config = config(1_000, RegionPolicy::LengthOrMarker);
        let manager = RegionManager::new(&config).unwrap().into_shared();
        let mut a = RegionDetector::new(0, Arc::clone(&manager), &config).unwrap();
        let mut b = RegionDetector::new(1, Arc::clone(&manager), &config).unwrap();

        a.on_block(0x1000);
        b.on_block(0x1000);
        a.on_retire(Retired::new(0x1000));
        b.on_retire(Retired::new(0x1000));
        b.on_retire(Retired::new(0x1004));

        {
            let m = manager.lock();
            assert_eq!(m.global_bbv().get(&0x1000), Some(&3));
            assert_eq!(m.running_count(), 3);
        }
        assert_eq!(a.local_bbv().get(&0x1000), Some(&1));
        assert_eq!(b.local_bbv().get(&0x1000), Some(&2));

        // A marker on unit 1 closes the shared region; unit 0 resets lazily.
        assert_eq!(b.observe(0x8000), Some(1));
        a.observe(0x1000);
        assert_eq!(a.local_bbv().get(&0x1000), Some(&1));
        assert_eq!(manager.lock().region(1).unwrap().bbv.get(&0x1000), Some(&3));
    }

    #[test]
    fn test_relative_counts() {
        let (manager, mut det) = setup(1_000, RegionPolicy::MarkerAfterLength);
        manager.lock().set_track_relative(true);
        // Marker below length: counted, no boundary.
        det.observe(0x8000);
        det.observe(0x8000);
        assert_eq!(manager.lock().pending_pulses(), 0);
        for _ in 0..1_000 {
            det.observe(0x1000);
        }
        assert_eq!(det.observe(0x8000), Some(1));

        let mut m = manager.lock();
        assert!(m.region(1).unwrap().relative.is_none());
        assert_eq!(m.update_relative_counts(), 1);
        assert_eq!(
            m.region(1).unwrap().relative,
            Some(RelativeCount {
                pc: 0x8000,
                total: 3,
                relative: 3
            })
        );
        assert_eq!(m.update_relative_counts(), 0);
    }

    #[test]
    fn test_relative_counts_not_collected_by_default() {
        let (manager, mut det) = setup(1_000, RegionPolicy::LengthOrMarker);
        for _ in 0..50 {
            det.observe(0x1000);
            det.observe(0x8000);
        }
        let mut m = manager.lock();
        assert_eq!(m.regions().len(), 50);
        assert!(!m.tracks_relative());
        assert_eq!(m.update_relative_counts(), 0);
        assert!(m.regions().iter().all(|r| r.relative.is_none()));

        m.set_track_relative(true);
        m.report_marker(0x8000);
        m.set_track_relative(false);
        assert_eq!(m.update_relative_counts(), 0);
    }

    #[test]
    fn test_marker_on_other_unit_resets_local_bbv() {
        let config = config(1_000, RegionPolicy::LengthOrMarker);
        let manager = RegionManager::new(&config).unwrap().into_shared();
        let mut a = RegionDetector::new(0, Arc::clone(&manager), &config).unwrap();
        let mut b = RegionDetector::new(1, Arc::clone(&manager), &config).unwrap();

        a.observe(0x1000);
        a.observe(0x1004);
        assert_eq!(b.observe(0x8000), Some(1));
        assert_eq!(a.local_bbv().len(), 2);
        // A marker with nothing counted since the boundary closes an empty region.
        assert_eq!(a.observe(0x8000), Some(2));
        assert!(a.local_bbv().is_empty());
        assert_eq!(manager.lock().region(2).unwrap().inst_count, 0);
    }

    #[test]
    fn test_stop_listening() {
        let (manager, mut det) = setup(1_000, RegionPolicy::LengthOrMarker);
        det.stop_listening();
        det.observe(0x1000);
        det.observe(0x8000);
        assert_eq!(manager.lock().running_count(), 0);
        det.start_listening();
        det.observe(0x1000);
        assert_eq!(manager.lock().running_count(), 1);
    }
}
