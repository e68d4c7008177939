//! Trace-driven reference host.
//!
//! [`Replay`] feeds a recorded retire trace through the probes, one
//! [`ProbePoint`] per core, and raises exit events the way a simulator would:
//!
//! - a target PC reaching its count, or all cores together reaching the
//!   instruction target, raises [`ExitEvent::SignificantPc`],
//! - each region boundary raises [`ExitEvent::Region`] once,
//! - each exit scheduled through [`SimHost::schedule_exits`] raises
//!   [`ExitEvent::SimPoint`] when core 0 reaches it,
//! - reaching the instruction limit raises [`ExitEvent::MaxInsts`].
//!
//! The replay stops when a controller decides to stop or the trace ends.

mod host;
mod trace;

use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;

use phasekit_probe::{
    CounterConfig, GlobalAggregator, GlobalInstCounter, InstCountConfig, LocalCounter,
    LocalInstCounter, ProbePoint, RegionConfig, RegionDetector, RegionManager, Retired,
    SharedAggregator, SharedInstCounter, SharedRegionManager, SharedUserInstManager,
    UserInstCounter, UserInstManager,
};
use phasekit_sample::{ExitDecision, ExitDispatcher, ExitEvent, SimHost};
use tracing::{debug, info, instrument};

pub use host::{CoreMode, ReplayHost, StatsDump, TickCosts};
pub use trace::{TraceEntry, TraceReader, is_block_entry};

use crate::{Error, Result};

/// Replay setup.
#[derive(Clone, Debug)]
pub struct ReplayConfig {
    pub cores: usize,
    pub costs: TickCosts,
    /// Implementation the cores start in.
    pub start_mode: CoreMode,
    /// Raise `MaxInsts` when core 0 has retired this many instructions.
    pub max_insts: Option<u64>,
    /// Core-0 instruction offsets to exit at, relative to the start.
    pub initial_exits: Vec<u64>,
    pub counter: Option<CounterConfig>,
    /// Count every instruction of every core toward one target.
    pub inst_count: Option<InstCountConfig>,
    pub region: Option<RegionConfig>,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            cores: 1,
            costs: TickCosts::default(),
            start_mode: CoreMode::Fast,
            max_insts: None,
            initial_exits: Vec::new(),
            counter: None,
            inst_count: None,
            region: None,
        }
    }
}

impl ReplayConfig {
    #[must_use]
    pub const fn with_cores(mut self, cores: usize) -> Self {
        self.cores = cores;
        self
    }

    #[must_use]
    pub const fn with_costs(mut self, costs: TickCosts) -> Self {
        self.costs = costs;
        self
    }

    #[must_use]
    pub const fn with_start_mode(mut self, mode: CoreMode) -> Self {
        self.start_mode = mode;
        self
    }

    #[must_use]
    pub const fn with_max_insts(mut self, max: Option<u64>) -> Self {
        self.max_insts = max;
        self
    }

    #[must_use]
    pub fn with_initial_exits(mut self, offsets: Vec<u64>) -> Self {
        self.initial_exits = offsets;
        self
    }

    #[must_use]
    pub fn with_counter(mut self, counter: CounterConfig) -> Self {
        self.counter = Some(counter);
        self
    }

    #[must_use]
    pub const fn with_inst_count(mut self, inst_count: InstCountConfig) -> Self {
        self.inst_count = Some(inst_count);
        self
    }

    #[must_use]
    pub fn with_region(mut self, region: RegionConfig) -> Self {
        self.region = Some(region);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.cores == 0 {
            return Err(Error::InvalidConfig("at least one core is required".into()));
        }
        if self.costs.fast == 0 || self.costs.detailed == 0 {
            return Err(Error::InvalidConfig("tick costs must be nonzero".into()));
        }
        Ok(())
    }
}

/// Why a replay ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    TraceEnd,
    /// A controller handling this event decided to stop.
    Exit(ExitEvent),
}

/// Outcome of a replay.
#[derive(Clone, Debug)]
pub struct ReplaySummary {
    pub stop: StopReason,
    pub tick: u64,
    pub insts: Vec<u64>,
    pub user_insts: u64,
    pub non_user_insts: u64,
    pub switches: u64,
    pub stats_dumps: usize,
    pub checkpoints: Vec<PathBuf>,
    pub regions: usize,
    pub significant_events: u64,
}

/// A replay in progress: host, probes and exit dispatch.
pub struct Replay {
    host: ReplayHost,
    dispatcher: ExitDispatcher,
    probes: Vec<ProbePoint>,
    prev_pc: Vec<Option<u64>>,
    aggregator: Option<SharedAggregator>,
    inst_counter: Option<SharedInstCounter>,
    regions: Option<SharedRegionManager>,
    users: SharedUserInstManager,
    max_insts: Option<u64>,
    significant_events: u64,
}

impl Replay {
    pub fn new(config: &ReplayConfig, dispatcher: ExitDispatcher) -> Result<Self> {
        config.validate()?;

        let aggregator = config
            .counter
            .as_ref()
            .map(|c| GlobalAggregator::from_config(c).map(GlobalAggregator::into_shared))
            .transpose()?;
        let inst_counter = config
            .inst_count
            .as_ref()
            .map(|c| GlobalInstCounter::from_config(c).map(GlobalInstCounter::into_shared))
            .transpose()?;
        let regions = config
            .region
            .as_ref()
            .map(|c| RegionManager::new(c).map(RegionManager::into_shared))
            .transpose()?;
        let users = UserInstManager::shared();

        let mut probes = Vec::with_capacity(config.cores);
        for unit in 0..config.cores {
            let mut probe = ProbePoint::new();
            if let (Some(global), Some(counter)) = (&aggregator, &config.counter) {
                probe.attach(Box::new(LocalCounter::new(unit, Arc::clone(global), counter)?));
            }
            if let (Some(global), Some(inst_count)) = (&inst_counter, &config.inst_count) {
                probe.attach(Box::new(LocalInstCounter::new(
                    unit,
                    Arc::clone(global),
                    inst_count,
                )?));
            }
            if let (Some(manager), Some(region)) = (&regions, &config.region) {
                probe.attach(Box::new(RegionDetector::new(unit, Arc::clone(manager), region)?));
            }
            probe.attach(Box::new(UserInstCounter::new(Arc::clone(&users), true)));
            probes.push(probe);
        }

        let mut host = ReplayHost::new(config.cores, config.costs, config.start_mode);
        for &offset in &config.initial_exits {
            host.schedule_at(offset);
        }
        debug!(
            cores = config.cores,
            exits = config.initial_exits.len(),
            counting = aggregator.is_some(),
            inst_target = ?config.inst_count.as_ref().map(|c| c.target),
            regions = regions.is_some(),
            "replay configured"
        );

        Ok(Self {
            host,
            dispatcher,
            probes,
            prev_pc: vec![None; config.cores],
            aggregator,
            inst_counter,
            regions,
            users,
            max_insts: config.max_insts,
            significant_events: 0,
        })
    }

    /// Replay every entry of `reader` until the trace ends or a controller
    /// stops the run.
    #[instrument(skip_all)]
    pub fn run<R: BufRead>(&mut self, reader: R) -> Result<ReplaySummary> {
        let mut stop = StopReason::TraceEnd;
        for item in TraceReader::new(reader) {
            let (line, entry) = item?;
            if let Some(event) = self.step(line, entry)? {
                stop = StopReason::Exit(event);
                break;
            }
        }
        info!(
            ?stop,
            insts = ?self.host.insts(),
            tick = self.host.cur_tick(),
            "replay finished"
        );
        Ok(self.summary(stop))
    }

    /// Retire one entry and raise whatever exit events it caused.
    ///
    /// Returns the event whose controller stopped the run, if any.
    pub fn step(&mut self, line: usize, entry: TraceEntry) -> Result<Option<ExitEvent>> {
        let TraceEntry { core, pc, user } = entry;
        if core >= self.probes.len() {
            return Err(Error::Trace {
                line,
                msg: format!("core {core} out of range (replaying {} cores)", self.probes.len()),
            });
        }

        self.host.retire(core);
        let probe = &mut self.probes[core];
        if is_block_entry(self.prev_pc[core], pc) {
            probe.notify_block(pc);
        }
        self.prev_pc[core] = Some(pc);
        probe.notify_retire(Retired { pc, user });

        self.raise_events()
    }

    fn raise_events(&mut self) -> Result<Option<ExitEvent>> {
        if let Some(global) = self.aggregator.as_ref().map(Arc::clone) {
            loop {
                let Some(event) = global.lock().take_event() else {
                    break;
                };
                self.significant_events += 1;
                info!(
                    pc = format!("{:#x}", event.pc),
                    target = event.target,
                    "target reached"
                );
                if self.dispatch(ExitEvent::SignificantPc)? {
                    return Ok(Some(ExitEvent::SignificantPc));
                }
            }
        }

        if let Some(global) = self.inst_counter.as_ref().map(Arc::clone) {
            loop {
                let Some(target) = global.lock().take_event() else {
                    break;
                };
                self.significant_events += 1;
                info!(target, "instruction target reached");
                if self.dispatch(ExitEvent::SignificantPc)? {
                    return Ok(Some(ExitEvent::SignificantPc));
                }
            }
        }

        if let Some(regions) = self.regions.as_ref().map(Arc::clone) {
            let pending = regions.lock().pending_pulses();
            for _ in 0..pending {
                if self.dispatch(ExitEvent::Region)? {
                    return Ok(Some(ExitEvent::Region));
                }
            }
            if pending > 0 {
                regions.lock().clear_pulses();
            }
        }

        while self.host.take_due_exit().is_some() {
            if self.dispatch(ExitEvent::SimPoint)? {
                return Ok(Some(ExitEvent::SimPoint));
            }
        }

        if let Some(max) = self.max_insts
            && self.host.insts()[0] >= max
        {
            self.max_insts = None;
            if self.dispatch(ExitEvent::MaxInsts)? {
                return Ok(Some(ExitEvent::MaxInsts));
            }
        }
        Ok(None)
    }

    fn dispatch(&mut self, event: ExitEvent) -> Result<bool> {
        let decision = self.dispatcher.dispatch(event, &mut self.host)?;
        Ok(decision == ExitDecision::Stop)
    }

    fn summary(&self, stop: StopReason) -> ReplaySummary {
        let users = self.users.lock();
        ReplaySummary {
            stop,
            tick: self.host.cur_tick(),
            insts: self.host.insts().to_vec(),
            user_insts: users.user_insts(),
            non_user_insts: users.non_user_insts(),
            switches: self.host.switches(),
            stats_dumps: self.host.dumps().len(),
            checkpoints: self.host.checkpoints().to_vec(),
            regions: self
                .regions
                .as_ref()
                .map_or(0, |r| r.lock().regions().len()),
            significant_events: self.significant_events,
        }
    }

    /// Register further controllers, e.g. ones that need [`Self::regions`].
    pub fn dispatcher_mut(&mut self) -> &mut ExitDispatcher {
        &mut self.dispatcher
    }

    pub const fn host(&self) -> &ReplayHost {
        &self.host
    }

    pub const fn aggregator(&self) -> Option<&SharedAggregator> {
        self.aggregator.as_ref()
    }

    pub const fn inst_counter(&self) -> Option<&SharedInstCounter> {
        self.inst_counter.as_ref()
    }

    pub const fn regions(&self) -> Option<&SharedRegionManager> {
        self.regions.as_ref()
    }

    pub const fn users(&self) -> &SharedUserInstManager {
        &self.users
    }

    /// Pause or resume every probe on every core.
    pub fn set_listening(&mut self, listening: bool) {
        for probe in &mut self.probes {
            if listening {
                probe.start_listening();
            } else {
                probe.stop_listening();
            }
        }
    }
}
