//! Simulation host backed by a recorded trace.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use phasekit_sample::{SimHost, Switchable, Tick};
use serde::Serialize;
use tracing::debug;

/// Core implementation currently simulating.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CoreMode {
    Fast,
    Detailed,
}

impl CoreMode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Fast => "fast",
            Self::Detailed => "detailed",
        }
    }

    const fn other(self) -> Self {
        match self {
            Self::Fast => Self::Detailed,
            Self::Detailed => Self::Fast,
        }
    }
}

/// Ticks charged per retired instruction in each mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TickCosts {
    pub fast: Tick,
    pub detailed: Tick,
}

impl Default for TickCosts {
    fn default() -> Self {
        Self {
            fast: 1,
            detailed: 4,
        }
    }
}

/// One statistics dump.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatsDump {
    pub tick: Tick,
    /// Ticks since the last reset.
    pub sim_ticks: Tick,
    /// Instructions per core since the last reset.
    pub insts: Vec<u64>,
    pub mode: CoreMode,
}

#[derive(Serialize)]
#[serde(rename_all = "kebab-case")]
struct CheckpointManifest<'a> {
    tick: Tick,
    mode: CoreMode,
    core_insts: &'a [u64],
}

/// Replay host state: time, per-core instruction counts, pending exits and
/// recorded statistics.
#[derive(Debug)]
pub struct ReplayHost {
    tick: Tick,
    insts: Vec<u64>,
    mode: CoreMode,
    costs: TickCosts,
    switches: u64,
    // Absolute core-0 instruction counts at which to exit.
    exits: BinaryHeap<Reverse<u64>>,
    window_tick: Tick,
    window_insts: Vec<u64>,
    dumps: Vec<StatsDump>,
    checkpoints: Vec<PathBuf>,
}

impl ReplayHost {
    pub fn new(cores: usize, costs: TickCosts, mode: CoreMode) -> Self {
        Self {
            tick: 0,
            insts: vec![0; cores],
            mode,
            costs,
            switches: 0,
            exits: BinaryHeap::new(),
            window_tick: 0,
            window_insts: vec![0; cores],
            dumps: Vec::new(),
            checkpoints: Vec::new(),
        }
    }

    /// Account one retired instruction on `core`.
    #[inline]
    pub fn retire(&mut self, core: usize) {
        self.insts[core] += 1;
        self.tick += match self.mode {
            CoreMode::Fast => self.costs.fast,
            CoreMode::Detailed => self.costs.detailed,
        };
    }

    /// Pop the next exit due on core 0, if any.
    pub fn take_due_exit(&mut self) -> Option<u64> {
        let due = self.insts[0];
        match self.exits.peek() {
            Some(Reverse(at)) if *at <= due => {
                self.exits.pop();
                Some(due)
            }
            _ => None,
        }
    }

    /// Schedule an exit at an absolute core-0 instruction count.
    pub fn schedule_at(&mut self, insts: u64) {
        self.exits.push(Reverse(insts));
    }

    pub fn pending_exits(&self) -> usize {
        self.exits.len()
    }

    pub fn cores(&self) -> usize {
        self.insts.len()
    }

    pub fn insts(&self) -> &[u64] {
        &self.insts
    }

    pub const fn mode(&self) -> CoreMode {
        self.mode
    }

    pub const fn switches(&self) -> u64 {
        self.switches
    }

    pub fn dumps(&self) -> &[StatsDump] {
        &self.dumps
    }

    pub fn checkpoints(&self) -> &[PathBuf] {
        &self.checkpoints
    }

    /// Write every recorded stats dump to `path` as text.
    pub fn write_stats(&self, path: &Path) -> std::io::Result<()> {
        let mut out = String::new();
        for (i, dump) in self.dumps.iter().enumerate() {
            let _ = writeln!(out, "---------- Begin Simulation Statistics ({i}) ----------");
            let _ = writeln!(out, "{:<32}{}", "final_tick", dump.tick);
            let _ = writeln!(out, "{:<32}{}", "sim_ticks", dump.sim_ticks);
            let _ = writeln!(out, "{:<32}{}", "sim_insts", dump.insts.iter().sum::<u64>());
            let _ = writeln!(out, "{:<32}{}", "cpu_mode", dump.mode.as_str());
            for (core, insts) in dump.insts.iter().enumerate() {
                let _ = writeln!(out, "{:<32}{insts}", format!("core{core}.committed_insts"));
            }
            let _ = writeln!(out, "---------- End Simulation Statistics   ----------\n");
        }
        fs::write(path, out)?;
        debug!(path = %path.display(), dumps = self.dumps.len(), "stats written");
        Ok(())
    }
}

impl Switchable for ReplayHost {
    fn switch(&mut self) {
        self.mode = self.mode.other();
        self.switches += 1;
        debug!(mode = self.mode.as_str(), tick = self.tick, "switched cores");
    }

    fn total_insts(&self) -> u64 {
        self.insts[0]
    }
}

impl SimHost for ReplayHost {
    fn cur_tick(&self) -> Tick {
        self.tick
    }

    fn checkpoint(&mut self, path: &Path) -> std::io::Result<()> {
        fs::create_dir_all(path)?;
        let manifest = CheckpointManifest {
            tick: self.tick,
            mode: self.mode,
            core_insts: &self.insts,
        };
        let json = serde_json::to_vec_pretty(&manifest)?;
        fs::write(path.join("checkpoint.json"), json)?;
        self.checkpoints.push(path.to_path_buf());
        Ok(())
    }

    fn dump_stats(&mut self) {
        let insts = self
            .insts
            .iter()
            .zip(&self.window_insts)
            .map(|(now, start)| now - start)
            .collect();
        self.dumps.push(StatsDump {
            tick: self.tick,
            sim_ticks: self.tick - self.window_tick,
            insts,
            mode: self.mode,
        });
    }

    fn reset_stats(&mut self) {
        self.window_tick = self.tick;
        self.window_insts.clone_from(&self.insts);
    }

    fn schedule_exits(&mut self, offsets: &[u64]) {
        let now = self.insts[0];
        for offset in offsets {
            self.exits.push(Reverse(now + offset));
        }
        debug!(?offsets, insts = now, "exits scheduled");
    }

    fn switchable(&mut self) -> Option<&mut dyn Switchable> {
        Some(self)
    }
}
