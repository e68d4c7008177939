//! In-memory host that records every side effect, for controller tests.

use std::path::{Path, PathBuf};

use crate::host::{SimHost, Switchable, Tick};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Effect {
    Checkpoint(PathBuf),
    Dump,
    Reset,
    Schedule(Vec<u64>),
    Switch,
}

#[derive(Default)]
pub struct RecordingHost {
    pub tick: Tick,
    pub insts: u64,
    pub can_switch: bool,
    pub detailed: bool,
    pub fail_checkpoints: bool,
    pub effects: Vec<Effect>,
}

impl RecordingHost {
    pub fn switchable() -> Self {
        Self {
            can_switch: true,
            ..Self::default()
        }
    }

    /// Advance time and retired instructions.
    pub const fn advance(&mut self, insts: u64, ticks: Tick) {
        self.insts += insts;
        self.tick += ticks;
    }

    pub fn drain(&mut self) -> Vec<Effect> {
        std::mem::take(&mut self.effects)
    }

    /// File names of the checkpoints requested so far.
    pub fn checkpoints(&self) -> Vec<String> {
        self.effects
            .iter()
            .filter_map(|e| match e {
                Effect::Checkpoint(p) => p.file_name().map(|n| n.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect()
    }
}

impl Switchable for RecordingHost {
    fn switch(&mut self) {
        self.detailed = !self.detailed;
        self.effects.push(Effect::Switch);
    }

    fn total_insts(&self) -> u64 {
        self.insts
    }
}

impl SimHost for RecordingHost {
    fn cur_tick(&self) -> Tick {
        self.tick
    }

    fn checkpoint(&mut self, path: &Path) -> std::io::Result<()> {
        if self.fail_checkpoints {
            return Err(std::io::Error::other("disk full"));
        }
        self.effects.push(Effect::Checkpoint(path.to_path_buf()));
        Ok(())
    }

    fn dump_stats(&mut self) {
        self.effects.push(Effect::Dump);
    }

    fn reset_stats(&mut self) {
        self.effects.push(Effect::Reset);
    }

    fn schedule_exits(&mut self, offsets: &[u64]) {
        self.effects.push(Effect::Schedule(offsets.to_vec()));
    }

    fn switchable(&mut self) -> Option<&mut dyn Switchable> {
        if self.can_switch { Some(self) } else { None }
    }
}
