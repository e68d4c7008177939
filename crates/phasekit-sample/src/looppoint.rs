//! Region-triggered checkpoint controller.

use std::path::PathBuf;

use phasekit_probe::SharedRegionManager;
use tracing::{debug, info};

use crate::SampleError;
use crate::host::{ExitController, ExitDecision, SimHost, request_checkpoint};

/// Checkpoints at each region boundary reported by a [`RegionManager`],
/// tagged `Region<id>`.
///
/// [`RegionManager`]: phasekit_probe::RegionManager
pub struct RegionCheckpoints {
    dir: PathBuf,
    manager: SharedRegionManager,
    /// Remaining checkpoints; `None` is unbounded.
    budget: Option<u64>,
    update_relatives: bool,
    taken: u64,
}

impl RegionCheckpoints {
    /// Stop after `budget` checkpoints.
    pub fn bounded(dir: impl Into<PathBuf>, manager: SharedRegionManager, budget: u64) -> Self {
        Self::new(dir.into(), manager, Some(budget))
    }

    pub fn unbounded(dir: impl Into<PathBuf>, manager: SharedRegionManager) -> Self {
        Self::new(dir.into(), manager, None)
    }

    fn new(dir: PathBuf, manager: SharedRegionManager, budget: Option<u64>) -> Self {
        debug!(?budget, "region checkpoints configured");
        Self {
            dir,
            manager,
            budget,
            update_relatives: false,
            taken: 0,
        }
    }

    /// Annotate regions with marker relative counts before checkpointing.
    ///
    /// Turns on relative-count collection in the shared manager.
    #[must_use]
    pub fn with_update_relatives(mut self, update: bool) -> Self {
        if update {
            self.manager.lock().set_track_relative(true);
        }
        self.update_relatives = update;
        self
    }

    pub const fn remaining(&self) -> Option<u64> {
        self.budget
    }

    pub const fn taken(&self) -> u64 {
        self.taken
    }
}

impl ExitController for RegionCheckpoints {
    fn on_invoke(&mut self, host: &mut dyn SimHost) -> Result<ExitDecision, SampleError> {
        if self.budget == Some(0) {
            return Ok(ExitDecision::Stop);
        }

        let region = {
            let mut manager = self.manager.lock();
            let id = manager.take_pulse();
            if id != 0 && self.update_relatives {
                manager.update_relative_counts();
            }
            id
        };
        if region == 0 {
            return Ok(ExitDecision::Continue);
        }

        request_checkpoint(host, &self.dir, format_args!("Region{region}"))?;
        self.taken += 1;

        if let Some(budget) = self.budget.as_mut() {
            *budget -= 1;
            if *budget == 0 {
                info!(checkpoints = self.taken, "region checkpoint budget exhausted");
                return Ok(ExitDecision::Stop);
            }
        }
        Ok(ExitDecision::Continue)
    }

    fn name(&self) -> &'static str {
        "looppoint"
    }
}
