//! Host capabilities used by exit-event controllers.
//!
//! Controllers never drive the simulation themselves. The host invokes them
//! at a scheduled stopping point, they call back into [`SimHost`] for side
//! effects, and return an [`ExitDecision`].

use std::fmt;
use std::path::{Path, PathBuf};

use metrics::counter;
use tracing::info;

use crate::SampleError;

/// Simulated time in ticks.
pub type Tick = u64;

/// Capability to swap the processor's core implementation at runtime.
pub trait Switchable {
    /// Swap every core to the other configured implementation.
    fn switch(&mut self);

    /// Instructions retired so far by the first core.
    fn total_insts(&self) -> u64;
}

/// Operations a simulation host offers to controllers.
pub trait SimHost {
    /// Current simulated time.
    fn cur_tick(&self) -> Tick;

    /// Save a checkpoint at `path`. The content is owned by the host.
    fn checkpoint(&mut self, path: &Path) -> std::io::Result<()>;

    /// Dump statistics.
    fn dump_stats(&mut self);

    /// Reset statistics.
    fn reset_stats(&mut self);

    /// Schedule exit events on the first core, `offsets` instructions from now.
    fn schedule_exits(&mut self, offsets: &[u64]);

    /// The processor's switching capability, if it has one.
    fn switchable(&mut self) -> Option<&mut dyn Switchable>;
}

/// Whether the host's run loop should stop after this exit event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExitDecision {
    Continue,
    Stop,
}

impl ExitDecision {
    pub const fn from_stop(stop: bool) -> Self {
        if stop { Self::Stop } else { Self::Continue }
    }

    pub const fn is_stop(self) -> bool {
        matches!(self, Self::Stop)
    }
}

/// A controller invoked by the host at each scheduled stopping point.
pub trait ExitController {
    /// Handle one invocation: perform side effects and decide.
    fn on_invoke(&mut self, host: &mut dyn SimHost) -> Result<ExitDecision, SampleError>;

    /// Short name for logs.
    fn name(&self) -> &'static str;
}

/// `dir/cpt.<tag>`.
pub fn checkpoint_path(dir: &Path, tag: impl fmt::Display) -> PathBuf {
    dir.join(format!("cpt.{tag}"))
}

/// Ask the host for a checkpoint tagged `tag` under `dir`.
pub(crate) fn request_checkpoint(
    host: &mut dyn SimHost,
    dir: &Path,
    tag: impl fmt::Display,
) -> Result<PathBuf, SampleError> {
    let path = checkpoint_path(dir, tag);
    host.checkpoint(&path)
        .map_err(|source| SampleError::Checkpoint {
            path: path.clone(),
            source,
        })?;
    counter!(crate::metrics::CHECKPOINTS).increment(1);
    info!(path = %path.display(), tick = host.cur_tick(), "checkpoint saved");
    Ok(path)
}
