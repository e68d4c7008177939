//! Exit-event controllers for checkpointing and sampling.
//!
//! The simulation host invokes an [`ExitController`] each time it reaches a
//! scheduled stopping point. The controller calls back into the host through
//! [`SimHost`] (checkpoint, stats dump/reset, core switch, exit scheduling)
//! and returns an [`ExitDecision`]. [`ExitDispatcher`] routes each kind of
//! exit event to its controller.

mod basic;
mod dispatch;
mod error;
mod host;
mod looppoint;
pub mod metrics;
mod record;
mod simpoint;
mod smarts;
#[cfg(test)]
mod testing;

pub use basic::{ExitNow, SaveCheckpoint, StatsAction, StatsController, SwitchCores};
pub use dispatch::{ExitDispatcher, ExitEvent};
pub use error::SampleError;
pub use host::{ExitController, ExitDecision, SimHost, Switchable, Tick, checkpoint_path};
pub use looppoint::RegionCheckpoints;
pub use record::{SAMPLE_DATA_KEY, SampleLog, SampleRecord};
pub use simpoint::SimPointCheckpoints;
pub use smarts::{SamplingState, SmartsParams, SystematicSampler};
