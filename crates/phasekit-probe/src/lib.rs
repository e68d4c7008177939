//! Retire-event probes for a running simulation.
//!
//! Independent probe families hang off each execution unit:
//!
//! - [`LocalCounter`] / [`GlobalAggregator`]: counts how often target PCs
//!   retire across all units, batching local hits so cross-unit traffic stays
//!   bounded, and raises a [`SignificantEvent`] when a target is reached.
//! - [`LocalInstCounter`] / [`GlobalInstCounter`]: the same batching for
//!   every retired instruction, toward one global instruction target.
//! - [`RegionDetector`] / [`RegionManager`]: accumulates basic-block vectors
//!   within configured address ranges and closes regions on length or marker
//!   PCs, reporting each boundary once through a pulse query.
//!
//! # Example
//!
//! ```ignore
//! use phasekit_probe::{CounterConfig, GlobalAggregator, LocalCounter};
//!
//! let config = CounterConfig::default().with_target(0x401000, 1_000_000);
//! let global = GlobalAggregator::from_config(&config)?.into_shared();
//! let mut core0 = LocalCounter::new(0, global.clone(), &config)?;
//! core0.record(0x401000);
//! ```

mod counter;
mod error;
mod inst;
mod listener;
pub mod metrics;
mod range;
mod region;
mod user;

pub use counter::{
    CounterConfig, DEFAULT_UPDATE_THRESHOLD, GlobalAggregator, LocalCounter, PcCountPair,
    SharedAggregator, SignificantEvent,
};
pub use error::ConfigError;
pub use inst::{GlobalInstCounter, InstCountConfig, LocalInstCounter, SharedInstCounter};
pub use listener::{ProbePoint, RetireListener, Retired};
pub use range::AddrRange;
pub use region::{
    Bbv, BoundaryCause, DEFAULT_REGION_LEN, Region, RegionConfig, RegionDetector, RegionManager,
    RegionPolicy, RelativeCount, SharedRegionManager,
};
pub use user::{SharedUserInstManager, UserInstCounter, UserInstManager};
