//! Phase detection, PC-count probes and sampling controllers.
//!
//! Re-exports the probe and controller crates and adds a trace-replay host
//! that drives them from a recorded commit log.
//!
//! # Example
//!
//! ```ignore
//! use phasekit::replay::{Replay, ReplayConfig};
//! use phasekit::{CounterConfig, ExitDispatcher};
//!
//! let config = ReplayConfig::default()
//!     .with_cores(2)
//!     .with_counter(CounterConfig::default().with_target(0x8000_1000, 1_000));
//! let mut replay = Replay::new(&config, ExitDispatcher::new("out"))?;
//! let summary = replay.run(std::io::BufReader::new(std::fs::File::open("trace.log")?))?;
//! ```

pub use phasekit_probe::{
    AddrRange, Bbv, BoundaryCause, ConfigError, CounterConfig, DEFAULT_REGION_LEN,
    DEFAULT_UPDATE_THRESHOLD, GlobalAggregator, GlobalInstCounter, InstCountConfig, LocalCounter,
    LocalInstCounter, PcCountPair, ProbePoint, Region, RegionConfig, RegionDetector, RegionManager,
    RegionPolicy, RelativeCount, RetireListener, Retired, SharedAggregator, SharedInstCounter,
    SharedRegionManager, SharedUserInstManager, SignificantEvent, UserInstCounter,
    UserInstManager,
};
pub use phasekit_sample::{
    ExitController, ExitDecision, ExitDispatcher, ExitEvent, ExitNow, RegionCheckpoints,
    SAMPLE_DATA_KEY, SampleError, SampleLog, SampleRecord, SamplingState, SaveCheckpoint,
    SimHost, SimPointCheckpoints, SmartsParams, StatsAction, StatsController, SwitchCores,
    Switchable, SystematicSampler, Tick, checkpoint_path,
};

mod error;
pub mod metrics;
pub mod replay;

pub use error::{Error, Result};
