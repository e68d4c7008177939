//! Probe configuration errors.

use thiserror::Error;

/// Configuration error detected while setting up a probe.
///
/// These are raised before any instruction is observed; a probe that was
/// constructed successfully never fails afterwards.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("target list is empty")]
    NoTargets,

    #[error("target count for pc {pc:#x} must be non-zero")]
    ZeroTarget { pc: u64 },

    #[error("instruction target must be non-zero")]
    ZeroInstTarget,

    #[error("pc {pc:#x} is not a configured target")]
    UnknownTarget { pc: u64 },

    #[error("update threshold must be non-zero")]
    ZeroThreshold,

    #[error("region length must be non-zero")]
    ZeroRegionLength,

    #[error("malformed address range {start:#x}..{end:#x} (start > end)")]
    MalformedRange { start: u64, end: u64 },

    #[error(
        "marker range {marker_start:#x}..{marker_end:#x} lies inside the basic-block range \
         {bb_start:#x}..{bb_end:#x}, so no marker can be observed"
    )]
    MarkerRangeShadowed {
        marker_start: u64,
        marker_end: u64,
        bb_start: u64,
        bb_end: u64,
    },

    #[error("invalid address range '{0}': expected START..END")]
    InvalidRange(String),
}
