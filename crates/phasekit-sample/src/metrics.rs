//! Metric names for controller actions.

pub const CHECKPOINTS: &str = "phasekit_checkpoints_total";
pub const SAMPLES: &str = "phasekit_samples_total";
