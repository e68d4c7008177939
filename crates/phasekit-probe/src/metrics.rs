//! Metric names and recording helpers for probe events.
//!
//! Only batch-level events are recorded (flushes, significant events, region
//! boundaries); nothing here runs per retired instruction.

use metrics::{counter, histogram};

pub const COUNTER_FLUSHES: &str = "phasekit_counter_flushes_total";
pub const SIGNIFICANT_EVENTS: &str = "phasekit_significant_events_total";
pub const REGIONS: &str = "phasekit_regions_total";
pub const REGION_INSTRUCTIONS: &str = "phasekit_region_instructions";

pub(crate) fn record_flush(unit: usize) {
    let labels = [("unit", unit.to_string())];
    counter!(COUNTER_FLUSHES, &labels).increment(1);
}

pub(crate) fn record_significant(pc: u64) {
    let labels = [("pc", format!("{pc:#x}"))];
    counter!(SIGNIFICANT_EVENTS, &labels).increment(1);
}

pub(crate) fn record_inst_target() {
    let labels = [("pc", "any")];
    counter!(SIGNIFICANT_EVENTS, &labels).increment(1);
}

pub(crate) fn record_region(cause: &'static str, insts: u64) {
    let labels = [("cause", cause.to_string())];
    counter!(REGIONS, &labels).increment(1);
    #[allow(clippy::cast_precision_loss)]
    histogram!(REGION_INSTRUCTIONS).record(insts as f64);
}
