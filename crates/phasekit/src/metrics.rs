//! Metrics registration and a terminal recorder.
//!
//! The probe and controller crates record through the `metrics` facade; this
//! module describes those metrics and provides [`CliRecorder`], which keeps
//! them in memory and prints a summary when the CLI exits.

use std::collections::HashMap;
use std::sync::Arc;

use metrics::{
    Counter, Gauge, Histogram, Key, KeyName, Metadata, Recorder, SharedString, Unit,
    describe_counter, describe_histogram,
};
use parking_lot::RwLock;
use phasekit_probe::metrics::{COUNTER_FLUSHES, REGION_INSTRUCTIONS, REGIONS, SIGNIFICANT_EVENTS};
use phasekit_sample::metrics::{CHECKPOINTS, SAMPLES};

/// Register metric descriptions. Call once at startup.
pub fn init() {
    describe_counter!(
        COUNTER_FLUSHES,
        Unit::Count,
        "Local counter flushes into the global aggregator"
    );
    describe_counter!(
        SIGNIFICANT_EVENTS,
        Unit::Count,
        "Target PCs reaching their count"
    );
    describe_counter!(REGIONS, Unit::Count, "Closed regions");
    describe_counter!(CHECKPOINTS, Unit::Count, "Checkpoints requested");
    describe_counter!(SAMPLES, Unit::Count, "Completed sampling intervals");

    describe_histogram!(
        REGION_INSTRUCTIONS,
        Unit::Count,
        "Counted instructions per closed region"
    );
}

#[derive(Default)]
struct CounterStorage {
    values: RwLock<HashMap<String, u64>>,
}

#[derive(Default)]
struct HistogramStorage {
    values: RwLock<HashMap<String, Vec<f64>>>,
}

struct CliCounter {
    key: String,
    storage: Arc<CounterStorage>,
}

impl metrics::CounterFn for CliCounter {
    fn increment(&self, value: u64) {
        let mut values = self.storage.values.write();
        *values.entry(self.key.clone()).or_insert(0) += value;
    }

    fn absolute(&self, value: u64) {
        let mut values = self.storage.values.write();
        values.insert(self.key.clone(), value);
    }
}

struct CliHistogram {
    key: String,
    storage: Arc<HistogramStorage>,
}

impl metrics::HistogramFn for CliHistogram {
    fn record(&self, value: f64) {
        let mut values = self.storage.values.write();
        values.entry(self.key.clone()).or_default().push(value);
    }
}

/// Recorder that keeps counters and histograms in memory.
///
/// Gauges are accepted and discarded; nothing in this workspace sets one.
#[derive(Default)]
pub struct CliRecorder {
    counters: Arc<CounterStorage>,
    histograms: Arc<HistogramStorage>,
}

impl CliRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install as the global recorder. `None` if one is already installed.
    pub fn install(self) -> Option<CliRecorderHandle> {
        let counters = Arc::clone(&self.counters);
        let histograms = Arc::clone(&self.histograms);
        metrics::set_global_recorder(self).ok()?;
        Some(CliRecorderHandle {
            counters,
            histograms,
        })
    }
}

fn key_to_string(key: &Key) -> String {
    let name = key.name();
    let labels = key.labels();
    if labels.len() == 0 {
        name.to_string()
    } else {
        let label_str: Vec<String> = labels
            .map(|l| format!("{}={}", l.key(), l.value()))
            .collect();
        format!("{}{{{}}}", name, label_str.join(","))
    }
}

impl Recorder for CliRecorder {
    fn describe_counter(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}
    fn describe_gauge(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}
    fn describe_histogram(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}

    fn register_counter(&self, key: &Key, _metadata: &Metadata<'_>) -> Counter {
        Counter::from_arc(Arc::new(CliCounter {
            key: key_to_string(key),
            storage: Arc::clone(&self.counters),
        }))
    }

    fn register_gauge(&self, _key: &Key, _metadata: &Metadata<'_>) -> Gauge {
        Gauge::noop()
    }

    fn register_histogram(&self, key: &Key, _metadata: &Metadata<'_>) -> Histogram {
        Histogram::from_arc(Arc::new(CliHistogram {
            key: key_to_string(key),
            storage: Arc::clone(&self.histograms),
        }))
    }
}

/// Read access to what an installed [`CliRecorder`] collected.
pub struct CliRecorderHandle {
    counters: Arc<CounterStorage>,
    histograms: Arc<HistogramStorage>,
}

impl CliRecorderHandle {
    pub fn get_counter(&self, key: &str) -> Option<u64> {
        self.counters.values.read().get(key).copied()
    }

    /// Sum of a counter over all label sets.
    pub fn counter_total(&self, name: &str) -> u64 {
        self.counters
            .values
            .read()
            .iter()
            .filter(|(key, _)| {
                key.strip_prefix(name)
                    .is_some_and(|rest| rest.is_empty() || rest.starts_with('{'))
            })
            .map(|(_, v)| v)
            .sum()
    }

    pub fn print_summary(&self) {
        let counters = self.counters.values.read();
        let histograms = self.histograms.values.read();

        if counters.is_empty() && histograms.is_empty() {
            println!("No metrics collected.");
            return;
        }

        println!();
        println!("## Metrics Summary");
        println!();

        if !counters.is_empty() {
            println!("### Counters");
            let mut keys: Vec<_> = counters.keys().collect();
            keys.sort();
            for key in keys {
                if let Some(value) = counters.get(key) {
                    println!("  {key}: {value}");
                }
            }
            println!();
        }

        if !histograms.is_empty() {
            println!("### Histograms");
            let mut keys: Vec<_> = histograms.keys().collect();
            keys.sort();
            for key in keys {
                if let Some(values) = histograms.get(key)
                    && !values.is_empty()
                {
                    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
                    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                    let sum: f64 = values.iter().sum();
                    #[allow(clippy::cast_precision_loss)]
                    let avg = sum / values.len() as f64;
                    println!(
                        "  {key}: count={}, min={min:.0}, max={max:.0}, avg={avg:.1}",
                        values.len()
                    );
                }
            }
            println!();
        }
    }
}
