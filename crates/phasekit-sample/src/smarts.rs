//! Systematic periodic sampling (SMARTS).
//!
//! Each interval is `k * U` instructions. The first `U * (k - 1) - W` run on
//! the fast implementation, then `W` instructions of detailed warmup, then
//! `U` instructions of detailed measurement. The sampler is invoked at the
//! three edges between those phases and reschedules itself.

use metrics::counter;
use tracing::{debug, info, warn};

use crate::SampleError;
use crate::host::{ExitController, ExitDecision, SimHost};
use crate::record::{SampleLog, SampleRecord};

/// Sampling parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SmartsParams {
    /// Interval length in units.
    pub k: u64,
    /// Unit size in instructions.
    pub unit: u64,
    /// Detailed warmup length in instructions.
    pub warmup: u64,
}

impl SmartsParams {
    pub const fn new(k: u64, unit: u64, warmup: u64) -> Self {
        Self { k, unit, warmup }
    }

    pub fn validate(&self) -> Result<(), SampleError> {
        if self.k < 2 {
            return Err(SampleError::InvalidParams(format!(
                "k must be at least 2, got {}",
                self.k
            )));
        }
        if self.unit == 0 {
            return Err(SampleError::InvalidParams("unit size must be nonzero".into()));
        }
        match self.unit.checked_mul(self.k - 1) {
            Some(fast) if fast > self.warmup => Ok(()),
            Some(fast) => Err(SampleError::InvalidParams(format!(
                "warmup {} does not fit before the detailed unit (U*(k-1) = {fast})",
                self.warmup
            ))),
            None => Err(SampleError::InvalidParams("U*(k-1) overflows".into())),
        }
    }

    /// Instructions from an interval start (or a detail end) to the next
    /// warmup start. Only meaningful on validated params.
    pub const fn warmup_start_offset(&self) -> u64 {
        self.unit * (self.k - 1) - self.warmup
    }

    /// Interval length in instructions.
    pub const fn interval(&self) -> u64 {
        self.unit * self.k
    }
}

/// Which edge the next invocation handles.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SamplingState {
    AwaitingWarmupStart,
    InWarmup,
    InDetail,
}

/// SMARTS controller. Requires a switchable processor; on any other host it
/// logs once and does nothing.
///
/// The host must schedule the first exit at [`Self::first_exit_offset`].
pub struct SystematicSampler {
    params: SmartsParams,
    state: SamplingState,
    log: SampleLog,
    index: u64,
    current: SampleRecord,
    last_warmup_start: u64,
    last_detail_start: u64,
    warned: bool,
}

impl SystematicSampler {
    pub fn new(params: SmartsParams, log: SampleLog) -> Result<Self, SampleError> {
        params.validate()?;
        debug!(
            k = params.k,
            unit = params.unit,
            warmup = params.warmup,
            log = %log.path().display(),
            "systematic sampler configured"
        );
        Ok(Self {
            params,
            state: SamplingState::AwaitingWarmupStart,
            log,
            index: 0,
            current: SampleRecord::default(),
            last_warmup_start: 0,
            last_detail_start: 0,
            warned: false,
        })
    }

    pub const fn first_exit_offset(&self) -> u64 {
        self.params.warmup_start_offset()
    }

    pub const fn params(&self) -> SmartsParams {
        self.params
    }

    pub const fn state(&self) -> SamplingState {
        self.state
    }

    /// Index of the interval in progress.
    pub const fn sample_index(&self) -> u64 {
        self.index
    }

    pub const fn log(&self) -> &SampleLog {
        &self.log
    }
}

impl ExitController for SystematicSampler {
    fn on_invoke(&mut self, host: &mut dyn SimHost) -> Result<ExitDecision, SampleError> {
        let tick = host.cur_tick();
        let Some(insts) = host.switchable().map(|cpu| cpu.total_insts()) else {
            if !self.warned {
                self.warned = true;
                warn!("systematic sampling needs a switchable processor, sampler is inactive");
            }
            return Ok(ExitDecision::Continue);
        };

        host.dump_stats();
        match self.state {
            SamplingState::AwaitingWarmupStart => {
                self.current = SampleRecord {
                    warmup_start_tick: tick,
                    warmup_start_inst_count: insts.saturating_sub(self.last_warmup_start),
                    ..SampleRecord::default()
                };
                self.last_warmup_start = insts;
                host.reset_stats();
                if let Some(cpu) = host.switchable() {
                    cpu.switch();
                }
                host.schedule_exits(&[
                    self.params.warmup,
                    self.params.unit + self.params.warmup,
                ]);
                debug!(sample = self.index, tick, insts, "warmup start");
                self.state = SamplingState::InWarmup;
            }
            SamplingState::InWarmup => {
                self.current.detail_start_tick = tick;
                self.current.detail_start_inst_count = insts.saturating_sub(self.last_detail_start);
                self.last_detail_start = insts;
                host.reset_stats();
                debug!(sample = self.index, tick, insts, "detail start");
                self.state = SamplingState::InDetail;
            }
            SamplingState::InDetail => {
                self.current.detail_end_tick = tick;
                self.current.detail_end_inst_count = insts.saturating_sub(self.last_detail_start);
                self.log.insert(self.index, self.current);
                self.log.flush()?;
                host.reset_stats();
                if let Some(cpu) = host.switchable() {
                    cpu.switch();
                }
                host.schedule_exits(&[self.params.warmup_start_offset()]);
                counter!(crate::metrics::SAMPLES).increment(1);
                info!(
                    sample = self.index,
                    detail_insts = self.current.detail_end_inst_count,
                    ticks = tick.saturating_sub(self.current.detail_start_tick),
                    "sample complete"
                );
                self.index += 1;
                self.state = SamplingState::AwaitingWarmupStart;
            }
        }
        Ok(ExitDecision::Continue)
    }

    fn name(&self) -> &'static str {
        "smarts"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Effect, RecordingHost};

    fn sampler(dir: &tempfile::TempDir, params: SmartsParams) -> SystematicSampler {
        let log = SampleLog::open(dir.path().join("smarts.json")).unwrap();
        SystematicSampler::new(params, log).unwrap()
    }

    #[test]
    fn test_params_validation() {
        assert!(SmartsParams::new(2, 1000, 100).validate().is_ok());
        assert!(SmartsParams::new(1, 1000, 100).validate().is_err());
        assert!(SmartsParams::new(2, 0, 0).validate().is_err());
        assert!(SmartsParams::new(2, 100, 100).validate().is_err());
        assert!(SmartsParams::new(u64::MAX, u64::MAX, 0).validate().is_err());
        assert_eq!(SmartsParams::new(3, 1000, 100).warmup_start_offset(), 1900);
        assert_eq!(SmartsParams::new(3, 1000, 100).interval(), 3000);
    }

    #[test]
    fn test_full_interval() {
        let dir = tempfile::tempdir().unwrap();
        let mut smarts = sampler(&dir, SmartsParams::new(2, 1000, 100));
        assert_eq!(smarts.first_exit_offset(), 900);

        let mut host = RecordingHost::switchable();
        host.advance(900, 900);
        assert_eq!(smarts.on_invoke(&mut host).unwrap(), ExitDecision::Continue);
        assert_eq!(
            host.drain(),
            vec![
                Effect::Dump,
                Effect::Reset,
                Effect::Switch,
                Effect::Schedule(vec![100, 1100]),
            ]
        );
        assert_eq!(smarts.state(), SamplingState::InWarmup);

        host.advance(100, 400);
        smarts.on_invoke(&mut host).unwrap();
        assert_eq!(host.drain(), vec![Effect::Dump, Effect::Reset]);
        assert_eq!(smarts.state(), SamplingState::InDetail);

        host.advance(1000, 4000);
        smarts.on_invoke(&mut host).unwrap();
        assert_eq!(
            host.drain(),
            vec![
                Effect::Dump,
                Effect::Reset,
                Effect::Switch,
                Effect::Schedule(vec![900]),
            ]
        );
        assert_eq!(smarts.state(), SamplingState::AwaitingWarmupStart);
        assert!(!host.detailed);

        let record = smarts.log().samples()[&0];
        assert_eq!(
            record,
            SampleRecord {
                warmup_start_tick: 900,
                warmup_start_inst_count: 900,
                detail_start_tick: 1300,
                detail_start_inst_count: 1000,
                detail_end_tick: 5300,
                detail_end_inst_count: 1000,
            }
        );
        assert_eq!(smarts.sample_index(), 1);
        assert!(dir.path().join("smarts.json").exists());
    }

    #[test]
    fn test_second_interval_deltas() {
        let dir = tempfile::tempdir().unwrap();
        let mut smarts = sampler(&dir, SmartsParams::new(2, 1000, 100));
        let mut host = RecordingHost::switchable();
        for step in [900, 100, 1000, 900, 100, 1000] {
            host.advance(step, step);
            smarts.on_invoke(&mut host).unwrap();
        }
        let second = smarts.log().samples()[&1];
        // Warmup starts are one interval apart.
        assert_eq!(second.warmup_start_inst_count, 2000);
        assert_eq!(second.detail_start_inst_count, 2000);
        assert_eq!(second.detail_end_inst_count, 1000);
        assert_eq!(smarts.log().samples().len(), 2);
    }

    #[test]
    fn test_inactive_without_switching() {
        let dir = tempfile::tempdir().unwrap();
        let mut smarts = sampler(&dir, SmartsParams::new(2, 1000, 100));
        let mut host = RecordingHost::default();
        for _ in 0..3 {
            assert_eq!(smarts.on_invoke(&mut host).unwrap(), ExitDecision::Continue);
        }
        assert!(host.effects.is_empty());
        assert_eq!(smarts.state(), SamplingState::AwaitingWarmupStart);
        assert!(!dir.path().join("smarts.json").exists());
    }
}
