//! Stateless controllers: stop, switch, statistics, single checkpoint.

use std::path::PathBuf;

use tracing::warn;

use crate::SampleError;
use crate::host::{ExitController, ExitDecision, SimHost, request_checkpoint};

/// Stops the run on every invocation.
#[derive(Debug, Default)]
pub struct ExitNow;

impl ExitController for ExitNow {
    fn on_invoke(&mut self, _host: &mut dyn SimHost) -> Result<ExitDecision, SampleError> {
        Ok(ExitDecision::Stop)
    }

    fn name(&self) -> &'static str {
        "exit"
    }
}

/// Switches the core implementation on every invocation, if the processor
/// can switch. Otherwise does nothing.
#[derive(Debug, Default)]
pub struct SwitchCores {
    warned: bool,
}

impl ExitController for SwitchCores {
    fn on_invoke(&mut self, host: &mut dyn SimHost) -> Result<ExitDecision, SampleError> {
        match host.switchable() {
            Some(cpu) => cpu.switch(),
            None if !self.warned => {
                self.warned = true;
                warn!("processor is not switchable, switch requests are ignored");
            }
            None => {}
        }
        Ok(ExitDecision::Continue)
    }

    fn name(&self) -> &'static str {
        "switch"
    }
}

/// Statistics operation performed by [`StatsController`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatsAction {
    Dump,
    Reset,
    /// Dump, then reset.
    DumpReset,
    Skip,
}

/// Performs a statistics operation and continues.
#[derive(Debug)]
pub struct StatsController {
    action: StatsAction,
}

impl StatsController {
    pub const fn new(action: StatsAction) -> Self {
        Self { action }
    }

    pub const fn action(&self) -> StatsAction {
        self.action
    }
}

impl ExitController for StatsController {
    fn on_invoke(&mut self, host: &mut dyn SimHost) -> Result<ExitDecision, SampleError> {
        match self.action {
            StatsAction::Dump => host.dump_stats(),
            StatsAction::Reset => host.reset_stats(),
            StatsAction::DumpReset => {
                host.dump_stats();
                host.reset_stats();
            }
            StatsAction::Skip => {}
        }
        Ok(ExitDecision::Continue)
    }

    fn name(&self) -> &'static str {
        match self.action {
            StatsAction::Dump => "dump-stats",
            StatsAction::Reset => "reset-stats",
            StatsAction::DumpReset => "dump-reset-stats",
            StatsAction::Skip => "skip",
        }
    }
}

/// Checkpoints into `dir/cpt.<tick>` on every invocation.
#[derive(Debug)]
pub struct SaveCheckpoint {
    dir: PathBuf,
}

impl SaveCheckpoint {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl ExitController for SaveCheckpoint {
    fn on_invoke(&mut self, host: &mut dyn SimHost) -> Result<ExitDecision, SampleError> {
        let tick = host.cur_tick();
        request_checkpoint(host, &self.dir, tick)?;
        Ok(ExitDecision::Continue)
    }

    fn name(&self) -> &'static str {
        "checkpoint"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Effect, RecordingHost};

    #[test]
    fn test_exit_now() {
        let mut host = RecordingHost::default();
        let mut exit = ExitNow;
        assert_eq!(exit.on_invoke(&mut host).unwrap(), ExitDecision::Stop);
        assert_eq!(exit.on_invoke(&mut host).unwrap(), ExitDecision::Stop);
        assert!(host.effects.is_empty());
    }

    #[test]
    fn test_switch_alternates() {
        let mut host = RecordingHost::switchable();
        let mut switch = SwitchCores::default();
        for expected in [true, false, true] {
            assert_eq!(switch.on_invoke(&mut host).unwrap(), ExitDecision::Continue);
            assert_eq!(host.detailed, expected);
        }
        assert_eq!(host.drain(), vec![Effect::Switch; 3]);
    }

    #[test]
    fn test_switch_without_capability_is_noop() {
        let mut host = RecordingHost::default();
        let mut switch = SwitchCores::default();
        assert_eq!(switch.on_invoke(&mut host).unwrap(), ExitDecision::Continue);
        assert_eq!(switch.on_invoke(&mut host).unwrap(), ExitDecision::Continue);
        assert!(host.effects.is_empty());
    }

    #[test]
    fn test_stats_actions() {
        let cases = [
            (StatsAction::Dump, vec![Effect::Dump]),
            (StatsAction::Reset, vec![Effect::Reset]),
            (StatsAction::DumpReset, vec![Effect::Dump, Effect::Reset]),
            (StatsAction::Skip, vec![]),
        ];
        for (action, expected) in cases {
            let mut host = RecordingHost::default();
            let mut controller = StatsController::new(action);
            assert_eq!(controller.on_invoke(&mut host).unwrap(), ExitDecision::Continue);
            assert_eq!(host.drain(), expected, "{action:?}");
        }
    }

    #[test]
    fn test_checkpoint_tagged_by_tick() {
        let mut host = RecordingHost {
            tick: 5_000,
            ..RecordingHost::default()
        };
        let mut save = SaveCheckpoint::new("/out");
        assert_eq!(save.on_invoke(&mut host).unwrap(), ExitDecision::Continue);
        host.tick = 9_000;
        save.on_invoke(&mut host).unwrap();
        assert_eq!(host.checkpoints(), vec!["cpt.5000", "cpt.9000"]);
    }

    #[test]
    fn test_checkpoint_failure_propagates() {
        let mut host = RecordingHost {
            fail_checkpoints: true,
            ..RecordingHost::default()
        };
        let err = SaveCheckpoint::new("/out").on_invoke(&mut host).unwrap_err();
        assert!(matches!(err, SampleError::Checkpoint { .. }));
    }
}
