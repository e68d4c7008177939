//! Routing host exit events to controllers.

use std::fmt;
use std::path::PathBuf;

use rustc_hash::FxHashMap;
use tracing::{debug, warn};

use crate::SampleError;
use crate::basic::{ExitNow, SaveCheckpoint, StatsAction, StatsController, SwitchCores};
use crate::host::{ExitController, ExitDecision, SimHost};

/// Kinds of exit events a host raises.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ExitEvent {
    Exit,
    Checkpoint,
    Switch,
    DumpStats,
    ResetStats,
    MaxInsts,
    SimPoint,
    Region,
    SignificantPc,
}

impl ExitEvent {
    pub const ALL: [Self; 9] = [
        Self::Exit,
        Self::Checkpoint,
        Self::Switch,
        Self::DumpStats,
        Self::ResetStats,
        Self::MaxInsts,
        Self::SimPoint,
        Self::Region,
        Self::SignificantPc,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Exit => "exit",
            Self::Checkpoint => "checkpoint",
            Self::Switch => "switch",
            Self::DumpStats => "dump-stats",
            Self::ResetStats => "reset-stats",
            Self::MaxInsts => "max-insts",
            Self::SimPoint => "simpoint",
            Self::Region => "region",
            Self::SignificantPc => "significant-pc",
        }
    }
}

impl fmt::Display for ExitEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Maps exit events to controllers, filling in defaults on first use.
pub struct ExitDispatcher {
    outdir: PathBuf,
    controllers: FxHashMap<ExitEvent, Box<dyn ExitController>>,
}

impl ExitDispatcher {
    /// `outdir` is where the default checkpoint controller writes.
    pub fn new(outdir: impl Into<PathBuf>) -> Self {
        Self {
            outdir: outdir.into(),
            controllers: FxHashMap::default(),
        }
    }

    /// Handle `event` with `controller`, replacing any previous one.
    #[must_use]
    pub fn on(mut self, event: ExitEvent, controller: impl ExitController + 'static) -> Self {
        self.set(event, Box::new(controller));
        self
    }

    pub fn set(&mut self, event: ExitEvent, controller: Box<dyn ExitController>) {
        debug!(event = %event, controller = controller.name(), "exit handler set");
        self.controllers.insert(event, controller);
    }

    pub fn has_handler(&self, event: ExitEvent) -> bool {
        self.controllers.contains_key(&event)
    }

    /// Invoke the controller for `event`.
    pub fn dispatch(
        &mut self,
        event: ExitEvent,
        host: &mut dyn SimHost,
    ) -> Result<ExitDecision, SampleError> {
        let outdir = &self.outdir;
        let controller = self.controllers.entry(event).or_insert_with(|| {
            let (controller, effect) = default_controller(event, outdir);
            warn!("No behavior was set for {event:?}; default behavior is {effect}");
            controller
        });
        let decision = controller.on_invoke(host)?;
        debug!(event = %event, controller = controller.name(), ?decision, "exit handled");
        Ok(decision)
    }
}

fn default_controller(
    event: ExitEvent,
    outdir: &std::path::Path,
) -> (Box<dyn ExitController>, &'static str) {
    match event {
        ExitEvent::Exit | ExitEvent::MaxInsts | ExitEvent::SignificantPc => {
            (Box::new(ExitNow), "exiting the simulation")
        }
        ExitEvent::Checkpoint => (
            Box::new(SaveCheckpoint::new(outdir)),
            "taking a checkpoint",
        ),
        ExitEvent::Switch => (Box::new(SwitchCores::default()), "switching processors"),
        ExitEvent::DumpStats => (
            Box::new(StatsController::new(StatsAction::Dump)),
            "dumping stats",
        ),
        ExitEvent::ResetStats | ExitEvent::SimPoint => (
            Box::new(StatsController::new(StatsAction::Reset)),
            "resetting stats",
        ),
        ExitEvent::Region => (
            Box::new(StatsController::new(StatsAction::Skip)),
            "skipping",
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Effect, RecordingHost};

    #[test]
    fn test_defaults() {
        let mut dispatcher = ExitDispatcher::new("/out");
        let mut host = RecordingHost {
            tick: 42,
            ..RecordingHost::default()
        };

        for event in [ExitEvent::Exit, ExitEvent::MaxInsts, ExitEvent::SignificantPc] {
            assert_eq!(dispatcher.dispatch(event, &mut host).unwrap(), ExitDecision::Stop);
        }
        assert!(host.effects.is_empty());

        let cases = [
            (ExitEvent::Checkpoint, vec![Effect::Checkpoint("/out/cpt.42".into())]),
            (ExitEvent::DumpStats, vec![Effect::Dump]),
            (ExitEvent::ResetStats, vec![Effect::Reset]),
            (ExitEvent::SimPoint, vec![Effect::Reset]),
            (ExitEvent::Region, vec![]),
            (ExitEvent::Switch, vec![]),
        ];
        for (event, expected) in cases {
            assert_eq!(
                dispatcher.dispatch(event, &mut host).unwrap(),
                ExitDecision::Continue
            );
            assert_eq!(host.drain(), expected, "{event}");
        }
        assert!(ExitEvent::ALL.iter().all(|e| dispatcher.has_handler(*e)));
    }

    #[test]
    fn test_user_controller_overrides_default() {
        let mut dispatcher =
            ExitDispatcher::new("/out").on(ExitEvent::Exit, StatsController::new(StatsAction::Dump));
        let mut host = RecordingHost::default();
        assert_eq!(
            dispatcher.dispatch(ExitEvent::Exit, &mut host).unwrap(),
            ExitDecision::Continue
        );
        assert_eq!(host.drain(), vec![Effect::Dump]);
    }

    #[test]
    fn test_controller_state_persists() {
        let mut dispatcher = ExitDispatcher::new("/out");
        let mut host = RecordingHost::switchable();
        dispatcher.dispatch(ExitEvent::Switch, &mut host).unwrap();
        dispatcher.dispatch(ExitEvent::Switch, &mut host).unwrap();
        assert_eq!(host.drain(), vec![Effect::Switch, Effect::Switch]);
        assert!(!host.detailed);
    }
}
