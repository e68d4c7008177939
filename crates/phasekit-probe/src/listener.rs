//! Retire-event listeners and the per-unit probe point that fans events out.
//!
//! The host owns one [`ProbePoint`] per execution unit and calls it for every
//! retired instruction of that unit. Listeners never see events of another
//! unit, so they need no synchronization of their own; anything shared across
//! units sits behind the handle a listener was given at setup.

/// One retired instruction as delivered by the host.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Retired {
    pub pc: u64,
    /// Whether the instruction retired in user mode.
    pub user: bool,
}

impl Retired {
    /// User-mode instruction at `pc`.
    pub const fn new(pc: u64) -> Self {
        Self { pc, user: true }
    }

    /// Non-user (kernel/supervisor) instruction at `pc`.
    pub const fn privileged(pc: u64) -> Self {
        Self { pc, user: false }
    }
}

impl From<u64> for Retired {
    fn from(pc: u64) -> Self {
        Self::new(pc)
    }
}

/// Listener behavior trait.
///
/// All methods have default no-op implementations, so a listener only
/// implements the events it cares about.
pub trait RetireListener: Send {
    /// Called at basic block entry, before the block's first `on_retire`.
    fn on_block(&mut self, _pc: u64) {}

    /// Called once per retired instruction.
    fn on_retire(&mut self, _inst: Retired) {}

    /// Resume reacting to events.
    fn start_listening(&mut self) {}

    /// Stop reacting to events. Accumulated state is kept.
    fn stop_listening(&mut self) {}

    fn is_listening(&self) -> bool {
        true
    }
}

/// Per-unit fan-out of retire events to the attached listeners.
#[derive(Default)]
pub struct ProbePoint {
    listeners: Vec<Box<dyn RetireListener>>,
}

impl ProbePoint {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&mut self, listener: Box<dyn RetireListener>) {
        self.listeners.push(listener);
    }

    #[inline]
    pub fn notify_block(&mut self, pc: u64) {
        for listener in &mut self.listeners {
            listener.on_block(pc);
        }
    }

    #[inline]
    pub fn notify_retire(&mut self, inst: Retired) {
        for listener in &mut self.listeners {
            listener.on_retire(inst);
        }
    }

    pub fn start_listening(&mut self) {
        for listener in &mut self.listeners {
            listener.start_listening();
        }
    }

    pub fn stop_listening(&mut self) {
        for listener in &mut self.listeners {
            listener.stop_listening();
        }
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU64, Ordering};

    use super::*;

    struct Tally {
        blocks: Arc<AtomicU64>,
        insts: Arc<AtomicU64>,
        listening: bool,
    }

    impl RetireListener for Tally {
        fn on_block(&mut self, _pc: u64) {
            if self.listening {
                self.blocks.fetch_add(1, Ordering::Relaxed);
            }
        }

        fn on_retire(&mut self, _inst: Retired) {
            if self.listening {
                self.insts.fetch_add(1, Ordering::Relaxed);
            }
        }

        fn start_listening(&mut self) {
            self.listening = true;
        }

        fn stop_listening(&mut self) {
            self.listening = false;
        }
    }

    #[test]
    fn test_probe_point_fans_out() {
        let blocks = Arc::new(AtomicU64::new(0));
        let insts = Arc::new(AtomicU64::new(0));
        let mut probe = ProbePoint::new();
        for _ in 0..2 {
            probe.attach(Box::new(Tally {
                blocks: Arc::clone(&blocks),
                insts: Arc::clone(&insts),
                listening: true,
            }));
        }
        assert_eq!(probe.len(), 2);

        probe.notify_block(0x1000);
        probe.notify_retire(Retired::new(0x1000));
        probe.notify_retire(0x1004.into());
        assert_eq!(blocks.load(Ordering::Relaxed), 2);
        assert_eq!(insts.load(Ordering::Relaxed), 4);

        probe.stop_listening();
        probe.notify_retire(Retired::privileged(0x1008));
        assert_eq!(insts.load(Ordering::Relaxed), 4);

        probe.start_listening();
        probe.notify_retire(Retired::new(0x100c));
        assert_eq!(insts.load(Ordering::Relaxed), 6);
    }
}
