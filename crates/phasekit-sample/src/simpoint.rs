//! Indexed multi-checkpoint controller.

use std::path::PathBuf;

use tracing::{debug, warn};

use crate::SampleError;
use crate::host::{ExitController, ExitDecision, SimHost, request_checkpoint};

/// Takes one checkpoint per SimPoint start offset, tagged `SimPoint<i>`.
///
/// The host schedules an exit at each distinct offset. Consecutive equal
/// offsets (a warmup window clipped at zero, for instance) collapse into one
/// exit, so every duplicate is checkpointed in the same invocation.
#[derive(Debug)]
pub struct SimPointCheckpoints {
    dir: PathBuf,
    starts: Vec<u64>,
    cursor: usize,
}

impl SimPointCheckpoints {
    pub fn new(dir: impl Into<PathBuf>, starts: Vec<u64>) -> Result<Self, SampleError> {
        if starts.is_empty() {
            return Err(SampleError::EmptySimPoints);
        }
        if let Some(index) = starts.windows(2).position(|w| w[1] < w[0]) {
            return Err(SampleError::UnsortedSimPoints {
                index: index + 1,
                prev: starts[index],
                next: starts[index + 1],
            });
        }
        debug!(count = starts.len(), "simpoint checkpoints configured");
        Ok(Self {
            dir: dir.into(),
            starts,
            cursor: 0,
        })
    }

    /// Start offsets, ascending.
    pub fn starts(&self) -> &[u64] {
        &self.starts
    }

    /// Distinct offsets, which is where the host must schedule exits.
    pub fn exit_offsets(&self) -> Vec<u64> {
        let mut offsets = self.starts.clone();
        offsets.dedup();
        offsets
    }

    /// Checkpoints taken so far.
    pub const fn taken(&self) -> usize {
        self.cursor
    }

    pub fn is_done(&self) -> bool {
        self.cursor == self.starts.len()
    }
}

impl ExitController for SimPointCheckpoints {
    fn on_invoke(&mut self, host: &mut dyn SimHost) -> Result<ExitDecision, SampleError> {
        if self.is_done() {
            warn!("simpoint controller invoked after its last checkpoint");
            return Ok(ExitDecision::Stop);
        }

        let offset = self.starts[self.cursor];
        request_checkpoint(host, &self.dir, format_args!("SimPoint{}", self.cursor))?;
        self.cursor += 1;
        while self.starts.get(self.cursor) == Some(&offset) {
            request_checkpoint(host, &self.dir, format_args!("SimPoint{}", self.cursor))?;
            self.cursor += 1;
        }

        Ok(ExitDecision::from_stop(self.is_done()))
    }

    fn name(&self) -> &'static str {
        "simpoint"
    }
}
