//! Per-core retire traces.
//!
//! The replay host reads Spike-style commit logs:
//!
//! ```text
//! core   0: 3 0x0000000080000000 (0x00000297) x5  0x0000000080000000
//! core   1: 0 0x0000000000010074 (0x00a00513)
//! core   0: 0x80000004
//! ```
//!
//! Only the core index, the privilege level (0 is user mode) and the PC are
//! used; everything after the PC is ignored. The privilege level may be
//! omitted, in which case the instruction counts as user mode. Lines that are
//! not commit records (blank lines, `#` comments, simulator chatter) are
//! skipped.

use std::io::BufRead;
use std::sync::OnceLock;

use regex::Regex;

use crate::{Error, Result};

/// One retired instruction from the trace.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TraceEntry {
    pub core: usize,
    pub pc: u64,
    pub user: bool,
}

impl TraceEntry {
    /// Parse one line. `None` for lines that are not commit records.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if !line.starts_with("core") {
            return None;
        }
        let pattern = COMMIT_PATTERN.get_or_init(|| {
            Regex::new(r"^core\s+(\d+):\s+(?:(\d)\s+)?0x([0-9a-fA-F]+)\b")
                .expect("commit pattern is a valid regex")
        });
        let caps = pattern.captures(line)?;

        let core = caps.get(1)?.as_str().parse().ok()?;
        let user = caps.get(2).is_none_or(|p| p.as_str() == "0");
        let pc = u64::from_str_radix(caps.get(3)?.as_str(), 16).ok()?;
        Some(Self { core, pc, user })
    }
}

static COMMIT_PATTERN: OnceLock<Regex> = OnceLock::new();

/// Streaming reader over a trace, yielding entries with their line numbers.
pub struct TraceReader<R> {
    reader: R,
    line: usize,
    buf: String,
}

impl<R: BufRead> TraceReader<R> {
    pub const fn new(reader: R) -> Self {
        Self {
            reader,
            line: 0,
            buf: String::new(),
        }
    }

    /// Line number of the most recently returned entry (1-based).
    pub const fn line(&self) -> usize {
        self.line
    }
}

impl<R: BufRead> Iterator for TraceReader<R> {
    type Item = Result<(usize, TraceEntry)>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            self.buf.clear();
            match self.reader.read_line(&mut self.buf) {
                Ok(0) => return None,
                Ok(_) => {}
                Err(e) => return Some(Err(Error::Io(e))),
            }
            self.line += 1;
            if let Some(entry) = TraceEntry::parse(&self.buf) {
                return Some(Ok((self.line, entry)));
            }
        }
    }
}

/// Whether `pc` starts a new basic block after `prev` on the same core.
///
/// Anything other than a 2- or 4-byte fall-through is a control transfer.
pub const fn is_block_entry(prev: Option<u64>, pc: u64) -> bool {
    match prev {
        None => true,
        Some(prev) => {
            let step = pc.wrapping_sub(prev);
            step != 2 && step != 4
        }
    }
}
