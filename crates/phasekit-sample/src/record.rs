//! Persisted sampling-interval records.
//!
//! The log is a JSON object. This run's records live under
//! [`SAMPLE_DATA_KEY`] as a map from sample index to [`SampleRecord`]; any
//! other top-level keys of a pre-existing file are carried through untouched.
//! Every flush rewrites the whole file through a temporary file in the same
//! directory, so an interrupted write leaves the previous version intact.

use std::collections::BTreeMap;
use std::fs;
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::SampleError;

/// Top-level key holding the sample records.
pub const SAMPLE_DATA_KEY: &str = "sample-data";

/// Ticks and instruction deltas of one warmup + detail interval.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SampleRecord {
    pub warmup_start_tick: u64,
    /// Instructions since the previous warmup start.
    pub warmup_start_inst_count: u64,
    pub detail_start_tick: u64,
    /// Instructions since the previous detail start.
    pub detail_start_inst_count: u64,
    pub detail_end_tick: u64,
    /// Instructions in the detailed window.
    pub detail_end_inst_count: u64,
}

/// Sample records plus whatever else the log file already held.
#[derive(Debug)]
pub struct SampleLog {
    path: PathBuf,
    other: Map<String, Value>,
    samples: BTreeMap<u64, SampleRecord>,
}

impl SampleLog {
    /// Open the log at `path`, keeping existing top-level keys except the
    /// sample data, which starts empty. A missing file is fine.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, SampleError> {
        let path = path.into();
        let other = match fs::read(&path) {
            Ok(bytes) => match serde_json::from_slice::<Value>(&bytes)? {
                Value::Object(mut map) => {
                    map.remove(SAMPLE_DATA_KEY);
                    map
                }
                _ => return Err(SampleError::MalformedLog(path)),
            },
            Err(e) if e.kind() == ErrorKind::NotFound => Map::new(),
            Err(source) => return Err(SampleError::LogIo { path, source }),
        };
        debug!(path = %path.display(), keys = other.len(), "sample log opened");
        Ok(Self {
            path,
            other,
            samples: BTreeMap::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn insert(&mut self, index: u64, record: SampleRecord) {
        self.samples.insert(index, record);
    }

    pub const fn samples(&self) -> &BTreeMap<u64, SampleRecord> {
        &self.samples
    }

    /// Rewrite the file with the current records.
    pub fn flush(&self) -> Result<(), SampleError> {
        let io_err = |source| SampleError::LogIo {
            path: self.path.clone(),
            source,
        };

        let mut doc = self.other.clone();
        doc.insert(SAMPLE_DATA_KEY.to_string(), serde_json::to_value(&self.samples)?);

        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let tmp = NamedTempFile::new_in(dir).map_err(io_err)?;
        {
            let mut writer = BufWriter::new(tmp.as_file());
            let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
            let mut ser = serde_json::Serializer::with_formatter(&mut writer, formatter);
            Value::Object(doc).serialize(&mut ser)?;
            writer.flush().map_err(io_err)?;
        }
        tmp.persist(&self.path).map_err(|e| io_err(e.error))?;
        debug!(path = %self.path.display(), samples = self.samples.len(), "sample log written");
        Ok(())
    }
}
