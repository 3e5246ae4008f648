//! Branch traces.
//!
//! A trace is an append-only JSON-lines file: one header line identifying
//! the run, then one line per resolved decision point. [`TraceReplayer`]
//! checks that a later run takes the same decisions.

use std::cell::RefCell;
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use super::observer::{BranchEvent, Observer};
use crate::error::{EngineResult, ReadError};
use crate::path::{BranchOption, ForkRole};

// =============================================================================
// Records
// =============================================================================

/// Unique identifier of a recorded run
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct TraceId(pub Uuid);

impl TraceId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TraceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TraceHeader {
    pub id: TraceId,
    pub created_at: DateTime<Utc>,
    /// Free-form description of the analysed program
    #[serde(default)]
    pub label: Option<String>,
}

impl TraceHeader {
    pub fn new(label: Option<String>) -> Self {
        Self {
            id: TraceId::new(),
            created_at: Utc::now(),
            label,
        }
    }
}

/// One resolved decision point
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TraceEntry {
    pub sequence: u64,
    pub site: String,
    pub option: BranchOption,
    /// Role of the fork when the decision was taken
    pub role: ForkRole,
    #[serde(default)]
    pub unstable: bool,
}

impl TraceEntry {
    pub fn from_event(sequence: u64, event: &BranchEvent<'_>) -> Self {
        Self {
            sequence,
            site: event.site.to_string(),
            option: event.option,
            role: event.role,
            unstable: event.is_unstable(),
        }
    }

    /// Same decision at the same site
    pub fn same_decision(&self, other: &TraceEntry) -> bool {
        self.site == other.site && self.option == other.option
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum TraceLine {
    Header(TraceHeader),
    Entry(TraceEntry),
}

/// Header and entries of a trace file
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedTrace {
    pub header: TraceHeader,
    pub entries: Vec<TraceEntry>,
}

// =============================================================================
// Storage
// =============================================================================

/// Trace file opened for appending
#[derive(Debug, Clone)]
pub struct TraceStore {
    path: PathBuf,
    header: TraceHeader,
}

impl TraceStore {
    /// Create (or truncate) a trace file and write its header
    pub fn create(path: impl Into<PathBuf>, label: Option<String>) -> EngineResult<Self> {
        let path = path.into();
        let header = TraceHeader::new(label);
        let mut file = File::create(&path)?;
        let line = serde_json::to_string(&TraceLine::Header(header.clone()))?;
        writeln!(file, "{}", line)?;
        file.flush()?;
        debug!(path = %path.display(), id = %header.id, "created trace");
        Ok(Self { path, header })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn header(&self) -> &TraceHeader {
        &self.header
    }

    /// Append one entry
    pub fn append(&self, entry: &TraceEntry) -> EngineResult<()> {
        self.append_all(std::slice::from_ref(entry))
    }

    /// Append several entries in order
    pub fn append_all(&self, entries: &[TraceEntry]) -> EngineResult<()> {
        let mut file = OpenOptions::new().append(true).open(&self.path)?;
        for entry in entries {
            let line = serde_json::to_string(&TraceLine::Entry(entry.clone()))?;
            writeln!(file, "{}", line)?;
        }
        file.flush()?;
        Ok(())
    }

    /// Read a trace file; the first non-empty line must be the header
    pub fn load(path: impl AsRef<Path>) -> EngineResult<LoadedTrace> {
        let path = path.as_ref();
        let reader = BufReader::new(File::open(path)?);
        let mut header = None;
        let mut entries = Vec::new();
        for (line_num, line_result) in reader.lines().enumerate() {
            let line = line_result?;
            if line.trim().is_empty() {
                continue;
            }
            let location = format!("{}:{}", path.display(), line_num + 1);
            let record: TraceLine = serde_json::from_str(&line)
                .map_err(|e| ReadError::new(location.clone(), e.to_string()))?;
            match (record, header.is_some()) {
                (TraceLine::Header(h), false) => header = Some(h),
                (TraceLine::Header(_), true) => {
                    return Err(ReadError::new(location, "duplicate trace header").into())
                }
                (TraceLine::Entry(_), false) => {
                    return Err(ReadError::new(location, "trace entry before header").into())
                }
                (TraceLine::Entry(e), true) => entries.push(e),
            }
        }
        let header = header
            .ok_or_else(|| ReadError::new(path.display().to_string(), "trace has no header"))?;
        Ok(LoadedTrace { header, entries })
    }
}

// =============================================================================
// Replay
// =============================================================================

/// A decision that differs from the recorded one
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceMismatch {
    pub sequence: u64,
    pub expected: Option<TraceEntry>,
    pub found: Option<TraceEntry>,
}

#[derive(Debug, Default)]
struct ReplayState {
    expected: Vec<TraceEntry>,
    cursor: usize,
    mismatches: Vec<TraceMismatch>,
}

/// Observer comparing the decisions of a run against a recorded trace.
/// Clones share their state, so one clone can be handed to the context
/// and another kept to read the result.
#[derive(Debug, Clone, Default)]
pub struct TraceReplayer {
    state: Rc<RefCell<ReplayState>>,
}

impl TraceReplayer {
    pub fn new(expected: Vec<TraceEntry>) -> Self {
        Self {
            state: Rc::new(RefCell::new(ReplayState {
                expected,
                ..ReplayState::default()
            })),
        }
    }

    pub fn from_trace(trace: LoadedTrace) -> Self {
        Self::new(trace.entries)
    }

    /// Decisions checked so far
    pub fn checked(&self) -> usize {
        self.state.borrow().cursor
    }

    /// Mismatches so far, plus one per recorded decision never reached
    pub fn mismatches(&self) -> Vec<TraceMismatch> {
        let state = self.state.borrow();
        let mut all = state.mismatches.clone();
        let checked = state.cursor.min(state.expected.len());
        all.extend(state.expected[checked..].iter().map(|e| TraceMismatch {
            sequence: e.sequence,
            expected: Some(e.clone()),
            found: None,
        }));
        all
    }

    pub fn is_consistent(&self) -> bool {
        self.mismatches().is_empty()
    }
}

impl Observer for TraceReplayer {
    fn on_branch(&mut self, event: &BranchEvent<'_>) {
        let mut state = self.state.borrow_mut();
        let sequence = state.cursor as u64;
        let found = TraceEntry::from_event(sequence, event);
        let expected = state.expected.get(state.cursor).cloned();
        state.cursor += 1;
        let matches = expected.as_ref().map(|e| e.same_decision(&found)).unwrap_or(false);
        if !matches {
            warn!(sequence, site = event.site, option = %event.option, "decision differs from trace");
            state.mismatches.push(TraceMismatch {
                sequence,
                expected,
                found: Some(found),
            });
        }
    }
}
