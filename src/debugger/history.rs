//! Execution history: the append-only log of snapshots

use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

/// Byte range into the program text; `(0, 0)` when nothing is active
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SourceRange {
    pub start: usize,
    pub end: usize,
}

impl SourceRange {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

impl std::fmt::Display for SourceRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// Point-in-time capture of execution state
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    /// Position in the history, starting at 0
    pub step: usize,
    /// Source range of the node at the top of the stack
    pub range: SourceRange,
    /// Declared variable name -> host value
    pub variables: BTreeMap<String, serde_json::Value>,
    /// Frame descriptions, outermost first
    pub stack: Vec<String>,
    /// Capture time in milliseconds since the Unix epoch
    pub timestamp_ms: u64,
    /// Values named by the view call, empty unless paused at one
    pub breakpoint_values: BTreeMap<String, serde_json::Value>,
}

impl Snapshot {
    pub fn now_ms() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }

    pub fn is_breakpoint(&self) -> bool {
        !self.breakpoint_values.is_empty()
    }
}

/// Ordered, append-only sequence of snapshots
///
/// Entries are never removed or replaced.
#[derive(Debug, Default)]
pub struct ExecutionHistory {
    snapshots: Vec<Snapshot>,
}

impl ExecutionHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, snapshot: Snapshot) {
        tracing::trace!(step = snapshot.step, range = %snapshot.range, "Appending snapshot");
        self.snapshots.push(snapshot);
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Snapshot> {
        self.snapshots.get(index)
    }

    pub fn last(&self) -> Option<&Snapshot> {
        self.snapshots.last()
    }

    /// The entry before the latest, used by step backward
    pub fn second_to_last(&self) -> Option<&Snapshot> {
        self.snapshots.len().checked_sub(2).and_then(|i| self.snapshots.get(i))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Snapshot> {
        self.snapshots.iter()
    }

    pub fn as_slice(&self) -> &[Snapshot] {
        &self.snapshots
    }
}
