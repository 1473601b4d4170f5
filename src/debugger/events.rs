//! Notifications emitted by a debug session

use std::collections::BTreeMap;

use serde::Serialize;

use super::breakpoint::ViewPair;
use super::history::SourceRange;
use super::session::SessionState;

/// Values surfaced at a `view()` breakpoint
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BreakpointHit {
    /// Snapshot the hit was recorded in
    pub step: usize,
    pub pairs: Vec<ViewPair>,
    pub values: BTreeMap<String, serde_json::Value>,
}

impl BreakpointHit {
    /// Label and value for each pair, in pair order
    pub fn labeled_values(&self) -> impl Iterator<Item = (&ViewPair, Option<&serde_json::Value>)> {
        self.pairs.iter().map(|p| (p, self.values.get(&p.name)))
    }
}

/// Event delivered to the presentation layer
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    StateChanged {
        from: SessionState,
        to: SessionState,
    },
    SnapshotAppended {
        step: usize,
        range: SourceRange,
    },
    /// Source range to highlight
    Highlight { range: SourceRange },
    BreakpointHit(BreakpointHit),
    /// A captured `console.log` line
    Output { text: String },
    Error { message: String },
}
