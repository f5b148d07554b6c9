//! Streaming Accumulator
//!
//! Reassembles complete tool calls from the partial fragments a provider
//! streams. Fragments are keyed by their positional index because the call id
//! and name may themselves arrive late.
//!
//! The accumulator is shared by reference (`&self`) between the task feeding
//! fragments and any task reading the finalized calls; per-index records live
//! behind a single `RwLock`.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use toolgate_core::streaming::{StreamToolCall, ToolCallDelta};

/// The growing record for one stream index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartialToolCall {
    pub id: String,
    pub name: String,
    pub arguments: String,
}

impl PartialToolCall {
    pub fn is_complete(&self) -> bool {
        !self.id.is_empty() && !self.name.is_empty()
    }
}

#[derive(Debug, Default)]
struct AccumulatorState {
    calls: BTreeMap<usize, PartialToolCall>,
    warnings: Vec<String>,
    /// Indices already reported as dropped by `finalize`
    dropped: BTreeSet<usize>,
}

/// Thread-safe assembler of streamed tool-call fragments.
#[derive(Debug, Default)]
pub struct StreamAccumulator {
    state: RwLock<AccumulatorState>,
}

impl StreamAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, AccumulatorState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, AccumulatorState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Merge one fragment into the record for its index.
    ///
    /// A fragment that changes an already-recorded id or name produces a
    /// warning; the latest value wins.
    pub fn process_delta(&self, delta: &ToolCallDelta) {
        let mut state = self.write();
        let AccumulatorState { calls, warnings, .. } = &mut *state;
        let entry = calls.entry(delta.index).or_default();

        if let Some(id) = delta.id.as_deref().filter(|s| !s.is_empty()) {
            if !entry.id.is_empty() && entry.id != id {
                let warning = format!(
                    "tool call id changed at index {}: '{}' -> '{}'",
                    delta.index, entry.id, id
                );
                tracing::warn!("{}", warning);
                warnings.push(warning);
            }
            entry.id = id.to_string();
        }

        if let Some(name) = delta.name.as_deref().filter(|s| !s.is_empty()) {
            if !entry.name.is_empty() && entry.name != name {
                let warning = format!(
                    "tool call name changed at index {}: '{}' -> '{}'",
                    delta.index, entry.name, name
                );
                tracing::warn!("{}", warning);
                warnings.push(warning);
            }
            entry.name = name.to_string();
        }

        entry.arguments.push_str(&delta.arguments);
    }

    /// Merge a sequence of fragments in order.
    pub fn process_deltas<'a, I>(&self, deltas: I)
    where
        I: IntoIterator<Item = &'a ToolCallDelta>,
    {
        for delta in deltas {
            self.process_delta(delta);
        }
    }

    /// Assembled calls in index order.
    ///
    /// Records still missing an id or a name are skipped and recorded as a
    /// warning, once per index. The accumulated records are left intact, so
    /// this can be called repeatedly.
    pub fn finalize(&self) -> Vec<StreamToolCall> {
        let mut state = self.write();
        let AccumulatorState {
            calls,
            warnings,
            dropped,
        } = &mut *state;
        let mut out = Vec::with_capacity(calls.len());

        for (index, call) in calls.iter() {
            if !call.is_complete() {
                if dropped.insert(*index) {
                    let warning = format!(
                        "dropping incomplete tool call at index {} (id: '{}', name: '{}')",
                        index, call.id, call.name
                    );
                    tracing::warn!("{}", warning);
                    warnings.push(warning);
                }
                continue;
            }
            out.push(StreamToolCall {
                id: call.id.clone(),
                name: call.name.clone(),
                arguments: call.arguments.clone(),
            });
        }
        out
    }

    /// Snapshot of the record at `index`, complete or not.
    pub fn get(&self, index: usize) -> Option<PartialToolCall> {
        self.read().calls.get(&index).cloned()
    }

    /// Data-quality warnings recorded since the last reset.
    pub fn warnings(&self) -> Vec<String> {
        self.read().warnings.clone()
    }

    pub fn has_warnings(&self) -> bool {
        !self.read().warnings.is_empty()
    }

    /// Number of distinct indices seen.
    pub fn len(&self) -> usize {
        self.read().calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().calls.is_empty()
    }

    /// Clear all records and warnings for a new streaming turn.
    pub fn reset(&self) {
        let mut state = self.write();
        state.calls.clear();
        state.warnings.clear();
        state.dropped.clear();
    }
}
