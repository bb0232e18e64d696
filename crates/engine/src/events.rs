//! Event types for session change notifications.
//!
//! Hosts use these to react to lifecycle changes (re-layout after a panel
//! appears, repaint after edges move) without polling. The test harness
//! uses them to verify ordering invariants: within one statement,
//! resource events precede cell events precede edge events, and
//! `StatementSettled` is always last.

use crate::api::{Handle, ResourceKind};
use crate::connector::EdgeId;

/// Events emitted by a session while statements execute.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// A creation call was intercepted and a descriptor registered.
    ResourceCreated { handle: Handle, kind: ResourceKind, name: String },

    /// A deletion call was intercepted; the descriptor is now marked
    /// deleted and its panel removed.
    ResourceDeleted { handle: Handle },

    /// A state-table cell's rendered text changed.
    CellChanged { table: usize, row: usize, text: String, flashed: bool },

    /// A reference-valued cell gained an edge to its target's panel.
    EdgeAdded { edge: EdgeId, target: Handle },

    /// An edge was dropped: its cell's reference changed, or its target
    /// vanished from the visual tree.
    EdgeRemoved { edge: EdgeId },

    /// Post-statement settling finished (routing recomputed, highlights
    /// applied). Emitted exactly once per `step`, including the empty
    /// terminal step.
    StatementSettled { index: usize },
}

/// Simple event collector for hosts and tests.
#[derive(Default)]
pub struct EventCollector {
    events: Vec<SessionEvent>,
}

impl EventCollector {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn push(&mut self, event: SessionEvent) {
        self.events.push(event);
    }

    pub fn extend(&mut self, events: impl IntoIterator<Item = SessionEvent>) {
        self.events.extend(events);
    }

    pub fn events(&self) -> &[SessionEvent] {
        &self.events
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Filter to only ResourceCreated events.
    pub fn resources_created(&self) -> Vec<(Handle, ResourceKind, &str)> {
        self.events
            .iter()
            .filter_map(|e| match e {
                SessionEvent::ResourceCreated { handle, kind, name } => {
                    Some((*handle, *kind, name.as_str()))
                }
                _ => None,
            })
            .collect()
    }

    /// Filter to only CellChanged events.
    pub fn cells_changed(&self) -> Vec<(usize, usize, &str)> {
        self.events
            .iter()
            .filter_map(|e| match e {
                SessionEvent::CellChanged { table, row, text, .. } => {
                    Some((*table, *row, text.as_str()))
                }
                _ => None,
            })
            .collect()
    }

    /// Filter to only EdgeAdded events.
    pub fn edges_added(&self) -> Vec<(EdgeId, Handle)> {
        self.events
            .iter()
            .filter_map(|e| match e {
                SessionEvent::EdgeAdded { edge, target } => Some((*edge, *target)),
                _ => None,
            })
            .collect()
    }

    /// Filter to only EdgeRemoved events.
    pub fn edges_removed(&self) -> Vec<EdgeId> {
        self.events
            .iter()
            .filter_map(|e| match e {
                SessionEvent::EdgeRemoved { edge } => Some(*edge),
                _ => None,
            })
            .collect()
    }

    /// Indices of settled statements, in emission order.
    pub fn settled(&self) -> Vec<usize> {
        self.events
            .iter()
            .filter_map(|e| match e {
                SessionEvent::StatementSettled { index } => Some(*index),
                _ => None,
            })
            .collect()
    }
}
