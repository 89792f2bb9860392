//! Why is this kept?
//!
//! A read-only walk over the `requires` graph in reverse: from a kept event,
//! breadth-first through "required by" edges until an event the
//! include/exclude rules selected directly is reached. The shortest such
//! chain is the explanation.

use std::collections::VecDeque;

use serde::Serialize;

use super::Model;
use crate::history::{Action, EventId, Wanted, path};

/// Serializable view of one event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventSummary {
    pub id: EventId,
    pub path: String,
    pub action: Action,
    pub revision: u32,
    pub synthetic: bool,
    pub wanted: Wanted,
}

/// Why an event ended up kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum KeepReason {
    /// Matched the include/exclude rules.
    Selected,
    /// Required, directly or transitively, by a selected event. The chain
    /// runs from the event that requires this one up to the selected event.
    Required { chain: Vec<EventSummary> },
    /// A Delete kept to end the history of a kept path.
    TerminalDelete,
    /// Kept because a synthetic Delete it triggered was kept.
    Restored,
}

/// One kept event at the queried path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Explanation {
    pub event: EventSummary,
    #[serde(flatten)]
    pub reason: KeepReason,
}

impl Model {
    #[must_use]
    pub fn summary(&self, id: EventId) -> EventSummary {
        let event = self.events.get(id);
        EventSummary {
            id,
            path: event.path.to_string(),
            action: event.action,
            revision: event.revision,
            synthetic: event.is_synthetic,
            wanted: event.wanted,
        }
    }

    /// Explain every kept event recorded at exactly `query_path`.
    #[must_use]
    pub fn explain(&self, query_path: &str) -> Vec<Explanation> {
        let query_path = path::normalize(query_path);
        let history = self.tree.history(query_path);
        if history.is_empty() {
            return Vec::new();
        }
        let required_by = self.reverse_edges();
        history
            .iter()
            .copied()
            .filter(|&id| self.events.get(id).wanted.is_kept())
            .map(|id| Explanation {
                event: self.summary(id),
                reason: self.reason(id, &required_by),
            })
            .collect()
    }

    fn reverse_edges(&self) -> Vec<Vec<EventId>> {
        let mut required_by = vec![Vec::new(); self.events.len()];
        for (id, event) in self.events.iter() {
            for &dependency in &event.requires {
                required_by[dependency.index()].push(id);
            }
        }
        required_by
    }

    fn reason(&self, id: EventId, required_by: &[Vec<EventId>]) -> KeepReason {
        let event = self.events.get(id);
        if event.wanted == Wanted::ForcedKeep {
            return KeepReason::TerminalDelete;
        }
        if event.selected {
            return KeepReason::Selected;
        }
        match self.chain_to_selected(id, required_by) {
            Some(chain) => KeepReason::Required {
                chain: chain.into_iter().map(|link| self.summary(link)).collect(),
            },
            None => KeepReason::Restored,
        }
    }

    /// Shortest path from `start` to a selected, kept event along reverse
    /// `requires` edges, `start` excluded.
    fn chain_to_selected(&self, start: EventId, required_by: &[Vec<EventId>]) -> Option<Vec<EventId>> {
        let mut previous: Vec<Option<EventId>> = vec![None; self.events.len()];
        let mut visited = vec![false; self.events.len()];
        let mut queue = VecDeque::from([start]);
        visited[start.index()] = true;

        while let Some(current) = queue.pop_front() {
            for &next in &required_by[current.index()] {
                if std::mem::replace(&mut visited[next.index()], true) {
                    continue;
                }
                let candidate = self.events.get(next);
                if !candidate.wanted.is_kept() {
                    continue;
                }
                previous[next.index()] = Some(current);
                if candidate.selected {
                    let mut chain = vec![next];
                    let mut cursor = current;
                    while cursor != start {
                        chain.push(cursor);
                        cursor = previous[cursor.index()]?;
                    }
                    chain.reverse();
                    return Some(chain);
                }
                queue.push_back(next);
            }
        }
        None
    }
}
