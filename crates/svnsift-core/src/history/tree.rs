//! Path-history tree.
//!
//! A trie over path segments. Every node owns the chronological list of
//! events (literal and synthetic) that touched exactly its path, so "what
//! governs this path at revision R" is a backward scan of one short list.
//!
//! Node 0 is the repository root (the empty path). Paths are interned here:
//! every event at a path shares the node's `Rc<str>`.

use std::collections::BTreeMap;
use std::rc::Rc;

use super::event::{Action, EventArena, EventId};
use super::path;

#[derive(Debug)]
struct TreeNode {
    path: Rc<str>,
    history: Vec<EventId>,
    children: BTreeMap<Box<str>, usize>,
}

impl TreeNode {
    fn new(path: Rc<str>) -> Self {
        Self {
            path,
            history: Vec::new(),
            children: BTreeMap::new(),
        }
    }
}

/// Trie of every path ever seen, each with its event history.
#[derive(Debug)]
pub struct PathTree {
    nodes: Vec<TreeNode>,
}

impl Default for PathTree {
    fn default() -> Self {
        Self::new()
    }
}

impl PathTree {
    #[must_use]
    pub fn new() -> Self {
        Self {
            nodes: vec![TreeNode::new(Rc::from(""))],
        }
    }

    /// Number of distinct paths, the root included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }

    /// Shared string for `path`, creating its node if needed.
    pub fn intern(&mut self, path: &str) -> Rc<str> {
        let index = self.find_or_create(path);
        Rc::clone(&self.nodes[index].path)
    }

    fn find(&self, path: &str) -> Option<usize> {
        let mut index = 0;
        for segment in path::segments(path) {
            index = *self.nodes[index].children.get(segment)?;
        }
        Some(index)
    }

    fn find_or_create(&mut self, path: &str) -> usize {
        let mut index = 0;
        for segment in path::segments(path) {
            index = match self.nodes[index].children.get(segment) {
                Some(&child) => child,
                None => {
                    let full = path::join(&self.nodes[index].path, segment);
                    let child = self.nodes.len();
                    self.nodes.push(TreeNode::new(Rc::from(full)));
                    self.nodes[index].children.insert(segment.into(), child);
                    child
                }
            };
        }
        index
    }

    /// Events recorded at exactly `path`, oldest first.
    #[must_use]
    pub fn history(&self, path: &str) -> &[EventId] {
        self.find(path)
            .map_or(&[][..], |index| self.nodes[index].history.as_slice())
    }

    /// Append an event to its path's history.
    ///
    /// A Change, Delete or Replace requires the entry before it at the same
    /// path, unless that entry is a Delete. Synthetic Deletes take no such
    /// dependency: they only mirror their trigger. Returns the predecessor
    /// when a dependency was recorded.
    pub fn insert(&mut self, events: &mut EventArena, id: EventId) -> Option<EventId> {
        let event = events.get(id);
        let index = self.find_or_create(&event.path);
        let skip = event.action == Action::Add || (event.is_synthetic && event.action == Action::Delete);

        let history = &mut self.nodes[index].history;
        let previous = history.last().copied();
        history.push(id);

        let previous = previous.filter(|&prev| !skip && events.get(prev).action != Action::Delete)?;
        events.require(id, previous);
        Some(previous)
    }

    /// Event governing `path` at `revision`.
    ///
    /// Scans the history backward for the latest entry at or before
    /// `revision`; with `wanted_only`, entries not kept are ignored. A
    /// governing Delete means the path does not exist: `None`.
    #[must_use]
    pub fn lookup_at(
        &self,
        events: &EventArena,
        path: &str,
        revision: u32,
        wanted_only: bool,
    ) -> Option<EventId> {
        let index = self.find(path)?;
        let id = self.nodes[index]
            .history
            .iter()
            .rev()
            .copied()
            .find(|&id| {
                let event = events.get(id);
                event.revision <= revision && (!wanted_only || event.wanted.is_kept())
            })?;
        (events.get(id).action != Action::Delete).then_some(id)
    }

    /// Governing event of every strict descendant of `path` that exists at
    /// `revision`, parents before children.
    #[must_use]
    pub fn subtree_snapshot(&self, events: &EventArena, path: &str, revision: u32) -> Vec<EventId> {
        let Some(start) = self.find(path) else {
            return Vec::new();
        };
        let mut found = Vec::new();
        let mut stack: Vec<usize> = self.nodes[start].children.values().rev().copied().collect();
        while let Some(index) = stack.pop() {
            let node = &self.nodes[index];
            if let Some(id) = self.lookup_at(events, &node.path, revision, false) {
                found.push(id);
            }
            stack.extend(node.children.values().rev().copied());
        }
        found
    }

    /// Every path with its history, parents before children, siblings in
    /// byte order. The root is first.
    pub fn walk(&self) -> impl Iterator<Item = (&str, &[EventId])> {
        let mut stack = vec![0_usize];
        std::iter::from_fn(move || {
            let index = stack.pop()?;
            let node = &self.nodes[index];
            stack.extend(node.children.values().rev().copied());
            Some((&*node.path, node.history.as_slice()))
        })
    }
}
