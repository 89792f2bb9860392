//! Inclusion engine.
//!
//! [`Model`] holds everything the first pass learns about a dump: every
//! revision, every event (literal and synthetic), the path-history tree, the
//! `requires` graph and the merge-info records. The decision steps then run
//! in a fixed order:
//!
//! 1. [`Model::mark_initial_wanted`]: apply the include/exclude rules.
//! 2. [`Model::propagate`]: close over `requires`.
//! 3. [`Model::restore_terminal_deletes`]: keep the Deletes that end the
//!    history of kept paths.
//! 4. [`Model::redefine_root`]: optional, all or nothing.
//! 5. [`Model::renumber_revisions`]: decide which revisions are written and
//!    under which number.
//!
//! [`Model::apply`] runs all of them from a [`FilterOptions`].
//!
//! # Sub-modules
//!
//! - [`build`]: first pass and dependency construction.
//! - [`include`]: marking, closure and terminal-delete restoration.
//! - [`reroot`]: root redefinition with rollback.
//! - [`renumber`]: revision survival, renumbering and `resolve`.
//! - [`query`]: read-only explanation of why an event is kept.

use crate::config::FilterOptions;
use crate::error::ErrorCode;
use crate::history::{Event, EventArena, EventId, PathTree, Revision, Wanted, path};
use crate::mergeinfo::MergeRecord;
use crate::timing;

pub mod build;
pub mod include;
pub mod query;
pub mod renumber;
pub mod reroot;

pub use query::{EventSummary, Explanation, KeepReason};

/// Failures to resolve a structural dependency.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("'{path}' is added in revision {revision} but its parent directory does not exist")]
    MissingParent { path: String, revision: u32 },

    #[error(
        "'{path}' in revision {revision} is copied from '{source_path}'@{source_revision}, which does not exist"
    )]
    MissingCopySource {
        path: String,
        revision: u32,
        source_path: String,
        source_revision: u32,
    },

    #[error("too many events: {count}")]
    TooManyEvents { count: usize },
}

impl EngineError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::MissingParent { .. } | Self::MissingCopySource { .. } => {
                ErrorCode::MissingDependency
            }
            Self::TooManyEvents { .. } => ErrorCode::InternalUnexpected,
        }
    }
}

/// Everything known about a dump after the first pass.
#[derive(Debug, Default)]
pub struct Model {
    pub(crate) events: EventArena,
    pub(crate) tree: PathTree,
    pub(crate) revisions: Vec<Revision>,
    pub(crate) merges: Vec<MergeRecord>,
    /// Applied root, set only when redefinition succeeded.
    pub(crate) root: Option<String>,
    pub(crate) drop_empty: bool,
}

impl Model {
    /// Run every decision step for `options`, in order.
    pub fn apply(&mut self, options: &FilterOptions) {
        timing::timed("engine.closure", || {
            self.mark_initial_wanted(&options.selection);
            self.propagate();
            self.restore_terminal_deletes();
        });
        if let Some(root) = &options.redefine_root {
            timing::timed("engine.reroot", || self.redefine_root(root));
        }
        timing::timed("engine.renumber", || {
            self.renumber_revisions(options.drop_empty);
        });
    }

    #[must_use]
    pub fn event(&self, id: EventId) -> &Event {
        self.events.get(id)
    }

    #[must_use]
    pub const fn events(&self) -> &EventArena {
        &self.events
    }

    #[must_use]
    pub fn revisions(&self) -> &[Revision] {
        &self.revisions
    }

    #[must_use]
    pub const fn tree(&self) -> &PathTree {
        &self.tree
    }

    #[must_use]
    pub fn merges(&self) -> &[MergeRecord] {
        &self.merges
    }

    /// Merge-info record captured for a literal event.
    #[must_use]
    pub fn merge_for(&self, id: EventId) -> Option<&MergeRecord> {
        self.merges
            .binary_search_by_key(&id, |record| record.event)
            .ok()
            .map(|index| &self.merges[index])
    }

    /// The redefined root, when redefinition was applied.
    #[must_use]
    pub fn root(&self) -> Option<&str> {
        self.root.as_deref()
    }

    /// Whether merge-info values must be rewritten on output.
    #[must_use]
    pub const fn rewrites_mergeinfo(&self) -> bool {
        self.drop_empty || self.root.is_some()
    }

    /// Output path of `path`: unchanged without a redefined root, relative
    /// to it otherwise. `None` for the root itself and paths above it.
    #[must_use]
    pub fn reduce_path<'a>(&self, path: &'a str) -> Option<&'a str> {
        match &self.root {
            None => Some(path),
            Some(root) => path::relative_to(path, root).filter(|rel| !rel.is_empty()),
        }
    }

    /// Whether the second pass writes this event.
    #[must_use]
    pub fn writes(&self, id: EventId) -> bool {
        let event = self.events.get(id);
        !event.is_synthetic && event.wanted.is_kept() && self.reduce_path(&event.path).is_some()
    }

    /// Counts of kept events, for reports.
    #[must_use]
    pub fn tally(&self) -> Tally {
        let mut tally = Tally::default();
        for (_, event) in self.events.iter() {
            if event.is_synthetic {
                tally.synthetic += 1;
                continue;
            }
            tally.literal += 1;
            match event.wanted {
                Wanted::No => {}
                Wanted::Yes => tally.kept += 1,
                Wanted::ForcedKeep => tally.forced += 1,
            }
        }
        tally
    }
}

/// Event counts over a decided model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Tally {
    pub literal: usize,
    pub synthetic: usize,
    /// Literal events kept as wanted.
    pub kept: usize,
    /// Literal Deletes kept only to end a kept path's history.
    pub forced: usize,
}
