//! Path history: events, revisions and the tree that indexes them by path.
//!
//! # Sub-modules
//!
//! - [`path`]: `/`-separated repository path helpers.
//! - [`event`]: [`Event`], [`EventArena`] and [`Revision`]. Events are
//!   addressed by [`EventId`]; `requires` edges are lists of ids.
//! - [`tree`]: [`PathTree`], per-path chronological event lists.

pub mod event;
pub mod path;
pub mod tree;

pub use event::{Action, CopySource, Event, EventArena, EventId, Revision, Wanted};
pub use tree::PathTree;
