//! Events, revisions and the arena that owns them.

use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

use serde::Serialize;

// ---------------------------------------------------------------------------
// Action / Wanted
// ---------------------------------------------------------------------------

/// What a node record does to its path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Add,
    Change,
    Delete,
    Replace,
}

impl Action {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Change => "change",
            Self::Delete => "delete",
            Self::Replace => "replace",
        }
    }

    /// Add and Replace both (re)create their path.
    #[must_use]
    pub const fn creates(self) -> bool {
        matches!(self, Self::Add | Self::Replace)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for an unrecognised `Node-action` value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown node action '{0}'")]
pub struct ParseActionError(pub String);

impl FromStr for Action {
    type Err = ParseActionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "add" => Ok(Self::Add),
            "change" => Ok(Self::Change),
            "delete" => Ok(Self::Delete),
            "replace" => Ok(Self::Replace),
            other => Err(ParseActionError(other.to_string())),
        }
    }
}

/// Inclusion state of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Wanted {
    #[default]
    No,
    Yes,
    /// A Delete kept only to end the history of a path that was kept.
    ForcedKeep,
}

impl Wanted {
    #[must_use]
    pub const fn is_kept(self) -> bool {
        !matches!(self, Self::No)
    }
}

// ---------------------------------------------------------------------------
// Event
// ---------------------------------------------------------------------------

/// Stable handle of an event in its [`EventArena`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct EventId(u32);

impl EventId {
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// `Node-copyfrom-path` / `Node-copyfrom-rev` of an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopySource {
    pub path: Rc<str>,
    pub revision: u32,
}

/// One action against one path at one revision.
#[derive(Debug, Clone)]
pub struct Event {
    pub path: Rc<str>,
    pub action: Action,
    pub revision: u32,
    pub copy_source: Option<CopySource>,
    /// Manufactured for a path implicitly affected by a subtree copy or delete.
    pub is_synthetic: bool,
    /// Literal event whose fan-out produced this synthetic event.
    pub origin: Option<EventId>,
    pub wanted: Wanted,
    /// Matched the include/exclude rules directly.
    pub selected: bool,
    /// Events that must be kept whenever this one is kept.
    pub requires: Vec<EventId>,
}

impl Event {
    #[must_use]
    pub fn literal(
        path: Rc<str>,
        action: Action,
        revision: u32,
        copy_source: Option<CopySource>,
    ) -> Self {
        Self {
            path,
            action,
            revision,
            copy_source,
            is_synthetic: false,
            origin: None,
            wanted: Wanted::No,
            selected: false,
            requires: Vec::new(),
        }
    }

    #[must_use]
    pub fn synthetic(path: Rc<str>, action: Action, revision: u32, origin: EventId) -> Self {
        Self {
            path,
            action,
            revision,
            copy_source: None,
            is_synthetic: true,
            origin: Some(origin),
            wanted: Wanted::No,
            selected: false,
            requires: Vec::new(),
        }
    }
}

/// Owner of every event of a run, literal and synthetic.
#[derive(Debug, Default)]
pub struct EventArena {
    events: Vec<Event>,
}

impl EventArena {
    #[must_use]
    pub const fn new() -> Self {
        Self { events: Vec::new() }
    }

    /// Store an event, returning its handle.
    ///
    /// # Errors
    ///
    /// Returns the event count if the arena cannot address another event.
    pub fn push(&mut self, event: Event) -> Result<EventId, usize> {
        let id = u32::try_from(self.events.len()).map_err(|_| self.events.len())?;
        self.events.push(event);
        Ok(EventId(id))
    }

    #[must_use]
    pub fn get(&self, id: EventId) -> &Event {
        &self.events[id.index()]
    }

    pub fn get_mut(&mut self, id: EventId) -> &mut Event {
        &mut self.events[id.index()]
    }

    /// Record that keeping `from` requires keeping `to`.
    pub fn require(&mut self, from: EventId, to: EventId) {
        if from == to {
            return;
        }
        let requires = &mut self.events[from.index()].requires;
        if !requires.contains(&to) {
            tracing::trace!(%from, %to, "dependency");
            requires.push(to);
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = EventId> {
        // `push` guarantees every index fits in u32.
        (0..u32::try_from(self.events.len()).unwrap_or(u32::MAX)).map(EventId)
    }

    pub fn iter(&self) -> impl Iterator<Item = (EventId, &Event)> {
        self.ids().zip(self.events.iter())
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Event> {
        self.events.iter_mut()
    }
}

// ---------------------------------------------------------------------------
// Revision
// ---------------------------------------------------------------------------

/// One revision record and the events it carries.
#[derive(Debug, Clone, Default)]
pub struct Revision {
    /// `Revision-number` in the input.
    pub number: u32,
    /// Literal events in input order.
    pub events: Vec<EventId>,
    /// Events synthesized while linking this revision.
    pub synthetic: Vec<EventId>,
    /// Number in the output, `None` when the revision is dropped.
    pub renumbered: Option<u32>,
}

impl Revision {
    #[must_use]
    pub const fn new(number: u32) -> Self {
        Self {
            number,
            events: Vec::new(),
            synthetic: Vec::new(),
            renumbered: None,
        }
    }
}
