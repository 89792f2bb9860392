//! Include/exclude marking, `requires` closure and terminal-delete
//! restoration.

use tracing::{debug, info};

use super::Model;
use crate::config::Selection;
use crate::history::{Action, EventId, Wanted};

impl Model {
    /// Mark every event, literal or synthetic, by the include/exclude rules.
    ///
    /// Include mode: events at or under an include path are wanted, the
    /// rest are not. Exclude mode: the reverse. [`Self::propagate`] then
    /// brings back whatever the wanted events depend on.
    ///
    /// Literal Deletes start unwanted even when selected: they are kept
    /// only as [`Wanted::ForcedKeep`] by [`Self::restore_terminal_deletes`],
    /// once the history they end is known to be kept.
    pub fn mark_initial_wanted(&mut self, selection: &Selection) {
        for event in self.events.iter_mut() {
            event.selected = selection.selects(&event.path);
            let literal_delete = event.action == Action::Delete && !event.is_synthetic;
            event.wanted = if event.selected && !literal_delete {
                Wanted::Yes
            } else {
                Wanted::No
            };
        }
    }

    /// Mark everything reachable from a wanted event through `requires` as
    /// wanted. Returns the number of events newly marked.
    pub fn propagate(&mut self) -> usize {
        let roots: Vec<EventId> = self
            .events
            .iter()
            .filter(|(_, event)| event.wanted == Wanted::Yes)
            .map(|(id, _)| id)
            .collect();
        let marked = self.propagate_from(roots);
        debug!(marked, "requires closure");
        marked
    }

    fn propagate_from(&mut self, roots: Vec<EventId>) -> usize {
        let mut visited = vec![false; self.events.len()];
        let mut stack = roots;
        let mut marked = 0;
        while let Some(id) = stack.pop() {
            if std::mem::replace(&mut visited[id.index()], true) {
                continue;
            }
            for i in 0..self.events.get(id).requires.len() {
                let dependency = self.events.get(id).requires[i];
                let event = self.events.get_mut(dependency);
                if event.wanted != Wanted::Yes {
                    event.wanted = Wanted::Yes;
                    marked += 1;
                }
                stack.push(dependency);
            }
        }
        marked
    }

    /// Keep the Deletes that end the history of kept paths.
    ///
    /// Walking each path's history forward, an unwanted Delete preceded by a
    /// kept entry since the previous Delete becomes [`Wanted::ForcedKeep`].
    /// A kept synthetic Delete keeps its trigger: a Delete trigger becomes
    /// `ForcedKeep` (its own synthetic Deletes with it), a Replace trigger
    /// becomes wanted along with its closure. Repeats until stable and
    /// returns the number of events restored.
    pub fn restore_terminal_deletes(&mut self) -> usize {
        let mut restored = 0;
        loop {
            let mut forced = Vec::new();
            for (_, history) in self.tree.walk() {
                let mut seen_kept = false;
                for &id in history {
                    let event = self.events.get(id);
                    if event.action == Action::Delete {
                        if event.wanted == Wanted::No && seen_kept {
                            forced.push(id);
                        }
                        seen_kept = false;
                    } else if event.wanted.is_kept() {
                        seen_kept = true;
                    }
                }
            }

            let mut revived = Vec::new();
            for (_, event) in self.events.iter() {
                if !(event.is_synthetic && event.action == Action::Delete && event.wanted.is_kept()) {
                    continue;
                }
                let Some(origin) = event.origin else { continue };
                let trigger = self.events.get(origin);
                if trigger.wanted != Wanted::No {
                    continue;
                }
                match trigger.action {
                    Action::Delete => forced.push(origin),
                    Action::Replace => revived.push(origin),
                    Action::Add | Action::Change => {}
                }
            }

            let mut changed = false;
            for id in forced {
                if self.events.get(id).wanted != Wanted::No {
                    continue;
                }
                self.events.get_mut(id).wanted = Wanted::ForcedKeep;
                restored += 1;
                changed = true;
                for i in 0..self.events.get(id).requires.len() {
                    let dependency = self.events.get(id).requires[i];
                    let event = self.events.get_mut(dependency);
                    if event.is_synthetic && event.action == Action::Delete && event.wanted == Wanted::No {
                        event.wanted = Wanted::ForcedKeep;
                    }
                }
            }
            revived.sort_unstable();
            revived.dedup();
            revived.retain(|&id| self.events.get(id).wanted == Wanted::No);
            for &id in &revived {
                self.events.get_mut(id).wanted = Wanted::Yes;
                restored += 1;
                changed = true;
            }
            if !revived.is_empty() {
                self.propagate_from(revived);
            }
            if !changed {
                break;
            }
        }
        info!(restored, "terminal deletes restored");
        restored
    }
}
