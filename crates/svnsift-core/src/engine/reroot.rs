//! Root redefinition.
//!
//! Every written path is reduced by stripping the new root prefix. Paths at
//! or above the new root are no longer written: the root exists implicitly.
//! The redefinition is checked against every kept literal event first and
//! applied only if nothing collides; otherwise paths stay unmodified.

use tracing::{info, warn};

use super::Model;
use crate::history::{Action, path};

impl Model {
    /// Redefine the output root to `root` if no kept event collides.
    ///
    /// A collision is a kept event outside `root` that is not one of its
    /// ancestors, a kept event at or above `root` that copies, deletes or
    /// replaces (the implicit root would lose or change history), or a kept
    /// copy whose source lies outside `root` or is `root` itself. Returns
    /// whether the redefinition was applied.
    pub fn redefine_root(&mut self, root: &str) -> bool {
        let root = path::normalize(root);
        self.root = None;
        if root.is_empty() {
            return false;
        }
        if let Some(reason) = self.find_collision(root) {
            warn!(root, %reason, "root redefinition rolled back, paths left unmodified");
            return false;
        }
        info!(root, "root redefined");
        self.root = Some(root.to_string());
        true
    }

    fn find_collision(&self, root: &str) -> Option<String> {
        for (_, event) in self.events.iter() {
            if event.is_synthetic || !event.wanted.is_kept() {
                continue;
            }
            let at = || format!("'{}' in revision {}", event.path, event.revision);

            if path::is_within(root, &event.path) {
                if event.copy_source.is_some() {
                    return Some(format!("{} copies onto the root or an ancestor", at()));
                }
                if matches!(event.action, Action::Delete | Action::Replace) {
                    return Some(format!("{} removes the root or an ancestor", at()));
                }
                continue;
            }
            if !path::is_within(&event.path, root) {
                return Some(format!("{} lies outside the new root", at()));
            }
            if let Some(source) = &event.copy_source {
                if !path::is_ancestor(root, &source.path) {
                    return Some(format!(
                        "{} is copied from '{}', outside the new root",
                        at(),
                        source.path
                    ));
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Selection;
    use crate::dump::DumpReader;
    use std::io::Cursor;

    fn decided(text: &str, include: &[&str]) -> Model {
        let mut reader = DumpReader::new(Cursor::new(text.as_bytes().to_vec()));
        let mut model = Model::scan(&mut reader).expect("scan");
        model.mark_initial_wanted(&Selection::Include(
            include.iter().map(ToString::to_string).collect(),
        ));
        model.propagate();
        model.restore_terminal_deletes();
        model
    }

    const PROJECT: &str = "Revision-number: 0\n\n\
        Revision-number: 1\n\n\
        Node-path: proj\nNode-action: add\n\n\
        Node-path: proj/trunk\nNode-action: add\n\n\
        Node-path: proj/trunk/a\nNode-action: add\n\n\
        Node-path: other\nNode-action: add\n\n\
        Revision-number: 2\n\n\
        Node-path: proj/trunk/b\nNode-action: add\nNode-copyfrom-rev: 1\nNode-copyfrom-path: proj/trunk/a\n\n";

    #[test]
    fn clean_redefinition_is_applied() {
        let mut model = decided(PROJECT, &["proj/trunk"]);
        assert!(model.redefine_root("proj/trunk"));
        assert_eq!(model.root(), Some("proj/trunk"));
        assert_eq!(model.reduce_path("proj/trunk/b"), Some("b"));
        assert_eq!(model.reduce_path("proj/trunk"), None);
        assert_eq!(model.reduce_path("proj"), None);
    }

    #[test]
    fn copy_from_outside_root_rolls_back() {
        let text = format!(
            "{PROJECT}Revision-number: 3\n\n\
             Node-path: proj/trunk/c\nNode-action: add\nNode-copyfrom-rev: 1\nNode-copyfrom-path: other\n\n"
        );
        let mut model = decided(&text, &["proj/trunk"]);
        assert!(!model.redefine_root("proj/trunk"));
        assert_eq!(model.root(), None);
        assert_eq!(model.reduce_path("proj/trunk/c"), Some("proj/trunk/c"));
    }

    #[test]
    fn deleting_an_ancestor_rolls_back() {
        let text = format!(
            "{PROJECT}Revision-number: 3\n\n\
             Node-path: proj/trunk\nNode-action: delete\n\n"
        );
        let mut model = decided(&text, &["proj/trunk"]);
        assert!(!model.redefine_root("proj/trunk"));
    }

    #[test]
    fn replacing_the_root_rolls_back() {
        let text = format!(
            "{PROJECT}Revision-number: 3\n\n\
             Node-path: proj/trunk\nNode-action: replace\n\n"
        );
        let mut model = decided(&text, &["proj/trunk"]);
        let replace = model.tree().history("proj/trunk")[1];
        assert_eq!(model.event(replace).action, Action::Replace);
        assert!(model.event(replace).wanted.is_kept());
        assert!(!model.redefine_root("proj/trunk"));
        assert_eq!(model.reduce_path("proj/trunk/a"), Some("proj/trunk/a"));
    }

    #[test]
    fn replace_inside_root_is_applied() {
        let text = format!(
            "{PROJECT}Revision-number: 3\n\n\
             Node-path: proj/trunk/a\nNode-action: replace\n\
             Node-copyfrom-rev: 2\nNode-copyfrom-path: proj/trunk/b\n\n"
        );
        let mut model = decided(&text, &["proj/trunk"]);
        assert!(model.redefine_root("proj/trunk"));
        assert_eq!(model.reduce_path("proj/trunk/a"), Some("a"));
    }

    #[test]
    fn empty_root_is_not_a_redefinition() {
        let mut model = decided(PROJECT, &["proj"]);
        assert!(!model.redefine_root("/"));
        assert_eq!(model.root(), None);
    }
}
