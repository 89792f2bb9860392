//! Revision survival and renumbering.

use tracing::info;

use super::Model;
use crate::history::path;

impl Model {
    /// Decide which revisions are written and under which number.
    ///
    /// Without `drop_empty` every revision is written under its own number.
    /// With it, only the first revision and revisions with at least one
    /// written event survive, numbered consecutively from the first.
    pub fn renumber_revisions(&mut self, drop_empty: bool) {
        self.drop_empty = drop_empty;
        let mut next: Option<u32> = None;
        let mut dropped = 0_usize;
        for index in 0..self.revisions.len() {
            let revision = &self.revisions[index];
            let survives = index == 0
                || !drop_empty
                || revision.events.iter().any(|&id| self.writes(id));
            let renumbered = if !survives {
                dropped += 1;
                None
            } else if drop_empty {
                let number = next.map_or(revision.number, |n| n + 1);
                next = Some(number);
                Some(number)
            } else {
                Some(revision.number)
            };
            self.revisions[index].renumbered = renumbered;
        }
        info!(dropped, "revisions renumbered");
    }

    /// Output number of the nearest surviving revision at or before
    /// `revision`, or 0 if none survives. The identity without
    /// `drop_empty`.
    #[must_use]
    pub fn resolve(&self, revision: u32) -> u32 {
        if !self.drop_empty {
            return revision;
        }
        let end = self.revisions.partition_point(|r| r.number <= revision);
        self.revisions[..end]
            .iter()
            .rev()
            .find_map(|r| r.renumbered)
            .unwrap_or(0)
    }

    /// Output number of the last revision written by the second pass.
    #[must_use]
    pub fn last_written(&self) -> Option<u32> {
        self.revisions.iter().rev().find_map(|r| r.renumbered)
    }

    /// Paths still alive at the end of the kept history that lie outside
    /// every requested scope, shallowest first, as written in the output
    /// (reduced when the root is redefined). Descendants of a listed path
    /// are omitted, as are the root and ancestors of include paths.
    #[must_use]
    pub fn lingering_paths(&self, selection: &crate::config::Selection) -> Vec<String> {
        let Some(last) = self.revisions.last().map(|r| r.number) else {
            return Vec::new();
        };
        let mut found: Vec<String> = Vec::new();
        let mut listed: Option<&str> = None;
        for (candidate, _) in self.tree.walk() {
            if candidate.is_empty() || selection.selects(candidate) {
                continue;
            }
            if selection.is_include()
                && selection.paths().iter().any(|p| path::is_ancestor(candidate, p))
            {
                continue;
            }
            if listed.is_some_and(|listed| path::is_within(candidate, listed)) {
                continue;
            }
            let Some(reduced) = self.reduce_path(candidate) else {
                continue;
            };
            if self
                .tree
                .lookup_at(&self.events, candidate, last, true)
                .is_some()
            {
                found.push(reduced.to_string());
                listed = Some(candidate);
            }
        }
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Selection;
    use crate::dump::DumpReader;
    use std::io::Cursor;

    fn decided(text: &str, selection: &Selection, drop_empty: bool) -> Model {
        let mut reader = DumpReader::new(Cursor::new(text.as_bytes().to_vec()));
        let mut model = Model::scan(&mut reader).expect("scan");
        model.mark_initial_wanted(selection);
        model.propagate();
        model.restore_terminal_deletes();
        model.renumber_revisions(drop_empty);
        model
    }

    fn include(paths: &[&str]) -> Selection {
        Selection::Include(paths.iter().map(ToString::to_string).collect())
    }

    // Revisions 2 and 4 only touch `other`.
    const FIVE: &str = "Revision-number: 0\n\n\
        Revision-number: 1\n\n\
        Node-path: keep\nNode-action: add\n\n\
        Node-path: other\nNode-action: add\n\n\
        Revision-number: 2\n\n\
        Node-path: other/x\nNode-action: add\n\n\
        Revision-number: 3\n\n\
        Node-path: keep/a\nNode-action: add\n\n\
        Revision-number: 4\n\n\
        Node-path: other/y\nNode-action: add\n\n\
        Revision-number: 5\n\n\
        Node-path: keep/b\nNode-action: add\n\n";

    fn renumbered(model: &Model) -> Vec<Option<u32>> {
        model.revisions().iter().map(|r| r.renumbered).collect()
    }

    #[test]
    fn drop_empty_renumbers_consecutively() {
        let model = decided(FIVE, &include(&["keep"]), true);
        assert_eq!(
            renumbered(&model),
            vec![Some(0), Some(1), None, Some(2), None, Some(3)]
        );
        assert_eq!(model.resolve(4), 2);
        assert_eq!(model.resolve(2), 1);
        assert_eq!(model.resolve(0), 0);
        assert_eq!(model.resolve(99), 3);
        assert_eq!(model.last_written(), Some(3));
    }

    #[test]
    fn without_drop_empty_numbers_are_kept() {
        let model = decided(FIVE, &include(&["keep"]), false);
        assert_eq!(
            renumbered(&model),
            vec![Some(0), Some(1), Some(2), Some(3), Some(4), Some(5)]
        );
        assert_eq!(model.resolve(4), 4);
    }

    #[test]
    fn revision_zero_always_survives() {
        let model = decided(FIVE, &include(&["nothing"]), true);
        assert_eq!(renumbered(&model)[0], Some(0));
        assert!(renumbered(&model)[1..].iter().all(Option::is_none));
        assert_eq!(model.resolve(5), 0);
    }

    #[test]
    fn lingering_paths_skip_scope_and_ancestors() {
        let text = "Revision-number: 0\n\n\
            Revision-number: 1\n\n\
            Node-path: lib\nNode-action: add\n\n\
            Node-path: lib/util\nNode-action: add\n\n\
            Node-path: proj\nNode-action: add\n\n\
            Revision-number: 2\n\n\
            Node-path: proj/app\nNode-action: add\nNode-copyfrom-rev: 1\nNode-copyfrom-path: lib\n\n";
        let selection = include(&["proj/app"]);
        let model = decided(text, &selection, false);
        assert_eq!(model.lingering_paths(&selection), vec!["lib".to_string()]);
    }

    #[test]
    fn lingering_paths_are_reported_under_the_redefined_root() {
        let text = "Revision-number: 0\n\n\
            Revision-number: 1\n\n\
            Node-path: proj\nNode-action: add\n\n\
            Node-path: proj/trunk\nNode-action: add\n\n\
            Node-path: proj/lib\nNode-action: add\n\n\
            Node-path: proj/lib/u\nNode-action: add\n\n\
            Revision-number: 2\n\n\
            Node-path: proj/trunk/x\nNode-action: add\nNode-copyfrom-rev: 1\nNode-copyfrom-path: proj/lib\n\n";
        let selection = include(&["proj/trunk"]);
        let mut model = decided(text, &selection, false);
        assert!(model.redefine_root("proj"));
        assert_eq!(model.lingering_paths(&selection), vec!["lib".to_string()]);
    }

    #[test]
    fn deleted_dependencies_do_not_linger() {
        let text = "Revision-number: 0\n\n\
            Revision-number: 1\n\n\
            Node-path: lib\nNode-action: add\n\n\
            Node-path: proj\nNode-action: add\n\n\
            Revision-number: 2\n\n\
            Node-path: proj/app\nNode-action: add\nNode-copyfrom-rev: 1\nNode-copyfrom-path: lib\n\n\
            Revision-number: 3\n\n\
            Node-path: lib\nNode-action: delete\n\n";
        let selection = include(&["proj/app"]);
        let model = decided(text, &selection, false);
        assert!(model.lingering_paths(&selection).is_empty());
    }
}
