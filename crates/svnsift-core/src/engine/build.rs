//! First pass: read every record header and build the dependency graph.
//!
//! Each literal event is linked as it arrives, so every lookup sees exactly
//! the history that precedes it in the stream:
//!
//! - a Change, Delete or Replace requires the previous live entry at its
//!   path (see [`PathTree::insert`](crate::history::PathTree::insert));
//! - an Add or Replace requires the event governing its parent directory,
//!   and, when copied, the event governing the copy source;
//! - a Delete or Replace fans out one synthetic Delete per live descendant;
//! - a copy fans out one synthetic event per live descendant of the source,
//!   rewritten under the destination. Each synthetic requires the original
//!   descendant and its synthesized parent; the trigger requires them all;
//! - an event inside the destination of a merge recorded earlier in the same
//!   revision requires the events governing the merged sources.

use std::collections::HashMap;
use std::io::BufRead;
use std::rc::Rc;

use tracing::{debug, info, warn};

use super::{EngineError, Model};
use crate::dump::{
    DumpReader, Item, NODE_ACTION, NODE_COPYFROM_PATH, NODE_COPYFROM_REV, NODE_PATH, PropBlock,
    REVISION_NUMBER, RecordHeader, RecordKind, ScanError,
};
use crate::error::SiftError;
use crate::history::{Action, CopySource, Event, EventId, Revision, path};
use crate::mergeinfo::{MERGEINFO_PROPERTY, MergeInfo, MergeRecord};

impl Model {
    /// Read a whole dump and build the model.
    ///
    /// Bodies are skipped by their declared length; only property blocks
    /// are read, to find `svn:mergeinfo`.
    ///
    /// # Errors
    ///
    /// Returns [`SiftError::Scan`] for malformed or truncated input and
    /// [`SiftError::Engine`] when a parent directory or copy source cannot
    /// be resolved.
    pub fn scan<R: BufRead>(reader: &mut DumpReader<R>) -> Result<Self, SiftError> {
        let mut model = Self::default();
        while let Some(item) = reader.next_item()? {
            let Item::Record(header) = item else {
                continue;
            };
            match header.kind() {
                RecordKind::Preamble => {}
                RecordKind::Revision => model.begin_revision(&header)?,
                RecordKind::Node => model.scan_node(reader, &header)?,
            }
        }
        info!(
            revisions = model.revisions.len(),
            events = model.events.len(),
            paths = model.tree.len(),
            merges = model.merges.len(),
            "first pass complete"
        );
        Ok(model)
    }

    fn begin_revision(&mut self, header: &RecordHeader) -> Result<(), ScanError> {
        let number: u32 = header
            .number(REVISION_NUMBER)?
            .ok_or(ScanError::MissingHeader {
                line: header.line,
                key: REVISION_NUMBER,
            })?;
        if let Some(previous) = self.revisions.last().map(|r| r.number) {
            if number <= previous {
                return Err(ScanError::RevisionOrder {
                    line: header.line,
                    previous,
                    found: number,
                });
            }
        }
        self.revisions.push(Revision::new(number));
        Ok(())
    }

    fn scan_node<R: BufRead>(
        &mut self,
        reader: &mut DumpReader<R>,
        header: &RecordHeader,
    ) -> Result<(), SiftError> {
        let line = header.line;
        let revision = self
            .revisions
            .last()
            .map(|r| r.number)
            .ok_or(ScanError::NodeOutsideRevision { line })?;

        let raw_path = header.get(NODE_PATH).unwrap_or_default();
        let action = header
            .get(NODE_ACTION)
            .ok_or(ScanError::MissingHeader {
                line,
                key: NODE_ACTION,
            })?
            .parse::<Action>()
            .map_err(|err| ScanError::UnknownAction {
                line,
                action: err.0,
            })?;
        let copy_source = match (
            header.get(NODE_COPYFROM_PATH),
            header.number::<u32>(NODE_COPYFROM_REV)?,
        ) {
            (Some(source), Some(source_revision)) => Some(CopySource {
                path: self.tree.intern(path::normalize(source)),
                revision: source_revision,
            }),
            (None, None) => None,
            (Some(_), None) => {
                return Err(ScanError::MissingHeader {
                    line,
                    key: NODE_COPYFROM_REV,
                }
                .into());
            }
            (None, Some(_)) => {
                return Err(ScanError::MissingHeader {
                    line,
                    key: NODE_COPYFROM_PATH,
                }
                .into());
            }
        };

        let node_path = self.tree.intern(path::normalize(raw_path));
        let id = self
            .events
            .push(Event::literal(Rc::clone(&node_path), action, revision, copy_source))
            .map_err(|count| EngineError::TooManyEvents { count })?;
        if let Some(current) = self.revisions.last_mut() {
            current.events.push(id);
        }

        if let Some(record) = read_mergeinfo(reader, header, id, revision, &node_path)? {
            self.merges.push(record);
        }
        self.link(id)?;
        self.link_merges(id);
        Ok(())
    }

    /// Insert a literal event into the tree and add its structural
    /// dependencies.
    fn link(&mut self, id: EventId) -> Result<(), EngineError> {
        self.tree.insert(&mut self.events, id);

        let event = self.events.get(id);
        let node_path = Rc::clone(&event.path);
        let action = event.action;
        let revision = event.revision;
        let copy_source = event.copy_source.clone();

        if matches!(action, Action::Delete | Action::Replace) {
            self.fan_out_delete(id, &node_path, revision)?;
        }
        if !action.creates() {
            return Ok(());
        }

        if let Some(parent) = path::parent(&node_path).filter(|parent| !parent.is_empty()) {
            let dependency = self
                .tree
                .lookup_at(&self.events, parent, revision, false)
                .ok_or_else(|| EngineError::MissingParent {
                    path: node_path.to_string(),
                    revision,
                })?;
            self.events.require(id, dependency);
        }

        if let Some(source) = copy_source {
            if !source.path.is_empty() {
                let dependency = self
                    .tree
                    .lookup_at(&self.events, &source.path, source.revision, false)
                    .ok_or_else(|| EngineError::MissingCopySource {
                        path: node_path.to_string(),
                        revision,
                        source_path: source.path.to_string(),
                        source_revision: source.revision,
                    })?;
                self.events.require(id, dependency);
            }
            self.fan_out_copy(id, &source, &node_path, revision)?;
        }
        Ok(())
    }

    fn push_synthetic(&mut self, event: Event) -> Result<EventId, EngineError> {
        let id = self
            .events
            .push(event)
            .map_err(|count| EngineError::TooManyEvents { count })?;
        self.tree.insert(&mut self.events, id);
        if let Some(current) = self.revisions.last_mut() {
            current.synthetic.push(id);
        }
        Ok(id)
    }

    /// One synthetic Delete per live descendant of a deleted or replaced
    /// path.
    fn fan_out_delete(
        &mut self,
        trigger: EventId,
        deleted: &str,
        revision: u32,
    ) -> Result<(), EngineError> {
        for descendant in self.tree.subtree_snapshot(&self.events, deleted, revision) {
            let descendant_path = Rc::clone(&self.events.get(descendant).path);
            let synthetic = self.push_synthetic(Event::synthetic(
                descendant_path,
                Action::Delete,
                revision,
                trigger,
            ))?;
            self.events.require(trigger, synthetic);
        }
        Ok(())
    }

    /// One synthetic event per live descendant of the copy source, placed
    /// under the destination.
    fn fan_out_copy(
        &mut self,
        trigger: EventId,
        source: &CopySource,
        dest: &str,
        revision: u32,
    ) -> Result<(), EngineError> {
        let action = self.events.get(trigger).action;
        let snapshot = self
            .tree
            .subtree_snapshot(&self.events, &source.path, source.revision);
        let mut created: HashMap<Rc<str>, EventId> = HashMap::with_capacity(snapshot.len());

        for original in snapshot {
            let original_path = Rc::clone(&self.events.get(original).path);
            let Some(rel) = path::relative_to(&original_path, &source.path) else {
                continue;
            };
            let copied_path = self.tree.intern(&path::join(dest, rel));
            let synthetic = self.push_synthetic(Event::synthetic(
                Rc::clone(&copied_path),
                action,
                revision,
                trigger,
            ))?;
            let parent = path::parent(&copied_path)
                .and_then(|parent| created.get(parent).copied())
                .unwrap_or(trigger);
            self.events.require(synthetic, original);
            self.events.require(synthetic, parent);
            self.events.require(trigger, synthetic);
            created.insert(copied_path, synthetic);
        }
        Ok(())
    }

    /// Merge-propagation for a literal event.
    fn link_merges(&mut self, id: EventId) {
        let event = self.events.get(id);
        let event_path = Rc::clone(&event.path);
        let revision = event.revision;

        let mut dependencies = Vec::new();
        for record in self.merges.iter().rev().take_while(|r| r.revision == revision) {
            let Some(rel) = path::relative_to(&event_path, &record.dest) else {
                continue;
            };
            for (source, _, to) in record.info.triples() {
                if to >= revision {
                    continue;
                }
                let merged = path::join(source, rel);
                match self.tree.lookup_at(&self.events, &merged, to, false) {
                    Some(dependency) => dependencies.push(dependency),
                    None => debug!(
                        path = %event_path,
                        revision,
                        source = %merged,
                        source_revision = to,
                        "merge source not found, ignoring"
                    ),
                }
            }
        }
        for dependency in dependencies {
            self.events.require(id, dependency);
        }
    }
}

/// Read the property block of a node and capture its merge-info.
fn read_mergeinfo<R: BufRead>(
    reader: &mut DumpReader<R>,
    header: &RecordHeader,
    event: EventId,
    revision: u32,
    dest: &Rc<str>,
) -> Result<Option<MergeRecord>, ScanError> {
    let prop_length = header.prop_length()?;
    if prop_length == 0 {
        return Ok(None);
    }
    let body = reader.read_body(prop_length)?;
    let block = PropBlock::parse(&body)?;
    let Some(value) = block.get(MERGEINFO_PROPERTY) else {
        return Ok(None);
    };
    match MergeInfo::parse(value) {
        Ok(info) => Ok(Some(MergeRecord {
            event,
            revision,
            dest: Rc::clone(dest),
            info,
            original_len: value.len(),
        })),
        Err(err) => {
            warn!(path = %dest, revision, %err, "leaving malformed svn:mergeinfo untouched");
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn scan(text: &str) -> Result<Model, SiftError> {
        let mut reader = DumpReader::new(Cursor::new(text.as_bytes().to_vec()));
        Model::scan(&mut reader)
    }

    fn node(path: &str, kind: &str, action: &str) -> String {
        format!("Node-path: {path}\nNode-kind: {kind}\nNode-action: {action}\n\n\n")
    }

    fn copy(path: &str, from: &str, rev: u32) -> String {
        format!(
            "Node-path: {path}\nNode-kind: dir\nNode-action: add\n\
             Node-copyfrom-rev: {rev}\nNode-copyfrom-path: {from}\n\n\n"
        )
    }

    fn rev(n: u32) -> String {
        format!("Revision-number: {n}\n\n")
    }

    fn ids_at(model: &Model, path: &str) -> Vec<EventId> {
        model.tree().history(path).to_vec()
    }

    #[test]
    fn add_requires_parent_directory() {
        let text = [
            rev(0),
            rev(1),
            node("trunk", "dir", "add"),
            node("trunk/a", "file", "add"),
        ]
        .concat();
        let model = scan(&text).expect("scan");
        let trunk = ids_at(&model, "trunk")[0];
        let file = ids_at(&model, "trunk/a")[0];
        assert_eq!(model.event(file).requires, vec![trunk]);
        assert!(model.event(trunk).requires.is_empty());
        assert_eq!(model.revisions().len(), 2);
        assert_eq!(model.revisions()[1].events, vec![trunk, file]);
    }

    #[test]
    fn missing_parent_is_fatal() {
        let text = [rev(0), rev(1), node("trunk/a", "file", "add")].concat();
        let err = scan(&text).expect_err("must fail");
        assert!(matches!(
            err,
            SiftError::Engine(EngineError::MissingParent { ref path, revision: 1 }) if path == "trunk/a"
        ));
    }

    #[test]
    fn missing_copy_source_is_fatal() {
        let text = [rev(0), rev(1), copy("x", "nowhere", 0)].concat();
        let err = scan(&text).expect_err("must fail");
        assert!(matches!(err, SiftError::Engine(EngineError::MissingCopySource { .. })));
    }

    #[test]
    fn copy_fans_out_synthetic_descendants() {
        let text = [
            rev(0),
            rev(1),
            node("trunk", "dir", "add"),
            node("trunk/d", "dir", "add"),
            node("trunk/d/f", "file", "add"),
            node("branches", "dir", "add"),
            rev(2),
            copy("branches/x", "trunk", 1),
        ]
        .concat();
        let model = scan(&text).expect("scan");

        let trunk = ids_at(&model, "trunk")[0];
        let file = ids_at(&model, "trunk/d/f")[0];
        let dir = ids_at(&model, "trunk/d")[0];
        let branches = ids_at(&model, "branches")[0];
        let trigger = ids_at(&model, "branches/x")[0];
        let syn_dir = ids_at(&model, "branches/x/d")[0];
        let syn_file = ids_at(&model, "branches/x/d/f")[0];

        assert!(model.event(syn_dir).is_synthetic);
        assert_eq!(model.event(syn_file).origin, Some(trigger));
        assert_eq!(model.event(syn_file).action, Action::Add);
        assert_eq!(model.event(trigger).requires, vec![branches, trunk, syn_dir, syn_file]);
        assert_eq!(model.event(syn_dir).requires, vec![dir, trigger]);
        assert_eq!(model.event(syn_file).requires, vec![file, syn_dir]);
        assert_eq!(model.revisions()[2].synthetic, vec![syn_dir, syn_file]);
    }

    #[test]
    fn delete_fans_out_synthetic_deletes() {
        let text = [
            rev(0),
            rev(1),
            node("trunk", "dir", "add"),
            node("trunk/a", "file", "add"),
            rev(2),
            node("trunk", "dir", "delete"),
        ]
        .concat();
        let model = scan(&text).expect("scan");
        let trunk_delete = ids_at(&model, "trunk")[1];
        let syn = ids_at(&model, "trunk/a")[1];
        let trunk_add = ids_at(&model, "trunk")[0];
        assert_eq!(model.event(syn).action, Action::Delete);
        assert!(model.event(syn).requires.is_empty());
        assert_eq!(model.event(trunk_delete).requires, vec![trunk_add, syn]);
        assert_eq!(model.tree().lookup_at(model.events(), "trunk/a", 2, false), None);
    }

    #[test]
    fn replace_fans_out_deletes_then_copies() {
        let text = [
            rev(0),
            rev(1),
            node("trunk", "dir", "add"),
            node("trunk/a", "file", "add"),
            node("trunk/old", "file", "add"),
            node("lib", "dir", "add"),
            node("lib/a", "file", "add"),
            node("lib/new", "file", "add"),
            rev(2),
            "Node-path: trunk\nNode-kind: dir\nNode-action: replace\n\
             Node-copyfrom-rev: 1\nNode-copyfrom-path: lib\n\n\n"
                .to_string(),
        ]
        .concat();
        let model = scan(&text).expect("scan");

        let trunk_add = ids_at(&model, "trunk")[0];
        let trigger = ids_at(&model, "trunk")[1];
        let lib = ids_at(&model, "lib")[0];
        let lib_a = ids_at(&model, "lib/a")[0];
        let lib_new = ids_at(&model, "lib/new")[0];
        let del_a = ids_at(&model, "trunk/a")[1];
        let del_old = ids_at(&model, "trunk/old")[1];
        let copied_a = ids_at(&model, "trunk/a")[2];
        let copied_new = ids_at(&model, "trunk/new")[0];

        assert_eq!(model.event(trigger).action, Action::Replace);
        assert_eq!(model.event(del_a).action, Action::Delete);
        assert_eq!(model.event(del_old).action, Action::Delete);
        assert_eq!(model.event(copied_a).action, Action::Replace);
        assert_eq!(model.event(copied_new).action, Action::Replace);
        for id in [del_a, del_old, copied_a, copied_new] {
            assert!(model.event(id).is_synthetic);
            assert_eq!(model.event(id).origin, Some(trigger));
        }

        // Old descendants go first, then the copied ones arrive.
        assert_eq!(model.revisions()[2].synthetic, vec![del_a, del_old, copied_a, copied_new]);
        assert_eq!(
            model.event(trigger).requires,
            vec![trunk_add, del_a, del_old, lib, copied_a, copied_new]
        );
        // The copied file does not depend on the delete it follows.
        assert_eq!(model.event(copied_a).requires, vec![lib_a, trigger]);
        assert_eq!(model.event(copied_new).requires, vec![lib_new, trigger]);
        assert!(model.event(del_a).requires.is_empty());

        assert_eq!(model.tree().lookup_at(model.events(), "trunk/old", 2, false), None);
        assert_eq!(
            model.tree().lookup_at(model.events(), "trunk/a", 2, false),
            Some(copied_a)
        );
        assert_eq!(
            model.tree().lookup_at(model.events(), "trunk/a", 1, false),
            Some(ids_at(&model, "trunk/a")[0])
        );
    }

    #[test]
    fn replace_without_copy_only_deletes_descendants() {
        let text = [
            rev(0),
            rev(1),
            node("trunk", "dir", "add"),
            node("trunk/a", "file", "add"),
            rev(2),
            node("trunk", "dir", "replace"),
        ]
        .concat();
        let model = scan(&text).expect("scan");
        let trunk_add = ids_at(&model, "trunk")[0];
        let trigger = ids_at(&model, "trunk")[1];
        let syn = ids_at(&model, "trunk/a")[1];
        assert_eq!(model.event(syn).action, Action::Delete);
        assert_eq!(model.event(trigger).requires, vec![trunk_add, syn]);
        assert_eq!(model.revisions()[2].synthetic, vec![syn]);
        assert_eq!(model.tree().lookup_at(model.events(), "trunk", 2, false), Some(trigger));
    }

    #[test]
    fn merge_sources_become_dependencies() {
        let props = "K 13\nsvn:mergeinfo\nV 12\n/trunk/a:1-2\nPROPS-END\n";
        let text = [
            rev(0),
            rev(1),
            node("trunk", "dir", "add"),
            node("trunk/a", "file", "add"),
            node("branch", "dir", "add"),
            node("branch/a", "file", "add"),
            rev(2),
            node("trunk/a", "file", "change"),
            rev(3),
            format!(
                "Node-path: branch/a\nNode-kind: file\nNode-action: change\n\
                 Prop-content-length: {len}\nContent-length: {len}\n\n{props}\n\n",
                len = props.len()
            ),
        ]
        .concat();
        let model = scan(&text).expect("scan");
        let trunk_change = ids_at(&model, "trunk/a")[1];
        let branch_add = ids_at(&model, "branch/a")[0];
        let merging = ids_at(&model, "branch/a")[1];
        assert_eq!(model.event(merging).requires, vec![branch_add, trunk_change]);
        assert_eq!(model.merges().len(), 1);
        assert_eq!(model.merge_for(merging).map(|m| m.original_len), Some(12));
    }

    #[test]
    fn unresolvable_merge_source_is_tolerated() {
        let props = "K 13\nsvn:mergeinfo\nV 10\n/gone:1-1\n\nPROPS-END\n";
        let text = [
            rev(0),
            rev(1),
            node("a", "dir", "add"),
            rev(2),
            format!(
                "Node-path: a\nNode-kind: dir\nNode-action: change\n\
                 Prop-content-length: {len}\nContent-length: {len}\n\n{props}\n\n",
                len = props.len()
            ),
        ]
        .concat();
        let model = scan(&text).expect("scan");
        let change = ids_at(&model, "a")[1];
        assert_eq!(model.event(change).requires.len(), 1);
    }

    #[test]
    fn revisions_must_increase() {
        let text = [rev(0), rev(2), rev(1)].concat();
        let err = scan(&text).expect_err("must fail");
        assert!(matches!(
            err,
            SiftError::Scan(ScanError::RevisionOrder { previous: 2, found: 1, .. })
        ));
    }

    #[test]
    fn node_before_revision_is_rejected() {
        let err = scan(&node("a", "dir", "add")).expect_err("must fail");
        assert!(matches!(err, SiftError::Scan(ScanError::NodeOutsideRevision { .. })));
    }
}
