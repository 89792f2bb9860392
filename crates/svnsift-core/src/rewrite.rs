//! Second pass: replay the dump and write what the model keeps.
//!
//! The replay is positionally synchronized with the first pass: the Nth
//! revision record and the Nth node record inside it correspond to the Nth
//! entries of [`Model::revisions`] and their literal event lists. Nothing is
//! matched by content; the revision number and node path are only checked
//! to detect an input that changed between the passes.
//!
//! Written records get their `Revision-number`, `Node-path`,
//! `Node-copyfrom-rev`, `Node-copyfrom-path` and (when revisions are
//! dropped or the root is redefined) `svn:mergeinfo` rewritten, with
//! `Prop-content-length` and `Content-length` recomputed. Empty separator
//! lines follow the record before them.

use std::io::{self, BufRead, Write};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use crate::config::SyntheticConfig;
use crate::dump::{
    CONTENT_LENGTH, DumpReader, Item, NODE_ACTION, NODE_COPYFROM_PATH, NODE_COPYFROM_REV,
    NODE_PATH, PROP_CONTENT_LENGTH, PropBlock, REVISION_NUMBER, RecordHeader, RecordKind,
    ScanError,
};
use crate::engine::Model;
use crate::error::ErrorCode;
use crate::history::{EventId, path};
use crate::mergeinfo::{MERGEINFO_PROPERTY, MergeRecord};

/// Failures of the second pass.
#[derive(Debug, thiserror::Error)]
pub enum RewriteError {
    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error("write failed: {0}")]
    Write(#[source] io::Error),

    #[error("line {line}: expected revision {expected}, found {found}")]
    RevisionOutOfSync { line: u64, expected: u32, found: u32 },

    #[error("line {line}: expected node '{expected}', found '{found}'")]
    NodeOutOfSync {
        line: u64,
        expected: String,
        found: String,
    },

    #[error("line {line}: record not seen by the first pass")]
    UnexpectedRecord { line: u64 },

    #[error("the first pass saw {expected} revisions, the second {found}")]
    RevisionCount { expected: usize, found: usize },

    #[error("line {line}: svn:mergeinfo differs from the first pass")]
    MergeInfoOutOfSync { line: u64 },
}

impl RewriteError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Scan(err) => err.code(),
            Self::Write(_) => ErrorCode::OutputWriteFailed,
            Self::RevisionOutOfSync { .. }
            | Self::NodeOutOfSync { .. }
            | Self::UnexpectedRecord { .. }
            | Self::RevisionCount { .. }
            | Self::MergeInfoOutOfSync { .. } => ErrorCode::StreamOutOfSync,
        }
    }
}

/// Counts from one rewrite.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RewriteStats {
    pub revisions_written: u32,
    pub events_written: u64,
    pub mergeinfo_rewritten: u64,
}

/// Position of the replay in the model.
#[derive(Debug, Default)]
struct Cursor {
    /// Index into [`Model::revisions`] of the current revision.
    revision: Option<usize>,
    /// Index of the next literal event within it.
    event: usize,
}

/// Replay `reader` from its current position and write the kept records.
///
/// # Errors
///
/// Returns [`RewriteError`] for read or write failures, or when the input
/// does not match what the first pass saw.
pub fn rewrite<R: BufRead, W: Write + ?Sized>(
    model: &Model,
    reader: &mut DumpReader<R>,
    out: &mut W,
) -> Result<RewriteStats, RewriteError> {
    let mut cursor = Cursor::default();
    let mut stats = RewriteStats::default();
    // Separator lines belong to the record before them.
    let mut emitting = true;

    while let Some(item) = reader.next_item()? {
        let header = match item {
            Item::Blank => {
                if emitting {
                    out.write_all(b"\n").map_err(RewriteError::Write)?;
                }
                continue;
            }
            Item::Record(header) => header,
        };

        emitting = match header.kind() {
            RecordKind::Preamble => {
                write_verbatim(&header, reader, out)?;
                true
            }
            RecordKind::Revision => write_revision(model, &mut cursor, header, reader, out, &mut stats)?,
            RecordKind::Node => write_node(model, &mut cursor, header, reader, out, &mut stats)?,
        };
    }

    let found = cursor.revision.map_or(0, |index| index + 1);
    if found != model.revisions().len() {
        return Err(RewriteError::RevisionCount {
            expected: model.revisions().len(),
            found,
        });
    }
    info!(
        revisions = stats.revisions_written,
        events = stats.events_written,
        mergeinfo = stats.mergeinfo_rewritten,
        "second pass complete"
    );
    Ok(stats)
}

fn write_verbatim<R: BufRead, W: Write + ?Sized>(
    header: &RecordHeader,
    reader: &mut DumpReader<R>,
    out: &mut W,
) -> Result<(), RewriteError> {
    header.write_to(out).map_err(RewriteError::Write)?;
    reader.copy_rest(out)?;
    Ok(())
}

fn write_revision<R: BufRead, W: Write + ?Sized>(
    model: &Model,
    cursor: &mut Cursor,
    mut header: RecordHeader,
    reader: &mut DumpReader<R>,
    out: &mut W,
    stats: &mut RewriteStats,
) -> Result<bool, RewriteError> {
    let index = cursor.revision.map_or(0, |index| index + 1);
    let revision = model
        .revisions()
        .get(index)
        .ok_or(RewriteError::UnexpectedRecord { line: header.line })?;
    let found: u32 = header.number(REVISION_NUMBER)?.unwrap_or_default();
    if found != revision.number {
        return Err(RewriteError::RevisionOutOfSync {
            line: header.line,
            expected: revision.number,
            found,
        });
    }
    cursor.revision = Some(index);
    cursor.event = 0;

    let Some(renumbered) = revision.renumbered else {
        debug!(revision = revision.number, "dropping empty revision");
        return Ok(false);
    };
    header.set(REVISION_NUMBER, renumbered.to_string());
    write_verbatim(&header, reader, out)?;
    stats.revisions_written += 1;
    Ok(true)
}

fn write_node<R: BufRead, W: Write + ?Sized>(
    model: &Model,
    cursor: &mut Cursor,
    mut header: RecordHeader,
    reader: &mut DumpReader<R>,
    out: &mut W,
    stats: &mut RewriteStats,
) -> Result<bool, RewriteError> {
    let line = header.line;
    let revision = cursor
        .revision
        .and_then(|index| model.revisions().get(index))
        .ok_or(RewriteError::UnexpectedRecord { line })?;
    let id: EventId = *revision
        .events
        .get(cursor.event)
        .ok_or(RewriteError::UnexpectedRecord { line })?;
    cursor.event += 1;

    let event = model.event(id);
    let found = path::normalize(header.get(NODE_PATH).unwrap_or_default());
    if found != &*event.path {
        return Err(RewriteError::NodeOutOfSync {
            line,
            expected: event.path.to_string(),
            found: found.to_string(),
        });
    }

    if revision.renumbered.is_none() || !model.writes(id) {
        return Ok(false);
    }
    let Some(node_path) = model.reduce_path(&event.path) else {
        return Ok(false);
    };
    header.set(NODE_PATH, node_path);
    if let Some(source) = &event.copy_source {
        header.set(NODE_COPYFROM_REV, model.resolve(source.revision).to_string());
        if let Some(source_path) = model.reduce_path(&source.path) {
            header.set(NODE_COPYFROM_PATH, source_path);
        }
    }

    let record = model
        .merge_for(id)
        .filter(|_| model.rewrites_mergeinfo());
    match record {
        Some(record) => {
            write_with_mergeinfo(model, record, &mut header, reader, out)?;
            stats.mergeinfo_rewritten += 1;
        }
        None => write_verbatim(&header, reader, out)?,
    }
    stats.events_written += 1;
    Ok(true)
}

/// Write a node whose `svn:mergeinfo` must follow renumbering and root
/// reduction.
fn write_with_mergeinfo<R: BufRead, W: Write + ?Sized>(
    model: &Model,
    record: &MergeRecord,
    header: &mut RecordHeader,
    reader: &mut DumpReader<R>,
    out: &mut W,
) -> Result<(), RewriteError> {
    let line = header.line;
    let prop_length = header.prop_length()?;
    let text_length = header.text_length()?;
    let mut block = PropBlock::parse(&reader.read_body(prop_length)?).map_err(ScanError::from)?;
    if block.get(MERGEINFO_PROPERTY).map(<[u8]>::len) != Some(record.original_len) {
        return Err(RewriteError::MergeInfoOutOfSync { line });
    }

    let remapped = record.info.remap(
        |revision| model.resolve(revision),
        |source| match model.root() {
            None => Some(source.to_string()),
            Some(root) => path::relative_to(source, root).map(str::to_string),
        },
    );
    block.set(MERGEINFO_PROPERTY, remapped.render());
    let props = block.encode();

    header.set(PROP_CONTENT_LENGTH, props.len().to_string());
    header.upsert(CONTENT_LENGTH, (props.len() as u64 + text_length).to_string());
    header.write_to(out).map_err(RewriteError::Write)?;
    out.write_all(&props).map_err(RewriteError::Write)?;
    reader.copy_rest(out)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Synthetic deletion revision
// ---------------------------------------------------------------------------

/// Append a revision that deletes `paths`.
///
/// # Errors
///
/// Returns [`RewriteError::Write`] if the output cannot be written.
pub fn write_delete_revision<W: Write + ?Sized>(
    out: &mut W,
    number: u32,
    paths: &[String],
    synthetic: &SyntheticConfig,
    now: DateTime<Utc>,
) -> Result<(), RewriteError> {
    let mut props = PropBlock::default();
    props.push(b"svn:log", synthetic.message.as_bytes());
    props.push(b"svn:author", synthetic.author.as_bytes());
    props.push(
        b"svn:date",
        now.format("%Y-%m-%dT%H:%M:%S.000000Z").to_string().as_bytes(),
    );
    let props = props.encode();

    let mut header = RecordHeader::new(0);
    header.push(REVISION_NUMBER, &number.to_string());
    header.push(PROP_CONTENT_LENGTH, &props.len().to_string());
    header.push(CONTENT_LENGTH, &props.len().to_string());

    let mut write = || -> io::Result<()> {
        header.write_to(out)?;
        out.write_all(&props)?;
        out.write_all(b"\n")?;
        for deleted in paths {
            let mut node = RecordHeader::new(0);
            node.push(NODE_PATH, deleted);
            node.push(NODE_ACTION, "delete");
            node.write_to(out)?;
            out.write_all(b"\n\n")?;
        }
        Ok(())
    };
    write().map_err(RewriteError::Write)?;
    info!(revision = number, paths = paths.len(), "appended deletion revision");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn delete_revision_matches_dump_layout() {
        let now = Utc
            .with_ymd_and_hms(2024, 3, 9, 7, 5, 1)
            .single()
            .expect("valid date");
        let mut out = Vec::new();
        write_delete_revision(
            &mut out,
            7,
            &["lib".to_string(), "tools/x".to_string()],
            &SyntheticConfig::default(),
            now,
        )
        .expect("write");
        let text = String::from_utf8(out).expect("utf8");
        let props = "K 7\nsvn:log\nV 22\nDeleted unwanted nodes\n\
                     K 10\nsvn:author\nV 7\nsvnsift\n\
                     K 8\nsvn:date\nV 27\n2024-03-09T07:05:01.000000Z\nPROPS-END\n";
        assert_eq!(
            text,
            format!(
                "Revision-number: 7\nProp-content-length: {len}\nContent-length: {len}\n\n{props}\n\
                 Node-path: lib\nNode-action: delete\n\n\n\n\
                 Node-path: tools/x\nNode-action: delete\n\n\n\n",
                len = props.len()
            )
        );
    }

    #[test]
    fn out_of_sync_errors_are_internal() {
        let err = RewriteError::NodeOutOfSync {
            line: 3,
            expected: "a".to_string(),
            found: "b".to_string(),
        };
        assert_eq!(err.code(), ErrorCode::StreamOutOfSync);
        assert_eq!(err.code().exit_status(), 2);
        let err = RewriteError::Write(io::Error::other("disk full"));
        assert_eq!(err.code().exit_status(), 4);
    }
}
