//! Content stripper.
//!
//! Copies a dump while dropping the text of every node, for sharing or
//! debugging the structure of a repository without its contents. Headers and
//! property blocks are kept; `Text-content-length` becomes 0, checksums and
//! delta markers of the dropped text are removed, and `Content-length` is
//! reduced to the property length. The result still loads, with every file
//! empty.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use serde::Serialize;
use tracing::info;

use crate::dump::{
    CONTENT_LENGTH, DumpReader, Item, RecordKind, TEXT_CONTENT_LENGTH, TEXT_CONTENT_MD5,
    TEXT_CONTENT_SHA1, TEXT_DELTA, TEXT_DELTA_BASE_MD5, TEXT_DELTA_BASE_SHA1,
};
use crate::error::SiftError;
use crate::rewrite::RewriteError;

const TEXT_HEADERS: [&str; 5] = [
    TEXT_DELTA,
    TEXT_CONTENT_MD5,
    TEXT_CONTENT_SHA1,
    TEXT_DELTA_BASE_MD5,
    TEXT_DELTA_BASE_SHA1,
];

/// Counts from one strip run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StripReport {
    pub records: u64,
    pub nodes_stripped: u64,
    pub bytes_dropped: u64,
}

/// Copy `input` to `out` without node text.
///
/// # Errors
///
/// Returns [`RewriteError`] for malformed input or a failed write.
pub fn strip<R: BufRead, W: Write + ?Sized>(
    input: R,
    out: &mut W,
) -> Result<StripReport, RewriteError> {
    let mut reader = DumpReader::new(input);
    let mut report = StripReport::default();

    while let Some(item) = reader.next_item()? {
        let mut header = match item {
            Item::Blank => {
                out.write_all(b"\n").map_err(RewriteError::Write)?;
                continue;
            }
            Item::Record(header) => header,
        };
        report.records += 1;

        let text_length = header.text_length()?;
        if header.kind() != RecordKind::Node || text_length == 0 {
            header.write_to(out).map_err(RewriteError::Write)?;
            reader.copy_rest(out)?;
            continue;
        }

        let prop_length = header.prop_length()?;
        header.set(TEXT_CONTENT_LENGTH, "0");
        for key in TEXT_HEADERS {
            header.remove(key);
        }
        if header.get(CONTENT_LENGTH).is_some() {
            header.set(CONTENT_LENGTH, prop_length.to_string());
        }
        header.write_to(out).map_err(RewriteError::Write)?;
        reader.copy_body(prop_length, out)?;
        reader.skip_body()?;

        report.nodes_stripped += 1;
        report.bytes_dropped += text_length;
    }

    info!(
        records = report.records,
        nodes = report.nodes_stripped,
        bytes = report.bytes_dropped,
        "content stripped"
    );
    Ok(report)
}

/// [`strip`] between two files.
///
/// # Errors
///
/// Returns [`SiftError::OpenInput`] / [`SiftError::OpenOutput`] when a file
/// cannot be opened, otherwise as [`strip`].
pub fn strip_file(infile: &Path, outfile: &Path) -> Result<StripReport, SiftError> {
    let input = File::open(infile).map_err(|source| SiftError::OpenInput {
        path: infile.to_path_buf(),
        source,
    })?;
    let output = File::create(outfile).map_err(|source| SiftError::OpenOutput {
        path: outfile.to_path_buf(),
        source,
    })?;
    let mut writer = BufWriter::new(output);
    let report = strip(BufReader::new(input), &mut writer)?;
    writer.flush().map_err(RewriteError::Write)?;
    Ok(report)
}
