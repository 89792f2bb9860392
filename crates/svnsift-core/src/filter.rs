//! Two-pass filtering runs.
//!
//! [`analyze`] is the first pass plus every decision step; [`filter_stream`]
//! adds the rewrite and the optional deletion revision on a seekable input.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Seek, Write};
use std::path::Path;

use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::FilterOptions;
use crate::dump::DumpReader;
use crate::engine::Model;
use crate::error::SiftError;
use crate::rewrite::{self, RewriteError};
use crate::timing;

/// Summary of one filtering run.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct FilterReport {
    pub revisions_read: usize,
    pub revisions_written: u32,
    pub events_read: usize,
    pub events_kept: usize,
    /// Deletes kept only to end the history of a kept path.
    pub events_forced: usize,
    pub synthetic_events: usize,
    pub root_redefined: bool,
    pub mergeinfo_rewritten: u64,
    /// Paths deleted by the appended revision.
    pub deleted_paths: Vec<String>,
    pub delete_revision: Option<u32>,
}

/// Scan a dump and decide what to keep.
///
/// # Errors
///
/// Returns [`SiftError`] for malformed input or unresolvable dependencies.
pub fn analyze<R: BufRead>(input: R, options: &FilterOptions) -> Result<Model, SiftError> {
    let mut reader = DumpReader::new(input);
    let mut model = timing::timed("scan", || Model::scan(&mut reader))?;
    model.apply(options);
    Ok(model)
}

/// Filter `input` into `output`.
///
/// # Errors
///
/// Returns [`SiftError`] for malformed input, unresolvable dependencies or
/// write failures. Output may be partially written on error.
pub fn filter_stream<R: BufRead + Seek, W: Write>(
    input: R,
    output: &mut W,
    options: &FilterOptions,
) -> Result<FilterReport, SiftError> {
    let mut reader = DumpReader::new(input);
    let mut model = timing::timed("scan", || Model::scan(&mut reader))?;
    model.apply(options);
    if options.redefine_root.is_some() && model.root().is_none() {
        warn!("root redefinition was not applied; paths are written unchanged");
    }

    reader.seek_start()?;
    let stats = timing::timed("rewrite", || rewrite::rewrite(&model, &mut reader, &mut *output))?;

    let mut report = report_for(&model);
    report.revisions_written = stats.revisions_written;
    report.mergeinfo_rewritten = stats.mergeinfo_rewritten;

    if options.add_delete {
        let lingering = model.lingering_paths(&options.selection);
        if lingering.is_empty() {
            info!("no lingering paths; deletion revision not needed");
        } else {
            let number = model.last_written().map_or(0, |last| last + 1);
            rewrite::write_delete_revision(
                output,
                number,
                &lingering,
                &options.synthetic,
                Utc::now(),
            )?;
            report.revisions_written += 1;
            report.delete_revision = Some(number);
            report.deleted_paths = lingering;
        }
    }

    output.flush().map_err(RewriteError::Write)?;
    Ok(report)
}

/// [`filter_stream`] between two files.
///
/// # Errors
///
/// Returns [`SiftError::OpenInput`] / [`SiftError::OpenOutput`] when a file
/// cannot be opened, otherwise as [`filter_stream`].
pub fn filter_dump(
    infile: &Path,
    outfile: &Path,
    options: &FilterOptions,
) -> Result<FilterReport, SiftError> {
    let input = File::open(infile).map_err(|source| SiftError::OpenInput {
        path: infile.to_path_buf(),
        source,
    })?;
    let output = File::create(outfile).map_err(|source| SiftError::OpenOutput {
        path: outfile.to_path_buf(),
        source,
    })?;
    let mut writer = BufWriter::new(output);
    filter_stream(BufReader::new(input), &mut writer, options)
}

fn report_for(model: &Model) -> FilterReport {
    let tally = model.tally();
    FilterReport {
        revisions_read: model.revisions().len(),
        events_read: tally.literal,
        events_kept: tally.kept,
        events_forced: tally.forced,
        synthetic_events: tally.synthetic,
        root_redefined: model.root().is_some(),
        ..FilterReport::default()
    }
}
