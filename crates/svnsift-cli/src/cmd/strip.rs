//! `svnsift strip`: copy a dump without file contents.

use std::io::Write;
use std::path::PathBuf;

use clap::Args;
use svnsift_core::strip::strip_file;

use crate::output::{OutputMode, pretty_kv, pretty_section, render_mode};

/// Arguments for `svnsift strip`.
#[derive(Args, Debug)]
pub struct StripArgs {
    /// Dump file to read.
    pub infile: PathBuf,

    /// Where to write the stripped dump.
    pub outfile: PathBuf,
}

/// Execute `svnsift strip`.
///
/// # Errors
///
/// Returns the [`svnsift_core::SiftError`] of the copy.
pub fn run_strip(args: &StripArgs, output: OutputMode) -> anyhow::Result<()> {
    let report = strip_file(&args.infile, &args.outfile)?;
    render_mode(
        output,
        &report,
        |report, w| {
            writeln!(w, "records {}", report.records)?;
            writeln!(w, "nodes_stripped {}", report.nodes_stripped)?;
            writeln!(w, "bytes_dropped {}", report.bytes_dropped)
        },
        |report, w| {
            pretty_section(w, &format!("Stripped dump written to {}", args.outfile.display()))?;
            pretty_kv(w, "records", report.records.to_string())?;
            pretty_kv(w, "stripped", format!("{} nodes", report.nodes_stripped))?;
            pretty_kv(w, "dropped", format!("{} bytes", report.bytes_dropped))
        },
    )
}
