//! `svnsift filter`: write a filtered copy of a dump.

use std::io::Write;
use std::path::{Path, PathBuf};

use clap::Args;
use svnsift_core::filter::filter_dump;
use svnsift_core::{FilterConfig, FilterReport, SiftError};
use tracing::info;

use super::{SelectionArgs, load_config};
use crate::output::{OutputMode, pretty_kv, pretty_section, render_mode, resolve_output_mode};

/// Arguments for `svnsift filter`.
#[derive(Args, Debug)]
pub struct FilterArgs {
    /// Dump file to read. Must be seekable: it is read twice.
    pub infile: PathBuf,

    /// Where to write the filtered dump.
    pub outfile: PathBuf,

    #[command(flatten)]
    pub selection: SelectionArgs,

    /// Drop revisions left without nodes and renumber the rest.
    #[arg(long)]
    pub drop_empty: bool,

    /// Make PATH the root of the output. Include mode only.
    #[arg(long, value_name = "PATH")]
    pub redefine_root: Option<String>,

    /// Append a revision deleting kept paths outside the selection.
    #[arg(long)]
    pub add_delete: bool,
}

impl FilterArgs {
    fn flags(&self) -> FilterConfig {
        FilterConfig {
            include: self.selection.include.clone(),
            exclude: self.selection.exclude.clone(),
            drop_empty: self.drop_empty,
            redefine_root: self.redefine_root.clone(),
            add_delete: self.add_delete,
            ..FilterConfig::default()
        }
    }
}

/// Execute `svnsift filter`.
///
/// # Errors
///
/// Returns the [`SiftError`] of the failing step, with context.
pub fn run_filter(
    args: &FilterArgs,
    format: Option<OutputMode>,
    json: bool,
    config: Option<&Path>,
) -> anyhow::Result<()> {
    let merged = load_config(config, args.flags())?;
    let output = resolve_output_mode(format, json, merged.output.as_deref());
    let options = merged.validate().map_err(SiftError::from)?;

    info!(infile = %args.infile.display(), outfile = %args.outfile.display(), "filtering");
    let report = filter_dump(&args.infile, &args.outfile, &options)?;

    render_mode(output, &report, render_text, |report, w| {
        render_pretty(report, &args.outfile, w)
    })
}

fn render_text(report: &FilterReport, w: &mut dyn Write) -> std::io::Result<()> {
    writeln!(w, "revisions_read {}", report.revisions_read)?;
    writeln!(w, "revisions_written {}", report.revisions_written)?;
    writeln!(w, "events_read {}", report.events_read)?;
    writeln!(w, "events_kept {}", report.events_kept)?;
    writeln!(w, "events_forced {}", report.events_forced)?;
    writeln!(w, "synthetic_events {}", report.synthetic_events)?;
    writeln!(w, "root_redefined {}", report.root_redefined)?;
    writeln!(w, "mergeinfo_rewritten {}", report.mergeinfo_rewritten)?;
    if let Some(number) = report.delete_revision {
        writeln!(w, "delete_revision {number}")?;
        for path in &report.deleted_paths {
            writeln!(w, "deleted {path}")?;
        }
    }
    Ok(())
}

fn render_pretty(report: &FilterReport, outfile: &Path, w: &mut dyn Write) -> std::io::Result<()> {
    pretty_section(w, &format!("Filtered dump written to {}", outfile.display()))?;
    pretty_kv(
        w,
        "revisions",
        format!("{} read, {} written", report.revisions_read, report.revisions_written),
    )?;
    pretty_kv(
        w,
        "events",
        format!(
            "{} read, {} kept, {} terminal deletes",
            report.events_read, report.events_kept, report.events_forced
        ),
    )?;
    pretty_kv(w, "implicit", report.synthetic_events.to_string())?;
    pretty_kv(
        w,
        "root",
        if report.root_redefined { "redefined" } else { "unchanged" },
    )?;
    pretty_kv(w, "mergeinfo", format!("{} rewritten", report.mergeinfo_rewritten))?;
    if let Some(number) = report.delete_revision {
        pretty_kv(
            w,
            "deleted",
            format!("r{number}: {}", report.deleted_paths.join(", ")),
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> FilterReport {
        FilterReport {
            revisions_read: 5,
            revisions_written: 4,
            events_read: 9,
            events_kept: 3,
            events_forced: 1,
            synthetic_events: 2,
            root_redefined: false,
            mergeinfo_rewritten: 0,
            deleted_paths: vec!["tools".to_string()],
            delete_revision: Some(4),
        }
    }

    #[test]
    fn text_report_lists_counts() {
        let mut buf = Vec::new();
        render_text(&sample(), &mut buf).expect("render");
        let text = String::from_utf8(buf).expect("utf8");
        assert!(text.contains("revisions_written 4\n"));
        assert!(text.contains("delete_revision 4\ndeleted tools\n"));
    }

    #[test]
    fn pretty_report_names_outfile() {
        let mut buf = Vec::new();
        render_pretty(&sample(), Path::new("out.dump"), &mut buf).expect("render");
        let text = String::from_utf8(buf).expect("utf8");
        assert!(text.starts_with("Filtered dump written to out.dump\n"));
        assert!(text.contains("r4: tools"));
    }
}
