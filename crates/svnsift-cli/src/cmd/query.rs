//! `svnsift query`: explain why paths are kept.

use std::fs::File;
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};

use clap::Args;
use serde::Serialize;
use svnsift_core::engine::{EventSummary, Explanation, KeepReason};
use svnsift_core::filter::analyze;
use svnsift_core::{FilterConfig, SiftError};

use super::{SelectionArgs, load_config};
use crate::output::{OutputMode, pretty_rule, render_mode, resolve_output_mode};

/// Arguments for `svnsift query`.
#[derive(Args, Debug)]
pub struct QueryArgs {
    /// Dump file to read.
    pub infile: PathBuf,

    /// Paths to explain.
    #[arg(required = true, value_name = "PATH")]
    pub paths: Vec<String>,

    #[command(flatten)]
    pub selection: SelectionArgs,
}

/// Kept events at one queried path.
#[derive(Debug, Serialize)]
pub struct PathReport {
    pub path: String,
    pub kept: Vec<Explanation>,
}

/// Execute `svnsift query`.
///
/// # Errors
///
/// Returns the [`SiftError`] of the analysis, with context.
pub fn run_query(
    args: &QueryArgs,
    format: Option<OutputMode>,
    json: bool,
    config: Option<&Path>,
) -> anyhow::Result<()> {
    let flags = FilterConfig {
        include: args.selection.include.clone(),
        exclude: args.selection.exclude.clone(),
        ..FilterConfig::default()
    };
    let merged = load_config(config, flags)?;
    let output = resolve_output_mode(format, json, merged.output.as_deref());
    let options = merged.validate().map_err(SiftError::from)?;

    let input = File::open(&args.infile).map_err(|source| SiftError::OpenInput {
        path: args.infile.clone(),
        source,
    })?;
    let model = analyze(BufReader::new(input), &options)?;

    let reports: Vec<PathReport> = args
        .paths
        .iter()
        .map(|path| PathReport {
            path: path.clone(),
            kept: model.explain(path),
        })
        .collect();

    render_mode(output, &reports, |reports, w| render_text(reports, w), |reports, w| {
        render_pretty(reports, w)
    })
}

fn describe(event: &EventSummary) -> String {
    let implicit = if event.synthetic { " (implicit)" } else { "" };
    format!("r{} {} {}{implicit}", event.revision, event.action, event.path)
}

fn reason_label(reason: &KeepReason) -> &'static str {
    match reason {
        KeepReason::Selected => "selected",
        KeepReason::Required { .. } => "required",
        KeepReason::TerminalDelete => "terminal-delete",
        KeepReason::Restored => "restored",
    }
}

fn render_text(reports: &[PathReport], w: &mut dyn Write) -> std::io::Result<()> {
    for report in reports {
        if report.kept.is_empty() {
            writeln!(w, "{}\tnot-kept", report.path)?;
        }
        for explanation in &report.kept {
            write!(
                w,
                "{}\t{}\t{}",
                report.path,
                describe(&explanation.event),
                reason_label(&explanation.reason)
            )?;
            if let KeepReason::Required { chain } = &explanation.reason {
                let links: Vec<String> = chain.iter().map(describe).collect();
                write!(w, "\t{}", links.join(" <- "))?;
            }
            writeln!(w)?;
        }
    }
    Ok(())
}

fn render_pretty(reports: &[PathReport], w: &mut dyn Write) -> std::io::Result<()> {
    for report in reports {
        writeln!(w, "{}", report.path)?;
        pretty_rule(w)?;
        if report.kept.is_empty() {
            writeln!(w, "  not kept")?;
        }
        for explanation in &report.kept {
            writeln!(w, "  {}", describe(&explanation.event))?;
            match &explanation.reason {
                KeepReason::Selected => writeln!(w, "    matched the selection")?,
                KeepReason::TerminalDelete => {
                    writeln!(w, "    ends the history of a kept path")?;
                }
                KeepReason::Restored => {
                    writeln!(w, "    restored for a kept implicit delete")?;
                }
                KeepReason::Required { chain } => {
                    for link in chain {
                        writeln!(w, "    required by {}", describe(link))?;
                    }
                }
            }
        }
        writeln!(w)?;
    }
    Ok(())
}
