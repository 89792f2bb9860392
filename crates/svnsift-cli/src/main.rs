#![forbid(unsafe_code)]

mod cmd;
mod output;

use clap::error::ErrorKind;
use clap::{CommandFactory, Parser, Subcommand};
use output::{CliError, OutputMode, render_error};
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use svnsift_core::config::ConfigError;
use svnsift_core::error::ErrorCode;
use svnsift_core::{SiftError, timing};
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "svnsift: filter Subversion dump streams by path",
    long_about = None
)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit phase timing report to stderr.
    #[arg(long, global = true)]
    timing: bool,

    /// Emit JSON reports instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    /// Report format.
    #[arg(long, global = true, value_enum)]
    format: Option<OutputMode>,

    /// Read settings from this TOML file, on top of the user config.
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    /// Output mode for errors and commands that take no config.
    fn output_mode(&self) -> OutputMode {
        output::resolve_output_mode(self.format, self.json, None)
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Filtering",
        about = "Write a filtered copy of a dump",
        long_about = "Keep the selected subtrees of a dump, plus every parent directory, copy \
                      source, merge source and terminal delete they depend on.",
        after_help = "EXAMPLES:\n    # Keep one project\n    svnsift filter repo.dump out.dump --include projects/web\n\n    # Drop tags and renumber the remaining revisions\n    svnsift filter repo.dump out.dump --exclude tags --drop-empty\n\n    # Make the project the new repository root\n    svnsift filter repo.dump out.dump -i projects/web --redefine-root projects/web\n\n    # Emit machine-readable report\n    svnsift filter repo.dump out.dump -i trunk --json"
    )]
    Filter(cmd::filter::FilterArgs),

    #[command(
        next_help_heading = "Diagnostics",
        about = "Explain why paths are kept",
        long_about = "Run the selection without writing output and show, for every kept event at \
                      each path, the chain of dependencies that keeps it.",
        after_help = "EXAMPLES:\n    # Why is trunk kept when only a branch is included?\n    svnsift query repo.dump trunk --include branches/x\n\n    # Emit machine-readable output\n    svnsift query repo.dump trunk -i branches/x --json"
    )]
    Query(cmd::query::QueryArgs),

    #[command(
        next_help_heading = "Diagnostics",
        about = "Copy a dump without file contents",
        long_about = "Copy a dump with every file body removed, keeping structure and properties.",
        after_help = "EXAMPLES:\n    # Share repository structure without its contents\n    svnsift strip repo.dump skeleton.dump"
    )]
    Strip(cmd::strip::StripArgs),

    #[command(
        next_help_heading = "Maintenance",
        about = "Generate shell completion scripts",
        long_about = "Generate shell completion scripts for supported shells.",
        after_help = "EXAMPLES:\n    # Generate bash completions\n    svnsift completions bash\n\n    # Generate zsh completions\n    svnsift completions zsh"
    )]
    Completions(cmd::completions::CompletionsArgs),
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_env("SVNSIFT_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if verbose || env::var("DEBUG").is_ok() {
            "svnsift=debug,info"
        } else {
            "svnsift=info,warn"
        })
    });

    let format = env::var("SVNSIFT_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let config = cli.config.as_deref();
    match &cli.command {
        Commands::Filter(args) => timing::timed("cmd.filter", || {
            cmd::filter::run_filter(args, cli.format, cli.json, config)
        }),
        Commands::Query(args) => timing::timed("cmd.query", || {
            cmd::query::run_query(args, cli.format, cli.json, config)
        }),
        Commands::Strip(args) => {
            timing::timed("cmd.strip", || cmd::strip::run_strip(args, cli.output_mode()))
        }
        Commands::Completions(args) => timing::timed("cmd.completions", || {
            let mut command = Cli::command();
            cmd::completions::run_completions(args.shell, &mut command)
        }),
    }
}

/// Error code behind an `anyhow` chain, if it came from the library.
fn error_code(err: &anyhow::Error) -> Option<ErrorCode> {
    err.downcast_ref::<SiftError>()
        .map(SiftError::code)
        .or_else(|| err.downcast_ref::<ConfigError>().map(ConfigError::code))
}

fn report_error(err: &anyhow::Error, mode: OutputMode) -> ExitCode {
    let code = error_code(err).unwrap_or(ErrorCode::InternalUnexpected);
    debug!(code = %code, "command failed");
    let cli_error = CliError::with_code(format!("{err:#}"), code);
    if render_error(mode, &cli_error).is_err() {
        eprintln!("error[{code}]: {err:#}");
    }
    ExitCode::from(code.exit_status())
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::from(ErrorCode::MalformedArgument.exit_status()),
            };
        }
    };
    init_tracing(cli.verbose);

    let timing_enabled = cli.timing || timing::timing_enabled_from_env();
    timing::set_timing_enabled(timing_enabled);
    timing::clear_timings();

    if cli.verbose {
        info!("Verbose mode enabled");
    }

    let result = run(&cli);

    if timing_enabled {
        let report = timing::collect_report();
        if report.is_empty() {
            eprintln!("timing report: no samples recorded");
        } else {
            eprintln!("timing report:");
            eprintln!("{}", report.display_table());
            eprintln!("timing report (json):");
            match serde_json::to_string_pretty(&report.to_json()) {
                Ok(json) => eprintln!("{json}"),
                Err(err) => eprintln!("timing report unavailable: {err}"),
            }
        }
    }

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => report_error(&err, cli.output_mode()),
    }
}
