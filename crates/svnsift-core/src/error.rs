use std::fmt;
use std::io;
use std::path::PathBuf;

use crate::config::ConfigError;
use crate::dump::ScanError;
use crate::engine::EngineError;
use crate::rewrite::RewriteError;

/// Machine-readable error codes, grouped by the category that decides the
/// process exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    MalformedArgument,
    ConflictingSelection,
    EmptySelection,
    RootRequiresInclude,
    RootNotCovering,
    ConfigParseError,
    InputOpenFailed,
    InputMalformed,
    InputTruncated,
    OutputOpenFailed,
    OutputWriteFailed,
    MissingDependency,
    StreamOutOfSync,
    InternalUnexpected,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::MalformedArgument => "E1001",
            Self::ConflictingSelection => "E1002",
            Self::EmptySelection => "E1003",
            Self::RootRequiresInclude => "E1004",
            Self::RootNotCovering => "E1005",
            Self::ConfigParseError => "E1006",
            Self::InputOpenFailed => "E2001",
            Self::InputMalformed => "E2002",
            Self::InputTruncated => "E2003",
            Self::OutputOpenFailed => "E3001",
            Self::OutputWriteFailed => "E3002",
            Self::MissingDependency => "E9001",
            Self::StreamOutOfSync => "E9002",
            Self::InternalUnexpected => "E9003",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::MalformedArgument => "Malformed argument",
            Self::ConflictingSelection => "Both includes and excludes given",
            Self::EmptySelection => "Nothing to include or exclude",
            Self::RootRequiresInclude => "Root redefinition requires include mode",
            Self::RootNotCovering => "Redefined root does not cover every include",
            Self::ConfigParseError => "Config file parse error",
            Self::InputOpenFailed => "Cannot open input",
            Self::InputMalformed => "Malformed dump record",
            Self::InputTruncated => "Truncated dump stream",
            Self::OutputOpenFailed => "Cannot open output",
            Self::OutputWriteFailed => "Output write failed",
            Self::MissingDependency => "Dependency could not be resolved",
            Self::StreamOutOfSync => "Second pass diverged from the first",
            Self::InternalUnexpected => "Internal unexpected error",
        }
    }

    /// Optional remediation hint that can be surfaced to operators.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::MalformedArgument => Some("Run `svnsift --help` for usage."),
            Self::ConflictingSelection => Some("Use either --include or --exclude, not both."),
            Self::EmptySelection => Some("Pass at least one --include or --exclude path."),
            Self::RootRequiresInclude => Some("Switch to --include paths to use --redefine-root."),
            Self::RootNotCovering => {
                Some("Every include path must equal or lie under the new root.")
            }
            Self::ConfigParseError => Some("Fix the syntax of the config file and retry."),
            Self::InputOpenFailed => Some("Check that the dump file exists and is readable."),
            Self::InputMalformed | Self::InputTruncated => {
                Some("Regenerate the dump with `svnadmin dump` and retry.")
            }
            Self::OutputOpenFailed | Self::OutputWriteFailed => {
                Some("Check disk space and write permissions.")
            }
            Self::MissingDependency => Some(
                "The dump references a path or revision that never existed; \
                 it is probably incomplete or was produced with --incremental.",
            ),
            Self::StreamOutOfSync => Some("The input changed between passes; rerun on a stable file."),
            Self::InternalUnexpected => Some("Retry once. If persistent, report a bug with logs."),
        }
    }

    /// Process exit status for this error category.
    ///
    /// - `1`: malformed argument or configuration
    /// - `2`: internal inconsistency
    /// - `3`: input or output cannot be opened
    /// - `4`: malformed input stream or write failure
    #[must_use]
    pub const fn exit_status(self) -> u8 {
        match self {
            Self::MalformedArgument
            | Self::ConflictingSelection
            | Self::EmptySelection
            | Self::RootRequiresInclude
            | Self::RootNotCovering
            | Self::ConfigParseError => 1,
            Self::MissingDependency | Self::StreamOutOfSync | Self::InternalUnexpected => 2,
            Self::InputOpenFailed | Self::OutputOpenFailed => 3,
            Self::InputMalformed | Self::InputTruncated | Self::OutputWriteFailed => 4,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

// ---------------------------------------------------------------------------
// SiftError
// ---------------------------------------------------------------------------

/// Top-level error for a filtering run.
#[derive(Debug, thiserror::Error)]
pub enum SiftError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Rewrite(#[from] RewriteError),

    #[error("{} can not be opened as infile: {source}", path.display())]
    OpenInput { path: PathBuf, source: io::Error },

    #[error("{} can not be opened as outfile: {source}", path.display())]
    OpenOutput { path: PathBuf, source: io::Error },
}

impl SiftError {
    /// Machine-readable code associated with this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Config(err) => err.code(),
            Self::Scan(err) => err.code(),
            Self::Engine(err) => err.code(),
            Self::Rewrite(err) => err.code(),
            Self::OpenInput { .. } => ErrorCode::InputOpenFailed,
            Self::OpenOutput { .. } => ErrorCode::OutputOpenFailed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ErrorCode;
    use std::collections::HashSet;

    const ALL: [ErrorCode; 14] = [
        ErrorCode::MalformedArgument,
        ErrorCode::ConflictingSelection,
        ErrorCode::EmptySelection,
        ErrorCode::RootRequiresInclude,
        ErrorCode::RootNotCovering,
        ErrorCode::ConfigParseError,
        ErrorCode::InputOpenFailed,
        ErrorCode::InputMalformed,
        ErrorCode::InputTruncated,
        ErrorCode::OutputOpenFailed,
        ErrorCode::OutputWriteFailed,
        ErrorCode::MissingDependency,
        ErrorCode::StreamOutOfSync,
        ErrorCode::InternalUnexpected,
    ];

    #[test]
    fn all_codes_are_unique() {
        let mut seen = HashSet::new();
        for code in ALL {
            assert!(seen.insert(code.code()), "duplicate code {}", code.code());
        }
    }

    #[test]
    fn code_format_is_machine_friendly() {
        for code in ALL {
            let text = code.code();
            assert_eq!(text.len(), 5);
            assert!(text.starts_with('E'));
            assert!(text.chars().skip(1).all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn exit_status_follows_code_family() {
        for code in ALL {
            let family = code.code().as_bytes()[1];
            let status = code.exit_status();
            match family {
                b'1' => assert_eq!(status, 1, "{code}"),
                b'9' => assert_eq!(status, 2, "{code}"),
                _ => assert!(status == 3 || status == 4, "{code}"),
            }
        }
    }
}
