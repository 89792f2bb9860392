//! Subversion dump stream records.
//!
//! A dump is a sequence of records. Each record is a block of `Key: value`
//! header lines terminated by an empty line, optionally followed by exactly
//! `Content-length` bytes of body (a property block, then text). Empty lines
//! between records are separators.
//!
//! ```text
//! Revision-number: 1
//! Prop-content-length: 56
//! Content-length: 56
//!
//! K 7
//! svn:log
//! ...
//! PROPS-END
//!
//! Node-path: trunk/a.txt
//! Node-kind: file
//! Node-action: add
//! Text-content-length: 4
//! Content-length: 4
//!
//! abc
//! ```
//!
//! # Sub-modules
//!
//! - [`scanner`]: line/record reader that skips or copies bodies by their
//!   declared length. ([`DumpReader`])
//! - [`props`]: property block codec. ([`PropBlock`])

use std::io::{self, Write};

pub mod props;
pub mod scanner;

pub use props::{PropBlock, PropEntry, PropsError};
pub use scanner::{DumpReader, Item};

use crate::error::ErrorCode;

// ---------------------------------------------------------------------------
// Header names
// ---------------------------------------------------------------------------

pub const REVISION_NUMBER: &str = "Revision-number";
pub const NODE_PATH: &str = "Node-path";
pub const NODE_KIND: &str = "Node-kind";
pub const NODE_ACTION: &str = "Node-action";
pub const NODE_COPYFROM_REV: &str = "Node-copyfrom-rev";
pub const NODE_COPYFROM_PATH: &str = "Node-copyfrom-path";
pub const PROP_CONTENT_LENGTH: &str = "Prop-content-length";
pub const TEXT_CONTENT_LENGTH: &str = "Text-content-length";
pub const CONTENT_LENGTH: &str = "Content-length";
pub const TEXT_DELTA: &str = "Text-delta";
pub const TEXT_CONTENT_MD5: &str = "Text-content-md5";
pub const TEXT_CONTENT_SHA1: &str = "Text-content-sha1";
pub const TEXT_DELTA_BASE_MD5: &str = "Text-delta-base-md5";
pub const TEXT_DELTA_BASE_SHA1: &str = "Text-delta-base-sha1";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors raised while reading the dump structure.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("read failed: {0}")]
    Io(#[from] io::Error),

    #[error("line {line}: header is not `Key: value`: '{text}'")]
    MalformedHeader { line: u64, text: String },

    #[error("line {line}: header is not valid UTF-8")]
    InvalidUtf8 { line: u64 },

    #[error("line {line}: {key} is not a number: '{value}'")]
    InvalidNumber { line: u64, key: String, value: String },

    #[error("line {line}: unknown node action '{action}'")]
    UnknownAction { line: u64, action: String },

    #[error("line {line}: node record has no {key} header")]
    MissingHeader { line: u64, key: &'static str },

    #[error("line {line}: node record appears before any revision")]
    NodeOutsideRevision { line: u64 },

    #[error("line {line}: revision {found} does not follow revision {previous}")]
    RevisionOrder { line: u64, previous: u32, found: u32 },

    #[error("declared length of {expected} bytes exceeds the stream; only {found} remain")]
    Truncated { expected: u64, found: u64 },

    #[error("body of {requested} bytes requested but only {pending} are pending")]
    BodyOverrun { requested: u64, pending: u64 },

    #[error("malformed property block: {0}")]
    Props(#[from] PropsError),
}

impl ScanError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Io(_) => ErrorCode::InputOpenFailed,
            Self::Truncated { .. } => ErrorCode::InputTruncated,
            Self::BodyOverrun { .. } => ErrorCode::InternalUnexpected,
            Self::MalformedHeader { .. }
            | Self::InvalidUtf8 { .. }
            | Self::InvalidNumber { .. }
            | Self::UnknownAction { .. }
            | Self::MissingHeader { .. }
            | Self::NodeOutsideRevision { .. }
            | Self::RevisionOrder { .. }
            | Self::Props(_) => ErrorCode::InputMalformed,
        }
    }
}

// ---------------------------------------------------------------------------
// RecordHeader
// ---------------------------------------------------------------------------

/// What a record introduces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    /// Format version, UUID and anything else outside revisions.
    Preamble,
    Revision,
    Node,
}

/// The header block of one record, in input order.
///
/// Lines are kept as `(key, value)` pairs so the block can be written back
/// byte-for-byte with individual values replaced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordHeader {
    /// Line number of the first header line (1-based).
    pub line: u64,
    lines: Vec<HeaderLine>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct HeaderLine {
    key: String,
    value: String,
    /// `Key:` with nothing after the colon.
    bare: bool,
}

impl RecordHeader {
    #[must_use]
    pub const fn new(line: u64) -> Self {
        Self {
            line,
            lines: Vec::new(),
        }
    }

    /// Parse one raw header line and append it.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::InvalidUtf8`] or [`ScanError::MalformedHeader`].
    pub fn push_raw(&mut self, raw: &[u8], line: u64) -> Result<(), ScanError> {
        let text = std::str::from_utf8(raw).map_err(|_| ScanError::InvalidUtf8 { line })?;
        if let Some((key, value)) = text.split_once(": ") {
            self.push(key, value);
            return Ok(());
        }
        let key = text
            .strip_suffix(':')
            .filter(|key| !key.contains(':'))
            .ok_or_else(|| ScanError::MalformedHeader {
                line,
                text: text.to_string(),
            })?;
        self.lines.push(HeaderLine {
            key: key.to_string(),
            value: String::new(),
            bare: true,
        });
        Ok(())
    }

    pub fn push(&mut self, key: &str, value: &str) {
        self.lines.push(HeaderLine {
            key: key.to_string(),
            value: value.to_string(),
            bare: false,
        });
    }

    #[must_use]
    pub fn kind(&self) -> RecordKind {
        if self.get(REVISION_NUMBER).is_some() {
            RecordKind::Revision
        } else if self.get(NODE_PATH).is_some() {
            RecordKind::Node
        } else {
            RecordKind::Preamble
        }
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.lines
            .iter()
            .find(|l| l.key == key)
            .map(|l| l.value.as_str())
    }

    /// Replace the value of an existing header. Returns `false` if absent.
    pub fn set(&mut self, key: &str, value: impl Into<String>) -> bool {
        match self.lines.iter_mut().find(|l| l.key == key) {
            Some(l) => {
                l.value = value.into();
                l.bare = false;
                true
            }
            None => false,
        }
    }

    /// Replace the value of a header, inserting it before `Content-length`
    /// (or at the end) when absent.
    pub fn upsert(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        if self.set(key, value.clone()) {
            return;
        }
        let at = self
            .lines
            .iter()
            .position(|l| l.key == CONTENT_LENGTH)
            .unwrap_or(self.lines.len());
        self.lines.insert(
            at,
            HeaderLine {
                key: key.to_string(),
                value,
                bare: false,
            },
        );
    }

    pub fn remove(&mut self, key: &str) {
        self.lines.retain(|l| l.key != key);
    }

    /// Parse a numeric header.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::InvalidNumber`] if present but not a number.
    pub fn number<T: std::str::FromStr>(&self, key: &str) -> Result<Option<T>, ScanError> {
        self.get(key)
            .map(|value| {
                value.trim().parse::<T>().map_err(|_| ScanError::InvalidNumber {
                    line: self.line,
                    key: key.to_string(),
                    value: value.to_string(),
                })
            })
            .transpose()
    }

    /// Byte length of the property part of the body.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::InvalidNumber`] for a malformed length header.
    pub fn prop_length(&self) -> Result<u64, ScanError> {
        Ok(self.number(PROP_CONTENT_LENGTH)?.unwrap_or(0))
    }

    /// Byte length of the text part of the body.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::InvalidNumber`] for a malformed length header.
    pub fn text_length(&self) -> Result<u64, ScanError> {
        Ok(self.number(TEXT_CONTENT_LENGTH)?.unwrap_or(0))
    }

    /// Total body length: `Content-length`, or the sum of the parts when a
    /// producer omitted it.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::InvalidNumber`] for a malformed length header.
    pub fn content_length(&self) -> Result<u64, ScanError> {
        match self.number(CONTENT_LENGTH)? {
            Some(len) => Ok(len),
            None => Ok(self.prop_length()? + self.text_length()?),
        }
    }

    /// Write the header lines and the terminating empty line.
    ///
    /// # Errors
    ///
    /// Propagates write failures.
    pub fn write_to<W: Write + ?Sized>(&self, out: &mut W) -> io::Result<()> {
        for line in &self.lines {
            if line.bare {
                writeln!(out, "{}:", line.key)?;
            } else {
                writeln!(out, "{}: {}", line.key, line.value)?;
            }
        }
        out.write_all(b"\n")
    }
}
