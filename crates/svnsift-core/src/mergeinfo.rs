//! `svn:mergeinfo` values.
//!
//! One line per merge source, `/<path>:<ranges>`, ranges comma-separated.
//! A range is `N` or `N-M` (inclusive); a trailing `*` marks it
//! non-inheritable.
//!
//! ```text
//! /trunk:2-5,9
//! /branches/feature:12*
//! ```

use std::fmt::{self, Write as _};
use std::rc::Rc;

use crate::error::ErrorCode;
use crate::history::EventId;

/// Property key carrying merge history.
pub const MERGEINFO_PROPERTY: &[u8] = b"svn:mergeinfo";

/// Errors from parsing a merge-info value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MergeInfoError {
    #[error("merge-info is not valid UTF-8")]
    InvalidUtf8,

    #[error("merge-info line has no ':' separator: '{0}'")]
    MissingSeparator(String),

    #[error("merge-info range is not a revision range: '{0}'")]
    InvalidRange(String),
}

impl MergeInfoError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        ErrorCode::InputMalformed
    }
}

/// Inclusive revision range `from..=to`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeRange {
    pub from: u32,
    pub to: u32,
    pub inheritable: bool,
}

/// Ranges merged from one source path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeSource {
    /// Normalized source path, no leading slash.
    pub path: String,
    pub ranges: Vec<MergeRange>,
}

/// A parsed `svn:mergeinfo` value.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MergeInfo {
    pub sources: Vec<MergeSource>,
    trailing_newline: bool,
}

impl MergeInfo {
    /// Parse a property value.
    ///
    /// # Errors
    ///
    /// Returns [`MergeInfoError`] if a line or range is malformed.
    pub fn parse(value: &[u8]) -> Result<Self, MergeInfoError> {
        let text = std::str::from_utf8(value).map_err(|_| MergeInfoError::InvalidUtf8)?;
        let mut sources = Vec::new();
        for line in text.lines().filter(|line| !line.trim().is_empty()) {
            let (path, ranges) = line
                .rsplit_once(':')
                .ok_or_else(|| MergeInfoError::MissingSeparator(line.to_string()))?;
            let ranges = ranges
                .split(',')
                .map(parse_range)
                .collect::<Result<Vec<_>, _>>()?;
            sources.push(MergeSource {
                path: crate::history::path::normalize(path).to_string(),
                ranges,
            });
        }
        Ok(Self {
            sources,
            trailing_newline: text.ends_with('\n'),
        })
    }

    /// Every `(source, from, to)` triple.
    pub fn triples(&self) -> impl Iterator<Item = (&str, u32, u32)> {
        self.sources.iter().flat_map(|source| {
            source
                .ranges
                .iter()
                .map(|range| (source.path.as_str(), range.from, range.to))
        })
    }

    /// Rewrite revisions and source paths.
    ///
    /// `resolve` maps an input revision to the nearest surviving output
    /// revision at or before it. A range `[from, to]` becomes
    /// `[resolve(from - 1) + 1, resolve(to)]`, which is empty exactly when no
    /// surviving revision falls inside it. `reduce` maps a source path to its
    /// output path, `None` dropping the line. Empty ranges and lines with no
    /// ranges left are dropped.
    #[must_use]
    pub fn remap(
        &self,
        resolve: impl Fn(u32) -> u32,
        reduce: impl Fn(&str) -> Option<String>,
    ) -> Self {
        let sources = self
            .sources
            .iter()
            .filter_map(|source| {
                let path = reduce(&source.path)?;
                let ranges: Vec<MergeRange> = source
                    .ranges
                    .iter()
                    .filter_map(|range| {
                        let from = resolve(range.from.saturating_sub(1)) + 1;
                        let to = resolve(range.to);
                        (from <= to).then_some(MergeRange {
                            from,
                            to,
                            inheritable: range.inheritable,
                        })
                    })
                    .collect();
                (!ranges.is_empty()).then_some(MergeSource { path, ranges })
            })
            .collect();
        Self {
            sources,
            trailing_newline: self.trailing_newline,
        }
    }

    /// Serialize back to the property value format.
    #[must_use]
    pub fn render(&self) -> Vec<u8> {
        self.to_string().into_bytes()
    }
}

impl fmt::Display for MergeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, source) in self.sources.iter().enumerate() {
            if i > 0 {
                f.write_char('\n')?;
            }
            write!(f, "/{}:", source.path)?;
            for (j, range) in source.ranges.iter().enumerate() {
                if j > 0 {
                    f.write_char(',')?;
                }
                if range.from == range.to {
                    write!(f, "{}", range.from)?;
                } else {
                    write!(f, "{}-{}", range.from, range.to)?;
                }
                if !range.inheritable {
                    f.write_char('*')?;
                }
            }
        }
        if self.trailing_newline && !self.sources.is_empty() {
            f.write_char('\n')?;
        }
        Ok(())
    }
}

fn parse_range(text: &str) -> Result<MergeRange, MergeInfoError> {
    let invalid = || MergeInfoError::InvalidRange(text.to_string());
    let trimmed = text.trim();
    let (body, inheritable) = trimmed
        .strip_suffix('*')
        .map_or((trimmed, true), |body| (body, false));
    let (from, to) = body.split_once('-').unwrap_or((body, body));
    let from = from.trim().parse::<u32>().map_err(|_| invalid())?;
    let to = to.trim().parse::<u32>().map_err(|_| invalid())?;
    if from > to {
        return Err(invalid());
    }
    Ok(MergeRange {
        from,
        to,
        inheritable,
    })
}

/// Merge-info carried by one literal event, captured in the first pass.
#[derive(Debug, Clone)]
pub struct MergeRecord {
    pub event: EventId,
    pub revision: u32,
    /// Path of the node carrying the property: the merge destination.
    pub dest: Rc<str>,
    pub info: MergeInfo,
    /// Byte length of the value as read, used to check the second pass
    /// reads the same property.
    pub original_len: usize,
}
