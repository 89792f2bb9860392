//! Property block codec.
//!
//! ```text
//! K 13
//! svn:mergeinfo
//! V 12
//! /trunk:1-4,7
//! PROPS-END
//! ```
//!
//! `D <len>` entries (property deletions) appear when the node carries
//! `Prop-delta: true`. Keys and values are length-prefixed and may contain
//! arbitrary bytes, including newlines.

/// Terminator line of every property block.
pub const PROPS_END: &[u8] = b"PROPS-END\n";

/// Errors from parsing a property block.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PropsError {
    #[error("unexpected end of property block at byte {offset}")]
    UnexpectedEnd { offset: usize },

    #[error("expected `{expected} <len>` at byte {offset}")]
    ExpectedLength { expected: char, offset: usize },

    #[error("missing newline after {what} at byte {offset}")]
    MissingNewline { what: &'static str, offset: usize },

    #[error("{trailing} bytes after PROPS-END")]
    TrailingBytes { trailing: usize },
}

/// One entry of a property block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropEntry {
    Set { key: Vec<u8>, value: Vec<u8> },
    Delete { key: Vec<u8> },
}

impl PropEntry {
    #[must_use]
    pub fn key(&self) -> &[u8] {
        match self {
            Self::Set { key, .. } | Self::Delete { key } => key,
        }
    }
}

/// A parsed property block, entries in input order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PropBlock {
    pub entries: Vec<PropEntry>,
}

impl PropBlock {
    /// Parse a complete property block (including `PROPS-END`).
    ///
    /// # Errors
    ///
    /// Returns [`PropsError`] if the block is not well-formed.
    pub fn parse(bytes: &[u8]) -> Result<Self, PropsError> {
        let mut cursor = Cursor { bytes, pos: 0 };
        let mut entries = Vec::new();

        loop {
            if cursor.rest().starts_with(PROPS_END) {
                cursor.pos += PROPS_END.len();
                break;
            }
            // A block truncated right before the newline of PROPS-END.
            if cursor.rest() == &PROPS_END[..PROPS_END.len() - 1] {
                cursor.pos = bytes.len();
                break;
            }
            match cursor.peek() {
                Some(b'K') => {
                    let key = cursor.sized(b'K', "key")?;
                    let value = cursor.sized(b'V', "value")?;
                    entries.push(PropEntry::Set { key, value });
                }
                Some(b'D') => {
                    let key = cursor.sized(b'D', "key")?;
                    entries.push(PropEntry::Delete { key });
                }
                Some(_) => {
                    return Err(PropsError::ExpectedLength {
                        expected: 'K',
                        offset: cursor.pos,
                    });
                }
                None => return Err(PropsError::UnexpectedEnd { offset: cursor.pos }),
            }
        }

        let trailing = bytes.len() - cursor.pos;
        if trailing > 0 {
            return Err(PropsError::TrailingBytes { trailing });
        }
        Ok(Self { entries })
    }

    /// Value of a set property, if present.
    #[must_use]
    pub fn get(&self, key: &[u8]) -> Option<&[u8]> {
        self.entries.iter().find_map(|entry| match entry {
            PropEntry::Set { key: k, value } if k == key => Some(value.as_slice()),
            _ => None,
        })
    }

    /// Replace the value of a set property. Returns `false` if absent.
    pub fn set(&mut self, key: &[u8], new_value: Vec<u8>) -> bool {
        let slot = self.entries.iter_mut().find_map(|entry| match entry {
            PropEntry::Set { key: k, value } if k == key => Some(value),
            _ => None,
        });
        match slot {
            Some(value) => {
                *value = new_value;
                true
            }
            None => false,
        }
    }

    /// Append a set property.
    pub fn push(&mut self, key: &[u8], value: &[u8]) {
        self.entries.push(PropEntry::Set {
            key: key.to_vec(),
            value: value.to_vec(),
        });
    }

    /// Encode the block, `PROPS-END` included.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encoded_len());
        for entry in &self.entries {
            match entry {
                PropEntry::Set { key, value } => {
                    push_sized(&mut out, b'K', key);
                    push_sized(&mut out, b'V', value);
                }
                PropEntry::Delete { key } => push_sized(&mut out, b'D', key),
            }
        }
        out.extend_from_slice(PROPS_END);
        out
    }

    /// Exact byte length of [`Self::encode`].
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        let sized = |len: usize| 2 + digits(len) + 1 + len + 1;
        self.entries
            .iter()
            .map(|entry| match entry {
                PropEntry::Set { key, value } => sized(key.len()) + sized(value.len()),
                PropEntry::Delete { key } => sized(key.len()),
            })
            .sum::<usize>()
            + PROPS_END.len()
    }
}

fn push_sized(out: &mut Vec<u8>, tag: u8, data: &[u8]) {
    out.push(tag);
    out.push(b' ');
    out.extend_from_slice(data.len().to_string().as_bytes());
    out.push(b'\n');
    out.extend_from_slice(data);
    out.push(b'\n');
}

const fn digits(mut n: usize) -> usize {
    let mut count = 1;
    while n >= 10 {
        n /= 10;
        count += 1;
    }
    count
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl Cursor<'_> {
    fn rest(&self) -> &[u8] {
        &self.bytes[self.pos..]
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    /// Read `<tag> <len>\n<len bytes>\n`.
    fn sized(&mut self, tag: u8, what: &'static str) -> Result<Vec<u8>, PropsError> {
        let expected = || PropsError::ExpectedLength {
            expected: char::from(tag),
            offset: self.pos,
        };
        let line_end = self
            .rest()
            .iter()
            .position(|&b| b == b'\n')
            .ok_or(PropsError::UnexpectedEnd { offset: self.pos })?;
        let line = &self.rest()[..line_end];
        let len = line
            .strip_prefix(&[tag, b' '][..])
            .and_then(|digits| std::str::from_utf8(digits).ok())
            .and_then(|digits| digits.parse::<usize>().ok())
            .ok_or_else(expected)?;

        let start = self.pos + line_end + 1;
        let end = start + len;
        if end >= self.bytes.len() {
            return Err(PropsError::UnexpectedEnd { offset: start });
        }
        if self.bytes[end] != b'\n' {
            return Err(PropsError::MissingNewline { what, offset: end });
        }
        self.pos = end + 1;
        Ok(self.bytes[start..end].to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &[u8] = b"K 7\nsvn:log\nV 11\nline1\nline2\nK 13\nsvn:mergeinfo\nV 10\n/trunk:1-3\nD 6\nsvn:ex\nPROPS-END\n";

    #[test]
    fn parse_reads_all_entry_kinds() {
        let block = PropBlock::parse(SAMPLE).expect("parse");
        assert_eq!(block.entries.len(), 3);
        assert_eq!(block.get(b"svn:log"), Some(&b"line1\nline2"[..]));
        assert_eq!(block.get(b"svn:mergeinfo"), Some(&b"/trunk:1-3"[..]));
        assert_eq!(block.entries[2], PropEntry::Delete { key: b"svn:ex".to_vec() });
    }

    #[test]
    fn encode_is_byte_exact() {
        let block = PropBlock::parse(SAMPLE).expect("parse");
        assert_eq!(block.encode(), SAMPLE);
        assert_eq!(block.encoded_len(), SAMPLE.len());
    }

    #[test]
    fn empty_block_is_just_props_end() {
        let block = PropBlock::parse(b"PROPS-END\n").expect("parse");
        assert!(block.entries.is_empty());
        assert_eq!(block.encoded_len(), 10);
    }

    #[test]
    fn set_changes_length_consistently() {
        let mut block = PropBlock::parse(SAMPLE).expect("parse");
        assert!(block.set(b"svn:mergeinfo", b"/branches/feature:1-10,12".to_vec()));
        let encoded = block.encode();
        assert_eq!(encoded.len(), block.encoded_len());
        assert_eq!(PropBlock::parse(&encoded).expect("reparse"), block);
        assert!(!block.set(b"missing", Vec::new()));
    }

    #[test]
    fn short_value_is_rejected() {
        let err = PropBlock::parse(b"K 7\nsvn:log\nV 50\nshort\nPROPS-END\n").expect_err("fail");
        assert!(matches!(err, PropsError::UnexpectedEnd { .. }));
    }

    #[test]
    fn garbage_is_rejected() {
        let err = PropBlock::parse(b"X 1\na\nPROPS-END\n").expect_err("fail");
        assert!(matches!(err, PropsError::ExpectedLength { expected: 'K', offset: 0 }));
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let err = PropBlock::parse(b"PROPS-END\nextra").expect_err("fail");
        assert_eq!(err, PropsError::TrailingBytes { trailing: 5 });
    }
}
