//! Line and record reader over a dump stream.
//!
//! [`DumpReader`] never buffers more than one line plus the header block of
//! the current record. Bodies are skipped or copied by their declared length,
//! never by scanning for a terminator, so binary content is safe.
//!
//! After [`DumpReader::next_item`] returns a record, its body is *pending*.
//! The caller consumes it with [`DumpReader::skip_body`],
//! [`DumpReader::read_body`] or [`DumpReader::copy_body`]; whatever is left
//! unconsumed is skipped automatically before the next item is read.

use std::io::{self, BufRead, Read, Seek, SeekFrom, Write};

use super::{RecordHeader, ScanError};

/// One structural unit of the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Item {
    /// An empty separator line between records.
    Blank,
    /// A header block; its body (if any) is now pending.
    Record(RecordHeader),
}

/// Reader over a dump stream.
#[derive(Debug)]
pub struct DumpReader<R> {
    inner: R,
    line: Vec<u8>,
    line_no: u64,
    pending: u64,
}

impl<R: BufRead> DumpReader<R> {
    pub const fn new(inner: R) -> Self {
        Self {
            inner,
            line: Vec::new(),
            line_no: 0,
            pending: 0,
        }
    }

    /// Number of the last line returned by [`Self::next_line`] (1-based).
    #[must_use]
    pub const fn line_no(&self) -> u64 {
        self.line_no
    }

    /// Bytes of the current record body not yet consumed.
    #[must_use]
    pub const fn pending(&self) -> u64 {
        self.pending
    }

    /// Read the next line without its trailing newline.
    ///
    /// Returns `None` at end of stream. A final line without a newline is
    /// returned as-is.
    ///
    /// # Errors
    ///
    /// Propagates read failures.
    pub fn next_line(&mut self) -> Result<Option<&[u8]>, ScanError> {
        self.line.clear();
        let read = self.inner.read_until(b'\n', &mut self.line)?;
        if read == 0 {
            return Ok(None);
        }
        self.line_no += 1;
        if self.line.last() == Some(&b'\n') {
            self.line.pop();
        }
        Ok(Some(&self.line))
    }

    /// Skip exactly `n` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::Truncated`] if the stream ends first.
    pub fn skip(&mut self, n: u64) -> Result<(), ScanError> {
        let copied = io::copy(&mut (&mut self.inner).take(n), &mut io::sink())?;
        check_len(n, copied)
    }

    /// Read exactly `n` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::Truncated`] if the stream ends first.
    pub fn read_exact(&mut self, n: u64) -> Result<Vec<u8>, ScanError> {
        let mut buf = Vec::with_capacity(usize::try_from(n).unwrap_or(0).min(1 << 20));
        let copied = (&mut self.inner).take(n).read_to_end(&mut buf)?;
        check_len(n, copied as u64)?;
        Ok(buf)
    }

    /// Copy exactly `n` bytes to `out`.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::Truncated`] if the stream ends first, or an I/O
    /// error from either side.
    pub fn copy_to<W: Write + ?Sized>(&mut self, n: u64, out: &mut W) -> Result<(), ScanError> {
        let copied = io::copy(&mut (&mut self.inner).take(n), out)?;
        check_len(n, copied)
    }

    /// Read the next separator or record header.
    ///
    /// Any unconsumed body of the previous record is skipped first.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError`] for malformed headers or a truncated body.
    pub fn next_item(&mut self) -> Result<Option<Item>, ScanError> {
        self.skip_body()?;

        let start = match self.next_line()? {
            None => return Ok(None),
            Some(line) if line.is_empty() => return Ok(Some(Item::Blank)),
            Some(line) => line.to_vec(),
        };

        let mut header = RecordHeader::new(self.line_no);
        header.push_raw(&start, self.line_no)?;
        loop {
            let line_no = self.line_no + 1;
            match self.next_line()? {
                None => break,
                Some(line) if line.is_empty() => break,
                Some(line) => header.push_raw(line, line_no)?,
            }
        }

        self.pending = header.content_length()?;
        Ok(Some(Item::Record(header)))
    }

    /// Skip whatever is left of the current body.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::Truncated`] if the stream ends first.
    pub fn skip_body(&mut self) -> Result<(), ScanError> {
        let n = std::mem::take(&mut self.pending);
        if n > 0 {
            self.skip(n)?;
        }
        Ok(())
    }

    /// Read the next `n` bytes of the current body.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::BodyOverrun`] if fewer than `n` bytes are
    /// pending, or [`ScanError::Truncated`] if the stream ends first.
    pub fn read_body(&mut self, n: u64) -> Result<Vec<u8>, ScanError> {
        self.take_pending(n)?;
        self.read_exact(n)
    }

    /// Copy the next `n` bytes of the current body to `out`.
    ///
    /// # Errors
    ///
    /// Same as [`Self::read_body`], plus write failures.
    pub fn copy_body<W: Write + ?Sized>(&mut self, n: u64, out: &mut W) -> Result<(), ScanError> {
        self.take_pending(n)?;
        self.copy_to(n, out)
    }

    /// Copy the whole remaining body to `out`.
    ///
    /// # Errors
    ///
    /// Same as [`Self::copy_body`].
    pub fn copy_rest<W: Write + ?Sized>(&mut self, out: &mut W) -> Result<(), ScanError> {
        let n = self.pending;
        self.copy_body(n, out)
    }

    fn take_pending(&mut self, n: u64) -> Result<(), ScanError> {
        if n > self.pending {
            return Err(ScanError::BodyOverrun {
                requested: n,
                pending: self.pending,
            });
        }
        self.pending -= n;
        Ok(())
    }
}

impl<R: BufRead + Seek> DumpReader<R> {
    /// Rewind to the start of the stream for another pass.
    ///
    /// # Errors
    ///
    /// Propagates seek failures.
    pub fn seek_start(&mut self) -> Result<(), ScanError> {
        self.inner.seek(SeekFrom::Start(0))?;
        self.line.clear();
        self.line_no = 0;
        self.pending = 0;
        Ok(())
    }
}

fn check_len(expected: u64, found: u64) -> Result<(), ScanError> {
    if found < expected {
        return Err(ScanError::Truncated { expected, found });
    }
    Ok(())
}
