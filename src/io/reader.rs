use std::io::{ErrorKind, Read, Seek, SeekFrom};

use super::BUF_SIZE;
use crate::error::Result;

/// Buffered reader with absolute-position tracking.
///
/// The buffer window starts at file offset `bufpos`; `start..end` is the
/// unconsumed portion. [`peek`](ByteReader::peek) and
/// [`consume`](ByteReader::consume) are the primitives the tokenizer
/// drives; [`get_line`](ByteReader::get_line) serves the xref loader.
pub struct ByteReader<R> {
    inner: R,
    buf: Vec<u8>,
    bufpos: u64,
    start: usize,
    end: usize,
}

impl<R: Read + Seek> ByteReader<R> {
    pub fn new(inner: R) -> Self {
        ByteReader {
            inner,
            buf: vec![0; BUF_SIZE],
            bufpos: 0,
            start: 0,
            end: 0,
        }
    }

    /// Logical read position: buffer base plus cursor.
    pub fn tell(&self) -> u64 {
        self.bufpos + self.start as u64
    }

    /// Total length of the underlying source. Restores the read position.
    pub fn len(&mut self) -> Result<u64> {
        // The raw stream sits at the end of the buffer window; put it back
        // there so the buffered bytes stay valid.
        let resume = self.bufpos + self.end as u64;
        let end = self.inner.seek(SeekFrom::End(0))?;
        self.inner.seek(SeekFrom::Start(resume))?;
        Ok(end)
    }

    fn read_inner(&mut self, out: &mut [u8]) -> Result<usize> {
        loop {
            match self.inner.read(out) {
                Ok(n) => return Ok(n),
                Err(e) if matches!(e.kind(), ErrorKind::Interrupted | ErrorKind::WouldBlock) => {
                    continue;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Refill the buffer after the cursor reaches `end`.
    fn fill(&mut self) -> Result<usize> {
        debug_assert!(self.start >= self.end);
        self.bufpos += self.end as u64;
        self.start = 0;
        self.end = 0;
        let mut buf = std::mem::take(&mut self.buf);
        let n = self.read_inner(&mut buf);
        self.buf = buf;
        self.end = n?;
        Ok(self.end)
    }

    /// Copy up to `out.len()` bytes, refilling as needed. Returns the
    /// number of bytes copied; less than requested only at end of file.
    pub fn read(&mut self, out: &mut [u8]) -> Result<usize> {
        let mut copied = 0;
        while copied < out.len() {
            if self.start < self.end {
                let n = (out.len() - copied).min(self.end - self.start);
                out[copied..copied + n].copy_from_slice(&self.buf[self.start..self.start + n]);
                self.start += n;
                copied += n;
            } else if out.len() - copied > BUF_SIZE / 2 {
                // Large remainder: bypass the buffer entirely.
                self.bufpos += self.end as u64;
                self.start = 0;
                self.end = 0;
                let n = self.read_inner(&mut out[copied..])?;
                self.bufpos += n as u64;
                if n == 0 {
                    break;
                }
                copied += n;
            } else if self.fill()? == 0 {
                break;
            }
        }
        Ok(copied)
    }

    /// Return up to `n` bytes without advancing. Shorter than `n` only
    /// at end of file. `n` must not exceed the buffer size.
    pub fn peek(&mut self, n: usize) -> Result<&[u8]> {
        debug_assert!(n <= BUF_SIZE);
        if self.end - self.start < n {
            // Shift the unconsumed tail to the front and top up.
            self.buf.copy_within(self.start..self.end, 0);
            self.bufpos += self.start as u64;
            self.end -= self.start;
            self.start = 0;
            while self.end < n {
                let m = {
                    let mut buf = std::mem::take(&mut self.buf);
                    let r = self.read_inner(&mut buf[self.end..]);
                    self.buf = buf;
                    r?
                };
                if m == 0 {
                    break;
                }
                self.end += m;
            }
        }
        Ok(&self.buf[self.start..self.end.min(self.start + n)])
    }

    /// Advance the cursor by `n` bytes. Seeks past the buffer if `n`
    /// exceeds what is currently held.
    pub fn consume(&mut self, n: usize) -> Result<()> {
        let buffered = self.end - self.start;
        if n <= buffered {
            self.start += n;
        } else {
            let target = self.tell() + n as u64;
            self.seek(SeekFrom::Start(target))?;
        }
        Ok(())
    }

    /// Read a single byte, or `None` at end of file.
    pub fn get_char(&mut self) -> Result<Option<u8>> {
        if self.start >= self.end && self.fill()? == 0 {
            return Ok(None);
        }
        let b = self.buf[self.start];
        self.start += 1;
        Ok(Some(b))
    }

    /// Read up to CR, LF, or CR+LF (one terminator); the terminator is
    /// consumed but not returned. Stops after `max` bytes of content.
    pub fn get_line(&mut self, max: usize) -> Result<Vec<u8>> {
        let mut line = Vec::new();
        while line.len() < max {
            match self.get_char()? {
                None => break,
                Some(b'\n') => break,
                Some(b'\r') => {
                    if self.peek(1)? == b"\n" {
                        self.consume(1)?;
                    }
                    break;
                }
                Some(b) => line.push(b),
            }
        }
        Ok(line)
    }

    /// Reposition. Invalidates the buffer; `Current` is translated to an
    /// absolute offset against the logical position first.
    pub fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        let pos = match pos {
            SeekFrom::Current(delta) => {
                let base = self.tell() as i64;
                SeekFrom::Start((base + delta).max(0) as u64)
            }
            other => other,
        };
        let new = self.inner.seek(pos)?;
        self.bufpos = new;
        self.start = 0;
        self.end = 0;
        Ok(new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn reader(bytes: &[u8]) -> ByteReader<Cursor<Vec<u8>>> {
        ByteReader::new(Cursor::new(bytes.to_vec()))
    }

    #[test]
    fn peek_does_not_advance() {
        let mut r = reader(b"hello world");
        assert_eq!(r.peek(5).unwrap(), b"hello");
        assert_eq!(r.tell(), 0);
        r.consume(6).unwrap();
        assert_eq!(r.peek(5).unwrap(), b"world");
        assert_eq!(r.tell(), 6);
    }

    #[test]
    fn peek_past_eof_is_short() {
        let mut r = reader(b"ab");
        assert_eq!(r.peek(8).unwrap(), b"ab");
    }

    #[test]
    fn get_line_handles_all_terminators() {
        let mut r = reader(b"one\ntwo\rthree\r\nfour");
        assert_eq!(r.get_line(256).unwrap(), b"one");
        assert_eq!(r.get_line(256).unwrap(), b"two");
        assert_eq!(r.get_line(256).unwrap(), b"three");
        assert_eq!(r.get_line(256).unwrap(), b"four");
        assert_eq!(r.get_line(256).unwrap(), b"");
    }

    #[test]
    fn seek_current_uses_logical_position() {
        let mut r = reader(b"0123456789");
        r.peek(10).unwrap();
        r.consume(2).unwrap();
        r.seek(SeekFrom::Current(3)).unwrap();
        assert_eq!(r.tell(), 5);
        assert_eq!(r.get_char().unwrap(), Some(b'5'));
    }

    #[test]
    fn large_read_bypasses_buffer() {
        let data: Vec<u8> = (0..100_000u32).map(|i| (i % 251) as u8).collect();
        let mut r = reader(&data);
        let mut out = vec![0; data.len()];
        assert_eq!(r.read(&mut out).unwrap(), data.len());
        assert_eq!(out, data);
        assert_eq!(r.tell(), data.len() as u64);
    }

    #[test]
    fn consume_past_buffer_seeks() {
        let data = vec![7u8; 80_000];
        let mut r = reader(&data);
        r.peek(4).unwrap();
        r.consume(70_000).unwrap();
        assert_eq!(r.tell(), 70_000);
    }
}
