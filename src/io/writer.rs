use std::io::Write;

use super::BUF_SIZE;
use crate::error::Result;

/// Buffered writer that tracks the logical output offset.
///
/// The save path records xref offsets from [`tell`](ByteWriter::tell),
/// so no seeking is ever required on the underlying sink; any
/// `std::io::Write` works, including a plain callback adapter.
pub struct ByteWriter<W> {
    inner: W,
    buf: Vec<u8>,
    flushed: u64,
}

impl<W: Write> ByteWriter<W> {
    pub fn new(inner: W) -> Self {
        ByteWriter {
            inner,
            buf: Vec::with_capacity(BUF_SIZE),
            flushed: 0,
        }
    }

    /// Logical offset: everything flushed plus everything buffered.
    pub fn tell(&self) -> u64 {
        self.flushed + self.buf.len() as u64
    }

    pub fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        if self.buf.len() + bytes.len() > BUF_SIZE {
            self.flush()?;
        }
        if bytes.len() > BUF_SIZE {
            self.inner.write_all(bytes)?;
            self.flushed += bytes.len() as u64;
        } else {
            self.buf.extend_from_slice(bytes);
        }
        Ok(())
    }

    /// Write and clear the write buffer.
    pub fn flush(&mut self) -> Result<()> {
        if !self.buf.is_empty() {
            self.inner.write_all(&self.buf)?;
            self.flushed += self.buf.len() as u64;
            self.buf.clear();
        }
        self.inner.flush()?;
        Ok(())
    }

    /// Flush and hand back the underlying sink.
    pub fn finish(mut self) -> Result<W> {
        self.flush()?;
        Ok(self.inner)
    }
}

impl<W: Write> Write for ByteWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        ByteWriter::write_all(self, buf).map_err(std::io::Error::other)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        ByteWriter::flush(self).map_err(std::io::Error::other)
    }
}
