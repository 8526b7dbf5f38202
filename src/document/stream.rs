use std::io::Write;

use crate::error::Result;
use crate::filters::{DecodeParms, Filter};
use crate::object::ObjectId;

use super::Document;

/// Incremental writer for one stream object.
///
/// Bytes written here are collected, pushed through the predictor and
/// Flate pipeline on [`close`](StreamWriter::close), and attached to
/// the object together with its `Length`, `Filter`, and `DecodeParms`
/// entries. Dropping an unclosed writer finishes it best-effort; call
/// `close` to observe failures.
pub struct StreamWriter<'a> {
    doc: &'a mut Document,
    id: ObjectId,
    filter: Filter,
    parms: Option<DecodeParms>,
    buf: Vec<u8>,
    closed: bool,
}

impl<'a> StreamWriter<'a> {
    pub(crate) fn new(
        doc: &'a mut Document,
        id: ObjectId,
        filter: Filter,
        parms: Option<DecodeParms>,
    ) -> Self {
        StreamWriter {
            doc,
            id,
            filter,
            parms,
            buf: Vec::new(),
            closed: false,
        }
    }

    /// The object this stream belongs to.
    pub fn object_id(&self) -> ObjectId {
        self.id
    }

    /// Bytes accepted so far, before encoding.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    fn finish(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.doc
            .set_stream_data(self.id, &self.buf, self.filter, self.parms)
    }

    /// Encode and attach the collected bytes.
    pub fn close(mut self) -> Result<()> {
        self.finish()
    }
}

impl Write for StreamWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buf.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl Drop for StreamWriter<'_> {
    fn drop(&mut self) {
        let _ = self.finish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::Dictionary;

    #[test]
    fn close_attaches_encoded_stream() {
        let mut doc = Document::new();
        let id = doc.add_object(Dictionary::new());
        let mut writer = doc.open_stream(id, Filter::Flate).unwrap();
        writer.write_all(b"0 0 m 100 100 l S\n").unwrap();
        writer.write_all(b"Q\n").unwrap();
        writer.close().unwrap();
        assert_eq!(doc.stream_data(id.number).unwrap(), b"0 0 m 100 100 l S\nQ\n");
    }

    #[test]
    fn drop_finishes_the_stream() {
        let mut doc = Document::new();
        let id = doc.add_object(Dictionary::new());
        {
            let mut writer = doc.open_stream(id, Filter::None).unwrap();
            writer.write_all(b"abc").unwrap();
        }
        assert_eq!(doc.stream_data(id.number).unwrap(), b"abc");
    }
}
