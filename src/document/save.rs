use std::collections::HashSet;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::crypto::{md5, random};
use crate::encryption::SecurityHandler;
use crate::error::Result;
use crate::filters;
use crate::io::ByteWriter;
use crate::object::{ObjectId, Value};
use crate::syntax::write_value;

use super::{Document, SlotValue, StreamData};

/// Trailer keys that describe the previous file's cross-reference
/// machinery; a full rewrite regenerates all of them.
const STALE_TRAILER_KEYS: [&[u8]; 8] = [
    b"Prev",
    b"XRefStm",
    b"Type",
    b"W",
    b"Index",
    b"Filter",
    b"DecodeParms",
    b"Length",
];

impl Document {
    /// Write the document to a file.
    pub fn save(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let file = File::create(path)?;
        self.save_to(file)
    }

    /// Write the document to any byte sink.
    ///
    /// Objects are written in a fixed order (Info, Root, the Pages
    /// tree, page leaves, content streams, then everything else),
    /// followed by a classical xref table or, for format 1.5 and up, a
    /// cross-reference stream.
    pub fn save_to<W: Write>(&mut self, sink: W) -> Result<()> {
        let mut w = ByteWriter::new(sink);

        for key in STALE_TRAILER_KEYS {
            self.trailer.remove(key);
        }

        // The file ID is created on first save and never rewritten.
        let file_id0 = self.ensure_file_id();

        let security: Option<(SecurityHandler, ObjectId)> = match self.encrypt_options.clone() {
            Some(options) => {
                let (handler, dict) = SecurityHandler::create(&options, &file_id0)?;
                let id = self.add_object(dict);
                self.trailer.set("Encrypt", id);
                Some((handler, id))
            }
            None => {
                // A document opened encrypted writes back decrypted
                // unless encryption was requested again.
                self.trailer.remove(b"Encrypt");
                None
            }
        };

        w.write_all(format!("%PDF-{}\n", self.version).as_bytes())?;
        w.write_all(b"%\xE2\xE3\xCF\xD3\n")?;

        let mut offsets: Vec<(ObjectId, u64)> = Vec::new();
        for number in self.write_order()? {
            if let Some(entry) = self.write_object(&mut w, number, &security)? {
                offsets.push(entry);
            }
        }

        let startxref = if self.version_at_least(1, 5) {
            self.write_xref_stream(&mut w, &offsets)?
        } else {
            self.write_xref_table(&mut w, &offsets)?
        };
        w.write_all(format!("startxref\n{startxref}\n%%EOF\n").as_bytes())?;
        w.flush()?;
        Ok(())
    }

    fn version_at_least(&self, major: u32, minor: u32) -> bool {
        let mut parts = self.version.split('.');
        let file_major: u32 = parts.next().and_then(|p| p.parse().ok()).unwrap_or(1);
        let file_minor: u32 = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);
        (file_major, file_minor) >= (major, minor)
    }

    /// Info, Root, Pages root, page leaves, their content streams, then
    /// every remaining object by number.
    fn write_order(&mut self) -> Result<Vec<u32>> {
        fn push(number: u32, order: &mut Vec<u32>, seen: &mut HashSet<u32>) {
            if seen.insert(number) {
                order.push(number);
            }
        }
        let mut order: Vec<u32> = Vec::new();
        let mut seen: HashSet<u32> = HashSet::new();
        if let Some(info) = self.trailer.get_reference(b"Info") {
            push(info.number, &mut order, &mut seen);
        }
        if let Some(root) = self.trailer.get_reference(b"Root") {
            push(root.number, &mut order, &mut seen);
        }
        if let Ok(pages_root) = self.pages_root() {
            push(pages_root.number, &mut order, &mut seen);
        }
        for page in self.pages.clone() {
            push(page.number, &mut order, &mut seen);
        }
        for page in self.pages.clone() {
            let contents = self
                .object(page.number)?
                .as_dict()
                .and_then(|dict| dict.get(b"Contents"))
                .cloned();
            match contents {
                Some(Value::Reference(id)) => push(id.number, &mut order, &mut seen),
                Some(Value::Array(parts)) => {
                    for part in parts {
                        if let Value::Reference(id) = part {
                            push(id.number, &mut order, &mut seen);
                        }
                    }
                }
                _ => {}
            }
        }
        for id in self.object_ids() {
            push(id.number, &mut order, &mut seen);
        }
        Ok(order)
    }

    /// Write one object. Returns its identity and byte offset, or
    /// `None` for cross-reference machinery that is regenerated rather
    /// than copied (old xref streams and object-stream containers).
    fn write_object<W: Write>(
        &mut self,
        w: &mut ByteWriter<W>,
        number: u32,
        security: &Option<(SecurityHandler, ObjectId)>,
    ) -> Result<Option<(ObjectId, u64)>> {
        // Trailer or Contents references can dangle in repaired files;
        // a missing number simply is not written.
        let Some(idx) = self.slot_index(number) else {
            return Ok(None);
        };
        self.ensure_loaded(idx)?;
        let id = self.slots[idx].id;

        let (is_machinery, has_stream) = {
            let SlotValue::Loaded(value) = &self.slots[idx].value else {
                unreachable!("ensure_loaded produced a loaded slot")
            };
            let machinery = value
                .as_dict()
                .map(|dict| dict.is_type(b"XRef") || dict.is_type(b"ObjStm"))
                .unwrap_or(false);
            (machinery, !matches!(self.slots[idx].stream, StreamData::None))
        };
        if is_machinery {
            return Ok(None);
        }

        let mut stream = if has_stream {
            Some(self.raw_stream_data(number)?)
        } else {
            None
        };

        let SlotValue::Loaded(value) = &self.slots[idx].value else {
            unreachable!("ensure_loaded produced a loaded slot")
        };
        let mut value = value.clone();

        if let Some((handler, encrypt_id)) = security {
            let exempt = id == *encrypt_id || self.encrypt_ref == Some(id);
            if !exempt {
                if let Some(bytes) = stream.take() {
                    let metadata_plain = !handler.encrypt_metadata()
                        && value
                            .as_dict()
                            .map(|dict| dict.is_type(b"Metadata"))
                            .unwrap_or(false);
                    stream = Some(if metadata_plain {
                        bytes
                    } else {
                        handler.encrypt_data(id, &bytes)
                    });
                }
                value = handler.encrypt_value(id, &value);
            }
        }
        if let (Some(bytes), Some(dict)) = (&stream, value.as_dict_mut()) {
            dict.set("Length", bytes.len() as i64);
        }

        let offset = w.tell();
        w.write_all(format!("{} {} obj\n", id.number, id.generation).as_bytes())?;
        write_value(w, &value)?;
        match stream {
            Some(bytes) => {
                w.write_all(b"\nstream\n")?;
                w.write_all(&bytes)?;
                w.write_all(b"\nendstream\nendobj\n")?;
            }
            None => w.write_all(b"\nendobj\n")?,
        }
        Ok(Some((id, offset)))
    }

    fn write_xref_table<W: Write>(
        &mut self,
        w: &mut ByteWriter<W>,
        offsets: &[(ObjectId, u64)],
    ) -> Result<u64> {
        let start = w.tell();
        let size = offsets
            .iter()
            .map(|(id, _)| id.number)
            .max()
            .unwrap_or(0) as usize
            + 1;
        let mut table: Vec<Option<(u16, u64)>> = vec![None; size];
        for (id, offset) in offsets {
            table[id.number as usize] = Some((id.generation, *offset));
        }

        w.write_all(b"xref\n")?;
        w.write_all(format!("0 {size}\n").as_bytes())?;
        w.write_all(b"0000000000 65535 f\r\n")?;
        for entry in &table[1..] {
            match entry {
                Some((generation, offset)) => {
                    w.write_all(format!("{offset:010} {generation:05} n\r\n").as_bytes())?;
                }
                None => w.write_all(b"0000000000 65535 f\r\n")?,
            }
        }

        self.trailer.set("Size", size as i64);
        w.write_all(b"trailer\n")?;
        write_value(w, &Value::Dictionary(self.trailer.clone()))?;
        w.write_all(b"\n")?;
        Ok(start)
    }

    fn write_xref_stream<W: Write>(
        &mut self,
        w: &mut ByteWriter<W>,
        offsets: &[(ObjectId, u64)],
    ) -> Result<u64> {
        let start = w.tell();
        let xref_number = self.next_number();
        let size = xref_number as usize + 1;
        let mut table: Vec<Option<(u16, u64)>> = vec![None; size];
        for (id, offset) in offsets {
            table[id.number as usize] = Some((id.generation, *offset));
        }
        table[xref_number as usize] = Some((0, start));

        // W = [1 5 2]: type byte, 5-byte offset, 2-byte generation.
        let mut rows = Vec::with_capacity(size * 8);
        for entry in &table {
            match entry {
                Some((generation, offset)) => {
                    rows.push(1);
                    rows.extend_from_slice(&offset.to_be_bytes()[3..]);
                    rows.extend_from_slice(&generation.to_be_bytes());
                }
                None => {
                    rows.push(0);
                    rows.extend_from_slice(&[0; 5]);
                    rows.extend_from_slice(&u16::MAX.to_be_bytes());
                }
            }
        }
        let packed = filters::deflate(&rows);

        self.trailer.set("Size", size as i64);
        let mut dict = self.trailer.clone();
        dict.set("Type", Value::name("XRef"));
        dict.set("W", Value::Array(vec![1i64.into(), 5i64.into(), 2i64.into()]));
        dict.set("Filter", Value::name("FlateDecode"));
        dict.set("Length", packed.len() as i64);

        w.write_all(format!("{xref_number} 0 obj\n").as_bytes())?;
        write_value(w, &Value::Dictionary(dict))?;
        w.write_all(b"\nstream\n")?;
        w.write_all(&packed)?;
        w.write_all(b"\nendstream\nendobj\n")?;
        Ok(start)
    }

    /// The two-element ID array, created once with an MD5 of fresh
    /// randomness and never rewritten afterwards.
    fn ensure_file_id(&mut self) -> Vec<u8> {
        if let Some(ids) = self.trailer.get_array(b"ID") {
            if let Some(bytes) = ids.first().and_then(Value::as_string_bytes) {
                return bytes.to_vec();
            }
        }
        let mut seed = [0u8; 16];
        random(&mut seed);
        let digest = md5(&[&seed, self.version.as_bytes()]);
        let id = Value::binary(digest);
        self.trailer
            .set("ID", Value::Array(vec![id.clone(), id]));
        digest.to_vec()
    }
}
