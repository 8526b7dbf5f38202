//! The document: owner of the object table, pools, pages, and the
//! underlying byte source.
//!
//! Objects load lazily on first access; object streams are decoded
//! eagerly during [`load`](Document::load). At most one stream writer
//! can be open at a time, which the borrow on [`StreamWriter`] enforces
//! statically.

mod import;
mod info;
mod load;
mod pages;
mod save;
mod stream;

pub use load::LoadOptions;
pub use stream::StreamWriter;

use std::io::{Read, Seek, SeekFrom};

use crate::crypto;
use crate::encryption::{EncryptionOptions, Permissions, SecurityHandler};
use crate::error::{ErrorSink, LenientSink, PdfError, Result};
use crate::filters::{self, DecodeParms, Filter};
use crate::io::ByteReader;
use crate::object::{Dictionary, ObjectId, StringPool, Value};
use crate::dict;
use crate::reader::parse_object_at;

/// US Letter in points, the out-of-the-box page size.
pub const DEFAULT_MEDIA_BOX: [f64; 4] = [0.0, 0.0, 612.0, 792.0];

static NULL_VALUE: Value = Value::Null;

/// Type-erased byte source a loaded document reads from.
pub(crate) trait SourceRead: Read + Seek {}
impl<T: Read + Seek> SourceRead for T {}

pub(crate) struct Source {
    inner: Box<dyn SourceRead>,
}

impl Source {
    pub fn new(inner: Box<dyn SourceRead>) -> Self {
        Source { inner }
    }
}

impl Read for Source {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.inner.read(buf)
    }
}

impl Seek for Source {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        self.inner.seek(pos)
    }
}

/// Where a slot's value currently is.
pub(crate) enum SlotValue {
    /// On disk at this offset, not parsed yet.
    Parked { offset: u64 },
    /// Listed as compressed inside this object stream; filled in while
    /// object streams are decoded at load time.
    InStream { container: u32 },
    Loaded(Value),
}

/// A slot's attached stream data.
pub(crate) enum StreamData {
    None,
    /// Raw (possibly encrypted) bytes start here; length comes from the
    /// dictionary.
    OnDisk { offset: u64 },
    /// Encoded but unencrypted bytes, built in memory.
    Memory(Vec<u8>),
}

pub(crate) struct Slot {
    pub id: ObjectId,
    pub value: SlotValue,
    pub stream: StreamData,
}

/// An open PDF document, readable, writable, or both.
///
/// ```
/// use pdfkern::{Document, Filter};
/// let mut doc = Document::with_version("2.0");
/// let page = doc.add_page().unwrap();
/// let mut content = doc.create_page_content(page, Filter::Flate).unwrap();
/// std::io::Write::write_all(&mut content, b"BT /F1 12 Tf 72 720 Td (hi) Tj ET\n").unwrap();
/// content.close().unwrap();
/// let mut bytes = Vec::new();
/// doc.save_to(&mut bytes).unwrap();
/// assert!(bytes.starts_with(b"%PDF-2.0\n"));
/// ```
pub struct Document {
    pub(crate) version: String,
    pub(crate) trailer: Dictionary,
    /// Sorted by object number; lookup is binary search.
    pub(crate) slots: Vec<Slot>,
    /// Leaf pages in document order.
    pub(crate) pages: Vec<ObjectId>,
    pub(crate) pool: StringPool,
    pub(crate) source: Option<ByteReader<Source>>,
    pub(crate) sink: Box<dyn ErrorSink>,
    /// Handler a loaded encrypted document was unlocked with.
    pub(crate) security: Option<SecurityHandler>,
    /// The object holding the Encrypt dictionary; exempt from string
    /// decryption.
    pub(crate) encrypt_ref: Option<ObjectId>,
    /// Encryption requested for the next save.
    pub(crate) encrypt_options: Option<EncryptionOptions>,
    /// Stable content-derived identity for the cross-document map.
    pub(crate) fingerprint: [u8; 32],
    /// Sorted map (source fingerprint, source number) -> local object.
    pub(crate) import_map: Vec<(([u8; 32], u32), ObjectId)>,
    pub(crate) default_media_box: [f64; 4],
    pub(crate) default_crop_box: Option<[f64; 4]>,
}

impl Default for Document {
    fn default() -> Self {
        Document::new()
    }
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("version", &self.version)
            .field("trailer", &self.trailer)
            .field("slot_count", &self.slots.len())
            .field("pages", &self.pages)
            .field("encrypt_ref", &self.encrypt_ref)
            .field("fingerprint", &self.fingerprint)
            .field("default_media_box", &self.default_media_box)
            .field("default_crop_box", &self.default_crop_box)
            .finish()
    }
}

impl Document {
    /// Fresh document, format version 1.7.
    pub fn new() -> Self {
        Document::with_version("1.7")
    }

    /// Fresh document with the given format version (for example
    /// `"1.4"` or `"2.0"`). The Pages root, Catalog, and Info objects
    /// are created up front.
    pub fn with_version(version: &str) -> Self {
        let mut fingerprint = [0u8; 32];
        crypto::random(&mut fingerprint);
        let mut doc = Document {
            version: version.to_string(),
            trailer: Dictionary::new(),
            slots: Vec::new(),
            pages: Vec::new(),
            pool: StringPool::new(),
            source: None,
            sink: Box::new(LenientSink),
            security: None,
            encrypt_ref: None,
            encrypt_options: None,
            fingerprint,
            import_map: Vec::new(),
            default_media_box: DEFAULT_MEDIA_BOX,
            default_crop_box: None,
        };
        let pages_id = doc.add_object(dict! {
            "Type" => Value::name("Pages"),
            "Kids" => Value::Array(Vec::new()),
            "Count" => 0i64,
        });
        let root_id = doc.add_object(dict! {
            "Type" => Value::name("Catalog"),
            "Pages" => pages_id,
        });
        let info_id = doc.add_object(dict! {
            "Producer" => Value::string(concat!("pdfkern ", env!("CARGO_PKG_VERSION"))),
            "CreationDate" => Value::Date(chrono::Utc::now()),
        });
        doc.trailer.set("Root", root_id);
        doc.trailer.set("Info", info_id);
        doc
    }

    /// Format version string, e.g. `"1.7"`.
    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn set_version(&mut self, version: &str) {
        self.version = version.to_string();
    }

    /// Default MediaBox for pages created from now on.
    pub fn set_media_box(&mut self, media_box: [f64; 4]) {
        self.default_media_box = media_box;
    }

    /// Default CropBox for pages created from now on.
    pub fn set_crop_box(&mut self, crop_box: [f64; 4]) {
        self.default_crop_box = Some(crop_box);
    }

    /// The trailer dictionary (`Size`, `Root`, `Info`, `ID`, ...).
    pub fn trailer(&self) -> &Dictionary {
        &self.trailer
    }

    /// Configure encryption for the next save.
    pub fn set_encryption(&mut self, options: EncryptionOptions) -> Result<()> {
        options.validate()?;
        self.encrypt_options = Some(options);
        Ok(())
    }

    /// Permissions of an unlocked encrypted document, or of the
    /// pending encryption settings.
    pub fn permissions(&self) -> Option<Permissions> {
        if let Some(handler) = &self.security {
            return Some(handler.permissions());
        }
        self.encrypt_options.as_ref().map(|o| o.permissions)
    }

    pub fn is_encrypted(&self) -> bool {
        self.security.is_some()
    }

    // ----- object table -------------------------------------------------

    pub fn object_count(&self) -> usize {
        self.slots.len()
    }

    /// Identities of every object, in number order.
    pub fn object_ids(&self) -> Vec<ObjectId> {
        self.slots.iter().map(|slot| slot.id).collect()
    }

    fn slot_index(&self, number: u32) -> Option<usize> {
        self.slots
            .binary_search_by_key(&number, |slot| slot.id.number)
            .ok()
    }

    fn next_number(&self) -> u32 {
        self.slots.last().map(|slot| slot.id.number + 1).unwrap_or(1)
    }

    /// Add a new object; numbers are handed out sequentially.
    pub fn add_object(&mut self, value: impl Into<Value>) -> ObjectId {
        let id = ObjectId::new(self.next_number(), 0);
        self.slots.push(Slot {
            id,
            value: SlotValue::Loaded(value.into()),
            stream: StreamData::None,
        });
        id
    }

    /// Replace the value of an existing object.
    pub fn set_object(&mut self, id: ObjectId, value: impl Into<Value>) -> Result<()> {
        let idx = self.slot_index(id.number).ok_or_else(|| {
            PdfError::Contract(format!("object {id} does not exist"))
        })?;
        self.slots[idx].value = SlotValue::Loaded(value.into());
        Ok(())
    }

    /// Look up an object by number, loading it from disk on first
    /// access. A number the document does not contain reads as null,
    /// matching how references to free objects behave.
    pub fn object(&mut self, number: u32) -> Result<&Value> {
        let Some(idx) = self.slot_index(number) else {
            return Ok(&NULL_VALUE);
        };
        self.ensure_loaded(idx)?;
        match &self.slots[idx].value {
            SlotValue::Loaded(value) => Ok(value),
            _ => unreachable!("ensure_loaded produced a loaded slot"),
        }
    }

    /// Mutable access to an object's value.
    pub fn object_mut(&mut self, number: u32) -> Result<&mut Value> {
        let idx = self.slot_index(number).ok_or_else(|| {
            PdfError::Contract(format!("object {number} does not exist"))
        })?;
        self.ensure_loaded(idx)?;
        match &mut self.slots[idx].value {
            SlotValue::Loaded(value) => Ok(value),
            _ => unreachable!("ensure_loaded produced a loaded slot"),
        }
    }

    /// Follow one level of indirection: references load their target,
    /// everything else clones through.
    pub fn resolve(&mut self, value: &Value) -> Result<Value> {
        match value {
            Value::Reference(id) => Ok(self.object(id.number)?.clone()),
            other => Ok(other.clone()),
        }
    }

    fn ensure_loaded(&mut self, idx: usize) -> Result<()> {
        let offset = match self.slots[idx].value {
            SlotValue::Loaded(_) => return Ok(()),
            SlotValue::Parked { offset } => offset,
            SlotValue::InStream { container } => {
                return Err(PdfError::Structure(format!(
                    "object {} missing from object stream {container}",
                    self.slots[idx].id
                )));
            }
        };
        let id = self.slots[idx].id;
        let reader = self.source.as_mut().ok_or_else(|| {
            PdfError::Contract(format!("object {id} has no backing file to load from"))
        })?;
        let parsed = parse_object_at(reader, offset, &mut self.pool, self.sink.as_mut())?;
        if parsed.id.number != id.number {
            return Err(PdfError::syntax(
                offset,
                format!("expected object {}, file has {}", id.number, parsed.id.number),
            ));
        }
        let mut value = parsed.value;
        if let Some(handler) = &self.security {
            if self.encrypt_ref != Some(id) {
                handler.decrypt_value(id, &mut value)?;
            }
        }
        self.slots[idx].value = SlotValue::Loaded(value);
        self.slots[idx].stream = match parsed.stream_offset {
            Some(offset) => StreamData::OnDisk { offset },
            None => StreamData::None,
        };
        Ok(())
    }

    // ----- stream access ------------------------------------------------

    /// True when the object carries a stream.
    pub fn has_stream(&mut self, number: u32) -> Result<bool> {
        let Some(idx) = self.slot_index(number) else {
            return Ok(false);
        };
        self.ensure_loaded(idx)?;
        Ok(!matches!(self.slots[idx].stream, StreamData::None))
    }

    /// Stream bytes after decryption but before filter decoding: what
    /// an identical filter pipeline would re-emit.
    pub fn raw_stream_data(&mut self, number: u32) -> Result<Vec<u8>> {
        let idx = self.slot_index(number).ok_or_else(|| {
            PdfError::Contract(format!("object {number} does not exist"))
        })?;
        self.ensure_loaded(idx)?;
        let id = self.slots[idx].id;
        match &self.slots[idx].stream {
            StreamData::None => Err(PdfError::Contract(format!(
                "object {number} has no stream"
            ))),
            StreamData::Memory(bytes) => Ok(bytes.clone()),
            StreamData::OnDisk { offset } => {
                let offset = *offset;
                let (length_value, exempt) = {
                    let dict = self.object(number)?.as_dict().ok_or_else(|| {
                        PdfError::Structure(format!("stream object {number} is not a dictionary"))
                    })?;
                    (
                        dict.get(b"Length").cloned(),
                        dict.is_type(b"Metadata"),
                    )
                };
                let length = match length_value {
                    Some(Value::Integer(n)) if n >= 0 => n as u64,
                    Some(Value::Reference(rid)) => {
                        match self.object(rid.number)?.as_i64() {
                            Some(n) if n >= 0 => n as u64,
                            _ => {
                                return Err(PdfError::Structure(format!(
                                    "stream object {number} has a bad indirect Length"
                                )));
                            }
                        }
                    }
                    _ => {
                        return Err(PdfError::Structure(format!(
                            "stream object {number} has no usable Length"
                        )));
                    }
                };
                let reader = self.source.as_mut().ok_or_else(|| {
                    PdfError::Contract(format!("object {number} has no backing file"))
                })?;
                reader.seek(SeekFrom::Start(offset))?;
                let mut raw = vec![0u8; length as usize];
                let got = reader.read(&mut raw)?;
                if got != raw.len() {
                    return Err(PdfError::syntax(
                        offset,
                        format!("stream of object {number} is truncated"),
                    ));
                }
                if let Some(handler) = &self.security {
                    let metadata_plain = exempt && !handler.encrypt_metadata();
                    if !metadata_plain {
                        raw = handler.decrypt_data(id, &raw)?;
                    }
                }
                Ok(raw)
            }
        }
    }

    /// Fully decoded stream contents.
    pub fn stream_data(&mut self, number: u32) -> Result<Vec<u8>> {
        let raw = self.raw_stream_data(number)?;
        let dict = self
            .object(number)?
            .as_dict()
            .cloned()
            .unwrap_or_default();
        filters::decode(&dict, &raw)
    }

    /// Attach encoded stream bytes built from `data` to an object whose
    /// value is a dictionary, updating `Length`, `Filter`, and
    /// `DecodeParms`.
    pub fn set_stream_data(
        &mut self,
        id: ObjectId,
        data: &[u8],
        filter: Filter,
        parms: Option<DecodeParms>,
    ) -> Result<()> {
        let encoded = filters::encode(filter, parms.as_ref(), data)?;
        let idx = self.slot_index(id.number).ok_or_else(|| {
            PdfError::Contract(format!("object {id} does not exist"))
        })?;
        self.ensure_loaded(idx)?;
        let SlotValue::Loaded(value) = &mut self.slots[idx].value else {
            unreachable!("ensure_loaded produced a loaded slot")
        };
        let dict = value.as_dict_mut().ok_or_else(|| {
            PdfError::Contract(format!("object {id} is not a dictionary"))
        })?;
        dict.set("Length", encoded.len() as i64);
        match filter.name() {
            Some(name) => dict.set("Filter", Value::name(name)),
            None => {
                dict.remove(b"Filter");
            }
        }
        match parms {
            Some(p) if p.predictor != 1 => {
                dict.set(
                    "DecodeParms",
                    dict! {
                        "Predictor" => p.predictor as i64,
                        "Colors" => p.colors as i64,
                        "BitsPerComponent" => p.bits_per_component as i64,
                        "Columns" => p.columns as i64,
                    },
                );
            }
            _ => {
                dict.remove(b"DecodeParms");
            }
        }
        self.slots[idx].stream = StreamData::Memory(encoded);
        Ok(())
    }

    /// Open a stream writer on an existing dictionary object. The
    /// exclusive borrow guarantees a single open stream per document.
    pub fn open_stream(&mut self, id: ObjectId, filter: Filter) -> Result<StreamWriter<'_>> {
        self.open_stream_with_parms(id, filter, None)
    }

    /// Open a stream writer that applies a predictor before Flate,
    /// for image-like data.
    pub fn open_stream_with_parms(
        &mut self,
        id: ObjectId,
        filter: Filter,
        parms: Option<DecodeParms>,
    ) -> Result<StreamWriter<'_>> {
        let idx = self.slot_index(id.number).ok_or_else(|| {
            PdfError::Contract(format!("object {id} does not exist"))
        })?;
        self.ensure_loaded(idx)?;
        let SlotValue::Loaded(value) = &self.slots[idx].value else {
            unreachable!("ensure_loaded produced a loaded slot")
        };
        if value.as_dict().is_none() {
            return Err(PdfError::Contract(format!(
                "object {id} is not a dictionary, cannot attach a stream"
            )));
        }
        Ok(StreamWriter::new(self, id, filter, parms))
    }
}
