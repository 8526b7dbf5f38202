use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Cursor, Read, Seek};
use std::path::Path;

use crate::crypto::Sha256Builder;
use crate::encryption::{PasswordList, PasswordProvider, SecurityHandler};
use crate::error::{ErrorAction, ErrorSink, LenientSink, PdfError, Result, Severity};
use crate::io::ByteReader;
use crate::object::{Dictionary, ObjectId, StringPool, Value};
use crate::reader::{
    RawEntry, find_startxref, load_xref_chain, parse_object_stream, read_header,
    scan_for_objects,
};

use super::{Document, Slot, SlotValue, Source, StreamData};

/// Builder-style options for opening an existing document.
///
/// ```no_run
/// use pdfkern::{Document, LoadOptions};
/// let doc = LoadOptions::new()
///     .password("user")
///     .load("statement.pdf")
///     .unwrap();
/// assert!(doc.page_count() > 0);
/// ```
pub struct LoadOptions {
    sink: Box<dyn ErrorSink>,
    passwords: Vec<Vec<u8>>,
    provider: Option<Box<dyn PasswordProvider>>,
}

impl Default for LoadOptions {
    fn default() -> Self {
        LoadOptions::new()
    }
}

impl LoadOptions {
    pub fn new() -> Self {
        LoadOptions {
            sink: Box::new(LenientSink),
            passwords: Vec::new(),
            provider: None,
        }
    }

    /// Install the error sink consulted for every warning and error.
    pub fn error_sink(mut self, sink: impl ErrorSink + 'static) -> Self {
        self.sink = Box::new(sink);
        self
    }

    /// Add a password candidate for encrypted documents. May be called
    /// several times; candidates are tried in order.
    pub fn password(mut self, password: impl AsRef<[u8]>) -> Self {
        self.passwords.push(password.as_ref().to_vec());
        self
    }

    /// Install a callback that produces password candidates on demand,
    /// replacing any fixed candidates.
    pub fn password_provider(mut self, provider: impl PasswordProvider + 'static) -> Self {
        self.provider = Some(Box::new(provider));
        self
    }

    pub fn load(self, path: impl AsRef<Path>) -> Result<Document> {
        let file = File::open(path)?;
        self.load_from(file)
    }

    pub fn load_from(self, source: impl Read + Seek + 'static) -> Result<Document> {
        load_document(self, Source::new(Box::new(source)))
    }
}

impl Document {
    /// Open a document from a file path with default options.
    pub fn load(path: impl AsRef<Path>) -> Result<Document> {
        LoadOptions::new().load(path)
    }

    /// Open a document held entirely in memory.
    pub fn load_mem(bytes: Vec<u8>) -> Result<Document> {
        LoadOptions::new().load_from(Cursor::new(bytes))
    }

    /// Open a document from any seekable byte source.
    pub fn load_from(source: impl Read + Seek + 'static) -> Result<Document> {
        LoadOptions::new().load_from(source)
    }
}

fn load_document(options: LoadOptions, source: Source) -> Result<Document> {
    let LoadOptions {
        mut sink,
        passwords,
        provider,
    } = options;

    let mut reader = ByteReader::new(source);
    let version = read_header(&mut reader)?;
    let mut pool = StringPool::new();

    let chain = find_startxref(&mut reader)
        .and_then(|start| load_xref_chain(&mut reader, start, &mut pool, sink.as_mut()))
        .and_then(|map| {
            if map.trailer.get(b"Root").is_none() {
                Err(PdfError::Structure("trailer has no Root".into()))
            } else {
                Ok(map)
            }
        });
    let map = match chain {
        Ok(map) => map,
        // I/O failures and explicit aborts are not repairable.
        Err(err @ (PdfError::Io(_) | PdfError::Aborted)) => return Err(err),
        Err(err) => {
            let message =
                format!("WARNING: cannot read cross-reference ({err}); scanning file for objects");
            if sink.on_error(&message, Severity::Warning) != ErrorAction::Continue {
                return Err(err);
            }
            scan_for_objects(&mut reader, &mut pool, sink.as_mut())?
        }
    };

    let fingerprint = fingerprint(&version, &map.trailer, reader.len()?);

    let mut slots = Vec::with_capacity(map.entries().len());
    let mut compressed: Vec<(u32, u32)> = Vec::new();
    for (number, entry) in map.entries() {
        match entry {
            RawEntry::InUse { generation, offset } => slots.push(Slot {
                id: ObjectId::new(*number, *generation),
                value: SlotValue::Parked { offset: *offset },
                stream: StreamData::None,
            }),
            RawEntry::InStream { container } => {
                compressed.push((*number, *container));
                slots.push(Slot {
                    id: ObjectId::new(*number, 0),
                    value: SlotValue::InStream {
                        container: *container,
                    },
                    stream: StreamData::None,
                });
            }
        }
    }

    let mut doc = Document {
        version,
        trailer: map.trailer,
        slots,
        pages: Vec::new(),
        pool,
        source: Some(reader),
        sink,
        security: None,
        encrypt_ref: None,
        encrypt_options: None,
        fingerprint,
        import_map: Vec::new(),
        default_media_box: super::DEFAULT_MEDIA_BOX,
        default_crop_box: None,
    };

    if let Some(encrypt_value) = doc.trailer.get(b"Encrypt").cloned() {
        let encrypt_dict = match encrypt_value {
            Value::Dictionary(dict) => dict,
            Value::Reference(rid) => {
                doc.encrypt_ref = Some(rid);
                doc.object(rid.number)?
                    .as_dict()
                    .cloned()
                    .ok_or_else(|| {
                        PdfError::Encryption("Encrypt entry is not a dictionary".into())
                    })?
            }
            other => {
                return Err(PdfError::Encryption(format!(
                    "Encrypt entry is a {}",
                    other.type_name()
                )));
            }
        };
        let file_id0: Vec<u8> = doc
            .trailer
            .get_array(b"ID")
            .and_then(|ids| ids.first())
            .and_then(Value::as_string_bytes)
            .map(<[u8]>::to_vec)
            .unwrap_or_default();
        let mut provider: Box<dyn PasswordProvider> = match provider {
            Some(custom) => custom,
            None if passwords.is_empty() => {
                // No credentials supplied: attempt the empty password,
                // which opens owner-password-only documents.
                Box::new(PasswordList(vec![Vec::new()]))
            }
            None => Box::new(PasswordList(passwords)),
        };
        doc.security = Some(SecurityHandler::unlock(
            &encrypt_dict,
            &file_id0,
            provider.as_mut(),
        )?);
    }

    doc.load_object_streams(&compressed)?;
    doc.collect_pages()?;
    Ok(doc)
}

impl Document {
    /// Eagerly decode every object stream the cross-reference named and
    /// park its objects in the table.
    fn load_object_streams(&mut self, compressed: &[(u32, u32)]) -> Result<()> {
        let mut groups: BTreeMap<u32, Vec<u32>> = BTreeMap::new();
        for (number, container) in compressed {
            groups.entry(*container).or_default().push(*number);
        }
        for (container, numbers) in groups {
            let dict = self
                .object(container)?
                .as_dict()
                .cloned()
                .ok_or_else(|| {
                    PdfError::Structure(format!(
                        "object stream {container} is not a dictionary"
                    ))
                })?;
            if !dict.is_type(b"ObjStm") {
                return Err(PdfError::Structure(format!(
                    "object {container} is referenced as an object stream but is {:?}",
                    dict.get_name(b"Type")
                )));
            }
            let decoded = self.stream_data(container)?;
            let objects =
                parse_object_stream(&dict, &decoded, &mut self.pool, self.sink.as_mut())?;
            log::debug!(
                "object stream {container}: {} objects decoded",
                objects.len()
            );
            for (number, value) in objects {
                if !numbers.contains(&number) {
                    continue;
                }
                if let Some(idx) = self.slot_index(number) {
                    if matches!(
                        self.slots[idx].value,
                        SlotValue::InStream { container: c } if c == container
                    ) {
                        self.slots[idx].value = SlotValue::Loaded(value);
                    }
                }
            }
        }
        Ok(())
    }
}

/// Stable 32-byte identity for the cross-document object map, derived
/// from what the file declares about itself rather than its raw bytes.
fn fingerprint(version: &str, trailer: &Dictionary, file_len: u64) -> [u8; 32] {
    let mut hash = Sha256Builder::new();
    hash.append(version.as_bytes());
    hash.append(&file_len.to_le_bytes());
    if let Some(ids) = trailer.get_array(b"ID") {
        for id in ids {
            if let Some(bytes) = id.as_string_bytes() {
                hash.append(bytes);
            }
        }
    }
    if let Some(size) = trailer.get_i64(b"Size") {
        hash.append(&size.to_le_bytes());
    }
    if let Some(root) = trailer.get_reference(b"Root") {
        hash.append(&root.number.to_le_bytes());
    }
    hash.finish()
}
