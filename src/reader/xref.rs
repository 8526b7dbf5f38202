use std::collections::HashSet;
use std::io::{Read, Seek, SeekFrom};

use crate::error::{ErrorSink, PdfError, Result};
use crate::filters;
use crate::io::ByteReader;
use crate::object::{Dictionary, StringPool, Value};
use crate::syntax::{Lexer, Token, read_value};

use super::parse_object_at;

/// Where an object lives according to the cross-reference data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RawEntry {
    /// At a byte offset in the file.
    InUse { generation: u16, offset: u64 },
    /// Compressed inside the numbered object stream.
    InStream { container: u32 },
}

/// Merged view of a whole `Prev` chain. The first table seen wins both
/// for entries and for the trailer, so newer incremental updates shadow
/// older ones.
#[derive(Debug, Default)]
pub(crate) struct XrefMap {
    /// Sorted by object number.
    entries: Vec<(u32, RawEntry)>,
    pub trailer: Dictionary,
}

impl XrefMap {
    pub fn insert_first_seen(&mut self, number: u32, entry: RawEntry) {
        if let Err(idx) = self.entries.binary_search_by_key(&number, |(n, _)| *n) {
            self.entries.insert(idx, (number, entry));
        }
    }

    /// Unlike the chain loader, the repair scanner wants later finds to
    /// replace earlier ones.
    pub fn insert_overwrite(&mut self, number: u32, entry: RawEntry) {
        match self.entries.binary_search_by_key(&number, |(n, _)| *n) {
            Ok(idx) => self.entries[idx].1 = entry,
            Err(idx) => self.entries.insert(idx, (number, entry)),
        }
    }

    pub fn entries(&self) -> &[(u32, RawEntry)] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Load the cross-reference chain starting at `start`, following `Prev`
/// (and hybrid `XRefStm`) links until exhausted.
pub(crate) fn load_xref_chain<R: Read + Seek>(
    reader: &mut ByteReader<R>,
    start: u64,
    pool: &mut StringPool,
    sink: &mut dyn ErrorSink,
) -> Result<XrefMap> {
    let mut map = XrefMap::default();
    let mut visited: HashSet<u64> = HashSet::new();
    let mut queue: Vec<u64> = vec![start];

    while let Some(offset) = queue.pop() {
        if !visited.insert(offset) {
            return Err(PdfError::Structure(format!(
                "cross-reference chain loops back to offset {offset}"
            )));
        }
        let trailer = load_xref_section(reader, offset, &mut map, pool, sink)?;
        if map.trailer.is_empty() {
            map.trailer = trailer.clone();
        }
        if let Some(prev) = trailer.get_i64(b"Prev") {
            if prev as u64 == offset {
                return Err(PdfError::Structure(format!(
                    "cross-reference Prev points at itself (offset {offset})"
                )));
            }
            if prev >= 0 {
                queue.push(prev as u64);
            }
        }
        // Hybrid files park object-stream entries behind XRefStm; those
        // fill slots the classical section left free, so they must be
        // read before the older Prev table (the queue pops last-first).
        if let Some(stm) = trailer.get_i64(b"XRefStm") {
            if stm >= 0 {
                queue.push(stm as u64);
            }
        }
    }
    Ok(map)
}

/// Parse one table (classical or stream form) at `offset` and return
/// its trailer dictionary.
fn load_xref_section<R: Read + Seek>(
    reader: &mut ByteReader<R>,
    offset: u64,
    map: &mut XrefMap,
    pool: &mut StringPool,
    sink: &mut dyn ErrorSink,
) -> Result<Dictionary> {
    reader.seek(SeekFrom::Start(offset))?;
    if reader.peek(4)? == b"xref" {
        load_classical(reader, map, pool, sink)
    } else {
        load_stream_form(reader, offset, map, pool, sink)
    }
}

/// Classical table: `xref`, subsection headers `first count`, fixed
/// entries, then `trailer` and its dictionary.
fn load_classical<R: Read + Seek>(
    reader: &mut ByteReader<R>,
    map: &mut XrefMap,
    pool: &mut StringPool,
    sink: &mut dyn ErrorSink,
) -> Result<Dictionary> {
    let mut lexer = Lexer::new(reader);
    match lexer.expect_next()? {
        t if t.is_keyword(b"xref") => {}
        other => {
            return Err(PdfError::syntax(
                lexer.position(),
                format!("expected 'xref', found {other:?}"),
            ));
        }
    }
    loop {
        match lexer.expect_next()? {
            t if t.is_keyword(b"trailer") => break,
            Token::Integer(first) if first >= 0 => {
                let count = match lexer.expect_next()? {
                    Token::Integer(c) if c >= 0 => c,
                    other => {
                        return Err(PdfError::syntax(
                            lexer.position(),
                            format!("bad subsection count {other:?}"),
                        ));
                    }
                };
                for number in first..first + count {
                    let field_offset = match lexer.expect_next()? {
                        Token::Integer(o) if o >= 0 => o as u64,
                        other => {
                            return Err(PdfError::syntax(
                                lexer.position(),
                                format!("bad xref entry offset {other:?}"),
                            ));
                        }
                    };
                    let generation = match lexer.expect_next()? {
                        Token::Integer(g) if (0..=u16::MAX as i64).contains(&g) => g as u16,
                        other => {
                            return Err(PdfError::syntax(
                                lexer.position(),
                                format!("bad xref entry generation {other:?}"),
                            ));
                        }
                    };
                    match lexer.expect_next()? {
                        t if t.is_keyword(b"n") => {
                            if number > 0 {
                                map.insert_first_seen(
                                    number as u32,
                                    RawEntry::InUse {
                                        generation,
                                        offset: field_offset,
                                    },
                                );
                            }
                        }
                        t if t.is_keyword(b"f") => {}
                        other => {
                            return Err(PdfError::syntax(
                                lexer.position(),
                                format!("bad xref entry kind {other:?}"),
                            ));
                        }
                    }
                }
            }
            other => {
                return Err(PdfError::syntax(
                    lexer.position(),
                    format!("unexpected token in xref table: {other:?}"),
                ));
            }
        }
    }
    let trailer = read_value(&mut lexer, pool, sink)?;
    match trailer {
        Value::Dictionary(dict) => Ok(dict),
        other => Err(PdfError::syntax(
            lexer.position(),
            format!("trailer is a {}, not a dictionary", other.type_name()),
        )),
    }
}

/// Cross-reference stream: a `N G obj` stream object whose decoded data
/// is fixed-width records described by `W` and `Index`.
fn load_stream_form<R: Read + Seek>(
    reader: &mut ByteReader<R>,
    offset: u64,
    map: &mut XrefMap,
    pool: &mut StringPool,
    sink: &mut dyn ErrorSink,
) -> Result<Dictionary> {
    let parsed = parse_object_at(reader, offset, pool, sink)?;
    let dict = match parsed.value {
        Value::Dictionary(dict) => dict,
        other => {
            return Err(PdfError::syntax(
                offset,
                format!("cross-reference object is a {}", other.type_name()),
            ));
        }
    };
    let data_start = parsed.stream_offset.ok_or_else(|| {
        PdfError::syntax(offset, "cross-reference object has no stream")
    })?;
    // Length must be direct here; an indirect length would need the
    // very table being parsed.
    let length = dict
        .get_i64(b"Length")
        .filter(|l| *l >= 0)
        .ok_or_else(|| PdfError::syntax(offset, "cross-reference stream without direct Length"))?;

    reader.seek(SeekFrom::Start(data_start))?;
    let mut raw = vec![0u8; length as usize];
    let got = reader.read(&mut raw)?;
    if got != raw.len() {
        return Err(PdfError::syntax(offset, "cross-reference stream truncated"));
    }
    // Cross-reference streams are never encrypted.
    let data = filters::decode(&dict, &raw)?;

    let widths = dict
        .get_array(b"W")
        .ok_or_else(|| PdfError::syntax(offset, "cross-reference stream missing W"))?;
    if widths.len() != 3 {
        return Err(PdfError::syntax(offset, "W must hold three widths"));
    }
    let mut w = [0usize; 3];
    for (i, width) in widths.iter().enumerate() {
        w[i] = match width.as_i64() {
            Some(n) if (0..=8).contains(&n) => n as usize,
            _ => return Err(PdfError::syntax(offset, "bad field width in W")),
        };
    }
    let record_len: usize = w.iter().sum();
    if record_len == 0 {
        return Err(PdfError::syntax(offset, "W describes empty records"));
    }

    let size = dict.get_i64(b"Size").unwrap_or(0).max(0);
    let index: Vec<(i64, i64)> = match dict.get_array(b"Index") {
        Some(pairs) => {
            if pairs.len() % 2 != 0 {
                return Err(PdfError::syntax(offset, "Index length is odd"));
            }
            pairs
                .chunks(2)
                .map(|pair| {
                    match (pair[0].as_i64(), pair[1].as_i64()) {
                        (Some(first), Some(count)) if first >= 0 && count >= 0 => {
                            Ok((first, count))
                        }
                        _ => Err(PdfError::syntax(offset, "bad Index pair")),
                    }
                })
                .collect::<Result<_>>()?
        }
        None => vec![(0, size)],
    };

    let mut records = data.chunks_exact(record_len);
    for (first, count) in index {
        for number in first..first + count {
            let record = records.next().ok_or_else(|| {
                PdfError::syntax(offset, "cross-reference stream shorter than Index")
            })?;
            let mut fields = [0u64; 3];
            let mut at = 0;
            for (i, &width) in w.iter().enumerate() {
                for &byte in &record[at..at + width] {
                    fields[i] = fields[i] << 8 | byte as u64;
                }
                at += width;
            }
            // A zero-width type field defaults to type 1.
            let kind = if w[0] == 0 { 1 } else { fields[0] };
            match kind {
                0 => {}
                1 => {
                    if number > 0 {
                        map.insert_first_seen(
                            number as u32,
                            RawEntry::InUse {
                                generation: fields[2].min(u16::MAX as u64) as u16,
                                offset: fields[1],
                            },
                        );
                    }
                }
                2 => {
                    if number > 0 && fields[1] <= u32::MAX as u64 {
                        map.insert_first_seen(
                            number as u32,
                            RawEntry::InStream {
                                container: fields[1] as u32,
                            },
                        );
                    }
                }
                other => {
                    return Err(PdfError::syntax(
                        offset,
                        format!("unknown cross-reference entry type {other}"),
                    ));
                }
            }
        }
    }
    Ok(dict)
}
