//! File-structure reading: the header, the `startxref` tail, object
//! headers, and the cross-reference machinery in [`xref`], [`objstm`],
//! and [`repair`].

mod objstm;
mod repair;
mod xref;

pub(crate) use objstm::parse_object_stream;
pub(crate) use repair::scan_for_objects;
pub(crate) use xref::{RawEntry, XrefMap, load_xref_chain};

use std::io::{Read, Seek, SeekFrom};

use crate::error::{ErrorSink, PdfError, Result};
use crate::io::ByteReader;
use crate::object::{ObjectId, StringPool, Value};
use crate::syntax::{Lexer, Token, read_value};

/// How far from the end of the file `startxref` is searched for.
const TAIL_WINDOW: u64 = 1024;

/// Read the `%PDF-x.y` (or `%PCLm-x.y`) header line and return the
/// version string.
pub(crate) fn read_header<R: Read + Seek>(reader: &mut ByteReader<R>) -> Result<String> {
    reader.seek(SeekFrom::Start(0))?;
    let line = reader.get_line(64)?;
    let version = line
        .strip_prefix(b"%PDF-")
        .or_else(|| line.strip_prefix(b"%PCLm-"))
        .ok_or_else(|| PdfError::syntax(0, "missing %PDF header"))?;
    if version.is_empty() || !version[0].is_ascii_digit() {
        return Err(PdfError::syntax(0, "malformed version in header"));
    }
    Ok(String::from_utf8_lossy(version).into_owned())
}

/// Locate the offset named by the last `startxref` in the file tail.
pub(crate) fn find_startxref<R: Read + Seek>(reader: &mut ByteReader<R>) -> Result<u64> {
    let len = reader.len()?;
    let window = len.min(TAIL_WINDOW);
    reader.seek(SeekFrom::Start(len - window))?;
    let mut tail = vec![0u8; window as usize];
    let got = reader.read(&mut tail)?;
    tail.truncate(got);

    let at = tail
        .windows(b"startxref".len())
        .rposition(|w| w == b"startxref")
        .ok_or_else(|| PdfError::syntax(len, "no startxref in file tail"))?;
    let digits: Vec<u8> = tail[at + b"startxref".len()..]
        .iter()
        .copied()
        .skip_while(u8::is_ascii_whitespace)
        .take_while(u8::is_ascii_digit)
        .collect();
    if digits.is_empty() {
        return Err(PdfError::syntax(len, "startxref has no offset"));
    }
    let offset: u64 = std::str::from_utf8(&digits)
        .expect("digits are ASCII")
        .parse()
        .map_err(|_| PdfError::syntax(len, "startxref offset out of range"))?;
    if offset >= len {
        return Err(PdfError::syntax(len, "startxref offset past end of file"));
    }
    Ok(offset)
}

/// An object parsed in place: its header, value, and where its stream
/// data begins if it has one.
pub(crate) struct ParsedObject {
    pub id: ObjectId,
    pub value: Value,
    /// Offset of the first stream byte, just past the line ending that
    /// terminates the `stream` keyword.
    pub stream_offset: Option<u64>,
}

/// Parse `N G obj <value> [stream|endobj]` at `offset`.
pub(crate) fn parse_object_at<R: Read + Seek>(
    reader: &mut ByteReader<R>,
    offset: u64,
    pool: &mut StringPool,
    sink: &mut dyn ErrorSink,
) -> Result<ParsedObject> {
    reader.seek(SeekFrom::Start(offset))?;
    let mut lexer = Lexer::new(reader);

    let number = match lexer.expect_next()? {
        Token::Integer(n) if n >= 1 && n <= u32::MAX as i64 => n as u32,
        other => {
            return Err(PdfError::syntax(
                offset,
                format!("expected object number, found {other:?}"),
            ));
        }
    };
    let generation = match lexer.expect_next()? {
        Token::Integer(g) if (0..=u16::MAX as i64).contains(&g) => g as u16,
        other => {
            return Err(PdfError::syntax(
                offset,
                format!("expected generation, found {other:?}"),
            ));
        }
    };
    match lexer.expect_next()? {
        t if t.is_keyword(b"obj") => {}
        other => {
            return Err(PdfError::syntax(
                offset,
                format!("expected 'obj', found {other:?}"),
            ));
        }
    }

    let value = read_value(&mut lexer, pool, sink)?;

    let stream_offset = match lexer.next()? {
        Some(t) if t.is_keyword(b"stream") => {
            // The keyword is followed by CRLF or LF (a stray CR is
            // tolerated); data starts on the next byte.
            let reader = lexer.reader();
            match reader.peek(2)? {
                [b'\r', b'\n'] => reader.consume(2)?,
                [b'\n', ..] | [b'\r', ..] => reader.consume(1)?,
                _ => {}
            }
            Some(reader.tell())
        }
        // `endobj`, or anything else for tolerant callers.
        _ => None,
    };

    Ok(ParsedObject {
        id: ObjectId::new(number, generation),
        value,
        stream_offset,
    })
}
