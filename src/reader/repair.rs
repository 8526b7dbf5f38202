use std::io::{Cursor, Read, Seek, SeekFrom};

use crate::error::{ErrorSink, PdfError, Result};
use crate::io::ByteReader;
use crate::object::{ObjectId, StringPool, Value};
use crate::syntax::{Lexer, read_value};

use super::xref::{RawEntry, XrefMap};
use super::{parse_object_at, ParsedObject};

fn is_boundary(data: &[u8], index: usize) -> bool {
    index == 0
        || matches!(
            data[index - 1],
            b'\0' | b'\t' | b'\n' | b'\x0c' | b'\r' | b' ' | b'>' | b']' | b')'
        )
}

/// Try to match `<digits> <digits> obj` starting at `at`. Returns the
/// object identity and the index just past the `obj` keyword.
fn match_object_header(data: &[u8], at: usize) -> Option<(ObjectId, usize)> {
    let mut i = at;
    let digits = |i: &mut usize| -> Option<u64> {
        let start = *i;
        while *i < data.len() && data[*i].is_ascii_digit() {
            *i += 1;
        }
        if *i == start || *i - start > 10 {
            return None;
        }
        std::str::from_utf8(&data[start..*i]).ok()?.parse().ok()
    };
    let spaces = |i: &mut usize| -> bool {
        let start = *i;
        while *i < data.len() && matches!(data[*i], b' ' | b'\t') {
            *i += 1;
        }
        *i > start
    };

    let number = digits(&mut i)?;
    if !(1..=u32::MAX as u64).contains(&number) || !spaces(&mut i) {
        return None;
    }
    let generation = digits(&mut i)?;
    if generation > u16::MAX as u64 || !spaces(&mut i) {
        return None;
    }
    if !data[i..].starts_with(b"obj") {
        return None;
    }
    let end = i + 3;
    // `obj` must be a whole keyword.
    match data.get(end) {
        None => {}
        Some(b) if b.is_ascii_alphanumeric() => return None,
        Some(_) => {}
    }
    Some((ObjectId::new(number as u32, generation as u16), end))
}

/// Whole-file recovery scan: find every `N G obj` header and every
/// `trailer` dictionary. Later finds win, matching the incremental
/// update order of a damaged but appendix-updated file.
///
/// When no usable trailer turns up, one is assembled around the first
/// Catalog object the scan can parse.
pub(crate) fn scan_for_objects<R: Read + Seek>(
    reader: &mut ByteReader<R>,
    pool: &mut StringPool,
    sink: &mut dyn ErrorSink,
) -> Result<XrefMap> {
    let len = reader.len()?;
    reader.seek(SeekFrom::Start(0))?;
    let mut data = vec![0u8; len as usize];
    let got = reader.read(&mut data)?;
    data.truncate(got);

    let mut map = XrefMap::default();
    let mut i = 0usize;
    while i < data.len() {
        match data[i] {
            b'0'..=b'9' if is_boundary(&data, i) => {
                if let Some((id, end)) = match_object_header(&data, i) {
                    log::debug!("repair: object {id} at offset {i}");
                    map.insert_overwrite(
                        id.number,
                        RawEntry::InUse {
                            generation: id.generation,
                            offset: i as u64,
                        },
                    );
                    i = end;
                } else {
                    i += 1;
                }
            }
            b't' if is_boundary(&data, i) && data[i..].starts_with(b"trailer") => {
                let mut tail = ByteReader::new(Cursor::new(data[i + b"trailer".len()..].to_vec()));
                let mut lexer = Lexer::new(&mut tail);
                if let Ok(Value::Dictionary(dict)) = read_value(&mut lexer, pool, sink) {
                    log::debug!("repair: trailer at offset {i}");
                    map.trailer = dict;
                }
                i += b"trailer".len();
            }
            _ => i += 1,
        }
    }

    if map.is_empty() {
        return Err(PdfError::Structure(
            "recovery scan found no objects".into(),
        ));
    }
    if map.trailer.get(b"Root").is_none() {
        synthesize_trailer(reader, &mut map, pool, sink)?;
    }
    let max_number = map.entries().last().map(|(n, _)| *n).unwrap_or(0);
    if map.trailer.get_i64(b"Size").unwrap_or(0) <= max_number as i64 {
        map.trailer.set("Size", (max_number + 1) as i64);
    }
    Ok(map)
}

/// No trailer survived: point `Root` at the first object whose value
/// parses as a Catalog dictionary.
fn synthesize_trailer<R: Read + Seek>(
    reader: &mut ByteReader<R>,
    map: &mut XrefMap,
    pool: &mut StringPool,
    sink: &mut dyn ErrorSink,
) -> Result<()> {
    let candidates: Vec<(u32, u64)> = map
        .entries()
        .iter()
        .filter_map(|(number, entry)| match entry {
            RawEntry::InUse { offset, .. } => Some((*number, *offset)),
            RawEntry::InStream { .. } => None,
        })
        .collect();
    for (number, offset) in candidates {
        let Ok(ParsedObject { id, value, .. }) = parse_object_at(reader, offset, pool, sink)
        else {
            continue;
        };
        if let Value::Dictionary(dict) = &value {
            if dict.is_type(b"Catalog") {
                map.trailer.set("Root", ObjectId::new(number, id.generation));
                return Ok(());
            }
        }
    }
    Err(PdfError::Structure(
        "recovery scan found no Catalog object".into(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LenientSink;

    fn scan(bytes: &[u8]) -> Result<XrefMap> {
        let mut reader = ByteReader::new(Cursor::new(bytes.to_vec()));
        scan_for_objects(&mut reader, &mut StringPool::new(), &mut LenientSink)
    }

    #[test]
    fn finds_objects_and_trailer() {
        let data = b"%PDF-1.7\n1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n2 0 obj\n<< /Type /Pages /Kids [] /Count 0 >>\nendobj\ntrailer\n<< /Size 3 /Root 1 0 R >>\n";
        let map = scan(data).unwrap();
        assert_eq!(map.entries().len(), 2);
        assert_eq!(map.trailer.get_reference(b"Root"), Some(ObjectId::new(1, 0)));
        let RawEntry::InUse { offset, .. } = map.entries()[0].1 else {
            panic!("expected in-use entry");
        };
        assert_eq!(&data[offset as usize..offset as usize + 7], b"1 0 obj");
    }

    #[test]
    fn later_duplicate_wins() {
        let first = b"3 0 obj\n<< /Version 1 >>\nendobj\n";
        let mut data = first.to_vec();
        let second_at = data.len() as u64;
        data.extend_from_slice(b"3 0 obj\n<< /Version 2 /Type /Catalog >>\nendobj\n");
        let map = scan(&data).unwrap();
        assert_eq!(map.entries().len(), 1);
        assert_eq!(
            map.entries()[0].1,
            RawEntry::InUse {
                generation: 0,
                offset: second_at
            }
        );
    }

    #[test]
    fn trailer_synthesized_from_catalog() {
        let data = b"9 0 obj\n<< /Type /Catalog /Pages 4 0 R >>\nendobj\n";
        let map = scan(data).unwrap();
        assert_eq!(map.trailer.get_reference(b"Root"), Some(ObjectId::new(9, 0)));
        assert_eq!(map.trailer.get_i64(b"Size"), Some(10));
    }

    #[test]
    fn no_objects_at_all_fails() {
        assert!(scan(b"completely unrelated bytes").is_err());
    }

    #[test]
    fn content_digits_are_not_objects() {
        // "12 0 objx" must not match; "7 0 obj" must.
        let data = b"12 0 objx 7 0 obj\n<< /Type /Catalog >>\nendobj\n";
        let map = scan(data).unwrap();
        assert_eq!(map.entries().len(), 1);
        assert_eq!(map.entries()[0].0, 7);
    }
}
