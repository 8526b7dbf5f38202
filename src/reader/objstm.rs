use std::io::{Cursor, SeekFrom};

use crate::error::{ErrorSink, PdfError, Result};
use crate::io::ByteReader;
use crate::object::{Dictionary, StringPool, Value};
use crate::syntax::{Lexer, Token, read_value};

/// Upper bound on objects in one object stream; larger counts read as
/// hostile input.
const MAX_OBJSTM_OBJECTS: i64 = 16384;

/// Parse a decoded `ObjStm` body: `N` pairs of object number and
/// relative offset, then the object values at `First` plus offset.
///
/// All contained objects have generation zero, and their strings are
/// not individually encrypted (the stream as a whole was).
pub(crate) fn parse_object_stream(
    dict: &Dictionary,
    decoded: &[u8],
    pool: &mut StringPool,
    sink: &mut dyn ErrorSink,
) -> Result<Vec<(u32, Value)>> {
    let count = dict
        .get_i64(b"N")
        .ok_or_else(|| PdfError::Structure("object stream without N".into()))?;
    if !(0..=MAX_OBJSTM_OBJECTS).contains(&count) {
        return Err(PdfError::Resource(format!(
            "object stream claims {count} objects (limit {MAX_OBJSTM_OBJECTS})"
        )));
    }
    let first = dict
        .get_i64(b"First")
        .filter(|f| *f >= 0)
        .ok_or_else(|| PdfError::Structure("object stream without First".into()))?
        as u64;

    let mut reader = ByteReader::new(Cursor::new(decoded.to_vec()));
    let mut pairs = Vec::with_capacity(count as usize);
    {
        let mut lexer = Lexer::new(&mut reader);
        for _ in 0..count {
            let number = match lexer.expect_next()? {
                Token::Integer(n) if n >= 1 && n <= u32::MAX as i64 => n as u32,
                other => {
                    return Err(PdfError::Structure(format!(
                        "bad object number {other:?} in object stream header"
                    )));
                }
            };
            let relative = match lexer.expect_next()? {
                Token::Integer(o) if o >= 0 => o as u64,
                other => {
                    return Err(PdfError::Structure(format!(
                        "bad offset {other:?} in object stream header"
                    )));
                }
            };
            pairs.push((number, relative));
        }
    }

    let mut objects = Vec::with_capacity(pairs.len());
    for (number, relative) in pairs {
        reader.seek(SeekFrom::Start(first + relative))?;
        let mut lexer = Lexer::new(&mut reader);
        let value = read_value(&mut lexer, pool, sink)?;
        objects.push((number, value));
    }
    Ok(objects)
}
