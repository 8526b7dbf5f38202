use std::io::{Read, Seek};

use super::lexer::{Lexer, Token};
use crate::error::{ErrorAction, ErrorSink, PdfError, Result, Severity};
use crate::object::{Dictionary, Name, ObjectId, StringPool, Value, parse_date};

/// Maximum container nesting inside a single value. Real documents stay
/// in the single digits; the cap stops crafted inputs from exhausting
/// the stack.
const MAX_VALUE_DEPTH: usize = 256;

/// Parse one value from the token stream.
///
/// Arrays and dictionaries recurse; a number may open the three-token
/// `N G R` indirect-reference form, with unused lookahead tokens pushed
/// back. Duplicate dictionary keys keep the last value and report a
/// warning through `sink`.
pub(crate) fn read_value<R: Read + Seek>(
    lexer: &mut Lexer<'_, R>,
    pool: &mut StringPool,
    sink: &mut dyn ErrorSink,
) -> Result<Value> {
    let token = lexer.expect_next()?;
    read_value_from(token, lexer, pool, sink, 0)
}

fn read_value_from<R: Read + Seek>(
    token: Token,
    lexer: &mut Lexer<'_, R>,
    pool: &mut StringPool,
    sink: &mut dyn ErrorSink,
    depth: usize,
) -> Result<Value> {
    if depth > MAX_VALUE_DEPTH {
        return Err(PdfError::Resource(format!(
            "value nesting deeper than {MAX_VALUE_DEPTH}"
        )));
    }
    match token {
        Token::ArrayOpen => {
            let mut items = Vec::new();
            loop {
                match lexer.expect_next()? {
                    Token::ArrayClose => break,
                    other => items.push(read_value_from(other, lexer, pool, sink, depth + 1)?),
                }
            }
            Ok(Value::Array(items))
        }
        Token::DictOpen => {
            let mut dict = Dictionary::new();
            loop {
                match lexer.expect_next()? {
                    Token::DictClose => break,
                    Token::Name(key) => {
                        let key = Name(pool.intern(&key));
                        let value = {
                            let token = lexer.expect_next()?;
                            read_value_from(token, lexer, pool, sink, depth + 1)?
                        };
                        if dict.has(key.as_bytes()) {
                            let message = format!(
                                "WARNING: duplicate dictionary key {key:?}, keeping last value"
                            );
                            if sink.on_error(&message, Severity::Warning) == ErrorAction::Abort {
                                return Err(PdfError::Aborted);
                            }
                        }
                        dict.set(key, value);
                    }
                    other => {
                        return Err(PdfError::syntax(
                            lexer.position(),
                            format!("expected name key in dictionary, found {other:?}"),
                        ));
                    }
                }
            }
            Ok(Value::Dictionary(dict))
        }
        Token::LiteralString(bytes) => match parse_date(&bytes) {
            Some(stamp) => Ok(Value::Date(stamp)),
            None => Ok(Value::String(pool.intern(&bytes))),
        },
        Token::HexString(bytes) => Ok(Value::Binary(pool.intern(&bytes))),
        Token::Name(bytes) => Ok(Value::Name(Name(pool.intern(&bytes)))),
        Token::Integer(number) => read_possible_reference(number, lexer),
        Token::Real(r) => Ok(Value::Real(r)),
        Token::Keyword(word) => match word.as_slice() {
            b"true" => Ok(Value::Boolean(true)),
            b"false" => Ok(Value::Boolean(false)),
            b"null" => Ok(Value::Null),
            _ => Err(PdfError::syntax(
                lexer.position(),
                format!("unexpected keyword '{}'", String::from_utf8_lossy(&word)),
            )),
        },
        Token::DictClose | Token::ArrayClose => Err(PdfError::syntax(
            lexer.position(),
            "unbalanced closing delimiter",
        )),
    }
}

/// `number` was just read; decide between a plain integer and the
/// `N G R` reference form.
fn read_possible_reference<R: Read + Seek>(
    number: i64,
    lexer: &mut Lexer<'_, R>,
) -> Result<Value> {
    if number >= 1 && number <= u32::MAX as i64 {
        let second = lexer.next()?;
        if let Some(Token::Integer(generation)) = second {
            if (0..=u16::MAX as i64).contains(&generation) {
                match lexer.next()? {
                    Some(Token::Keyword(k)) if k == b"R" => {
                        return Ok(Value::Reference(ObjectId::new(
                            number as u32,
                            generation as u16,
                        )));
                    }
                    Some(third) => {
                        // Not a reference: un-read the lookahead, last
                        // pushed comes back first.
                        lexer.push(third);
                        lexer.push(Token::Integer(generation));
                    }
                    None => lexer.push(Token::Integer(generation)),
                }
            } else {
                lexer.push(Token::Integer(generation));
            }
        } else if let Some(second) = second {
            lexer.push(second);
        }
    }
    Ok(Value::Integer(number))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LenientSink;
    use crate::io::ByteReader;
    use std::io::Cursor;

    fn parse(input: &[u8]) -> Result<Value> {
        let mut reader = ByteReader::new(Cursor::new(input.to_vec()));
        let mut lexer = Lexer::new(&mut reader);
        let mut pool = StringPool::new();
        read_value(&mut lexer, &mut pool, &mut LenientSink)
    }

    #[test]
    fn scalars() {
        assert_eq!(parse(b"null").unwrap(), Value::Null);
        assert_eq!(parse(b"true").unwrap(), Value::Boolean(true));
        assert_eq!(parse(b"-42").unwrap(), Value::Integer(-42));
        assert_eq!(parse(b"2.5").unwrap(), Value::Real(2.5));
        assert_eq!(parse(b"/Root").unwrap(), Value::name("Root"));
        assert_eq!(parse(b"(hi)").unwrap(), Value::string("hi"));
        assert_eq!(parse(b"<4869>").unwrap(), Value::binary("Hi"));
    }

    #[test]
    fn nested_containers() {
        let v = parse(b"<< /Kids [3 0 R 4 0 R] /Count 2 /Sub << /X true >> >>").unwrap();
        let dict = v.as_dict().unwrap();
        assert_eq!(dict.get_array(b"Kids").unwrap().len(), 2);
        assert_eq!(dict.get_i64(b"Count"), Some(2));
        assert_eq!(
            dict.get_dict(b"Sub").unwrap().get(b"X"),
            Some(&Value::Boolean(true))
        );
    }

    #[test]
    fn reference_lookahead() {
        assert_eq!(
            parse(b"12 0 R").unwrap(),
            Value::Reference(ObjectId::new(12, 0))
        );
        // Three integers: the first is plain, lookahead restored.
        let v = parse(b"[1 2 3]").unwrap();
        assert_eq!(
            v.as_array().unwrap(),
            &[Value::Integer(1), Value::Integer(2), Value::Integer(3)]
        );
        // Two integers then a non-R keyword inside an array.
        let v = parse(b"[5 6 null]").unwrap();
        assert_eq!(
            v.as_array().unwrap(),
            &[Value::Integer(5), Value::Integer(6), Value::Null]
        );
    }

    #[test]
    fn reference_like_prefix_of_dict_entry() {
        // `/A 1 /B 2` must not eat `/B` while probing `1` for a ref.
        let v = parse(b"<< /A 1 /B 2 >>").unwrap();
        let dict = v.as_dict().unwrap();
        assert_eq!(dict.get_i64(b"A"), Some(1));
        assert_eq!(dict.get_i64(b"B"), Some(2));
    }

    #[test]
    fn date_strings_become_dates() {
        use chrono::{TimeZone, Utc};
        assert_eq!(
            parse(b"(D:20240615120000Z)").unwrap(),
            Value::Date(Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap())
        );
        // Non-date strings survive untouched.
        assert_eq!(parse(b"(Date: soon)").unwrap(), Value::string("Date: soon"));
    }

    #[test]
    fn duplicate_keys_keep_last_and_warn() {
        let v = parse(b"<< /K 1 /K 2 >>").unwrap();
        assert_eq!(v.as_dict().unwrap().get_i64(b"K"), Some(2));
        assert_eq!(v.as_dict().unwrap().len(), 1);
    }

    #[test]
    fn duplicate_keys_abort_under_strict_sink() {
        let mut reader = ByteReader::new(Cursor::new(b"<< /K 1 /K 2 >>".to_vec()));
        let mut lexer = Lexer::new(&mut reader);
        let mut pool = StringPool::new();
        let err = read_value(&mut lexer, &mut pool, &mut crate::error::StrictSink).unwrap_err();
        assert!(matches!(err, PdfError::Aborted));
    }

    #[test]
    fn stray_keyword_is_syntax_error() {
        assert!(matches!(
            parse(b"endobj"),
            Err(PdfError::Syntax { .. })
        ));
    }

    #[test]
    fn interning_shares_repeated_names() {
        let mut reader =
            ByteReader::new(Cursor::new(b"[/Alpha /Alpha /Alpha]".to_vec()));
        let mut lexer = Lexer::new(&mut reader);
        let mut pool = StringPool::new();
        let v = read_value(&mut lexer, &mut pool, &mut LenientSink).unwrap();
        let arr = v.as_array().unwrap();
        let first = arr[0].as_name().unwrap();
        let last = arr[2].as_name().unwrap();
        assert!(std::sync::Arc::ptr_eq(&first.0, &last.0));
    }
}
