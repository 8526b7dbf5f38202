use std::io::{Read, Seek};

use crate::error::{PdfError, Result};
use crate::io::ByteReader;

/// Largest single token the scanner accepts. Long literal strings count
/// as one token, so the cap is generous.
const MAX_TOKEN_LEN: usize = 1 << 20;

/// Push-back depth. The grammar only ever needs the three-token
/// lookahead of `N G R`, so four slots leave headroom.
const PUSHBACK_CAP: usize = 4;

/// One lexical unit of the PDF syntax.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// `<<`
    DictOpen,
    /// `>>`
    DictClose,
    /// `[`
    ArrayOpen,
    /// `]`
    ArrayClose,
    /// `(...)` with escapes and nesting resolved.
    LiteralString(Vec<u8>),
    /// `<...>` with hex digits decoded; also carries literal strings
    /// whose resolved bytes contain NUL.
    HexString(Vec<u8>),
    /// `/...` with `#HH` escapes decoded.
    Name(Vec<u8>),
    Integer(i64),
    Real(f64),
    /// Any other run of regular characters: `obj`, `stream`, `R`,
    /// `true`, `xref`, ...
    Keyword(Vec<u8>),
}

impl Token {
    pub fn is_keyword(&self, word: &[u8]) -> bool {
        matches!(self, Token::Keyword(k) if k.as_slice() == word)
    }
}

fn is_whitespace(b: u8) -> bool {
    matches!(b, b'\0' | b'\t' | b'\n' | b'\x0c' | b'\r' | b' ')
}

fn is_delimiter(b: u8) -> bool {
    matches!(
        b,
        b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%'
    )
}

fn hex_digit(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

/// Token scanner over a buffered byte source.
///
/// Comments are consumed silently; whitespace separates tokens. The
/// reader's position after [`next`](Lexer::next) is exactly past the
/// returned token, which is what the stream loader relies on when it
/// sees the `stream` keyword.
pub struct Lexer<'a, R> {
    reader: &'a mut ByteReader<R>,
    pushback: Vec<Token>,
}

impl<'a, R: Read + Seek> Lexer<'a, R> {
    pub fn new(reader: &'a mut ByteReader<R>) -> Self {
        Lexer {
            reader,
            pushback: Vec::new(),
        }
    }

    /// Byte offset of the next unscanned byte. Only meaningful when the
    /// push-back stack is empty.
    pub fn position(&self) -> u64 {
        self.reader.tell()
    }

    pub(crate) fn reader(&mut self) -> &mut ByteReader<R> {
        self.reader
    }

    /// Store a token for re-emission; the last pushed comes back first.
    pub fn push(&mut self, token: Token) {
        debug_assert!(self.pushback.len() < PUSHBACK_CAP);
        self.pushback.push(token);
    }

    fn syntax(&self, message: impl Into<String>) -> PdfError {
        PdfError::syntax(self.reader.tell(), message)
    }

    /// Skip whitespace and `%` comments. Returns the first token byte,
    /// or `None` at end of input.
    fn skip_filler(&mut self) -> Result<Option<u8>> {
        loop {
            match self.reader.get_char()? {
                None => return Ok(None),
                Some(b) if is_whitespace(b) => {}
                Some(b'%') => {
                    // Comment to end of line.
                    self.reader.get_line(MAX_TOKEN_LEN)?;
                }
                Some(b) => return Ok(Some(b)),
            }
        }
    }

    /// Scan the next token, or `None` at end of input.
    pub fn next(&mut self) -> Result<Option<Token>> {
        if let Some(token) = self.pushback.pop() {
            return Ok(Some(token));
        }
        let first = match self.skip_filler()? {
            None => return Ok(None),
            Some(b) => b,
        };
        let token = match first {
            b'<' => match self.reader.peek(1)? {
                b"<" => {
                    self.reader.consume(1)?;
                    Token::DictOpen
                }
                _ => self.scan_hex_string()?,
            },
            b'>' => {
                if self.reader.peek(1)? == b">" {
                    self.reader.consume(1)?;
                    Token::DictClose
                } else {
                    return Err(self.syntax("lone '>'"));
                }
            }
            b'[' => Token::ArrayOpen,
            b']' => Token::ArrayClose,
            b'(' => self.scan_literal_string()?,
            b'/' => self.scan_name()?,
            b'{' | b'}' => Token::Keyword(vec![first]),
            b')' => return Err(self.syntax("unbalanced ')'")),
            _ => self.scan_regular_run(first)?,
        };
        Ok(Some(token))
    }

    /// Scan the token and fail if the input ends first.
    pub fn expect_next(&mut self) -> Result<Token> {
        self.next()?
            .ok_or_else(|| self.syntax("unexpected end of input"))
    }

    fn scan_literal_string(&mut self) -> Result<Token> {
        let mut out = Vec::new();
        let mut depth = 1usize;
        loop {
            if out.len() > MAX_TOKEN_LEN {
                return Err(self.syntax("token too large"));
            }
            let b = self
                .reader
                .get_char()?
                .ok_or_else(|| self.syntax("unterminated string"))?;
            match b {
                b'(' => {
                    depth += 1;
                    out.push(b);
                }
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                    out.push(b);
                }
                b'\\' => {
                    let esc = self
                        .reader
                        .get_char()?
                        .ok_or_else(|| self.syntax("unterminated string escape"))?;
                    match esc {
                        b'n' => out.push(b'\n'),
                        b'r' => out.push(b'\r'),
                        b't' => out.push(b'\t'),
                        b'b' => out.push(0x08),
                        b'f' => out.push(0x0c),
                        b'(' | b')' | b'\\' => out.push(esc),
                        b'0'..=b'7' => {
                            let mut code = (esc - b'0') as u16;
                            for _ in 0..2 {
                                match self.reader.peek(1)? {
                                    [d @ b'0'..=b'7'] => {
                                        code = code * 8 + (d - b'0') as u16;
                                        self.reader.consume(1)?;
                                    }
                                    _ => break,
                                }
                            }
                            out.push(code as u8);
                        }
                        // Escaped line ending is a continuation.
                        b'\n' => {}
                        b'\r' => {
                            if self.reader.peek(1)? == b"\n" {
                                self.reader.consume(1)?;
                            }
                        }
                        // A backslash before anything else drops out.
                        other => out.push(other),
                    }
                }
                // Unescaped end-of-line inside a string reads as LF.
                b'\r' => {
                    if self.reader.peek(1)? == b"\n" {
                        self.reader.consume(1)?;
                    }
                    out.push(b'\n');
                }
                _ => out.push(b),
            }
        }
        // A literal string with embedded NUL can only round-trip in hex
        // form, so hand it over as one.
        if out.contains(&0) {
            Ok(Token::HexString(out))
        } else {
            Ok(Token::LiteralString(out))
        }
    }

    fn scan_hex_string(&mut self) -> Result<Token> {
        let mut out = Vec::new();
        let mut pending: Option<u8> = None;
        loop {
            if out.len() > MAX_TOKEN_LEN {
                return Err(self.syntax("token too large"));
            }
            let b = self
                .reader
                .get_char()?
                .ok_or_else(|| self.syntax("unterminated hex string"))?;
            if b == b'>' {
                break;
            }
            if is_whitespace(b) {
                continue;
            }
            let nibble =
                hex_digit(b).ok_or_else(|| self.syntax(format!("bad hex digit 0x{b:02x}")))?;
            match pending.take() {
                Some(high) => out.push(high << 4 | nibble),
                None => pending = Some(nibble),
            }
        }
        // Odd trailing nibble is padded with zero.
        if let Some(high) = pending {
            out.push(high << 4);
        }
        Ok(Token::HexString(out))
    }

    fn scan_name(&mut self) -> Result<Token> {
        let mut out = Vec::new();
        loop {
            if out.len() > MAX_TOKEN_LEN {
                return Err(self.syntax("token too large"));
            }
            match self.reader.peek(1)? {
                [] => break,
                [b] if is_whitespace(*b) || is_delimiter(*b) => break,
                [b'#'] => {
                    // `#HH` escape; kept verbatim when the digits are bad.
                    let ahead = self.reader.peek(3)?;
                    match (ahead.get(1).copied(), ahead.get(2).copied()) {
                        (Some(h), Some(l)) if hex_digit(h).is_some() && hex_digit(l).is_some() => {
                            out.push(hex_digit(h).unwrap() << 4 | hex_digit(l).unwrap());
                            self.reader.consume(3)?;
                        }
                        _ => {
                            out.push(b'#');
                            self.reader.consume(1)?;
                        }
                    }
                }
                [b] => {
                    out.push(*b);
                    self.reader.consume(1)?;
                }
                _ => unreachable!(),
            }
        }
        Ok(Token::Name(out))
    }

    /// Scan a run of regular characters starting with `first` and
    /// classify it as a number or a keyword.
    fn scan_regular_run(&mut self, first: u8) -> Result<Token> {
        let mut run = vec![first];
        loop {
            if run.len() > MAX_TOKEN_LEN {
                return Err(self.syntax("token too large"));
            }
            match self.reader.peek(1)? {
                [b] if !is_whitespace(*b) && !is_delimiter(*b) => {
                    run.push(*b);
                    self.reader.consume(1)?;
                }
                _ => break,
            }
        }
        Ok(classify_run(run))
    }
}

/// A run is a number when it matches `sign? digits ( '.' digits? )?`
/// or `sign? '.' digits`; anything else is a keyword. Exponents are not
/// part of the PDF grammar.
fn classify_run(run: Vec<u8>) -> Token {
    let body = match run.first() {
        Some(b'+' | b'-') => &run[1..],
        _ => &run[..],
    };
    let mut dots = 0usize;
    let mut digits = 0usize;
    let numeric = !body.is_empty()
        && body.iter().all(|&b| {
            match b {
                b'.' => dots += 1,
                b'0'..=b'9' => digits += 1,
                _ => return false,
            }
            true
        })
        && dots <= 1
        && digits >= 1;
    if !numeric {
        return Token::Keyword(run);
    }
    let text = std::str::from_utf8(&run).expect("numeric run is ASCII");
    if dots == 0 {
        match text.parse::<i64>() {
            Ok(n) => return Token::Integer(n),
            // Magnitude overflow: keep the value as a real.
            Err(_) => return Token::Real(text.parse::<f64>().unwrap_or(0.0)),
        }
    }
    Token::Real(text.parse::<f64>().unwrap_or(0.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn all_tokens(input: &[u8]) -> Vec<Token> {
        let mut reader = ByteReader::new(Cursor::new(input.to_vec()));
        let mut lexer = Lexer::new(&mut reader);
        let mut out = Vec::new();
        while let Some(t) = lexer.next().unwrap() {
            out.push(t);
        }
        out
    }

    #[test]
    fn scans_structure_tokens() {
        assert_eq!(
            all_tokens(b"<< /Type /Page >> [ 1 2 ]"),
            vec![
                Token::DictOpen,
                Token::Name(b"Type".to_vec()),
                Token::Name(b"Page".to_vec()),
                Token::DictClose,
                Token::ArrayOpen,
                Token::Integer(1),
                Token::Integer(2),
                Token::ArrayClose,
            ]
        );
    }

    #[test]
    fn numbers_and_keywords() {
        assert_eq!(
            all_tokens(b"0 -17 +3 3.14 -.5 4. obj true 12ab"),
            vec![
                Token::Integer(0),
                Token::Integer(-17),
                Token::Integer(3),
                Token::Real(3.14),
                Token::Real(-0.5),
                Token::Real(4.0),
                Token::Keyword(b"obj".to_vec()),
                Token::Keyword(b"true".to_vec()),
                Token::Keyword(b"12ab".to_vec()),
            ]
        );
    }

    #[test]
    fn huge_integer_becomes_real() {
        match &all_tokens(b"99999999999999999999")[0] {
            Token::Real(r) => assert!(*r > 9.9e18),
            other => panic!("expected real, got {other:?}"),
        }
    }

    #[test]
    fn literal_string_escapes() {
        assert_eq!(
            all_tokens(br"(a\tb\(c\)d\\e\101)"),
            vec![Token::LiteralString(b"a\tb(c)d\\eA".to_vec())]
        );
    }

    #[test]
    fn literal_string_nesting_and_newlines() {
        assert_eq!(
            all_tokens(b"(outer (inner) tail)"),
            vec![Token::LiteralString(b"outer (inner) tail".to_vec())]
        );
        assert_eq!(
            all_tokens(b"(a\r\nb\rc)"),
            vec![Token::LiteralString(b"a\nb\nc".to_vec())]
        );
    }

    #[test]
    fn literal_string_with_nul_degrades_to_hex() {
        assert_eq!(
            all_tokens(b"(a\\000b)"),
            vec![Token::HexString(b"a\0b".to_vec())]
        );
    }

    #[test]
    fn hex_string_whitespace_and_odd_nibble() {
        assert_eq!(
            all_tokens(b"<48 65 6C6C 6F7>"),
            vec![Token::HexString(b"Hello\x70".to_vec())]
        );
    }

    #[test]
    fn name_hash_escapes() {
        assert_eq!(
            all_tokens(b"/A#20B /Bad#zz /"),
            vec![
                Token::Name(b"A B".to_vec()),
                Token::Name(b"Bad#zz".to_vec()),
                Token::Name(b"".to_vec()),
            ]
        );
    }

    #[test]
    fn comments_are_silent() {
        assert_eq!(
            all_tokens(b"1 % a comment\n2"),
            vec![Token::Integer(1), Token::Integer(2)]
        );
    }

    #[test]
    fn pushback_is_lifo() {
        let mut reader = ByteReader::new(Cursor::new(b"1".to_vec()));
        let mut lexer = Lexer::new(&mut reader);
        lexer.push(Token::Keyword(b"R".to_vec()));
        lexer.push(Token::Integer(0));
        assert_eq!(lexer.next().unwrap(), Some(Token::Integer(0)));
        assert_eq!(lexer.next().unwrap(), Some(Token::Keyword(b"R".to_vec())));
        assert_eq!(lexer.next().unwrap(), Some(Token::Integer(1)));
        assert_eq!(lexer.next().unwrap(), None);
    }

    #[test]
    fn unterminated_string_is_an_error() {
        let mut reader = ByteReader::new(Cursor::new(b"(never closed".to_vec()));
        let mut lexer = Lexer::new(&mut reader);
        assert!(lexer.next().is_err());
    }
}
