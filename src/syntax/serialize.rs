use std::io::Write;

use crate::error::Result;
use crate::object::{Name, Value};

/// Serialize a value in its on-disk form.
///
/// Dictionaries are written one entry per line, arrays space-separated,
/// names and strings with the escaping the format requires. Numeric
/// output is locale-independent by construction.
pub fn write_value<W: Write>(w: &mut W, value: &Value) -> Result<()> {
    match value {
        Value::Null => w.write_all(b"null")?,
        Value::Boolean(true) => w.write_all(b"true")?,
        Value::Boolean(false) => w.write_all(b"false")?,
        Value::Integer(n) => write!(w, "{n}")?,
        Value::Real(r) => w.write_all(format_real(*r).as_bytes())?,
        Value::Name(name) => write_name(w, name)?,
        Value::String(s) => write_literal_string(w, s)?,
        Value::Binary(s) => {
            w.write_all(b"<")?;
            for byte in s.iter() {
                write!(w, "{byte:02X}")?;
            }
            w.write_all(b">")?;
        }
        Value::Date(stamp) => {
            write!(w, "(D:{}Z)", stamp.format("%Y%m%d%H%M%S"))?;
        }
        Value::Array(items) => {
            w.write_all(b"[")?;
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    w.write_all(b" ")?;
                }
                write_value(w, item)?;
            }
            w.write_all(b"]")?;
        }
        Value::Dictionary(dict) => {
            w.write_all(b"<<\n")?;
            for (key, entry) in dict.iter() {
                write_name(w, key)?;
                w.write_all(b" ")?;
                write_value(w, entry)?;
                w.write_all(b"\n")?;
            }
            w.write_all(b">>")?;
        }
        Value::Reference(id) => write!(w, "{} {} R", id.number, id.generation)?,
    }
    Ok(())
}

/// `/` plus the payload; bytes outside printable ASCII, delimiters,
/// whitespace, and `#` itself become `#HH` escapes.
fn write_name<W: Write>(w: &mut W, name: &Name) -> Result<()> {
    w.write_all(b"/")?;
    for &b in name.as_bytes() {
        let escape = !(0x21..=0x7e).contains(&b)
            || matches!(
                b,
                b'#' | b'%' | b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/'
            );
        if escape {
            write!(w, "#{b:02X}")?;
        } else {
            w.write_all(&[b])?;
        }
    }
    Ok(())
}

/// `(` ... `)` with backslash escapes for the delimiters and three-digit
/// octal escapes for non-printable bytes.
fn write_literal_string<W: Write>(w: &mut W, s: &[u8]) -> Result<()> {
    w.write_all(b"(")?;
    for &b in s {
        match b {
            b'\\' => w.write_all(b"\\\\")?,
            b'(' => w.write_all(b"\\(")?,
            b')' => w.write_all(b"\\)")?,
            0x20..=0x7e => w.write_all(&[b])?,
            _ => write!(w, "\\{b:03o}")?,
        }
    }
    w.write_all(b")")?;
    Ok(())
}

/// Format a real with up to six significant digits, never in exponent
/// notation. Non-finite values degrade to zero, which the format has no
/// way to express otherwise.
pub fn format_real(r: f64) -> String {
    if !r.is_finite() {
        return "0".to_string();
    }
    if r == 0.0 {
        return "0".to_string();
    }
    let magnitude = r.abs().log10().floor() as i32;
    let decimals = (5 - magnitude).clamp(0, 17) as usize;
    let mut s = format!("{r:.decimals$}");
    if s.contains('.') {
        while s.ends_with('0') {
            s.pop();
        }
        if s.ends_with('.') {
            s.pop();
        }
    }
    s
}
