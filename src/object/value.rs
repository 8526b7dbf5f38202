use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};

use super::Dictionary;

/// Identity of an indirect object: object number (>= 1) and generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectId {
    pub number: u32,
    pub generation: u16,
}

impl ObjectId {
    pub fn new(number: u32, generation: u16) -> Self {
        ObjectId { number, generation }
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.number, self.generation)
    }
}

/// A PDF name. Cheap to clone; the payload is shared and, when produced
/// by the parser, deduplicated per document.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Name(pub(crate) Arc<[u8]>);

impl Name {
    pub fn new(bytes: impl AsRef<[u8]>) -> Self {
        Name(Arc::from(bytes.as_ref()))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl From<&str> for Name {
    fn from(s: &str) -> Self {
        Name::new(s.as_bytes())
    }
}

impl From<&[u8]> for Name {
    fn from(b: &[u8]) -> Self {
        Name::new(b)
    }
}

impl PartialEq<[u8]> for Name {
    fn eq(&self, other: &[u8]) -> bool {
        self.as_bytes() == other
    }
}

impl PartialEq<&str> for Name {
    fn eq(&self, other: &&str) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", String::from_utf8_lossy(&self.0))
    }
}

/// A direct PDF value.
///
/// Literal and hexadecimal strings are kept apart so a loaded document
/// writes back in the form it arrived in. `Integer` and `Real` are
/// separate variants so integers never grow a decimal point on
/// round-trip.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Real(f64),
    Name(Name),
    /// Literal string, escapes already resolved.
    String(Arc<[u8]>),
    /// Binary string, written in `<...>` hex form.
    Binary(Arc<[u8]>),
    /// Timestamp with second precision, written as `(D:...Z)` in UTC.
    Date(DateTime<Utc>),
    Array(Vec<Value>),
    Dictionary(Dictionary),
    /// Indirect reference, `N G R`. Never owns the target.
    Reference(ObjectId),
}

impl Value {
    /// Build a literal string value.
    pub fn string(bytes: impl AsRef<[u8]>) -> Self {
        Value::String(Arc::from(bytes.as_ref()))
    }

    /// Build a binary (hex) string value.
    pub fn binary(bytes: impl AsRef<[u8]>) -> Self {
        Value::Binary(Arc::from(bytes.as_ref()))
    }

    /// Build a name value.
    pub fn name(n: impl AsRef<[u8]>) -> Self {
        Value::Name(Name::new(n))
    }

    /// Short tag used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Boolean(_) => "boolean",
            Value::Integer(_) => "integer",
            Value::Real(_) => "real",
            Value::Name(_) => "name",
            Value::String(_) => "string",
            Value::Binary(_) => "binary string",
            Value::Date(_) => "date",
            Value::Array(_) => "array",
            Value::Dictionary(_) => "dictionary",
            Value::Reference(_) => "reference",
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Numeric value of either an integer or a real.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Integer(n) => Some(*n as f64),
            Value::Real(r) => Some(*r),
            _ => None,
        }
    }

    pub fn as_name(&self) -> Option<&Name> {
        match self {
            Value::Name(n) => Some(n),
            _ => None,
        }
    }

    /// Payload of a literal or binary string.
    pub fn as_string_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::String(s) | Value::Binary(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_array_mut(&mut self) -> Option<&mut Vec<Value>> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_dict(&self) -> Option<&Dictionary> {
        match self {
            Value::Dictionary(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_dict_mut(&mut self) -> Option<&mut Dictionary> {
        match self {
            Value::Dictionary(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_reference(&self) -> Option<ObjectId> {
        match self {
            Value::Reference(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<DateTime<Utc>> {
        match self {
            Value::Date(d) => Some(*d),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Integer(n as i64)
    }
}

impl From<f64> for Value {
    fn from(r: f64) -> Self {
        Value::Real(r)
    }
}

impl From<Name> for Value {
    fn from(n: Name) -> Self {
        Value::Name(n)
    }
}

impl From<Dictionary> for Value {
    fn from(d: Dictionary) -> Self {
        Value::Dictionary(d)
    }
}

impl From<Vec<Value>> for Value {
    fn from(a: Vec<Value>) -> Self {
        Value::Array(a)
    }
}

impl From<ObjectId> for Value {
    fn from(id: ObjectId) -> Self {
        Value::Reference(id)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(d: DateTime<Utc>) -> Self {
        Value::Date(d)
    }
}

/// Parse a PDF date string (`D:YYYYMMDDHHmmSS` with optional `Z` or
/// `±HH'mm'` offset; all fields after the year default to sane values).
pub(crate) fn parse_date(bytes: &[u8]) -> Option<DateTime<Utc>> {
    let rest = bytes.strip_prefix(b"D:")?;
    if rest.len() < 4 || !rest.iter().take(4).all(u8::is_ascii_digit) {
        return None;
    }

    let digits = |range: std::ops::Range<usize>, default: u32| -> Option<u32> {
        if rest.len() < range.end {
            return Some(default);
        }
        let s = std::str::from_utf8(&rest[range]).ok()?;
        s.parse().ok()
    };

    let year: i32 = std::str::from_utf8(&rest[..4]).ok()?.parse().ok()?;
    let month = digits(4..6, 1)?;
    let day = digits(6..8, 1)?;
    let hour = digits(8..10, 0)?;
    let minute = digits(10..12, 0)?;
    let second = digits(12..14, 0)?;

    let naive = NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, minute, second)?;
    let mut stamp = Utc.from_utc_datetime(&naive);

    // Optional timezone: Z, or +HH'mm' / -HH'mm'.
    if rest.len() > 14 {
        match rest[14] {
            b'Z' | b'z' => {}
            sign @ (b'+' | b'-') => {
                let tz = &rest[15..];
                let hh: i64 = if tz.len() >= 2 {
                    std::str::from_utf8(&tz[..2]).ok()?.parse().ok()?
                } else {
                    0
                };
                let mm: i64 = if tz.len() >= 5 && tz[2] == b'\'' {
                    std::str::from_utf8(&tz[3..5]).ok()?.parse().ok()?
                } else {
                    0
                };
                let offset = Duration::minutes(hh * 60 + mm);
                // Local time = UTC + offset, so subtract to normalize.
                stamp = if sign == b'+' {
                    stamp - offset
                } else {
                    stamp + offset
                };
            }
            _ => return None,
        }
    }
    Some(stamp)
}
