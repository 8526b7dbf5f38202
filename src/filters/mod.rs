//! Stream codecs: Flate compression composed with the PNG and TIFF
//! predictor families.
//!
//! Encryption is not part of this layer; the document applies the
//! per-object cipher to the raw bytes before decoding and after
//! encoding, so everything here works on plaintext.

mod flate;
mod predictor;

pub(crate) use flate::{deflate, inflate};

use crate::error::{PdfError, Result};
use crate::object::Dictionary;

/// Filter applied to a stream being written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Filter {
    /// Store bytes as they are.
    #[default]
    None,
    /// `FlateDecode` (zlib deflate).
    Flate,
}

impl Filter {
    /// The `Filter` entry name, if any.
    pub fn name(&self) -> Option<&'static str> {
        match self {
            Filter::None => None,
            Filter::Flate => Some("FlateDecode"),
        }
    }
}

/// Parsed `DecodeParms`: predictor family and the image geometry the
/// row transforms need.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeParms {
    /// 1 (none), 2 (TIFF), or 10-15 (PNG family; 15 picks Paeth when
    /// encoding).
    pub predictor: u8,
    /// Samples per pixel, 1-4.
    pub colors: u8,
    /// Bits per sample: 1, 2, 4, 8, or 16.
    pub bits_per_component: u8,
    /// Pixels per row.
    pub columns: usize,
}

impl Default for DecodeParms {
    fn default() -> Self {
        DecodeParms {
            predictor: 1,
            colors: 1,
            bits_per_component: 8,
            columns: 1,
        }
    }
}

impl DecodeParms {
    /// Whole bytes in one decoded row.
    pub fn bytes_per_row(&self) -> usize {
        (self.columns * self.colors as usize * self.bits_per_component as usize).div_ceil(8)
    }

    /// Byte stride between a sample and the one left of it; sub-byte
    /// depths predict byte-wise.
    pub fn bytes_per_pixel(&self) -> usize {
        ((self.colors as usize * self.bits_per_component as usize) / 8).max(1)
    }

    /// Read and validate a `DecodeParms` dictionary; `None` yields the
    /// defaults.
    pub fn from_dict(dict: Option<&Dictionary>) -> Result<Self> {
        let mut parms = DecodeParms::default();
        let Some(dict) = dict else {
            return Ok(parms);
        };
        if let Some(p) = dict.get_i64(b"Predictor") {
            parms.predictor = match p {
                1 | 2 | 10..=15 => p as u8,
                _ => {
                    return Err(PdfError::Structure(format!("unsupported predictor {p}")));
                }
            };
        }
        if let Some(c) = dict.get_i64(b"Colors") {
            if !(1..=4).contains(&c) {
                return Err(PdfError::Structure(format!("bad Colors value {c}")));
            }
            parms.colors = c as u8;
        }
        if let Some(b) = dict.get_i64(b"BitsPerComponent") {
            if !matches!(b, 1 | 2 | 4 | 8 | 16) {
                return Err(PdfError::Structure(format!(
                    "bad BitsPerComponent value {b}"
                )));
            }
            parms.bits_per_component = b as u8;
        }
        if let Some(c) = dict.get_i64(b"Columns") {
            if c < 1 {
                return Err(PdfError::Structure(format!("bad Columns value {c}")));
            }
            parms.columns = c as usize;
        }
        Ok(parms)
    }
}

/// Decode the raw (already decrypted) bytes of a stream according to
/// its dictionary's `Filter` and `DecodeParms` entries.
pub fn decode(dict: &Dictionary, raw: &[u8]) -> Result<Vec<u8>> {
    let mut filters: Vec<&[u8]> = Vec::new();
    match dict.get(b"Filter") {
        None => {}
        Some(value) => match value {
            crate::Value::Name(name) => filters.push(name.as_bytes()),
            crate::Value::Array(items) => {
                for item in items {
                    match item.as_name() {
                        Some(name) => filters.push(name.as_bytes()),
                        None => {
                            return Err(PdfError::Structure(
                                "Filter array holds a non-name".into(),
                            ));
                        }
                    }
                }
            }
            other => {
                return Err(PdfError::Structure(format!(
                    "Filter entry is a {}",
                    other.type_name()
                )));
            }
        },
    }

    let mut data = raw.to_vec();
    for (index, name) in filters.iter().enumerate() {
        data = match *name {
            b"FlateDecode" | b"Fl" => {
                let parms = DecodeParms::from_dict(parms_at(dict, index))?;
                let inflated = inflate(&data)?;
                predictor::unapply(&inflated, &parms)?
            }
            b"LZWDecode" | b"LZW" => {
                return Err(PdfError::Structure("LZW streams are not supported".into()));
            }
            other => {
                return Err(PdfError::Structure(format!(
                    "unsupported filter /{}",
                    String::from_utf8_lossy(other)
                )));
            }
        };
    }
    Ok(data)
}

/// `DecodeParms` may be a single dictionary or an array parallel to the
/// filter array.
fn parms_at(dict: &Dictionary, index: usize) -> Option<&Dictionary> {
    match dict.get(b"DecodeParms").or_else(|| dict.get(b"DP")) {
        Some(crate::Value::Dictionary(d)) => Some(d),
        Some(crate::Value::Array(items)) => items.get(index)?.as_dict(),
        _ => None,
    }
}

/// Encode plaintext stream bytes for writing: predictor first, then
/// Flate. Returns the bytes to store (still unencrypted).
pub fn encode(filter: Filter, parms: Option<&DecodeParms>, data: &[u8]) -> Result<Vec<u8>> {
    match filter {
        Filter::None => Ok(data.to_vec()),
        Filter::Flate => {
            let predicted;
            let input = match parms {
                Some(p) if p.predictor != 1 => {
                    predicted = predictor::apply(data, p)?;
                    &predicted
                }
                _ => data,
            };
            Ok(deflate(input))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dict;
    use crate::object::Value;

    #[test]
    fn plain_stream_passes_through() {
        let d = dict! { "Length" => 3i64 };
        assert_eq!(decode(&d, b"abc").unwrap(), b"abc");
    }

    #[test]
    fn flate_stream_decodes() {
        let body = b"0.5 w 10 10 m 90 90 l S".to_vec();
        let d = dict! { "Filter" => Value::name("FlateDecode") };
        assert_eq!(decode(&d, &deflate(&body)).unwrap(), body);
    }

    #[test]
    fn filter_array_with_parallel_parms() {
        let parms = DecodeParms {
            predictor: 12,
            colors: 1,
            bits_per_component: 8,
            columns: 16,
        };
        let body = vec![9u8; 64];
        let encoded = encode(Filter::Flate, Some(&parms), &body).unwrap();
        let d = dict! {
            "Filter" => Value::Array(vec![Value::name("FlateDecode")]),
            "DecodeParms" => Value::Array(vec![Value::Dictionary(dict! {
                "Predictor" => 12i64,
                "Columns" => 16i64,
            })]),
        };
        assert_eq!(decode(&d, &encoded).unwrap(), body);
    }

    #[test]
    fn lzw_is_an_explicit_error() {
        let d = dict! { "Filter" => Value::name("LZWDecode") };
        let err = decode(&d, b"anything").unwrap_err();
        assert!(err.to_string().contains("LZW"));
    }

    #[test]
    fn unknown_filter_is_rejected() {
        let d = dict! { "Filter" => Value::name("DCTDecode") };
        assert!(decode(&d, b"jpeg bytes").is_err());
    }

    #[test]
    fn bad_parms_are_rejected() {
        assert!(DecodeParms::from_dict(Some(&dict! { "Predictor" => 3i64 })).is_err());
        assert!(DecodeParms::from_dict(Some(&dict! { "Colors" => 9i64 })).is_err());
        assert!(DecodeParms::from_dict(Some(&dict! { "BitsPerComponent" => 3i64 })).is_err());
    }
}
