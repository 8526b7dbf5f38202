use std::io::{Read, Write};

use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;

use crate::error::{PdfError, Result};

/// Inflate a zlib-wrapped deflate stream.
pub(crate) fn inflate(data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    ZlibDecoder::new(data)
        .read_to_end(&mut out)
        .map_err(|e| PdfError::Structure(format!("corrupt Flate stream: {e}")))?;
    Ok(out)
}

/// Deflate with a zlib wrapper at the default compression level.
pub(crate) fn deflate(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    // Writing into a Vec cannot fail.
    encoder.write_all(data).expect("in-memory deflate");
    encoder.finish().expect("in-memory deflate")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let data = b"BT /F1 12 Tf 72 720 Td (hello) Tj ET\n".repeat(50);
        let packed = deflate(&data);
        assert!(packed.len() < data.len());
        assert_eq!(inflate(&packed).unwrap(), data);
    }

    #[test]
    fn empty_roundtrip() {
        assert_eq!(inflate(&deflate(b"")).unwrap(), b"");
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(inflate(b"not zlib data").is_err());
    }
}
