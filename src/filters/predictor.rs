use crate::error::{PdfError, Result};

use super::DecodeParms;

/// PNG row filter codes (predictor value minus 10).
const PNG_NONE: u8 = 0;
const PNG_SUB: u8 = 1;
const PNG_UP: u8 = 2;
const PNG_AVERAGE: u8 = 3;
const PNG_PAETH: u8 = 4;

/// Undo the predictor named in the decode parameters. Input must be a
/// whole number of rows.
pub(crate) fn unapply(data: &[u8], parms: &DecodeParms) -> Result<Vec<u8>> {
    match parms.predictor {
        1 => Ok(data.to_vec()),
        2 => untiff(data, parms),
        10..=15 => unpng(data, parms),
        other => Err(PdfError::Structure(format!(
            "unsupported predictor {other}"
        ))),
    }
}

/// Apply the predictor for writing. PNG predictors use one row filter
/// uniformly; 15 ("auto") selects Paeth.
pub(crate) fn apply(data: &[u8], parms: &DecodeParms) -> Result<Vec<u8>> {
    match parms.predictor {
        1 => Ok(data.to_vec()),
        2 => tiff(data, parms),
        10..=15 => png(data, parms),
        other => Err(PdfError::Structure(format!(
            "unsupported predictor {other}"
        ))),
    }
}

fn row_check(len: usize, row: usize, what: &str) -> Result<usize> {
    if row == 0 || len % row != 0 {
        return Err(PdfError::Structure(format!(
            "{what}: stream length {len} is not a whole number of {row}-byte rows"
        )));
    }
    Ok(len / row)
}

/// TIFF predictor 2: byte-wise delta against the previous pixel.
fn untiff(data: &[u8], parms: &DecodeParms) -> Result<Vec<u8>> {
    let row = parms.bytes_per_row();
    let bpp = parms.bytes_per_pixel();
    row_check(data.len(), row, "TIFF predictor")?;
    let mut out = data.to_vec();
    for r in out.chunks_exact_mut(row) {
        for i in bpp..row {
            r[i] = r[i].wrapping_add(r[i - bpp]);
        }
    }
    Ok(out)
}

fn tiff(data: &[u8], parms: &DecodeParms) -> Result<Vec<u8>> {
    let row = parms.bytes_per_row();
    let bpp = parms.bytes_per_pixel();
    row_check(data.len(), row, "TIFF predictor")?;
    let mut out = data.to_vec();
    for r in out.chunks_exact_mut(row) {
        // Rightmost first so each delta reads the original bytes.
        for i in (bpp..row).rev() {
            r[i] = r[i].wrapping_sub(r[i - bpp]);
        }
    }
    Ok(out)
}

/// Closest of a, b, c to a + b - c, ties toward a then b.
fn paeth(a: u8, b: u8, c: u8) -> u8 {
    let p = a as i16 + b as i16 - c as i16;
    let pa = (p - a as i16).abs();
    let pb = (p - b as i16).abs();
    let pc = (p - c as i16).abs();
    if pa <= pb && pa <= pc {
        a
    } else if pb <= pc {
        b
    } else {
        c
    }
}

/// PNG family: each encoded row leads with its filter byte and predicts
/// against the previous decoded row (zeros above the first row).
fn unpng(data: &[u8], parms: &DecodeParms) -> Result<Vec<u8>> {
    let row = parms.bytes_per_row();
    let bpp = parms.bytes_per_pixel();
    let rows = row_check(data.len(), row + 1, "PNG predictor")?;
    let mut out = Vec::with_capacity(rows * row);
    let mut prev = vec![0u8; row];
    for chunk in data.chunks_exact(row + 1) {
        let filter = chunk[0];
        let mut cur = chunk[1..].to_vec();
        match filter {
            PNG_NONE => {}
            PNG_SUB => {
                for i in bpp..row {
                    cur[i] = cur[i].wrapping_add(cur[i - bpp]);
                }
            }
            PNG_UP => {
                for i in 0..row {
                    cur[i] = cur[i].wrapping_add(prev[i]);
                }
            }
            PNG_AVERAGE => {
                for i in 0..row {
                    let left = if i >= bpp { cur[i - bpp] as u16 } else { 0 };
                    let up = prev[i] as u16;
                    cur[i] = cur[i].wrapping_add(((left + up) / 2) as u8);
                }
            }
            PNG_PAETH => {
                for i in 0..row {
                    let left = if i >= bpp { cur[i - bpp] } else { 0 };
                    let upleft = if i >= bpp { prev[i - bpp] } else { 0 };
                    cur[i] = cur[i].wrapping_add(paeth(left, prev[i], upleft));
                }
            }
            other => {
                return Err(PdfError::Structure(format!(
                    "bad PNG row filter byte {other}"
                )));
            }
        }
        out.extend_from_slice(&cur);
        prev = cur;
    }
    Ok(out)
}

fn png(data: &[u8], parms: &DecodeParms) -> Result<Vec<u8>> {
    let row = parms.bytes_per_row();
    let bpp = parms.bytes_per_pixel();
    let rows = row_check(data.len(), row, "PNG predictor")?;
    let filter = match parms.predictor {
        15 => PNG_PAETH,
        p => p - 10,
    };
    let mut out = Vec::with_capacity(rows * (row + 1));
    let mut prev = vec![0u8; row];
    for cur in data.chunks_exact(row) {
        out.push(filter);
        match filter {
            PNG_NONE => out.extend_from_slice(cur),
            PNG_SUB => {
                for i in 0..row {
                    let left = if i >= bpp { cur[i - bpp] } else { 0 };
                    out.push(cur[i].wrapping_sub(left));
                }
            }
            PNG_UP => {
                for i in 0..row {
                    out.push(cur[i].wrapping_sub(prev[i]));
                }
            }
            PNG_AVERAGE => {
                for i in 0..row {
                    let left = if i >= bpp { cur[i - bpp] as u16 } else { 0 };
                    let up = prev[i] as u16;
                    out.push(cur[i].wrapping_sub(((left + up) / 2) as u8));
                }
            }
            PNG_PAETH => {
                for i in 0..row {
                    let left = if i >= bpp { cur[i - bpp] } else { 0 };
                    let upleft = if i >= bpp { prev[i - bpp] } else { 0 };
                    out.push(cur[i].wrapping_sub(paeth(left, prev[i], upleft)));
                }
            }
            _ => unreachable!("filter derived from validated predictor"),
        }
        prev = cur.to_vec();
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parms(predictor: u8, colors: u8, bpc: u8, columns: usize) -> DecodeParms {
        DecodeParms {
            predictor,
            colors,
            bits_per_component: bpc,
            columns,
        }
    }

    fn image(rows: usize, row_bytes: usize) -> Vec<u8> {
        (0..rows * row_bytes)
            .map(|i| ((i * 31 + i / 7) % 256) as u8)
            .collect()
    }

    #[test]
    fn paeth_tie_breaking() {
        // Equal distances prefer a, then b.
        assert_eq!(paeth(5, 5, 5), 5);
        assert_eq!(paeth(10, 20, 15), 10);
        assert_eq!(paeth(0, 20, 10), 10);
    }

    #[test]
    fn tiff_roundtrip() {
        let p = parms(2, 3, 8, 17);
        let data = image(9, p.bytes_per_row());
        assert_eq!(unapply(&apply(&data, &p).unwrap(), &p).unwrap(), data);
    }

    #[test]
    fn png_roundtrip_every_filter() {
        for predictor in 10..=15 {
            let p = parms(predictor, 4, 8, 25);
            let data = image(12, p.bytes_per_row());
            let encoded = apply(&data, &p).unwrap();
            assert_eq!(encoded.len(), data.len() + 12);
            assert_eq!(unapply(&encoded, &p).unwrap(), data, "predictor {predictor}");
        }
    }

    #[test]
    fn png_grayscale_single_byte_pixels() {
        let p = parms(12, 1, 8, 40);
        let data = image(5, 40);
        assert_eq!(unapply(&apply(&data, &p).unwrap(), &p).unwrap(), data);
    }

    #[test]
    fn sixteen_bit_rows() {
        let p = parms(11, 3, 16, 10);
        assert_eq!(p.bytes_per_row(), 60);
        assert_eq!(p.bytes_per_pixel(), 6);
        let data = image(4, 60);
        assert_eq!(unapply(&apply(&data, &p).unwrap(), &p).unwrap(), data);
    }

    #[test]
    fn ragged_input_is_rejected() {
        let p = parms(12, 1, 8, 10);
        assert!(unapply(&[0u8; 15], &p).is_err());
    }

    #[test]
    fn bad_row_filter_byte_is_rejected() {
        let p = parms(10, 1, 8, 2);
        // Filter byte 10 is out of range, not "None plus ten".
        assert!(unapply(&[10, 1, 2], &p).is_err());
    }
}
