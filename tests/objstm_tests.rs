//! Reading compressed object streams (`Type /ObjStm`) referenced from a
//! cross-reference stream, and re-saving their contents as plain
//! objects.

use std::io::Write;

use flate2::Compression;
use flate2::write::ZlibEncoder;
use pdfkern::{Document, Value};

fn zlib(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

/// Hand-build a 1.5 file whose objects 1-3 live in an object stream
/// (object 4) indexed by a cross-reference stream (object 5).
fn build_objstm_pdf() -> Vec<u8> {
    let inner: [(u32, &str); 3] = [
        (1, "<< /Type /Catalog /Pages 2 0 R >>"),
        (2, "<< /Type /Pages /Kids [] /Count 0 /Label (compressed) >>"),
        (3, "42"),
    ];
    let mut header = String::new();
    let mut body = String::new();
    for (number, text) in inner {
        header.push_str(&format!("{number} {} ", body.len()));
        body.push_str(text);
        body.push(' ');
    }
    let mut payload = header.clone().into_bytes();
    payload.extend_from_slice(body.as_bytes());
    let packed = zlib(&payload);

    let mut out = b"%PDF-1.5\n%\xE2\xE3\xCF\xD3\n".to_vec();
    let objstm_at = out.len();
    out.extend_from_slice(
        format!(
            "4 0 obj\n<< /Type /ObjStm /N 3 /First {} /Filter /FlateDecode /Length {} >>\nstream\n",
            header.len(),
            packed.len()
        )
        .as_bytes(),
    );
    out.extend_from_slice(&packed);
    out.extend_from_slice(b"\nendstream\nendobj\n");

    let xref_at = out.len();
    let mut rows: Vec<u8> = Vec::new();
    // W = [1 2 2]: object 0 free, 1-3 compressed in container 4,
    // 4 and 5 in use at their offsets.
    rows.extend_from_slice(&[0, 0, 0, 0xff, 0xff]);
    for index in 0..3u16 {
        rows.push(2);
        rows.extend_from_slice(&4u16.to_be_bytes());
        rows.extend_from_slice(&index.to_be_bytes());
    }
    for offset in [objstm_at, xref_at] {
        rows.push(1);
        rows.extend_from_slice(&(offset as u16).to_be_bytes());
        rows.extend_from_slice(&0u16.to_be_bytes());
    }
    let packed_rows = zlib(&rows);
    out.extend_from_slice(
        format!(
            "5 0 obj\n<< /Type /XRef /Size 6 /W [1 2 2] /Root 1 0 R /Filter /FlateDecode /Length {} >>\nstream\n",
            packed_rows.len()
        )
        .as_bytes(),
    );
    out.extend_from_slice(&packed_rows);
    out.extend_from_slice(b"\nendstream\nendobj\n");
    out.extend_from_slice(format!("startxref\n{xref_at}\n%%EOF\n").as_bytes());
    out
}

#[test]
fn compressed_objects_load_eagerly() {
    let mut doc = Document::load_mem(build_objstm_pdf()).unwrap();
    assert_eq!(doc.object_count(), 5);

    let catalog = doc.object(1).unwrap().as_dict().unwrap();
    assert!(catalog.is_type(b"Catalog"));

    let pages = doc.object(2).unwrap().as_dict().unwrap();
    assert!(pages.is_type(b"Pages"));
    assert_eq!(pages.get_string(b"Label"), Some(&b"compressed"[..]));

    assert_eq!(doc.object(3).unwrap(), &Value::Integer(42));
    assert_eq!(doc.page_count(), 0);
}

#[test]
fn resave_preserves_compressed_object_contents() {
    let mut doc = Document::load_mem(build_objstm_pdf()).unwrap();
    let originals: Vec<(u32, Value)> = (1..=3)
        .map(|n| (n, doc.object(n).unwrap().clone()))
        .collect();

    let mut resaved = Vec::new();
    doc.save_to(&mut resaved).unwrap();
    let mut reopened = Document::load_mem(resaved).unwrap();

    for (number, before) in originals {
        let after = reopened.object(number).unwrap();
        assert_eq!(after, &before, "object {number}");
    }
    // The container and old xref stream were regenerated away; the
    // resaved file indexes objects 1-3 directly.
    for n in 1..=3u32 {
        assert!(!matches!(reopened.object(n).unwrap(), Value::Null));
    }
}
