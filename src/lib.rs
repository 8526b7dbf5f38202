//! # pdfkern
//!
//! A reader and writer for the PDF 1.x/2.0 file format, covering the
//! byte-level core: tokenizer and value model, cross-reference tables
//! in classical and stream form, object streams, incremental-update
//! chains with a repair path, Flate and predictor stream codecs, and
//! the "Standard" security handler (RC4-40/128, AES-128).
//!
//! Rendering, linearization, AES-256, and digital signatures are out of
//! scope; higher-level concerns such as content-stream operators and
//! image ingestion are expected to sit on top of this crate.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::io::Write;
//! use pdfkern::{Document, Filter};
//!
//! // Write a one-page document.
//! let mut doc = Document::with_version("1.7");
//! let page = doc.add_page().unwrap();
//! let mut content = doc.create_page_content(page, Filter::Flate).unwrap();
//! content.write_all(b"BT /F1 12 Tf 72 720 Td (hello) Tj ET\n").unwrap();
//! content.close().unwrap();
//! let mut bytes = Vec::new();
//! doc.save_to(&mut bytes).unwrap();
//!
//! // Read it back.
//! let mut reopened = Document::load_mem(bytes).unwrap();
//! assert_eq!(reopened.page_count(), 1);
//! let first = reopened.page(0).unwrap();
//! assert!(reopened.page_content(first).unwrap().starts_with(b"BT"));
//! ```

pub mod document;
pub mod encryption;
pub mod error;
pub mod filters;
pub mod object;
pub mod syntax;

mod crypto;
mod io;
mod reader;

pub use document::{DEFAULT_MEDIA_BOX, Document, LoadOptions, StreamWriter};
pub use encryption::{
    EncryptionMode, EncryptionOptions, PasswordList, PasswordProvider, Permissions,
};
pub use error::{ErrorAction, ErrorSink, LenientSink, PdfError, Result, Severity, StrictSink};
pub use filters::{DecodeParms, Filter};
pub use object::{Dictionary, Name, ObjectId, Value};
