//! Buffered byte I/O over the underlying file or byte source.
//!
//! All reading goes through [`ByteReader`], which tracks the absolute
//! file offset of its buffer window and supplies the peek/consume pair
//! the tokenizer is built on. All writing goes through [`ByteWriter`],
//! which tracks the logical output offset so the save path can record
//! xref offsets without seeking.

mod reader;
mod writer;

pub use reader::ByteReader;
pub use writer::ByteWriter;

/// Size of the internal read and write buffers.
pub(crate) const BUF_SIZE: usize = 16 * 1024;
