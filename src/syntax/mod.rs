//! Lexical and syntactic layer: byte stream to tokens to values and
//! back.
//!
//! [`Lexer`] scans PDF tokens off a [`ByteReader`](crate::io::ByteReader)
//! with a small push-back stack for the indirect-reference lookahead.
//! [`read_value`] builds [`Value`](crate::Value) trees from tokens;
//! [`write_value`] serializes them byte-exactly for the writer.

mod lexer;
mod parser;
mod serialize;

pub use lexer::{Lexer, Token};
pub use serialize::{format_real, write_value};

pub(crate) use parser::read_value;
