//! The in-memory PDF value model.
//!
//! Values are a tagged sum type; arrays and dictionaries own their
//! children inline, and cycles in the object graph are broken at
//! [`Value::Reference`], which stores only an object number and
//! generation. Name and string bytes produced by the parser are
//! deduplicated through the document's [`StringPool`].

mod dictionary;
mod intern;
mod value;

pub use dictionary::Dictionary;
pub use value::{Name, ObjectId, Value};

pub(crate) use intern::StringPool;
pub(crate) use value::parse_date;
