use chrono::{DateTime, Utc};

use crate::error::{PdfError, Result};
use crate::object::{Dictionary, Value};

use super::Document;

macro_rules! text_entry {
    ($get:ident, $set:ident, $key:literal) => {
        pub fn $get(&mut self) -> Result<Option<String>> {
            Ok(self
                .info_entry($key.as_bytes())?
                .as_ref()
                .and_then(Value::as_string_bytes)
                .map(|bytes| String::from_utf8_lossy(bytes).into_owned()))
        }

        pub fn $set(&mut self, value: impl AsRef<[u8]>) -> Result<()> {
            self.set_info_entry($key, Value::string(value))
        }
    };
}

/// Typed access to the document information dictionary.
impl Document {
    text_entry!(title, set_title, "Title");
    text_entry!(author, set_author, "Author");
    text_entry!(subject, set_subject, "Subject");
    text_entry!(keywords, set_keywords, "Keywords");
    text_entry!(creator, set_creator, "Creator");
    text_entry!(producer, set_producer, "Producer");

    pub fn creation_date(&mut self) -> Result<Option<DateTime<Utc>>> {
        Ok(self
            .info_entry(b"CreationDate")?
            .as_ref()
            .and_then(Value::as_date))
    }

    pub fn set_creation_date(&mut self, stamp: DateTime<Utc>) -> Result<()> {
        self.set_info_entry("CreationDate", Value::Date(stamp))
    }

    pub fn modification_date(&mut self) -> Result<Option<DateTime<Utc>>> {
        Ok(self
            .info_entry(b"ModDate")?
            .as_ref()
            .and_then(Value::as_date))
    }

    pub fn set_modification_date(&mut self, stamp: DateTime<Utc>) -> Result<()> {
        self.set_info_entry("ModDate", Value::Date(stamp))
    }

    /// Any entry of the Info dictionary, resolved and cloned.
    pub fn info_entry(&mut self, key: &[u8]) -> Result<Option<Value>> {
        let Some(info) = self.trailer.get_reference(b"Info") else {
            return Ok(None);
        };
        Ok(self
            .object(info.number)?
            .as_dict()
            .and_then(|dict| dict.get(key))
            .cloned())
    }

    /// Set an entry of the Info dictionary, creating the dictionary on
    /// first use.
    pub fn set_info_entry(&mut self, key: &str, value: impl Into<Value>) -> Result<()> {
        let info = match self.trailer.get_reference(b"Info") {
            Some(id) => id,
            None => {
                let id = self.add_object(Dictionary::new());
                self.trailer.set("Info", id);
                id
            }
        };
        let dict = self
            .object_mut(info.number)?
            .as_dict_mut()
            .ok_or_else(|| PdfError::Structure("Info is not a dictionary".into()))?;
        dict.set(key, value.into());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn text_entries_roundtrip() {
        let mut doc = Document::new();
        doc.set_title("Q3 Report").unwrap();
        doc.set_author("M\u{fc}ller GmbH").unwrap();
        assert_eq!(doc.title().unwrap().as_deref(), Some("Q3 Report"));
        assert_eq!(doc.author().unwrap().as_deref(), Some("Müller GmbH"));
        assert_eq!(doc.subject().unwrap(), None);
    }

    #[test]
    fn dates_are_typed() {
        let mut doc = Document::new();
        let stamp = Utc.with_ymd_and_hms(2024, 3, 1, 8, 30, 0).unwrap();
        doc.set_modification_date(stamp).unwrap();
        assert_eq!(doc.modification_date().unwrap(), Some(stamp));
        // A fresh document already carries a CreationDate.
        assert!(doc.creation_date().unwrap().is_some());
    }
}
