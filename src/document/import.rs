use crate::error::Result;
use crate::object::{Dictionary, ObjectId, Value};

use super::{Document, Slot, SlotValue, StreamData};

impl Document {
    /// Copy an object graph from another document, returning the local
    /// identity of its root.
    ///
    /// The copy is idempotent: a sorted map keyed by the source
    /// document's 32-byte fingerprint and source object number
    /// remembers every object already brought over, so shared
    /// subobjects are copied once and cycles terminate.
    pub fn import_object(&mut self, source: &mut Document, id: ObjectId) -> Result<ObjectId> {
        let key = (source.fingerprint, id.number);
        if let Ok(found) = self
            .import_map
            .binary_search_by(|(entry, _)| entry.cmp(&key))
        {
            return Ok(self.import_map[found].1);
        }

        // Reserve the local slot and map entry before descending so a
        // cyclic graph resolves back to it instead of recursing.
        let local = self.add_object(Value::Null);
        match self
            .import_map
            .binary_search_by(|(entry, _)| entry.cmp(&key))
        {
            Ok(_) => {}
            Err(at) => self.import_map.insert(at, (key, local)),
        }

        let value = source.object(id.number)?.clone();
        let mut rewritten = self.rewrite_imported(source, value)?;

        let stream = if source.has_stream(id.number)? {
            let raw = source.raw_stream_data(id.number)?;
            // The copied dictionary must describe the copied bytes; an
            // indirect Length in the source becomes direct here.
            if let Some(dict) = rewritten.as_dict_mut() {
                dict.set("Length", raw.len() as i64);
            }
            StreamData::Memory(raw)
        } else {
            StreamData::None
        };

        let idx = self
            .slots
            .binary_search_by_key(&local.number, |slot: &Slot| slot.id.number)
            .expect("slot reserved above");
        self.slots[idx].value = SlotValue::Loaded(rewritten);
        self.slots[idx].stream = stream;
        Ok(local)
    }

    /// Rebuild a copied value, importing every referenced object.
    fn rewrite_imported(&mut self, source: &mut Document, value: Value) -> Result<Value> {
        match value {
            Value::Reference(rid) => {
                Ok(Value::Reference(self.import_object(source, rid)?))
            }
            Value::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(self.rewrite_imported(source, item)?);
                }
                Ok(Value::Array(out))
            }
            Value::Dictionary(dict) => {
                let mut out = Dictionary::new();
                for (key, entry) in dict.iter() {
                    let copied = self.rewrite_imported(source, entry.clone())?;
                    out.set(key.clone(), copied);
                }
                Ok(Value::Dictionary(out))
            }
            other => Ok(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dict;
    use crate::filters::Filter;

    #[test]
    fn shared_subobjects_are_copied_once() {
        let mut src = Document::new();
        let shared = src.add_object(dict! { "Kind" => Value::name("Shared") });
        let a = src.add_object(dict! { "Child" => shared });
        let b = src.add_object(dict! { "Child" => shared });

        let mut dst = Document::new();
        let before = dst.object_count();
        let a2 = dst.import_object(&mut src, a).unwrap();
        let b2 = dst.import_object(&mut src, b).unwrap();
        // a, b, and one copy of shared.
        assert_eq!(dst.object_count(), before + 3);

        let shared_a = dst
            .object(a2.number)
            .unwrap()
            .as_dict()
            .unwrap()
            .get_reference(b"Child")
            .unwrap();
        let shared_b = dst
            .object(b2.number)
            .unwrap()
            .as_dict()
            .unwrap()
            .get_reference(b"Child")
            .unwrap();
        assert_eq!(shared_a, shared_b);
    }

    #[test]
    fn import_is_idempotent() {
        let mut src = Document::new();
        let obj = src.add_object(Value::Integer(5));
        let mut dst = Document::new();
        let first = dst.import_object(&mut src, obj).unwrap();
        let second = dst.import_object(&mut src, obj).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn cyclic_graphs_terminate() {
        let mut src = Document::new();
        let a = src.add_object(Value::Null);
        let b = src.add_object(dict! { "Back" => a });
        src.set_object(a, dict! { "Next" => b }).unwrap();

        let mut dst = Document::new();
        let a2 = dst.import_object(&mut src, a).unwrap();
        let next = dst
            .object(a2.number)
            .unwrap()
            .as_dict()
            .unwrap()
            .get_reference(b"Next")
            .unwrap();
        let back = dst
            .object(next.number)
            .unwrap()
            .as_dict()
            .unwrap()
            .get_reference(b"Back")
            .unwrap();
        assert_eq!(back, a2);
    }

    #[test]
    fn streams_come_along() {
        let mut src = Document::new();
        let obj = src.add_object(Dictionary::new());
        src.set_stream_data(obj, b"stream body", Filter::Flate, None)
            .unwrap();
        let mut dst = Document::new();
        let copied = dst.import_object(&mut src, obj).unwrap();
        assert_eq!(dst.stream_data(copied.number).unwrap(), b"stream body");
    }
}
