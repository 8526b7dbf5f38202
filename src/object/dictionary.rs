use std::fmt;

use super::{Name, ObjectId, Value};

/// Insertion-ordered mapping from name to value with unique keys.
///
/// PDF dictionaries are small, so lookup is a linear scan. Setting an
/// existing key overwrites in place and keeps the original position.
#[derive(Clone, Default, PartialEq)]
pub struct Dictionary {
    entries: Vec<(Name, Value)>,
}

impl Dictionary {
    pub fn new() -> Self {
        Dictionary::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn has(&self, key: &[u8]) -> bool {
        self.get(key).is_some()
    }

    pub fn get(&self, key: &[u8]) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(name, _)| name.as_bytes() == key)
            .map(|(_, value)| value)
    }

    pub fn get_mut(&mut self, key: &[u8]) -> Option<&mut Value> {
        self.entries
            .iter_mut()
            .find(|(name, _)| name.as_bytes() == key)
            .map(|(_, value)| value)
    }

    /// Insert or overwrite. Last write wins; the key keeps its slot.
    pub fn set(&mut self, key: impl Into<Name>, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();
        match self.get_mut(key.as_bytes()) {
            Some(slot) => *slot = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn remove(&mut self, key: &[u8]) -> Option<Value> {
        let pos = self
            .entries
            .iter()
            .position(|(name, _)| name.as_bytes() == key)?;
        Some(self.entries.remove(pos).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Name, &Value)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut Value> {
        self.entries.iter_mut().map(|(_, v)| v)
    }

    // Typed accessors for the lookups the loaders do constantly.

    pub fn get_i64(&self, key: &[u8]) -> Option<i64> {
        self.get(key)?.as_i64()
    }

    pub fn get_name(&self, key: &[u8]) -> Option<&Name> {
        self.get(key)?.as_name()
    }

    pub fn get_array(&self, key: &[u8]) -> Option<&[Value]> {
        self.get(key)?.as_array()
    }

    pub fn get_dict(&self, key: &[u8]) -> Option<&Dictionary> {
        self.get(key)?.as_dict()
    }

    pub fn get_string(&self, key: &[u8]) -> Option<&[u8]> {
        self.get(key)?.as_string_bytes()
    }

    pub fn get_reference(&self, key: &[u8]) -> Option<ObjectId> {
        self.get(key)?.as_reference()
    }

    /// True when the `Type` entry names `expected`.
    pub fn is_type(&self, expected: &[u8]) -> bool {
        self.get_name(b"Type")
            .is_some_and(|name| name.as_bytes() == expected)
    }
}

impl fmt::Debug for Dictionary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.entries.iter().map(|(k, v)| (k, v)))
            .finish()
    }
}

impl FromIterator<(Name, Value)> for Dictionary {
    fn from_iter<I: IntoIterator<Item = (Name, Value)>>(iter: I) -> Self {
        let mut dict = Dictionary::new();
        for (key, value) in iter {
            dict.set(key, value);
        }
        dict
    }
}

/// Build a [`Dictionary`] from literal key/value pairs.
///
/// ```
/// use pdfkern::{dict, Value};
/// let d = dict! {
///     "Type" => Value::name("Page"),
///     "Rotate" => 0,
/// };
/// assert!(d.is_type(b"Page"));
/// ```
#[macro_export]
macro_rules! dict {
    () => { $crate::Dictionary::new() };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut d = $crate::Dictionary::new();
        $( d.set($crate::Name::from($key), $value); )+
        d
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_preserves_insertion_order() {
        let mut d = Dictionary::new();
        d.set(Name::from("B"), 1i64);
        d.set(Name::from("A"), 2i64);
        d.set(Name::from("C"), 3i64);
        let keys: Vec<_> = d.iter().map(|(k, _)| k.as_bytes().to_vec()).collect();
        assert_eq!(keys, vec![b"B".to_vec(), b"A".to_vec(), b"C".to_vec()]);
    }

    #[test]
    fn duplicate_set_overwrites_in_place() {
        let mut d = Dictionary::new();
        d.set(Name::from("K"), 1i64);
        d.set(Name::from("L"), 2i64);
        d.set(Name::from("K"), 9i64);
        assert_eq!(d.len(), 2);
        assert_eq!(d.get_i64(b"K"), Some(9));
        let first = d.iter().next().unwrap().0.as_bytes().to_vec();
        assert_eq!(first, b"K");
    }

    #[test]
    fn typed_accessors() {
        let d = dict! {
            "Type" => Value::name("Catalog"),
            "Size" => 12i64,
            "Kids" => Value::Array(vec![Value::Reference(ObjectId::new(3, 0))]),
        };
        assert!(d.is_type(b"Catalog"));
        assert_eq!(d.get_i64(b"Size"), Some(12));
        assert_eq!(d.get_array(b"Kids").unwrap().len(), 1);
        assert_eq!(d.get_i64(b"Missing"), None);
    }
}
