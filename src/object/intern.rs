use std::sync::Arc;

/// Per-document deduplication pool for name and string bytes.
///
/// Kept sorted by content; lookup is a binary search, a miss inserts at
/// the found position. Interned payloads share one allocation for the
/// lifetime of the document.
#[derive(Debug, Default)]
pub(crate) struct StringPool {
    entries: Vec<Arc<[u8]>>,
}

impl StringPool {
    pub fn new() -> Self {
        StringPool::default()
    }

    /// Return the shared copy of `bytes`, inserting it on first sight.
    pub fn intern(&mut self, bytes: &[u8]) -> Arc<[u8]> {
        match self
            .entries
            .binary_search_by(|entry| entry.as_ref().cmp(bytes))
        {
            Ok(idx) => self.entries[idx].clone(),
            Err(idx) => {
                let entry: Arc<[u8]> = Arc::from(bytes);
                self.entries.insert(idx, entry.clone());
                entry
            }
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
