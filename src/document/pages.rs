use std::collections::HashSet;

use crate::dict;
use crate::error::{PdfError, Result};
use crate::filters::Filter;
use crate::object::{Dictionary, ObjectId, Value};

use super::{Document, StreamWriter};

/// Ancestor-walk and tree-depth bound; deeper trees read as hostile.
const MAX_TREE_DEPTH: usize = 32;

impl Document {
    /// Number of leaf pages.
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Leaf pages in document order.
    pub fn pages(&self) -> &[ObjectId] {
        &self.pages
    }

    /// Identity of the page at `index`, if it exists.
    pub fn page(&self, index: usize) -> Option<ObjectId> {
        self.pages.get(index).copied()
    }

    /// The Pages tree root named by the Catalog.
    pub(crate) fn pages_root(&mut self) -> Result<ObjectId> {
        let root = self
            .trailer
            .get_reference(b"Root")
            .ok_or_else(|| PdfError::Structure("document has no Root".into()))?;
        self.object(root.number)?
            .as_dict()
            .and_then(|dict| dict.get_reference(b"Pages"))
            .ok_or_else(|| PdfError::Structure("Catalog has no Pages tree".into()))
    }

    /// Append a new page using the document's default boxes.
    pub fn add_page(&mut self) -> Result<ObjectId> {
        self.add_page_with_media_box(self.default_media_box)
    }

    /// Append a new page with an explicit MediaBox.
    pub fn add_page_with_media_box(&mut self, media_box: [f64; 4]) -> Result<ObjectId> {
        let parent = self.pages_root()?;
        let mut page = dict! {
            "Type" => Value::name("Page"),
            "Parent" => parent,
            "MediaBox" => box_value(media_box),
        };
        if let Some(crop) = self.default_crop_box {
            page.set("CropBox", box_value(crop));
        }
        let page_id = self.add_object(page);

        let pages = self.object_mut(parent.number)?.as_dict_mut().ok_or_else(|| {
            PdfError::Structure("Pages tree root is not a dictionary".into())
        })?;
        match pages.get_mut(b"Kids").and_then(Value::as_array_mut) {
            Some(kids) => kids.push(Value::Reference(page_id)),
            None => pages.set("Kids", Value::Array(vec![Value::Reference(page_id)])),
        }
        let count = pages.get_i64(b"Count").unwrap_or(0);
        pages.set("Count", count + 1);

        self.pages.push(page_id);
        Ok(page_id)
    }

    /// Create a content stream object, wire it as the page's
    /// `Contents`, and open it for writing.
    pub fn create_page_content(
        &mut self,
        page: ObjectId,
        filter: Filter,
    ) -> Result<StreamWriter<'_>> {
        let content_id = self.add_object(Dictionary::new());
        let page_dict = self.object_mut(page.number)?.as_dict_mut().ok_or_else(|| {
            PdfError::Contract(format!("object {page} is not a page dictionary"))
        })?;
        page_dict.set("Contents", content_id);
        self.open_stream(content_id, filter)
    }

    /// Decoded bytes of the page's content stream(s), concatenated in
    /// order when `Contents` is an array.
    pub fn page_content(&mut self, page: ObjectId) -> Result<Vec<u8>> {
        let contents = self
            .object(page.number)?
            .as_dict()
            .and_then(|dict| dict.get(b"Contents"))
            .cloned()
            .ok_or_else(|| PdfError::Contract(format!("page {page} has no Contents")))?;
        let mut out = Vec::new();
        match contents {
            Value::Reference(id) => out = self.stream_data(id.number)?,
            Value::Array(parts) => {
                for part in parts {
                    if let Value::Reference(id) = part {
                        out.extend(self.stream_data(id.number)?);
                    }
                }
            }
            other => {
                return Err(PdfError::Structure(format!(
                    "Contents is a {}",
                    other.type_name()
                )));
            }
        }
        Ok(out)
    }

    /// The page's MediaBox, inherited from ancestor Pages nodes when
    /// absent on the leaf.
    pub fn page_media_box(&mut self, page: ObjectId) -> Result<Option<[f64; 4]>> {
        self.inherited_box(page, b"MediaBox")
    }

    /// The page's CropBox, with the same inheritance rules.
    pub fn page_crop_box(&mut self, page: ObjectId) -> Result<Option<[f64; 4]>> {
        self.inherited_box(page, b"CropBox")
    }

    fn inherited_box(&mut self, page: ObjectId, key: &[u8]) -> Result<Option<[f64; 4]>> {
        let mut current = Some(page);
        for _ in 0..MAX_TREE_DEPTH {
            let Some(node) = current else {
                return Ok(None);
            };
            let dict = match self.object(node.number)?.as_dict() {
                Some(dict) => dict,
                None => return Ok(None),
            };
            if let Some(found) = dict.get_array(key) {
                return Ok(parse_box(found));
            }
            current = dict.get_reference(b"Parent");
        }
        Err(PdfError::Structure("page tree deeper than allowed".into()))
    }

    /// Walk the Pages tree and fill [`Document::pages`] with its leaves
    /// in document order. Depth is bounded and revisits are rejected,
    /// so cyclic trees fail instead of spinning.
    pub(crate) fn collect_pages(&mut self) -> Result<()> {
        self.pages.clear();
        let root = self.pages_root()?;
        let mut seen: HashSet<u32> = HashSet::new();
        let mut stack: Vec<(ObjectId, usize)> = vec![(root, 0)];
        while let Some((node, depth)) = stack.pop() {
            if depth > MAX_TREE_DEPTH {
                return Err(PdfError::Structure("page tree deeper than allowed".into()));
            }
            if !seen.insert(node.number) {
                return Err(PdfError::Structure(format!(
                    "page tree revisits object {node}"
                )));
            }
            let dict = match self.object(node.number)?.as_dict() {
                Some(dict) => dict,
                None => continue,
            };
            if let Some(kids) = dict.get_array(b"Kids") {
                // Push in reverse so the leftmost child pops first.
                let children: Vec<ObjectId> =
                    kids.iter().filter_map(Value::as_reference).collect();
                for child in children.into_iter().rev() {
                    stack.push((child, depth + 1));
                }
            } else if dict.is_type(b"Page") {
                self.pages.push(node);
            }
        }
        Ok(())
    }
}

fn box_value(rect: [f64; 4]) -> Value {
    Value::Array(
        rect.iter()
            .map(|&v| {
                if v.fract() == 0.0 {
                    Value::Integer(v as i64)
                } else {
                    Value::Real(v)
                }
            })
            .collect(),
    )
}

fn parse_box(values: &[Value]) -> Option<[f64; 4]> {
    if values.len() != 4 {
        return None;
    }
    let mut rect = [0.0; 4];
    for (slot, value) in rect.iter_mut().zip(values) {
        *slot = value.as_number()?;
    }
    Some(rect)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_page_updates_tree() {
        let mut doc = Document::new();
        let first = doc.add_page().unwrap();
        let second = doc.add_page().unwrap();
        assert_eq!(doc.page_count(), 2);
        assert_eq!(doc.page(0), Some(first));
        assert_eq!(doc.page(1), Some(second));

        let pages_root = doc.pages_root().unwrap();
        let pages = doc.object(pages_root.number).unwrap().as_dict().unwrap();
        assert_eq!(pages.get_i64(b"Count"), Some(2));
        assert_eq!(pages.get_array(b"Kids").unwrap().len(), 2);
    }

    #[test]
    fn media_box_inherits_from_parent() {
        let mut doc = Document::new();
        let page = doc.add_page().unwrap();
        // The leaf carries its own MediaBox.
        assert_eq!(
            doc.page_media_box(page).unwrap(),
            Some(super::super::DEFAULT_MEDIA_BOX)
        );
        // Strip it and hang one on the Pages root instead.
        let root = doc.pages_root().unwrap();
        doc.object_mut(page.number)
            .unwrap()
            .as_dict_mut()
            .unwrap()
            .remove(b"MediaBox");
        doc.object_mut(root.number)
            .unwrap()
            .as_dict_mut()
            .unwrap()
            .set("MediaBox", box_value([0.0, 0.0, 595.0, 842.0]));
        assert_eq!(
            doc.page_media_box(page).unwrap(),
            Some([0.0, 0.0, 595.0, 842.0])
        );
    }

    #[test]
    fn collect_pages_rejects_cycles() {
        let mut doc = Document::new();
        let root = doc.pages_root().unwrap();
        // A Pages node whose kid is the root again.
        let rogue = doc.add_object(dict! {
            "Type" => Value::name("Pages"),
            "Kids" => Value::Array(vec![Value::Reference(root)]),
        });
        doc.object_mut(root.number)
            .unwrap()
            .as_dict_mut()
            .unwrap()
            .set("Kids", Value::Array(vec![Value::Reference(rogue)]));
        assert!(matches!(
            doc.collect_pages(),
            Err(PdfError::Structure(_))
        ));
    }

    #[test]
    fn page_content_concatenates_arrays() {
        let mut doc = Document::new();
        let page = doc.add_page().unwrap();
        let a = doc.add_object(Dictionary::new());
        doc.set_stream_data(a, b"q ", Filter::None, None).unwrap();
        let b = doc.add_object(Dictionary::new());
        doc.set_stream_data(b, b"Q", Filter::Flate, None).unwrap();
        doc.object_mut(page.number)
            .unwrap()
            .as_dict_mut()
            .unwrap()
            .set(
                "Contents",
                Value::Array(vec![Value::Reference(a), Value::Reference(b)]),
            );
        assert_eq!(doc.page_content(page).unwrap(), b"q Q");
    }
}
