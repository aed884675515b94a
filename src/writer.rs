//! Re-assembly of selected pages into a new PDF

use crate::PdfError;
use lopdf::{Document, Object, ObjectId};

/// Page attributes a page may inherit from its ancestors in the page tree
const INHERITABLE: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Guard against cyclic `Parent` chains
const MAX_TREE_DEPTH: usize = 64;

/// Build a new PDF holding exactly `pages` (1-indexed) of `source`, in that order
pub fn extract_pages(source: &Document, pages: &[u32]) -> Result<Vec<u8>, PdfError> {
    let mut doc = select_pages(source, pages)?;
    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)?;
    Ok(buffer)
}

/// Copy of `source` whose page tree holds only `pages`, in that order
pub fn select_pages(source: &Document, pages: &[u32]) -> Result<Document, PdfError> {
    if pages.is_empty() {
        return Err(PdfError::EmptySelection);
    }

    let mut doc = source.clone();
    let page_ids = doc.get_pages();

    let kids = pages
        .iter()
        .map(|num| page_ids.get(num).copied().ok_or(PdfError::PageOutOfRange(*num)))
        .collect::<Result<Vec<ObjectId>, PdfError>>()?;

    let root_id = doc
        .trailer
        .get(b"Root")
        .and_then(Object::as_reference)
        .map_err(|_| PdfError::InvalidStructure)?;
    let tree_id = doc
        .get_dictionary(root_id)
        .and_then(|catalog| catalog.get(b"Pages"))
        .and_then(Object::as_reference)
        .map_err(|_| PdfError::InvalidStructure)?;

    // Flattening the tree drops intermediate nodes, so inherited attributes
    // have to be copied onto the pages first.
    let inherited: Vec<(ObjectId, Vec<(&[u8], Object)>)> = kids
        .iter()
        .map(|&id| (id, inherited_attributes(&doc, id)))
        .collect();

    for (id, attributes) in inherited {
        let page = doc.get_dictionary_mut(id)?;
        for (key, value) in attributes {
            page.set(key, value);
        }
        page.set("Parent", tree_id);
    }

    let tree = doc.get_dictionary_mut(tree_id)?;
    tree.set(
        "Kids",
        kids.iter().map(|&id| Object::Reference(id)).collect::<Vec<_>>(),
    );
    tree.set("Count", kids.len() as i64);

    // Outline entries would point at pages that are gone
    let catalog = doc.get_dictionary_mut(root_id)?;
    catalog.remove(b"Outlines");

    doc.prune_objects();
    Ok(doc)
}

/// Inheritable attributes a page lacks, resolved from its nearest ancestors
fn inherited_attributes(doc: &Document, page_id: ObjectId) -> Vec<(&'static [u8], Object)> {
    let mut found = Vec::new();

    let Ok(page) = doc.get_dictionary(page_id) else {
        return found;
    };

    let mut missing: Vec<&'static [u8]> = INHERITABLE
        .iter()
        .copied()
        .filter(|key| !page.has(key))
        .collect();
    let mut parent = page.get(b"Parent").and_then(Object::as_reference).ok();
    let mut depth = 0;

    while let Some(node_id) = parent {
        if missing.is_empty() || depth >= MAX_TREE_DEPTH {
            break;
        }
        let Ok(node) = doc.get_dictionary(node_id) else {
            break;
        };

        missing.retain(|key| match node.get(key) {
            Ok(value) => {
                found.push((*key, value.clone()));
                false
            }
            Err(_) => true,
        });

        parent = node.get(b"Parent").and_then(Object::as_reference).ok();
        depth += 1;
    }

    found
}
