use lopdf::{Dictionary, Document, Object, ObjectId, StringFormat};
use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::assemble::OutlineEntry;
use crate::error::{Error, Result};

/// Name trees deeper than this are treated as malformed.
const MAX_NAME_TREE_DEPTH: usize = 32;

struct OutlineNode {
    title: String,
    depth: usize,
    dest: Vec<Object>,
    children: Vec<usize>,
}

/// Rewrites the PDF's bookmark tree so it holds exactly one item per entry.
///
/// Every entry's `anchor` is looked up among the PDF's named destinations
/// (Chromium writes one for each in-document link target). Entries are
/// nested by `depth`; top-level items start open, the rest closed.
pub fn apply_outline(pdf: &[u8], entries: &[OutlineEntry]) -> Result<Vec<u8>> {
    let mut doc = Document::load_mem(pdf)
        .map_err(|e| Error::PdfConversion(format!("failed to parse rendered PDF: {e}")))?;

    let dests = named_destinations(&doc);
    debug!("PDF has {} named destinations", dests.len());

    let mut nodes: Vec<OutlineNode> = Vec::with_capacity(entries.len());
    for entry in entries {
        match dests.get(entry.anchor.as_bytes()) {
            Some(dest) => nodes.push(OutlineNode {
                title: entry.title.clone(),
                depth: entry.depth,
                dest: dest.clone(),
                children: Vec::new(),
            }),
            None => debug!("No destination for \"{}\" ({})", entry.title, entry.anchor),
        }
    }

    if nodes.is_empty() {
        if !entries.is_empty() {
            warn!("No chapter destinations found in the PDF, leaving it without bookmarks");
        }
        return save(&mut doc);
    }

    let roots = nest(&mut nodes);
    write_outline(&mut doc, &nodes, &roots)?;
    info!("Added {} bookmarks", nodes.len());

    save(&mut doc)
}

/// Hangs every node under the closest preceding node that is shallower.
fn nest(nodes: &mut [OutlineNode]) -> Vec<usize> {
    let mut roots = Vec::new();
    let mut stack: Vec<usize> = Vec::new();

    for index in 0..nodes.len() {
        while let Some(&top) = stack.last() {
            if nodes[top].depth >= nodes[index].depth {
                stack.pop();
            } else {
                break;
            }
        }

        match stack.last() {
            Some(&parent) => nodes[parent].children.push(index),
            None => roots.push(index),
        }
        stack.push(index);
    }

    roots
}

fn write_outline(doc: &mut Document, nodes: &[OutlineNode], roots: &[usize]) -> Result<()> {
    let outline_id = doc.new_object_id();
    let ids: Vec<ObjectId> = nodes.iter().map(|_| doc.new_object_id()).collect();

    let mut dicts: Vec<Dictionary> = nodes
        .iter()
        .map(|node| {
            let mut dict = Dictionary::new();
            dict.set("Title", text_string(&node.title));
            dict.set("Dest", Object::Array(node.dest.clone()));
            dict
        })
        .collect();

    link_siblings(&mut dicts, &ids, roots, outline_id);
    for (index, node) in nodes.iter().enumerate() {
        if node.children.is_empty() {
            continue;
        }
        link_siblings(&mut dicts, &ids, &node.children, ids[index]);

        let first = ids[node.children[0]];
        let last = ids[node.children[node.children.len() - 1]];
        let open = roots.contains(&index);
        let count = node.children.len() as i64;

        let dict = &mut dicts[index];
        dict.set("First", Object::Reference(first));
        dict.set("Last", Object::Reference(last));
        dict.set("Count", Object::Integer(if open { count } else { -count }));
    }

    let visible = roots.len() + roots.iter().map(|&r| nodes[r].children.len()).sum::<usize>();
    let mut outline = Dictionary::new();
    outline.set("Type", Object::Name(b"Outlines".to_vec()));
    outline.set("First", Object::Reference(ids[roots[0]]));
    outline.set("Last", Object::Reference(ids[roots[roots.len() - 1]]));
    outline.set("Count", Object::Integer(visible as i64));

    doc.objects.insert(outline_id, Object::Dictionary(outline));
    for (id, dict) in ids.into_iter().zip(dicts) {
        doc.objects.insert(id, Object::Dictionary(dict));
    }

    let catalog_id = doc
        .trailer
        .get(b"Root")
        .and_then(Object::as_reference)
        .map_err(|e| Error::PdfConversion(format!("PDF has no catalog: {e}")))?;
    let catalog = doc
        .get_object_mut(catalog_id)
        .and_then(Object::as_dict_mut)
        .map_err(|e| Error::PdfConversion(format!("PDF catalog is unreadable: {e}")))?;
    catalog.set("Outlines", Object::Reference(outline_id));
    catalog.set("PageMode", Object::Name(b"UseOutlines".to_vec()));

    Ok(())
}

fn link_siblings(dicts: &mut [Dictionary], ids: &[ObjectId], siblings: &[usize], parent: ObjectId) {
    for (i, &index) in siblings.iter().enumerate() {
        let dict = &mut dicts[index];
        dict.set("Parent", Object::Reference(parent));
        if i > 0 {
            dict.set("Prev", Object::Reference(ids[siblings[i - 1]]));
        }
        if let Some(&next) = siblings.get(i + 1) {
            dict.set("Next", Object::Reference(ids[next]));
        }
    }
}

/// PDF text string: plain bytes for ASCII, UTF-16BE with a BOM otherwise.
fn text_string(text: &str) -> Object {
    if text.is_ascii() {
        return Object::String(text.as_bytes().to_vec(), StringFormat::Literal);
    }

    let mut bytes = vec![0xFE, 0xFF];
    for unit in text.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    Object::String(bytes, StringFormat::Hexadecimal)
}

/// Collects the catalog's `/Dests` dictionary and `/Names /Dests` tree.
fn named_destinations(doc: &Document) -> HashMap<Vec<u8>, Vec<Object>> {
    let mut dests = HashMap::new();
    let Ok(catalog) = doc.catalog() else {
        return dests;
    };

    if let Some(Object::Dictionary(dict)) = catalog.get(b"Dests").ok().and_then(|o| resolve(doc, o)) {
        for (name, value) in dict.iter() {
            if let Some(dest) = destination_array(doc, value) {
                dests.insert(name.clone(), dest);
            }
        }
    }

    let tree = catalog
        .get(b"Names")
        .ok()
        .and_then(|o| resolve(doc, o))
        .and_then(|o| o.as_dict().ok())
        .and_then(|names| names.get(b"Dests").ok())
        .and_then(|o| resolve(doc, o));
    if let Some(Object::Dictionary(root)) = tree {
        collect_name_tree(doc, root, &mut dests, 0);
    }

    dests
}

fn collect_name_tree(
    doc: &Document,
    node: &Dictionary,
    dests: &mut HashMap<Vec<u8>, Vec<Object>>,
    depth: usize,
) {
    if depth > MAX_NAME_TREE_DEPTH {
        warn!("Named destination tree is too deep, ignoring the rest");
        return;
    }

    if let Some(Object::Array(pairs)) = node.get(b"Names").ok().and_then(|o| resolve(doc, o)) {
        for pair in pairs.chunks(2) {
            if let [Object::String(name, _), value] = pair {
                if let Some(dest) = destination_array(doc, value) {
                    dests.insert(name.clone(), dest);
                }
            }
        }
    }

    if let Some(Object::Array(kids)) = node.get(b"Kids").ok().and_then(|o| resolve(doc, o)) {
        for kid in kids {
            if let Some(Object::Dictionary(kid)) = resolve(doc, kid) {
                collect_name_tree(doc, kid, dests, depth + 1);
            }
        }
    }
}

/// A destination is either the array itself or a dictionary with `/D`.
fn destination_array(doc: &Document, value: &Object) -> Option<Vec<Object>> {
    match resolve(doc, value)? {
        Object::Array(array) => Some(array.clone()),
        Object::Dictionary(dict) => match resolve(doc, dict.get(b"D").ok()?)? {
            Object::Array(array) => Some(array.clone()),
            _ => None,
        },
        _ => None,
    }
}

fn resolve<'a>(doc: &'a Document, object: &'a Object) -> Option<&'a Object> {
    match object {
        Object::Reference(id) => doc.get_object(*id).ok(),
        other => Some(other),
    }
}

fn save(doc: &mut Document) -> Result<Vec<u8>> {
    let mut data = Vec::new();
    doc.save_to(&mut data)
        .map_err(|e| Error::PdfConversion(format!("failed to serialize PDF: {e}")))?;
    Ok(data)
}
