use html5ever::parse_document;
use html5ever::tendril::TendrilSink;
use html5ever::ParseOpts;
use markup5ever_rcdom::{Handle, NodeData, RcDom};

use super::{NodeId, Tree};
use crate::error::{Result, TransformError};

/// Parses an HTML document. Comments, doctype and processing instructions
/// are dropped; the `html` element becomes the root.
pub fn parse_html(bytes: &[u8]) -> Result<Tree> {
    let dom = parse_document(RcDom::default(), ParseOpts::default())
        .from_utf8()
        .one(bytes);

    let html = dom
        .document
        .children
        .borrow()
        .iter()
        .find(|handle| matches!(handle.data, NodeData::Element { .. }))
        .cloned()
        .ok_or_else(|| TransformError::MissingElement("html".to_string()))?;

    let mut tree = Tree::new("html");
    let root = tree.root();
    copy_attributes(&mut tree, root, &html);
    copy_children(&mut tree, root, &html);
    Ok(tree)
}

fn copy_attributes(tree: &mut Tree, id: NodeId, handle: &Handle) {
    if let NodeData::Element { ref attrs, .. } = handle.data {
        for attr in attrs.borrow().iter() {
            tree.set(id, attr.name.local.as_ref(), attr.value.to_string());
        }
    }
}

fn copy_children(tree: &mut Tree, parent: NodeId, handle: &Handle) {
    for child in handle.children.borrow().iter() {
        match child.data {
            NodeData::Element { ref name, .. } => {
                let id = tree.create(name.local.as_ref());
                copy_attributes(tree, id, child);
                tree.append(parent, id);
                copy_children(tree, id, child);
            }
            NodeData::Text { ref contents } => {
                let contents = contents.borrow();
                match tree.last_child(parent) {
                    Some(last) => tree.push_tail(last, &contents),
                    None => tree.push_text(parent, &contents),
                }
            }
            _ => {}
        }
    }
}
