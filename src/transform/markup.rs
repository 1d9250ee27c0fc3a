//! Inserting inline elements over character spans of a node's text or tail.

use std::ops::Range;

use crate::tree::{NodeId, Tree};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Part {
    Text,
    Tail,
}

impl Part {
    pub fn read(self, tree: &Tree, node: NodeId) -> &str {
        match self {
            Self::Text => tree.text(node),
            Self::Tail => tree.tail(node),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Markup {
    pub span: Range<usize>,
    pub attrs: Vec<(String, String)>,
}

/// Wraps the spans of `node`'s text or tail into new `tag` elements.
///
/// Overlapping, empty or misaligned spans are skipped. Returns the new elements.
pub fn add_markups(tree: &mut Tree, node: NodeId, part: Part, tag: &str, mut markups: Vec<Markup>) -> Vec<NodeId> {
    let source = part.read(tree, node).to_string();
    markups.sort_by_key(|markup| markup.span.start);
    let mut accepted: Vec<Markup> = Vec::new();
    for markup in markups {
        let Range { start, end } = markup.span;
        let aligned = start < end
            && end <= source.len()
            && source.is_char_boundary(start)
            && source.is_char_boundary(end);
        let free = accepted.last().is_none_or(|last| last.span.end <= start);
        if aligned && free {
            accepted.push(markup);
        }
    }
    let Some(first) = accepted.first() else {
        return Vec::new();
    };
    let head = source[..first.span.start].to_string();
    match part {
        Part::Text => tree.set_text(node, head),
        Part::Tail => tree.set_tail(node, head),
    }

    let mut created = Vec::with_capacity(accepted.len());
    let mut anchor = node;
    for (k, markup) in accepted.iter().enumerate() {
        let until = accepted
            .get(k + 1)
            .map(|next| next.span.start)
            .unwrap_or(source.len());
        let element = tree.create(tag);
        for (name, value) in &markup.attrs {
            tree.set(element, name, value.as_str());
        }
        tree.set_text(element, &source[markup.span.clone()]);
        tree.set_tail(element, &source[markup.span.end..until]);
        match part {
            Part::Text => tree.insert(node, k, element),
            Part::Tail => tree.add_next(anchor, element),
        }
        anchor = element;
        created.push(element);
    }
    created
}
