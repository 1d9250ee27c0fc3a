//! Arena-backed document tree.
//!
//! Every node owns three pieces of character data: `text` (before its first
//! child), its children, and `tail` (after its closing tag, before the next
//! sibling). Moving a node moves its tail along with it; detaching a node
//! takes the tail out of the document.

mod html;
mod ops;
mod serialize;
mod xml;

#[cfg(test)]
mod tests;

pub use html::parse_html;
pub use ops::is_blank;
pub use xml::{PI_PREFIX, parse_xml};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

#[derive(Clone, Debug, Default)]
struct Node {
    tag: String,
    attrs: Vec<(String, String)>,
    text: String,
    tail: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// Saved state of a subtree, see [`Tree::snapshot`].
#[derive(Clone, Copy, Debug)]
pub struct Snapshot(NodeId);

#[derive(Clone, Debug)]
pub struct Tree {
    nodes: Vec<Node>,
    root: NodeId,
}

impl Tree {
    pub fn new(root_tag: &str) -> Self {
        let mut tree = Self {
            nodes: Vec::new(),
            root: NodeId(0),
        };
        tree.root = tree.create(root_tag);
        tree
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Makes a detached node the new document root.
    pub fn set_root(&mut self, id: NodeId) {
        self.detach(id);
        self.root = id;
    }

    pub fn create(&mut self, tag: &str) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node {
            tag: tag.to_string(),
            ..Node::default()
        });
        id
    }

    pub fn create_with(&mut self, tag: &str, attrs: &[(&str, &str)], text: &str) -> NodeId {
        let id = self.create(tag);
        for (name, value) in attrs {
            self.set(id, name, *value);
        }
        self.set_text(id, text);
        id
    }

    fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0 as usize]
    }

    fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0 as usize]
    }

    pub fn tag(&self, id: NodeId) -> &str {
        &self.node(id).tag
    }

    pub fn set_tag(&mut self, id: NodeId, tag: &str) {
        self.node_mut(id).tag = tag.to_string();
    }

    pub fn is(&self, id: NodeId, tag: &str) -> bool {
        self.node(id).tag == tag
    }

    pub fn text(&self, id: NodeId) -> &str {
        &self.node(id).text
    }

    pub fn set_text(&mut self, id: NodeId, text: impl Into<String>) {
        self.node_mut(id).text = text.into();
    }

    pub fn push_text(&mut self, id: NodeId, text: &str) {
        self.node_mut(id).text.push_str(text);
    }

    pub fn take_text(&mut self, id: NodeId) -> String {
        std::mem::take(&mut self.node_mut(id).text)
    }

    pub fn tail(&self, id: NodeId) -> &str {
        &self.node(id).tail
    }

    pub fn set_tail(&mut self, id: NodeId, tail: impl Into<String>) {
        self.node_mut(id).tail = tail.into();
    }

    pub fn push_tail(&mut self, id: NodeId, tail: &str) {
        self.node_mut(id).tail.push_str(tail);
    }

    pub fn take_tail(&mut self, id: NodeId) -> String {
        std::mem::take(&mut self.node_mut(id).tail)
    }

    pub fn get(&self, id: NodeId, name: &str) -> Option<&str> {
        self.node(id)
            .attrs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn set(&mut self, id: NodeId, name: &str, value: impl Into<String>) {
        let value = value.into();
        let attrs = &mut self.node_mut(id).attrs;
        match attrs.iter_mut().find(|(key, _)| key == name) {
            Some(slot) => slot.1 = value,
            None => attrs.push((name.to_string(), value)),
        }
    }

    /// Removes an attribute and returns its value.
    pub fn pop(&mut self, id: NodeId, name: &str) -> Option<String> {
        let attrs = &mut self.node_mut(id).attrs;
        let index = attrs.iter().position(|(key, _)| key == name)?;
        Some(attrs.remove(index).1)
    }

    pub fn attrs(&self, id: NodeId) -> &[(String, String)] {
        &self.node(id).attrs
    }

    pub fn clear_attrs(&mut self, id: NodeId) {
        self.node_mut(id).attrs.clear();
    }

    pub fn class(&self, id: NodeId) -> Option<&str> {
        self.get(id, "class")
    }

    pub fn has_class(&self, id: NodeId, class: &str) -> bool {
        self.class(id)
            .is_some_and(|value| value.split_whitespace().any(|token| token == class))
    }

    /// Matches tag and, if given, the exact class attribute.
    pub fn matches(&self, id: NodeId, tag: &str, class: Option<&str>) -> bool {
        self.is(id, tag)
            && match class {
                Some(class) => self.class(id) == Some(class),
                None => true,
            }
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.node(id).children
    }

    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).children.first().copied()
    }

    pub fn last_child(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).children.last().copied()
    }

    pub fn index(&self, id: NodeId) -> Option<usize> {
        let parent = self.parent(id)?;
        self.children(parent).iter().position(|&child| child == id)
    }

    pub fn previous_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let index = self.index(id)?;
        index
            .checked_sub(1)
            .map(|previous| self.children(parent)[previous])
    }

    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let index = self.index(id)?;
        self.children(parent).get(index + 1).copied()
    }

    pub fn following_siblings(&self, id: NodeId) -> Vec<NodeId> {
        match (self.parent(id), self.index(id)) {
            (Some(parent), Some(index)) => self.children(parent)[index + 1..].to_vec(),
            _ => Vec::new(),
        }
    }

    /// Ancestors, nearest first.
    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut result = Vec::new();
        let mut current = self.parent(id);
        while let Some(node) = current {
            result.push(node);
            current = self.parent(node);
        }
        result
    }

    pub fn is_descendant_of(&self, id: NodeId, ancestor: NodeId) -> bool {
        self.ancestors(id).contains(&ancestor)
    }

    /// Nearest ancestor (self excluded) that satisfies the predicate.
    pub fn closest(&self, id: NodeId, predicate: impl Fn(&Tree, NodeId) -> bool) -> Option<NodeId> {
        self.ancestors(id)
            .into_iter()
            .find(|&ancestor| predicate(self, ancestor))
    }

    /// Self and all descendants in document order.
    pub fn iter(&self, id: NodeId) -> Vec<NodeId> {
        let mut result = Vec::new();
        let mut stack = vec![id];
        while let Some(node) = stack.pop() {
            result.push(node);
            stack.extend(self.children(node).iter().rev().copied());
        }
        result
    }

    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut result = self.iter(id);
        result.remove(0);
        result
    }

    pub fn find_all(&self, id: NodeId, predicate: impl Fn(&Tree, NodeId) -> bool) -> Vec<NodeId> {
        self.descendants(id)
            .into_iter()
            .filter(|&node| predicate(self, node))
            .collect()
    }

    pub fn find(&self, id: NodeId, predicate: impl Fn(&Tree, NodeId) -> bool) -> Option<NodeId> {
        self.descendants(id)
            .into_iter()
            .find(|&node| predicate(self, node))
    }

    pub fn find_tag(&self, id: NodeId, tag: &str) -> Vec<NodeId> {
        self.find_all(id, |tree, node| tree.is(node, tag))
    }

    pub fn children_by_tag(&self, id: NodeId, tag: &str) -> Vec<NodeId> {
        self.children(id)
            .iter()
            .copied()
            .filter(|&child| self.is(child, tag))
            .collect()
    }

    pub fn child_by_tag(&self, id: NodeId, tag: &str) -> Option<NodeId> {
        self.children(id)
            .iter()
            .copied()
            .find(|&child| self.is(child, tag))
    }

    /// Follows a path of child tags, e.g. `["CONS.ACT", "INFO.CONSLEG"]`.
    pub fn path(&self, id: NodeId, tags: &[&str]) -> Option<NodeId> {
        tags.iter()
            .try_fold(id, |current, tag| self.child_by_tag(current, tag))
    }

    /// Takes the node out of its parent. The tail stays with the node.
    pub fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.node_mut(id).parent.take() {
            self.node_mut(parent).children.retain(|&child| child != id);
        }
    }

    pub fn append(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        self.node_mut(child).parent = Some(parent);
        self.node_mut(parent).children.push(child);
    }

    pub fn insert(&mut self, parent: NodeId, index: usize, child: NodeId) {
        self.detach(child);
        self.node_mut(child).parent = Some(parent);
        let children = &mut self.node_mut(parent).children;
        let index = index.min(children.len());
        children.insert(index, child);
    }

    /// Places `node` directly after `anchor`.
    pub fn add_next(&mut self, anchor: NodeId, node: NodeId) {
        if anchor == node {
            return;
        }
        self.detach(node);
        if let (Some(parent), Some(index)) = (self.parent(anchor), self.index(anchor)) {
            self.insert(parent, index + 1, node);
        }
    }

    /// Places `node` directly before `anchor`.
    pub fn add_previous(&mut self, anchor: NodeId, node: NodeId) {
        if anchor == node {
            return;
        }
        self.detach(node);
        if let (Some(parent), Some(index)) = (self.parent(anchor), self.index(anchor)) {
            self.insert(parent, index, node);
        }
    }

    /// Puts `new` at the position of `old`; `old` is detached with its tail.
    pub fn replace(&mut self, old: NodeId, new: NodeId) {
        self.add_previous(old, new);
        self.detach(old);
    }

    /// Copies the subtree, tail included. The copy is detached.
    pub fn deep_copy(&mut self, id: NodeId) -> NodeId {
        let source = self.node(id).clone();
        let copy = self.create(&source.tag);
        {
            let node = self.node_mut(copy);
            node.attrs = source.attrs;
            node.text = source.text;
            node.tail = source.tail;
        }
        for child in source.children {
            let child_copy = self.deep_copy(child);
            self.append(copy, child_copy);
        }
        copy
    }

    pub fn snapshot(&mut self, id: NodeId) -> Snapshot {
        Snapshot(self.deep_copy(id))
    }

    /// Restores text, attributes and children. Tail and position are kept.
    pub fn restore(&mut self, id: NodeId, snapshot: Snapshot) {
        let Snapshot(copy) = snapshot;
        for child in self.children(id).to_vec() {
            self.detach(child);
        }
        let text = self.take_text(copy);
        let attrs = std::mem::take(&mut self.node_mut(copy).attrs);
        self.set_text(id, text);
        self.node_mut(id).attrs = attrs;
        for child in self.children(copy).to_vec() {
            self.append(id, child);
        }
    }

    /// Detached copy of the subtree as a tree of its own.
    pub fn extract(&self, id: NodeId) -> Tree {
        let mut tree = Tree::new(self.tag(id));
        let root = tree.root();
        tree.copy_into(self, id, root);
        tree
    }

    fn copy_into(&mut self, source: &Tree, from: NodeId, to: NodeId) {
        self.node_mut(to).attrs = source.attrs(from).to_vec();
        self.set_text(to, source.text(from));
        for &child in source.children(from) {
            let copy = self.create(source.tag(child));
            self.set_tail(copy, source.tail(child));
            self.append(to, copy);
            self.copy_into(source, child, copy);
        }
    }

    /// Grafts the subtree of another tree as last child of `parent`.
    pub fn graft(&mut self, parent: NodeId, source: &Tree, from: NodeId) -> NodeId {
        let copy = self.create(source.tag(from));
        self.append(parent, copy);
        self.copy_into(source, from, copy);
        copy
    }
}
