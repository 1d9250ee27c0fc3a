use std::collections::HashMap;

use super::{NodeId, Tree};

const BLOCK_TAGS: &[&str] = &[
    "address", "article", "br", "caption", "dd", "div", "dl", "dt", "h1", "h2", "h3", "h4",
    "h5", "h6", "hr", "li", "ol", "p", "section", "table", "tbody", "td", "tfoot", "th",
    "thead", "tr", "ul",
];

pub fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

fn join_blank(left: &str, right: &str) -> String {
    match (left.is_empty(), right.is_empty()) {
        (true, _) => right.to_string(),
        (_, true) => left.to_string(),
        _ => format!("{left} {right}"),
    }
}

impl Tree {
    /// The character data directly in front of the node.
    pub fn lead(&self, id: NodeId) -> &str {
        match self.previous_sibling(id) {
            Some(previous) => self.tail(previous),
            None => match self.parent(id) {
                Some(parent) => self.text(parent),
                None => "",
            },
        }
    }

    pub fn append_to_lead(&mut self, id: NodeId, value: &str) {
        if value.is_empty() {
            return;
        }
        match self.previous_sibling(id) {
            Some(previous) => self.push_tail(previous, value),
            None => {
                if let Some(parent) = self.parent(id) {
                    self.push_text(parent, value);
                }
            }
        }
    }

    /// Replaces the node by its content.
    pub fn unfold(&mut self, id: NodeId) {
        let Some(parent) = self.parent(id) else {
            return;
        };
        let text = self.take_text(id);
        let tail = self.take_tail(id);
        self.append_to_lead(id, &text);
        let children = std::mem::take(&mut self.node_mut(id).children);
        match children.last() {
            Some(&last) => self.push_tail(last, &tail),
            None => self.append_to_lead(id, &tail),
        }
        let Some(index) = self.index(id) else {
            return;
        };
        for (offset, child) in children.into_iter().enumerate() {
            self.node_mut(child).parent = None;
            self.insert(parent, index + offset, child);
        }
        self.detach(id);
    }

    /// Removes the node; its tail is optionally handed to the lead.
    pub fn remove(&mut self, id: NodeId, keep_tail: bool) {
        if keep_tail {
            let tail = self.take_tail(id);
            self.append_to_lead(id, &tail);
        }
        self.detach(id);
    }

    /// Inserts `adoptee` as first child; the host's text follows the adoptee.
    pub fn push(&mut self, host: NodeId, adoptee: NodeId) {
        let text = self.take_text(host);
        let tail = self.take_tail(adoptee);
        self.set_tail(adoptee, join_blank(&tail, &text));
        self.insert(host, 0, adoptee);
    }

    /// Appends `adoptee`, leaving its tail behind the host.
    pub fn cut_append(&mut self, host: NodeId, adoptee: NodeId) {
        let tail = self.take_tail(adoptee);
        if !tail.is_empty() {
            let host_tail = self.take_tail(host);
            self.set_tail(host, join_blank(&tail, &host_tail));
        }
        self.append(host, adoptee);
    }

    /// Unfolds leading wrappers such as `<li><p>..</p></li>`.
    pub fn unfold_redundant_paragraphs(&mut self, item: NodeId, tags: &[&str]) {
        while is_blank(self.text(item)) {
            match self.first_child(item) {
                Some(child) if tags.contains(&self.tag(child)) => self.unfold(child),
                _ => break,
            }
        }
    }

    /// Merges adjacent siblings of the given kind that are only separated by blanks.
    pub fn concatenate_siblings(&mut self, scope: NodeId, tag: &str, class: Option<&str>) {
        loop {
            let pair = self.find_all(scope, |tree, node| tree.matches(node, tag, class))
                .into_iter()
                .find_map(|node| {
                    let next = self.next_sibling(node)?;
                    (self.matches(next, tag, class) && is_blank(self.tail(node)))
                        .then_some((node, next))
                });
            let Some((first, second)) = pair else {
                break;
            };
            let tail = self.take_tail(second);
            self.set_tail(first, tail);
            self.append(first, second);
            self.set_tail(second, "");
            self.unfold(second);
        }
    }

    /// Renames attribute values according to `mapping` throughout the scope.
    pub fn migrate_attribute(&mut self, scope: NodeId, name: &str, mapping: &[(&str, &str)]) {
        for node in self.iter(scope) {
            let Some(value) = self.get(node, name) else {
                continue;
            };
            if let Some((_, target)) = mapping.iter().find(|(source, _)| *source == value) {
                self.set(node, name, *target);
            }
        }
    }

    /// Attribute values by descending frequency.
    pub fn attribute_frequency(&self, scope: NodeId, name: &str) -> Vec<(String, usize)> {
        let mut counter = HashMap::<&str, usize>::new();
        for node in self.iter(scope) {
            if let Some(value) = self.get(node, name) {
                *counter.entry(value).or_default() += 1;
            }
        }
        let mut result: Vec<(String, usize)> = counter
            .into_iter()
            .map(|(value, count)| (value.to_string(), count))
            .collect();
        result.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        result
    }

    pub fn flatten_by(&mut self, scope: NodeId, predicate: impl Fn(&Tree, NodeId) -> bool) {
        for node in self.find_all(scope, predicate) {
            self.unfold(node);
        }
    }

    /// Keeps the text of all descendants but drops their elements.
    pub fn strip_subelements(&mut self, id: NodeId) {
        for node in self.descendants(id).into_iter().rev() {
            self.unfold(node);
        }
    }

    /// Columns of a table, up to the first column some row does not reach.
    pub fn table_columns(&self, table: NodeId) -> Vec<Vec<NodeId>> {
        let rows = self.table_rows(table);
        let mut columns = Vec::new();
        if rows.is_empty() {
            return columns;
        }
        for k in 0.. {
            let column: Option<Vec<NodeId>> = rows
                .iter()
                .map(|&row| self.children(row).get(k).copied())
                .collect();
            match column {
                Some(column) => columns.push(column),
                None => break,
            }
        }
        columns
    }

    /// `./tr | ./*/tr`
    pub fn table_rows(&self, table: NodeId) -> Vec<NodeId> {
        let mut rows = Vec::new();
        for &child in self.children(table) {
            if self.is(child, "tr") {
                rows.push(child);
            } else {
                rows.extend(self.children_by_tag(child, "tr"));
            }
        }
        rows
    }

    pub fn text_content(&self, id: NodeId) -> String {
        let mut result = String::new();
        self.collect_text(id, false, &mut result);
        result
    }

    /// Text of the subtree, optionally with the node's tail.
    ///
    /// With `simplify_blanks`, block boundaries count as blanks, blank runs
    /// collapse to one space and the result is trimmed.
    pub fn textify(&self, id: NodeId, with_tail: bool, simplify_blanks: bool) -> String {
        let mut result = String::new();
        self.collect_text(id, simplify_blanks, &mut result);
        if with_tail {
            result.push_str(self.tail(id));
        }
        if !simplify_blanks {
            return result;
        }
        result.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    fn collect_text(&self, id: NodeId, blocks: bool, out: &mut String) {
        out.push_str(self.text(id));
        for &child in self.children(id) {
            let block = blocks && BLOCK_TAGS.contains(&self.tag(child));
            if block {
                out.push(' ');
            }
            self.collect_text(child, blocks, out);
            if block {
                out.push(' ');
            }
            out.push_str(self.tail(child));
        }
    }
}
