//! Structural view on an HTML table used to detect tables that are lists.

use crate::tree::{NodeId, Tree};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ListWise {
    Row,
    Column,
}

impl ListWise {
    fn as_str(self) -> &'static str {
        match self {
            Self::Row => "row",
            Self::Column => "column",
        }
    }
}

pub struct HtmlTable {
    pub table: NodeId,
    pub body: NodeId,
    colgroup: Option<NodeId>,
    head: Option<NodeId>,
    foot: Option<NodeId>,
}

impl HtmlTable {
    /// Loose `col` elements are collected into a `colgroup`.
    pub fn new(tree: &mut Tree, table: NodeId) -> Self {
        let body = tree.child_by_tag(table, "tbody").unwrap_or(table);
        let mut colgroup = tree.child_by_tag(table, "colgroup");
        let cols = tree.children_by_tag(table, "col");
        if colgroup.is_none() && !cols.is_empty() {
            let group = tree.create("colgroup");
            tree.insert(table, 0, group);
            for col in cols {
                tree.append(group, col);
            }
            colgroup = Some(group);
        }
        Self {
            table,
            body,
            colgroup,
            head: tree.child_by_tag(table, "thead"),
            foot: tree.child_by_tag(table, "tfoot"),
        }
    }

    fn parts(&self) -> Vec<NodeId> {
        [self.head, Some(self.body), self.foot].into_iter().flatten().collect()
    }

    pub fn rows(&self, tree: &Tree) -> Vec<NodeId> {
        tree.children_by_tag(self.body, "tr")
    }

    pub fn single_celled(&self, tree: &Tree) -> bool {
        if self.head.is_some() || self.foot.is_some() {
            return false;
        }
        match self.rows(tree).as_slice() {
            [row] => tree.children_by_tag(*row, "td").len() == 1,
            _ => false,
        }
    }

    /// Replaces the table by the content of its cells.
    pub fn unfold(&self, tree: &mut Tree) {
        if let Some(colgroup) = self.colgroup {
            tree.remove(colgroup, true);
        }
        for part in self.parts() {
            for row in tree.children_by_tag(part, "tr") {
                for cell in tree.children_by_tag(row, "td") {
                    tree.unfold(cell);
                }
                tree.unfold(row);
            }
            if part != self.table {
                tree.unfold(part);
            }
        }
        tree.unfold(self.table);
    }

    pub fn count_columns(&self, tree: &Tree) -> usize {
        self.rows(tree)
            .first()
            .map(|&row| tree.children(row).len())
            .unwrap_or_default()
    }

    pub fn count_rows(&self, tree: &Tree) -> usize {
        self.parts()
            .into_iter()
            .map(|part| tree.children_by_tag(part, "tr").len())
            .sum()
    }

    pub fn is_column_empty(&self, tree: &Tree, column: usize) -> bool {
        for part in self.parts() {
            for row in tree.children_by_tag(part, "tr") {
                let Some(&cell) = tree.children(row).get(column) else {
                    continue;
                };
                if !tree.text_content(cell).trim().is_empty() || !tree.find_tag(cell, "img").is_empty() {
                    return false;
                }
            }
        }
        true
    }

    pub fn remove_column(&self, tree: &mut Tree, column: usize) {
        for part in self.parts() {
            for row in tree.children_by_tag(part, "tr") {
                if let Some(&cell) = tree.children(row).get(column) {
                    tree.remove(cell, false);
                }
            }
        }
        if let Some(colgroup) = self.colgroup
            && let Some(&col) = tree.children(colgroup).get(column)
        {
            tree.remove(col, false);
        }
    }

    /// Three cells per row with `=` in the middle one.
    pub fn is_equation_array(&self, tree: &Tree) -> bool {
        if self.head.is_some() || self.foot.is_some() || self.count_columns(tree) != 3 {
            return false;
        }
        self.rows(tree).into_iter().all(|row| {
            tree.children(row)
                .get(1)
                .is_some_and(|&cell| tree.text_content(cell).trim() == "=")
        })
    }

    /// Turns the table into `ul.row` (one item per row) or `ul.column`.
    pub fn convert_to_unnumbered_list(&self, tree: &mut Tree, wise: ListWise) {
        if self.head.is_some() || self.foot.is_some() {
            return;
        }
        if let Some(colgroup) = self.colgroup {
            tree.remove(colgroup, true);
        }
        for col in tree.find_tag(self.table, "col") {
            tree.remove(col, true);
        }
        match wise {
            ListWise::Row => {
                for row in self.rows(tree) {
                    for cell in tree.children_by_tag(row, "td") {
                        for paragraph in tree.children_by_tag(cell, "p") {
                            tree.unfold(paragraph);
                        }
                        tree.unfold(cell);
                    }
                    tree.set_tag(row, "li");
                    tree.clear_attrs(row);
                }
            }
            ListWise::Column => {
                let rows = self.rows(tree);
                for _ in 0..self.count_columns(tree) {
                    let item = tree.create("li");
                    tree.append(self.body, item);
                    for &row in &rows {
                        if let Some(cell) = tree.child_by_tag(row, "td") {
                            tree.append(item, cell);
                        }
                    }
                    for cell in tree.children_by_tag(item, "td") {
                        tree.unfold(cell);
                    }
                }
                for row in rows {
                    tree.remove(row, false);
                }
            }
        }
        if self.body != self.table {
            tree.unfold(self.body);
        }
        tree.set_tag(self.table, "ul");
        tree.clear_attrs(self.table);
        tree.set(self.table, "class", wise.as_str());
    }

    pub fn convert_hidden_list_to_list(&self, tree: &mut Tree) {
        let columns = self.count_columns(tree);
        let rows = self.count_rows(tree);
        if columns == 1 && rows > 2 {
            self.convert_to_unnumbered_list(tree, ListWise::Row);
        } else if rows == 1 && columns > 2 {
            self.convert_to_unnumbered_list(tree, ListWise::Column);
        }
    }

    /// A two cell row `| label | content |` becomes `li[data-title=label]`.
    pub fn convert_pseudo_table_to_list_item(&self, tree: &mut Tree) -> Option<NodeId> {
        let row = *self.rows(tree).first()?;
        let [label, content] = tree.children(row) else {
            return None;
        };
        let (label, content) = (*label, *content);
        tree.set_tag(content, "li");
        tree.clear_attrs(content);
        let title = tree.text_content(label).trim().to_string();
        tree.set(content, "data-title", title);
        let tail = tree.take_tail(self.table);
        tree.replace(self.table, content);
        tree.set_tail(content, tail);
        Some(content)
    }
}
