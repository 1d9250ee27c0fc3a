//! Formex tables (`TBL`, `GR.TBL`) into HTML tables.

use crate::error::{Result, TransformError};
use crate::tree::{NodeId, Tree};

pub const TABLE_GROUP_CLASS: &str = "table-group";

/// `TITLE` of a table or list as `caption` (or heading).
pub fn caption(tree: &mut Tree, title: NodeId, target: &str) {
    tree.set_tag(title, target);
    let mut wrappers = Vec::new();
    for ti in tree.children_by_tag(title, "TI") {
        wrappers.push(ti);
        wrappers.extend(tree.children_by_tag(ti, "P"));
    }
    for wrapper in wrappers {
        tree.unfold(wrapper);
    }
    if let Some(subtitle) = tree.child_by_tag(title, "STI") {
        tree.set_tag(subtitle, "h3");
        for paragraph in tree.children_by_tag(subtitle, "P") {
            tree.unfold(paragraph);
        }
    }
}

fn cell(tree: &mut Tree, cell: NodeId, target: &str) {
    tree.set_tag(cell, target);
    tree.pop(cell, "COL");
    tree.pop(cell, "TYPE");
    for name in ["COLSPAN", "ROWSPAN"] {
        if let Some(value) = tree.pop(cell, name) {
            tree.set(cell, &name.to_lowercase(), value);
        }
    }
    if let Some(empty) = tree.child_by_tag(cell, "IE") {
        tree.set_text(cell, " ");
        tree.remove(empty, false);
    }
}

fn transform_table(tree: &mut Tree, table: NodeId) -> Result<()> {
    tree.set_tag(table, "table");
    tree.clear_attrs(table);
    let title = tree
        .children_by_tag(table, "TITLE")
        .into_iter()
        .find(|&title| tree.child_by_tag(title, "TI").is_some());
    if let Some(title) = title {
        caption(tree, title, "caption");
    }
    let body = tree
        .child_by_tag(table, "CORPUS")
        .ok_or_else(|| TransformError::malformed("TBL", "table without CORPUS"))?;
    tree.set_tag(body, "tbody");
    let header = tree
        .children_by_tag(body, "ROW")
        .into_iter()
        .find(|&row| tree.get(row, "TYPE") == Some("HEADER"));
    if let Some(header) = header {
        let head = tree.create("thead");
        tree.add_previous(body, head);
        tree.append(head, header);
        tree.set_tag(header, "tr");
        tree.pop(header, "TYPE");
        for head_cell in tree.children(header).to_vec() {
            cell(tree, head_cell, "th");
        }
    }
    for bulk in tree.children_by_tag(body, "BLK") {
        for bulk_title in tree.children_by_tag(bulk, "TI.BLK") {
            let row = tree.create("tr");
            tree.add_previous(bulk_title, row);
            tree.append(row, bulk_title);
            tree.set_tag(bulk_title, "td");
            tree.clear_attrs(bulk_title);
            tree.set(bulk_title, "colspan", "2");
        }
        tree.unfold(bulk);
    }
    for row in tree.children_by_tag(body, "ROW") {
        tree.pop(row, "TYPE");
        tree.set_tag(row, "tr");
        for body_cell in tree.children(row).to_vec() {
            cell(tree, body_cell, "td");
        }
    }
    tree.set(table, "class", "table");
    Ok(())
}

/// Converts all tables and table groups below `scope`.
pub fn transform_tables(tree: &mut Tree, scope: NodeId) -> Result<()> {
    for table in tree.find_tag(scope, "TBL") {
        transform_table(tree, table)?;
    }
    for group in tree.find_tag(scope, "GR.TBL") {
        tree.set_tag(group, "div");
        tree.set(group, "class", TABLE_GROUP_CLASS);
        if let Some(title) = tree.child_by_tag(group, "TITLE") {
            tree.set_tag(title, "h3");
            tree.unfold_redundant_paragraphs(title, &["TI", "P"]);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::parse_xml;

    #[test]
    fn corpus_becomes_head_and_body() {
        let mut tree = parse_xml(
            br#"<GR.TBL><TBL NO.SEQ="0001" COLS="2"><TITLE><TI><P>Correlation table</P></TI></TITLE><CORPUS><ROW TYPE="HEADER"><CELL COL="1">Directive 95/46/EC</CELL><CELL COL="2">This Regulation</CELL></ROW><BLK><TI.BLK COL.START="1">Part A</TI.BLK><ROW><CELL COL="1" COLSPAN="1">Article 1</CELL><CELL COL="2"><IE/></CELL></ROW></BLK></CORPUS></TBL></GR.TBL>"#,
        )
        .unwrap();
        let root = tree.root();
        transform_tables(&mut tree, root).unwrap();
        assert_eq!(
            tree.to_html(root),
            concat!(
                r#"<div class="table-group"><table class="table"><caption>Correlation table</caption>"#,
                r#"<thead><tr><th>Directive 95/46/EC</th><th>This Regulation</th></tr></thead>"#,
                r#"<tbody><tr><td colspan="2">Part A</td></tr><tr><td colspan="1">Article 1</td><td> </td></tr></tbody></table></div>"#
            )
        );
    }

    #[test]
    fn table_without_corpus_is_malformed() {
        let mut tree = parse_xml(b"<P><TBL><TITLE><TI>x</TI></TITLE></TBL></P>").unwrap();
        let root = tree.root();
        assert!(matches!(
            transform_tables(&mut tree, root),
            Err(TransformError::Malformed { .. })
        ));
    }
}
