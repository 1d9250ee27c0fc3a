//! Itemization of raw HTML leaves: labelled paragraphs and label/content
//! tables become nested lists.

use std::collections::BTreeSet;

use super::dialect::Itemization;
use super::table::{HtmlTable, ListWise};
use crate::error::{Result, TransformError};
use crate::transform::Toolkit;
use crate::transform::article::leaf_id;
use crate::transform::liap::ItemTag;
use crate::tree::{NodeId, Tree, is_blank};

const MAX_POINT_ROUNDS: usize = 20;
/// Class of items whose label is both a letter and a roman numeral.
const UNDECIDED: &str = "undecided";

pub fn itemize(tree: &mut Tree, leaf: NodeId, itemization: Itemization, toolkit: &Toolkit) -> Result<()> {
    match itemization {
        Itemization::Tabled => {
            nest_numbered_paragraphs(tree, leaf, toolkit);
            unfold_pseudo_tables(tree, leaf, toolkit);
            wrap_list_items(tree, leaf, toolkit)?;
            cleanse_leaf(tree, leaf);
        }
        Itemization::Flat => {
            convert_point_items(tree, leaf)?;
            unfold_pseudo_tables(tree, leaf, toolkit);
            aggregate_items(tree, leaf, toolkit)?;
            nest_items(tree, leaf)?;
        }
    }
    Ok(())
}

fn list_tag(class: &str) -> &'static str {
    if class == ItemTag::Dash.as_str() { "ul" } else { "ol" }
}

/// `1. text` paragraphs open an item that collects all following siblings.
fn nest_numbered_paragraphs(tree: &mut Tree, leaf: NodeId, toolkit: &Toolkit) {
    let mut current = None;
    for child in tree.children(leaf).to_vec() {
        if tree.is(child, "p") {
            let text = tree.text(child).to_string();
            if let Some(label) = toolkit.items.matched(ItemTag::Nump, &text) {
                let item = tree.create_with(
                    "li",
                    &[("data-title", label.trim()), ("class", ItemTag::Nump.as_str())],
                    "",
                );
                tree.add_previous(child, item);
                tree.set_text(child, &text[label.len()..]);
                current = Some(item);
            }
        }
        if let Some(item) = current {
            tree.append(item, child);
        }
    }
}

fn first_cell(tree: &Tree, row: NodeId) -> Option<NodeId> {
    tree.children(row).iter().copied().find(|&cell| tree.is(cell, "td"))
}

/// Label/content tables become list items or ordered lists.
pub fn unfold_pseudo_tables(tree: &mut Tree, leaf: NodeId, toolkit: &Toolkit) {
    let pseudo = |tree: &Tree, node: NodeId| tree.is(node, "table") && tree.class(node) != Some("table");
    for table in tree.find_all(leaf, pseudo) {
        let handler = HtmlTable::new(tree, table);
        if handler.count_columns(tree) > 0 && handler.is_column_empty(tree, 0) {
            handler.remove_column(tree, 0);
        }
    }
    let mut single_items = Vec::new();
    for table in tree.find_all(leaf, pseudo) {
        let handler = HtmlTable::new(tree, table);
        if handler.count_columns(tree) == 2 {
            if handler.count_rows(tree) == 1 {
                let labelled = handler
                    .rows(tree)
                    .first()
                    .and_then(|&row| first_cell(tree, row))
                    .is_some_and(|cell| toolkit.items.label(&tree.textify(cell, false, true)).is_some());
                if labelled {
                    single_items.push(handler);
                }
            } else {
                convert_to_ordered_list(tree, &handler, toolkit);
            }
        } else if handler.is_equation_array(tree) {
            handler.convert_to_unnumbered_list(tree, ListWise::Row);
            tree.set(table, "class", "equation_array");
        }
    }
    tree.concatenate_siblings(leaf, "ul", Some("equation_array"));
    tree.concatenate_siblings(leaf, "ol", Some(ItemTag::Numbr.as_str()));
    for handler in single_items {
        handler.convert_pseudo_table_to_list_item(tree);
    }
}

/// Converts the table if all labels of its first column share one tag.
fn convert_to_ordered_list(tree: &mut Tree, handler: &HtmlTable, toolkit: &Toolkit) {
    let rows = handler.rows(tree);
    let labels: Vec<String> = rows
        .iter()
        .filter_map(|&row| first_cell(tree, row))
        .map(|cell| tree.textify(cell, false, true))
        .collect();
    let label_refs: Vec<&str> = labels.iter().map(String::as_str).collect();
    let tags: BTreeSet<ItemTag> = toolkit
        .items
        .tag_sequence(&label_refs)
        .into_iter()
        .flat_map(|proposal| proposal.tags)
        .collect();
    let tags: Vec<ItemTag> = tags.into_iter().collect();
    let &[tag] = tags.as_slice() else {
        return;
    };
    for &row in &rows {
        if let Some(cell) = first_cell(tree, row) {
            tree.remove(cell, false);
        }
    }
    handler.convert_to_unnumbered_list(tree, ListWise::Row);
    if !tree.is(handler.table, "ul") {
        return;
    }
    tree.set_tag(handler.table, "ol");
    tree.set(handler.table, "class", tag.as_str());
    for (item, label) in tree.children_by_tag(handler.table, "li").into_iter().zip(labels) {
        tree.set(item, "data-title", label);
    }
}

fn item_tag(tree: &Tree, item: NodeId, toolkit: &Toolkit) -> Result<ItemTag> {
    if let Some(tag) = tree.class(item).and_then(ItemTag::parse) {
        return Ok(tag);
    }
    let title = tree
        .get(item, "data-title")
        .ok_or_else(|| TransformError::malformed("li", "missing data-title"))?;
    toolkit
        .items
        .tag(title)
        .single()
        .ok_or_else(|| TransformError::malformed("li", format!("no item tag for {title:?}")))
}

/// Wraps runs of loose list items into `ol`/`ul` elements.
fn wrap_list_items(tree: &mut Tree, leaf: NodeId, toolkit: &Toolkit) -> Result<()> {
    let mut current = None;
    for child in tree.children(leaf).to_vec() {
        if tree.is(child, "li")
            && let Some(title) = tree.get(child, "data-title")
        {
            if !toolkit.items.tag(title).tags.is_empty() {
                current = Some(child);
            }
        } else if let Some(item) = current {
            tree.append(item, child);
        }
    }
    let first_items = tree.find_all(leaf, |tree, node| {
        tree.is(node, "li")
            && !tree
                .parent(node)
                .is_some_and(|parent| tree.is(parent, "ol") || tree.is(parent, "ul"))
            && !tree
                .previous_sibling(node)
                .is_some_and(|previous| tree.is(previous, "li"))
    });
    for item in first_items {
        let tag = item_tag(tree, item, toolkit)?;
        let list = tree.create_with(list_tag(tag.as_str()), &[("class", tag.as_str())], "");
        tree.add_previous(item, list);
        let siblings = tree.following_siblings(item);
        tree.append(list, item);
        for sibling in siblings {
            if !tree.is(sibling, "li") {
                break;
            }
            tree.append(list, sibling);
        }
    }
    Ok(())
}

fn cleanse_leaf(tree: &mut Tree, leaf: NodeId) {
    for caption in tree.find_all(leaf, |tree, node| tree.matches(node, "p", Some("ti-tbl"))) {
        if let &[span] = tree.children(caption)
            && tree.is(span, "span")
        {
            tree.unfold(span);
            tree.set(caption, "class", "table-caption");
        }
    }
    for table in tree.find_tag(leaf, "table") {
        if !tree.is_descendant_of(table, leaf) {
            continue;
        }
        let handler = HtmlTable::new(tree, table);
        handler.convert_hidden_list_to_list(tree);
        if tree.is(table, "table") && handler.single_celled(tree) {
            handler.unfold(tree);
        }
    }
    for node in tree.find_all(leaf, |tree, node| tree.is(node, "li") || tree.is(node, "td")) {
        if is_blank(tree.text(node))
            && let Some(first) = tree.first_child(node)
            && tree.is(first, "p")
        {
            tree.unfold(first);
        }
    }
    let tabular = tree.find_all(leaf, |tree, node| {
        ["table", "col", "tr", "td"].contains(&tree.tag(node))
    });
    for node in tabular {
        let table = tree.is(node, "table");
        let kept: Vec<(String, String)> = tree
            .attrs(node)
            .iter()
            .filter(|(name, value)| {
                name == "width" || (name == "class" && table) || (name.ends_with("span") && value != "1")
            })
            .cloned()
            .collect();
        tree.clear_attrs(node);
        for (name, value) in kept {
            tree.set(node, &name, value);
        }
    }
    for (class, tag) in [("bold", "b"), ("italic", "i")] {
        for span in tree.find_all(leaf, |tree, node| tree.matches(node, "span", Some(class))) {
            tree.set_tag(span, tag);
            tree.pop(span, "class");
        }
    }
    for anchor in tree.find_tag(leaf, "a") {
        tree.pop(anchor, "class");
        if tree.get(anchor, "shape") == Some("rect") {
            tree.pop(anchor, "shape");
        }
        let Some(&label) = tree
            .children(anchor)
            .iter()
            .find(|&&child| tree.matches(child, "span", Some("super")))
        else {
            continue;
        };
        tree.unfold(label);
        let text = tree.take_text(anchor);
        let sup = tree.create_with("sup", &[], &text);
        tree.insert(anchor, 0, sup);
    }
}

/// Nests the `p.li PointN` paragraphs of proposals, deepest level first.
fn convert_point_items(tree: &mut Tree, leaf: NodeId) -> Result<()> {
    'depth: for depth in (0..=5).rev() {
        let class = format!("li Point{depth}");
        for _ in 0..MAX_POINT_ROUNDS {
            let Some(first) = tree.find(leaf, |tree, node| tree.matches(node, "p", Some(class.as_str()))) else {
                continue 'depth;
            };
            let list = nest_point_run(tree, first)?;
            if let Some(previous) = tree.previous_sibling(list)
                && tree.is(previous, "p")
                && tree.class(previous).is_some_and(|class| class.starts_with("li Point"))
            {
                tree.cut_append(previous, list);
            }
        }
        return Err(TransformError::malformed(
            "p",
            format!("more than {MAX_POINT_ROUNDS} runs of {class:?}"),
        ));
    }
    Ok(())
}

fn nest_point_run(tree: &mut Tree, leader: NodeId) -> Result<NodeId> {
    let class = tree.class(leader).unwrap_or_default().to_string();
    let mut run = vec![leader];
    for sibling in tree.following_siblings(leader) {
        if tree.tag(sibling) != tree.tag(leader) || tree.class(sibling) != Some(class.as_str()) {
            break;
        }
        run.push(sibling);
    }
    let list = tree.create("ol");
    tree.add_previous(leader, list);
    for paragraph in run {
        let number = tree
            .children(paragraph)
            .iter()
            .copied()
            .find(|&child| tree.matches(child, "span", Some("num")))
            .ok_or_else(|| TransformError::malformed("p", format!("{class:?} without span.num")))?;
        let title = tree.text(number).trim().to_string();
        tree.set(paragraph, "data-title", title);
        tree.pop(paragraph, "class");
        tree.set_tag(paragraph, "li");
        tree.remove(number, true);
        tree.append(list, paragraph);
    }
    Ok(list)
}

fn classify(label: &str, toolkit: &Toolkit) -> Result<&'static str> {
    let proposal = toolkit.items.propose(label);
    if let Some(tag) = proposal.single() {
        return Ok(tag.as_str());
    }
    if proposal.tags == BTreeSet::from([ItemTag::Alpha, ItemTag::Roman]) {
        return Ok(UNDECIDED);
    }
    toolkit
        .items
        .tag(label)
        .single()
        .map(ItemTag::as_str)
        .ok_or_else(|| TransformError::malformed("p", format!("no item tag for {label:?}")))
}

/// Labelled paragraphs become items; following siblings join the active item.
fn aggregate_items(tree: &mut Tree, leaf: NodeId, toolkit: &Toolkit) -> Result<()> {
    if leaf_id(tree, leaf).starts_with("ANX_") {
        return Ok(());
    }
    let mut active = None;
    for child in tree.children(leaf).to_vec() {
        if tree.is(child, "p") {
            let line = tree.textify(child, false, false);
            if let Some(label) = toolkit.items.label(line.trim_start()) {
                let class = classify(label, toolkit)?;
                tree.set_tag(child, "li");
                tree.set(child, "data-title", label);
                tree.set(child, "class", class);
                active = Some(child);
                continue;
            }
        }
        if let Some(item) = active {
            tree.append(item, child);
        }
    }
    for item in tree.children_by_tag(leaf, "li") {
        if tree.class(item) != Some(UNDECIDED) {
            continue;
        }
        let class = match tree.get(item, "data-title").unwrap_or_default() {
            "(i)" | "i)" => {
                let followed_by_ii = tree
                    .next_sibling(item)
                    .and_then(|next| tree.get(next, "data-title"))
                    .is_some_and(|title| matches!(title, "(ii)" | "ii)"));
                let tag = if followed_by_ii { ItemTag::Roman } else { ItemTag::Alpha };
                tag.as_str().to_string()
            }
            "(v)" | "(x)" | "v)" | "x)" => tree
                .previous_sibling(item)
                .filter(|&previous| tree.is(previous, "li"))
                .and_then(|previous| tree.class(previous))
                .ok_or_else(|| TransformError::malformed("li", "no preceding item"))?
                .to_string(),
            _ => continue,
        };
        tree.set(item, "class", class);
    }
    Ok(())
}

/// Stack based nesting of the leaf's items by their classes.
fn nest_items(tree: &mut Tree, leaf: NodeId) -> Result<()> {
    let items = tree.children_by_tag(leaf, "li");
    let Some(&first) = items.first() else {
        return Ok(());
    };
    let class_of = |tree: &Tree, item: NodeId| {
        tree.class(item)
            .map(str::to_string)
            .ok_or_else(|| TransformError::malformed("li", "item without class"))
    };
    let first_class = class_of(tree, first)?;
    let root = tree.create_with(list_tag(&first_class), &[("class", first_class.as_str())], "");
    tree.add_previous(first, root);
    let mut stack: Vec<(NodeId, String)> = vec![(root, first_class)];
    for item in items {
        let class = class_of(tree, item)?;
        if let Some(level) = stack.iter().position(|(_, open)| *open == class) {
            stack.truncate(level + 1);
        } else {
            let (list, _) = stack[stack.len() - 1];
            let host = tree
                .last_child(list)
                .ok_or_else(|| TransformError::malformed("ol", "nested list without parent item"))?;
            let nested = tree.create_with(list_tag(&class), &[("class", class.as_str())], "");
            tree.append(host, nested);
            stack.push((nested, class));
        }
        let (list, _) = stack[stack.len() - 1];
        tree.append(list, item);
    }
    for item in tree.find_all(leaf, |tree, node| tree.is(node, "li") && tree.get(node, "data-title").is_some()) {
        let title = tree.get(item, "data-title").unwrap_or_default().to_string();
        let text = tree.text(item).replacen(&title, "", 1);
        tree.set_text(item, text);
        tree.pop(item, "class");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DEFAULT_DOMAIN, Language};
    use crate::tree::parse_xml;

    fn toolkit() -> Toolkit {
        Toolkit::new(Language::En, DEFAULT_DOMAIN).unwrap()
    }

    fn flat(markup: &str) -> (Tree, Result<()>) {
        let mut tree = parse_xml(markup.as_bytes()).unwrap();
        let root = tree.root();
        let result = itemize(&mut tree, root, Itemization::Flat, &toolkit());
        (tree, result)
    }

    #[test]
    fn flat_items_nest_by_label_kind() {
        let (tree, result) = flat(
            r#"<article id="ART_1"><div class="lxp-heading"></div><p>(1) One</p><p>(2) Two</p><p>(a) Alpha</p><p>(b) Beta</p><p>(3) Three</p></article>"#,
        );
        result.unwrap();
        let root = tree.root();
        assert_eq!(
            tree.to_html(root),
            concat!(
                r#"<article id="ART_1"><div class="lxp-heading"></div><ol class="numbr">"#,
                r#"<li data-title="(1)"> One</li><li data-title="(2)"> Two<ol class="alpha">"#,
                r#"<li data-title="(a)"> Alpha</li><li data-title="(b)"> Beta</li></ol></li>"#,
                r#"<li data-title="(3)"> Three</li></ol></article>"#
            )
        );
    }

    #[test]
    fn letter_i_is_told_apart_from_roman_one() {
        let (tree, result) = flat(r#"<article id="ART_1"><p>(h) x</p><p>(i) y</p><p>(j) z</p></article>"#);
        result.unwrap();
        let root = tree.root();
        let lists = tree.find_tag(root, "ol");
        assert_eq!(lists.len(), 1);
        assert_eq!(tree.class(lists[0]), Some("alpha"));
        assert_eq!(tree.children(lists[0]).len(), 3);

        let (tree, result) = flat(r#"<article id="ART_1"><p>(a) x</p><p>(i) y</p><p>(ii) z</p></article>"#);
        result.unwrap();
        let root = tree.root();
        let classes: Vec<Option<&str>> = tree
            .find_tag(root, "ol")
            .into_iter()
            .map(|list| tree.class(list))
            .collect();
        assert_eq!(classes, vec![Some("alpha"), Some("roman")]);
    }

    #[test]
    fn lone_five_without_predecessor_fails() {
        let (_, result) = flat(r#"<article id="ART_5"><p>(v) first</p></article>"#);
        assert!(matches!(result, Err(TransformError::Malformed { .. })));
    }

    #[test]
    fn annexes_are_not_aggregated() {
        let (tree, result) = flat(r#"<article id="ANX_I"><p>(a) x</p></article>"#);
        result.unwrap();
        let root = tree.root();
        assert!(tree.find_tag(root, "li").is_empty());
    }

    #[test]
    fn point_paragraphs_nest_deepest_first() {
        let (tree, result) = flat(
            r#"<article id="ART_2"><p class="li Point0"><span class="num">(a)</span>first</p><p class="li Point0"><span class="num">(b)</span>second</p><p class="li Point1"><span class="num">(i)</span>sub</p></article>"#,
        );
        result.unwrap();
        let root = tree.root();
        assert_eq!(
            tree.to_html(root),
            r#"<article id="ART_2"><ol><li data-title="(a)">first</li><li data-title="(b)">second<ol><li data-title="(i)">sub</li></ol></li></ol></article>"#
        );
    }

    #[test]
    fn tabled_items_from_paragraphs_and_tables() {
        let mut tree = parse_xml(
            "<article id=\"ART_1\"><div class=\"lxp-heading\"></div><p>1.\u{a0}Member States shall:</p><table><tr><td><p>(a)</p></td><td><p>first;</p></td></tr></table><table><tr><td><p>(b)</p></td><td><p>second.</p></td></tr></table><p>2.\u{a0}Other.</p></article>"
                .as_bytes(),
        )
        .unwrap();
        let root = tree.root();
        itemize(&mut tree, root, Itemization::Tabled, &toolkit()).unwrap();
        let outer = tree.child_by_tag(root, "ol").unwrap();
        assert_eq!(tree.class(outer), Some("nump"));
        let items = tree.children_by_tag(outer, "li");
        assert_eq!(items.len(), 2);
        assert_eq!(tree.get(items[0], "data-title"), Some("1."));
        let inner = tree.find_tag(items[0], "ol");
        assert_eq!(inner.len(), 1);
        assert_eq!(tree.class(inner[0]), Some("alpha"));
        let titles: Vec<&str> = tree
            .children_by_tag(inner[0], "li")
            .into_iter()
            .filter_map(|item| tree.get(item, "data-title"))
            .collect();
        assert_eq!(titles, vec!["(a)", "(b)"]);
        assert!(tree.find_tag(root, "table").is_empty());
    }

    #[test]
    fn label_tables_become_ordered_lists() {
        let mut tree = parse_xml(
            br#"<article id="ART_1"><table><tr><td>(1)</td><td>one</td></tr><tr><td>(2)</td><td>two</td></tr></table></article>"#,
        )
        .unwrap();
        let root = tree.root();
        unfold_pseudo_tables(&mut tree, root, &toolkit());
        assert_eq!(
            tree.to_html(root),
            r#"<article id="ART_1"><ol class="numbr"><li data-title="(1)">one</li><li data-title="(2)">two</li></ol></article>"#
        );
    }
}
