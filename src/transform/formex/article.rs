//! Transformation of a single Formex leaf into an HTML article.

use tracing::debug;

use super::formula::formex_to_latex;
use super::list::{ITEM_LABEL_CLASS, paragraph_sequences_to_lists, transform_lists};
use super::quote::pack_quoted_contents;
use super::skeleton::{ContentsBuilder, GENERIC_LEAF_PREFIX};
use super::table::transform_tables;
use crate::error::Result;
use crate::transform::Toolkit;
use crate::transform::article::{FINAL_ID, PREAMBLE_ID, finalize, footer, leaf_id};
use crate::transform::document::MESA_ARTICLE_CLASS;
use crate::transform::skeleton::{CONTAINER_CLASS, HEADING_CLASS, ORDINATE_CLASS, SUB_CONTAINER_CLASS};
use crate::tree::{NodeId, Tree, is_blank};

pub const QUOTE_BLOCK_CLASS: &str = "lxp-quote-block";
pub const MESA_CONTAINER_CLASS: &str = "lxp-mesa-container";
pub const SUB_ARTICLE_CLASS: &str = "lxp-sub-article";
pub const FINAL_CLASS: &str = "lxp-final";
pub const FOOTNOTE_CLASS: &str = "footnote";
const STRUCTURE_TAGS: &[&str] = &["DIVISION", "ARTICLE", "ANNEX"];

/// Runs all leaf level steps on an `article` produced by the skeleton.
pub fn transform_leaf(tree: &mut Tree, leaf: NodeId, toolkit: &Toolkit) -> Result<()> {
    let id = leaf_id(tree, leaf);
    debug!(leaf = %id, "transforming leaf");
    mesa_content(tree, leaf, toolkit)?;
    sub_leaf_titles(tree, leaf);
    transform_lists(tree, leaf);
    pack_quoted_contents(tree, leaf);
    match id.as_str() {
        PREAMBLE_ID => preamble_processing(tree, leaf),
        FINAL_ID => final_processing(tree, leaf),
        _ => {}
    }
    paragraph_sequences_to_lists(tree, leaf)?;
    for formula in tree.find_all(leaf, |tree, node| tree.is(node, "FORMULA") || tree.is(node, "FORMULA.S")) {
        formex_to_latex(tree, formula);
    }
    transform_tables(tree, leaf)?;
    definition_lists(tree, leaf);
    handle_footnotes(tree, leaf, &id);
    resolve_substructure(tree, leaf, toolkit)?;
    post_processing(tree, leaf, &id);
    finalize(tree, leaf, toolkit);
    Ok(())
}

/// Builds the structure below `element` and transforms its leaves; the
/// classes of the converted nodes are replaced according to `classes`.
fn embedded_structure(
    tree: &mut Tree,
    element: NodeId,
    toolkit: &Toolkit,
    classes: (&str, &str),
) -> Result<()> {
    let (article_class, container_class) = classes;
    let node = ContentsBuilder::new(&toolkit.headings).build(tree, element, &[])?;
    for converted in node.level_order() {
        if tree.is(converted, "article") {
            transform_leaf(tree, converted, toolkit)?;
            tree.set(converted, "class", article_class);
        }
        if tree.matches(converted, "div", Some(CONTAINER_CLASS)) {
            tree.set(converted, "class", container_class);
        }
    }
    Ok(())
}

/// Quoted blocks; quoted articles and divisions are treated as documents of
/// their own.
fn mesa_content(tree: &mut Tree, leaf: NodeId, toolkit: &Toolkit) -> Result<()> {
    for quote in tree.find_tag(leaf, "QUOT.S") {
        // nested blocks are handled by the embedded leaf
        if !tree.is(quote, "QUOT.S") {
            continue;
        }
        let markers = tree.find_all(quote, |tree, node| tree.is(node, "QUOT.START") || tree.is(node, "QUOT.END"));
        for marker in markers {
            tree.remove(marker, true);
        }
        tree.set_tag(quote, "div");
        tree.set(quote, "class", QUOTE_BLOCK_CLASS);
        tree.pop(quote, "LEVEL");
        let Some(first) = tree.first_child(quote) else {
            continue;
        };
        if STRUCTURE_TAGS.contains(&tree.tag(first)) {
            let embedded: Vec<NodeId> = tree
                .children(quote)
                .iter()
                .copied()
                .filter(|&child| STRUCTURE_TAGS.contains(&tree.tag(child)))
                .collect();
            for element in embedded {
                embedded_structure(tree, element, toolkit, (MESA_ARTICLE_CLASS, MESA_CONTAINER_CLASS))?;
            }
        } else if tree.is(first, "PARAG") {
            paragraph_sequences_to_lists(tree, quote)?;
        }
    }
    Ok(())
}

/// `TITLE[TI[NP]]` within a leaf becomes a heading whose level follows the
/// depth of its label, e.g. `1.2.` gives `h4`.
const DEEPEST_HEADING: usize = 6;

fn sub_leaf_titles(tree: &mut Tree, leaf: NodeId) {
    let titles = tree.find_all(leaf, |tree, node| {
        tree.is(node, "TITLE")
            && tree
                .children_by_tag(node, "TI")
                .into_iter()
                .any(|ti| tree.child_by_tag(ti, "NP").is_some())
    });
    for title in titles {
        for _ in 0..2 {
            if let Some(first) = tree.first_child(title) {
                tree.unfold(first);
            }
        }
        let Some(label) = tree.first_child(title).filter(|&first| tree.is(first, "NO.P")) else {
            continue;
        };
        tree.set_tag(label, "span");
        tree.set(label, "class", ITEM_LABEL_CLASS);
        if let Some(text) = tree.next_sibling(label) {
            tree.unfold(text);
        }
        let dots = tree.textify(label, false, false).matches('.').count();
        let level = (dots + 2).min(DEEPEST_HEADING);
        tree.set_tag(title, &format!("h{level}"));
    }
}

fn preamble_processing(tree: &mut Tree, leaf: NodeId) {
    let elements = tree.find_all(leaf, |tree, node| {
        matches!(tree.tag(node), "PREAMBLE.INIT" | "PREAMBLE.FINAL" | "GR.CONSID.INIT")
    });
    for element in elements {
        if tree.is(element, "GR.CONSID.INIT")
            && let Some(parent) = tree.parent(element)
            && tree.first_child(parent) == Some(element)
            && is_blank(tree.text(parent))
        {
            tree.add_previous(parent, element);
        }
        let id = tree.tag(element).to_lowercase();
        tree.set(element, "id", id);
        tree.set_tag(element, "p");
    }
}

fn final_processing(tree: &mut Tree, leaf: NodeId) {
    let elements = tree.find_all(leaf, |tree, node| {
        matches!(tree.tag(node), "SIGNATURE" | "SIGNATORY" | "PL.DATE")
    });
    for element in elements {
        let name = if tree.is(element, "SIGNATURE") { "id" } else { "class" };
        let value = tree.tag(element).to_lowercase();
        tree.set(element, name, value);
        tree.set_tag(element, "div");
    }
    tree.set(leaf, "class", FINAL_CLASS);
    let heading = tree.create_with("div", &[("class", HEADING_CLASS)], "");
    let ordinate = tree.create_with("h1", &[("class", ORDINATE_CLASS)], "Final");
    tree.append(heading, ordinate);
    tree.push(leaf, heading);
}

fn definition_lists(tree: &mut Tree, leaf: NodeId) {
    for list in tree.find_tag(leaf, "DLIST") {
        let separator = tree.pop(list, "SEPARATOR").unwrap_or_default();
        tree.pop(list, "TYPE");
        tree.set_tag(list, "ul");
        tree.set(list, "class", "definitions");
        for item in tree.children_by_tag(list, "DLIST.ITEM") {
            if let Some(prefix) = tree.first_child(item).filter(|&first| tree.is(first, "PREFIX")) {
                let title = tree.text(prefix).to_string();
                tree.set(item, "data-title", title);
                tree.remove(prefix, true);
            }
            tree.set_tag(item, "li");
            tree.set(item, "class", "definition");
            if let Some(term) = tree.child_by_tag(item, "TERM") {
                tree.set_tag(term, "span");
                tree.set(term, "class", "definition-term");
                let tail = format!(" {separator} {}", tree.tail(term));
                tree.set_tail(term, tail);
            }
            if let Some(body) = tree.child_by_tag(item, "DEFINITION") {
                tree.set_tag(body, "span");
                tree.set(body, "class", "definition-body");
            }
        }
    }
}

/// Replaces each `NOTE` by a numbered mark and moves its content into the
/// leaf's footer.
fn handle_footnotes(tree: &mut Tree, leaf: NodeId, id: &str) {
    for (index, note) in tree.find_tag(leaf, "NOTE").into_iter().enumerate() {
        let number = index + 1;
        let target = format!("{id}-note_{number}");
        tree.unfold_redundant_paragraphs(note, &["P"]);
        let text = tree.take_text(note);
        tree.set_text(note, format!(" {}", text.trim_start()));
        let href = format!("#{target}");
        let caption = format!("({number})");
        let mark = tree.create("sup");
        let anchor = tree.create_with("a", &[("href", href.as_str())], &caption);
        tree.append(mark, anchor);
        tree.add_previous(note, mark);
        let label = tree.create_with("sup", &[], &caption);
        tree.push(note, label);
        let upper: Vec<String> = tree
            .attrs(note)
            .iter()
            .filter(|(name, _)| name.chars().any(char::is_uppercase))
            .map(|(name, _)| name.clone())
            .collect();
        for name in upper {
            tree.pop(note, &name);
        }
        tree.set(note, "id", target);
        tree.set(note, "class", FOOTNOTE_CLASS);
        tree.set_tag(note, "p");
        tree.remove(note, true);
        let footer = footer(tree, leaf);
        tree.append(footer, note);
    }
}

/// Divisions and articles nested in a leaf become sub containers and sub
/// articles.
fn resolve_substructure(tree: &mut Tree, leaf: NodeId, toolkit: &Toolkit) -> Result<()> {
    let nested = |tree: &Tree| tree.find(leaf, |tree, node| tree.is(node, "DIVISION") || tree.is(node, "ARTICLE"));
    while let Some(element) = nested(tree) {
        embedded_structure(tree, element, toolkit, (SUB_ARTICLE_CLASS, SUB_CONTAINER_CLASS))?;
    }
    Ok(())
}

fn annex_handling(tree: &mut Tree, leaf: NodeId) {
    for instance in tree.children_by_tag(leaf, "BIB.INSTANCE") {
        tree.remove(instance, true);
    }
    let headings: Vec<NodeId> = tree
        .children(leaf)
        .iter()
        .copied()
        .filter(|&child| tree.matches(child, "div", Some(HEADING_CLASS)))
        .flat_map(|heading| tree.children(heading).to_vec())
        .filter(|&part| tree.is(part, "h1") || tree.is(part, "h2"))
        .collect();
    for heading in headings {
        let mut wrappers = Vec::new();
        for child in tree.children(heading).to_vec() {
            match tree.tag(child) {
                "TI" => {
                    wrappers.push(child);
                    wrappers.extend(tree.children_by_tag(child, "P"));
                }
                "P" => wrappers.push(child),
                _ => {}
            }
        }
        for wrapper in wrappers {
            tree.unfold(wrapper);
        }
    }
    if let Some(contents) = tree.child_by_tag(leaf, "CONTENTS") {
        tree.unfold(contents);
    }
}

fn sub_divisions(tree: &mut Tree, leaf: NodeId) {
    for subdivision in tree.children_by_tag(leaf, "SUBDIV") {
        tree.set_tag(subdivision, "div");
        tree.set(subdivision, "class", "fmx-subdiv");
        if let Some(title) = tree.first_child(subdivision).filter(|&first| tree.is(first, "TITLE")) {
            tree.unfold_redundant_paragraphs(title, &["TI", "P"]);
            tree.set_tag(title, "h3");
        }
    }
}

fn post_processing(tree: &mut Tree, leaf: NodeId, id: &str) {
    for alinea in tree.find_tag(leaf, "ALINEA") {
        let leading = tree.first_child(alinea).filter(|&first| tree.is(first, "P"));
        if let Some(paragraph) = leading
            && is_blank(tree.text(alinea))
        {
            tree.unfold(paragraph);
        }
        tree.set_tag(alinea, "p");
    }
    tree.set_tag(leaf, "article");
    for node in tree.iter(leaf) {
        tree.pop(node, "IDENTIFIER");
    }
    for date in tree.find_tag(leaf, "DATE") {
        let value = tree.pop(date, "ISO").unwrap_or_default();
        tree.set_tag(date, "span");
        tree.set(date, "data-value", value);
        tree.set(date, "data-type", "date");
    }
    let prefix = id.split('_').next().unwrap_or_default();
    if prefix == "ANX" || prefix == GENERIC_LEAF_PREFIX {
        annex_handling(tree, leaf);
    }
    sub_divisions(tree, leaf);
    for paragraph in tree.find_tag(leaf, "P") {
        tree.set_tag(paragraph, "p");
    }
    let numbers = tree.find_all(leaf, |tree, node| {
        tree.is(node, "FT") && matches!(tree.get(node, "TYPE"), Some("NUMBER" | "DECIMAL"))
    });
    for number in numbers {
        let kind = tree.pop(number, "TYPE").unwrap_or_default().to_lowercase();
        tree.set_tag(number, "span");
        tree.set(number, "class", kind);
    }
    let bold = tree.find_all(leaf, |tree, node| tree.is(node, "HT") && tree.get(node, "TYPE") == Some("BOLD"));
    for emphasis in bold {
        let in_heading = tree
            .parent(emphasis)
            .is_some_and(|parent| matches!(tree.tag(parent), "h1" | "h2" | "h3"));
        if in_heading {
            tree.unfold(emphasis);
        } else {
            tree.set_tag(emphasis, "b");
            tree.pop(emphasis, "TYPE");
        }
    }
    for title in tree.find_tag(leaf, "STI") {
        tree.set_tag(title, "h3");
        tree.unfold_redundant_paragraphs(title, &["p"]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DEFAULT_DOMAIN, Language};
    use crate::tree::parse_xml;

    fn toolkit() -> Toolkit {
        Toolkit::new(Language::En, DEFAULT_DOMAIN).unwrap()
    }

    #[test]
    fn sub_titles_are_ranked_by_their_label() {
        let mut tree = parse_xml(
            br#"<ARTICLE><TITLE><TI><NP><NO.P>1.2.</NO.P><TXT>Scope</TXT></NP></TI></TITLE><TITLE><TI><NP><NO.P>1.2.3.4.5.</NO.P><TXT>Detail</TXT></NP></TI></TITLE></ARTICLE>"#,
        )
        .unwrap();
        let root = tree.root();
        sub_leaf_titles(&mut tree, root);
        let tags: Vec<&str> = tree.children(root).iter().map(|&title| tree.tag(title)).collect();
        assert_eq!(tags, vec!["h4", "h6"]);
        let deep = tree.children(root)[1];
        assert!(tree.textify(deep, false, true).ends_with("Detail"));
    }

    fn leaf(markup: &str, id: &str) -> Tree {
        let mut tree = parse_xml(markup.as_bytes()).unwrap();
        let root = tree.root();
        tree.set_tag(root, "article");
        tree.set(root, "id", id);
        transform_leaf(&mut tree, root, &toolkit()).unwrap();
        tree
    }

    #[test]
    fn paragraphs_become_identified_items() {
        let tree = leaf(
            r#"<ARTICLE><PARAG IDENTIFIER="001.001"><NO.PARAG>1.</NO.PARAG><ALINEA>This Regulation applies from <DATE ISO="20180525">25 May 2018</DATE>.</ALINEA></PARAG><PARAG IDENTIFIER="001.002"><NO.PARAG>2.</NO.PARAG><ALINEA><P>It shall be <HT TYPE="BOLD">binding</HT>.</P></ALINEA></PARAG></ARTICLE>"#,
            "ART_99",
        );
        let root = tree.root();
        let items = tree.find_tag(root, "li");
        assert_eq!(items.len(), 2);
        assert_eq!(tree.get(items[0], "id"), Some("ART_99-1"));
        assert_eq!(tree.get(items[1], "id"), Some("ART_99-2"));
        let date = tree.find_tag(root, "span")[0];
        assert_eq!(tree.get(date, "data-value"), Some("20180525"));
        assert_eq!(tree.get(date, "data-type"), Some("date"));
        assert!(tree.find(root, |tree, node| tree.get(node, "IDENTIFIER").is_some()).is_none());
        assert_eq!(tree.find_tag(root, "b").len(), 1);
    }

    #[test]
    fn footnotes_move_to_the_footer() {
        let tree = leaf(
            r#"<ARTICLE><ALINEA>See Directive 95/46/EC<NOTE NOTE.ID="E0001" NUMBERING="ARAB"><P>OJ L 281, 23.11.1995, p. 31.</P></NOTE> for details.</ALINEA></ARTICLE>"#,
            "ART_94",
        );
        let root = tree.root();
        let note = tree.find(root, |tree, node| tree.matches(node, "p", Some(FOOTNOTE_CLASS))).unwrap();
        assert_eq!(tree.get(note, "id"), Some("ART_94-note_1"));
        assert_eq!(tree.get(note, "NOTE.ID"), None);
        assert_eq!(tree.textify(note, false, false), "(1) OJ L 281, 23.11.1995, p. 31.");
        let holder = tree.parent(note).unwrap();
        assert_eq!(tree.class(holder), Some("article-footer"));
        let mark = tree.find(root, |tree, node| tree.get(node, "href") == Some("#ART_94-note_1")).unwrap();
        assert_eq!(tree.text(mark), "(1)");
        let sup = tree.parent(mark).unwrap();
        assert_eq!(tree.tail(sup), " for details.");
    }

    #[test]
    fn quoted_articles_become_mesa_articles() {
        let tree = leaf(
            r#"<ARTICLE><ALINEA>The following Article is inserted:</ALINEA><QUOT.S LEVEL="1"><QUOT.START ID="q1" REF.END="q2"/><ARTICLE><TI.ART>Article 5a</TI.ART><STI.ART>Transitional provisions</STI.ART><ALINEA>Text.</ALINEA></ARTICLE><QUOT.END ID="q2" REF.START="q1"/></QUOT.S></ARTICLE>"#,
            "ART_2",
        );
        let root = tree.root();
        let block = tree.find(root, |tree, node| tree.matches(node, "div", Some(QUOTE_BLOCK_CLASS))).unwrap();
        assert_eq!(tree.get(block, "LEVEL"), None);
        let mesa = tree.find(block, |tree, node| tree.is(node, "article")).unwrap();
        assert_eq!(tree.class(mesa), Some(MESA_ARTICLE_CLASS));
        assert_eq!(tree.get(mesa, "id"), Some("ART_5a"));
        assert!(tree.find_tag(root, "QUOT.START").is_empty());
    }

    #[test]
    fn nested_articles_become_sub_articles() {
        let tree = leaf(
            concat!(
                "<ANNEX><CONTENTS><DIVISION><TITLE><TI><P>PART A</P></TI></TITLE>",
                "<ARTICLE><TI.ART>Article 1</TI.ART><ALINEA>Scope.</ALINEA></ARTICLE>",
                "</DIVISION></CONTENTS></ANNEX>"
            ),
            "ANX_I",
        );
        let root = tree.root();
        let container = tree.find(root, |tree, node| tree.matches(node, "div", Some(SUB_CONTAINER_CLASS))).unwrap();
        let article = tree.find(container, |tree, node| tree.is(node, "article")).unwrap();
        assert_eq!(tree.class(article), Some(SUB_ARTICLE_CLASS));
        assert!(tree.find_tag(root, "CONTENTS").is_empty());
    }

    #[test]
    fn preamble_and_final_parts() {
        let preamble = leaf(
            "<PREAMBLE><PREAMBLE.INIT>THE EUROPEAN PARLIAMENT,</PREAMBLE.INIT><GR.CONSID><GR.CONSID.INIT>Whereas:</GR.CONSID.INIT><CONSID><NP><NO.P>(1)</NO.P><TXT>One.</TXT></NP></CONSID></GR.CONSID></PREAMBLE>",
            PREAMBLE_ID,
        );
        let root = preamble.root();
        let init = preamble.find(root, |tree, node| tree.get(node, "id") == Some("gr.consid.init")).unwrap();
        assert_eq!(preamble.tag(init), "p");
        assert_eq!(preamble.parent(init), Some(root));
        assert!(preamble.find(root, |tree, node| tree.get(node, "id") == Some("preamble.init")).is_some());

        let last = leaf(
            "<FINAL><P>This Regulation shall be binding.</P><SIGNATURE><PL.DATE><P>Done at Brussels.</P></PL.DATE><SIGNATORY><P>The President</P></SIGNATORY></SIGNATURE></FINAL>",
            FINAL_ID,
        );
        let root = last.root();
        assert_eq!(last.class(root), Some(FINAL_CLASS));
        assert!(last.find(root, |tree, node| tree.matches(node, "div", Some("signatory"))).is_some());
        let ordinate = last.find(root, |tree, node| tree.matches(node, "h1", Some(ORDINATE_CLASS))).unwrap();
        assert_eq!(last.text(ordinate), "Final");
    }

    #[test]
    fn definition_lists_keep_separator() {
        let tree = leaf(
            r#"<ARTICLE><DLIST SEPARATOR=":" TYPE="FORM"><DLIST.ITEM><PREFIX>(a)</PREFIX><TERM>CCP</TERM><DEFINITION>central counterparty</DEFINITION></DLIST.ITEM></DLIST></ARTICLE>"#,
            "ART_3",
        );
        let root = tree.root();
        let term = tree.find(root, |tree, node| tree.matches(node, "span", Some("definition-term"))).unwrap();
        assert_eq!(tree.tail(term), " : ");
        let item = tree.parent(term).unwrap();
        assert_eq!(tree.get(item, "data-title"), Some("(a)"));
        assert_eq!(tree.get(item, "id"), Some("ART_3-a"));
    }
}
