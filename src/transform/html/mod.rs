//! Transformation of EUR-Lex HTML pages into the lexparency document model.

pub mod article;
pub mod dialect;
pub mod table;

use regex::Regex;
use tracing::{debug, info, warn};

use super::Toolkit;
use super::article::{LeafFailure, finalize, footer, reference_definitions, rollback_on};
use super::conductor::Dialect;
use super::definitions::TechnicalTerms;
use super::document::{leaves, make_final, make_preamble, make_toc_ids_unique};
use super::skeleton::{NodeMarker, TableOfContents};
use crate::error::{Result, TransformError};
use crate::metadata::ActMetaData;
use crate::tree::{NodeId, Tree};
use dialect::HeadingHints;

fn body(tree: &Tree) -> Result<NodeId> {
    let root = tree.root();
    tree.child_by_tag(root, "body")
        .ok_or_else(|| TransformError::MissingElement("body".to_string()))
}

/// Runs the full pipeline on a parsed page; returns the rolled back leaves.
pub fn transform(
    tree: &mut Tree,
    dialect: Dialect,
    toolkit: &Toolkit,
    metadata: &mut ActMetaData,
) -> Result<Vec<LeafFailure>> {
    let body = body(tree)?;
    if dialect != Dialect::Proposal {
        standardize_items(tree, body)?;
    }
    preprocess(tree, body, dialect, toolkit, metadata)?;
    skeletorize(tree, body, dialect, toolkit)?;
    let failures = split(tree, body, dialect, toolkit);

    let mut terms = TechnicalTerms::new(toolkit.language);
    for leaf in leaves(tree, body) {
        reference_definitions(tree, leaf, &mut terms)?;
    }
    debug!(terms = terms.len(), "definitions collected");
    for leaf in leaves(tree, body) {
        super::article::link(tree, leaf, toolkit);
    }
    for leaf in leaves(tree, body) {
        super::article::embed(tree, leaf);
    }
    make_toc_ids_unique(tree, body);
    make_final(tree, body, toolkit.language);
    if dialect.is_modern() {
        relocate_footnotes(tree, body);
    }
    info!(dialect = %dialect, failures = failures.len(), "html transformed");
    Ok(failures)
}

/// `a)` becomes `(a)` and `12.   ` becomes `(12)`.
fn standardize_items(tree: &mut Tree, body: NodeId) -> Result<()> {
    let bracketed = Regex::new(r"^([0-9]+|[a-z]|[ivx]+)\)")?;
    let numbered = Regex::new("^([1-9][0-9]+)\\.\u{a0}{3}")?;
    for node in tree.descendants(body) {
        let text = tree.text(node);
        if text.is_empty() {
            continue;
        }
        let mut standardized = if bracketed.is_match(text) {
            format!("({text}")
        } else {
            text.to_string()
        };
        if numbered.is_match(&standardized) {
            standardized = numbered.replace(&standardized, "($1)").into_owned();
        }
        tree.set_text(node, standardized);
    }
    Ok(())
}

fn preprocess(
    tree: &mut Tree,
    body: NodeId,
    dialect: Dialect,
    toolkit: &Toolkit,
    metadata: &mut ActMetaData,
) -> Result<()> {
    dialect.preprocess_before(tree, body, toolkit);
    let empty = tree.find_all(body, |tree, node| {
        tree.is(node, "p") && tree.text(node).is_empty() && tree.children(node).is_empty()
    });
    for paragraph in empty {
        tree.unfold(paragraph);
    }
    unfold_separated_leaves(tree, body);
    dialect.remove_contents_table(tree, body, toolkit)?;
    toolkit.quotations.markup(tree, body);
    dialect.preprocess_after(tree, body, toolkit, metadata);
    Ok(())
}

/// Annexes wrapped in divs between separators are flattened; their long
/// titles become leaf headings.
fn unfold_separated_leaves(tree: &mut Tree, body: NodeId) {
    let separators = tree.find_all(body, |tree, node| tree.matches(node, "hr", Some("separator")));
    for separator in separators {
        let neighbours = [tree.previous_sibling(separator), tree.next_sibling(separator)];
        for neighbour in neighbours.into_iter().flatten() {
            if !tree.is(neighbour, "div") || tree.class(neighbour) == Some("final") {
                continue;
            }
            let titles: Vec<NodeId> = tree
                .children(neighbour)
                .iter()
                .copied()
                .filter(|&child| tree.matches(child, "p", Some("long-title")))
                .collect();
            match titles.as_slice() {
                [ordinate] => tree.set(*ordinate, "class", "leaf-heading-ordinate"),
                [ordinate, title] => {
                    tree.set(*ordinate, "class", "leaf-heading-ordinate");
                    tree.set(*title, "class", "leaf-heading-title");
                }
                [] => {}
                _ => warn!(count = titles.len(), "suspiciously many header elements for an annex"),
            }
            tree.unfold(neighbour);
        }
        tree.remove(separator, true);
    }
}

fn skeletorize(tree: &mut Tree, body: NodeId, dialect: Dialect, toolkit: &Toolkit) -> Result<()> {
    let hints = HeadingHints::new(dialect)?;
    let marker = NodeMarker::new(&toolkit.headings, &hints);
    marker.mark_all(tree, body);
    let toc = TableOfContents::collect_from(tree, body);
    debug!(outline = ?toc.outline(tree), "skeleton collected");
    make_preamble(tree, body, toolkit.language.preamble_name())?;
    Ok(())
}

/// Itemizes every leaf under rollback; finalization always happens.
fn split(tree: &mut Tree, body: NodeId, dialect: Dialect, toolkit: &Toolkit) -> Vec<LeafFailure> {
    let itemization = dialect.itemization();
    let mut failures = Vec::new();
    for leaf in leaves(tree, body) {
        let failure = rollback_on(tree, leaf, |tree, leaf| {
            article::itemize(tree, leaf, itemization, toolkit)
        });
        failures.extend(failure);
        finalize(tree, leaf, toolkit);
    }
    failures
}

/// Moves footnote bodies into the footer of the leaf citing them.
fn relocate_footnotes(tree: &mut Tree, body: NodeId) {
    let footnotes = tree.find_all(body, |tree, node| {
        tree.matches(node, "p", Some("footnote")) && tree.child_by_tag(node, "a").is_some()
    });
    for footnote in footnotes {
        let Some(back_reference) = tree.find(footnote, |tree, node| {
            tree.is(node, "a") && tree.get(node, "href").is_some()
        }) else {
            continue;
        };
        let href = tree.get(back_reference, "href").unwrap_or_default().to_string();
        let target = href.strip_prefix('#').unwrap_or(&href);
        let Some(mark) = tree.find(body, |tree, node| tree.is(node, "a") && tree.get(node, "id") == Some(target))
        else {
            warn!(href = %href, "reference within footnote does not point anywhere");
            continue;
        };
        let Some(home) = tree.closest(mark, |tree, node| tree.is(node, "article") && tree.get(node, "id").is_some())
        else {
            warn!(href = %href, "footnote mark outside of any leaf");
            continue;
        };
        tree.unfold(back_reference);
        let label: String = tree
            .textify(mark, false, false)
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '(' && *c != ')')
            .collect();
        let id = format!("footnote:{label}");
        tree.set(footnote, "id", id.as_str());
        tree.set(mark, "href", format!("#{id}"));
        let footer = footer(tree, home);
        tree.append(footer, footnote);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DEFAULT_DOMAIN, Language};
    use crate::tree::{parse_html, parse_xml};
    use crate::transform::article::BODY_CLASS;
    use crate::transform::skeleton::HEADING_CLASS;

    fn toolkit() -> Toolkit {
        Toolkit::new(Language::En, DEFAULT_DOMAIN).unwrap()
    }

    fn leaf(tree: &Tree, id: &str) -> NodeId {
        let root = tree.root();
        tree.find(root, |tree, node| tree.is(node, "article") && tree.get(node, "id") == Some(id))
            .unwrap()
    }

    #[test]
    fn items_get_parentheses() {
        let mut tree = parse_xml("<body><p>a) one</p><p>12.\u{a0}\u{a0}\u{a0}two</p><p>(b) three</p></body>".as_bytes())
            .unwrap();
        let body = tree.root();
        standardize_items(&mut tree, body).unwrap();
        let texts: Vec<&str> = tree.children(body).iter().map(|&p| tree.text(p)).collect();
        assert_eq!(texts, vec!["(a) one", "(12)two", "(b) three"]);
    }

    #[test]
    fn separated_annexes_are_flattened() {
        let mut tree = parse_xml(
            br#"<body><p>x</p><hr class="separator"/><div><p class="long-title">ANNEX I</p><p class="long-title">List</p><p>y</p></div></body>"#,
        )
        .unwrap();
        let body = tree.root();
        unfold_separated_leaves(&mut tree, body);
        assert_eq!(
            tree.to_html(body),
            r#"<body><p>x</p><p class="leaf-heading-ordinate">ANNEX I</p><p class="leaf-heading-title">List</p><p>y</p></body>"#
        );
    }

    #[test]
    fn failing_leaf_is_isolated() {
        let page = r#"<html><body>
<p class="title-doc-first">REGULATION (EU) 2099/1</p>
<p class="norm">Whereas:</p>
<p class="title-article-norm">Article 4</p>
<p class="stitle-article-norm">Scope</p>
<p class="norm">(a) first</p>
<p class="norm">(b) second</p>
<p class="title-article-norm">Article 5</p>
<p class="stitle-article-norm">Exceptions</p>
<p class="norm">(v) orphan</p>
<p class="title-article-norm">Article 6</p>
<p class="stitle-article-norm">Miscellaneous</p>
<p class="norm">(a) only</p>
</body></html>"#;
        let mut tree = parse_html(page.as_bytes()).unwrap();
        let mut metadata = ActMetaData::new(DEFAULT_DOMAIN, "32099R0001");
        let failures = transform(&mut tree, Dialect::ModernConsolidated, &toolkit(), &mut metadata).unwrap();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].leaf, "ART_5");

        for (id, items) in [("ART_4", vec!["ART_4-a", "ART_4-b"]), ("ART_6", vec!["ART_6-a"])] {
            let article = leaf(&tree, id);
            assert_eq!(tree.find_tag(article, "ol").len(), 1, "{id} itemized");
            let ids: Vec<&str> = tree
                .find_tag(article, "li")
                .into_iter()
                .filter_map(|item| tree.get(item, "id"))
                .collect();
            assert_eq!(ids, items);
        }
        let broken = leaf(&tree, "ART_5");
        assert!(tree.find_tag(broken, "ol").is_empty());
        assert!(tree.find_tag(broken, "li").is_empty());
        let stub_body = tree
            .children(broken)
            .iter()
            .copied()
            .find(|&child| tree.matches(child, "div", Some(BODY_CLASS)));
        assert!(stub_body.is_some(), "rolled back leaf keeps its body");
        assert!(tree.find(broken, |tree, node| tree.has_class(node, HEADING_CLASS)).is_some());
        assert!(tree.textify(broken, false, true).contains("(v) orphan"));
        let preamble = leaf(&tree, "PRE");
        assert!(tree.textify(preamble, false, true).contains("Whereas:"));
    }

    #[test]
    fn footnotes_move_to_the_citing_leaf() {
        let mut tree = parse_xml(
            br##"<body><article class="lxp-article" id="ART_1"><div class="lxp-body"><p>Text<a id="ntc1" href="#ntr1">(1)</a></p></div></article><article id="FIN"><div class="lxp-body"><p class="footnote"><a id="ntr1" href="#ntc1">(1)</a> OJ L 1.</p></div></article></body>"##,
        )
        .unwrap();
        let body = tree.root();
        relocate_footnotes(&mut tree, body);
        let article = leaf(&tree, "ART_1");
        let note = tree
            .find(article, |tree, node| tree.matches(node, "p", Some("footnote")))
            .unwrap();
        assert_eq!(tree.get(note, "id"), Some("footnote:1"));
        assert_eq!(tree.text(note), "(1) OJ L 1.");
        let holder = tree.parent(note).unwrap();
        assert_eq!(tree.class(holder), Some("article-footer"));
        let mark = tree.find(article, |tree, node| tree.get(node, "id") == Some("ntc1")).unwrap();
        assert_eq!(tree.get(mark, "href"), Some("#footnote:1"));
    }
}
