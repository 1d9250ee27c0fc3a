//! Dialect strategies of the HTML transformation: class vocabularies,
//! preprocessing, contents-table removal and heading hints.

use regex::Regex;
use tracing::warn;

use crate::error::{Result, TransformError};
use crate::metadata::{ActMetaData, href_to_celex, url_from_celex};
use crate::transform::Toolkit;
use crate::transform::conductor::Dialect;
use crate::transform::coordinates::Role;
use crate::transform::skeleton::HeadingRules;
use crate::tree::{NodeId, Tree, is_blank};

const MODERN_ORIGINAL_CLASSES: &[(&str, &str)] = &[
    ("doc-sep", "separator"),
    ("note", "footnote"),
    ("ti-section-1", "container-heading-ordinate"),
    ("ti-section-2", "container-heading-title"),
    ("ti-art", "leaf-heading-ordinate"),
    ("sti-art", "leaf-heading-title"),
    ("ti-grseq-1", "leaf-heading-title"),
    ("doc-ti", "long-title"),
];

const MODERN_CONSOLIDATED_CLASSES: &[(&str, &str)] = &[
    ("norm", "normal"),
    ("subscript", "sub"),
    ("borderOj", "table"),
    ("title-annex-1", "leaf-heading-ordinate"),
    ("title-annex-2", "leaf-heading-title"),
    ("superscript", "super"),
    ("separator-short", "separator"),
    ("title-division-1", "container-heading-ordinate"),
    ("title-division-2", "container-heading-title"),
    ("title-article-norm", "leaf-heading-ordinate"),
    ("stitle-article-norm", "leaf-heading-title"),
    ("title-doc-first", "long-title"),
];

const MARKER_START: char = '\u{25ba}';
const MARKER_END: char = '\u{25c4}';
const FOLDED_ARROW: char = '\u{25bc}';

/// How list items are laid out in the raw leaves.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Itemization {
    /// Numbered paragraphs and label/content tables.
    Tabled,
    /// Label-prefixed paragraphs.
    Flat,
}

impl Dialect {
    pub fn itemization(self) -> Itemization {
        match self {
            Self::ModernOriginal => Itemization::Tabled,
            _ => Itemization::Flat,
        }
    }

    /// Dialects whose footnotes are linked back from the footnote body.
    pub fn is_modern(self) -> bool {
        matches!(
            self,
            Self::ModernOriginal | Self::ModernConsolidated | Self::Proposal
        )
    }

    fn class_map(self) -> &'static [(&'static str, &'static str)] {
        match self {
            Self::ModernConsolidated => MODERN_CONSOLIDATED_CLASSES,
            Self::ModernOriginal | Self::Proposal => MODERN_ORIGINAL_CLASSES,
            _ => &[],
        }
    }

    /// Steps before the common preprocessing.
    pub fn preprocess_before(self, tree: &mut Tree, body: NodeId, toolkit: &Toolkit) {
        match self {
            Self::OldConsolidated => {
                for paragraph in tree.find_all(body, |tree, node| tree.is(node, "p")) {
                    tree.pop(paragraph, "style");
                }
            }
            Self::ModernConsolidated => consolidated_markers(tree, body, toolkit),
            Self::Proposal => proposal_structure(tree, body),
            _ => {}
        }
        let classes = self.class_map();
        if !classes.is_empty() {
            tree.migrate_attribute(body, "class", classes);
        }
    }

    /// Steps after the common preprocessing.
    pub fn preprocess_after(
        self,
        tree: &mut Tree,
        body: NodeId,
        toolkit: &Toolkit,
        metadata: &mut ActMetaData,
    ) {
        match self {
            Self::OldOriginal | Self::OldConsolidated => {
                let wrappers = tree.find_all(body, |tree, node| {
                    (tree.is(node, "p") && !tree.find_tag(node, "p").iter().all(|&p| p == node))
                        || (tree.is(node, "div") && tree.get(node, "id") == Some("TexteOnly"))
                        || tree.is(node, "txt_te")
                });
                for wrapper in wrappers {
                    tree.unfold(wrapper);
                }
                // The first h1 only carries the celex number.
                if let Some(celex) = tree.find_tag(body, "h1").first() {
                    tree.unfold(*celex);
                }
            }
            Self::ModernConsolidated => {
                extract_changers(tree, body, toolkit, metadata);
                unwrap_preamble(tree, body);
                let title_toc = tree.find(body, |tree, node| tree.matches(node, "p", Some("title-toc")));
                if let Some(table) =
                    title_toc.and_then(|p| tree.closest(p, |tree, ancestor| tree.is(ancestor, "table")))
                {
                    tree.remove(table, true);
                }
            }
            _ => {}
        }
    }

    /// Drops the contents table EUR-Lex ships with some documents.
    pub fn remove_contents_table(self, tree: &mut Tree, body: NodeId, toolkit: &Toolkit) -> Result<()> {
        match self {
            Self::OldOriginal | Self::OldConsolidated => remove_old_contents_table(tree, body, toolkit),
            Self::Formex => Ok(()),
            _ => {
                let Some(head) = tree.find(body, |tree, node| tree.matches(node, "p", Some("ti-tbl"))) else {
                    return Ok(());
                };
                let text = tree.textify(head, false, true);
                if !toolkit.language.toc_heads().contains(&text.as_str()) {
                    return Ok(());
                }
                for sibling in tree.following_siblings(head) {
                    if !tree.is(sibling, "table") {
                        break;
                    }
                    tree.remove(sibling, false);
                }
                tree.remove(head, false);
                Ok(())
            }
        }
    }
}

fn remove_old_contents_table(tree: &mut Tree, body: NodeId, toolkit: &Toolkit) -> Result<()> {
    let heads = toolkit.language.toc_heads();
    let Some(head) = tree.find(body, |tree, node| {
        tree.is(node, "p") && heads.contains(&tree.text(node).trim())
    }) else {
        return Ok(());
    };
    let unsupported = || TransformError::UnsupportedLayout("contents table of an old-style document".to_string());
    let neighbour = tree.next_sibling(head).ok_or_else(unsupported)?;
    let marker = tree.text(neighbour).to_string();
    match marker.as_str() {
        ">TABLE>" => {
            tree.remove(neighbour, false);
            tree.remove(head, false);
            Ok(())
        }
        "Page" => {
            let entry = Regex::new(r" \. [0-9]+$")?;
            let mut removables = vec![head, neighbour];
            for candidate in tree.following_siblings(neighbour) {
                if !tree.is(candidate, "p") {
                    continue;
                }
                if entry.is_match(tree.text(candidate)) {
                    removables.push(candidate);
                    continue;
                }
                for removable in removables {
                    tree.remove(removable, false);
                }
                return Ok(());
            }
            Err(unsupported())
        }
        _ => Err(unsupported()),
    }
}

fn set_lead(tree: &mut Tree, node: NodeId, value: &str) {
    match tree.previous_sibling(node) {
        Some(previous) => tree.set_tail(previous, value),
        None => {
            if let Some(parent) = tree.parent(node) {
                tree.set_text(parent, value);
            }
        }
    }
}

fn consolidated_markers(tree: &mut Tree, body: NodeId, toolkit: &Toolkit) {
    let latin_styled = tree.find_all(body, |tree, node| {
        (tree.matches(node, "span", Some("norm")) || tree.matches(node, "span", Some("italics")))
            && toolkit.latins.is_match(tree.text(node))
    });
    for span in latin_styled {
        tree.unfold(span);
    }
    if let Some(disclaimer) = tree.find(body, |tree, node| tree.matches(node, "p", Some("disclaimer"))) {
        tree.remove(disclaimer, false);
    }

    let footnote_anchors = tree.find_all(body, |tree, node| {
        tree.is(node, "a")
            && tree
                .children(node)
                .iter()
                .any(|&child| tree.matches(child, "span", Some("superscript")))
    });
    for anchor in footnote_anchors {
        let &[label] = tree.children(anchor) else {
            warn!(html = %tree.to_html(anchor), "could not standardize footnote anchor");
            continue;
        };
        tree.unfold(label);
        let lead = tree.lead(anchor).trim().to_string();
        if let Some(stripped) = lead.strip_suffix('(') {
            set_lead(tree, anchor, stripped);
            let tail = tree.tail(anchor).replacen(')', "", 1);
            tree.set_tail(anchor, tail);
            let text = format!("({})", tree.text(anchor).trim());
            tree.set_text(anchor, text);
        }
        tree.set(anchor, "class", "footnote");
    }

    let insertion_markers = tree.find_all(body, |tree, node| {
        tree.is(node, "span")
            && tree.children(node).iter().any(|&anchor| {
                tree.is(anchor, "a")
                    && tree
                        .children(anchor)
                        .iter()
                        .any(|&span| tree.matches(span, "span", Some("boldface")))
            })
    });
    for marker in insertion_markers {
        let &[anchor] = tree.children(marker) else {
            warn!(html = %tree.to_html(marker), "could not standardize element");
            continue;
        };
        tree.unfold(anchor);
        if let Some(span) = tree.child_by_tag(marker, "span") {
            tree.unfold(span);
        }
        tree.set_tag(marker, "a");
        let text = tree.text(marker).trim().to_string();
        if text.starts_with(MARKER_START) {
            tree.set_text(marker, text);
            tree.set(marker, "class", "marker-start");
        }
    }

    for paragraph in tree.find_all(body, |tree, node| tree.matches(node, "p", Some("title-annex-1"))) {
        if let Some(&italics) = tree
            .children(paragraph)
            .iter()
            .find(|&&child| tree.matches(child, "span", Some("italics")))
        {
            tree.unfold(italics);
        }
    }
    for span in tree.find_all(body, |tree, node| tree.matches(node, "span", Some("boldface"))) {
        if tree.text(span).trim().starts_with(MARKER_END) {
            tree.set_text(span, MARKER_END.to_string());
            tree.set(span, "class", "marker-end");
        }
    }
    for paragraph in tree.find_all(body, |tree, node| tree.matches(node, "p", Some("modref"))) {
        if let Some(anchor) = tree.child_by_tag(paragraph, "a") {
            tree.set(anchor, "class", "marker-start");
            tree.unfold(paragraph);
        }
    }
    for arrow in tree.find_all(body, |tree, node| tree.matches(node, "p", Some("arrow"))) {
        tree.remove(arrow, false);
    }
    let wrappers = tree.find_all(body, |tree, node| {
        (tree.is(node, "div") && (tree.get(node, "style").is_some() || tree.class(node) == Some("centered")))
            || (tree.is(node, "span") && tree.get(node, "style").is_some() && is_blank(tree.text(node)))
            || tree.matches(node, "p", Some("container-center"))
    });
    for wrapper in wrappers {
        tree.unfold(wrapper);
    }
    let line_breaks = tree.find_all(body, |tree, node| {
        tree.is(node, "p")
            && is_blank(tree.text(node))
            && matches!(tree.children(node), [br] if tree.is(*br, "br") && is_blank(tree.tail(*br)))
    });
    for paragraph in line_breaks {
        tree.remove(paragraph, false);
    }
}

/// Amending acts listed in the modifier tables become `version_implements`.
fn extract_changers(tree: &mut Tree, body: NodeId, toolkit: &Toolkit, metadata: &mut ActMetaData) {
    for head in tree.find_all(body, |tree, node| tree.matches(node, "p", Some("hd-modifiers"))) {
        let table = tree.next_sibling(head);
        tree.remove(head, true);
        let Some(table) = table else {
            continue;
        };
        let hrefs: Vec<String> = tree
            .iter(table)
            .into_iter()
            .filter_map(|node| tree.get(node, "href"))
            .filter_map(href_to_celex)
            .collect();
        for celex in hrefs {
            metadata
                .version_implements
                .insert(url_from_celex(toolkit.language, &celex));
        }
        tree.remove(table, true);
    }
}

fn unwrap_preamble(tree: &mut Tree, body: NodeId) {
    let Some(preamble) = tree
        .children(body)
        .iter()
        .copied()
        .find(|&child| tree.matches(child, "div", Some("preamble")))
    else {
        return;
    };
    let preceding: Vec<NodeId> = tree
        .children(body)
        .iter()
        .copied()
        .take_while(|&child| child != preamble)
        .collect();
    for sibling in preceding {
        if tree.class(sibling) != Some("reference") {
            tree.remove(sibling, true);
        }
    }
    tree.unfold(preamble);
}

fn proposal_structure(tree: &mut Tree, body: NodeId) {
    for paragraph in tree.find_tag(body, "p") {
        let renamed = tree
            .class(paragraph)
            .and_then(|class| class.strip_prefix("li ManualNumPar"))
            .map(|rest| format!("li Point{rest}"));
        if let Some(class) = renamed {
            tree.set(paragraph, "class", class);
        }
    }
    tree.flatten_by(body, |tree, node| {
        tree.matches(node, "div", Some("contentWrapper"))
            || tree.matches(node, "div", Some("content"))
            || (tree.is(node, "span") && tree.attrs(node).is_empty())
    });

    for element in tree.find_tag(body, "p") {
        if tree.class(element) != Some("SectionTitle") {
            continue;
        }
        tree.set(element, "class", "container-heading-ordinate");
        if let Some(neighbour) = tree.next_sibling(element)
            && tree.class(neighbour) == Some("SectionTitle")
        {
            tree.set(neighbour, "class", "container-heading-title");
        }
    }

    let leaf_headings = tree.find_all(body, |tree, node| {
        tree.matches(node, "p", Some("Titrearticle")) || tree.matches(node, "p", Some("Annexetitre"))
    });
    for element in leaf_headings {
        tree.set(element, "class", "leaf-heading-ordinate");
        let Some(title) = tree.child_by_tag(element, "br") else {
            continue;
        };
        tree.set_tag(title, "p");
        tree.set(title, "class", "leaf-heading-title");
        let text = tree.take_tail(title).trim().to_string();
        tree.set_text(title, text);
        for sibling in tree.following_siblings(title) {
            tree.append(title, sibling);
            if tree.is(sibling, "br") {
                let tail = format!(" {}", tree.tail(sibling));
                tree.set_tail(sibling, tail);
                tree.unfold(sibling);
            }
        }
        tree.add_next(element, title);
    }

    for reference in tree.find_all(body, |tree, node| tree.matches(node, "span", Some("FootnoteReference"))) {
        let Some(&anchor) = tree
            .children(reference)
            .iter()
            .find(|&&child| tree.matches(child, "a", Some("footnoteRef")))
        else {
            continue;
        };
        tree.set_tag(reference, "a");
        tree.set_tag(anchor, "sup");
        tree.pop(reference, "class");
        tree.pop(anchor, "class");
        if let Some(href) = tree.pop(anchor, "href") {
            tree.set(reference, "href", href);
        }
        if let Some(id) = tree.pop(anchor, "id") {
            tree.set(reference, "id", id);
        }
    }

    let footnotes = tree.find(body, |tree, node| tree.is(node, "dl") && tree.get(node, "id") == Some("footnotes"));
    if let Some(footnotes) = footnotes {
        tree.set_tag(footnotes, "div");
        for entry in tree.children_by_tag(footnotes, "dd") {
            tree.set_tag(entry, "p");
            tree.set(entry, "class", "footnote");
            let Some(&number) = tree
                .children(entry)
                .iter()
                .find(|&&child| tree.matches(child, "span", Some("num")))
            else {
                continue;
            };
            tree.pop(number, "class");
            tree.set_tag(number, "a");
            if let Some(anchor) = tree.child_by_tag(number, "a") {
                tree.set_tag(anchor, "sup");
                if let Some(href) = tree.pop(anchor, "href") {
                    tree.set(number, "href", href);
                }
            }
        }
    }
}

/// `true` when the text has cased characters and all of them are upper case.
fn is_upper(text: &str) -> bool {
    let mut cased = false;
    for c in text.chars() {
        if c.is_lowercase() {
            return false;
        }
        cased |= c.is_uppercase();
    }
    cased
}

/// Heading hints of one HTML dialect.
pub struct HeadingHints {
    dialect: Dialect,
    item_label: Regex,
}

impl HeadingHints {
    pub fn new(dialect: Dialect) -> Result<Self> {
        Ok(Self {
            dialect,
            item_label: Regex::new(r"(?i)^\([0-9a-z]{1,2}\)")?,
        })
    }

    /// Rule of thumb for old documents: short, uppercase, no sentences.
    fn old_title_score(&self, tree: &Tree, element: NodeId) -> f64 {
        let text = tree.textify(element, false, true);
        let words = text.split_whitespace().count();
        if words == 0 {
            return 0.0;
        }
        let score = 1.0 / words as f64;
        if text.starts_with(FOLDED_ARROW) && text.chars().count() <= 3 {
            return 0.0;
        }
        if self.item_label.is_match(&text) {
            return 0.0;
        }
        if text.ends_with('.') || text.ends_with(':') || text.contains(',') || text.contains(';') {
            return 0.0;
        }
        if is_upper(&text) {
            return 4.0 * score;
        }
        let sentences = text
            .split('.')
            .skip(1)
            .any(|part| part.trim().chars().next().is_some_and(char::is_uppercase));
        if sentences {
            return 0.0;
        }
        score
    }
}

impl HeadingRules for HeadingHints {
    fn ordinate_eligible(&self, tree: &Tree, element: NodeId) -> bool {
        match self.dialect {
            Dialect::OldOriginal | Dialect::OldConsolidated => tree.children(element).len() <= 2,
            _ => tree.class(element).is_some_and(|class| class.ends_with("ordinate")),
        }
    }

    fn title_score(&self, tree: &Tree, element: NodeId, role: Role) -> f64 {
        let eligible = match self.dialect {
            Dialect::OldOriginal | Dialect::OldConsolidated => return self.old_title_score(tree, element),
            Dialect::Proposal => tree
                .class(element)
                .is_some_and(|class| class.ends_with("-heading-title")),
            _ => match role {
                Role::Leaf => tree.is(element, "p") && !matches!(tree.class(element), None | Some("normal")),
                _ => tree.class(element) == Some("container-heading-title"),
            },
        };
        if eligible { 1.0 } else { 0.0 }
    }
}
