//! Operations on a single leaf: article, annex, preamble or final provisions.

use std::collections::HashMap;

use regex::Regex;
use serde::Serialize;
use tracing::{debug, error};

use super::Toolkit;
use super::definitions::{DEFINITION_TERM_CLASS, TechnicalTerms};
use super::markup::{Part, add_markups};
use super::references::{LinkContext, link as link_references};
use super::skeleton::{HEADING_CLASS, ORDINATE_CLASS, TITLE_CLASS};
use crate::error::Result;
use crate::tree::{NodeId, Tree, is_blank};

pub const PREAMBLE_ID: &str = "PRE";
pub const FINAL_ID: &str = "FIN";
pub const BODY_CLASS: &str = "lxp-body";
pub const FOOTER_CLASS: &str = "article-footer";
pub const RECITALS_CLASS: &str = "lxp-recitals";
pub const RECITAL_CLASS: &str = "lxp-recital";
pub const MATH_CLASS: &str = "lxp-math";
const RESPONSIVE_CLASS: &str = "w3-responsive";
const RESPONSIVE_MIN_WIDTH: u32 = 200;

/// A leaf whose transformation was rolled back.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct LeafFailure {
    pub leaf: String,
    pub reason: String,
}

pub fn leaf_id(tree: &Tree, leaf: NodeId) -> String {
    tree.get(leaf, "id").unwrap_or_default().to_string()
}

/// Runs `step` on the leaf; on failure the leaf is restored to its prior state.
pub fn rollback_on(
    tree: &mut Tree,
    leaf: NodeId,
    step: impl FnOnce(&mut Tree, NodeId) -> Result<()>,
) -> Option<LeafFailure> {
    let snapshot = tree.snapshot(leaf);
    let err = step(tree, leaf).err()?;
    tree.restore(leaf, snapshot);
    let attrs = tree
        .attrs(leaf)
        .iter()
        .map(|(name, value)| format!("{name}={value:?}"))
        .collect::<Vec<_>>()
        .join(" ");
    error!(tag = tree.tag(leaf), attrs = %attrs, error = %err, "could not transform");
    Some(LeafFailure {
        leaf: leaf_id(tree, leaf),
        reason: err.to_string(),
    })
}

fn collapse_blanks(value: &str) -> String {
    let mut result = String::with_capacity(value.len());
    let mut blank = false;
    for c in value.chars() {
        if c.is_whitespace() {
            if !blank {
                result.push(' ');
            }
            blank = true;
        } else {
            result.push(c);
            blank = false;
        }
    }
    result
}

pub fn simplify_blanks(tree: &mut Tree, leaf: NodeId) {
    for node in tree.descendants(leaf) {
        let text = collapse_blanks(tree.text(node));
        tree.set_text(node, text);
        let tail = collapse_blanks(tree.tail(node));
        tree.set_tail(node, tail);
    }
}

/// `(3 bis)` → `3bis`, `(a)` → `a`, `12.` → `12`.
pub fn data_title_to_sub_id(data_title: &str, latins: &Regex) -> String {
    let result = data_title.trim_matches(|c| "(). \u{a0}".contains(c));
    if !result.contains(' ') {
        return result.to_string();
    }
    let Some((base, suffix)) = result.split_once(char::is_whitespace) else {
        return result.to_string();
    };
    if latins.is_match(suffix) {
        format!("{base}{}", suffix.trim())
    } else {
        base.to_string()
    }
}

fn identifiable(tree: &Tree, item: NodeId) -> bool {
    tree.is(item, "li")
        && (tree.class(item) == Some("definition")
            || !tree.parent(item).is_some_and(|parent| tree.is(parent, "ul")))
}

fn ascii_only(id: &str) -> String {
    let mut result = String::with_capacity(id.len());
    for c in id.chars() {
        if ('\t'..='~').contains(&c) {
            result.push(c);
        } else {
            result.push_str("_z_");
        }
    }
    result
}

/// Assigns `{leaf}-{sub}-{sub}` ids to the list items of a leaf.
pub fn set_ids(tree: &mut Tree, leaf: NodeId, latins: &Regex) {
    let prefix = leaf_id(tree, leaf);
    for item in tree.find_all(leaf, |tree, node| identifiable(tree, node) && tree.get(node, "id").is_none()) {
        let mut chain: Vec<NodeId> = tree.ancestors(item).into_iter().rev().collect();
        chain.push(item);
        let subs: Vec<String> = chain
            .into_iter()
            .filter(|&node| tree.is(node, "li") && tree.is_descendant_of(node, leaf))
            .filter_map(|node| tree.get(node, "data-title"))
            .map(|title| data_title_to_sub_id(title, latins))
            .collect();
        tree.set(item, "id", format!("{prefix}-{}", subs.join("-")));
    }
    let mut seen = HashMap::<String, usize>::new();
    for item in tree.find_all(leaf, |tree, node| identifiable(tree, node) && tree.get(node, "id").is_some()) {
        let id = tree.get(item, "id").unwrap_or_default().to_string();
        let count = seen.entry(id.clone()).or_default();
        if *count > 0 {
            tree.set(item, "id", format!("{id}--{count}"));
        }
        *count += 1;
        let id = ascii_only(tree.get(item, "id").unwrap_or_default());
        tree.set(item, "id", id);
    }
}

/// Marks the first list of the preamble as the recitals.
pub fn recital(tree: &mut Tree, leaf: NodeId) {
    let Some(list) = tree.child_by_tag(leaf, "ol") else {
        return;
    };
    tree.set(list, "class", RECITALS_CLASS);
    for item in tree.children_by_tag(list, "li") {
        tree.set(item, "class", RECITAL_CLASS);
        let Some(first) = tree.first_child(item) else {
            continue;
        };
        let numbered = tree.matches(first, "span", Some("num"))
            && tree.get(item, "data-title") == Some(tree.text(first));
        if numbered {
            tree.remove(first, true);
        }
    }
}

/// Wraps everything below the heading into `div.lxp-body`.
pub fn create_body(tree: &mut Tree, leaf: NodeId, toolkit: &Toolkit) {
    if tree.get(leaf, "id") == Some(PREAMBLE_ID) {
        tree.set(leaf, "title", toolkit.language.preamble_name());
        recital(tree, leaf);
        return;
    }
    let body = tree.create_with("div", &[("class", BODY_CLASS)], "");
    let heading = tree
        .children(leaf)
        .iter()
        .copied()
        .find(|&child| tree.class(child) == Some(HEADING_CLASS));
    let leading = match heading {
        Some(heading) => tree.take_tail(heading),
        None => tree.take_text(leaf),
    };
    if !is_blank(&leading) {
        tree.set_text(body, leading.trim());
    }
    for child in tree.children(leaf).to_vec() {
        if Some(child) != heading {
            tree.append(body, child);
        }
    }
    match heading {
        Some(heading) => tree.add_next(heading, body),
        None => tree.insert(leaf, 0, body),
    }
}

/// The leaf's `div.article-footer`, created on first use.
pub fn footer(tree: &mut Tree, leaf: NodeId) -> NodeId {
    let base = tree
        .children(leaf)
        .iter()
        .copied()
        .find(|&child| tree.matches(child, "div", Some(BODY_CLASS)))
        .unwrap_or(leaf);
    if let Some(existing) = tree
        .children(base)
        .iter()
        .copied()
        .find(|&child| tree.matches(child, "div", Some(FOOTER_CLASS)))
    {
        return existing;
    }
    let footer = tree.create_with("div", &[("class", FOOTER_CLASS)], "");
    tree.append(base, footer);
    footer
}

fn wide_image(tree: &Tree, node: NodeId) -> bool {
    tree.is(node, "img")
        && tree
            .get(node, "width")
            .and_then(|width| width.trim_end_matches("px").parse::<f64>().ok())
            .is_some_and(|width| width >= f64::from(RESPONSIVE_MIN_WIDTH))
}

pub fn responsify(tree: &mut Tree, leaf: NodeId) {
    let candidates = tree.find_all(leaf, |tree, node| {
        tree.matches(node, "table", Some("table")) || wide_image(tree, node)
    });
    for element in candidates {
        if tree.closest(element, |tree, ancestor| tree.is(ancestor, "table")).is_some() {
            continue;
        }
        let wrapper = tree.create_with("div", &[("class", RESPONSIVE_CLASS)], "");
        tree.add_next(element, wrapper);
        if tree.is(element, "table") {
            tree.pop(element, "width");
        }
        let tail = tree.take_tail(element);
        tree.set_tail(wrapper, tail);
        tree.append(wrapper, element);
    }
}

/// Closing steps that every leaf receives, also after a rollback.
pub fn finalize(tree: &mut Tree, leaf: NodeId, toolkit: &Toolkit) {
    simplify_blanks(tree, leaf);
    set_ids(tree, leaf, &toolkit.latins);
    create_body(tree, leaf, toolkit);
    responsify(tree, leaf);
}

/// Moves the title of internal anchors into `data-content-heading`.
pub fn embed(tree: &mut Tree, leaf: NodeId) {
    let anchors = tree.find_all(leaf, |tree, node| {
        tree.is(node, "a") && tree.get(node, "href").is_some() && tree.get(node, "title").is_some()
    });
    for anchor in anchors {
        let internal = tree
            .get(anchor, "href")
            .is_some_and(|href| href.starts_with('#') || href.starts_with('/'));
        if !internal {
            continue;
        }
        if let Some(title) = tree.pop(anchor, "title") {
            tree.set(anchor, "data-content-heading", title);
        }
    }
}

fn leaf_title(tree: &Tree, leaf: NodeId) -> Option<NodeId> {
    let heading = tree
        .children(leaf)
        .iter()
        .copied()
        .find(|&child| tree.matches(child, "div", Some(HEADING_CLASS)))?;
    tree.children(heading)
        .iter()
        .copied()
        .find(|&child| tree.matches(child, "h2", Some(TITLE_CLASS)))
}

/// Documents amended by the leaf, `None` if the leaf has no title.
fn amends(tree: &Tree, leaf: NodeId, toolkit: &Toolkit) -> Option<Vec<String>> {
    let title = leaf_title(tree, leaf)?;
    let text = tree.textify(title, false, false);
    let text = text.trim();
    if !toolkit.amendment.is_match(text) {
        return Some(Vec::new());
    }
    Some(toolkit.annotator().hrefs(text))
}

fn link_correlation_tables(tree: &mut Tree, leaf: NodeId, toolkit: &Toolkit) {
    let hosted = format!("/{}/", toolkit.domain);
    for table in tree.find_tag(leaf, "table") {
        for column in tree.table_columns(table) {
            let Some(&head) = column.first() else {
                continue;
            };
            let refs = toolkit.annotator().hrefs(tree.textify(head, false, false).trim());
            let [reference] = refs.as_slice() else {
                continue;
            };
            let context = if reference.starts_with(&hosted) {
                LinkContext::document(reference.as_str())
            } else {
                LinkContext::default()
            };
            debug!(context = ?context.document, "linking correlation table column");
            for cell in column {
                link_references(tree, cell, toolkit.annotator(), &context);
            }
        }
    }
}

/// Converts the citations of a leaf into anchors.
pub fn link(tree: &mut Tree, leaf: NodeId, toolkit: &Toolkit) {
    link_correlation_tables(tree, leaf, toolkit);
    let amended = amends(tree, leaf, toolkit);
    if amended.as_ref().is_some_and(|hrefs| hrefs.len() > 1) {
        debug!(leaf = %leaf_id(tree, leaf), "amends several documents, not linked");
        return;
    }
    let hosted = format!("/{}/", toolkit.domain);
    let context = match amended.as_ref().and_then(|hrefs| hrefs.first()) {
        Some(href) if href.starts_with(&hosted) => LinkContext::document(href.as_str()),
        _ => match tree.parent(leaf).and_then(|parent| tree.get(parent, "id")) {
            Some(id) => LinkContext::container(id),
            None => LinkContext::default(),
        },
    };
    let subjects = if tree.get(leaf, "id") == Some(PREAMBLE_ID) {
        vec![leaf]
    } else {
        let mut subjects: Vec<NodeId> = tree
            .children(leaf)
            .iter()
            .copied()
            .filter(|&child| tree.matches(child, "div", Some(BODY_CLASS)))
            .collect();
        subjects.extend(leaf_title(tree, leaf));
        subjects
    };
    for subject in subjects {
        link_references(tree, subject, toolkit.annotator(), &context);
    }
    let misplaced = tree.find_all(leaf, |tree, node| {
        tree.is(node, "a")
            && tree.get(node, "href").is_some()
            && tree
                .parent(node)
                .is_some_and(|parent| tree.matches(parent, "h1", Some(ORDINATE_CLASS)))
    });
    for anchor in misplaced {
        tree.unfold(anchor);
    }
}

fn within_anchor(tree: &Tree, node: NodeId) -> bool {
    tree.closest(node, |tree, ancestor| tree.is(ancestor, "a")).is_some()
}

/// Collects the leaf's definitions and links the known terms.
pub fn reference_definitions(tree: &mut Tree, leaf: NodeId, terms: &mut TechnicalTerms) -> Result<()> {
    for item in tree.find_tag(leaf, "li") {
        if tree.class(item) != Some(RECITAL_CLASS) {
            terms.append(tree, item);
        }
    }
    if terms.is_empty() {
        return Ok(());
    }
    const TAIL_ONLY: [&str; 4] = [MATH_CLASS, DEFINITION_TERM_CLASS, TITLE_CLASS, ORDINATE_CLASS];
    for node in tree.descendants(leaf) {
        if within_anchor(tree, node) {
            continue;
        }
        let tail_only = tree.is(node, "a")
            || tree.class(node).is_some_and(|class| TAIL_ONLY.contains(&class));
        let parts: &[Part] = if tail_only {
            &[Part::Tail]
        } else {
            &[Part::Text, Part::Tail]
        };
        for &part in parts {
            let markups = terms.locate(part.read(tree, node))?;
            if !markups.is_empty() {
                add_markups(tree, node, part, "a", markups);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests;
