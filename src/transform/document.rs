//! Document level steps shared by all dialects.

use std::collections::{BTreeSet, HashMap};

use tracing::{info, warn};

use super::article::{FINAL_ID, PREAMBLE_ID};
use super::skeleton::{ARTICLE_CLASS, CONTAINER_CLASS, HEADING_CLASS, ORDINATE_CLASS};
use crate::config::Language;
use crate::error::{Result, TransformError};
use crate::tree::{NodeId, Tree};

pub const PREAMBLE_CLASS: &str = "lxp-preamble";
pub const MESA_ARTICLE_CLASS: &str = "lxp-mesa-article";

/// Inserts `article#PRE` in front of the body and moves everything up to the
/// first container or article into it.
pub fn make_preamble(tree: &mut Tree, body: NodeId, title: &str) -> Result<NodeId> {
    let preamble = tree.create_with(
        "article",
        &[("class", PREAMBLE_CLASS), ("id", PREAMBLE_ID), ("title", title)],
        "",
    );
    tree.push(body, preamble);
    for sibling in tree.following_siblings(preamble) {
        if matches!(tree.class(sibling), Some(CONTAINER_CLASS | ARTICLE_CLASS)) {
            return Ok(preamble);
        }
        tree.append(preamble, sibling);
    }
    Err(TransformError::malformed(
        "body",
        "no container or article follows the preamble",
    ))
}

/// All leaves of the document in document order, quoted ones excluded.
pub fn leaves(tree: &Tree, scope: NodeId) -> Vec<NodeId> {
    tree.find_all(scope, |tree, node| {
        tree.is(node, "article")
            && tree.get(node, "id").is_some()
            && tree.class(node) != Some(MESA_ARTICLE_CLASS)
    })
}

fn letter_suffix(index: usize) -> String {
    let letters = b"abcdefghijklmnopqrstuvwxyz";
    match letters.get(index) {
        Some(&letter) => char::from(letter).to_string(),
        None => format!("z{index}"),
    }
}

/// Repeated container or article ids get letter suffixes after their first use.
pub fn make_toc_ids_unique(tree: &mut Tree, scope: NodeId) {
    for class in [CONTAINER_CLASS, ARTICLE_CLASS] {
        let nodes = tree.find_all(scope, |tree, node| {
            tree.class(node) == Some(class) && tree.get(node, "id").is_some()
        });
        let mut counts = HashMap::<String, usize>::new();
        for &node in &nodes {
            let id = tree.get(node, "id").unwrap_or_default().to_string();
            *counts.entry(id).or_default() += 1;
        }
        let mut seen = HashMap::<String, usize>::new();
        for node in nodes {
            let id = tree.get(node, "id").unwrap_or_default().to_string();
            let count = counts.get(&id).copied().unwrap_or_default();
            if count < 2 {
                continue;
            }
            let occurrence = seen.entry(id.clone()).or_default();
            if *occurrence == 0 {
                warn!(id = %id, count, "changing duplicate id");
            } else {
                tree.set(node, "id", format!("{id}{}", letter_suffix(*occurrence - 1)));
            }
            *occurrence += 1;
        }
    }
}

/// Gives the final provisions their language specific heading.
pub fn make_final(tree: &mut Tree, scope: NodeId, language: Language) {
    let finals = tree.find_all(scope, |tree, node| {
        tree.is(node, "article") && tree.get(node, "id") == Some(FINAL_ID)
    });
    for leaf in finals {
        for heading in tree.children_by_tag(leaf, "div") {
            if tree.class(heading) != Some(HEADING_CLASS) {
                continue;
            }
            for ordinate in tree.children_by_tag(heading, "h1") {
                if tree.class(ordinate) == Some(ORDINATE_CLASS) {
                    tree.set_text(ordinate, language.final_title());
                }
            }
        }
    }
}

/// Unfolds anchors to the document itself and to missing fragments.
pub fn cleanse(tree: &mut Tree, domain: &str, id_local: &str) {
    let root = tree.root();
    let own = format!("/{domain}/{id_local}/");
    for anchor in tree.find_all(root, |tree, node| tree.is(node, "a") && tree.get(node, "href") == Some(own.as_str())) {
        tree.unfold(anchor);
    }
    let ids: BTreeSet<String> = tree
        .iter(root)
        .into_iter()
        .filter_map(|node| tree.get(node, "id").map(str::to_string))
        .collect();
    let unfound = tree.find_all(root, |tree, node| {
        tree.is(node, "a")
            && tree
                .get(node, "href")
                .and_then(|href| href.strip_prefix('#'))
                .is_some_and(|target| !ids.contains(target))
    });
    let targets: BTreeSet<&str> = unfound
        .iter()
        .filter_map(|&anchor| tree.get(anchor, "href"))
        .collect();
    info!(count = targets.len(), "unfound reference targets");
    for anchor in unfound {
        tree.unfold(anchor);
    }
}
