//! Transformation of Formex XML acts into the lexparency document model.

pub mod article;
pub mod formula;
pub mod list;
pub mod quote;
pub mod skeleton;
pub mod table;

use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use super::Toolkit;
use super::article::{PREAMBLE_ID, embed, link, reference_definitions, simplify_blanks};
use super::definitions::TechnicalTerms;
use super::document::{make_final, make_toc_ids_unique};
use super::skeleton::{ORDINATE_CLASS, TITLE_CLASS};
use crate::error::{Result, TransformError};
use crate::metadata::{ActMetaData, url_from_celex};
use crate::tree::{NodeId, PI_PREFIX, Tree, is_blank};
use skeleton::{ContentsBuilder, DOCUMENT_TAG, renumber_generic_leaves};

const FORMULA_TAGS: &[&str] = &["FORMULA", "FORMULA.S"];

/// Consolidated versions whose `INFO.CONSLEG` marks the act as repealed.
pub fn is_repealer(source: &Tree) -> bool {
    let root = source.root();
    let acts = if source.is(root, DOCUMENT_TAG) {
        source.children_by_tag(root, "CONS.ACT")
    } else if source.is(root, "CONS.ACT") {
        vec![root]
    } else {
        Vec::new()
    };
    acts.into_iter()
        .flat_map(|act| source.children_by_tag(act, "INFO.CONSLEG"))
        .any(|info| source.get(info, "END") == Some("REPEALED"))
}

/// Runs the full pipeline on a parsed Formex document and exports the result
/// as an HTML tree.
pub fn transform(source: &mut Tree, toolkit: &Toolkit, metadata: &mut ActMetaData) -> Result<Tree> {
    let root = combined_root(source);
    preprocess(source, root, toolkit, metadata)?;
    let title = locate_title(source, root)?;
    skeletorize(source, root, toolkit)?;
    let leaves = top_leaves(source, root);
    for &leaf in &leaves {
        article::transform_leaf(source, leaf, toolkit)?;
    }
    let preamble = leaves
        .iter()
        .copied()
        .find(|&leaf| source.get(leaf, "id") == Some(PREAMBLE_ID))
        .ok_or_else(|| TransformError::MissingElement("PREAMBLE".to_string()))?;
    source.push(preamble, title);
    postprocess(source, root);

    let mut terms = TechnicalTerms::new(toolkit.language);
    for &leaf in &leaves {
        reference_definitions(source, leaf, &mut terms)?;
    }
    debug!(terms = terms.len(), "definitions collected");
    unfold_unhandled(source, root, &leaves);
    for &leaf in &leaves {
        link(source, leaf, toolkit);
    }
    for &leaf in &leaves {
        embed(source, leaf);
    }
    make_toc_ids_unique(source, root);
    make_final(source, root, toolkit.language);
    info!(leaves = leaves.len(), "formex transformed");
    Ok(export(source, root, toolkit))
}

/// Single documents are wrapped into a `LEXP.COMBINED` root.
fn combined_root(source: &mut Tree) -> NodeId {
    let root = source.root();
    if source.is(root, DOCUMENT_TAG) {
        return root;
    }
    let combined = source.create(DOCUMENT_TAG);
    source.set_root(combined);
    source.append(combined, root);
    combined
}

fn within_formula(tree: &Tree, node: NodeId) -> bool {
    tree.closest(node, |tree, ancestor| FORMULA_TAGS.contains(&tree.tag(ancestor)))
        .is_some()
}

fn drop_upper_attributes(tree: &mut Tree, node: NodeId) {
    let upper: Vec<String> = tree
        .attrs(node)
        .iter()
        .filter(|(name, _)| name.chars().any(char::is_uppercase))
        .map(|(name, _)| name.clone())
        .collect();
    for name in upper {
        tree.pop(node, &name);
    }
}

fn preprocess(tree: &mut Tree, root: NodeId, toolkit: &Toolkit, metadata: &mut ActMetaData) -> Result<()> {
    let latin_highlights = tree.find_all(root, |tree, node| {
        tree.is(node, "HT")
            && matches!(tree.get(node, "TYPE"), Some("NORMAL" | "ITALIC"))
            && !within_formula(tree, node)
            && toolkit.latins.is_match(tree.text(node))
    });
    for highlight in latin_highlights {
        tree.unfold(highlight);
    }
    let images = tree.find_all(root, |tree, node| {
        tree.is(node, "INCL.ELEMENT") && tree.get(node, "FILEREF").is_some()
    });
    for image in images {
        tree.set_tag(image, "img");
        let source = tree.pop(image, "FILEREF").unwrap_or_default();
        tree.set(image, "src", source);
        drop_upper_attributes(tree, image);
    }
    processing_instructions(tree, root);
    let note_references = tree.find_all(root, |tree, node| {
        tree.is(node, "GR.SEQ")
            && tree
                .children_by_tag(node, "LOC.NOTES")
                .into_iter()
                .any(|notes| tree.child_by_tag(notes, "REF.NOTE").is_some())
    });
    for group in note_references {
        if !is_blank(&tree.textify(group, false, false)) {
            warn!("removing note references with text content");
        }
        tree.remove(group, true);
    }
    consolidated_act(tree, root)?;
    official_journal_references(tree, root, toolkit);
    for contents in tree.find_tag(root, "TOC") {
        tree.remove(contents, true);
    }
    extract_changers(tree, root, toolkit, metadata);
    if let Some(act) = tree.child_by_tag(root, "ACT") {
        for info in ["INFO.CONSLEG", "INFO.PROD"] {
            for element in tree.children_by_tag(act, info) {
                tree.remove(element, true);
            }
        }
    }
    distribute_notes(tree, root);
    Ok(())
}

fn is_instruction(tree: &Tree, node: NodeId) -> bool {
    tree.tag(node).starts_with(PI_PREFIX)
}

/// Deleted passages are framed by a pair of processing instructions; the
/// framed content is dropped and all instructions are removed.
fn processing_instructions(tree: &mut Tree, root: NodeId) {
    let instructions = tree.find_all(root, is_instruction);
    let by_id: BTreeMap<String, NodeId> = instructions
        .iter()
        .filter_map(|&node| tree.get(node, "ID").map(|id| (id.to_string(), node)))
        .collect();
    for &instruction in &instructions {
        if tree.get(instruction, "ACTION") != Some("DELETED") {
            continue;
        }
        let closing = tree.get(instruction, "IDREF").and_then(|id| by_id.get(id)).copied();
        match closing {
            Some(closing) => execute_deletion(tree, instruction, closing),
            None => warn!("deletion without closing instruction"),
        }
    }
    for instruction in instructions {
        if tree.parent(instruction).is_some() {
            tree.remove(instruction, true);
        }
    }
}

fn execute_deletion(tree: &mut Tree, opening: NodeId, closing: NodeId) {
    while tree.parent(opening) != tree.parent(closing) {
        tree.set_tail(opening, "");
        let Some(next) = tree.next_sibling(opening) else {
            warn!("deletion frame does not close on the same level");
            return;
        };
        tree.push(next, opening);
    }
    tree.set_tail(opening, "");
    for sibling in tree.following_siblings(opening) {
        if sibling == closing {
            break;
        }
        tree.remove(sibling, false);
    }
}

/// `CONS.ACT` documents are rearranged to the layout of an original act.
fn consolidated_act(tree: &mut Tree, root: NodeId) -> Result<()> {
    let Some(act) = tree.first_child(root).filter(|&first| tree.is(first, "CONS.ACT")) else {
        return Ok(());
    };
    tree.set_tag(act, "ACT");
    let Some(document) = tree.child_by_tag(act, "CONS.DOC") else {
        return Err(TransformError::UnsupportedLayout("CONS.ACT without CONS.DOC".to_string()));
    };
    let annexes = tree.children_by_tag(document, "CONS.ANNEX");
    for &annex in &annexes {
        for sub_annex in tree.children_by_tag(annex, "CONS.ANNEX") {
            tree.set_tag(sub_annex, "SUBDIV");
        }
    }
    if !annexes.is_empty() {
        let container = if annexes.len() > 1 {
            let container = tree.create("ANNEXES");
            tree.append(root, container);
            container
        } else {
            root
        };
        for annex in annexes {
            tree.set_tag(annex, "ANNEX");
            tree.append(container, annex);
        }
    }
    tree.unfold(document);
    let quoted_annexes = tree.find_all(root, |tree, node| {
        tree.is(node, "CONS.ANNEX")
            && tree.closest(node, |tree, ancestor| tree.is(ancestor, "QUOT.S")).is_some()
    });
    for annex in quoted_annexes {
        tree.set_tag(annex, "ANNEX");
    }
    let divisions = tree.find_all(root, |tree, node| {
        tree.is(node, "CONS.ANNEX")
            && tree.parent(node).is_some_and(|parent| {
                tree.is(parent, "CONTENTS") && tree.parent(parent).is_some_and(|annex| tree.is(annex, "ANNEX"))
            })
    });
    for division in divisions {
        tree.set_tag(division, "DIVISION");
    }
    let mut leftovers: Vec<String> = tree
        .descendants(root)
        .into_iter()
        .map(|node| tree.tag(node))
        .filter(|tag| tag.starts_with("CONS."))
        .map(str::to_string)
        .collect();
    leftovers.sort();
    leftovers.dedup();
    if !leftovers.is_empty() {
        return Err(TransformError::UnsupportedLayout(format!(
            "unresolved consolidation elements: {}",
            leftovers.join(", ")
        )));
    }
    Ok(())
}

fn official_journal_references(tree: &mut Tree, root: NodeId, toolkit: &Toolkit) {
    for reference in tree.find_tag(root, "REF.DOC.OJ") {
        tree.pop(reference, "PAGE.FIRST");
        let collection = tree.pop(reference, "COLL").unwrap_or_default();
        let published = tree.pop(reference, "DATE.PUB").unwrap_or_default();
        let issue = tree.pop(reference, "NO.OJ").unwrap_or_default();
        let year: String = published.chars().take(4).collect();
        tree.set_tag(reference, "a");
        tree.set(
            reference,
            "href",
            format!(
                "https://eur-lex.europa.eu/legal-content/{}/AUTO/?uri=OJ:{collection}:{year}:{issue}:TOC",
                toolkit.language
            ),
        );
    }
}

/// The acts a consolidated version implements.
fn extract_changers(tree: &mut Tree, root: NodeId, toolkit: &Toolkit, metadata: &mut ActMetaData) {
    for family in tree.find_tag(root, "FAM.COMP") {
        for data in tree.find_tag(family, "BIB.DATA") {
            for number in tree.children_by_tag(data, "NO.CELEX") {
                let celex = tree.text(number).trim().to_string();
                if !celex.is_empty() {
                    metadata
                        .version_implements
                        .insert(url_from_celex(toolkit.language, &celex));
                }
            }
        }
        tree.remove(family, true);
    }
}

/// Notes collected in `GR.NOTES` are copied to their referrers.
fn distribute_notes(tree: &mut Tree, root: NodeId) {
    for group in tree.find_tag(root, "GR.NOTES") {
        for note in tree.children_by_tag(group, "NOTE") {
            let Some(id) = tree.get(note, "NOTE.ID").map(str::to_string) else {
                continue;
            };
            let referrers = tree.find_all(root, |tree, node| {
                tree.is(node, "NOTE") && tree.get(node, "NOTE.REF") == Some(id.as_str())
            });
            for referrer in referrers {
                let copy = tree.deep_copy(note);
                tree.append(referrer, copy);
                tree.unfold(referrer);
            }
        }
        tree.remove(group, true);
    }
}

/// The act's title as `div.lxp-title`.
fn locate_title(tree: &mut Tree, root: NodeId) -> Result<NodeId> {
    let title = tree
        .path(root, &["ACT", "TITLE"])
        .ok_or_else(|| TransformError::MissingElement("ACT/TITLE".to_string()))?;
    if let Some(ti) = tree.child_by_tag(title, "TI") {
        tree.unfold(ti);
    }
    for paragraph in tree.find_tag(title, "P") {
        // separates the words of glued paragraphs
        tree.set_tag(paragraph, "p");
        tree.push_tail(paragraph, "\n");
    }
    tree.set_tag(title, "div");
    tree.set(title, "class", TITLE_CLASS);
    Ok(title)
}

fn skeletorize(tree: &mut Tree, root: NodeId, toolkit: &Toolkit) -> Result<()> {
    let outline = ContentsBuilder::new(&toolkit.headings).build(tree, root, &[])?;
    debug!(outline = ?outline.outline(), "skeleton collected");
    if let Some(terms) = tree.path(root, &["ACT", "ENACTING.TERMS"]) {
        tree.unfold(terms);
    }
    if let Some(act) = tree.child_by_tag(root, "ACT") {
        tree.unfold(act);
    }
    renumber_generic_leaves(tree, root);
    Ok(())
}

/// Articles below the root that are only nested in containers.
fn top_leaves(tree: &Tree, root: NodeId) -> Vec<NodeId> {
    tree.find_all(root, |tree, node| {
        tree.is(node, "article")
            && tree
                .ancestors(node)
                .into_iter()
                .take_while(|&ancestor| ancestor != root)
                .all(|ancestor| tree.is(ancestor, "div"))
    })
}

fn highlights(tree: &mut Tree, root: NodeId) {
    for highlight in tree.find_tag(root, "HT") {
        let kind = tree.get(highlight, "TYPE").unwrap_or_default().to_string();
        match kind.as_str() {
            "SUP" | "SUB" => {
                tree.set_tag(highlight, &kind.to_lowercase());
                tree.pop(highlight, "TYPE");
            }
            "ITALIC" | "BOLD" => {
                tree.set_tag(highlight, if kind == "ITALIC" { "i" } else { "b" });
                tree.pop(highlight, "TYPE");
            }
            "NORMAL" | "EXPANDED" => tree.unfold(highlight),
            "UC" => {
                let text = tree.text(highlight).to_uppercase();
                tree.set_text(highlight, text);
                tree.unfold(highlight);
            }
            _ => {}
        }
    }
}

/// Bold or italic wrappers around whole heading parts are dropped.
fn remove_heading_styling(tree: &mut Tree, root: NodeId) {
    let parts = tree.find_all(root, |tree, node| {
        matches!(tree.class(node), Some(ORDINATE_CLASS | TITLE_CLASS))
    });
    for part in parts {
        while let &[only] = tree.children(part) {
            if !(tree.is(only, "b") || tree.is(only, "i")) {
                break;
            }
            tree.unfold(only);
        }
        if tree.children(part).is_empty() {
            let text = tree.text(part).trim().to_string();
            tree.set_text(part, text);
        }
    }
}

fn postprocess(tree: &mut Tree, root: NodeId) {
    highlights(tree, root);
    for instance in tree.children_by_tag(root, "BIB.INSTANCE") {
        tree.remove(instance, true);
    }
    remove_heading_styling(tree, root);
    let wrappers = tree.find_all(root, |tree, node| {
        matches!(tree.tag(node), "TITLE" | "TI" | "DATE" | "TXT")
    });
    for wrapper in wrappers {
        tree.unfold(wrapper);
    }
}

fn is_unhandled(tree: &Tree, node: NodeId) -> bool {
    tree.tag(node).chars().any(char::is_uppercase)
}

/// Formex elements that survived the transformation are reported and unfolded.
fn unfold_unhandled(tree: &mut Tree, root: NodeId, leaves: &[NodeId]) {
    let mut counts = BTreeMap::<String, usize>::new();
    for &leaf in leaves {
        for node in tree.find_all(leaf, is_unhandled) {
            *counts.entry(tree.tag(node).to_string()).or_default() += 1;
        }
    }
    if counts.is_empty() {
        return;
    }
    let summary = counts
        .iter()
        .map(|(tag, count)| format!("{tag}: {count}"))
        .collect::<Vec<_>>()
        .join(", ");
    warn!(unhandled = %summary, "unfolding unhandled formex elements");
    for node in tree.find_all(root, |tree, node| counts.contains_key(tree.tag(node))) {
        tree.unfold(node);
    }
}

/// The combined root becomes the `body` of a fresh HTML document.
fn export(source: &mut Tree, root: NodeId, toolkit: &Toolkit) -> Tree {
    source.set_tag(root, "body");
    source.pop(root, "id");
    let mut document = Tree::new("html");
    let html = document.root();
    document.set(html, "lang", toolkit.language.html_lang());
    let head = document.create("head");
    document.append(html, head);
    let charset = document.create_with("meta", &[("charset", "UTF-8")], "");
    document.append(head, charset);
    let title = document.create_with("title", &[], "Transformed document");
    document.append(head, title);
    document.graft(html, source, root);
    simplify_blanks(&mut document, html);
    document
}
