//! Dialect detection and dispatch of a raw document to its transformation.

use std::fmt;

use clap::ValueEnum;
use serde::Serialize;
use tracing::{debug, info};

use super::article::LeafFailure;
use super::{Toolkit, formex, html};
use crate::config::Language;
use crate::error::{Result, TransformError};
use crate::metadata::ActMetaData;
use crate::tree::{NodeId, Tree, parse_html, parse_xml};

const NOT_FOUND_NOTICE: &str = "The requested document does not exist.";
const NUMERO_SIGN: &str = "\u{2116}";

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    Fmx,
    Html,
}

impl SourceFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fmx => "fmx",
            Self::Html => "html",
        }
    }
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The raw layouts the engine knows how to transform.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Dialect {
    OldOriginal,
    OldConsolidated,
    ModernOriginal,
    ModernConsolidated,
    Proposal,
    Formex,
}

impl Dialect {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OldOriginal => "old_original",
            Self::OldConsolidated => "old_consolidated",
            Self::ModernOriginal => "modern_original",
            Self::ModernConsolidated => "modern_consolidated",
            Self::Proposal => "proposal",
            Self::Formex => "formex",
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
pub struct Transformed {
    pub tree: Tree,
    pub metadata: ActMetaData,
    pub dialect: Dialect,
    pub failures: Vec<LeafFailure>,
}

#[derive(Debug)]
pub enum TransformOutcome {
    Transformed(Box<Transformed>),
    /// The act has been repealed; there is nothing to host.
    Repealer,
    /// EUR-Lex serves another document instead.
    Redirect { target: String },
    NotFound { format: SourceFormat },
}

/// Result of looking at a parsed HTML page.
#[derive(Debug)]
pub enum Detection {
    Dialect(Dialect),
    Final(TransformOutcome),
}

fn count(tree: &Tree, predicate: impl Fn(&Tree, NodeId) -> bool) -> usize {
    tree.iter(tree.root())
        .into_iter()
        .filter(|&node| predicate(tree, node))
        .count()
}

fn is_repealer(tree: &Tree, language: Language) -> bool {
    let root = tree.root();
    let Some(body) = tree.child_by_tag(root, "body") else {
        return false;
    };
    tree.children(body)
        .iter()
        .find(|&&child| tree.matches(child, "p", Some("hd-modifiers")))
        .is_some_and(|&modifiers| {
            tree.text(modifiers)
                .trim_start()
                .to_lowercase()
                .starts_with(language.repealed_by())
        })
}

/// Determines the HTML dialect of a page, or its final outcome.
pub fn detect(tree: &Tree, language: Language) -> Result<Detection> {
    let root = tree.root();
    let frequency = tree.attribute_frequency(root, "class");
    let has_class = |class: &str| frequency.iter().any(|(value, _)| value == class);

    if let Some(alert) = tree.find(root, |tree, node| {
        tree.is(node, "div") && tree.has_class(node, "alert") && tree.has_class(node, "alert-warning")
    }) {
        if tree.textify(alert, false, true).contains(NOT_FOUND_NOTICE) {
            return Ok(Detection::Final(TransformOutcome::NotFound {
                format: SourceFormat::Html,
            }));
        }
        let target = tree
            .find(alert, |tree, node| tree.is(node, "a") && tree.get(node, "href").is_some())
            .and_then(|anchor| tree.get(anchor, "href"))
            .ok_or_else(|| TransformError::MissingElement("redirect target".to_string()))?;
        return Ok(Detection::Final(TransformOutcome::Redirect {
            target: target.to_string(),
        }));
    }
    if count(tree, |tree, node| tree.is(node, "txt_te")) == 1 {
        return Ok(Detection::Dialect(Dialect::OldOriginal));
    }
    if has_class("ti-art") {
        return Ok(Detection::Dialect(Dialect::ModernOriginal));
    }
    if has_class("title-article-norm") {
        return Ok(Detection::Dialect(Dialect::ModernConsolidated));
    }
    let top: Vec<&str> = frequency.iter().take(10).map(|(value, _)| value.as_str()).collect();
    if top.contains(&"Normal") && top.contains(&"num") {
        return Ok(Detection::Dialect(Dialect::Proposal));
    }
    let paragraphs = count(tree, |tree, node| tree.is(node, "p")) as f64;
    let styled = count(tree, |tree, node| tree.is(node, "p") && tree.get(node, "style").is_some()) as f64;
    if paragraphs + styled > 0.0 && 1.0 - 2.0 * (paragraphs - styled) / (paragraphs + styled) > 0.9 {
        return Ok(Detection::Dialect(Dialect::OldConsolidated));
    }
    if is_repealer(tree, language) {
        return Ok(Detection::Final(TransformOutcome::Repealer));
    }
    Err(TransformError::UnsupportedLayout(
        "no known HTML dialect matches".to_string(),
    ))
}

fn ends_with_ignore_case(value: &str, suffix: &str) -> bool {
    value.len() >= suffix.len()
        && value.is_char_boundary(value.len() - suffix.len())
        && value[value.len() - suffix.len()..].eq_ignore_ascii_case(suffix)
}

/// Spanish acts write `n.º` with a superscript; it becomes `№`.
/// Item labels like `a)` get their opening parenthesis.
pub fn standardize_spanish(tree: &mut Tree, format: SourceFormat) {
    let root = tree.root();
    let superscripts = tree.find_all(root, |tree, node| match format {
        SourceFormat::Html => tree.matches(node, "span", Some("super")),
        SourceFormat::Fmx => tree.is(node, "HT") && tree.get(node, "TYPE") == Some("SUP"),
    });
    let prefix = match format {
        SourceFormat::Html => "n",
        SourceFormat::Fmx => "n.",
    };
    for superscript in superscripts {
        if !tree.children(superscript).is_empty() || !tree.text(superscript).eq_ignore_ascii_case("o") {
            continue;
        }
        let lead = tree.lead(superscript).to_string();
        if !ends_with_ignore_case(&lead, prefix) {
            continue;
        }
        let mut replacement = lead[..lead.len() - prefix.len()].to_string();
        replacement.push_str(NUMERO_SIGN);
        replacement.push_str(tree.tail(superscript));
        tree.set_tail(superscript, "");
        match tree.previous_sibling(superscript) {
            Some(previous) => tree.set_tail(previous, replacement),
            None => {
                if let Some(parent) = tree.parent(superscript) {
                    tree.set_text(parent, replacement);
                }
            }
        }
        tree.remove(superscript, false);
    }
    if format == SourceFormat::Html {
        for node in tree.iter(root) {
            let text = parenthesize_label(tree.text(node));
            if let Some(text) = text {
                tree.set_text(node, text);
            }
            let tail = parenthesize_label(tree.tail(node));
            if let Some(tail) = tail {
                tree.set_tail(node, tail);
            }
        }
    }
}

fn parenthesize_label(value: &str) -> Option<String> {
    let end = value.find(')')?;
    let label = &value[..end];
    let numeric = !label.is_empty() && label.chars().all(|c| c.is_ascii_digit());
    let letter = label.len() == 1 && label.chars().all(|c| c.is_ascii_lowercase());
    (numeric || letter).then(|| format!("({value}"))
}

/// Transforms the raw bytes of one representation of an act.
pub fn transform(bytes: &[u8], format: SourceFormat, toolkit: &Toolkit, id_local: &str) -> Result<TransformOutcome> {
    let mut metadata = ActMetaData::new(&toolkit.domain, id_local);
    match format {
        SourceFormat::Html => {
            let mut tree = parse_html(bytes)?;
            if toolkit.language == Language::Es {
                standardize_spanish(&mut tree, format);
            }
            let dialect = match detect(&tree, toolkit.language)? {
                Detection::Dialect(dialect) => dialect,
                Detection::Final(outcome) => {
                    info!(id = id_local, outcome = ?outcome, "document not transformed");
                    return Ok(outcome);
                }
            };
            info!(id = id_local, dialect = %dialect, "transforming html");
            let failures = html::transform(&mut tree, dialect, toolkit, &mut metadata)?;
            Ok(TransformOutcome::Transformed(Box::new(Transformed {
                tree,
                metadata,
                dialect,
                failures,
            })))
        }
        SourceFormat::Fmx => {
            let mut source = parse_xml(bytes)?;
            if toolkit.language == Language::Es {
                standardize_spanish(&mut source, format);
            }
            if formex::is_repealer(&source) {
                return Ok(TransformOutcome::Repealer);
            }
            info!(id = id_local, "transforming formex");
            let tree = formex::transform(&mut source, toolkit, &mut metadata)?;
            debug!(id = id_local, "formex exported");
            Ok(TransformOutcome::Transformed(Box::new(Transformed {
                tree,
                metadata,
                dialect: Dialect::Formex,
                failures: Vec::new(),
            })))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detected(markup: &str) -> Detection {
        let tree = parse_html(markup.as_bytes()).unwrap();
        detect(&tree, Language::En).unwrap()
    }

    #[test]
    fn dialects_by_marker_classes() {
        assert!(matches!(
            detected(r#"<html><body><p class="ti-art">Article 1</p></body></html>"#),
            Detection::Dialect(Dialect::ModernOriginal)
        ));
        assert!(matches!(
            detected(r#"<html><body><p class="title-article-norm">Article 1</p></body></html>"#),
            Detection::Dialect(Dialect::ModernConsolidated)
        ));
        assert!(matches!(
            detected("<html><body><txt_te><p>Article 1</p></txt_te></body></html>"),
            Detection::Dialect(Dialect::OldOriginal)
        ));
        assert!(matches!(
            detected(
                r#"<html><body><p class="Normal">x</p><p class="Normal">y</p><span class="num">1</span></body></html>"#
            ),
            Detection::Dialect(Dialect::Proposal)
        ));
        assert!(matches!(
            detected(r#"<html><body><p style="a">x</p><p style="b">y</p></body></html>"#),
            Detection::Dialect(Dialect::OldConsolidated)
        ));
    }

    #[test]
    fn alerts_are_final() {
        let not_found = detected(
            r#"<html><body><div class="alert alert-warning">The requested document does not exist.</div></body></html>"#,
        );
        assert!(matches!(
            not_found,
            Detection::Final(TransformOutcome::NotFound { format: SourceFormat::Html })
        ));
        let redirect = detected(
            r#"<html><body><div class="alert alert-warning">See <a href="/legal-content/EN/TXT/?uri=CELEX:32016R0679">here</a></div></body></html>"#,
        );
        match redirect {
            Detection::Final(TransformOutcome::Redirect { target }) => {
                assert!(target.ends_with("32016R0679"))
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn repealers_and_unknown_layouts() {
        assert!(matches!(
            detected(r#"<html><body><p class="hd-modifiers">Repealed by 32016R0679</p><p>x</p></body></html>"#),
            Detection::Final(TransformOutcome::Repealer)
        ));
        let tree = parse_html(b"<html><body><div>x</div></body></html>").unwrap();
        assert!(matches!(
            detect(&tree, Language::En),
            Err(TransformError::UnsupportedLayout(_))
        ));
    }

    #[test]
    fn spanish_numero_and_labels() {
        let mut tree = parse_html(
            r#"<html><body><p>Reglamento (UE) n<span class="super">o</span> 575/2013</p><p>a) primero</p></body></html>"#
                .as_bytes(),
        )
        .unwrap();
        standardize_spanish(&mut tree, SourceFormat::Html);
        let root = tree.root();
        let paragraphs = tree.find_tag(root, "p");
        assert_eq!(tree.text(paragraphs[0]), "Reglamento (UE) \u{2116} 575/2013");
        assert_eq!(tree.text(paragraphs[1]), "(a) primero");
    }
}
