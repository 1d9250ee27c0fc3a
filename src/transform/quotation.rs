//! Quotation marks: standardization into `>>…<<` and markup as spans.

use fancy_regex::Regex;

use super::markup::{Markup, Part, add_markups};
use crate::error::Result;
use crate::tree::{NodeId, Tree};

pub const QUOTATION_CLASS: &str = "lxp-quotation";

const SINGLE_MARKS: [char; 3] = ['\u{2027}', '\'', '"'];
const MARK_PAIRS: [(char, char); 3] = [
    ('\u{2018}', '\u{2019}'),
    ('\u{201c}', '\u{201d}'),
    ('\u{201e}', '\u{201c}'),
];

pub struct QuotationMarker {
    replacements: Vec<Regex>,
    span: Regex,
}

impl QuotationMarker {
    pub fn new() -> Result<Self> {
        let mut replacements = Vec::new();
        for mark in SINGLE_MARKS {
            replacements.push(Regex::new(&format!(
                r"(?i)(?<![a-z0-9]){mark}([^{mark}]{{0,200}}){mark}(?=[\s),.])"
            ))?);
        }
        for (open, close) in MARK_PAIRS {
            replacements.push(Regex::new(&format!(
                r"(?<![a-z0-9]){open}([^{close}]{{0,200}}){close}(?=[\s),.])"
            ))?);
        }
        Ok(Self {
            replacements,
            span: Regex::new(r"(?<![a-z0-9])>>(.{0,200}?)<<")?,
        })
    }

    /// Replaces recognized quotation mark pairs by `>>` and `<<`.
    pub fn standardize(&self, text: &str) -> String {
        self.replacements
            .iter()
            .fold(text.to_string(), |text, pattern| {
                pattern.replace_all(&text, ">>$1<<").into_owned()
            })
    }

    /// Turns quotations below `scope` into `span.lxp-quotation`.
    pub fn markup(&self, tree: &mut Tree, scope: NodeId) {
        let elements = tree.descendants(scope);
        for &element in &elements {
            let text = self.standardize(tree.text(element));
            tree.set_text(element, text);
            let tail = self.standardize(tree.tail(element));
            tree.set_tail(element, tail);
        }
        for element in elements {
            for part in [Part::Text, Part::Tail] {
                let spans: Vec<Markup> = self
                    .span
                    .find_iter(part.read(tree, element))
                    .flatten()
                    .map(|found| Markup {
                        span: found.start()..found.end(),
                        attrs: vec![("class".to_string(), QUOTATION_CLASS.to_string())],
                    })
                    .collect();
                for quotation in add_markups(tree, element, part, "span", spans) {
                    let stripped = tree.text(quotation).trim_matches(['<', '>']).to_string();
                    tree.set_text(quotation, stripped);
                }
            }
        }
    }
}
