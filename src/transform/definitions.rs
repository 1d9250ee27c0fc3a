//! Registry of defined terms and their occurrences.

use regex::Regex;
use tracing::debug;

use super::markup::Markup;
use super::quotation::QUOTATION_CLASS;
use crate::config::Language;
use crate::error::Result;
use crate::tree::{NodeId, Tree};

pub const DEFINITION_CLASS: &str = "lxp-definition";
pub const DEFINITION_TERM_CLASS: &str = "lxp-definition-term";

pub fn term_validity(term: &str) -> bool {
    if term.trim().is_empty() {
        return false;
    }
    let normal = term.chars().count() <= 200
        && term
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c.is_whitespace() || c == '/' || c == '-');
    if !normal || term.parse::<i64>().is_ok() {
        return false;
    }
    !(term.chars().count() == 1 && term.to_lowercase() == term)
}

fn add_delimiters(term: &str) -> String {
    let escaped = regex::escape(term);
    if term.chars().count() == 1 || term.to_uppercase() == term {
        format!(r"\b{escaped}\b")
    } else {
        format!(r"\b{escaped}[a-z]{{0,2}}\b")
    }
}

pub struct TechnicalTerms {
    language: Language,
    definitions: Vec<(String, Vec<(String, String)>)>,
    pattern: Option<Regex>,
}

impl TechnicalTerms {
    pub fn new(language: Language) -> Self {
        Self {
            language,
            definitions: Vec::new(),
            pattern: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    fn lookup(&self, term: &str) -> Option<&Vec<(String, String)>> {
        self.definitions
            .iter()
            .find(|(known, _)| known == term)
            .map(|(_, attrs)| attrs)
    }

    fn insert(&mut self, term: String, attrs: Vec<(String, String)>) {
        if self.lookup(&term).is_none() {
            self.definitions.push((term, attrs));
            self.pattern = None;
        }
    }

    fn create_attribs(&self, term: &str, target: &str) -> Vec<(String, String)> {
        vec![
            ("href".to_string(), format!("#{target}")),
            (
                "title".to_string(),
                format!("{}: {}", self.language.definition_word(), term),
            ),
        ]
    }

    /// Registers the quotations directly below an identified list item.
    pub fn append(&mut self, tree: &mut Tree, item: NodeId) {
        let Some(item_id) = tree.get(item, "id").map(str::to_string) else {
            return;
        };
        let mut is_definition = false;
        for quotation in tree.children(item).to_vec() {
            if !tree.matches(quotation, "span", Some(QUOTATION_CLASS))
                || !tree.children(quotation).is_empty()
            {
                continue;
            }
            let term = tree.textify(quotation, false, true);
            if !term_validity(&term) {
                continue;
            }
            let attrs = self.create_attribs(&term, &item_id);
            self.insert(term, attrs);
            tree.set(quotation, "class", DEFINITION_TERM_CLASS);
            is_definition = true;
        }
        if is_definition {
            tree.set(item, "class", DEFINITION_CLASS);
        }
    }

    fn pattern(&mut self) -> Result<Option<&Regex>> {
        if self.pattern.is_none() && !self.definitions.is_empty() {
            let alternation = self
                .definitions
                .iter()
                .map(|(term, _)| add_delimiters(term))
                .collect::<Vec<_>>()
                .join("|");
            self.pattern = Some(Regex::new(&alternation)?);
        }
        Ok(self.pattern.as_ref())
    }

    /// Resolves a found word, tolerating up to two trailing characters.
    pub fn get_definition(&mut self, word: &str) -> Option<Vec<(String, String)>> {
        for cut in 0..3 {
            let chars = word.chars().count();
            if cut >= chars {
                break;
            }
            let key: String = word.chars().take(chars - cut).collect();
            if let Some(attrs) = self.lookup(&key).cloned() {
                if key != word {
                    debug!(term = %key, form = %word, "caching inflected term");
                    self.definitions.push((word.to_string(), attrs.clone()));
                }
                return Some(attrs);
            }
        }
        None
    }

    pub fn locate(&mut self, text: &str) -> Result<Vec<Markup>> {
        let Some(pattern) = self.pattern()? else {
            return Ok(Vec::new());
        };
        let found: Vec<(usize, usize, String)> = pattern
            .find_iter(text)
            .map(|found| (found.start(), found.end(), found.as_str().to_string()))
            .collect();
        Ok(found
            .into_iter()
            .filter_map(|(start, end, word)| {
                self.get_definition(&word).map(|attrs| Markup {
                    span: start..end,
                    attrs,
                })
            })
            .collect())
    }
}
