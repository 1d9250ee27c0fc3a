//! List item labels: recognition and disambiguation.

use std::collections::BTreeSet;
use std::fmt;

use fancy_regex::Regex;

use crate::config::Language;
use crate::error::Result;

/// Recursion bound of the ambivalence resolution.
const MAX_RESOLUTION_ROUNDS: usize = 8;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum ItemTag {
    Nump,
    Numpt,
    Numbr,
    Alpha,
    Roman,
    Dash,
}

impl ItemTag {
    /// Nesting preference, outermost first.
    pub const HIERARCHY: [ItemTag; 6] = [
        ItemTag::Nump,
        ItemTag::Numpt,
        ItemTag::Numbr,
        ItemTag::Alpha,
        ItemTag::Roman,
        ItemTag::Dash,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Nump => "nump",
            Self::Numpt => "numpt",
            Self::Numbr => "numbr",
            Self::Alpha => "alpha",
            Self::Roman => "roman",
            Self::Dash => "dash",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::HIERARCHY
            .into_iter()
            .find(|tag| tag.as_str() == value)
    }

    pub fn ordered(self) -> bool {
        self != Self::Dash
    }

    pub fn first_item(self) -> Option<&'static str> {
        match self {
            Self::Nump | Self::Numpt | Self::Numbr => Some("1"),
            Self::Alpha => Some("a"),
            Self::Roman => Some("i"),
            Self::Dash => None,
        }
    }

    pub fn second_item(self) -> Option<&'static str> {
        match self {
            Self::Nump | Self::Numpt | Self::Numbr => Some("2"),
            Self::Alpha => Some("b"),
            Self::Roman => Some("ii"),
            Self::Dash => None,
        }
    }
}

impl fmt::Display for ItemTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Candidate tags of one label and its value without decoration.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TagProposal {
    pub tags: BTreeSet<ItemTag>,
    pub inner: Option<String>,
}

impl TagProposal {
    pub fn single(&self) -> Option<ItemTag> {
        match self.tags.len() {
            1 => self.tags.iter().next().copied(),
            _ => None,
        }
    }
}

struct ItemPattern {
    tag: ItemTag,
    pattern: Regex,
    decoration: &'static str,
}

pub fn to_roman(mut value: usize) -> String {
    const DIGITS: [(usize, &str); 6] = [(40, "xl"), (10, "x"), (9, "ix"), (5, "v"), (4, "iv"), (1, "i")];
    let mut result = String::new();
    for (amount, digit) in DIGITS {
        while value >= amount {
            result.push_str(digit);
            value -= amount;
        }
    }
    result
}

fn romans_alternation() -> String {
    let mut romans: Vec<String> = (1..40).map(to_roman).collect();
    romans.sort_by_key(|roman| std::cmp::Reverse(roman.len()));
    romans.join("|")
}

pub struct ListItemPatterns {
    patterns: Vec<ItemPattern>,
    label_generic: Regex,
}

impl ListItemPatterns {
    pub fn new(language: Language) -> Result<Self> {
        let romans = romans_alternation();
        let mut sources: Vec<(ItemTag, String, &'static str)> = match language {
            Language::De => vec![(ItemTag::Nump, r"^\([0-9]{1,3}\)".to_string(), "()")],
            Language::En | Language::Es => {
                let of = if language == Language::Es { " de" } else { " of" };
                vec![
                    (ItemTag::Nump, "^[1-9][0-9]{0,3}\\.\u{a0}{0,3}".to_string(), "(). \u{a0}"),
                    (ItemTag::Numpt, format!(r"^[0-9]{{1,3}}\.?(?!([0-9/();]|{of}))"), "."),
                    (ItemTag::Numbr, r"^\([0-9]{1,3}\)".to_string(), "()"),
                ]
            }
        };
        sources.push((ItemTag::Alpha, r"^\([a-z]\)".to_string(), "()"));
        sources.push((ItemTag::Roman, format!(r"^\(({romans})\)"), "()"));
        sources.push((ItemTag::Dash, "^(&mdash;|\u{2014})".to_string(), ""));

        let generic = sources
            .iter()
            .map(|(_, source, _)| format!("({})", source.trim_start_matches('^')))
            .collect::<Vec<_>>()
            .join("|");
        let label_generic = Regex::new(&format!("^({generic})"))?;

        let patterns = sources
            .into_iter()
            .map(|(tag, source, decoration)| {
                Ok(ItemPattern {
                    tag,
                    pattern: Regex::new(&source)?,
                    decoration,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            patterns,
            label_generic,
        })
    }

    /// The label at the start of `text`, if any.
    pub fn label<'t>(&self, text: &'t str) -> Option<&'t str> {
        match self.label_generic.find(text) {
            Ok(Some(found)) => Some(found.as_str()),
            _ => None,
        }
    }

    pub fn is_match(&self, tag: ItemTag, text: &str) -> bool {
        self.patterns
            .iter()
            .find(|pattern| pattern.tag == tag)
            .is_some_and(|pattern| pattern.pattern.is_match(text).unwrap_or(false))
    }

    /// The part of `text` matched by the pattern of `tag`.
    pub fn matched<'t>(&self, tag: ItemTag, text: &'t str) -> Option<&'t str> {
        let pattern = self.patterns.iter().find(|pattern| pattern.tag == tag)?;
        match pattern.pattern.find(text) {
            Ok(Some(found)) => Some(found.as_str()),
            _ => None,
        }
    }

    /// All candidate tags, without looking at neighbours.
    pub fn propose(&self, label: &str) -> TagProposal {
        let mut tags = BTreeSet::new();
        let mut inner = None;
        for item in &self.patterns {
            if let Ok(Some(found)) = item.pattern.find(label) {
                tags.insert(item.tag);
                if inner.is_none() && !item.decoration.is_empty() {
                    let decoration: Vec<char> = item.decoration.chars().collect();
                    inner = Some(found.as_str().trim_matches(&decoration[..]).to_string());
                }
            }
        }
        TagProposal { tags, inner }
    }

    pub fn tag(&self, label: &str) -> TagProposal {
        let mut proposals = self.tag_sequence(&[label]);
        proposals.remove(0)
    }

    /// Tags a sequence of labels, resolving ambivalences by their neighbours.
    pub fn tag_sequence(&self, labels: &[&str]) -> Vec<TagProposal> {
        let mut proposals: Vec<TagProposal> = labels.iter().map(|label| self.propose(label)).collect();
        for _ in 0..MAX_RESOLUTION_ROUNDS {
            if proposals.iter().all(|proposal| proposal.tags.len() <= 1) {
                return proposals;
            }
            resolve_ambivalences(&mut proposals);
        }
        for proposal in proposals.iter_mut().filter(|proposal| proposal.tags.len() > 1) {
            if let Some(tag) = ItemTag::HIERARCHY
                .into_iter()
                .find(|tag| proposal.tags.contains(tag))
            {
                proposal.tags = BTreeSet::from([tag]);
            }
        }
        proposals
    }
}

fn resolve_ambivalences(proposals: &mut [TagProposal]) {
    let ambivalent: Vec<bool> = proposals.iter().map(|proposal| proposal.tags.len() > 1).collect();
    for k in 0..proposals.len() {
        if !ambivalent[k] {
            continue;
        }
        if k + 1 < proposals.len() && !ambivalent[k + 1] {
            let subsequent = proposals[k + 1].clone();
            if let Some(tag) = subsequent.single()
                && subsequent.tags.is_subset(&proposals[k].tags)
                && tag.first_item() != subsequent.inner.as_deref()
            {
                proposals[k].tags = subsequent.tags;
                continue;
            }
        }
        if k > 0 && !ambivalent[k - 1] {
            let preceding = proposals[k - 1].clone();
            if let Some(tag) = preceding.single()
                && preceding.tags.is_subset(&proposals[k].tags)
            {
                if tag.first_item() != proposals[k].inner.as_deref() {
                    proposals[k].tags = preceding.tags;
                } else {
                    proposals[k].tags.remove(&tag);
                }
                continue;
            }
        }
        // Deepest candidate of the hierarchy wins.
        if let Some(tag) = ItemTag::HIERARCHY
            .into_iter()
            .rev()
            .find(|tag| proposals[k].tags.contains(tag))
        {
            proposals[k].tags = BTreeSet::from([tag]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(patterns: &ListItemPatterns, labels: &[&str]) -> Vec<&'static str> {
        patterns
            .tag_sequence(labels)
            .into_iter()
            .map(|proposal| proposal.single().map(ItemTag::as_str).unwrap_or("?"))
            .collect()
    }

    #[test]
    fn romans_are_generated() {
        assert_eq!(to_roman(4), "iv");
        assert_eq!(to_roman(19), "xix");
        assert_eq!(to_roman(39), "xxxix");
    }

    #[test]
    fn proposals_carry_inner_value() {
        let patterns = ListItemPatterns::new(Language::En).unwrap();
        let proposal = patterns.propose("(iv) the text");
        assert!(proposal.tags.contains(&ItemTag::Roman));
        assert_eq!(proposal.inner.as_deref(), Some("iv"));
        assert_eq!(patterns.propose("12. Text").inner.as_deref(), Some("12"));
        assert!(patterns.propose("— dashed").tags.contains(&ItemTag::Dash));
    }

    #[test]
    fn numpt_rejects_references() {
        let patterns = ListItemPatterns::new(Language::En).unwrap();
        assert!(!patterns.is_match(ItemTag::Numpt, "2010/35 Directive"));
        assert!(!patterns.is_match(ItemTag::Numpt, "5 of Regulation"));
        assert!(patterns.is_match(ItemTag::Numpt, "5. Member States"));
    }

    #[test]
    fn roman_and_alpha_are_told_apart_by_neighbours() {
        let patterns = ListItemPatterns::new(Language::En).unwrap();
        assert_eq!(tags(&patterns, &["(i)", "(ii)", "(iii)"]), ["roman", "roman", "roman"]);
        assert_eq!(
            tags(&patterns, &["(g)", "(h)", "(i)", "(j)"]),
            ["alpha", "alpha", "alpha", "alpha"]
        );
        assert_eq!(tags(&patterns, &["(u)", "(v)", "(w)"]), ["alpha", "alpha", "alpha"]);
    }

    #[test]
    fn single_ambiguous_label_falls_back_to_hierarchy() {
        // Context-insensitive: a lone "(i)" cannot be decided and is taken as roman.
        let patterns = ListItemPatterns::new(Language::En).unwrap();
        assert_eq!(tags(&patterns, &["(i)"]), ["roman"]);
    }

    #[test]
    fn german_labels() {
        let patterns = ListItemPatterns::new(Language::De).unwrap();
        assert_eq!(tags(&patterns, &["(1)", "(2)"]), ["nump", "nump"]);
        assert_eq!(patterns.label("(3) Die Mitgliedstaaten"), Some("(3)"));
        assert_eq!(patterns.label("3. Die Mitgliedstaaten"), None);
    }

    #[test]
    fn generic_label_matches_every_kind() {
        let patterns = ListItemPatterns::new(Language::En).unwrap();
        assert_eq!(patterns.label("(a) text"), Some("(a)"));
        assert_eq!(patterns.label("(xii) text"), Some("(xii)"));
        assert_eq!(patterns.label("— text"), Some("—"));
        assert_eq!(patterns.label("text"), None);
    }
}
