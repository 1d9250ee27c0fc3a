//! Recognition of legal citations and their conversion into hyperlinks.

use std::ops::Range;

use regex::{Captures, Regex};

use super::markup::{Markup, Part, add_markups};
use crate::config::Language;
use crate::error::Result;
use crate::metadata::url_from_celex;
use crate::tree::{NodeId, Tree};

/// A recognized citation inside a text.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Reference {
    pub span: Range<usize>,
    pub href: String,
    pub title: String,
}

/// Default targets for citations that do not name their document.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct LinkContext {
    /// Url of the document that bare citations refer to, e.g. `/eu/32013R0575/`.
    pub document: Option<String>,
    /// Id of the enclosing container, e.g. `toc-CHP_2`.
    pub container: Option<String>,
}

impl LinkContext {
    pub fn document(url: impl Into<String>) -> Self {
        Self {
            document: Some(url.into()),
            container: None,
        }
    }

    pub fn container(id: impl Into<String>) -> Self {
        Self {
            document: None,
            container: Some(id.into()),
        }
    }
}

pub trait ReferenceAnnotator {
    fn annotate(&self, text: &str, context: &LinkContext) -> Vec<Reference>;

    fn hrefs(&self, text: &str) -> Vec<String> {
        self.annotate(text, &LinkContext::default())
            .into_iter()
            .map(|reference| reference.href)
            .collect()
    }
}

struct Vocabulary {
    acts: &'static str,
    families: &'static str,
    numbers: &'static str,
    article: &'static str,
    annex: &'static str,
    of: &'static str,
    this: &'static str,
    containers: &'static [(&'static str, &'static str)],
}

fn vocabulary(language: Language) -> Vocabulary {
    match language {
        Language::En => Vocabulary {
            acts: "Regulation|Directive|Decision",
            families: "EU, Euratom|EU|EC|EEC|Euratom",
            numbers: r"No\.?|Nr\.|№",
            article: "Articles?",
            annex: "Annex(?:es)?",
            of: r"of\s+(?:the\s+)?",
            this: r"this\s+",
            containers: &[("chapter", "CHP"), ("section", "SEC"), ("title", "TIT"), ("part", "PRT")],
        },
        Language::De => Vocabulary {
            acts: "Verordnung|Richtlinie|Beschluss|Beschlusses|Verordnungen|Richtlinien",
            families: "EU, Euratom|EU|EG|EWG|Euratom",
            numbers: r"Nr\.|№",
            article: "Artikels?|Artikeln",
            annex: "Anhangs?|Anhängen|Anhang",
            of: r"(?:der|des)\s+",
            this: r"(?:dieses|diesem|dieser)\s+",
            containers: &[
                ("kapitel", "CHP"),
                ("abschnitt", "SEC"),
                ("titel", "TIT"),
                ("teil", "PRT"),
            ],
        },
        Language::Es => Vocabulary {
            acts: "Reglamento|Directiva|Decisión",
            families: "UE, Euratom|UE|CE|CEE|Euratom",
            numbers: r"n\.º|nº|№",
            article: "artículos?",
            annex: "anexos?",
            of: r"(?:del|de la|de)\s+",
            this: r"(?:el presente|la presente|este|esta)\s+",
            containers: &[
                ("capítulo", "CHP"),
                ("sección", "SEC"),
                ("título", "TIT"),
                ("parte", "PRT"),
            ],
        },
    }
}

/// Regex based citation recognizer for the three supported languages.
pub struct PatternAnnotator {
    language: Language,
    act: Regex,
    coordinate: Regex,
    act_suffix: Regex,
    this_container: Regex,
    containers: &'static [(&'static str, &'static str)],
}

impl PatternAnnotator {
    pub fn new(language: Language) -> Result<Self> {
        let words = vocabulary(language);
        let act = format!(
            r"(?P<kind>{acts})\s+(?:\((?P<family>{families})\)\s+)?(?:(?P<no>{numbers})\s*)?(?P<first>[0-9]{{1,4}})/(?P<second>[0-9]{{1,4}})(?:/(?:EU|EC|EEC|EG|EWG|UE|CE|CEE|Euratom))?\b",
            acts = words.acts,
            families = words.families,
            numbers = words.numbers,
        );
        let coordinate = format!(
            r"\b(?P<axis>(?i:{article})|(?i:{annex}))\s+(?P<value>[0-9]+[a-z]?|[IVXLC]+[a-z]?)\b(?:\s*\((?P<par>[0-9]{{1,3}}[a-z]?)\))?",
            article = words.article,
            annex = words.annex,
        );
        let containers = words
            .containers
            .iter()
            .map(|(word, _)| *word)
            .collect::<Vec<_>>()
            .join("|");
        Ok(Self {
            language,
            act_suffix: Regex::new(&format!(r"^\s+(?i:{})(?:{})", words.of, act))?,
            act: Regex::new(&act)?,
            coordinate: Regex::new(&coordinate)?,
            this_container: Regex::new(&format!(
                r"(?i)\b{}(?P<container>{containers})\b",
                words.this
            ))?,
            containers: words.containers,
        })
    }

    pub fn language(&self) -> Language {
        self.language
    }

    fn act_celex(&self, captures: &Captures) -> Option<String> {
        let kind = captures.name("kind")?.as_str();
        let letter = if ["Regul", "Regla", "Verord"].iter().any(|prefix| kind.starts_with(prefix)) {
            'R'
        } else if ["Directiv", "Richtlinie"].iter().any(|prefix| kind.starts_with(prefix)) {
            'L'
        } else {
            'D'
        };
        let first = captures.name("first")?.as_str();
        let second = captures.name("second")?.as_str();
        let (number, year) = if captures.name("no").is_some() {
            (first, second)
        } else {
            (second, first)
        };
        let year = match year.len() {
            4 => year.to_string(),
            2 => format!("19{year}"),
            _ => return None,
        };
        let number: u32 = number.parse().ok()?;
        Some(format!("3{year}{letter}{number:04}"))
    }

    fn acts(&self, text: &str) -> Vec<(Range<usize>, String)> {
        self.act
            .captures_iter(text)
            .filter_map(|captures| {
                let whole = captures.get(0)?;
                let celex = self.act_celex(&captures)?;
                Some((whole.range(), url_from_celex(self.language, &celex)))
            })
            .collect()
    }

    fn coordinates(&self, text: &str, context: &LinkContext) -> Vec<Reference> {
        let mut result = Vec::new();
        for captures in self.coordinate.captures_iter(text) {
            let (Some(whole), Some(axis), Some(value)) =
                (captures.get(0), captures.name("axis"), captures.name("value"))
            else {
                continue;
            };
            let axis = if axis.as_str().to_lowercase().starts_with("ar") {
                "ART"
            } else {
                "ANX"
            };
            let leaf = format!("{axis}_{}", value.as_str());
            let fragment = captures
                .name("par")
                .map(|par| format!("{leaf}-{}", par.as_str()));
            let mut span = whole.range();
            let mut document = context.document.clone();
            if let Some(suffix) = self.act_suffix.captures(&text[span.end..]) {
                if let (Some(matched), Some(celex)) = (suffix.get(0), self.act_celex(&suffix)) {
                    span.end += matched.end();
                    document = Some(url_from_celex(self.language, &celex));
                }
            }
            let href = match document {
                Some(document) if document.starts_with('/') => match fragment {
                    Some(fragment) => format!("{document}{leaf}/#{fragment}"),
                    None => format!("{document}{leaf}/"),
                },
                Some(document) => document,
                None => format!("#{}", fragment.unwrap_or(leaf)),
            };
            result.push(Reference {
                title: text[span.clone()].to_string(),
                span,
                href,
            });
        }
        result
    }

    fn container(&self, text: &str, context: &LinkContext) -> Vec<Reference> {
        let Some(container) = &context.container else {
            return Vec::new();
        };
        let last_axis = container
            .rsplit('-')
            .next()
            .and_then(|ordinate| ordinate.split('_').next())
            .unwrap_or_default();
        self.this_container
            .captures_iter(text)
            .filter_map(|captures| {
                let whole = captures.get(0)?;
                let word = captures.name("container")?.as_str().to_lowercase();
                let (_, axis) = self.containers.iter().find(|(known, _)| *known == word)?;
                (*axis == last_axis).then(|| Reference {
                    span: whole.range(),
                    href: format!("#{container}"),
                    title: whole.as_str().to_string(),
                })
            })
            .collect()
    }
}

impl ReferenceAnnotator for PatternAnnotator {
    fn annotate(&self, text: &str, context: &LinkContext) -> Vec<Reference> {
        let mut references = self.coordinates(text, context);
        for (span, href) in self.acts(text) {
            let overlaps = references
                .iter()
                .any(|known| known.span.start < span.end && span.start < known.span.end);
            if !overlaps {
                references.push(Reference {
                    title: text[span.clone()].to_string(),
                    span,
                    href,
                });
            }
        }
        references.extend(self.container(text, context));
        references.sort_by_key(|reference| reference.span.start);
        references
    }
}

fn inside_anchor(tree: &Tree, node: NodeId) -> bool {
    tree.is(node, "a") || tree.closest(node, |tree, ancestor| tree.is(ancestor, "a")).is_some()
}

/// Turns recognized citations below `scope` (itself included) into anchors.
pub fn link(tree: &mut Tree, scope: NodeId, annotator: &dyn ReferenceAnnotator, context: &LinkContext) {
    for node in tree.iter(scope) {
        let mut parts = Vec::with_capacity(2);
        if !inside_anchor(tree, node) {
            parts.push(Part::Text);
        }
        let tail_owner = tree.parent(node);
        if node != scope && tail_owner.is_some_and(|owner| !inside_anchor(tree, owner)) {
            parts.push(Part::Tail);
        }
        for part in parts {
            let references = annotator.annotate(part.read(tree, node), context);
            if references.is_empty() {
                continue;
            }
            let markups = references
                .into_iter()
                .map(|reference| Markup {
                    span: reference.span,
                    attrs: vec![
                        ("href".to_string(), reference.href),
                        ("title".to_string(), reference.title),
                    ],
                })
                .collect();
            add_markups(tree, node, part, "a", markups);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hrefs(annotator: &PatternAnnotator, text: &str, context: &LinkContext) -> Vec<String> {
        annotator
            .annotate(text, context)
            .into_iter()
            .map(|reference| reference.href)
            .collect()
    }

    #[test]
    fn english_acts() {
        let annotator = PatternAnnotator::new(Language::En).unwrap();
        let none = LinkContext::default();
        assert_eq!(
            hrefs(&annotator, "Regulation (EU) No 575/2013 applies", &none),
            vec!["/eu/32013R0575/"]
        );
        assert_eq!(
            hrefs(&annotator, "repealing Directive 95/46/EC", &none),
            vec!["/eu/31995L0046/"]
        );
        assert_eq!(
            hrefs(&annotator, "Regulation (EU) 2016/679", &none),
            vec!["/eu/32016R0679/"]
        );
        assert_eq!(
            hrefs(&annotator, "Regulation (EEC) No 1408/71", &none),
            vec!["/eu/31971R1408/"]
        );
    }

    #[test]
    fn articles_and_context() {
        let annotator = PatternAnnotator::new(Language::En).unwrap();
        let none = LinkContext::default();
        assert_eq!(hrefs(&annotator, "referred to in Article 5", &none), vec!["#ART_5"]);
        assert_eq!(hrefs(&annotator, "Article 5(2) and Annex II", &none), vec!["#ART_5-2", "#ANX_II"]);
        let context = LinkContext::document("/eu/31995L0046/");
        assert_eq!(
            hrefs(&annotator, "Article 7", &context),
            vec!["/eu/31995L0046/ART_7/"]
        );
        let found = annotator.annotate("Article 92 of Regulation (EU) No 575/2013", &none);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].href, "/eu/32013R0575/ART_92/");
        assert_eq!(found[0].span, 0..41);
    }

    #[test]
    fn this_container_needs_matching_context() {
        let annotator = PatternAnnotator::new(Language::En).unwrap();
        let chapter = LinkContext::container("toc-CHP_2");
        assert_eq!(hrefs(&annotator, "in this Chapter", &chapter), vec!["#toc-CHP_2"]);
        let section = LinkContext::container("toc-CHP_2-SEC_1");
        assert!(hrefs(&annotator, "in this Chapter", &section).is_empty());
    }

    #[test]
    fn german_and_spanish_forms() {
        let german = PatternAnnotator::new(Language::De).unwrap();
        assert_eq!(
            hrefs(&german, "gemäß Artikel 4 der Verordnung (EU) Nr. 575/2013", &LinkContext::default()),
            vec!["/eu/32013R0575/ART_4/"]
        );
        let spanish = PatternAnnotator::new(Language::Es).unwrap();
        assert_eq!(
            hrefs(&spanish, "la Directiva 2013/36/UE", &LinkContext::default()),
            vec!["/eu/32013L0036/"]
        );
    }

    #[test]
    fn linking_skips_existing_anchors() {
        let annotator = PatternAnnotator::new(Language::En).unwrap();
        let mut tree = Tree::new("div");
        let root = tree.root();
        tree.set_text(root, "See Article 3 and ");
        let anchor = tree.create_with("a", &[("href", "#x")], "Article 4");
        tree.append(root, anchor);
        tree.set_tail(anchor, " or Article 6.");
        link(&mut tree, root, &annotator, &LinkContext::default());
        assert_eq!(
            tree.to_html(root),
            "<div>See <a href=\"#ART_3\" title=\"Article 3\">Article 3</a> and <a href=\"#x\">Article 4</a> or <a href=\"#ART_6\" title=\"Article 6\">Article 6</a>.</div>"
        );
    }
}
