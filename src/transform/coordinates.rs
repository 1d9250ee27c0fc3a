//! Structural coordinates ("Article 5", "ANNEX II") found in headings.

use std::fmt;

use regex::Regex;

use crate::config::Language;
use crate::error::Result;

pub const LATINS: &[&str] = &[
    "bis", "ter", "quater", "quinquies", "sexies", "septies", "octies", "novies", "nonies",
    "decies", "undecies", "duodecies", "terdecies", "quaterdecies", "quindecies", "sexdecies",
    "septdecies", "octodecies", "novodecies", "vicies",
];

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Axis {
    Part,
    Title,
    Chapter,
    Section,
    Subsection,
    Article,
    Annex,
    Appendix,
    Paragraph,
    Subparagraph,
    Point,
    Letter,
    Recital,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Role {
    Container,
    Leaf,
    Sub,
}

impl Axis {
    pub const ALL: [Axis; 13] = [
        Axis::Part,
        Axis::Title,
        Axis::Chapter,
        Axis::Section,
        Axis::Subsection,
        Axis::Article,
        Axis::Annex,
        Axis::Appendix,
        Axis::Paragraph,
        Axis::Subparagraph,
        Axis::Point,
        Axis::Letter,
        Axis::Recital,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Part => "PRT",
            Self::Title => "TIT",
            Self::Chapter => "CHP",
            Self::Section => "SEC",
            Self::Subsection => "SUB",
            Self::Article => "ART",
            Self::Annex => "ANX",
            Self::Appendix => "APX",
            Self::Paragraph => "PAR",
            Self::Subparagraph => "SUBPAR",
            Self::Point => "PT",
            Self::Letter => "LTR",
            Self::Recital => "REC",
        }
    }

    pub fn role(self) -> Role {
        match self {
            Self::Part | Self::Title | Self::Chapter | Self::Section | Self::Subsection => {
                Role::Container
            }
            Self::Article | Self::Annex | Self::Appendix => Role::Leaf,
            _ => Role::Sub,
        }
    }

    fn words(self, language: Language) -> &'static [&'static str] {
        match (self, language) {
            (Self::Part, Language::En) => &["Part"],
            (Self::Part, Language::De) => &["Teil"],
            (Self::Part, Language::Es) => &["Parte"],
            (Self::Title, Language::En) => &["Title"],
            (Self::Title, Language::De) => &["Titel"],
            (Self::Title, Language::Es) => &["Título", "Titulo"],
            (Self::Chapter, Language::En) => &["Chapter"],
            (Self::Chapter, Language::De) => &["Kapitel"],
            (Self::Chapter, Language::Es) => &["Capítulo", "Capitulo"],
            (Self::Section, Language::En) => &["Section"],
            (Self::Section, Language::De) => &["Abschnitt"],
            (Self::Section, Language::Es) => &["Sección", "Seccion"],
            (Self::Subsection, Language::En) => &["Subsection", "Sub-section"],
            (Self::Subsection, Language::De) => &["Unterabschnitt"],
            (Self::Subsection, Language::Es) => &["Subsección", "Subseccion"],
            (Self::Article, Language::En) => &["Article"],
            (Self::Article, Language::De) => &["Artikel"],
            (Self::Article, Language::Es) => &["Artículo", "Articulo"],
            (Self::Annex, Language::En) => &["Annex"],
            (Self::Annex, Language::De) => &["Anhang"],
            (Self::Annex, Language::Es) => &["Anexo"],
            (Self::Appendix, Language::En) => &["Appendix"],
            (Self::Appendix, Language::De) => &["Anlage"],
            (Self::Appendix, Language::Es) => &["Apéndice", "Apendice"],
            (Self::Paragraph, Language::En) => &["Paragraph"],
            (Self::Paragraph, Language::De) => &["Absatz"],
            (Self::Paragraph, Language::Es) => &["Apartado"],
            (Self::Subparagraph, Language::En) => &["Subparagraph"],
            (Self::Subparagraph, Language::De) => &["Unterabsatz"],
            (Self::Subparagraph, Language::Es) => &["Párrafo"],
            (Self::Point, Language::En) => &["Point"],
            (Self::Point, Language::De) => &["Nummer"],
            (Self::Point, Language::Es) => &["Punto"],
            (Self::Letter, Language::En) => &["Letter"],
            (Self::Letter, Language::De) => &["Buchstabe"],
            (Self::Letter, Language::Es) => &["Letra"],
            (Self::Recital, Language::En) => &["Recital"],
            (Self::Recital, Language::De) => &["Erwägungsgrund"],
            (Self::Recital, Language::Es) => &["Considerando"],
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Standardized coordinate such as `ART_5` or `ANX`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StdCoordinate {
    pub axis: Axis,
    pub value: Option<String>,
    pub role: Role,
}

impl StdCoordinate {
    pub fn collated(&self) -> String {
        match &self.value {
            Some(value) => format!("{}_{}", self.axis, value),
            None => self.axis.to_string(),
        }
    }
}

/// Result of [`HeadingAnalyzer::analyze`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Heading {
    pub coordinate: StdCoordinate,
    /// The part of the text that states the coordinate.
    pub ordinate: String,
    pub title: Option<String>,
}

pub struct HeadingAnalyzer {
    latins: Regex,
    axes: Vec<(Axis, Regex)>,
}

impl HeadingAnalyzer {
    pub fn new(language: Language) -> Result<Self> {
        let latins = LATINS.join("|");
        let value = format!(
            r"(?:[0-9]+[a-z]{{0,3}}|[IVXLC]+[a-z]{{0,3}}|[A-Z])(?:\s+(?:{latins}))?"
        );
        let axes = Axis::ALL
            .into_iter()
            .map(|axis| {
                let words = axis.words(language).join("|");
                let pattern = format!(r"^(?i:{words})(?:\s+(?P<value>{value}))?\b");
                Ok((axis, Regex::new(&pattern)?))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            latins: Regex::new(&format!("^(?:{latins})$"))?,
            axes,
        })
    }

    fn locate(&self, text: &str) -> Option<(Axis, Option<String>, usize)> {
        self.axes.iter().find_map(|(axis, pattern)| {
            let captures = pattern.captures(text)?;
            let end = captures.get(0)?.end();
            let value = captures
                .name("value")
                .map(|value| value.as_str().split_whitespace().collect::<String>());
            Some((*axis, value, end))
        })
    }

    /// Splits a heading text into its coordinate and an embedded title.
    /// Returns `None` for texts that do not start with a coordinate.
    pub fn analyze(&self, text: &str) -> Option<Heading> {
        if text.is_empty() || text.starts_with('(') {
            return None;
        }
        let (first, mut second, mut rest) = split_words(text);
        if self.latins.is_match(&rest) {
            second = format!("{second} {rest}");
            rest.clear();
        }
        let mut ordinate = format!("{first} {second}").trim().to_string();

        let (axis, mut value, end) = self.locate(&ordinate)?;
        if end != ordinate.len() {
            if end != first.len() {
                return None;
            }
            ordinate = first;
            rest = format!("{} {}", second.trim(), rest.trim()).trim().to_string();
            value = None;
        }
        if axis == Axis::Annex && value.is_none() && rest.chars().count() == 1 {
            value = Some(rest.clone());
            ordinate = format!("{ordinate} {rest}");
            rest.clear();
        } else if rest.chars().count() == 1 {
            value = value.map(|value| format!("{value}_{rest}"));
            ordinate = format!("{ordinate} {rest}");
            rest.clear();
        }
        Some(Heading {
            coordinate: StdCoordinate {
                axis,
                value,
                role: axis.role(),
            },
            ordinate,
            title: (!rest.is_empty()).then_some(rest),
        })
    }
}

/// First word, second word and the remainder, like `str.split(maxsplit=2)`.
fn split_words(text: &str) -> (String, String, String) {
    let mut words = Vec::with_capacity(2);
    let mut rest = text.trim();
    while words.len() < 2 && !rest.is_empty() {
        let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        words.push(rest[..end].to_string());
        rest = rest[end..].trim_start();
    }
    words.resize(2, String::new());
    let second = words.pop().unwrap_or_default();
    let first = words.pop().unwrap_or_default();
    (first, second, rest.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analyze(analyzer: &HeadingAnalyzer, text: &str) -> Option<(String, String, Option<String>)> {
        analyzer
            .analyze(text)
            .map(|heading| (heading.coordinate.collated(), heading.ordinate, heading.title))
    }

    #[test]
    fn english_headings() {
        let analyzer = HeadingAnalyzer::new(Language::En).unwrap();
        assert_eq!(
            analyze(&analyzer, "Chapter 5"),
            Some(("CHP_5".to_string(), "Chapter 5".to_string(), None))
        );
        assert_eq!(
            analyze(&analyzer, "ANNEX"),
            Some(("ANX".to_string(), "ANNEX".to_string(), None))
        );
        assert_eq!(
            analyze(&analyzer, "ANNEX II B"),
            Some(("ANX_II_B".to_string(), "ANNEX II B".to_string(), None))
        );
        assert_eq!(
            analyze(&analyzer, "ANNEX Correlation Tables"),
            Some((
                "ANX".to_string(),
                "ANNEX".to_string(),
                Some("Correlation Tables".to_string())
            ))
        );
        assert_eq!(
            analyze(&analyzer, "Subsection IIa"),
            Some(("SUB_IIa".to_string(), "Subsection IIa".to_string(), None))
        );
        assert_eq!(
            analyze(&analyzer, "Article 5 bis"),
            Some(("ART_5bis".to_string(), "Article 5 bis".to_string(), None))
        );
    }

    #[test]
    fn english_non_headings() {
        let analyzer = HeadingAnalyzer::new(Language::En).unwrap();
        assert_eq!(analyze(&analyzer, "Article 10."), None);
        assert_eq!(analyze(&analyzer, ""), None);
        assert_eq!(analyze(&analyzer, "Yeah, Whatever"), None);
        assert_eq!(analyze(&analyzer, "(Article 7)"), None);
    }

    #[test]
    fn german_compound_is_no_heading() {
        let analyzer = HeadingAnalyzer::new(Language::De).unwrap();
        assert_eq!(analyze(&analyzer, "EG-Fusionskontrollverordnung"), None);
        assert_eq!(
            analyze(&analyzer, "Artikel 3").map(|heading| heading.0),
            Some("ART_3".to_string())
        );
    }

    #[test]
    fn embedded_title_after_single_word_axis() {
        let analyzer = HeadingAnalyzer::new(Language::Es).unwrap();
        let heading = analyzer.analyze("ANEXO Tabla de correspondencias").unwrap();
        assert_eq!(heading.coordinate.axis, Axis::Annex);
        assert_eq!(heading.title.as_deref(), Some("Tabla de correspondencias"));
    }
}
