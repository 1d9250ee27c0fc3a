//! Transformation of raw legal acts (Formex XML or EUR-Lex HTML) into the
//! structured, hyperlinked HTML document model.

pub mod article;
pub mod conductor;
pub mod coordinates;
pub mod definitions;
pub mod document;
pub mod formex;
pub mod html;
pub mod liap;
pub mod markup;
pub mod quotation;
pub mod references;
pub mod skeleton;
pub mod special;

use regex::Regex;

pub use conductor::{Dialect, SourceFormat, TransformOutcome, Transformed, transform};

use crate::config::Language;
use crate::error::Result;
use coordinates::{HeadingAnalyzer, LATINS};
use liap::ListItemPatterns;
use quotation::QuotationMarker;
use references::{PatternAnnotator, ReferenceAnnotator};

/// Compiled language-dependent components shared by all steps of one run.
pub struct Toolkit {
    pub language: Language,
    pub domain: String,
    pub items: ListItemPatterns,
    pub headings: HeadingAnalyzer,
    pub quotations: QuotationMarker,
    pub amendment: Regex,
    pub latins: Regex,
    annotator: Box<dyn ReferenceAnnotator>,
}

impl Toolkit {
    pub fn new(language: Language, domain: &str) -> Result<Self> {
        Ok(Self {
            language,
            domain: domain.to_string(),
            items: ListItemPatterns::new(language)?,
            headings: HeadingAnalyzer::new(language)?,
            quotations: QuotationMarker::new()?,
            amendment: Regex::new(language.amendment_title_pattern())?,
            latins: Regex::new(&format!(r"^(?:{})\b", LATINS.join("|")))?,
            annotator: Box::new(PatternAnnotator::new(language)?),
        })
    }

    /// Replaces the default pattern-based citation recognizer.
    pub fn with_annotator(mut self, annotator: Box<dyn ReferenceAnnotator>) -> Self {
        self.annotator = annotator;
        self
    }

    pub fn annotator(&self) -> &dyn ReferenceAnnotator {
        self.annotator.as_ref()
    }

    /// Url prefix of documents hosted under the configured domain.
    pub fn hosted_prefix(&self) -> String {
        format!("/{}/", self.domain)
    }
}
