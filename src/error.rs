//! Error types of the transformation engine.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransformError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("XML parsing error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("invalid lookaround pattern: {0}")]
    LookaroundPattern(#[from] Box<fancy_regex::Error>),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported document layout: {0}")]
    UnsupportedLayout(String),

    #[error("missing required element: {0}")]
    MissingElement(String),

    #[error("malformed structure at <{element}>: {reason}")]
    Malformed { element: String, reason: String },

    #[error("inconsistent metadata for `{field}`: {existing} vs. {incoming}")]
    InconsistentMetadata {
        field: String,
        existing: String,
        incoming: String,
    },
}

impl TransformError {
    pub fn malformed(element: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Malformed {
            element: element.into(),
            reason: reason.into(),
        }
    }
}

impl From<fancy_regex::Error> for TransformError {
    fn from(err: fancy_regex::Error) -> Self {
        Self::LookaroundPattern(Box::new(err))
    }
}

pub type Result<T> = std::result::Result<T, TransformError>;
