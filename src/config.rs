//! Language-dependent vocabulary of the transformation.

use std::fmt;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

pub const DEFAULT_DOMAIN: &str = "eu";

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, ValueEnum, Serialize, Deserialize)]
#[value(rename_all = "UPPER")]
#[serde(rename_all = "UPPERCASE")]
pub enum Language {
    En,
    De,
    Es,
}

impl Language {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::En => "EN",
            Self::De => "DE",
            Self::Es => "ES",
        }
    }

    pub fn html_lang(self) -> &'static str {
        match self {
            Self::En => "en",
            Self::De => "de",
            Self::Es => "es",
        }
    }

    pub fn preamble_name(self) -> &'static str {
        match self {
            Self::En => "Recitals",
            Self::De => "Erwägungsgründe",
            Self::Es => "Consideraciones",
        }
    }

    pub fn toc_heads(self) -> &'static [&'static str] {
        match self {
            Self::En => &["TABLE OF CONTENTS", "CONTENT", "CONTENTS"],
            Self::Es => &["CUADRO DE MATERIAS", "ÍNDICE", "CONTENIDO"],
            Self::De => &["INHALTSANGABE", "INHALTSVERZEICHNIS", "INHALT"],
        }
    }

    pub fn repealed_by(self) -> &'static str {
        match self {
            Self::En => "repealed by",
            Self::De => "aufgehoben durch",
            Self::Es => "derogado por",
        }
    }

    pub fn final_title(self) -> &'static str {
        match self {
            Self::En => "Final",
            Self::De => "Abschluss",
            Self::Es => "Final",
        }
    }

    /// Prefix of a definition anchor's title.
    pub fn definition_word(self) -> &'static str {
        match self {
            Self::En | Self::De => "Definition",
            Self::Es => "Definición",
        }
    }

    /// Case-insensitive pattern of leaf titles announcing amendments.
    pub fn amendment_title_pattern(self) -> &'static str {
        match self {
            Self::En => r"(?i)^Amendments? (of|to) ",
            Self::De => r"(?i)^Änderung(en)? der ",
            Self::Es => r"(?i)^Modificaciones de(l| la)",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
