use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::{DEFAULT_DOMAIN, Language};

#[derive(Parser, Debug)]
#[command(
    name = "lexparency",
    version,
    about = "Transformation of EUR-Lex acts into structured, hyperlinked HTML"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Transform(TransformArgs),
    Inspect(InspectArgs),
    Status(StatusArgs),
}

#[derive(Args, Debug, Clone)]
pub struct TransformArgs {
    #[arg(long)]
    pub celex: String,

    #[arg(long, value_enum, ignore_case = true)]
    pub language: Language,

    /// Formex (XML) representation; preferred over the HTML one.
    #[arg(long)]
    pub fmx: Option<PathBuf>,

    #[arg(long)]
    pub html: Option<PathBuf>,

    /// Metadata (JSON) to join into the document header.
    #[arg(long)]
    pub meta: Option<PathBuf>,

    /// Version folder, e.g. a consolidation date.
    #[arg(long, default_value = "initial")]
    pub version: String,

    #[arg(long, default_value = DEFAULT_DOMAIN)]
    pub domain: String,

    #[arg(long, default_value = ".cache/lexparency")]
    pub cache_root: PathBuf,

    #[arg(long)]
    pub out: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct InspectArgs {
    #[arg(long, value_enum, ignore_case = true)]
    pub language: Language,

    #[arg(long, default_value = DEFAULT_DOMAIN)]
    pub domain: String,

    /// Raw document; `.xml` and `.fmx` files are read as Formex.
    pub file: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    #[arg(long, default_value = ".cache/lexparency")]
    pub cache_root: PathBuf,
}
