use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use crate::cli::InspectArgs;
use crate::model::{InspectReport, OutlineEntry};
use crate::transform::document::PREAMBLE_CLASS;
use crate::transform::skeleton::{ARTICLE_CLASS, CONTAINER_CLASS, HEADING_CLASS, SUB_CONTAINER_CLASS};
use crate::transform::{SourceFormat, Toolkit, TransformOutcome, transform};
use crate::tree::{NodeId, Tree};
use crate::util::read_source;

pub fn run(args: InspectArgs) -> Result<()> {
    let bytes = read_source(&args.file)?;
    let format = format_of(&args.file);
    let id_local = args
        .file
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("document")
        .to_string();
    let toolkit = Toolkit::new(args.language, &args.domain).context("failed to prepare transformation toolkit")?;

    info!(file = %args.file.display(), format = %format, "inspecting document");
    let outcome = transform(&bytes, format, &toolkit, &id_local)
        .with_context(|| format!("failed to transform {}", args.file.display()))?;
    let report = inspect(&args.file, outcome);

    let rendered = serde_json::to_string_pretty(&report).context("failed to serialize outline")?;
    println!("{rendered}");
    Ok(())
}

fn format_of(path: &Path) -> SourceFormat {
    match path.extension().and_then(|extension| extension.to_str()) {
        Some(extension) if extension.eq_ignore_ascii_case("xml") || extension.eq_ignore_ascii_case("fmx") => {
            SourceFormat::Fmx
        }
        _ => SourceFormat::Html,
    }
}

fn inspect(file: &Path, outcome: TransformOutcome) -> InspectReport {
    let file = file.display().to_string();
    let outcome = match outcome {
        TransformOutcome::Transformed(transformed) => {
            return InspectReport {
                file,
                outcome: "transformed".to_string(),
                dialect: Some(transformed.dialect.to_string()),
                outline: outline(&transformed.tree),
                leaf_failures: transformed.failures,
            };
        }
        TransformOutcome::Repealer => "repealer".to_string(),
        TransformOutcome::Redirect { target } => format!("redirect to {target}"),
        TransformOutcome::NotFound { format } => format!("{format} not found"),
    };
    InspectReport {
        file,
        outcome,
        dialect: None,
        leaf_failures: Vec::new(),
        outline: Vec::new(),
    }
}

fn kind_of(tree: &Tree, node: NodeId) -> Option<&'static str> {
    [
        (CONTAINER_CLASS, "container"),
        (SUB_CONTAINER_CLASS, "sub-container"),
        (ARTICLE_CLASS, "article"),
        (PREAMBLE_CLASS, "preamble"),
    ]
    .into_iter()
    .find(|(class, _)| tree.has_class(node, class))
    .map(|(_, kind)| kind)
}

/// The structural elements of a finished document in document order.
pub fn outline(tree: &Tree) -> Vec<OutlineEntry> {
    let root = tree.root();
    let mut entries = Vec::new();
    for node in tree.descendants(root) {
        let Some(kind) = kind_of(tree, node) else {
            continue;
        };
        let Some(id) = tree.get(node, "id") else {
            continue;
        };
        let depth = tree
            .ancestors(node)
            .into_iter()
            .filter(|&ancestor| kind_of(tree, ancestor).is_some())
            .count();
        let heading = tree
            .children(node)
            .iter()
            .find(|&&child| tree.has_class(child, HEADING_CLASS))
            .map(|&heading| tree.textify(heading, false, true))
            .unwrap_or_default();
        entries.push(OutlineEntry {
            depth,
            id: id.to_string(),
            kind: kind.to_string(),
            heading: heading.trim().to_string(),
        });
    }
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::parse_xml;

    #[test]
    fn formats_follow_extensions() {
        assert_eq!(format_of(Path::new("act.fmx")), SourceFormat::Fmx);
        assert_eq!(format_of(Path::new("act.XML")), SourceFormat::Fmx);
        assert_eq!(format_of(Path::new("act.html")), SourceFormat::Html);
        assert_eq!(format_of(Path::new("act")), SourceFormat::Html);
    }

    #[test]
    fn outline_lists_nested_structure() {
        let tree = parse_xml(
            br#"<body><div class="lxp-preamble" id="PRE"/><div class="lxp-container" id="toc-CHP_I"><div class="lxp-heading"><h1>CHAPTER I</h1> <h2>General provisions</h2></div><div class="lxp-article" id="ART_1"><div class="lxp-heading"><h1>Article 1</h1></div></div></div></body>"#,
        )
        .unwrap();
        let entries = outline(&tree);
        let summary: Vec<(usize, &str, &str)> = entries
            .iter()
            .map(|entry| (entry.depth, entry.id.as_str(), entry.kind.as_str()))
            .collect();
        assert_eq!(
            summary,
            vec![
                (0, "PRE", "preamble"),
                (0, "toc-CHP_I", "container"),
                (1, "ART_1", "article"),
            ]
        );
        assert_eq!(entries[1].heading, "CHAPTER I General provisions");
        assert_eq!(entries[2].heading, "Article 1");
    }

    #[test]
    fn final_outcomes_have_no_outline() {
        let report = inspect(Path::new("page.html"), TransformOutcome::Repealer);
        assert_eq!(report.outcome, "repealer");
        assert!(report.outline.is_empty());
        assert!(report.dialect.is_none());
    }
}
