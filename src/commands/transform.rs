use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::Utc;
use tracing::{info, warn};

use crate::cli::TransformArgs;
use crate::metadata::ActMetaData;
use crate::model::{SourceEntry, TransformRunReport};
use crate::registry::{REGISTRY_FILE, Registry, Representation, TransformationStatus};
use crate::transform::document::cleanse;
use crate::transform::{SourceFormat, Toolkit, TransformOutcome, special, transform as transform_document};
use crate::tree::Tree;
use crate::util::{ensure_directory, now_utc_string, read_source, sha256_bytes, write_json_pretty, write_text};

const REPORT_VERSION: u32 = 1;
const OUTPUT_FILE: &str = "refined.html";
const REPORT_FILE: &str = "report.json";

struct Source {
    format: SourceFormat,
    path: PathBuf,
    bytes: Vec<u8>,
    sha256: String,
}

/// What came out of trying the sources in order of preference.
struct Attempt {
    format: Option<SourceFormat>,
    outcome: Option<TransformOutcome>,
    warnings: Vec<String>,
}

pub fn run(args: TransformArgs) -> Result<()> {
    let started_at = now_utc_string();
    let sources = load_sources(&args)?;
    let given = load_metadata(&args)?;
    let toolkit = Toolkit::new(args.language, &args.domain).context("failed to prepare transformation toolkit")?;

    info!(
        celex = %args.celex,
        language = %args.language,
        version = %args.version,
        sources = sources.len(),
        "transform requested"
    );

    let attempt = attempt_sources(&sources, &toolkit, &args.celex);
    let used = attempt
        .format
        .and_then(|format| sources.iter().find(|source| source.format == format));

    let mut dialect = None;
    let mut redirect_target = None;
    let mut leaf_failures = Vec::new();
    let (tree, status) = match attempt.outcome {
        Some(TransformOutcome::Transformed(transformed)) => {
            let transformed = *transformed;
            let mut metadata = transformed.metadata;
            metadata
                .join(&given, true)
                .context("failed to join metadata into the transformed document")?;
            metadata.plausibility_check(Utc::now().date_naive());
            let mut tree = transformed.tree;
            metadata.insert_metas(&mut tree, args.language);
            special::treat(&args.celex, &mut tree)
                .with_context(|| format!("failed to apply special treatment for {}", args.celex))?;
            cleanse(&mut tree, &args.domain, &args.celex);

            dialect = Some(transformed.dialect.to_string());
            leaf_failures = transformed.failures;
            let status = match attempt.format {
                Some(SourceFormat::Fmx) => TransformationStatus::SuccessFmx,
                _ => TransformationStatus::SuccessHtm,
            };
            (tree, status)
        }
        Some(TransformOutcome::Repealer) => (stub(&given, &args), TransformationStatus::Repealer),
        Some(TransformOutcome::Redirect { target }) => {
            redirect_target = Some(target);
            (stub(&given, &args), TransformationStatus::Redirected)
        }
        Some(TransformOutcome::NotFound { format }) => {
            info!(celex = %args.celex, format = %format, "document not found, storing stub");
            (stub(&given, &args), TransformationStatus::Stubbed)
        }
        None => (stub(&given, &args), TransformationStatus::Failed),
    };

    let output_path = args.out.clone().unwrap_or_else(|| default_output_path(&args));
    write_text(&output_path, &tree.to_document())?;
    info!(path = %output_path.display(), status = %status, "wrote document");

    let report = TransformRunReport {
        report_version: REPORT_VERSION,
        celex: args.celex.clone(),
        version: args.version.clone(),
        language: args.language.to_string(),
        domain: args.domain.clone(),
        status: status.to_string(),
        started_at,
        finished_at: now_utc_string(),
        sources: sources
            .iter()
            .map(|source| SourceEntry {
                format: source.format.to_string(),
                path: source.path.display().to_string(),
                sha256: source.sha256.clone(),
            })
            .collect(),
        used_format: attempt.format.map(|format| format.to_string()),
        dialect,
        redirect_target: redirect_target.clone(),
        output_path: output_path.display().to_string(),
        leaf_failures,
        warnings: attempt.warnings,
    };
    let report_path = output_path.with_file_name(REPORT_FILE);
    write_json_pretty(&report_path, &report)?;

    ensure_directory(&args.cache_root)?;
    let mut registry = Registry::open(&args.cache_root.join(REGISTRY_FILE))?;
    registry.record(
        &args.domain,
        &Representation {
            celex: &args.celex,
            folder: &args.version,
            language: args.language,
            format: attempt.format.map_or("none", SourceFormat::as_str),
            status,
            source_sha256: used.map(|source| source.sha256.as_str()),
            url_html: redirect_target.as_deref(),
        },
    )?;

    info!(
        celex = %args.celex,
        status = %status,
        leaf_failures = report.leaf_failures.len(),
        report = %report_path.display(),
        "transform completed"
    );

    Ok(())
}

fn load_sources(args: &TransformArgs) -> Result<Vec<Source>> {
    let candidates = [(SourceFormat::Fmx, &args.fmx), (SourceFormat::Html, &args.html)];
    let mut sources = Vec::new();
    for (format, path) in candidates {
        let Some(path) = path else {
            continue;
        };
        let bytes = read_source(path)?;
        sources.push(Source {
            format,
            path: path.clone(),
            sha256: sha256_bytes(&bytes),
            bytes,
        });
    }
    if sources.is_empty() {
        bail!("at least one of --fmx or --html is required");
    }
    Ok(sources)
}

fn load_metadata(args: &TransformArgs) -> Result<ActMetaData> {
    let mut metadata = ActMetaData::new(&args.domain, &args.celex);
    if args.version != "initial" {
        metadata.version = Some(args.version.clone());
    }
    if let Some(path) = &args.meta {
        let raw = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
        let given: ActMetaData =
            serde_json::from_slice(&raw).with_context(|| format!("failed to parse {}", path.display()))?;
        metadata
            .join(&given, true)
            .with_context(|| format!("inconsistent metadata in {}", path.display()))?;
    }
    Ok(metadata)
}

/// Formex comes first; HTML is the fallback whenever Formex fails or is absent.
fn attempt_sources(sources: &[Source], toolkit: &Toolkit, celex: &str) -> Attempt {
    let mut warnings = Vec::new();
    let mut not_found = None;
    for source in sources {
        match transform_document(&source.bytes, source.format, toolkit, celex) {
            Ok(TransformOutcome::NotFound { format }) => {
                warnings.push(format!("{format} representation not found"));
                not_found = Some((source.format, TransformOutcome::NotFound { format }));
            }
            Ok(outcome) => {
                return Attempt {
                    format: Some(source.format),
                    outcome: Some(outcome),
                    warnings,
                };
            }
            Err(err) => {
                warn!(celex, format = %source.format, error = %err, "transformation failed");
                warnings.push(format!("{} transformation failed: {err}", source.format));
            }
        }
    }
    match not_found {
        Some((format, outcome)) => Attempt {
            format: Some(format),
            outcome: Some(outcome),
            warnings,
        },
        None => Attempt {
            format: None,
            outcome: None,
            warnings,
        },
    }
}

fn stub(metadata: &ActMetaData, args: &TransformArgs) -> Tree {
    let mut metadata = metadata.clone();
    metadata.plausibility_check(Utc::now().date_naive());
    metadata.to_html_stub(args.language)
}

fn default_output_path(args: &TransformArgs) -> PathBuf {
    output_directory(&args.cache_root, &args.domain, &args.celex, &args.version)
        .join(args.language.html_lang())
        .join(OUTPUT_FILE)
}

fn output_directory(cache_root: &Path, domain: &str, celex: &str, version: &str) -> PathBuf {
    cache_root.join(domain).join(celex).join(version)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Language;

    const NOT_FOUND_PAGE: &str = r#"<html><body><div class="alert alert-warning">The requested document does not exist.</div></body></html>"#;

    fn arguments(root: &Path) -> TransformArgs {
        TransformArgs {
            celex: "32016R0679".to_string(),
            language: Language::En,
            fmx: None,
            html: None,
            meta: None,
            version: "initial".to_string(),
            domain: "eu".to_string(),
            cache_root: root.join("cache"),
            out: None,
        }
    }

    fn report(args: &TransformArgs) -> serde_json::Value {
        let path = default_output_path(args).with_file_name(REPORT_FILE);
        serde_json::from_slice(&fs::read(path).unwrap()).unwrap()
    }

    #[test]
    fn sources_are_required() {
        let directory = tempfile::tempdir().unwrap();
        assert!(run(arguments(directory.path())).is_err());
    }

    #[test]
    fn missing_documents_are_stubbed() {
        let directory = tempfile::tempdir().unwrap();
        let html = directory.path().join("page.html");
        fs::write(&html, NOT_FOUND_PAGE).unwrap();
        let meta = directory.path().join("meta.json");
        fs::write(&meta, r#"{"title": "General Data Protection Regulation"}"#).unwrap();

        let mut args = arguments(directory.path());
        args.html = Some(html);
        args.meta = Some(meta);
        run(args.clone()).unwrap();

        let document = fs::read_to_string(default_output_path(&args)).unwrap();
        assert!(document.starts_with("<!DOCTYPE html>"));
        assert!(document.contains("General Data Protection Regulation"));
        assert!(!document.contains("<body"));
        assert_eq!(report(&args)["status"], "stubbed");

        let registry = Registry::open(&args.cache_root.join(REGISTRY_FILE)).unwrap();
        assert_eq!(
            registry.status_of("32016R0679", "initial", Language::En).unwrap().as_deref(),
            Some("stubbed")
        );
    }

    #[test]
    fn failing_formex_falls_back_to_html() {
        let directory = tempfile::tempdir().unwrap();
        let fmx = directory.path().join("act.xml");
        fs::write(&fmx, "<ACT><PREAMBLE/></ACT>").unwrap();
        let html = directory.path().join("page.html");
        fs::write(&html, NOT_FOUND_PAGE).unwrap();

        let mut args = arguments(directory.path());
        args.fmx = Some(fmx);
        args.html = Some(html);
        run(args.clone()).unwrap();

        let report = report(&args);
        assert_eq!(report["used_format"], "html");
        assert_eq!(report["sources"].as_array().unwrap().len(), 2);
        assert!(
            report["warnings"][0]
                .as_str()
                .unwrap()
                .starts_with("fmx transformation failed")
        );
    }

    #[test]
    fn repealed_consolidations_are_recorded() {
        let directory = tempfile::tempdir().unwrap();
        let fmx = directory.path().join("consolidated.xml");
        fs::write(&fmx, r#"<CONS.ACT><INFO.CONSLEG END="REPEALED"/></CONS.ACT>"#).unwrap();
        let out = directory.path().join("out").join("document.html");

        let mut args = arguments(directory.path());
        args.fmx = Some(fmx);
        args.out = Some(out.clone());
        run(args.clone()).unwrap();

        assert!(out.exists());
        let report: serde_json::Value =
            serde_json::from_slice(&fs::read(out.with_file_name(REPORT_FILE)).unwrap()).unwrap();
        assert_eq!(report["status"], "repealer");
        assert_eq!(report["used_format"], "fmx");
    }

    #[test]
    fn unreadable_sources_fail_the_command() {
        let directory = tempfile::tempdir().unwrap();
        let mut args = arguments(directory.path());
        args.html = Some(directory.path().join("absent.html"));
        let err = run(args).unwrap_err();
        assert!(format!("{err:#}").contains("absent.html"));
    }
}
