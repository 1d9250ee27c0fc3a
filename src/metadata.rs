//! Metadata of a legal act, its merging and its RDFa rendition.

use std::collections::BTreeSet;
use std::fmt::Debug;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::config::Language;
use crate::error::{Result, TransformError};
use crate::tree::{NodeId, Tree};

pub const ELI_PREFIX: (&str, &str) = ("eli", "http://data.europa.eu/eli/ontology#");
pub const LXP_PREFIX: (&str, &str) = ("lxp", "http://lexparency.org/ontology#");
pub const VOCAB: &str = "http://schema.org/";

const EARLIEST_PLAUSIBLE_YEAR: i32 = 1950;

pub fn prefix_attribute() -> String {
    format!("{}: {} {}: {}", ELI_PREFIX.0, ELI_PREFIX.1, LXP_PREFIX.0, LXP_PREFIX.1)
}

/// `3YYYY[RLFD]NNNN`, the celex numbers of acts hosted under `/eu/`.
pub fn is_hosted_celex(celex: &str) -> bool {
    let bytes = celex.as_bytes();
    bytes.len() == 10
        && bytes[0] == b'3'
        && (celex[1..3] == *"19" || celex[1..3] == *"20")
        && bytes[3..5].iter().all(u8::is_ascii_digit)
        && matches!(bytes[5], b'R' | b'L' | b'F' | b'D')
        && bytes[6..].iter().all(u8::is_ascii_digit)
}

/// `3YY[RLFD]NNNN`, celex numbers with a two-digit year.
fn expand_typoed_celex(celex: &str) -> Option<String> {
    let bytes = celex.as_bytes();
    let typoed = bytes.len() == 8
        && bytes[0] == b'3'
        && bytes[1..3].iter().all(u8::is_ascii_digit)
        && matches!(bytes[3], b'R' | b'L' | b'F' | b'D')
        && bytes[4..].iter().all(u8::is_ascii_digit);
    if !typoed {
        return None;
    }
    let century = if &celex[1..3] < "45" { "20" } else { "19" };
    Some(format!("3{century}{}", &celex[1..]))
}

fn form_urlencode(value: &str) -> String {
    let mut out = String::new();
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'*' => out.push(byte as char),
            b' ' => out.push('+'),
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

fn percent_decode(value: &str) -> String {
    let bytes = value.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut k = 0;
    while k < bytes.len() {
        match bytes[k] {
            b'%' if k + 2 < bytes.len() => {
                let decoded = std::str::from_utf8(&bytes[k + 1..k + 3])
                    .ok()
                    .and_then(|hex| u8::from_str_radix(hex, 16).ok());
                match decoded {
                    Some(decoded) => {
                        out.push(decoded);
                        k += 3;
                        continue;
                    }
                    None => out.push(b'%'),
                }
            }
            b'+' => out.push(b' '),
            other => out.push(other),
        }
        k += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

pub fn remote_url_from_celex(language: Language, celex: &str) -> String {
    format!(
        "https://eur-lex.europa.eu/legal-content/{}/ALL/?uri={}",
        language,
        form_urlencode(&format!("CELEX:{celex}"))
    )
}

pub fn url_from_celex(language: Language, celex: &str) -> String {
    if is_hosted_celex(celex) {
        return format!("/eu/{celex}/");
    }
    match expand_typoed_celex(celex) {
        Some(celex) => format!("/eu/{celex}/"),
        None => remote_url_from_celex(language, celex),
    }
}

/// Celex number from the `uri` query parameter of an eur-lex link.
pub fn href_to_celex(href: &str) -> Option<String> {
    let (_, query) = href.split_once('?')?;
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == "uri")
        .map(|(_, value)| percent_decode(value).replace("celex:", "").replace("CELEX:", ""))
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Anchor {
    pub href: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl Anchor {
    pub fn hosted(&self) -> bool {
        self.href.starts_with("/eu/")
    }

    fn to_rdfa(&self, relationship: &str, language: Language) -> Vec<Meta> {
        let lang = language.html_lang();
        let mut result = vec![
            Meta::new(&[("property", relationship), ("resource", &self.href)]),
            Meta::new(&[
                ("about", &self.href),
                ("content", &self.text),
                ("lang", lang),
                ("property", "lxp:id_human"),
            ]),
        ];
        if let Some(title) = &self.title {
            result.push(Meta::new(&[
                ("about", &self.href),
                ("content", title),
                ("lang", lang),
                ("property", "eli:title"),
            ]));
        }
        result
    }
}

/// Attributes of one `<meta>` element.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Meta(pub Vec<(String, String)>);

impl Meta {
    fn new(attrs: &[(&str, &str)]) -> Self {
        Self(
            attrs
                .iter()
                .map(|(name, value)| (name.to_string(), value.to_string()))
                .collect(),
        )
    }
}

#[derive(Clone, Debug, PartialEq)]
enum Literal {
    Text(String),
    Date(NaiveDate),
    Integer(i64),
    Boolean(bool),
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActMetaData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_local: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_force: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub type_document: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_date_entry_in_force: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_no_longer_in_force: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_document: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_publication: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_applicability: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub based_on: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serial_number: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title_essence: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pop_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pop_acronym: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_human: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_iri: Option<String>,
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    pub passed_by: BTreeSet<String>,
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    pub version_implements: BTreeSet<String>,
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    pub is_about: BTreeSet<String>,
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    pub amends: BTreeSet<Anchor>,
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    pub amended_by: BTreeSet<Anchor>,
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    pub cites: BTreeSet<Anchor>,
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    pub cited_by: BTreeSet<Anchor>,
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    pub completes: BTreeSet<Anchor>,
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    pub completed_by: BTreeSet<Anchor>,
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    pub corrects: BTreeSet<Anchor>,
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    pub corrected_by: BTreeSet<Anchor>,
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    pub repeals: BTreeSet<Anchor>,
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    pub repealed_by: BTreeSet<Anchor>,
}

fn join_scalar<T: Clone + PartialEq + Debug>(
    field: &str,
    mine: &mut Option<T>,
    theirs: &Option<T>,
    relax: bool,
) -> Result<()> {
    match (mine.as_ref(), theirs.as_ref()) {
        (None, Some(value)) => *mine = Some(value.clone()),
        (Some(existing), Some(incoming)) if existing != incoming && !relax => {
            return Err(TransformError::InconsistentMetadata {
                field: field.to_string(),
                existing: format!("{existing:?}"),
                incoming: format!("{incoming:?}"),
            });
        }
        _ => {}
    }
    Ok(())
}

fn fill<T: Clone>(mine: &mut Option<T>, theirs: &Option<T>) {
    if mine.is_none() {
        mine.clone_from(theirs);
    }
}

impl ActMetaData {
    pub fn new(domain: &str, id_local: &str) -> Self {
        Self {
            domain: Some(domain.to_string()),
            id_local: Some(id_local.to_string()),
            ..Self::default()
        }
    }

    fn relations(&self) -> [(&'static str, &BTreeSet<Anchor>); 10] {
        [
            ("amends", &self.amends),
            ("amended_by", &self.amended_by),
            ("cites", &self.cites),
            ("cited_by", &self.cited_by),
            ("completes", &self.completes),
            ("completed_by", &self.completed_by),
            ("corrects", &self.corrects),
            ("corrected_by", &self.corrected_by),
            ("repeals", &self.repeals),
            ("repealed_by", &self.repealed_by),
        ]
    }

    fn relations_mut(&mut self) -> [&mut BTreeSet<Anchor>; 10] {
        [
            &mut self.amends,
            &mut self.amended_by,
            &mut self.cites,
            &mut self.cited_by,
            &mut self.completes,
            &mut self.completed_by,
            &mut self.corrects,
            &mut self.corrected_by,
            &mut self.repeals,
            &mut self.repealed_by,
        ]
    }

    fn union_multi(&mut self, other: &ActMetaData) {
        self.passed_by.extend(other.passed_by.iter().cloned());
        self.version_implements
            .extend(other.version_implements.iter().cloned());
        self.is_about.extend(other.is_about.iter().cloned());
        for (mine, (_, theirs)) in self.relations_mut().into_iter().zip(other.relations()) {
            mine.extend(theirs.iter().cloned());
        }
    }

    /// Merges `other` into `self`. Multi-valued fields are united; differing
    /// scalars are an error unless `relax` is set, in which case `self` wins.
    pub fn join(&mut self, other: &ActMetaData, relax: bool) -> Result<()> {
        self.union_multi(other);
        join_scalar("domain", &mut self.domain, &other.domain, relax)?;
        join_scalar("id_local", &mut self.id_local, &other.id_local, relax)?;
        join_scalar("in_force", &mut self.in_force, &other.in_force, relax)?;
        join_scalar("type_document", &mut self.type_document, &other.type_document, relax)?;
        join_scalar(
            "first_date_entry_in_force",
            &mut self.first_date_entry_in_force,
            &other.first_date_entry_in_force,
            relax,
        )?;
        join_scalar(
            "date_no_longer_in_force",
            &mut self.date_no_longer_in_force,
            &other.date_no_longer_in_force,
            relax,
        )?;
        join_scalar("date_document", &mut self.date_document, &other.date_document, relax)?;
        join_scalar("date_publication", &mut self.date_publication, &other.date_publication, relax)?;
        join_scalar(
            "date_applicability",
            &mut self.date_applicability,
            &other.date_applicability,
            relax,
        )?;
        join_scalar("based_on", &mut self.based_on, &other.based_on, relax)?;
        join_scalar("serial_number", &mut self.serial_number, &other.serial_number, relax)?;
        join_scalar("title_essence", &mut self.title_essence, &other.title_essence, relax)?;
        join_scalar("title", &mut self.title, &other.title, relax)?;
        join_scalar("version", &mut self.version, &other.version, relax)?;
        join_scalar("source_url", &mut self.source_url, &other.source_url, relax)?;
        join_scalar("pop_title", &mut self.pop_title, &other.pop_title, relax)?;
        join_scalar("pop_acronym", &mut self.pop_acronym, &other.pop_acronym, relax)?;
        join_scalar("id_human", &mut self.id_human, &other.id_human, relax)?;
        join_scalar("source_iri", &mut self.source_iri, &other.source_iri, relax)?;
        Ok(())
    }

    /// Fills fields that are still missing; never overrides.
    pub fn coalesce(&mut self, other: &ActMetaData) {
        self.union_multi(other);
        fill(&mut self.domain, &other.domain);
        fill(&mut self.id_local, &other.id_local);
        fill(&mut self.in_force, &other.in_force);
        fill(&mut self.type_document, &other.type_document);
        fill(&mut self.first_date_entry_in_force, &other.first_date_entry_in_force);
        fill(&mut self.date_no_longer_in_force, &other.date_no_longer_in_force);
        fill(&mut self.date_document, &other.date_document);
        fill(&mut self.date_publication, &other.date_publication);
        fill(&mut self.date_applicability, &other.date_applicability);
        fill(&mut self.based_on, &other.based_on);
        fill(&mut self.serial_number, &other.serial_number);
        fill(&mut self.title_essence, &other.title_essence);
        fill(&mut self.title, &other.title);
        fill(&mut self.version, &other.version);
        fill(&mut self.source_url, &other.source_url);
        fill(&mut self.pop_title, &other.pop_title);
        fill(&mut self.pop_acronym, &other.pop_acronym);
        fill(&mut self.id_human, &other.id_human);
        fill(&mut self.source_iri, &other.source_iri);
    }

    /// Drops dates before 1950 and derives `in_force` from the end date.
    pub fn plausibility_check(&mut self, today: NaiveDate) {
        for date in [
            &mut self.first_date_entry_in_force,
            &mut self.date_no_longer_in_force,
            &mut self.date_document,
            &mut self.date_publication,
            &mut self.date_applicability,
        ] {
            if date.is_some_and(|value| value.year() < EARLIEST_PLAUSIBLE_YEAR) {
                *date = None;
            }
        }
        if self.in_force == Some(true) && self.date_no_longer_in_force.is_some_and(|end| end <= today) {
            self.in_force = Some(false);
        }
    }

    fn literals(&self) -> Vec<(&'static str, &'static str, Literal)> {
        let text = |value: &Option<String>| value.clone().map(Literal::Text);
        let date = |value: &Option<NaiveDate>| value.map(Literal::Date);
        let candidates = [
            ("lxp", "domain", text(&self.domain)),
            ("eli", "id_local", text(&self.id_local)),
            ("eli", "in_force", self.in_force.map(Literal::Boolean)),
            ("eli", "type_document", text(&self.type_document)),
            ("eli", "first_date_entry_in_force", date(&self.first_date_entry_in_force)),
            ("eli", "date_no_longer_in_force", date(&self.date_no_longer_in_force)),
            ("eli", "date_document", date(&self.date_document)),
            ("eli", "date_publication", date(&self.date_publication)),
            ("eli", "date_applicability", date(&self.date_applicability)),
            ("eli", "based_on", text(&self.based_on)),
            ("lxp", "serial_number", self.serial_number.map(Literal::Integer)),
            ("lxp", "title_essence", text(&self.title_essence)),
            ("eli", "title", text(&self.title)),
            ("lxp", "version", text(&self.version)),
            ("lxp", "source_url", text(&self.source_url)),
            ("lxp", "pop_title", text(&self.pop_title)),
            ("lxp", "pop_acronym", text(&self.pop_acronym)),
            ("lxp", "id_human", text(&self.id_human)),
            ("eli", "source_iri", text(&self.source_iri)),
        ];
        let mut result: Vec<(&'static str, &'static str, Literal)> = candidates
            .into_iter()
            .filter_map(|(prefix, name, value)| value.map(|value| (prefix, name, value)))
            .collect();
        for (prefix, name, values) in [
            ("eli", "passed_by", &self.passed_by),
            ("lxp", "version_implements", &self.version_implements),
            ("eli", "is_about", &self.is_about),
        ] {
            result.extend(
                values
                    .iter()
                    .map(|value| (prefix, name, Literal::Text(value.clone()))),
            );
        }
        result
    }

    /// `<meta>` attribute sets, deduplicated and sorted.
    pub fn to_rdfa(&self, language: Language) -> Vec<Meta> {
        let lang = language.html_lang();
        let mut result = BTreeSet::new();
        for (prefix, name, literal) in self.literals() {
            let (datatype, value) = match literal {
                Literal::Text(value) => (None, value),
                Literal::Date(value) => (Some("date"), value.format("%Y-%m-%d").to_string()),
                Literal::Integer(value) => (Some("integer"), value.to_string()),
                Literal::Boolean(value) => (Some("boolean"), value.to_string()),
            };
            let is_resource = (value.starts_with("http://")
                || value.starts_with("https://")
                || value.starts_with("/eu/"))
                && name != "source_url"
                && name != "source_iri";
            let property = format!("{prefix}:{name}");
            let key = if is_resource { "resource" } else { "content" };
            let mut attrs = vec![("property", property.as_str()), (key, value.as_str())];
            let datatype = datatype.map(|datatype| format!("xsd:{datatype}"));
            match (&datatype, is_resource) {
                (Some(datatype), _) => attrs.push(("datatype", datatype.as_str())),
                (None, false) => attrs.push(("lang", lang)),
                (None, true) => {}
            }
            result.insert(Meta::new(&attrs));
        }
        for (name, anchors) in self.relations() {
            for anchor in anchors {
                result.extend(anchor.to_rdfa(&format!("eli:{name}"), language));
            }
        }
        result.into_iter().collect()
    }

    /// Sets the RDFa context on the root and appends the metas to the head.
    pub fn insert_metas(&self, tree: &mut Tree, language: Language) {
        let root = tree.root();
        tree.set(root, "vocab", VOCAB);
        tree.set(root, "lang", language.html_lang());
        tree.set(root, "prefix", prefix_attribute());
        let head = match tree.child_by_tag(root, "head") {
            Some(head) => head,
            None => {
                let head = tree.create("head");
                tree.insert(root, 0, head);
                head
            }
        };
        append_metas(tree, head, &self.to_rdfa(language));
    }

    /// A document without body that only carries the metadata.
    pub fn to_html_stub(&self, language: Language) -> Tree {
        let mut tree = Tree::new("html");
        let root = tree.root();
        tree.set(root, "lang", language.html_lang());
        tree.set(root, "vocab", VOCAB);
        tree.set(root, "prefix", prefix_attribute());
        let head = tree.create("head");
        tree.append(root, head);
        append_metas(&mut tree, head, &self.to_rdfa(language));
        tree
    }
}

fn append_metas(tree: &mut Tree, head: NodeId, metas: &[Meta]) {
    for meta in metas {
        let element = tree.create("meta");
        for (name, value) in &meta.0 {
            tree.set(element, name, value.as_str());
        }
        tree.append(head, element);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn celex_urls() {
        assert_eq!(url_from_celex(Language::En, "32016R0679"), "/eu/32016R0679/");
        assert_eq!(url_from_celex(Language::En, "302R0178"), "/eu/3202R0178/");
        assert_eq!(url_from_celex(Language::En, "395L0046"), "/eu/31995L0046/");
        assert_eq!(
            url_from_celex(Language::De, "12012E101"),
            "https://eur-lex.europa.eu/legal-content/DE/ALL/?uri=CELEX%3A12012E101"
        );
    }

    #[test]
    fn celex_from_eurlex_links() {
        assert_eq!(
            href_to_celex("https://eur-lex.europa.eu/legal-content/EN/AUTO/?uri=celex:32013R0575").as_deref(),
            Some("32013R0575")
        );
        assert_eq!(
            href_to_celex("./../../../legal-content/EN/AUTO/?uri=CELEX%3A32019R0630&qid=1").as_deref(),
            Some("32019R0630")
        );
        assert_eq!(href_to_celex("/eu/32013R0575/"), None);
    }

    #[test]
    fn join_unites_and_detects_conflicts() {
        let mut left = ActMetaData::new("eu", "32016R0679");
        left.version_implements.insert("/eu/32016R0679/".to_string());
        let mut right = ActMetaData::default();
        right.title = Some("General Data Protection Regulation".to_string());
        right.version_implements.insert("/eu/32018R0001/".to_string());
        left.join(&right, false).unwrap();
        assert_eq!(left.version_implements.len(), 2);
        assert_eq!(left.title, right.title);

        let conflicting = ActMetaData::new("eu", "32013R0575");
        assert!(matches!(
            left.join(&conflicting, false),
            Err(TransformError::InconsistentMetadata { .. })
        ));
        left.join(&conflicting, true).unwrap();
        assert_eq!(left.id_local.as_deref(), Some("32016R0679"));
    }

    #[test]
    fn coalesce_only_fills_gaps() {
        let mut left = ActMetaData::new("eu", "32016R0679");
        let mut right = ActMetaData::new("eu", "32013R0575");
        right.pop_acronym = Some("CRR".to_string());
        left.coalesce(&right);
        assert_eq!(left.id_local.as_deref(), Some("32016R0679"));
        assert_eq!(left.pop_acronym.as_deref(), Some("CRR"));
    }

    #[test]
    fn rdfa_types_and_resources() {
        let mut data = ActMetaData::new("eu", "32016R0679");
        data.date_document = NaiveDate::from_ymd_opt(2016, 4, 27);
        data.in_force = Some(true);
        data.source_url = Some("https://eur-lex.europa.eu/x".to_string());
        data.amends.insert(Anchor {
            href: "/eu/31995L0046/".to_string(),
            text: "Directive 95/46/EC".to_string(),
            title: None,
        });
        let metas = data.to_rdfa(Language::En);
        let find = |property: &str| {
            metas
                .iter()
                .find(|meta| meta.0.iter().any(|(name, value)| name == "property" && value == property))
                .cloned()
        };
        let date = find("eli:date_document").unwrap();
        assert!(date.0.contains(&("datatype".to_string(), "xsd:date".to_string())));
        let source = find("lxp:source_url").unwrap();
        assert!(source.0.iter().any(|(name, _)| name == "content"));
        let amends = find("eli:amends").unwrap();
        assert!(amends.0.contains(&("resource".to_string(), "/eu/31995L0046/".to_string())));
        assert!(find("lxp:id_human").is_some());
        let mut sorted = metas.clone();
        sorted.sort();
        assert_eq!(sorted, metas);
    }

    #[test]
    fn old_dates_are_implausible() {
        let mut data = ActMetaData::default();
        data.date_publication = NaiveDate::from_ymd_opt(1900, 1, 1);
        data.in_force = Some(true);
        data.date_no_longer_in_force = NaiveDate::from_ymd_opt(2020, 1, 1);
        data.plausibility_check(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(data.date_publication, None);
        assert_eq!(data.in_force, Some(false));
    }

    #[test]
    fn stub_has_head_only() {
        let data = ActMetaData::new("eu", "32016R0679");
        let stub = data.to_html_stub(Language::En);
        let root = stub.root();
        assert_eq!(stub.children(root).len(), 1);
        assert_eq!(stub.get(root, "lang"), Some("en"));
        assert_eq!(stub.find_tag(root, "meta").len(), 2);
    }
}
