//! Containers and leaves from the explicit structure tags of Formex.

use std::collections::VecDeque;

use tracing::debug;

use crate::error::{Result, TransformError};
use crate::transform::coordinates::HeadingAnalyzer;
use crate::transform::document::PREAMBLE_CLASS;
use crate::transform::skeleton::{ARTICLE_CLASS, CONTAINER_CLASS, HEADING_CLASS, ORDINATE_CLASS, TITLE_CLASS};
use crate::tree::{NodeId, Tree};

pub const DOCUMENT_TAG: &str = "LEXP.COMBINED";
pub const GENERIC_LEAF_PREFIX: &str = "L";
const LEAF_PREFIXES: &[&str] = &[GENERIC_LEAF_PREFIX, "PRE", "ART", "ANX", "FIN"];

/// A converted structure element and its converted children.
#[derive(Debug)]
pub struct ContentsNode {
    pub element: NodeId,
    pub id: String,
    pub children: Vec<ContentsNode>,
}

impl ContentsNode {
    /// Elements of the subtree, breadth first.
    pub fn level_order(&self) -> Vec<NodeId> {
        let mut result = Vec::new();
        let mut queue = VecDeque::from([self]);
        while let Some(node) = queue.pop_front() {
            result.push(node.element);
            queue.extend(node.children.iter());
        }
        result
    }

    pub fn outline(&self) -> Vec<String> {
        let mut result = Vec::new();
        self.collect_outline(0, &mut result);
        result
    }

    fn collect_outline(&self, depth: usize, out: &mut Vec<String>) {
        out.push(format!("{}{}", "  ".repeat(depth), self.id));
        for child in &self.children {
            child.collect_outline(depth + 1, out);
        }
    }
}

/// Converts `DIVISION`, `ARTICLE`, `ANNEX`, `ANNEXES`, `PREAMBLE` and `FINAL`
/// elements into `div.lxp-container` and `article` nodes with headings.
pub struct ContentsBuilder<'a> {
    analyzer: &'a HeadingAnalyzer,
    generic_leaves: usize,
}

impl<'a> ContentsBuilder<'a> {
    pub fn new(analyzer: &'a HeadingAnalyzer) -> Self {
        Self {
            analyzer,
            generic_leaves: 0,
        }
    }

    /// Converts `element` and, recursively, the structure elements below it.
    pub fn build(&mut self, tree: &mut Tree, element: NodeId, path: &[String]) -> Result<ContentsNode> {
        let source_tag = tree.tag(element).to_string();
        let ordinate = self.headings(tree, element, &source_tag)?;
        let standardized = self.standardized_ordinate(&source_tag, ordinate.as_deref());
        let mut own_path = path.to_vec();
        own_path.extend(standardized.clone());
        let id = match &standardized {
            _ if source_tag == DOCUMENT_TAG => "toc".to_string(),
            Some(standardized)
                if source_tag != "ANNEXES"
                    && LEAF_PREFIXES.contains(&standardized.split('_').next().unwrap_or_default()) =>
            {
                standardized.clone()
            }
            _ => format!("toc-{}", own_path.join("-")),
        };
        tree.set(element, "id", id.as_str());
        match source_tag.as_str() {
            DOCUMENT_TAG => {}
            "DIVISION" | "ANNEXES" => tree.set_tag(element, "div"),
            _ => tree.set_tag(element, "article"),
        }
        debug!(id = %id, source = %source_tag, "structure element converted");
        let mut children = Vec::new();
        for child in structure_children(tree, element) {
            children.push(self.build(tree, child, &own_path)?);
        }
        Ok(ContentsNode {
            element,
            id,
            children,
        })
    }

    fn standardized_ordinate(&mut self, source_tag: &str, ordinate: Option<&str>) -> Option<String> {
        match source_tag {
            "ARTICLE" | "ANNEX" | "DIVISION" => {
                let ordinate = ordinate.unwrap_or_default();
                if ordinate == "ANNEXES" {
                    return Some("ANX_0".to_string());
                }
                match self.analyzer.analyze(ordinate) {
                    Some(heading) => Some(heading.coordinate.collated()),
                    None => {
                        self.generic_leaves += 1;
                        Some(format!("{GENERIC_LEAF_PREFIX}_{}", self.generic_leaves))
                    }
                }
            }
            "PREAMBLE" => Some("PRE".to_string()),
            "FINAL" => Some("FIN".to_string()),
            "ANNEXES" => Some("ANX".to_string()),
            _ => None,
        }
    }

    /// Builds the `div.lxp-heading`; returns the ordinate text.
    fn headings(&self, tree: &mut Tree, element: NodeId, source_tag: &str) -> Result<Option<String>> {
        let (ordinate, title) = match source_tag {
            "DIVISION" => {
                let header = tree
                    .first_child(element)
                    .filter(|&first| tree.is(first, "TITLE"))
                    .ok_or_else(|| TransformError::malformed("DIVISION", "no leading TITLE"))?;
                let ordinate = tree
                    .first_child(header)
                    .filter(|&first| tree.is(first, "TI"))
                    .ok_or_else(|| TransformError::malformed("DIVISION", "TITLE without leading TI"))?;
                let title = tree.child_by_tag(header, "STI");
                tree.unfold(header);
                (ordinate, title)
            }
            "ARTICLE" => {
                let ordinate = tree
                    .first_child(element)
                    .filter(|&first| tree.is(first, "TI.ART"))
                    .ok_or_else(|| TransformError::malformed("ARTICLE", "no leading TI.ART"))?;
                (ordinate, tree.child_by_tag(element, "STI.ART"))
            }
            "ANNEX" => {
                // a BIB.INSTANCE may precede the header
                let header = tree
                    .children(element)
                    .iter()
                    .take(2)
                    .copied()
                    .find(|&child| tree.is(child, "TITLE"))
                    .ok_or_else(|| TransformError::malformed("ANNEX", "no TITLE among the first two children"))?;
                let ordinate = tree
                    .first_child(header)
                    .ok_or_else(|| TransformError::malformed("ANNEX", "empty TITLE"))?;
                let mut title = tree.child_by_tag(header, "STI");
                tree.unfold(header);
                if title.is_none() {
                    let contents_title = tree
                        .path(element, &["CONTENTS", "GR.SEQ", "TITLE", "TI"])
                        .filter(|&ti| tree.child_by_tag(ti, "NP").is_none());
                    if let Some(ti) = contents_title
                        && let Some(wrapper) = tree.parent(ti)
                    {
                        tree.unfold(wrapper);
                    }
                    title = contents_title;
                }
                (ordinate, title)
            }
            "PREAMBLE" => {
                tree.set(element, "class", PREAMBLE_CLASS);
                return Ok(Some("Preamble".to_string()));
            }
            "FINAL" => return Ok(Some("Final".to_string())),
            "ANNEXES" => return Ok(Some("Annexes".to_string())),
            _ => return Ok(None),
        };
        let class = if source_tag == "DIVISION" {
            CONTAINER_CLASS
        } else {
            ARTICLE_CLASS
        };
        tree.set(element, "class", class);
        let text = tree.textify(ordinate, false, false).trim().to_string();
        let heading = tree.create_with("div", &[("class", HEADING_CLASS)], "");
        tree.set_tag(ordinate, "h1");
        tree.set(ordinate, "class", ORDINATE_CLASS);
        tree.cut_append(heading, ordinate);
        tree.unfold_redundant_paragraphs(ordinate, &["P"]);
        if let Some(title) = title {
            tree.set_tag(title, "h2");
            tree.set(title, "class", TITLE_CLASS);
            tree.cut_append(heading, title);
            tree.unfold_redundant_paragraphs(title, &["P"]);
        }
        tree.push(element, heading);
        Ok(Some(text))
    }
}

/// `./ACT/PREAMBLE | ./ACT/FINAL | ./ACT/ENACTING.TERMS/(ARTICLE|DIVISION) |
/// ./(ANNEX|DIVISION|ARTICLE|ANNEXES)` in document order.
fn structure_children(tree: &Tree, element: NodeId) -> Vec<NodeId> {
    let mut result = Vec::new();
    for &child in tree.children(element) {
        match tree.tag(child) {
            "ACT" => {
                for &part in tree.children(child) {
                    match tree.tag(part) {
                        "PREAMBLE" | "FINAL" => result.push(part),
                        "ENACTING.TERMS" => result.extend(
                            tree.children(part)
                                .iter()
                                .copied()
                                .filter(|&node| tree.is(node, "ARTICLE") || tree.is(node, "DIVISION")),
                        ),
                        _ => {}
                    }
                }
            }
            "ANNEX" | "DIVISION" | "ARTICLE" | "ANNEXES" => result.push(child),
            _ => {}
        }
    }
    result
}

/// Generic leaves `L_n` are numbered in document order.
pub fn renumber_generic_leaves(tree: &mut Tree, scope: NodeId) {
    let mut counter = 0;
    for node in tree.iter(scope) {
        let generic = tree
            .get(node, "id")
            .and_then(|id| id.split_once('_'))
            .is_some_and(|(prefix, number)| prefix == GENERIC_LEAF_PREFIX && number.parse::<u64>().is_ok());
        if generic {
            counter += 1;
            tree.set(node, "id", format!("{GENERIC_LEAF_PREFIX}_{counter}"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Language;
    use crate::tree::parse_xml;

    fn build(markup: &str) -> (Tree, ContentsNode) {
        let analyzer = HeadingAnalyzer::new(Language::En).unwrap();
        let mut tree = parse_xml(markup.as_bytes()).unwrap();
        let root = tree.root();
        let node = ContentsBuilder::new(&analyzer).build(&mut tree, root, &[]).unwrap();
        (tree, node)
    }

    #[test]
    fn document_structure_gets_ids() {
        let (tree, node) = build(concat!(
            "<LEXP.COMBINED><ACT><PREAMBLE><P>THE COUNCIL</P></PREAMBLE><ENACTING.TERMS>",
            "<DIVISION><TITLE><TI><P>CHAPTER I</P></TI><STI><P>General provisions</P></STI></TITLE>",
            "<ARTICLE><TI.ART>Article 1</TI.ART><STI.ART>Subject matter</STI.ART><ALINEA>x</ALINEA></ARTICLE>",
            "</DIVISION></ENACTING.TERMS><FINAL><P>Done at Brussels</P></FINAL></ACT>",
            "<ANNEXES><ANNEX><TITLE><TI><P>ANNEX I</P></TI></TITLE><CONTENTS/></ANNEX>",
            "<ANNEX><TITLE><TI><P>ANNEX II</P></TI></TITLE><CONTENTS/></ANNEX></ANNEXES></LEXP.COMBINED>"
        ));
        assert_eq!(
            node.outline(),
            vec!["toc", "  PRE", "  toc-CHP_I", "    ART_1", "  FIN", "  toc-ANX", "    ANX_I", "    ANX_II"]
        );
        let root = tree.root();
        let chapter = tree.find(root, |tree, node| tree.get(node, "id") == Some("toc-CHP_I")).unwrap();
        assert_eq!(tree.tag(chapter), "div");
        assert_eq!(tree.class(chapter), Some(CONTAINER_CLASS));
        assert_eq!(
            tree.to_html(tree.first_child(chapter).unwrap()),
            r#"<div class="lxp-heading"><h1 class="lxp-ordinate">CHAPTER I</h1><h2 class="lxp-title">General provisions</h2></div>"#
        );
        let article = tree.find(root, |tree, node| tree.get(node, "id") == Some("ART_1")).unwrap();
        assert_eq!(tree.tag(article), "article");
        let preamble = tree.find(root, |tree, node| tree.get(node, "id") == Some("PRE")).unwrap();
        assert_eq!(tree.class(preamble), Some(PREAMBLE_CLASS));
    }

    #[test]
    fn unparseable_ordinates_become_generic_leaves() {
        let (mut tree, node) = build(
            "<LEXP.COMBINED><ANNEX><TITLE><TI><P>Joint declaration</P></TI></TITLE></ANNEX><ANNEX><TITLE><TI><P>Statement by the Council</P></TI></TITLE></ANNEX></LEXP.COMBINED>",
        );
        let ids: Vec<&str> = node.children.iter().map(|child| child.id.as_str()).collect();
        assert_eq!(ids, vec!["L_1", "L_2"]);
        let root = tree.root();
        let first = tree.first_child(root).unwrap();
        tree.set(first, "id", "L_7");
        renumber_generic_leaves(&mut tree, root);
        assert_eq!(tree.get(first, "id"), Some("L_1"));
    }

    #[test]
    fn article_without_heading_is_malformed() {
        let analyzer = HeadingAnalyzer::new(Language::En).unwrap();
        let mut tree = parse_xml(b"<ARTICLE><ALINEA>x</ALINEA></ARTICLE>").unwrap();
        let root = tree.root();
        assert!(ContentsBuilder::new(&analyzer).build(&mut tree, root, &[]).is_err());
    }
}
