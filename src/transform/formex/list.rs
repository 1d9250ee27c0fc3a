//! Formex lists (`LIST`, `GR.SEQ`, `GR.VISA`, `GR.CONSID`) and numbered
//! paragraph sequences.

use super::table::caption;
use crate::error::{Result, TransformError};
use crate::tree::{NodeId, Tree, is_blank};

pub const ITEM_LABEL_CLASS: &str = "lexp-item-label";
const ORDERED_TYPES: &[&str] = &["alpha", "ALPHA", "ARAB", "roman", "ROMAN", "OTHER"];
const LIST_TAGS: &[&str] = &["LIST", "GR.SEQ", "GR.VISA", "GR.CONSID"];

struct FormexList {
    element: NodeId,
    source_tag: String,
}

impl FormexList {
    fn new(tree: &mut Tree, element: NodeId) -> Self {
        tree.pop(element, "LEVEL");
        Self {
            element,
            source_tag: tree.tag(element).to_string(),
        }
    }

    /// Item tag expected below the list.
    fn item_tag(&self) -> &'static str {
        match self.source_tag.as_str() {
            "GR.SEQ" => "NP",
            "GR.VISA" => "VISA",
            "GR.CONSID" => "CONSID",
            _ => "ITEM",
        }
    }

    fn label_of(&self, tree: &Tree, item: NodeId) -> Option<NodeId> {
        match self.source_tag.as_str() {
            "GR.CONSID" | "LIST" => tree.path(item, &["NP", "NO.P"]),
            "GR.SEQ" => tree.child_by_tag(item, "NO.P"),
            _ => None,
        }
    }

    /// `ol` or `ul`; dash and unlabelled lists keep their type as class.
    fn target_tag(&self, tree: &mut Tree) -> &'static str {
        let kind = tree.pop(self.element, "TYPE");
        let ordered = kind.as_deref().is_some_and(|kind| ORDERED_TYPES.contains(&kind))
            || matches!(self.source_tag.as_str(), "GR.SEQ" | "GR.CONSID");
        if ordered {
            return "ol";
        }
        if let Some(kind @ ("DASH" | "NONE")) = kind.as_deref() {
            tree.set(self.element, "class", kind.to_lowercase());
        }
        "ul"
    }

    /// `NO.GR.SEQ` + `P` pairs are regrouped into `NP` items.
    fn preprocess(&self, tree: &mut Tree) {
        if self.source_tag != "GR.SEQ" {
            return;
        }
        for number in tree.children_by_tag(self.element, "NO.GR.SEQ") {
            let Some(paragraph) = tree.next_sibling(number).filter(|&next| tree.is(next, "P")) else {
                return;
            };
            tree.set_tag(number, "NO.P");
            tree.set_tag(paragraph, "NP");
            tree.insert(paragraph, 0, number);
            if let Some(proximate) = tree.next_sibling(paragraph).filter(|&next| tree.is(next, "LIST")) {
                tree.append(paragraph, proximate);
            }
        }
    }

    fn label_item(&self, tree: &mut Tree, item: NodeId) {
        let Some(label) = self.label_of(tree, item) else {
            return;
        };
        tree.unfold_redundant_paragraphs(label, &["HT"]);
        match tree.first_child(label) {
            Some(first) if tree.is(first, "img") => {
                tree.set_tag(label, "span");
                tree.set(label, "class", ITEM_LABEL_CLASS);
                if let Some(next) = tree.next_sibling(label).filter(|&next| tree.is(next, "P") || tree.is(next, "TXT")) {
                    tree.unfold(next);
                }
            }
            Some(_) => {
                let title = tree.textify(label, false, false);
                tree.set(item, "data-title", title);
                tree.remove(label, true);
            }
            None => {
                let title = tree.text(label).to_string();
                tree.set(item, "data-title", title);
                tree.remove(label, true);
            }
        }
    }

    fn transform(&self, tree: &mut Tree) {
        self.preprocess(tree);
        let target = self.target_tag(tree);
        tree.set_tag(self.element, target);
        for item in tree.children_by_tag(self.element, self.item_tag()) {
            if target == "ol" {
                self.label_item(tree, item);
            }
            tree.unfold_redundant_paragraphs(item, &["NP", "NO.P", "TXT", "ALINEA", "P"]);
            tree.set_tag(item, "li");
        }
        self.unfold_embedder(tree);
        let captions: Vec<NodeId> = tree
            .children_by_tag(self.element, "TITLE")
            .into_iter()
            .filter(|&title| {
                tree.children_by_tag(title, "TI")
                    .into_iter()
                    .any(|ti| tree.child_by_tag(ti, "P").is_some())
            })
            .collect();
        for title in captions {
            caption(tree, title, "h3");
        }
    }

    /// A paragraph holding nothing but the list is dissolved.
    fn unfold_embedder(&self, tree: &mut Tree) {
        let Some(parent) = tree.parent(self.element) else {
            return;
        };
        if !tree.is(parent, "P") || !is_blank(tree.text(parent)) {
            return;
        }
        if is_blank(tree.tail(self.element)) && tree.children(parent).len() == 1 {
            tree.unfold(parent);
        } else {
            tree.add_previous(parent, self.element);
            let tail = tree.take_tail(self.element);
            if !tail.is_empty() {
                let text = format!("{tail}{}", tree.text(parent));
                tree.set_text(parent, text);
            }
        }
    }
}

/// Transforms all lists below `scope`, including free standing `NP[NO.P]` runs.
pub fn transform_lists(tree: &mut Tree, scope: NodeId) {
    for element in tree.find_all(scope, |tree, node| LIST_TAGS.contains(&tree.tag(node))) {
        FormexList::new(tree, element).transform(tree);
    }
    let free_standing = |tree: &Tree| {
        tree.find(scope, |tree, node| {
            tree.is(node, "NP") && tree.child_by_tag(node, "NO.P").is_some()
        })
    };
    while let Some(item) = free_standing(tree) {
        let list = tree.create("GR.SEQ");
        tree.add_previous(item, list);
        for sibling in tree.following_siblings(list) {
            if !tree.is(sibling, "NP") {
                break;
            }
            tree.append(list, sibling);
        }
        FormexList::new(tree, list).transform(tree);
    }
}

fn to_item(tree: &mut Tree, paragraph: NodeId) -> Result<()> {
    let label = tree
        .first_child(paragraph)
        .filter(|&first| tree.is(first, "NO.PARAG"))
        .ok_or_else(|| TransformError::malformed("PARAG", "paragraph without leading NO.PARAG"))?;
    let title = tree.text(label).trim_matches('"').to_string();
    tree.set(paragraph, "data-title", title);
    tree.remove(label, true);
    tree.set_tag(paragraph, "li");
    tree.unfold_redundant_paragraphs(paragraph, &["ALINEA", "P"]);
    Ok(())
}

/// Consecutive `PARAG[NO.PARAG]` children become one `ol`; runs separated by
/// other elements become separate lists.
pub fn paragraph_sequences_to_lists(tree: &mut Tree, parent: NodeId) -> Result<()> {
    let numbered = |tree: &Tree| {
        tree.children(parent).iter().copied().find(|&child| {
            tree.is(child, "PARAG") && tree.child_by_tag(child, "NO.PARAG").is_some()
        })
    };
    while let Some(first) = numbered(tree) {
        let list = tree.create("ol");
        tree.add_previous(first, list);
        tree.append(list, first);
        to_item(tree, first)?;
        for sibling in tree.following_siblings(list) {
            if !tree.is(sibling, "PARAG") {
                break;
            }
            to_item(tree, sibling)?;
            tree.append(list, sibling);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::parse_xml;

    fn transformed(markup: &str) -> String {
        let mut tree = parse_xml(markup.as_bytes()).unwrap();
        let root = tree.root();
        transform_lists(&mut tree, root);
        tree.to_html(root)
    }

    #[test]
    fn alpha_lists_get_titles() {
        assert_eq!(
            transformed(
                r#"<ALINEA><LIST TYPE="alpha"><ITEM><NP><NO.P>(a)</NO.P><TXT>first;</TXT></NP></ITEM><ITEM><NP><NO.P>(b)</NO.P><TXT>second.</TXT></NP></ITEM></LIST></ALINEA>"#
            ),
            r#"<ALINEA><ol><li data-title="(a)">first;</li><li data-title="(b)">second.</li></ol></ALINEA>"#
        );
    }

    #[test]
    fn dash_lists_keep_their_type() {
        assert_eq!(
            transformed(r#"<ALINEA><P><LIST TYPE="DASH"><ITEM><P>one</P></ITEM></LIST></P></ALINEA>"#),
            r#"<ALINEA><ul class="dash"><li>one</li></ul></ALINEA>"#
        );
    }

    #[test]
    fn recitals_are_numbered() {
        assert_eq!(
            transformed(
                "<PREAMBLE><GR.CONSID><CONSID><NP><NO.P>(1)</NO.P><TXT>Whereas one.</TXT></NP></CONSID></GR.CONSID></PREAMBLE>"
            ),
            r#"<PREAMBLE><ol><li data-title="(1)">Whereas one.</li></ol></PREAMBLE>"#
        );
    }

    #[test]
    fn free_standing_items_are_grouped() {
        assert_eq!(
            transformed(
                "<ANNEX><NP><NO.P>1.</NO.P><TXT>a</TXT></NP><NP><NO.P>2.</NO.P><TXT>b</TXT></NP><P>end</P></ANNEX>"
            ),
            r#"<ANNEX><ol><li data-title="1.">a</li><li data-title="2.">b</li></ol><P>end</P></ANNEX>"#
        );
    }

    #[test]
    fn separated_paragraph_runs_stay_apart() {
        let mut tree = parse_xml(
            br#"<ARTICLE><PARAG><NO.PARAG>1.</NO.PARAG><ALINEA>one</ALINEA></PARAG><ALINEA>between</ALINEA><PARAG><NO.PARAG>2.</NO.PARAG><ALINEA>two</ALINEA></PARAG></ARTICLE>"#,
        )
        .unwrap();
        let root = tree.root();
        paragraph_sequences_to_lists(&mut tree, root).unwrap();
        assert_eq!(
            tree.to_html(root),
            r#"<ARTICLE><ol><li data-title="1.">one</li></ol><ALINEA>between</ALINEA><ol><li data-title="2.">two</li></ol></ARTICLE>"#
        );
    }
}
