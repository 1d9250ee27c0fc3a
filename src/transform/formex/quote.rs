//! Pairs of Formex quotation markers (`QUOT.START` / `QUOT.END`).

use tracing::warn;

use crate::transform::quotation::QUOTATION_CLASS;
use crate::tree::{NodeId, Tree, is_blank};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum QuotationKind {
    Inline,
    Block,
}

impl QuotationKind {
    fn of(tree: &Tree, start: NodeId) -> Self {
        if tree.is(start, "QUOT.S") {
            Self::Block
        } else {
            Self::Inline
        }
    }

    fn tag(self) -> &'static str {
        match self {
            Self::Inline => "span",
            Self::Block => "div",
        }
    }
}

struct QuotationPair {
    open: NodeId,
    close: NodeId,
    kind: QuotationKind,
}

impl QuotationPair {
    fn first_common_ancestor(&self, tree: &Tree) -> Option<NodeId> {
        let open: Vec<NodeId> = tree.ancestors(self.open).into_iter().rev().collect();
        let close: Vec<NodeId> = tree.ancestors(self.close).into_iter().rev().collect();
        open.into_iter()
            .zip(close)
            .take_while(|(a, b)| a == b)
            .last()
            .map(|(common, _)| common)
    }

    fn resolve(&self, tree: &mut Tree) {
        if tree.parent(self.open) == tree.parent(self.close) {
            self.wrap_siblings(tree);
        } else {
            self.resolve_skew(tree);
        }
    }

    /// Brings the markers onto the same level, or drops them.
    fn resolve_skew(&self, tree: &mut Tree) {
        warn!("moving skew quotation marks");
        let common = self.first_common_ancestor(tree);
        if common.is_some() && common == tree.parent(self.open) {
            if ",;.".contains(tree.tail(self.close).trim()) {
                for ancestor in tree.ancestors(self.close) {
                    if Some(ancestor) == common {
                        break;
                    }
                    tree.add_next(ancestor, self.close);
                }
            } else if is_blank(tree.tail(self.open)) {
                while tree.parent(self.close) != self.first_common_ancestor(tree) {
                    let Some(adjacent) = tree.next_sibling(self.open) else {
                        break;
                    };
                    tree.push(adjacent, self.open);
                }
            }
        }
        let common = self.first_common_ancestor(tree);
        if common.is_some() && common == tree.parent(self.open) && common == tree.parent(self.close) {
            self.wrap_siblings(tree);
        } else {
            tree.remove(self.open, true);
            tree.remove(self.close, true);
        }
    }

    fn wrap_siblings(&self, tree: &mut Tree) {
        for marker in [self.open, self.close] {
            let upper: Vec<String> = tree
                .attrs(marker)
                .iter()
                .filter(|(name, _)| name.chars().any(char::is_uppercase))
                .map(|(name, _)| name.clone())
                .collect();
            for name in upper {
                tree.pop(marker, &name);
            }
        }
        tree.set_tag(self.open, self.kind.tag());
        tree.set(self.open, "class", QUOTATION_CLASS);
        let tail = tree.take_tail(self.open);
        tree.set_text(self.open, tail);
        for sibling in tree.following_siblings(self.open) {
            if sibling == self.close {
                tree.unfold(sibling);
                break;
            }
            tree.append(self.open, sibling);
        }
    }
}

/// Converts every matched marker pair below `scope` into a quotation element.
pub fn pack_quoted_contents(tree: &mut Tree, scope: NodeId) {
    for start in tree.find_tag(scope, "QUOT.START") {
        let reference = tree.get(start, "REF.END").unwrap_or_default().to_string();
        let end = tree.find(scope, |tree, node| {
            tree.is(node, "QUOT.END") && tree.get(node, "ID") == Some(reference.as_str())
        });
        let Some(end) = end else {
            warn!(reference = %reference, "unmatched quotation markers");
            tree.remove(start, true);
            continue;
        };
        if tree.get(end, "REF.START") != tree.get(start, "ID") {
            warn!(reference = %reference, "quotation markers do not refer to each other");
            tree.remove(start, true);
            tree.remove(end, true);
            continue;
        }
        let pair = QuotationPair {
            open: start,
            close: end,
            kind: QuotationKind::of(tree, start),
        };
        pair.resolve(tree);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::parse_xml;

    fn packed(markup: &str) -> String {
        let mut tree = parse_xml(markup.as_bytes()).unwrap();
        let root = tree.root();
        pack_quoted_contents(&mut tree, root);
        tree.to_html(root)
    }

    #[test]
    fn sibling_markers_become_a_span() {
        assert_eq!(
            packed(r#"<P>the term <QUOT.START ID="q1" REF.END="q2" CODE="2018"/>consumer<QUOT.END ID="q2" REF.START="q1" CODE="2019"/> means</P>"#),
            r#"<P>the term <span class="lxp-quotation">consumer</span> means</P>"#
        );
    }

    #[test]
    fn closing_marker_is_hoisted_before_punctuation() {
        assert_eq!(
            packed(r#"<P><QUOT.START ID="q1" REF.END="q2"/>Article 5 <HT TYPE="ITALIC">is amended<QUOT.END ID="q2" REF.START="q1"/>.</HT></P>"#),
            r#"<P><span class="lxp-quotation">Article 5 <HT TYPE="ITALIC">is amended</HT></span>.</P>"#
        );
    }

    #[test]
    fn opening_marker_is_pushed_down() {
        assert_eq!(
            packed(r#"<P><QUOT.START ID="q1" REF.END="q2"/><HT TYPE="BOLD">bold<QUOT.END ID="q2" REF.START="q1"/> after</HT></P>"#),
            r#"<P><HT TYPE="BOLD"><span class="lxp-quotation">bold</span> after</HT></P>"#
        );
    }

    #[test]
    fn unmatched_markers_are_dropped() {
        assert_eq!(
            packed(r#"<P>a <QUOT.START ID="q1" REF.END="q9"/>b</P>"#),
            "<P>a b</P>"
        );
    }
}
