//! Heading recognition over flat documents and nesting of the recognized
//! nodes into containers and leaves.

use tracing::debug;

use super::coordinates::{Axis, HeadingAnalyzer, Role};
use crate::tree::{NodeId, Tree};

pub const CONTAINER_CLASS: &str = "lxp-container";
pub const SUB_CONTAINER_CLASS: &str = "lxp-sub-container";
pub const ARTICLE_CLASS: &str = "lxp-article";
pub const HEADING_CLASS: &str = "lxp-heading";
pub const ORDINATE_CLASS: &str = "lxp-ordinate";
pub const TITLE_CLASS: &str = "lxp-title";
const ORDINATE_ATTRIBUTE: &str = "standardized-ordinate";
const ROOT_AXIS: &str = "toc";

/// Dialect-specific hints for [`NodeMarker`].
pub trait HeadingRules {
    fn ordinate_eligible(&self, tree: &Tree, element: NodeId) -> bool;

    /// Likelihood of `element` being the title of a heading; zero rejects it.
    fn title_score(&self, tree: &Tree, element: NodeId, role: Role) -> f64;
}

/// Heading text without footnote and amendment markers.
pub fn heading_text(tree: &Tree, element: NodeId) -> String {
    let mut copy = tree.extract(element);
    let root = copy.root();
    let markers = copy.find_all(root, |tree, node| {
        tree.matches(node, "a", Some("footnote"))
            || tree.matches(node, "a", Some("marker-start"))
            || tree.matches(node, "span", Some("marker-end"))
    });
    for marker in markers {
        copy.remove(marker, false);
    }
    copy.textify(root, false, true)
}

/// Wraps recognized headings into `div.lxp-heading` inside a new node element.
pub struct NodeMarker<'a> {
    analyzer: &'a HeadingAnalyzer,
    rules: &'a dyn HeadingRules,
}

impl<'a> NodeMarker<'a> {
    pub fn new(analyzer: &'a HeadingAnalyzer, rules: &'a dyn HeadingRules) -> Self {
        Self { analyzer, rules }
    }

    /// Marks all headings among the children of `body`.
    pub fn mark_all(&self, tree: &mut Tree, body: NodeId) {
        for element in tree.children(body).to_vec() {
            if tree.parent(element) != Some(body) {
                continue;
            }
            let before = tree.previous_sibling(element);
            let after = tree.next_sibling(element);
            self.mark(tree, before, element, after);
        }
    }

    /// Returns the created node element, if `center` is a heading.
    pub fn mark(
        &self,
        tree: &mut Tree,
        before: Option<NodeId>,
        center: NodeId,
        after: Option<NodeId>,
    ) -> Option<NodeId> {
        let after = after?;
        if !self.rules.ordinate_eligible(tree, center) {
            return None;
        }
        let heading = self.analyzer.analyze(&heading_text(tree, center))?;
        let coordinate = heading.coordinate;
        if coordinate.role == Role::Sub {
            return None;
        }
        let pre_score = match before {
            Some(before) if !tree.matches(before, "div", Some(CONTAINER_CLASS)) => {
                self.rules.title_score(tree, before, coordinate.role)
            }
            _ => 0.0,
        };
        let post_score = self.rules.title_score(tree, after, coordinate.role);

        let title = match heading.title {
            Some(title) => {
                let element = tree.create_with("h2", &[], &title);
                tree.add_next(center, element);
                Some(element)
            }
            None if pre_score.max(post_score) > 0.0 => {
                let element = match before {
                    Some(before) if pre_score > post_score => before,
                    _ => after,
                };
                tree.set(element, "class", TITLE_CLASS);
                tree.set_tag(element, "h2");
                Some(element)
            }
            None => None,
        };
        if let Some(title) = title {
            tree.set(title, "class", TITLE_CLASS);
        }

        tree.set_tag(center, "h1");
        tree.set(center, "class", ORDINATE_CLASS);
        let wrapper = tree.create_with("div", &[("class", HEADING_CLASS)], "");
        tree.add_next(center, wrapper);
        tree.append(wrapper, center);
        if let Some(title) = title {
            tree.append(wrapper, title);
        }

        let (tag, class) = match coordinate.role {
            Role::Leaf => ("article", ARTICLE_CLASS),
            _ => ("div", CONTAINER_CLASS),
        };
        let node = tree.create_with(
            tag,
            &[("class", class), (ORDINATE_ATTRIBUTE, &coordinate.collated())],
            "",
        );
        tree.add_next(wrapper, node);
        tree.append(node, wrapper);
        debug!(ordinate = %coordinate.collated(), "heading recognized");
        Some(node)
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum NodeKind {
    Root,
    Container,
    SubContainer,
    Article,
}

impl NodeKind {
    fn of(tree: &Tree, element: NodeId) -> Self {
        match tree.class(element) {
            Some(CONTAINER_CLASS) => Self::Container,
            Some(SUB_CONTAINER_CLASS) => Self::SubContainer,
            _ => Self::Article,
        }
    }

    fn is_container(self) -> bool {
        matches!(self, Self::Container | Self::SubContainer)
    }
}

#[derive(Clone, Debug)]
struct SkeletonNode {
    axis: String,
    value: Option<String>,
    element: NodeId,
    kind: NodeKind,
    parent: Option<usize>,
    children: Vec<usize>,
}

impl SkeletonNode {
    fn ordinate(&self) -> String {
        match &self.value {
            Some(value) => format!("{}_{}", self.axis, value),
            None => self.axis.clone(),
        }
    }
}

/// The nested outline of a document, built from flat node elements.
pub struct TableOfContents {
    nodes: Vec<SkeletonNode>,
    flat: Vec<usize>,
    nested: bool,
}

const ROOT: usize = 0;

impl TableOfContents {
    pub fn new(body: NodeId) -> Self {
        Self {
            nodes: vec![SkeletonNode {
                axis: ROOT_AXIS.to_string(),
                value: None,
                element: body,
                kind: NodeKind::Root,
                parent: None,
                children: Vec::new(),
            }],
            flat: Vec::new(),
            nested: false,
        }
    }

    /// Registers a node element that carries a standardized ordinate.
    pub fn attach(&mut self, tree: &mut Tree, element: NodeId) {
        let ordinate = tree.pop(element, ORDINATE_ATTRIBUTE).unwrap_or_default();
        let (axis, value) = match ordinate.split_once('_') {
            Some((axis, value)) => (axis.to_string(), Some(value.to_string())),
            None => (ordinate, None),
        };
        self.flat.push(self.nodes.len());
        self.nodes.push(SkeletonNode {
            axis,
            value,
            element,
            kind: NodeKind::of(tree, element),
            parent: None,
            children: Vec::new(),
        });
    }

    fn set_parent(&mut self, node: usize, parent: Option<usize>) {
        if let Some(old) = self.nodes[node].parent.take() {
            self.nodes[old].children.retain(|&child| child != node);
        }
        if let Some(parent) = parent {
            self.nodes[parent].children.push(node);
        }
        self.nodes[node].parent = parent;
    }

    fn create_annex_wrapper(&mut self, tree: &mut Tree) -> usize {
        let element = tree.create_with("div", &[("class", CONTAINER_CLASS)], "");
        let heading = tree.create_with("div", &[("class", HEADING_CLASS)], "");
        let ordinate = tree.create_with("h1", &[("class", ORDINATE_CLASS)], "ANNEX");
        tree.append(element, heading);
        tree.append(heading, ordinate);
        self.nodes.push(SkeletonNode {
            axis: Axis::Annex.as_str().to_string(),
            value: None,
            element,
            kind: NodeKind::Container,
            parent: None,
            children: Vec::new(),
        });
        self.nodes.len() - 1
    }

    fn latest_parent(&self, sought: &str, start: Option<usize>) -> usize {
        let mut current = start.unwrap_or(ROOT);
        let mut parent = self.nodes[current].parent.unwrap_or(ROOT);
        while self.nodes[current].axis != sought {
            match self.nodes[current].children.last() {
                Some(&last) => current = last,
                None => {
                    parent = current;
                    break;
                }
            }
            if self.nodes[current].axis == sought {
                parent = self.nodes[current].parent.unwrap_or(ROOT);
            }
        }
        if start.is_none() && self.nodes[parent].kind == NodeKind::Article {
            return self.nodes[parent].parent.unwrap_or(ROOT);
        }
        parent
    }

    /// Builds the hierarchy and assigns identifiers.
    pub fn nest(&mut self, tree: &mut Tree) {
        if self.nested {
            return;
        }
        let annex = self.create_annex_wrapper(tree);
        for node in self.flat.clone() {
            let parent = if self.nodes[node].axis == Axis::Annex.as_str() {
                if self.nodes[annex].parent.is_none() {
                    self.set_parent(annex, Some(ROOT));
                }
                annex
            } else if self.nodes[annex].parent.is_some() && self.nodes[node].kind.is_container() {
                let start = self.nodes[annex].children.last().copied();
                self.latest_parent(&self.nodes[node].axis, start)
            } else {
                self.latest_parent(&self.nodes[node].axis, None)
            };
            self.set_parent(node, Some(parent));
        }
        match self.nodes[annex].children.clone().as_slice() {
            [single] => {
                self.set_parent(*single, Some(ROOT));
                self.set_parent(annex, None);
            }
            [first, ..] => {
                let first = self.nodes[*first].element;
                tree.add_previous(first, self.nodes[annex].element);
            }
            [] => {}
        }
        self.assign_kinds(tree, ROOT, false);
        self.aggregate_ids(tree);
        self.nested = true;
    }

    fn assign_kinds(&mut self, tree: &mut Tree, node: usize, inside_leaf: bool) {
        for child in self.nodes[node].children.clone() {
            match self.nodes[child].kind {
                NodeKind::Container => {
                    if inside_leaf {
                        self.nodes[child].kind = NodeKind::SubContainer;
                        tree.set(self.nodes[child].element, "class", SUB_CONTAINER_CLASS);
                    }
                    self.assign_kinds(tree, child, inside_leaf);
                }
                NodeKind::Article => self.assign_kinds(tree, child, true),
                NodeKind::SubContainer => self.assign_kinds(tree, child, inside_leaf),
                NodeKind::Root => {}
            }
        }
    }

    fn level_order(&self) -> Vec<usize> {
        let mut order = vec![ROOT];
        let mut k = 0;
        while k < order.len() {
            order.extend(self.nodes[order[k]].children.iter().copied());
            k += 1;
        }
        order
    }

    fn aggregate_ids(&mut self, tree: &mut Tree) {
        tree.set(self.nodes[ROOT].element, "id", ROOT_AXIS);
        let mut ids = vec![String::new(); self.nodes.len()];
        ids[ROOT] = ROOT_AXIS.to_string();
        for node in self.level_order().into_iter().skip(1) {
            let id = match (self.nodes[node].kind.is_container(), self.nodes[node].parent) {
                (true, Some(parent)) => format!("{}-{}", ids[parent], self.nodes[node].ordinate()),
                _ => self.nodes[node].ordinate(),
            };
            tree.set(self.nodes[node].element, "id", id.as_str());
            ids[node] = id;
        }
    }

    /// Moves the elements according to the nesting.
    pub fn transpose(&self, tree: &mut Tree) {
        for node in self.level_order() {
            let Some(parent) = self.nodes[node].parent else {
                continue;
            };
            if parent == ROOT {
                continue;
            }
            tree.append(self.nodes[parent].element, self.nodes[node].element);
        }
    }

    /// Collects the marked node elements below `body`, nests and transposes them.
    pub fn collect_from(tree: &mut Tree, body: NodeId) -> Self {
        let mut toc = Self::new(body);
        let classes = [CONTAINER_CLASS, ARTICLE_CLASS, SUB_CONTAINER_CLASS];
        let is_node = |tree: &Tree, element: NodeId| {
            tree.class(element)
                .is_some_and(|class| classes.contains(&class))
        };
        for element in tree.children(body).to_vec() {
            if tree.parent(element) != Some(body) || !is_node(tree, element) {
                continue;
            }
            toc.attach(tree, element);
            if matches!(tree.class(element), Some(ARTICLE_CLASS | SUB_CONTAINER_CLASS)) {
                for sibling in tree.following_siblings(element) {
                    if is_node(tree, sibling) {
                        break;
                    }
                    tree.append(element, sibling);
                }
            }
        }
        toc.nest(tree);
        toc.transpose(tree);
        toc
    }

    /// Indented outline, one `kind[id]` per line.
    pub fn outline(&self, tree: &Tree) -> Vec<String> {
        let mut lines = Vec::new();
        self.outline_into(tree, ROOT, 0, &mut lines);
        lines
    }

    fn outline_into(&self, tree: &Tree, node: usize, depth: usize, lines: &mut Vec<String>) {
        let kind = match self.nodes[node].kind {
            NodeKind::Root => "root",
            NodeKind::Container => "container",
            NodeKind::SubContainer => "sub-container",
            NodeKind::Article => "article",
        };
        let id = tree.get(self.nodes[node].element, "id").unwrap_or_default();
        lines.push(format!("{}{kind}[{id}]", "  ".repeat(depth)));
        for &child in &self.nodes[node].children {
            self.outline_into(tree, child, depth + 1, lines);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Language;

    struct ShortParagraphs;

    impl HeadingRules for ShortParagraphs {
        fn ordinate_eligible(&self, tree: &Tree, element: NodeId) -> bool {
            tree.is(element, "p") && tree.children(element).len() <= 2
        }

        fn title_score(&self, tree: &Tree, element: NodeId, _role: Role) -> f64 {
            if tree.has_class(element, "title") { 1.0 } else { 0.0 }
        }
    }

    fn body_of(paragraphs: &[(&str, Option<&str>)]) -> Tree {
        let mut tree = Tree::new("body");
        let body = tree.root();
        for (text, class) in paragraphs {
            let attrs: Vec<(&str, &str)> = class.iter().map(|class| ("class", *class)).collect();
            let p = tree.create_with("p", &attrs, text);
            tree.append(body, p);
        }
        tree
    }

    fn skeleton(paragraphs: &[(&str, Option<&str>)]) -> (Tree, Vec<String>) {
        let analyzer = HeadingAnalyzer::new(Language::En).unwrap();
        let mut tree = body_of(paragraphs);
        let body = tree.root();
        NodeMarker::new(&analyzer, &ShortParagraphs).mark_all(&mut tree, body);
        let toc = TableOfContents::collect_from(&mut tree, body);
        let outline = toc.outline(&tree);
        (tree, outline)
    }

    #[test]
    fn marker_builds_heading_wrapper() {
        let (tree, _) = skeleton(&[
            ("Article 1", None),
            ("Subject matter", Some("title")),
            ("This Regulation lays down rules.", None),
        ]);
        let root = tree.root();
        let article = tree.first_child(root).unwrap();
        assert_eq!(tree.tag(article), "article");
        assert_eq!(tree.get(article, "id"), Some("ART_1"));
        let heading = tree.first_child(article).unwrap();
        assert_eq!(tree.class(heading), Some(HEADING_CLASS));
        let children = tree.children(heading);
        assert_eq!(tree.tag(children[0]), "h1");
        assert_eq!(tree.text(children[1]), "Subject matter");
        assert_eq!(tree.children(article).len(), 2);
    }

    #[test]
    fn containers_nest_articles_and_get_path_ids() {
        let (_, outline) = skeleton(&[
            ("Chapter I", None),
            ("General provisions", Some("title")),
            ("Article 1", None),
            ("text", None),
            ("Section 1", None),
            ("Scope", Some("title")),
            ("Article 2", None),
            ("text", None),
            ("Chapter II", None),
            ("Final provisions", Some("title")),
            ("Article 3", None),
            ("text", None),
        ]);
        assert_eq!(
            outline,
            vec![
                "root[toc]",
                "  container[toc-CHP_I]",
                "    article[ART_1]",
                "    container[toc-CHP_I-SEC_1]",
                "      article[ART_2]",
                "  container[toc-CHP_II]",
                "    article[ART_3]",
            ]
        );
    }

    #[test]
    fn single_annex_has_no_wrapper() {
        let (_, outline) = skeleton(&[
            ("Article 1", None),
            ("text", None),
            ("ANNEX", None),
            ("text", None),
        ]);
        assert_eq!(outline, vec!["root[toc]", "  article[ART_1]", "  article[ANX]"]);
    }

    #[test]
    fn several_annexes_get_a_wrapper() {
        let (tree, outline) = skeleton(&[
            ("Article 1", None),
            ("text", None),
            ("ANNEX I", None),
            ("text", None),
            ("ANNEX II", None),
            ("text", None),
        ]);
        assert_eq!(
            outline,
            vec![
                "root[toc]",
                "  article[ART_1]",
                "  container[toc-ANX]",
                "    article[ANX_I]",
                "    article[ANX_II]",
            ]
        );
        let root = tree.root();
        let wrapper = tree.children(root)[1];
        assert_eq!(tree.get(wrapper, "id"), Some("toc-ANX"));
        assert_eq!(tree.children(wrapper).len(), 3);
    }

    #[test]
    fn containers_after_annexes_stay_inside_them() {
        let (_, outline) = skeleton(&[
            ("ANNEX I", None),
            ("text", None),
            ("ANNEX II", None),
            ("Part A", None),
            ("Scope", Some("title")),
            ("text", None),
        ]);
        assert_eq!(
            outline,
            vec![
                "root[toc]",
                "  container[toc-ANX]",
                "    article[ANX_I]",
                "    article[ANX_II]",
                "      sub-container[ANX_II-PRT_A]",
            ]
        );
    }
}
