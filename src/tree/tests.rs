use proptest::prelude::*;

use super::*;

fn sample() -> (Tree, NodeId, NodeId) {
    let mut tree = parse_xml(b"<root>lead <b>bold <i>it</i> after</b> tail <c/>end</root>").unwrap();
    let root = tree.root();
    let b = tree.child_by_tag(root, "b").unwrap();
    let c = tree.child_by_tag(root, "c").unwrap();
    tree.set_tail(c, "end");
    (tree, b, c)
}

#[test]
fn unfold_keeps_text_and_tail() {
    let (mut tree, b, _) = sample();
    let root = tree.root();
    tree.unfold(b);
    assert_eq!(tree.text(root), "lead bold ");
    let i = tree.child_by_tag(root, "i").unwrap();
    assert_eq!(tree.tail(i), " after tail ");
    assert_eq!(tree.to_html(root), "<root>lead bold <i>it</i> after tail <c></c>end</root>");
}

#[test]
fn unfold_of_childless_element_hands_tail_to_lead() {
    let (mut tree, b, c) = sample();
    tree.unfold(c);
    assert_eq!(tree.tail(b), " tail end");
}

#[test]
fn remove_with_and_without_tail() {
    let (mut tree, b, c) = sample();
    let root = tree.root();
    tree.remove(c, true);
    assert_eq!(tree.tail(b), " tail end");
    tree.remove(b, false);
    assert_eq!(tree.textify(root, false, false), "lead ");
}

#[test]
fn push_moves_host_text_behind_adoptee() {
    let mut tree = parse_xml(b"<p>Title text<x/></p>").unwrap();
    let root = tree.root();
    let label = tree.create_with("span", &[], "1.");
    tree.push(root, label);
    assert_eq!(tree.to_html(root), "<p><span>1.</span>Title text<x></x></p>");
}

#[test]
fn cut_append_leaves_tail_outside() {
    let mut tree = parse_xml(b"<r><h/><t>x</t>rest</r>").unwrap();
    let root = tree.root();
    let h = tree.child_by_tag(root, "h").unwrap();
    let t = tree.child_by_tag(root, "t").unwrap();
    tree.cut_append(h, t);
    assert_eq!(tree.to_html(root), "<r><h><t>x</t></h>rest</r>");
}

#[test]
fn snapshot_restores_content() {
    let (mut tree, b, _) = sample();
    let before = tree.to_html(b);
    let snapshot = tree.snapshot(b);
    tree.set(b, "class", "broken");
    tree.strip_subelements(b);
    assert_ne!(tree.to_html(b), before);
    tree.restore(b, snapshot);
    assert_eq!(tree.to_html(b), before);
}

#[test]
fn concatenate_siblings_merges_adjacent_lists() {
    let mut tree = parse_html(
        b"<html><body><ol class=\"numbr\"><li>a</li></ol> <ol class=\"numbr\"><li>b</li></ol><p>x</p></body></html>",
    )
    .unwrap();
    let root = tree.root();
    let body = tree.child_by_tag(root, "body").unwrap();
    tree.concatenate_siblings(body, "ol", Some("numbr"));
    let lists = tree.find_tag(body, "ol");
    assert_eq!(lists.len(), 1);
    assert_eq!(tree.find_tag(lists[0], "li").len(), 2);
}

#[test]
fn table_columns_stop_at_ragged_rows() {
    let tree = parse_html(
        b"<html><body><table><tr><td>1</td><td>a</td><td>x</td></tr><tr><td>2</td><td>b</td></tr></table></body></html>",
    )
    .unwrap();
    let root = tree.root();
    let table = tree.find_tag(root, "table")[0];
    let columns = tree.table_columns(table);
    assert_eq!(columns.len(), 2);
    assert_eq!(tree.text_content(columns[1][1]), "b");
}

#[test]
fn textify_simplifies_block_boundaries() {
    let tree = parse_html(b"<html><body><div><p>one</p><p>two\n  three</p></div></body></html>").unwrap();
    let div = tree.find_tag(tree.root(), "div")[0];
    assert_eq!(tree.textify(div, false, true), "one two three");
    assert_eq!(tree.textify(div, false, false), "onetwo\n  three");
}

#[test]
fn attribute_frequency_sorts_by_count() {
    let tree = parse_html(
        b"<html><body><p class=\"a\"></p><p class=\"b\"></p><p class=\"a\"></p></body></html>",
    )
    .unwrap();
    let frequency = tree.attribute_frequency(tree.root(), "class");
    assert_eq!(frequency[0], ("a".to_string(), 2));
}

#[test]
fn processing_instructions_become_nodes() {
    let tree = parse_xml(b"<A>x<?PROCESSING ACTION=\"DELETED\" ID=\"d1\"?>y</A>").unwrap();
    let pi = tree.children(tree.root())[0];
    assert_eq!(tree.tag(pi), "?PROCESSING");
    assert_eq!(tree.get(pi, "ACTION"), Some("DELETED"));
    assert_eq!(tree.tail(pi), "y");
}

fn arbitrary_tree() -> impl Strategy<Value = Vec<(String, String, String)>> {
    prop::collection::vec(("[a-z ]{0,6}", "[a-z ]{0,6}", "[a-z ]{0,6}"), 1..6)
}

proptest! {
    #[test]
    fn unfold_preserves_text_content(parts in arbitrary_tree(), pick in 0usize..6) {
        let mut tree = Tree::new("root");
        let root = tree.root();
        let mut parent = root;
        let mut nodes = Vec::new();
        for (index, (text, tail, nested)) in parts.iter().enumerate() {
            let node = tree.create_with("n", &[], text);
            tree.set_tail(node, tail.as_str());
            if index % 2 == 0 {
                tree.append(parent, node);
            } else {
                tree.append(root, node);
            }
            let inner = tree.create_with("m", &[], nested);
            tree.append(node, inner);
            nodes.push(node);
            parent = node;
        }
        let before = tree.text_content(root);
        let target = nodes[pick % nodes.len()];
        tree.unfold(target);
        prop_assert_eq!(tree.text_content(root), before);
    }
}
