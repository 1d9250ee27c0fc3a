use super::*;
use crate::config::{DEFAULT_DOMAIN, Language};
use crate::error::TransformError;
use crate::tree::parse_xml;

fn toolkit() -> Toolkit {
    Toolkit::new(Language::En, DEFAULT_DOMAIN).unwrap()
}

fn leaf(markup: &str) -> Tree {
    parse_xml(markup.as_bytes()).unwrap()
}

#[test]
fn sub_ids_from_data_titles() {
    let latins = toolkit().latins;
    assert_eq!(data_title_to_sub_id("(a)", &latins), "a");
    assert_eq!(data_title_to_sub_id("12.", &latins), "12");
    assert_eq!(data_title_to_sub_id("(3 bis)", &latins), "3bis");
    assert_eq!(data_title_to_sub_id("(2) whatever", &latins), "2");
    assert_eq!(data_title_to_sub_id("(ii)\u{a0}", &latins), "ii");
}

#[test]
fn item_ids_follow_the_data_title_chain() {
    let mut tree = leaf(
        r#"<article id="ART_3"><ol>
            <li data-title="1.">x<ol><li data-title="(a)">y</li><li data-title="(a)">z</li></ol></li>
            <li data-title="(ñ)">w</li>
        </ol><ul><li>dash</li></ul></article>"#,
    );
    let root = tree.root();
    set_ids(&mut tree, root, &toolkit().latins);
    let ids: Vec<Option<&str>> = tree
        .find_tag(root, "li")
        .into_iter()
        .map(|item| tree.get(item, "id"))
        .collect();
    assert_eq!(
        ids,
        vec![
            Some("ART_3-1"),
            Some("ART_3-1-a"),
            Some("ART_3-1-a--1"),
            Some("ART_3-_z_"),
            None
        ]
    );
}

#[test]
fn body_takes_everything_but_the_heading() {
    let mut tree = leaf(
        r#"<article id="ART_1"><div class="lxp-heading"><h1 class="lxp-ordinate">Article 1</h1></div>
        Loose text<p>One</p><p>Two</p></article>"#,
    );
    let root = tree.root();
    create_body(&mut tree, root, &toolkit());
    let children = tree.children(root);
    assert_eq!(children.len(), 2);
    let body = children[1];
    assert_eq!(tree.class(body), Some(BODY_CLASS));
    assert_eq!(tree.text(body), "Loose text");
    assert_eq!(tree.children(body).len(), 2);
    assert_eq!(tree.tail(children[0]), "");
}

#[test]
fn preamble_gets_recitals_instead_of_body() {
    let mut tree = leaf(
        r#"<article id="PRE"><p>Whereas:</p><ol><li data-title="(1)"><span class="num">(1)</span>First</li></ol></article>"#,
    );
    let root = tree.root();
    create_body(&mut tree, root, &toolkit());
    assert_eq!(tree.get(root, "title"), Some("Recitals"));
    let list = tree.child_by_tag(root, "ol").unwrap();
    assert_eq!(tree.class(list), Some(RECITALS_CLASS));
    let item = tree.first_child(list).unwrap();
    assert_eq!(tree.class(item), Some(RECITAL_CLASS));
    assert_eq!(tree.to_html(item), r#"<li data-title="(1)" class="lxp-recital">First</li>"#);
}

#[test]
fn footer_is_created_once_inside_the_body() {
    let mut tree = leaf(r#"<article id="ART_1"><div class="lxp-body"><p>x</p></div></article>"#);
    let root = tree.root();
    let first = footer(&mut tree, root);
    let second = footer(&mut tree, root);
    assert_eq!(first, second);
    let body = tree.first_child(root).unwrap();
    assert_eq!(tree.parent(first), Some(body));
}

#[test]
fn wide_tables_and_images_become_responsive() {
    let mut tree = leaf(
        r#"<article id="ANX"><table class="table" width="600"><tr><td><img width="400"/></td></tr></table><img width="250"/><img width="20"/></article>"#,
    );
    let root = tree.root();
    responsify(&mut tree, root);
    let wrappers = tree.find_all(root, |tree, node| tree.has_class(node, "w3-responsive"));
    assert_eq!(wrappers.len(), 2);
    let table = tree.find_tag(root, "table")[0];
    assert_eq!(tree.get(table, "width"), None);
}

#[test]
fn rollback_restores_the_leaf() {
    let mut tree = leaf(r#"<article id="ART_5"><p>(v) first</p></article>"#);
    let root = tree.root();
    let before = tree.to_html(root);
    let failure = rollback_on(&mut tree, root, |tree, leaf| {
        let p = tree.first_child(leaf).unwrap();
        tree.set_tag(p, "li");
        Err(TransformError::malformed("li", "no preceding item"))
    });
    assert_eq!(tree.to_html(root), before);
    let failure = failure.unwrap();
    assert_eq!(failure.leaf, "ART_5");
    assert!(failure.reason.contains("no preceding item"));
    assert!(rollback_on(&mut tree, root, |_, _| Ok(())).is_none());
}

#[test]
fn embedded_anchors_carry_content_heading() {
    let mut tree = leaf(
        r##"<article id="ART_1"><a href="#ART_2" title="Article 2">x</a><a href="http://x" title="t">y</a></article>"##,
    );
    let root = tree.root();
    embed(&mut tree, root);
    let anchors = tree.find_tag(root, "a");
    assert_eq!(tree.get(anchors[0], "data-content-heading"), Some("Article 2"));
    assert_eq!(tree.get(anchors[0], "title"), None);
    assert_eq!(tree.get(anchors[1], "title"), Some("t"));
}

#[test]
fn linking_uses_the_container_context() {
    let mut tree = leaf(
        r#"<div id="toc-CHP_2"><article id="ART_4"><div class="lxp-heading"><h1 class="lxp-ordinate">Article 4</h1><h2 class="lxp-title">Scope</h2></div><div class="lxp-body">As set out in this Chapter and in Article 5(2).</div></article></div>"#,
    );
    let root = tree.root();
    let article = tree.first_child(root).unwrap();
    link(&mut tree, article, &toolkit());
    let hrefs: Vec<&str> = tree
        .find_tag(article, "a")
        .into_iter()
        .filter_map(|anchor| tree.get(anchor, "href"))
        .collect();
    assert_eq!(hrefs, vec!["#toc-CHP_2", "#ART_5-2"]);
}

#[test]
fn amending_articles_link_against_the_amended_act() {
    let mut tree = leaf(
        r#"<div id="toc"><article id="ART_9"><div class="lxp-heading"><h1 class="lxp-ordinate">Article 9</h1><h2 class="lxp-title">Amendments to Regulation (EU) No 575/2013</h2></div><div class="lxp-body">Article 4 is replaced.</div></article></div>"#,
    );
    let root = tree.root();
    let article = tree.first_child(root).unwrap();
    link(&mut tree, article, &toolkit());
    let body = tree.children(article)[1];
    let anchor = tree.find_tag(body, "a")[0];
    assert_eq!(tree.get(anchor, "href"), Some("/eu/32013R0575/ART_4/"));
}

#[test]
fn ordinates_lose_their_anchors() {
    let mut tree = leaf(
        r##"<div id="toc"><article id="ART_1"><div class="lxp-heading"><h1 class="lxp-ordinate"><a href="#ART_1">Article 1</a></h1></div></article></div>"##,
    );
    let root = tree.root();
    let article = tree.first_child(root).unwrap();
    link(&mut tree, article, &toolkit());
    assert!(tree.find_tag(article, "a").is_empty());
}

#[test]
fn definitions_are_referenced_after_collection() {
    let mut tree = leaf(
        r#"<article id="ART_2"><ol><li id="ART_2-1"><span class="lxp-quotation">consumer</span> means a person;</li><li id="ART_2-2">Consumers have rights.</li></ol></article>"#,
    );
    let root = tree.root();
    let mut terms = TechnicalTerms::new(Language::En);
    reference_definitions(&mut tree, root, &mut terms).unwrap();
    let anchors = tree.find_tag(root, "a");
    assert_eq!(anchors.len(), 0);
    assert_eq!(terms.len(), 1);

    let mut other = leaf(r#"<article id="ART_3"><p>Every consumer counts.</p></article>"#);
    let root = other.root();
    reference_definitions(&mut other, root, &mut terms).unwrap();
    let anchor = other.find_tag(root, "a")[0];
    assert_eq!(other.get(anchor, "href"), Some("#ART_2-1"));
    assert_eq!(other.text(anchor), "consumer");
}
