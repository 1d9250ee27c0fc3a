//! Corrections for individual acts whose source documents are known to be
//! defective.

use regex::Regex;
use tracing::debug;

use crate::error::Result;
use crate::tree::Tree;

/// Applies the correction registered for `celex`, if any.
pub fn treat(celex: &str, tree: &mut Tree) -> Result<()> {
    match celex {
        "32003R0001" => treat_32003r0001(tree),
        _ => Ok(()),
    }
}

/// Articles 81 and 82 cited in Regulation 1/2003 are those of the treaty.
fn treat_32003r0001(tree: &mut Tree) -> Result<()> {
    let misreference = Regex::new(r"32003R0001/(?P<article>ART_8[12])")?;
    let root = tree.root();
    for anchor in tree.find_all(root, |tree, node| tree.is(node, "a") && tree.get(node, "href").is_some()) {
        let href = tree.get(anchor, "href").unwrap_or_default().to_owned();
        if !misreference.is_match(&href) {
            continue;
        }
        let corrected = misreference.replace_all(&href, "TFEU/$article").into_owned();
        debug!(from = %href, to = %corrected, "redirecting treaty reference");
        tree.set(anchor, "href", corrected);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::parse_xml;

    #[test]
    fn treaty_articles_are_redirected() {
        let mut tree = parse_xml(
            br#"<body><a href="/eu/32003R0001/ART_81/">Article 81</a><a href="/eu/32003R0001/ART_8/">Article 8</a></body>"#,
        )
        .unwrap();
        treat("32003R0001", &mut tree).unwrap();
        let root = tree.root();
        let hrefs: Vec<&str> = tree
            .find_tag(root, "a")
            .into_iter()
            .filter_map(|anchor| tree.get(anchor, "href"))
            .collect();
        assert_eq!(hrefs, vec!["/eu/TFEU/ART_81/", "/eu/32003R0001/ART_8/"]);
    }

    #[test]
    fn other_acts_are_untouched() {
        let markup = br#"<body><a href="/eu/32003R0001/ART_81/">x</a></body>"#;
        let mut tree = parse_xml(markup).unwrap();
        treat("32016R0679", &mut tree).unwrap();
        let root = tree.root();
        assert_eq!(tree.to_html(root), String::from_utf8_lossy(markup));
    }
}
