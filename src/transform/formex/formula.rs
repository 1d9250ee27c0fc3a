//! Conversion of Formex formulas into LaTeX.

use crate::transform::article::MATH_CLASS;
use crate::tree::{NodeId, Tree};

const SEPARATORS: &str = ";:*/+-";

const GREEK_UPPER: [&str; 24] = [
    "Alpha", "Beta", "Gamma", "Delta", "Epsilon", "Zeta", "Eta", "Theta", "Iota", "Kappa",
    "Lambda", "Mu", "Nu", "Xi", "Omicron", "Pi", "Rho", "Sigma", "Tau", "Upsilon", "Phi", "Chi",
    "Psi", "Omega",
];

const GREEK_LOWER: [&str; 24] = [
    "alpha", "beta", "gamma", "delta", "epsilon", "zeta", "eta", "theta", "iota", "kappa",
    "lambda", "mu", "nu", "xi", "omicron", "pi", "rho", "sigma", "tau", "upsilon", "varphi",
    "chi", "psi", "omega",
];

/// LaTeX replacement of a single character.
fn special_character(c: char) -> Option<String> {
    let code = u32::from(c);
    let greek = |first: u32, names: &[&str; 24]| {
        // Code points of the final sigma and the reserved upper case slot are skipped.
        let offset = (code - first) as usize;
        let index = if offset > 17 { offset - 1 } else { offset };
        (offset != 17).then(|| format!("\\{}", names[index]))
    };
    match code {
        913..=937 => greek(913, &GREEK_UPPER),
        945..=969 => greek(945, &GREEK_LOWER),
        903 => Some(r"\cdot".to_string()),
        8211 | 8212 => Some("-".to_string()),
        8706 => Some(r"\partial".to_string()),
        37 => Some(r"\%".to_string()),
        215 => Some(r"\times".to_string()),
        8721 => Some(r"\sum".to_string()),
        8804 => Some(r"\le".to_string()),
        8805 => Some(r"\ge".to_string()),
        _ => None,
    }
}

/// Symbols rendered by a fixed LaTeX command, keyed by token or element key.
fn simple(representation: &str) -> Option<String> {
    let mapped = match representation {
        "ln" => r"\ln",
        "min" => r"\min",
        "max" => r"\max",
        "sin" => r"\sin",
        "cos" => r"\cos",
        "exp" => r"\exp",
        "<OP.MATH TYPE=CARTPROD>" => r"\times",
        "<OP.MATH TYPE=DIV>" => "/",
        "<OP.MATH TYPE=MINUS>" => "-",
        "<OP.MATH TYPE=MULT>" => r"\cdot",
        "<OP.MATH TYPE=PLUS>" => "+",
        "<OP.MATH TYPE=PLUSMINUS>" => r"\pm",
        "<OP.CMP TYPE=EQ>" => "=",
        "<OP.CMP TYPE=LT>" => "<",
        "<OP.CMP TYPE=GT>" => ">",
        "<OP.CMP TYPE=NE>" => r"\ne",
        "<OP.CMP TYPE=LE>" => r"\le",
        "<OP.CMP TYPE=GE>" => r"\ge",
        "<OP.CMP TYPE=AP>" => r"\approx",
        "<OP.CMP TYPE=EQV>" => r"\equiv",
        "<SUM>" => r"\sum",
        _ => {
            let mut chars = representation.chars();
            return match (chars.next(), chars.next()) {
                (Some(c), None) => special_character(c),
                _ => None,
            };
        }
    };
    Some(mapped.to_string())
}

/// Elements applying a LaTeX operator to their content.
fn operator(key: &str) -> Option<&'static str> {
    match key {
        "<HT TYPE=BOLD>" => Some(r"\mathbf"),
        "<HT TYPE=ITALIC>" => Some(r"\mathrm"),
        "<OVERLINE>" => Some(r"\overline"),
        "<IND LOC=SUP>" | "<IND LOC=OVER>" | "<EXPONENT>" | "<OVER>" => Some("^"),
        "<IND LOC=UNDER>" | "<IND LOC=SUB>" | "<IND>" | "<UNDER>" => Some("_"),
        "<FT TYPE=NUMBER>" => Some(""),
        "<ROOT>" => Some(r"\sqrt"),
        _ => None,
    }
}

fn braces(key: &str) -> Option<(&'static str, &'static str)> {
    match key {
        "<EXPR TYPE=BRACKET>" => Some(("(", ")")),
        "<EXPR TYPE=BRACE>" => Some((r"\{", r"\}")),
        "<EXPR TYPE=SQBRACKET>" => Some(("[", "]")),
        "<EXPR TYPE=BAR>" => Some(("|", "|")),
        _ => None,
    }
}

fn is_word_sequence(value: &str) -> bool {
    !value.is_empty() && value.chars().all(|c| c.is_ascii_alphabetic() || c == ' ')
}

fn is_abbreviation(value: &str) -> bool {
    value.len() >= 2 && value.chars().all(|c| c.is_ascii_uppercase())
}

/// `\frac` or `\sum` as a whole command somewhere in the latex.
fn contains_large_operator(latex: &str) -> bool {
    [r"\frac", r"\sum"].into_iter().any(|command| {
        latex.match_indices(command).any(|(start, _)| {
            !latex[start + command.len()..]
                .chars()
                .next()
                .is_some_and(|c| c.is_alphanumeric() || c == '_')
        })
    })
}

fn tokenize(value: &str) -> Vec<String> {
    let value = value.trim();
    if is_word_sequence(value) {
        return vec![value.to_string()];
    }
    let mut tokens = Vec::new();
    let mut current = String::new();
    for c in value.chars() {
        if SEPARATORS.contains(c) || special_character(c).is_some() {
            tokens.push(std::mem::take(&mut current));
            tokens.push(c.to_string());
        } else {
            current.push(c);
        }
    }
    tokens.push(current);
    tokens
        .into_iter()
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
        .collect()
}

#[derive(Clone, Debug, PartialEq)]
enum FormulaNode {
    Token(String),
    Element { key: String, children: Vec<FormulaNode> },
}

impl FormulaNode {
    fn parse(tree: &Tree, element: NodeId) -> Self {
        let mut children: Vec<FormulaNode> = tokenize(tree.text(element))
            .into_iter()
            .map(FormulaNode::Token)
            .collect();
        for &child in tree.children(element) {
            children.push(Self::parse(tree, child));
            children.extend(tokenize(tree.tail(child)).into_iter().map(FormulaNode::Token));
        }
        Self::Element {
            key: element_key(tree, element),
            children: correct_nesting(children),
        }
    }

    fn representation(&self) -> &str {
        match self {
            Self::Token(token) => token,
            Self::Element { key, .. } => key,
        }
    }

    fn operator(&self) -> Option<&'static str> {
        match self {
            Self::Element { key, .. } => operator(key),
            Self::Token(_) => None,
        }
    }
}

fn element_key(tree: &Tree, element: NodeId) -> String {
    let mut key = format!("<{}", tree.tag(element));
    for (name, value) in tree.attrs(element) {
        key.push_str(&format!(" {name}={value}"));
    }
    key.push('>');
    key
}

/// Older Formex writes fractions as `<EXPR/><OVER/><EXPR/>` and roots as
/// `<ROOT/><EXPR/>`; both are nested here.
fn correct_nesting(children: Vec<FormulaNode>) -> Vec<FormulaNode> {
    let mut result: Vec<FormulaNode> = Vec::with_capacity(children.len());
    let mut remaining = children.into_iter().peekable();
    while let Some(node) = remaining.next() {
        let bare = |name: &str| matches!(&node, FormulaNode::Element { key, children } if key == name && children.is_empty());
        if bare("<OVER>") && !result.is_empty() && remaining.peek().is_some() {
            let (Some(numerator), Some(denominator)) = (result.pop(), remaining.next()) else {
                continue;
            };
            result.push(FormulaNode::Element {
                key: "<FRACTION>".to_string(),
                children: vec![numerator, denominator],
            });
        } else if bare("<ROOT>") && remaining.peek().is_some() {
            let radicand: Vec<FormulaNode> = remaining.next().into_iter().collect();
            result.push(FormulaNode::Element {
                key: "<ROOT>".to_string(),
                children: radicand,
            });
        } else {
            result.push(node);
        }
    }
    result
}

/// A literal Σ is a summation if a subscript follows, possibly after a
/// superscript. Best effort only.
fn could_be_sum(siblings: &[FormulaNode], index: usize) -> bool {
    if simple(siblings[index].representation()).as_deref() != Some(r"\Sigma") {
        return false;
    }
    match siblings.get(index + 1).and_then(FormulaNode::operator) {
        Some("_") => true,
        Some("^") => siblings
            .get(index + 2)
            .and_then(FormulaNode::operator)
            .is_some_and(|operator| operator == "_"),
        _ => false,
    }
}

fn render(siblings: &[FormulaNode], index: usize) -> String {
    let node = &siblings[index];
    if let Some(mapped) = simple(node.representation()) {
        if could_be_sum(siblings, index) {
            return r"\sum".to_string();
        }
        return mapped;
    }
    let (key, children) = match node {
        FormulaNode::Token(token) => {
            let textual = (is_word_sequence(token) && token.chars().count() >= 3) || is_abbreviation(token);
            if !textual {
                return token.clone();
            }
            let command = if token.contains(' ') { r"\text" } else { r"\mathrm" };
            return format!("{command}{{{token}}}");
        }
        FormulaNode::Element { key, children } => (key.as_str(), children),
    };
    if key == "<FRACTION>" && children.len() == 2 {
        return format!(r"\frac{}{}", render(children, 0), render(children, 1));
    }
    let inner = (0..children.len())
        .map(|k| render(children, k))
        .collect::<Vec<_>>()
        .join(" ");
    if matches!(key, "<EXPR>" | "<DIVIDEND>" | "<DIVISOR>") {
        return format!("{{{inner}}}");
    }
    if let Some((open, close)) = braces(key) {
        if contains_large_operator(&inner) {
            return format!(r"\left {open}{inner}\right {close}");
        }
        return format!("{open}{inner}{close}");
    }
    match operator(key) {
        Some("") => inner,
        Some(r"\mathrm") if inner.starts_with(r"\mathrm") || inner.starts_with(r"\text") => inner,
        Some(command) => format!("{command}{{{inner}}}"),
        None => inner,
    }
}

/// LaTeX of a formula element, leaving the tree untouched.
pub fn to_latex(tree: &Tree, formula: NodeId) -> String {
    render(&[FormulaNode::parse(tree, formula)], 0)
}

/// Replaces `FORMULA` / `FORMULA.S` by `span.lxp-math` or `div.lxp-math`.
pub fn formex_to_latex(tree: &mut Tree, formula: NodeId) {
    let latex = to_latex(tree, formula);
    let displayed = tree.is(formula, "FORMULA.S")
        || (tree.is(formula, "FORMULA") && tree.pop(formula, "TYPE").as_deref() == Some("OUTLINE"));
    let (tag, open, close) = if displayed {
        ("div", "$$", "$$")
    } else {
        ("span", r"\(", r"\)")
    };
    for child in tree.children(formula).to_vec() {
        tree.remove(child, false);
    }
    tree.set_tag(formula, tag);
    tree.set(formula, "class", MATH_CLASS);
    tree.set_text(formula, format!("{open}{latex}{close}"));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::parse_xml;

    fn latex(markup: &str) -> String {
        let tree = parse_xml(markup.as_bytes()).unwrap();
        to_latex(&tree, tree.root())
    }

    #[test]
    fn flat_fractions_are_nested() {
        assert_eq!(
            latex("<FORMULA><EXPR><EXPR>a</EXPR><OVER/><EXPR>b</EXPR></EXPR></FORMULA>"),
            r"{\frac{a}{b}}"
        );
    }

    #[test]
    fn brackets_grow_around_fractions() {
        assert_eq!(
            latex(r#"<FORMULA><EXPR TYPE="BRACKET"><FRACTION><DIVIDEND>1</DIVIDEND><DIVISOR>n</DIVISOR></FRACTION></EXPR></FORMULA>"#),
            r"\left (\frac{1}{n}\right )"
        );
        assert_eq!(latex(r#"<FORMULA><EXPR TYPE="SQBRACKET">a, b</EXPR></FORMULA>"#), "[a, b]");
    }

    #[test]
    fn sigma_before_subscript_is_a_sum() {
        // heuristic, known to be imprecise
        assert_eq!(
            latex("<FORMULA>\u{3a3}<IND>i</IND>x<IND>i</IND></FORMULA>"),
            r"\sum _{i} x _{i}"
        );
        assert_eq!(latex("<FORMULA>\u{3a3} = 1</FORMULA>"), r"\Sigma = 1");
    }

    #[test]
    fn words_and_operators() {
        assert_eq!(
            latex(r#"<FORMULA>total mass<OP.CMP TYPE="EQ"/>max<HT TYPE="ITALIC">CET</HT></FORMULA>"#),
            r"\text{total mass} = \max \mathrm{CET}"
        );
        assert_eq!(latex("<FORMULA>x<IND LOC=\"SUP\">2</IND> + 3%</FORMULA>"), r"x ^{2} + 3 \%");
    }

    #[test]
    fn formulas_are_replaced() {
        let mut tree = parse_xml(
            br#"<P>so that <FORMULA>a<OP.MATH TYPE="PLUS"/>b</FORMULA> holds <FORMULA.S><ROOT/><EXPR>x</EXPR></FORMULA.S></P>"#,
        )
        .unwrap();
        let root = tree.root();
        for formula in tree.find_all(root, |tree, node| tree.tag(node).starts_with("FORMULA")) {
            formex_to_latex(&mut tree, formula);
        }
        assert_eq!(
            tree.to_html(root),
            r#"<P>so that <span class="lxp-math">\(a + b\)</span> holds <div class="lxp-math">$$\sqrt{{x}}$$</div></P>"#
        );
    }
}
