use super::xml::PI_PREFIX;
use super::{NodeId, Tree};

const VOID_TAGS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "wbr",
];

fn escape_text(value: &str, out: &mut String) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
}

fn escape_attribute(value: &str, out: &mut String) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("&lt;"),
            _ => out.push(c),
        }
    }
}

impl Tree {
    /// HTML markup of the node, without its tail.
    pub fn to_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.write_node(id, &mut out);
        out
    }

    /// The whole document, prefixed by a doctype.
    pub fn to_document(&self) -> String {
        let mut out = String::from("<!DOCTYPE html>\n");
        self.write_node(self.root(), &mut out);
        out.push('\n');
        out
    }

    fn write_node(&self, id: NodeId, out: &mut String) {
        let tag = self.tag(id);
        if let Some(target) = tag.strip_prefix(PI_PREFIX) {
            out.push_str("<?");
            out.push_str(target);
            for (name, value) in self.attrs(id) {
                out.push_str(&format!(" {name}=\""));
                escape_attribute(value, out);
                out.push('"');
            }
            out.push_str("?>");
            return;
        }
        out.push('<');
        out.push_str(tag);
        for (name, value) in self.attrs(id) {
            out.push(' ');
            out.push_str(name);
            out.push_str("=\"");
            escape_attribute(value, out);
            out.push('"');
        }
        out.push('>');
        if VOID_TAGS.contains(&tag) && self.text(id).is_empty() && self.children(id).is_empty() {
            return;
        }
        escape_text(self.text(id), out);
        for &child in self.children(id) {
            self.write_node(child, out);
            escape_text(self.tail(child), out);
        }
        out.push_str("</");
        out.push_str(tag);
        out.push('>');
    }
}
