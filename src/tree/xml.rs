use quick_xml::Reader;
use quick_xml::escape::unescape;
use quick_xml::events::{BytesStart, Event};

use super::{NodeId, Tree};
use crate::error::{Result, TransformError};

/// Tag prefix of processing-instruction nodes, e.g. `?PROCESSING`.
pub const PI_PREFIX: char = '?';

/// Parses an XML document. Processing instructions are kept as nodes whose
/// tag is the target prefixed with `?` and whose attributes are the
/// instruction's pseudo-attributes.
pub fn parse_xml(bytes: &[u8]) -> Result<Tree> {
    let mut reader = Reader::from_reader(bytes);
    let mut tree: Option<Tree> = None;
    let mut stack: Vec<NodeId> = Vec::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => {
                let id = open_element(&mut tree, &stack, &e);
                stack.push(id);
            }
            Event::Empty(e) => {
                open_element(&mut tree, &stack, &e);
            }
            Event::End(_) => {
                stack.pop();
            }
            Event::Text(e) => {
                push_character_data(&mut tree, &stack, &String::from_utf8_lossy(e.as_ref()));
            }
            Event::CData(e) => {
                push_character_data(&mut tree, &stack, &String::from_utf8_lossy(e.as_ref()));
            }
            Event::GeneralRef(e) => {
                let entity = String::from_utf8_lossy(e.as_ref());
                if let Some(resolved) = resolve_entity(&entity) {
                    push_character_data(&mut tree, &stack, &resolved);
                }
            }
            Event::PI(e) => {
                if let (Some(tree), Some(&parent)) = (tree.as_mut(), stack.last()) {
                    let raw = String::from_utf8_lossy(&e);
                    let (target, content) = raw.split_once(char::is_whitespace).unwrap_or((raw.as_ref(), ""));
                    let id = tree.create(&format!("{PI_PREFIX}{target}"));
                    for (name, value) in pseudo_attributes(content) {
                        tree.set(id, &name, value);
                    }
                    tree.append(parent, id);
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    tree.ok_or_else(|| TransformError::MissingElement("document element".to_string()))
}

fn open_element(tree: &mut Option<Tree>, stack: &[NodeId], e: &BytesStart<'_>) -> NodeId {
    let tag = String::from_utf8_lossy(e.name().as_ref()).into_owned();
    let tree = tree.get_or_insert_with(|| Tree::new(&tag));
    let id = match stack.last() {
        Some(&parent) => {
            let id = tree.create(&tag);
            tree.append(parent, id);
            id
        }
        None => tree.root(),
    };
    for attr in e.attributes().flatten() {
        let name = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let raw = String::from_utf8_lossy(&attr.value).into_owned();
        let value = unescape(&raw).map(|value| value.into_owned()).unwrap_or(raw);
        tree.set(id, &name, value);
    }
    id
}

fn push_character_data(tree: &mut Option<Tree>, stack: &[NodeId], data: &str) {
    let (Some(tree), Some(&current)) = (tree.as_mut(), stack.last()) else {
        return;
    };
    match tree.last_child(current) {
        Some(last) => tree.push_tail(last, data),
        None => tree.push_text(current, data),
    }
}

fn resolve_entity(entity: &str) -> Option<String> {
    match entity {
        "amp" => Some("&".to_string()),
        "lt" => Some("<".to_string()),
        "gt" => Some(">".to_string()),
        "quot" => Some("\"".to_string()),
        "apos" => Some("'".to_string()),
        _ => {
            let code = entity.strip_prefix('#')?;
            let value = match code.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => code.parse().ok()?,
            };
            char::from_u32(value).map(String::from)
        }
    }
}

/// `ACTION="DELETED" ID="x"` style content of a processing instruction.
fn pseudo_attributes(content: &str) -> Vec<(String, String)> {
    let mut result = Vec::new();
    let mut rest = content.trim();
    while let Some((name, after)) = rest.split_once('=') {
        let after = after.trim_start();
        let Some(quote) = after.chars().next().filter(|c| *c == '"' || *c == '\'') else {
            break;
        };
        let Some((value, remainder)) = after[1..].split_once(quote) else {
            break;
        };
        result.push((name.trim().to_string(), value.to_string()));
        rest = remainder.trim_start();
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pseudo_attributes_are_split() {
        assert_eq!(
            pseudo_attributes(r#"ACTION="DELETED" IDREF='p2'"#),
            vec![
                ("ACTION".to_string(), "DELETED".to_string()),
                ("IDREF".to_string(), "p2".to_string())
            ]
        );
    }

    #[test]
    fn numeric_references_are_resolved() {
        assert_eq!(resolve_entity("#160").as_deref(), Some("\u{a0}"));
        assert_eq!(resolve_entity("#x2014").as_deref(), Some("—"));
        assert_eq!(resolve_entity("nbsp"), None);
    }
}
