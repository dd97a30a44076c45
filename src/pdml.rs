//! Line-oriented scanner for tshark's PDML output.
//!
//! tshark with `-T pdml -l` emits one element per line, so packets can be
//! carved out of the stream without a full XML parser: accumulate between
//! `<packet>` and `</packet>`, then walk the lines once. Only the subset
//! the dissector actually emits is handled: `<proto>` elements as direct
//! children of the packet become protocol layers, and their direct
//! `<field>` children become that layer's fields. Nested protos and nested
//! fields are structural detail we do not surface and are skipped.

use crate::layers::{LayerField, LayerNode, chain};

/// Accumulates streamed PDML lines into complete `<packet>` elements.
#[derive(Default)]
pub struct PdmlCollector {
    buf: String,
    in_packet: bool,
}

impl PdmlCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one line of tshark output. Returns the body of a packet
    /// element once its closing tag arrives. Preamble lines and anything
    /// between packets produce nothing.
    pub fn push_line(&mut self, line: &str) -> Option<String> {
        let trimmed = line.trim_start();
        if !self.in_packet {
            if trimmed.starts_with("<packet>") {
                self.in_packet = true;
                self.buf.clear();
            }
            return None;
        }
        if trimmed.starts_with("</packet>") {
            self.in_packet = false;
            return Some(std::mem::take(&mut self.buf));
        }
        self.buf.push_str(line);
        self.buf.push('\n');
        None
    }
}

/// Parses one packet body into its protocol-layer chain. Returns `None`
/// when the packet carries no protocol elements at all.
pub fn parse_packet(text: &str) -> Option<LayerNode> {
    let mut nodes: Vec<LayerNode> = Vec::new();
    let mut current: Option<LayerNode> = None;
    let mut proto_depth = 0usize;
    let mut field_depth = 0usize;

    for raw in text.lines() {
        let line = raw.trim_start();
        if let Some(tag) = element(line, "proto") {
            if proto_depth == 0 {
                let name = attr_value(tag.body, "name").unwrap_or_default();
                current = Some(LayerNode::new(name));
            }
            if tag.self_closing {
                if proto_depth == 0
                    && let Some(node) = current.take()
                {
                    nodes.push(node);
                }
            } else {
                proto_depth += 1;
            }
        } else if line.starts_with("</proto>") {
            proto_depth = proto_depth.saturating_sub(1);
            if proto_depth == 0 {
                if let Some(node) = current.take() {
                    nodes.push(node);
                }
                field_depth = 0;
            }
        } else if let Some(tag) = element(line, "field") {
            if proto_depth == 1
                && field_depth == 0
                && let Some(node) = current.as_mut()
            {
                node.fields.push(field_from_tag(tag.body));
            }
            if !tag.self_closing {
                field_depth += 1;
            }
        } else if line.starts_with("</field>") {
            field_depth = field_depth.saturating_sub(1);
        }
    }

    chain(nodes)
}

struct Tag<'a> {
    body: &'a str,
    self_closing: bool,
}

/// Matches an opening tag of the given element at the start of the line.
/// The returned body keeps its leading space so attribute lookups can
/// anchor on ` name="` and friends.
fn element<'a>(line: &'a str, name: &str) -> Option<Tag<'a>> {
    let rest = line.strip_prefix('<')?.strip_prefix(name)?;
    match rest.bytes().next() {
        Some(b' ') | Some(b'>') | Some(b'/') => {}
        _ => return None,
    }
    let end = rest.find('>')?;
    let body = &rest[..end];
    Some(Tag {
        body,
        self_closing: body.trim_end().ends_with('/'),
    })
}

fn field_from_tag(body: &str) -> LayerField {
    LayerField {
        name: attr_value(body, "name")
            .unwrap_or_default()
            .to_ascii_lowercase(),
        value: attr_value(body, "show").unwrap_or_default(),
        offset: attr_value(body, "pos").unwrap_or_default(),
        length: attr_value(body, "size").unwrap_or_default(),
    }
}

/// Extracts one attribute value from a tag body. The needle carries a
/// leading space so `name=` never matches inside `showname=`.
fn attr_value(body: &str, name: &str) -> Option<String> {
    let needle = format!(" {name}=\"");
    let start = body.find(&needle)? + needle.len();
    let rest = &body[start..];
    let end = rest.find('"')?;
    Some(unescape(&rest[..end]))
}

/// Resolves the entity references the dissector emits in attribute values.
/// Unknown references are kept verbatim.
fn unescape(value: &str) -> String {
    if !value.contains('&') {
        return value.to_string();
    }
    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        let Some(semi) = rest.find(';') else {
            break;
        };
        match &rest[1..semi] {
            "lt" => out.push('<'),
            "gt" => out.push('>'),
            "amp" => out.push('&'),
            "quot" => out.push('"'),
            "apos" => out.push('\''),
            entity => {
                if let Some(ch) = char_reference(entity) {
                    out.push(ch);
                } else {
                    out.push_str(&rest[..=semi]);
                }
            }
        }
        rest = &rest[semi + 1..];
    }
    out.push_str(rest);
    out
}

fn char_reference(entity: &str) -> Option<char> {
    let digits = entity.strip_prefix('#')?;
    let code = if let Some(hex) = digits.strip_prefix('x').or_else(|| digits.strip_prefix('X')) {
        u32::from_str_radix(hex, 16).ok()?
    } else {
        digits.parse::<u32>().ok()?
    };
    char::from_u32(code)
}
