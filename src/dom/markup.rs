//! Markup parsing (via `tl`) and serialization.

use std::borrow::Cow;

use super::node::{NodeData, NodeId};
use super::registry::Document;

/// Elements serialized without content or closing tag.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source",
    "track", "wbr",
];

// =============================================================================
// Parsing
// =============================================================================

/// Parse `markup` into detached nodes of `document`, in source order.
pub(crate) fn parse_nodes(document: &mut Document, markup: &str) -> Vec<NodeId> {
    let Ok(dom) = tl::parse(markup, tl::ParserOptions::default()) else {
        // Parse failed, keep the input as plain text
        return vec![document.create_text(markup)];
    };

    let parser = dom.parser();
    dom.children()
        .iter()
        .filter_map(|handle| convert(document, *handle, parser, markup))
        .collect()
}

fn convert(
    document: &mut Document,
    handle: tl::NodeHandle,
    parser: &tl::Parser,
    source: &str,
) -> Option<NodeId> {
    match handle.get(parser)? {
        tl::Node::Tag(tag) => {
            let name = tag.name().as_utf8_str().to_lowercase();
            let element = document.create_element(&name);

            // tl keeps attributes in a hash map; restore source order from
            // where each name sits in the input.
            let mut attributes: Vec<(usize, String, String)> = tag
                .attributes()
                .iter()
                .map(|(key, value)| {
                    let offset = source_offset(source, &key);
                    let value = value.map(|v| decode_entities(&v)).unwrap_or_default();
                    (offset, key.to_string(), value)
                })
                .collect();
            attributes.sort_by_key(|(offset, ..)| *offset);
            for (_, key, value) in attributes {
                document.set_attribute(element, &key, &value);
            }

            for child_handle in tag.children().top().iter() {
                if let Some(child) = convert(document, *child_handle, parser, source) {
                    document.append_child(element, child);
                }
            }

            Some(element)
        }
        tl::Node::Raw(bytes) => {
            let text = decode_entities(&bytes.as_utf8_str());
            Some(document.create_text(&text))
        }
        tl::Node::Comment(bytes) => {
            let raw = bytes.as_utf8_str();
            let text = raw
                .strip_prefix("<!--")
                .and_then(|t| t.strip_suffix("-->"))
                .unwrap_or(raw.as_ref());
            Some(document.create_comment(text))
        }
    }
}

/// Byte offset of a borrowed slice inside `source`; `usize::MAX` for owned data.
fn source_offset(source: &str, part: &Cow<'_, str>) -> usize {
    let start = source.as_ptr() as usize;
    let at = part.as_ptr() as usize;
    match part {
        Cow::Borrowed(_) if at >= start && at < start + source.len() => at - start,
        _ => usize::MAX,
    }
}

fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", "\u{a0}")
        .replace("&amp;", "&")
}

// =============================================================================
// Serialization
// =============================================================================

pub(crate) fn inner_html(document: &Document, id: NodeId) -> String {
    let mut out = String::new();
    for child in document.children(id) {
        write_node(document, *child, &mut out);
    }
    out
}

pub(crate) fn outer_html(document: &Document, id: NodeId) -> String {
    let mut out = String::new();
    write_node(document, id, &mut out);
    out
}

fn write_node(document: &Document, id: NodeId, out: &mut String) {
    let Some(data) = document.data(id) else {
        return;
    };

    match data {
        NodeData::Element(element) => {
            out.push('<');
            out.push_str(element.tag());
            for (name, value) in element.attributes() {
                out.push(' ');
                out.push_str(name);
                out.push_str("=\"");
                out.push_str(&escape(value, true));
                out.push('"');
            }
            out.push('>');

            if VOID_ELEMENTS.contains(&element.tag()) {
                return;
            }
            for child in document.children(id) {
                write_node(document, *child, out);
            }
            out.push_str("</");
            out.push_str(element.tag());
            out.push('>');
        }
        NodeData::Text(text) => out.push_str(&escape(text, false)),
        NodeData::Comment(text) => {
            out.push_str("<!--");
            out.push_str(text);
            out.push_str("-->");
        }
        NodeData::Fragment => {
            for child in document.children(id) {
                write_node(document, *child, out);
            }
        }
    }
}

fn escape(text: &str, attribute: bool) -> Cow<'_, str> {
    let needs = |c: char| {
        c == '&' || c == '\u{a0}' || (attribute && c == '"') || (!attribute && (c == '<' || c == '>'))
    };
    if !text.chars().any(needs) {
        return Cow::Borrowed(text);
    }

    let mut out = String::with_capacity(text.len() + 8);
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            '"' if attribute => out.push_str("&quot;"),
            '<' if !attribute => out.push_str("&lt;"),
            '>' if !attribute => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    Cow::Owned(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let markup = r#"<div id="main"><p>Hello <b>world</b></p><!-- note --><ul><li>1</li><li>2</li></ul></div>"#;
        let doc = Document::parse(markup);
        assert_eq!(doc.inner_html(doc.body()), markup);
    }

    #[test]
    fn test_attribute_source_order() {
        let doc = Document::parse(r#"<a v-on:click="go" title="t" data-x="1" v-text="label"></a>"#);
        let a = doc.first_child(doc.body()).unwrap();
        assert_eq!(
            doc.attribute_names(a),
            vec!["v-on:click", "title", "data-x", "v-text"]
        );
    }

    #[test]
    fn test_entities() {
        let doc = Document::parse("<p>a &amp; b &lt;c&gt;</p>");
        let p = doc.first_child(doc.body()).unwrap();
        assert_eq!(doc.text_content(p), "a & b <c>");
        assert_eq!(doc.inner_html(p), "a &amp; b &lt;c&gt;");
    }

    #[test]
    fn test_void_elements() {
        let doc = Document::parse(r#"<p><input type="text" />after</p>"#);
        let p = doc.first_child(doc.body()).unwrap();
        assert_eq!(doc.inner_html(p), r#"<input type="text">after"#);
    }

    #[test]
    fn test_interpolation_text_survives() {
        let doc = Document::parse("<p>Hi {{ name }}!</p>");
        let p = doc.first_child(doc.body()).unwrap();
        assert_eq!(doc.text_content(p), "Hi {{ name }}!");
    }
}
