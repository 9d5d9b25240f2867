//! Node handles and per-node payloads.

use std::fmt;

/// Handle to a node in a [`Document`](super::Document).
///
/// Handles are cheap to copy. A released slot is reused with a bumped
/// generation, so a handle to a released node never aliases its successor.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({}v{})", self.index, self.generation)
    }
}

/// Node type, mirroring the DOM node types the runtime cares about.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeKind {
    Element,
    Text,
    Comment,
    Fragment,
}

#[derive(Clone, Debug)]
pub(crate) enum NodeData {
    Element(Element),
    Text(String),
    Comment(String),
    Fragment,
}

impl NodeData {
    pub(crate) fn kind(&self) -> NodeKind {
        match self {
            NodeData::Element(_) => NodeKind::Element,
            NodeData::Text(_) => NodeKind::Text,
            NodeData::Comment(_) => NodeKind::Comment,
            NodeData::Fragment => NodeKind::Fragment,
        }
    }
}

// =============================================================================
// Element
// =============================================================================

/// Live form-control state. Each field shadows the matching attribute once set,
/// the way a browser's `value`/`checked`/`selected` properties do.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct FormState {
    pub value: Option<String>,
    pub checked: Option<bool>,
    pub selected: Option<bool>,
}

/// Element payload: tag name, ordered attributes and form state.
#[derive(Clone, Debug)]
pub struct Element {
    tag: String,
    attributes: Vec<(String, String)>,
    pub(crate) form: FormState,
}

impl Element {
    pub(crate) fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            attributes: Vec::new(),
            form: FormState::default(),
        }
    }

    /// Lowercase tag name.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.iter().any(|(key, _)| key == name)
    }

    /// Attributes in insertion order.
    pub fn attributes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    /// Set or overwrite an attribute, keeping its original position.
    pub fn set_attribute(&mut self, name: &str, value: &str) {
        match self.attributes.iter_mut().find(|(key, _)| key == name) {
            Some((_, current)) => *current = value.to_string(),
            None => self.attributes.push((name.to_string(), value.to_string())),
        }
    }

    pub fn remove_attribute(&mut self, name: &str) -> Option<String> {
        let position = self.attributes.iter().position(|(key, _)| key == name)?;
        Some(self.attributes.remove(position).1)
    }

    // -------------------------------------------------------------------------
    // class attribute as a list
    // -------------------------------------------------------------------------

    pub fn has_class(&self, class: &str) -> bool {
        self.attribute("class")
            .is_some_and(|list| list.split_whitespace().any(|c| c == class))
    }

    pub fn add_class(&mut self, class: &str) {
        let class = class.trim();
        if class.is_empty() || self.has_class(class) {
            return;
        }
        let list = match self.attribute("class").map(str::trim) {
            Some(current) if !current.is_empty() => format!("{} {}", current, class),
            _ => class.to_string(),
        };
        self.set_attribute("class", &list);
    }

    /// Remove a class; the attribute goes away once the list is empty.
    pub fn remove_class(&mut self, class: &str) {
        let Some(current) = self.attribute("class") else {
            return;
        };
        let remaining: Vec<&str> = current
            .split_whitespace()
            .filter(|c| *c != class)
            .collect();
        if remaining.is_empty() {
            self.remove_attribute("class");
        } else {
            let list = remaining.join(" ");
            self.set_attribute("class", &list);
        }
    }

    // -------------------------------------------------------------------------
    // style attribute as declarations
    // -------------------------------------------------------------------------

    fn declarations(&self) -> Vec<(String, String)> {
        self.attribute("style")
            .unwrap_or("")
            .split(';')
            .filter_map(|declaration| {
                let (property, value) = declaration.split_once(':')?;
                let property = property.trim();
                (!property.is_empty())
                    .then(|| (property.to_ascii_lowercase(), value.trim().to_string()))
            })
            .collect()
    }

    /// Inline style value for `property`, if declared.
    pub fn style(&self, property: &str) -> Option<String> {
        self.declarations()
            .into_iter()
            .find(|(name, _)| name == property)
            .map(|(_, value)| value)
    }

    /// Set (`Some`) or remove (`None` or empty) one inline declaration.
    pub fn set_style(&mut self, property: &str, value: Option<&str>) {
        let property = property.trim().to_ascii_lowercase();
        let mut declarations = self.declarations();
        let value = value.map(str::trim).filter(|v| !v.is_empty());

        match (declarations.iter().position(|(name, _)| *name == property), value) {
            (Some(i), Some(value)) => declarations[i].1 = value.to_string(),
            (Some(i), None) => {
                declarations.remove(i);
            }
            (None, Some(value)) => declarations.push((property, value.to_string())),
            (None, None) => return,
        }

        if declarations.is_empty() {
            self.remove_attribute("style");
        } else {
            let text = declarations
                .iter()
                .map(|(name, value)| format!("{}: {};", name, value))
                .collect::<Vec<_>>()
                .join(" ");
            self.set_attribute("style", &text);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_order_is_stable() {
        let mut element = Element::new("DIV");
        element.set_attribute("id", "a");
        element.set_attribute("title", "t");
        element.set_attribute("id", "b");

        assert_eq!(element.tag(), "div");
        let attributes: Vec<_> = element.attributes().collect();
        assert_eq!(attributes, vec![("id", "b"), ("title", "t")]);
        assert_eq!(element.remove_attribute("id"), Some("b".to_string()));
        assert!(!element.has_attribute("id"));
    }

    #[test]
    fn test_class_list() {
        let mut element = Element::new("p");
        element.add_class("a");
        element.add_class("b");
        element.add_class("a");
        assert_eq!(element.attribute("class"), Some("a b"));

        element.remove_class("a");
        assert_eq!(element.attribute("class"), Some("b"));
        element.remove_class("b");
        assert!(!element.has_attribute("class"), "empty class list drops the attribute");
    }

    #[test]
    fn test_inline_style() {
        let mut element = Element::new("p");
        element.set_attribute("style", "color: red;display:flex");
        assert_eq!(element.style("display"), Some("flex".to_string()));

        element.set_style("display", Some("none"));
        assert_eq!(element.attribute("style"), Some("color: red; display: none;"));

        element.set_style("color", None);
        element.set_style("display", None);
        assert!(!element.has_attribute("style"));
    }
}
