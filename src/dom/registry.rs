//! Document - node arena with handle allocation and tree operations.
//!
//! Manages the lifecycle of nodes:
//! - Slot allocation with a free-index pool for O(1) reuse
//! - Generation counters so stale handles are detected, never aliased
//! - Parent/children links and the usual tree mutations
//! - Recursive release of detached subtrees
//!
//! Engine state about a node (loop tags, cached markup, listeners) is NOT
//! stored here; the runtime keeps it in side tables keyed by [`NodeId`].

use super::markup;
use super::node::{Element, NodeData, NodeId, NodeKind};

// =============================================================================
// Arena State
// =============================================================================

#[derive(Clone, Debug)]
struct Entry {
    data: NodeData,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

#[derive(Clone, Debug)]
struct Slot {
    generation: u32,
    entry: Option<Entry>,
}

/// A tree of nodes rooted at a `<body>` element.
#[derive(Clone, Debug)]
pub struct Document {
    slots: Vec<Slot>,
    /// Pool of released slot indices for reuse.
    free: Vec<u32>,
    body: NodeId,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Empty document holding only its `<body>`.
    pub fn new() -> Self {
        let mut document = Self {
            slots: Vec::new(),
            free: Vec::new(),
            body: NodeId {
                index: 0,
                generation: 0,
            },
        };
        document.body = document.allocate(NodeData::Element(Element::new("body")));
        document
    }

    /// Document whose body holds the parsed `markup`.
    pub fn parse(markup: &str) -> Self {
        let mut document = Self::new();
        let body = document.body;
        for node in markup::parse_nodes(&mut document, markup) {
            document.append_child(body, node);
        }
        document
    }

    pub fn body(&self) -> NodeId {
        self.body
    }

    // =========================================================================
    // Allocation
    // =========================================================================

    fn allocate(&mut self, data: NodeData) -> NodeId {
        let entry = Entry {
            data,
            parent: None,
            children: Vec::new(),
        };

        // Reuse free index or allocate new
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.entry = Some(entry);
            return NodeId {
                index,
                generation: slot.generation,
            };
        }

        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            entry: Some(entry),
        });
        NodeId {
            index,
            generation: 0,
        }
    }

    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.allocate(NodeData::Element(Element::new(tag)))
    }

    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.allocate(NodeData::Text(text.to_string()))
    }

    pub fn create_comment(&mut self, text: &str) -> NodeId {
        self.allocate(NodeData::Comment(text.to_string()))
    }

    pub fn create_fragment(&mut self) -> NodeId {
        self.allocate(NodeData::Fragment)
    }

    /// Fragment holding the parsed `markup`, detached from the tree.
    pub fn parse_fragment(&mut self, markup: &str) -> NodeId {
        let fragment = self.create_fragment();
        for node in markup::parse_nodes(self, markup) {
            self.append_child(fragment, node);
        }
        fragment
    }

    fn entry(&self, id: NodeId) -> Option<&Entry> {
        let slot = self.slots.get(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.entry.as_ref()
    }

    fn entry_mut(&mut self, id: NodeId) -> Option<&mut Entry> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.entry.as_mut()
    }

    /// The handle refers to a node that has not been released.
    pub fn contains(&self, id: NodeId) -> bool {
        self.entry(id).is_some()
    }

    /// Number of live nodes, including the body.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.entry.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // =========================================================================
    // Node typing
    // =========================================================================

    pub fn kind(&self, id: NodeId) -> Option<NodeKind> {
        self.entry(id).map(|entry| entry.data.kind())
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        self.kind(id) == Some(NodeKind::Element)
    }

    pub fn is_text(&self, id: NodeId) -> bool {
        self.kind(id) == Some(NodeKind::Text)
    }

    pub fn element(&self, id: NodeId) -> Option<&Element> {
        match &self.entry(id)?.data {
            NodeData::Element(element) => Some(element),
            _ => None,
        }
    }

    pub fn element_mut(&mut self, id: NodeId) -> Option<&mut Element> {
        match &mut self.entry_mut(id)?.data {
            NodeData::Element(element) => Some(element),
            _ => None,
        }
    }

    pub(crate) fn data(&self, id: NodeId) -> Option<&NodeData> {
        self.entry(id).map(|entry| &entry.data)
    }

    /// Lowercase tag name of an element.
    pub fn tag_name(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(Element::tag)
    }

    // =========================================================================
    // Navigation
    // =========================================================================

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.entry(id)?.parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.entry(id)
            .map(|entry| entry.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.children(id).first().copied()
    }

    pub fn last_child(&self, id: NodeId) -> Option<NodeId> {
        self.children(id).last().copied()
    }

    fn position(&self, id: NodeId) -> Option<(NodeId, usize)> {
        let parent = self.parent(id)?;
        let position = self.children(parent).iter().position(|c| *c == id)?;
        Some((parent, position))
    }

    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        let (parent, position) = self.position(id)?;
        self.children(parent).get(position + 1).copied()
    }

    pub fn previous_sibling(&self, id: NodeId) -> Option<NodeId> {
        let (parent, position) = self.position(id)?;
        position
            .checked_sub(1)
            .and_then(|p| self.children(parent).get(p).copied())
    }

    /// Every node below `id` in document order (excluding `id`).
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(node) = stack.pop() {
            out.push(node);
            stack.extend(self.children(node).iter().rev().copied());
        }
        out
    }

    /// `ancestor` is `id` or one of its ancestors.
    pub fn is_inclusive_ancestor(&self, ancestor: NodeId, id: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(node) = current {
            if node == ancestor {
                return true;
            }
            current = self.parent(node);
        }
        false
    }

    /// The node is connected to this document's body.
    pub fn is_attached(&self, id: NodeId) -> bool {
        self.contains(id) && self.is_inclusive_ancestor(self.body, id)
    }

    // =========================================================================
    // Mutation
    // =========================================================================

    /// Unlink a node from its parent. Returns false if it had none.
    pub fn detach(&mut self, id: NodeId) -> bool {
        let Some(parent) = self.entry_mut(id).and_then(|entry| entry.parent.take()) else {
            return false;
        };
        if let Some(entry) = self.entry_mut(parent) {
            entry.children.retain(|child| *child != id);
        }
        true
    }

    /// Nodes to insert for `child`: a fragment contributes its children.
    fn take_insertable(&mut self, child: NodeId) -> Vec<NodeId> {
        match self.kind(child) {
            Some(NodeKind::Fragment) => {
                let children = self
                    .entry_mut(child)
                    .map(|entry| std::mem::take(&mut entry.children))
                    .unwrap_or_default();
                for node in &children {
                    if let Some(entry) = self.entry_mut(*node) {
                        entry.parent = None;
                    }
                }
                children
            }
            Some(_) => {
                self.detach(child);
                vec![child]
            }
            None => Vec::new(),
        }
    }

    /// Insert `child` before `reference` (or at the end when `None`).
    ///
    /// Inserting a fragment moves its children and leaves it empty. Inserting
    /// a node into its own subtree is ignored.
    pub fn insert_before(&mut self, parent: NodeId, child: NodeId, reference: Option<NodeId>) {
        if !self.contains(parent) || self.is_inclusive_ancestor(child, parent) {
            return;
        }

        let nodes = self.take_insertable(child);
        for node in &nodes {
            if let Some(entry) = self.entry_mut(*node) {
                entry.parent = Some(parent);
            }
        }

        let Some(entry) = self.entry_mut(parent) else {
            return;
        };
        let at = reference
            .and_then(|r| entry.children.iter().position(|c| *c == r))
            .unwrap_or(entry.children.len());
        entry.children.splice(at..at, nodes);
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.insert_before(parent, child, None);
    }

    /// Put `new` where `old` is and detach `old`.
    pub fn replace_child(&mut self, new: NodeId, old: NodeId) {
        let Some(parent) = self.parent(old) else {
            return;
        };
        self.insert_before(parent, new, Some(old));
        self.detach(old);
    }

    /// Copy a node (and its subtree when `deep`) into a new detached node.
    pub fn clone_node(&mut self, id: NodeId, deep: bool) -> Option<NodeId> {
        let data = self.entry(id)?.data.clone();
        let copy = self.allocate(data);
        if deep {
            let children = self.children(id).to_vec();
            for child in children {
                if let Some(child_copy) = self.clone_node(child, true) {
                    self.append_child(copy, child_copy);
                }
            }
        }
        Some(copy)
    }

    /// Detach `id` and free it with its whole subtree.
    ///
    /// Returns every released handle so callers can drop their own state.
    pub fn release(&mut self, id: NodeId) -> Vec<NodeId> {
        if !self.contains(id) || id == self.body {
            return Vec::new();
        }
        self.detach(id);

        let mut released = self.descendants(id);
        released.push(id);
        for node in &released {
            let slot = &mut self.slots[node.index as usize];
            slot.entry = None;
            slot.generation = slot.generation.wrapping_add(1);
            self.free.push(node.index);
        }
        released
    }

    /// Release all children of `id`.
    pub fn empty(&mut self, id: NodeId) -> Vec<NodeId> {
        let children = self.children(id).to_vec();
        children
            .into_iter()
            .flat_map(|child| self.release(child))
            .collect()
    }

    // =========================================================================
    // Text
    // =========================================================================

    /// Data of a text or comment node.
    pub fn text(&self, id: NodeId) -> Option<&str> {
        match &self.entry(id)?.data {
            NodeData::Text(text) | NodeData::Comment(text) => Some(text),
            _ => None,
        }
    }

    /// Concatenated text of the node and its descendants.
    pub fn text_content(&self, id: NodeId) -> String {
        if let Some(text) = self.text(id) {
            return text.to_string();
        }
        self.descendants(id)
            .into_iter()
            .filter(|node| self.is_text(*node))
            .filter_map(|node| self.text(node))
            .collect()
    }

    /// Replace the text of a text node, or the children of an element with a
    /// single text node. Returns the released children.
    pub fn set_text_content(&mut self, id: NodeId, text: &str) -> Vec<NodeId> {
        if let Some(entry) = self.entry_mut(id) {
            if let NodeData::Text(data) | NodeData::Comment(data) = &mut entry.data {
                *data = text.to_string();
                return Vec::new();
            }
        }
        let released = self.empty(id);
        if !text.is_empty() {
            let node = self.create_text(text);
            self.append_child(id, node);
        }
        released
    }

    /// Replace the children of `id` with parsed `markup`. Returns the released
    /// children.
    pub fn set_inner_html(&mut self, id: NodeId, markup: &str) -> Vec<NodeId> {
        let released = self.empty(id);
        let fragment = self.parse_fragment(markup);
        self.append_child(id, fragment);
        self.release(fragment);
        released
    }

    pub fn inner_html(&self, id: NodeId) -> String {
        markup::inner_html(self, id)
    }

    pub fn outer_html(&self, id: NodeId) -> String {
        markup::outer_html(self, id)
    }

    // =========================================================================
    // Attributes
    // =========================================================================

    pub fn attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id)?.attribute(name)
    }

    pub fn has_attribute(&self, id: NodeId, name: &str) -> bool {
        self.element(id).is_some_and(|e| e.has_attribute(name))
    }

    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: &str) {
        if let Some(element) = self.element_mut(id) {
            element.set_attribute(name, value);
        }
    }

    pub fn remove_attribute(&mut self, id: NodeId, name: &str) -> Option<String> {
        self.element_mut(id)?.remove_attribute(name)
    }

    /// Attribute names in order.
    pub fn attribute_names(&self, id: NodeId) -> Vec<String> {
        self.element(id)
            .map(|e| e.attributes().map(|(name, _)| name.to_string()).collect())
            .unwrap_or_default()
    }

    pub fn has_class(&self, id: NodeId, class: &str) -> bool {
        self.element(id).is_some_and(|e| e.has_class(class))
    }

    pub fn add_class(&mut self, id: NodeId, class: &str) {
        if let Some(element) = self.element_mut(id) {
            element.add_class(class);
        }
    }

    pub fn remove_class(&mut self, id: NodeId, class: &str) {
        if let Some(element) = self.element_mut(id) {
            element.remove_class(class);
        }
    }

    pub fn style(&self, id: NodeId, property: &str) -> Option<String> {
        self.element(id)?.style(property)
    }

    pub fn set_style(&mut self, id: NodeId, property: &str, value: Option<&str>) {
        if let Some(element) = self.element_mut(id) {
            element.set_style(property, value);
        }
    }

    // =========================================================================
    // Form state
    // =========================================================================

    /// The control's presented value.
    pub fn value(&self, id: NodeId) -> String {
        let Some(element) = self.element(id) else {
            return String::new();
        };
        if let Some(value) = &element.form.value {
            return value.clone();
        }
        match element.tag() {
            "textarea" => self.text_content(id),
            "option" => element
                .attribute("value")
                .map(str::to_string)
                .unwrap_or_else(|| self.text_content(id).trim().to_string()),
            "select" => self
                .selected_options(id)
                .first()
                .map(|option| self.value(*option))
                .unwrap_or_default(),
            "input" if is_checkable(element) => element.attribute("value").unwrap_or("on").to_string(),
            _ => element.attribute("value").unwrap_or("").to_string(),
        }
    }

    pub fn set_value(&mut self, id: NodeId, value: &str) {
        if let Some(element) = self.element_mut(id) {
            element.form.value = Some(value.to_string());
        }
    }

    pub fn checked(&self, id: NodeId) -> bool {
        self.element(id)
            .is_some_and(|e| e.form.checked.unwrap_or_else(|| e.has_attribute("checked")))
    }

    /// Set the checked state. Checking a named radio unchecks the rest of
    /// its group.
    pub fn set_checked(&mut self, id: NodeId, checked: bool) {
        let group = self
            .element(id)
            .filter(|e| checked && e.attribute("type") == Some("radio"))
            .and_then(|e| e.attribute("name"))
            .map(str::to_string);

        if let Some(name) = group {
            for slot in &mut self.slots {
                if let Some(Entry {
                    data: NodeData::Element(element),
                    ..
                }) = &mut slot.entry
                {
                    if element.tag() == "input"
                        && element.attribute("type") == Some("radio")
                        && element.attribute("name") == Some(name.as_str())
                    {
                        element.form.checked = Some(false);
                    }
                }
            }
        }

        if let Some(element) = self.element_mut(id) {
            element.form.checked = Some(checked);
        }
    }

    pub fn selected(&self, id: NodeId) -> bool {
        self.element(id)
            .is_some_and(|e| e.form.selected.unwrap_or_else(|| e.has_attribute("selected")))
    }

    pub fn set_selected(&mut self, id: NodeId, selected: bool) {
        if let Some(element) = self.element_mut(id) {
            element.form.selected = Some(selected);
        }
    }

    /// `<option>` descendants of a select, in document order.
    pub fn options(&self, select: NodeId) -> Vec<NodeId> {
        self.descendants(select)
            .into_iter()
            .filter(|node| self.tag_name(*node) == Some("option"))
            .collect()
    }

    /// Selected options. A single-choice select with nothing marked reports
    /// its first option, as browsers do.
    pub fn selected_options(&self, select: NodeId) -> Vec<NodeId> {
        let options = self.options(select);
        let selected: Vec<NodeId> = options
            .iter()
            .copied()
            .filter(|option| self.selected(*option))
            .collect();

        if selected.is_empty() && !self.has_attribute(select, "multiple") {
            return options.into_iter().take(1).collect();
        }
        selected
    }
}

fn is_checkable(element: &Element) -> bool {
    matches!(element.attribute("type"), Some("checkbox") | Some("radio"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_and_reuse() {
        let mut doc = Document::new();
        let a = doc.create_element("div");
        let b = doc.create_text("x");
        assert!(doc.contains(a));
        assert_eq!(doc.len(), 3);

        let released = doc.release(a);
        assert_eq!(released, vec![a]);
        assert!(!doc.contains(a));

        // Reuses the freed slot but the old handle stays dead
        let c = doc.create_element("span");
        assert_eq!(c.index, a.index);
        assert_ne!(c, a);
        assert!(!doc.contains(a));
        assert!(doc.contains(b));
    }

    #[test]
    fn test_tree_mutation() {
        let mut doc = Document::new();
        let body = doc.body();
        let list = doc.create_element("ul");
        doc.append_child(body, list);

        let first = doc.create_element("li");
        let third = doc.create_element("li");
        doc.append_child(list, first);
        doc.append_child(list, third);

        let second = doc.create_element("li");
        doc.insert_before(list, second, Some(third));

        assert_eq!(doc.children(list), &[first, second, third]);
        assert_eq!(doc.next_sibling(first), Some(second));
        assert_eq!(doc.previous_sibling(first), None);
        assert_eq!(doc.parent(second), Some(list));
        assert!(doc.is_attached(second));

        doc.detach(second);
        assert_eq!(doc.children(list), &[first, third]);
        assert!(!doc.is_attached(second));
    }

    #[test]
    fn test_fragment_insertion_moves_children() {
        let mut doc = Document::new();
        let body = doc.body();
        let fragment = doc.create_fragment();
        let a = doc.create_text("a");
        let b = doc.create_text("b");
        doc.append_child(fragment, a);
        doc.append_child(fragment, b);

        doc.append_child(body, fragment);
        assert_eq!(doc.children(body), &[a, b]);
        assert!(doc.children(fragment).is_empty());
        assert_eq!(doc.parent(a), Some(body));
    }

    #[test]
    fn test_release_is_recursive() {
        let mut doc = Document::parse("<div><p><b>x</b></p><i>y</i></div>");
        let div = doc.first_child(doc.body()).unwrap();
        let live_before = doc.len();

        let released = doc.release(div);
        assert_eq!(released.len(), 6);
        assert_eq!(doc.len(), live_before - 6);
        assert!(doc.children(doc.body()).is_empty());
    }

    #[test]
    fn test_clone_is_deep_and_detached() {
        let mut doc = Document::parse(r#"<p class="a">hi <b>there</b></p>"#);
        let p = doc.first_child(doc.body()).unwrap();
        let copy = doc.clone_node(p, true).unwrap();

        assert_eq!(doc.parent(copy), None);
        assert_eq!(doc.outer_html(copy), doc.outer_html(p));
        assert_ne!(doc.first_child(copy), doc.first_child(p));
    }

    #[test]
    fn test_no_cycles() {
        let mut doc = Document::new();
        let outer = doc.create_element("div");
        let inner = doc.create_element("div");
        doc.append_child(outer, inner);
        doc.append_child(inner, outer);
        assert_eq!(doc.parent(outer), None);
    }

    #[test]
    fn test_form_state() {
        let mut doc = Document::parse(
            r#"<input type="radio" name="g" value="a" checked="" /><input type="radio" name="g" value="b" /><select><option value="x">X</option><option>Y</option></select>"#,
        );
        let body = doc.body();
        let nodes = doc.children(body).to_vec();
        let (a, b, select) = (nodes[0], nodes[1], nodes[2]);

        assert!(doc.checked(a));
        doc.set_checked(b, true);
        assert!(!doc.checked(a), "radio group is exclusive");
        assert!(doc.checked(b));

        let options = doc.options(select);
        assert_eq!(options.len(), 2);
        assert_eq!(doc.value(options[1]), "Y");
        assert_eq!(doc.value(select), "x", "first option when nothing is marked");
        doc.set_selected(options[1], true);
        assert_eq!(doc.value(select), "Y");
    }

    #[test]
    fn test_text_content() {
        let mut doc = Document::parse("<p>a<b>b</b>c</p>");
        let p = doc.first_child(doc.body()).unwrap();
        assert_eq!(doc.text_content(p), "abc");

        let released = doc.set_text_content(p, "z");
        assert_eq!(released.len(), 4);
        assert_eq!(doc.inner_html(p), "z");
    }
}
