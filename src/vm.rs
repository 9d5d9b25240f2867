//! Vm - one compiled template bound to one model.
//!
//! Owns every piece of runtime state:
//! - the [`Document`] the template lives in
//! - the [`Model`] (data, `v-el` registry, handlers)
//! - the [`Watcher`] and the listener table
//! - per-node metadata and the warning buffer
//!
//! # Write path
//!
//! ```text
//! vm.set("title", "x")
//!   -> model write (skipped when the value is unchanged)
//!   -> Change { seq, kind: Assign, path: title, .. }
//!   -> whole-field subscribers of "title", its ancestors and descendants
//!   -> each callback re-renders from the model
//! ```
//!
//! Everything is synchronous: when a write returns, every binding it affects
//! has been updated. No `RefCell` borrow is held while a callback runs, so
//! callbacks are free to read and write through the `Vm` again.
//!
//! # Example
//!
//! ```ignore
//! let document = Document::parse(r#"<div id="app"><p>{{ greeting }}</p></div>"#);
//! let root = document.first_child(document.body()).unwrap();
//! let vm = Vm::new(document, root, json!({"greeting": "hello"}))?;
//!
//! vm.set("greeting", "bye");
//! assert_eq!(vm.inner_html(root), "<p>bye</p>");
//! ```

use std::cell::{Cell, Ref, RefCell, RefMut};
use std::cmp::Ordering;
use std::rc::Rc;

use rustc_hash::FxHashSet;

use crate::compiler::{compile, Mode};
use crate::dom::{Document, NodeId};
use crate::error::{VmError, Warning};
use crate::events::{Event, Handler, Listener, ListenerId, Listeners};
use crate::meta::{IndexRender, MetaTable, SectionId};
use crate::model::Model;
use crate::options::Options;
use crate::types::{Change, ChangeKind, LoopContext, Path, Value};
use crate::watcher::{Callback, Pending, SubscriptionId, Watcher};

struct Inner {
    root: NodeId,
    options: Options,
    document: RefCell<Document>,
    model: RefCell<Model>,
    watcher: RefCell<Watcher<Vm>>,
    listeners: RefCell<Listeners>,
    meta: RefCell<MetaTable>,
    warnings: RefCell<Vec<Warning>>,
    compiled: Cell<bool>,
    next_section: Cell<u64>,
}

/// Handle to a running template. Cloning shares the same runtime.
#[derive(Clone)]
pub struct Vm {
    inner: Rc<Inner>,
}

impl Vm {
    /// Compile the children of `element` against `model` with default options.
    pub fn new(document: Document, element: NodeId, model: Value) -> Result<Vm, VmError> {
        Self::with_options(document, element, model, Options::default())
    }

    pub fn with_options(
        document: Document,
        element: NodeId,
        model: Value,
        options: Options,
    ) -> Result<Vm, VmError> {
        if !document.is_element(element) {
            return Err(VmError::NotAnElement);
        }
        let data = match model {
            Value::Object(data) => data,
            other => return Err(VmError::ModelNotObject(type_name(&other))),
        };
        if let Some(key) = data.keys().find(|key| key.contains('.')) {
            return Err(VmError::IllegalKey(key.clone()));
        }

        let vm = Vm {
            inner: Rc::new(Inner {
                root: element,
                options,
                document: RefCell::new(document),
                model: RefCell::new(Model::new(data)),
                watcher: RefCell::new(Watcher::new()),
                listeners: RefCell::new(Listeners::default()),
                meta: RefCell::new(MetaTable::default()),
                warnings: RefCell::new(Vec::new()),
                compiled: Cell::new(false),
                next_section: Cell::new(0),
            }),
        };

        // Compile a detached copy; the live children are swapped out once
        // every directive in it is bound.
        let fragment = {
            let mut document = vm.document_mut();
            let fragment = document.create_fragment();
            for child in document.children(element).to_vec() {
                if let Some(copy) = document.clone_node(child, true) {
                    document.append_child(fragment, copy);
                }
            }
            fragment
        };
        compile(&vm, fragment, None, Mode::Document { element });

        Ok(vm)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// The element whose children this runtime compiled.
    pub fn root(&self) -> NodeId {
        self.inner.root
    }

    pub fn options(&self) -> &Options {
        &self.inner.options
    }

    /// Shared borrow of the document. Do not hold it across writes.
    pub fn document(&self) -> Ref<'_, Document> {
        self.inner.document.borrow()
    }

    /// Mutable borrow of the document. Changes made here are not observed.
    pub fn document_mut(&self) -> RefMut<'_, Document> {
        self.inner.document.borrow_mut()
    }

    pub fn model(&self) -> Ref<'_, Model> {
        self.inner.model.borrow()
    }

    pub(crate) fn model_mut(&self) -> RefMut<'_, Model> {
        self.inner.model.borrow_mut()
    }

    pub(crate) fn meta(&self) -> Ref<'_, MetaTable> {
        self.inner.meta.borrow()
    }

    pub(crate) fn meta_mut(&self) -> RefMut<'_, MetaTable> {
        self.inner.meta.borrow_mut()
    }

    pub fn inner_html(&self, node: NodeId) -> String {
        self.document().inner_html(node)
    }

    /// The live compile has been swapped in.
    pub fn is_compiled(&self) -> bool {
        self.inner.compiled.get()
    }

    pub fn subscription_count(&self) -> usize {
        self.inner.watcher.borrow().len()
    }

    pub fn listener_count(&self, node: NodeId) -> usize {
        self.inner.listeners.borrow().count(node)
    }

    /// Node registered under `name` by `v-el`.
    pub fn el(&self, name: &str) -> Option<NodeId> {
        self.model().element(name)
    }

    // =========================================================================
    // Diagnostics
    // =========================================================================

    pub fn warnings(&self) -> Vec<Warning> {
        self.inner.warnings.borrow().clone()
    }

    pub fn take_warnings(&self) -> Vec<Warning> {
        std::mem::take(&mut *self.inner.warnings.borrow_mut())
    }

    pub(crate) fn warn(&self, warning: Warning) {
        if self.inner.options.log_warnings {
            log::warn!("{}", warning);
        }
        self.inner.warnings.borrow_mut().push(warning);
    }

    pub(crate) fn malformed(&self, directive: &str, expression: &str) {
        self.warn(Warning::MalformedExpression {
            directive: format!("{}{}", self.inner.options.prefix, directive),
            expression: expression.to_string(),
        });
    }

    // =========================================================================
    // Reading
    // =========================================================================

    pub fn get(&self, expression: &str) -> Option<Value> {
        self.get_path(&Path::parse(expression))
    }

    pub fn get_path(&self, path: &Path) -> Option<Value> {
        self.model().get(path).cloned()
    }

    /// Current value at `path`, `Null` when there is none.
    pub(crate) fn value_at(&self, path: &Path) -> Value {
        self.get_path(path).unwrap_or(Value::Null)
    }

    // =========================================================================
    // Writing
    // =========================================================================

    /// Assign `value` at the dotted `expression`. See [`Vm::set_path`].
    pub fn set(&self, expression: &str, value: impl Into<Value>) -> bool {
        self.set_path(&Path::parse(expression), value.into())
    }

    /// Assign `value` at `path` and notify subscribers.
    ///
    /// Writing the value already there notifies nobody. Returns false (with
    /// an [`Unreachable`](Warning::Unreachable) warning) when the parent of
    /// `path` does not exist.
    pub fn set_path(&self, path: &Path, value: Value) -> bool {
        let old = {
            let mut model = self.model_mut();
            if model.get(path) == Some(&value) {
                return true;
            }
            model.set(path, value.clone())
        };

        let Some(old) = old else {
            self.warn(Warning::Unreachable(path.clone()));
            return false;
        };
        self.notify(ChangeKind::Assign, path.clone(), value, old);
        true
    }

    /// Append to the array at `path`. Returns the new length.
    pub fn push(&self, path: impl Into<Path>, value: impl Into<Value>) -> Option<usize> {
        let value = value.into();
        self.mutate_array(path.into(), ChangeKind::Push, |items| {
            items.push(value);
            Some(items.len())
        })
    }

    /// Remove the last element. An empty array is left alone and nobody is
    /// notified.
    pub fn pop(&self, path: impl Into<Path>) -> Option<Value> {
        self.mutate_array(path.into(), ChangeKind::Pop, |items| items.pop())
    }

    /// Prepend to the array at `path`. Returns the new length.
    pub fn unshift(&self, path: impl Into<Path>, value: impl Into<Value>) -> Option<usize> {
        let value = value.into();
        self.mutate_array(path.into(), ChangeKind::Unshift, |items| {
            items.insert(0, value);
            Some(items.len())
        })
    }

    /// Remove the first element. An empty array is left alone.
    pub fn shift(&self, path: impl Into<Path>) -> Option<Value> {
        self.mutate_array(path.into(), ChangeKind::Shift, |items| {
            (!items.is_empty()).then(|| items.remove(0))
        })
    }

    /// Remove `delete` elements from `start` and insert `insert` there.
    /// Returns the removed elements.
    pub fn splice(
        &self,
        path: impl Into<Path>,
        start: usize,
        delete: usize,
        insert: Vec<Value>,
    ) -> Option<Vec<Value>> {
        self.mutate_array(path.into(), ChangeKind::Splice, |items| {
            let start = start.min(items.len());
            let end = start.saturating_add(delete).min(items.len());
            Some(items.splice(start..end, insert).collect())
        })
    }

    pub fn sort_by(
        &self,
        path: impl Into<Path>,
        compare: impl FnMut(&Value, &Value) -> Ordering,
    ) -> bool {
        self.mutate_array(path.into(), ChangeKind::Sort, |items| {
            items.sort_by(compare);
            Some(())
        })
        .is_some()
    }

    pub fn reverse(&self, path: impl Into<Path>) -> bool {
        self.mutate_array(path.into(), ChangeKind::Reverse, |items| {
            items.reverse();
            Some(())
        })
        .is_some()
    }

    fn mutate_array<R>(
        &self,
        path: Path,
        kind: ChangeKind,
        op: impl FnOnce(&mut Vec<Value>) -> Option<R>,
    ) -> Option<R> {
        let (result, value, old) = {
            let mut model = self.model_mut();
            let items = model.array_mut(&path)?;
            let old = Value::Array(items.clone());
            let result = op(items)?;
            (result, Value::Array(items.clone()), old)
        };
        self.notify(kind, path, value, old);
        Some(result)
    }

    /// Install the handler `v-on` bindings look up by `name`. Bound listeners
    /// switch to it immediately.
    pub fn set_handler(&self, name: &str, handler: Handler) {
        self.model_mut().set_handler(name, handler);
        self.notify(ChangeKind::Assign, Path::field(name), Value::Null, Value::Null);
    }

    pub fn remove_handler(&self, name: &str) -> Option<Handler> {
        let removed = self.model_mut().remove_handler(name)?;
        self.notify(ChangeKind::Assign, Path::field(name), Value::Null, Value::Null);
        Some(removed)
    }

    // =========================================================================
    // Notification
    // =========================================================================

    fn notify(&self, kind: ChangeKind, path: Path, value: Value, old: Value) {
        let seq = self.inner.watcher.borrow_mut().next_seq();
        let change = Change::new(seq, kind, path, value, old);
        let batch = self.inner.watcher.borrow().collect_fields(&change);
        self.run(batch, &change);
    }

    /// Fire access-path subscribers of `path` as if `value` had just been
    /// written there.
    pub fn trigger_access(&self, path: impl Into<Path>, value: Value, old: Value) {
        let seq = self.inner.watcher.borrow_mut().next_seq();
        let change = Change::new(seq, ChangeKind::Assign, path.into(), value, old);
        self.trigger_change(&change);
    }

    /// Fan `change` out to access-path subscribers (once per change).
    pub(crate) fn trigger_change(&self, change: &Change) {
        let batch = self.inner.watcher.borrow_mut().collect_access(change);
        self.run(batch, change);
    }

    fn run(&self, batch: Vec<Pending<Vm>>, change: &Change) {
        for pending in batch {
            // An earlier callback may have released this subscriber
            if !self.inner.watcher.borrow().is_live(pending.id()) {
                continue;
            }
            pending.invoke(self, change);
        }
    }

    pub(crate) fn watch(
        &self,
        path: Path,
        owner: Option<NodeId>,
        callback: Callback<Vm>,
    ) -> SubscriptionId {
        self.inner.watcher.borrow_mut().add(path, owner, callback)
    }

    pub(crate) fn watch_access(
        &self,
        path: Path,
        owner: Option<NodeId>,
        callback: Callback<Vm>,
    ) -> SubscriptionId {
        self.inner
            .watcher
            .borrow_mut()
            .watch_access(path, owner, callback)
    }

    pub(crate) fn subscription_path(&self, id: SubscriptionId) -> Option<Path> {
        self.inner.watcher.borrow().path_of(id)
    }

    /// Move access paths and repetition contexts under the array `path` for
    /// a structural change.
    pub(crate) fn realign(&self, change: &Change, path: &Path, delta: isize) {
        let moved = self
            .inner
            .watcher
            .borrow_mut()
            .realign_once(change.seq, path, delta);
        if moved {
            self.meta_mut().realign_contexts(path, delta);
        }
    }

    /// Current loop context of the innermost repetition holding `node`.
    pub(crate) fn loop_context(&self, node: NodeId) -> Option<Rc<LoopContext>> {
        let document = self.document();
        let meta = self.meta();
        let mut current = Some(node);
        while let Some(id) = current {
            if let Some(tag) = meta.get(id).and_then(|meta| meta.list.as_ref()) {
                return Some(Rc::clone(&tag.ctx));
            }
            current = document.parent(id);
        }
        None
    }

    /// Re-render every `$index` binding in the subtree of `root`.
    pub(crate) fn refresh_indices(&self, root: NodeId) {
        let renders: Vec<(NodeId, IndexRender)> = {
            let document = self.document();
            let meta = self.meta();
            std::iter::once(root)
                .chain(document.descendants(root))
                .filter_map(|node| meta.get(node).map(|meta| (node, meta)))
                .flat_map(|(node, meta)| {
                    meta.index_renders
                        .iter()
                        .map(move |render| (node, Rc::clone(render)))
                })
                .collect()
        };
        for (node, render) in renders {
            render(self, node);
        }
    }

    // =========================================================================
    // Events
    // =========================================================================

    /// Deliver `event` to the listeners on `node`, synchronously and in attach
    /// order. Returns how many listeners ran.
    pub fn dispatch(&self, node: NodeId, mut event: Event) -> usize {
        event.target = Some(node);
        let listeners = self.inner.listeners.borrow().matching(node, &event.kind);
        for listener in &listeners {
            listener(self, &event);
        }
        listeners.len()
    }

    pub(crate) fn listen(&self, node: NodeId, kind: &str, listener: Listener) -> ListenerId {
        self.inner.listeners.borrow_mut().add(node, kind, listener)
    }

    pub(crate) fn unlisten(&self, node: NodeId, id: ListenerId) {
        self.inner.listeners.borrow_mut().remove(node, id);
    }

    // =========================================================================
    // DOM lifecycle
    // =========================================================================

    pub(crate) fn next_section(&self) -> SectionId {
        let id = self.inner.next_section.get() + 1;
        self.inner.next_section.set(id);
        SectionId(id)
    }

    /// Release `node` with its subtree and everything bound to it.
    pub(crate) fn release(&self, node: NodeId) {
        let released = self.document_mut().release(node);
        self.forget(released);
    }

    /// Release the children of `node`, including repeated sections anchored
    /// there.
    pub(crate) fn empty(&self, node: NodeId) {
        let released = self.document_mut().empty(node);
        self.forget(released);
        self.drop_sections(node);
    }

    pub(crate) fn set_text(&self, node: NodeId, text: &str) {
        let released = self.document_mut().set_text_content(node, text);
        if !released.is_empty() {
            self.forget(released);
            self.drop_sections(node);
        }
    }

    pub(crate) fn set_html(&self, node: NodeId, markup: &str) {
        self.empty(node);
        self.append_markup(node, markup);
    }

    /// Parse `markup` and append the nodes to `node`.
    pub(crate) fn append_markup(&self, node: NodeId, markup: &str) {
        let mut document = self.document_mut();
        let fragment = document.parse_fragment(markup);
        document.append_child(node, fragment);
        document.release(fragment);
    }

    /// Finish a document compile: the compiled fragment replaces the
    /// element's children.
    pub(crate) fn swap_in(&self, fragment: NodeId, element: NodeId) {
        self.empty(element);
        self.document_mut().append_child(element, fragment);

        // Sections anchored on the fragment now live under the element
        let moved = self.meta_mut().take(fragment);
        if let Some(meta) = moved {
            for section in &meta.sections {
                section.parent.set(element);
            }
            self.meta_mut().entry(element).sections.extend(meta.sections);
        }

        let released = self.document_mut().release(fragment);
        self.forget(released);
        self.inner.compiled.set(true);
        log::debug!("compiled template swapped into {:?}", element);
    }

    fn drop_sections(&self, node: NodeId) {
        let sections = std::mem::take(&mut self.meta_mut().entry(node).sections);
        for section in sections {
            self.release(section.template);
        }
    }

    /// Drop all state attached to released nodes.
    fn forget(&self, released: Vec<NodeId>) {
        if released.is_empty() {
            return;
        }
        let released: FxHashSet<NodeId> = released.into_iter().collect();

        let sections = self.meta_mut().forget(&released);
        let disposed = self.inner.watcher.borrow_mut().dispose_owned(&released);
        self.inner.listeners.borrow_mut().forget(&released);
        self.model_mut().forget_elements(&released);
        log::trace!(
            "released {} nodes, disposed {} subscriptions",
            released.len(),
            disposed
        );

        for section in sections {
            self.release(section.template);
        }
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn mount(markup: &str, model: Value) -> (Vm, NodeId) {
        let document = Document::parse(markup);
        let root = document.first_child(document.body()).unwrap();
        let options = Options::default().log_warnings(false);
        (Vm::with_options(document, root, model, options).unwrap(), root)
    }

    #[test]
    fn test_type_names() {
        assert_eq!(type_name(&json!(null)), "null");
        assert_eq!(type_name(&json!("s")), "string");
        assert_eq!(type_name(&json!([1])), "array");
    }

    #[test]
    fn test_section_ids_increase() {
        let (vm, _) = mount("<div></div>", json!({}));
        let first = vm.next_section();
        assert_ne!(first, vm.next_section());
    }

    #[test]
    fn test_fragment_released_after_swap() {
        let (vm, root) = mount("<div><p>{{ a }}</p></div>", json!({"a": 1}));
        // body, div, p, text
        assert_eq!(vm.document().len(), 4);
        assert!(vm.document().is_attached(vm.document().children(root)[0]));
    }

    #[test]
    fn test_sections_move_to_live_element() {
        let (vm, root) = mount(
            r#"<ul><li v-for="item in items">{{ item }}</li></ul>"#,
            json!({"items": ["a"]}),
        );
        let meta = vm.meta();
        let sections = &meta.get(root).unwrap().sections;
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].parent.get(), root);
    }

    #[test]
    fn test_empty_pop_does_not_notify() {
        let (vm, root) = mount(
            r#"<ul><li v-for="item in items">{{ item }}</li></ul>"#,
            json!({"items": []}),
        );
        assert_eq!(vm.pop("items"), None);
        assert_eq!(vm.shift("items"), None);
        assert_eq!(vm.inner_html(root), "");
    }

    #[test]
    fn test_mutating_non_array_returns_none() {
        let (vm, _) = mount("<div></div>", json!({"n": 1}));
        assert_eq!(vm.push("n", 2), None);
        assert!(!vm.reverse("missing"));
        assert_eq!(vm.get("n"), Some(json!(1)));
    }

    #[test]
    fn test_trigger_access_reaches_scoped_bindings() {
        let (vm, root) = mount(
            r#"<ul><li v-for="item in items">{{ item.n }}</li></ul>"#,
            json!({"items": [{"n": 1}]}),
        );
        // Write behind the runtime's back, then announce it
        if let Some(n) = vm.model_mut().get_mut(&Path::parse("items.0.n")) {
            *n = json!(5);
        }
        vm.trigger_access("items.0.n", json!(5), json!(1));
        assert_eq!(vm.inner_html(root), "<li>5</li>");
    }
}
