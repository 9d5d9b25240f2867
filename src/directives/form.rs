//! `v-model` - two-way binding for form controls.
//!
//! Four control families:
//! - text (`input` of a text-like type, `textarea`) - `input`/`change`
//!   events, suppressed while an input method is composing
//! - radio - `change` writes the control's value
//! - checkbox - boolean field, or an array the control's value is pushed
//!   into and removed from
//! - select - string (single) or array (`multiple`) field; an empty model
//!   is filled from the options marked selected in the markup
//!
//! A write that comes from the control does not write back into the same
//! control: each binding carries a `syncing` flag its own model callback
//! honours.
//!
//! The model path is looked up through the subscription on every DOM
//! event, so bindings inside a repetition follow index realignment.

use std::cell::Cell;
use std::rc::Rc;

use crate::dom::NodeId;
use crate::error::Warning;
use crate::events::{Event, Listener};
use crate::types::{display_value, truthy, Change, LoopContext, Path, Value};
use crate::vm::Vm;
use crate::watcher::SubscriptionId;

use super::Source;

/// Input types handled by the text variant (a missing type counts too).
const TEXT_TYPES: &[&str] = &["text", "password", "email", "search", "tel", "url", "number"];

/// Where a binding writes, following realignment of its subscription.
#[derive(Clone)]
struct Binding {
    path: Path,
    subscription: Rc<Cell<Option<SubscriptionId>>>,
    syncing: Rc<Cell<bool>>,
}

impl Binding {
    fn new(path: Path) -> Self {
        Self {
            path,
            subscription: Rc::new(Cell::new(None)),
            syncing: Rc::new(Cell::new(false)),
        }
    }

    fn path(&self, vm: &Vm) -> Path {
        self.subscription
            .get()
            .and_then(|id| vm.subscription_path(id))
            .unwrap_or_else(|| self.path.clone())
    }

    fn write(&self, vm: &Vm, value: Value) {
        let path = self.path(vm);
        self.syncing.set(true);
        vm.set_path(&path, value);
        self.syncing.set(false);
    }

    /// Subscribe `render`, skipping renders caused by this binding's own write.
    fn subscribe(
        &self,
        vm: &Vm,
        source: &Source,
        node: NodeId,
        render: impl Fn(&Vm, NodeId, &Value) + 'static,
    ) {
        let syncing = Rc::clone(&self.syncing);
        let id = source.subscribe(
            vm,
            node,
            Rc::new(move |vm: &Vm, change: &Change| {
                if syncing.get() {
                    return;
                }
                let value = vm.value_at(&change.target);
                render(vm, node, &value);
            }),
        );
        self.subscription.set(id);
    }

    fn listen(&self, vm: &Vm, node: NodeId, event: &str, on: impl Fn(&Vm, &Binding, &Event) + 'static) {
        let binding = self.clone();
        let listener: Listener = Rc::new(move |vm: &Vm, event: &Event| on(vm, &binding, event));
        vm.listen(node, event, listener);
    }
}

pub(crate) fn bind_model(vm: &Vm, node: NodeId, expression: &str, ctx: Option<&LoopContext>) {
    let (tag, kind) = {
        let document = vm.document();
        let tag = document.tag_name(node).unwrap_or_default().to_string();
        let kind = document
            .attribute(node, "type")
            .map(|t| t.trim().to_ascii_lowercase());
        (tag, kind)
    };

    let source = Source::resolve(expression, ctx);
    let Some(path) = source.path().cloned() else {
        vm.malformed("model", expression);
        return;
    };

    match (tag.as_str(), kind.as_deref()) {
        ("input", Some("radio")) => bind_radio(vm, node, &source, path),
        ("input", Some("checkbox")) => bind_checkbox(vm, node, &source, path),
        ("input", kind) => {
            if kind.is_some_and(|kind| !TEXT_TYPES.contains(&kind)) {
                log::debug!("v-model on input type {:?} bound as text", kind);
            }
            bind_text(vm, node, &source, path);
        }
        ("textarea", _) => bind_text(vm, node, &source, path),
        ("select", _) => bind_select(vm, node, &source, path),
        (other, _) => vm.warn(Warning::ModelControl(other.to_string())),
    }
}

// =============================================================================
// Text
// =============================================================================

fn bind_text(vm: &Vm, node: NodeId, source: &Source, path: Path) {
    let binding = Binding::new(path);
    render_text(vm, node, &source.current(vm, node));
    binding.subscribe(vm, source, node, render_text);

    let composing = Rc::new(Cell::new(false));

    let lock = Rc::clone(&composing);
    binding.listen(vm, node, "compositionstart", move |_, _, _| lock.set(true));

    let lock = Rc::clone(&composing);
    binding.listen(vm, node, "compositionend", move |vm, binding, _| {
        lock.set(false);
        write_text(vm, binding, node);
    });

    binding.listen(vm, node, "input", move |vm, binding, _| {
        if !composing.get() {
            write_text(vm, binding, node);
        }
    });

    binding.listen(vm, node, "change", move |vm, binding, _| write_text(vm, binding, node));
}

fn write_text(vm: &Vm, binding: &Binding, node: NodeId) {
    let value = vm.document().value(node);
    binding.write(vm, Value::String(value));
}

fn render_text(vm: &Vm, node: NodeId, value: &Value) {
    let text = display_value(value);
    if vm.document().value(node) != text {
        vm.document_mut().set_value(node, &text);
    }
}

// =============================================================================
// Radio
// =============================================================================

fn bind_radio(vm: &Vm, node: NodeId, source: &Source, path: Path) {
    let binding = Binding::new(path);
    render_radio(vm, node, &source.current(vm, node));
    binding.subscribe(vm, source, node, render_radio);

    binding.listen(vm, node, "change", move |vm, binding, _| {
        if !vm.document().checked(node) {
            return;
        }
        let value = vm.document().value(node);
        // Keep numeric models numeric
        let value = match vm.value_at(&binding.path(vm)) {
            Value::Number(_) => serde_json::from_str::<Value>(&value)
                .ok()
                .filter(Value::is_number)
                .unwrap_or(Value::String(value)),
            _ => Value::String(value),
        };
        binding.write(vm, value);
    });
}

fn render_radio(vm: &Vm, node: NodeId, value: &Value) {
    let checked = !value.is_null() && display_value(value) == vm.document().value(node);
    vm.document_mut().set_checked(node, checked);
}

// =============================================================================
// Checkbox
// =============================================================================

fn bind_checkbox(vm: &Vm, node: NodeId, source: &Source, path: Path) {
    let init = source.current(vm, node);
    if !matches!(init, Value::Bool(_) | Value::Array(_)) {
        vm.warn(Warning::CheckboxSource(path));
        return;
    }

    let binding = Binding::new(path);
    render_checkbox(vm, node, &init);
    binding.subscribe(vm, source, node, render_checkbox);

    binding.listen(vm, node, "change", move |vm, binding, _| {
        let (checked, value) = {
            let document = vm.document();
            (document.checked(node), document.value(node))
        };
        let path = binding.path(vm);

        match vm.value_at(&path) {
            Value::Array(items) => {
                let position = items.iter().position(|item| display_value(item) == value);
                match (checked, position) {
                    (true, None) => {
                        vm.push(&path, Value::String(value));
                    }
                    (false, Some(index)) => {
                        vm.splice(&path, index, 1, Vec::new());
                    }
                    _ => {}
                }
            }
            Value::Bool(_) => binding.write(vm, Value::Bool(checked)),
            _ => vm.warn(Warning::CheckboxSource(path)),
        }
    });
}

fn render_checkbox(vm: &Vm, node: NodeId, value: &Value) {
    let checked = match value {
        Value::Array(items) => {
            let own = vm.document().value(node);
            items.iter().any(|item| display_value(item) == own)
        }
        other => truthy(other),
    };
    vm.document_mut().set_checked(node, checked);
}

// =============================================================================
// Select
// =============================================================================

fn bind_select(vm: &Vm, node: NodeId, source: &Source, path: Path) {
    let multiple = vm.document().has_attribute(node, "multiple");
    let init = source.current(vm, node);

    let defined = match (&init, multiple) {
        (Value::String(text), false) => !text.is_empty(),
        (Value::Array(items), true) => !items.is_empty(),
        (Value::String(_), true) | (Value::Array(_), false) => {
            vm.warn(Warning::SelectMultiple { path, multiple });
            return;
        }
        _ => {
            vm.warn(Warning::SelectSource(path));
            return;
        }
    };

    let binding = Binding::new(path);
    if defined {
        render_select(vm, node, &init);
    } else {
        // The markup decides the initial selection
        let value = selection(vm, node, multiple);
        binding.write(vm, value);
    }
    binding.subscribe(vm, source, node, render_select);

    binding.listen(vm, node, "change", move |vm, binding, _| {
        let value = selection(vm, node, multiple);
        binding.write(vm, value);
    });
}

fn selection(vm: &Vm, node: NodeId, multiple: bool) -> Value {
    let document = vm.document();
    let mut values = document
        .selected_options(node)
        .into_iter()
        .map(|option| Value::String(document.value(option)));

    if multiple {
        Value::Array(values.collect())
    } else {
        values.next().unwrap_or_else(|| Value::String(String::new()))
    }
}

fn render_select(vm: &Vm, node: NodeId, value: &Value) {
    let mut document = vm.document_mut();
    let options = document.options(node);
    let mut matched = false;

    for option in options {
        let own = document.value(option);
        let selected = match value {
            Value::Array(items) => items.iter().any(|item| display_value(item) == own),
            // A single select keeps only the first match
            other => !matched && !other.is_null() && display_value(other) == own,
        };
        matched |= selected;
        document.set_selected(option, selected);
    }
}
