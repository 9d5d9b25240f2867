//! `v-bind` - attributes, classes and inline styles.
//!
//! Accepted forms:
//! - `v-bind:title="field"` - one attribute
//! - `v-bind="{id: a, 'data-x': b, class: c}"` - several at once
//! - `v-bind:class="field"` - string value names the class, object value
//!   toggles each key by its truthiness
//! - `v-bind:class="{active: isActive, done: item.done}"` - named classes
//! - `v-bind:style="field"` - object value maps properties to values
//! - `v-bind:style="{color: c, width: w}"` - named properties
//!
//! Inside a repetition the same shapes resolve against the loop item.

use std::cell::RefCell;
use std::rc::Rc;

use crate::compiler::parse_object;
use crate::dom::NodeId;
use crate::error::Warning;
use crate::types::{display_value, truthy, Change, LoopContext, Value};
use crate::vm::Vm;

use super::{bind_value, Source};

/// Controls whose `value` attribute is shadowed by a live property.
const FORM_CONTROLS: &[&str] = &["input", "select", "textarea"];

pub(crate) fn bind(
    vm: &Vm,
    node: NodeId,
    attribute: Option<&str>,
    expression: &str,
    ctx: Option<&LoopContext>,
) {
    match attribute {
        Some("class") => match parse_object(expression) {
            Some(entries) => {
                for (class, field) in entries {
                    bind_class(vm, node, &field, Some(class), ctx);
                }
            }
            None => bind_class(vm, node, expression, None, ctx),
        },
        Some("style") => match parse_object(expression) {
            Some(entries) => {
                for (property, field) in entries {
                    bind_style(vm, node, &field, Some(property), ctx);
                }
            }
            None => bind_style(vm, node, expression, None, ctx),
        },
        Some(attribute) => bind_attribute(vm, node, attribute, expression, ctx),
        None => match parse_object(expression) {
            Some(entries) => {
                for (name, field) in entries {
                    match name.as_str() {
                        "class" => bind_class(vm, node, &field, None, ctx),
                        "style" => bind_style(vm, node, &field, None, ctx),
                        _ => bind_attribute(vm, node, &name, &field, ctx),
                    }
                }
            }
            None => vm.malformed("bind", expression),
        },
    }
}

// =============================================================================
// Attributes
// =============================================================================

fn bind_attribute(vm: &Vm, node: NodeId, attribute: &str, field: &str, ctx: Option<&LoopContext>) {
    let attribute = attribute.to_string();
    let source = Source::resolve(field, ctx);
    bind_value(vm, node, &source, move |vm, node, value| {
        apply_attribute(vm, node, &attribute, value);
    });
}

fn apply_attribute(vm: &Vm, node: NodeId, attribute: &str, value: &Value) {
    let mut document = vm.document_mut();
    match value {
        Value::Null | Value::Bool(false) => {
            document.remove_attribute(node, attribute);
        }
        value => {
            let text = display_value(value);
            let is_control = document
                .tag_name(node)
                .is_some_and(|tag| FORM_CONTROLS.contains(&tag));
            if attribute == "value" && is_control {
                document.set_value(node, &text);
            } else {
                document.set_attribute(node, attribute, &text);
            }
        }
    }
}

// =============================================================================
// Classes
// =============================================================================

fn bind_class(
    vm: &Vm,
    node: NodeId,
    field: &str,
    class: Option<String>,
    ctx: Option<&LoopContext>,
) {
    let source = Source::resolve(field, ctx);
    let init = source.current(vm, node);

    match (class, &init) {
        // Named class toggled by the value
        (Some(class), _) => {
            bind_value(vm, node, &source, move |vm, node, value| {
                toggle_class(vm, node, &class, truthy(value));
            });
        }
        // The value is the class name
        (None, Value::String(_) | Value::Bool(_)) => {
            let current: Rc<RefCell<Option<String>>> = Rc::new(RefCell::new(None));
            bind_value(vm, node, &source, move |vm, node, value| {
                let next = value.as_str().filter(|name| !name.is_empty());
                let previous = current.replace(next.map(str::to_string));
                if let Some(previous) = previous.filter(|p| Some(p.as_str()) != next) {
                    vm.document_mut().remove_class(node, &previous);
                }
                if let Some(next) = next {
                    vm.document_mut().add_class(node, next);
                }
            });
        }
        // Class object: key -> on/off
        (None, Value::Object(_)) => {
            let path = source.describe(field);
            bind_object(
                vm,
                node,
                &source,
                init.clone(),
                |vm, node, class, value| toggle_class(vm, node, class, value.is_some_and(truthy)),
                move |vm| vm.warn(Warning::ClassSource(path.clone())),
            );
        }
        (None, _) => vm.warn(Warning::ClassSource(source.describe(field))),
    }
}

fn toggle_class(vm: &Vm, node: NodeId, class: &str, on: bool) {
    let mut document = vm.document_mut();
    if on {
        document.add_class(node, class);
    } else {
        document.remove_class(node, class);
    }
}

// =============================================================================
// Styles
// =============================================================================

fn bind_style(
    vm: &Vm,
    node: NodeId,
    field: &str,
    property: Option<String>,
    ctx: Option<&LoopContext>,
) {
    let source = Source::resolve(field, ctx);
    let init = source.current(vm, node);

    match (property, &init) {
        (Some(property), _) => {
            bind_value(vm, node, &source, move |vm, node, value| {
                set_style(vm, node, &property, Some(value));
            });
        }
        // Whole style text
        (None, Value::String(_)) => {
            bind_value(vm, node, &source, |vm, node, value| {
                let text = display_value(value);
                let mut document = vm.document_mut();
                if text.is_empty() {
                    document.remove_attribute(node, "style");
                } else {
                    document.set_attribute(node, "style", &text);
                }
            });
        }
        // Style object: property -> value
        (None, Value::Object(_)) => {
            let path = source.describe(field);
            bind_object(
                vm,
                node,
                &source,
                init.clone(),
                |vm, node, property, value| set_style(vm, node, property, value),
                move |vm| vm.warn(Warning::StyleSource(path.clone())),
            );
        }
        (None, _) => vm.warn(Warning::StyleSource(source.describe(field))),
    }
}

fn set_style(vm: &Vm, node: NodeId, property: &str, value: Option<&Value>) {
    let text = value.map(display_value).filter(|text| !text.is_empty());
    vm.document_mut().set_style(node, property, text.as_deref());
}

// =============================================================================
// Keyed objects
// =============================================================================

/// Bind a keyed object (class or style). Every render diffs against the last
/// object applied: keys gone from the new object are applied as `None`, the
/// rest with their new value. This covers both a single key changing and the
/// whole object being replaced.
fn bind_object(
    vm: &Vm,
    node: NodeId,
    source: &Source,
    init: Value,
    apply: impl Fn(&Vm, NodeId, &str, Option<&Value>) + 'static,
    mismatch: impl Fn(&Vm) + 'static,
) {
    let last: Rc<RefCell<Value>> = Rc::new(RefCell::new(Value::Null));
    let render = move |vm: &Vm, node: NodeId, value: &Value| {
        let Value::Object(next) = value else {
            mismatch(vm);
            return;
        };
        let previous = last.replace(value.clone());
        if let Value::Object(previous) = previous {
            for key in previous.keys().filter(|key| !next.contains_key(*key)) {
                apply(vm, node, key, None);
            }
        }
        for (key, value) in next {
            apply(vm, node, key, Some(value));
        }
    };

    render(vm, node, &init);
    let render = Rc::new(render);
    source.subscribe(
        vm,
        node,
        Rc::new(move |vm: &Vm, change: &Change| {
            let value = vm.value_at(&change.target);
            render(vm, node, &value);
        }),
    );
}
