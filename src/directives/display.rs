//! Conditional display: `v-show` and `v-if`.
//!
//! - `v-show` keeps the node and toggles its inline `display`
//! - `v-if` owns the node's children: rendering compiles them, hiding
//!   releases them
//!
//! # Lifecycle of `v-if`
//!
//! - First call: the original inner markup is cached in the node metadata
//! - Truthy at compile: the existing children compile as their own root
//! - Becomes falsy: children released (their subscriptions go with them)
//! - Becomes truthy: cached markup parsed into fresh nodes and compiled in
//!   the current loop context of the enclosing repetition
//! - Same state again: nothing happens

use std::cell::Cell;
use std::rc::Rc;

use crate::compiler::{compile, Mode};
use crate::dom::NodeId;
use crate::types::{truthy, Change, LoopContext, Value};
use crate::vm::Vm;

use super::{bind_value, Source};

pub(crate) fn bind_show(vm: &Vm, node: NodeId, expression: &str, ctx: Option<&LoopContext>) {
    // Capture the author's visible display value once
    let visible = vm
        .document()
        .style(node, "display")
        .filter(|display| display != "none")
        .unwrap_or_default();
    vm.meta_mut()
        .entry(node)
        .visible_display
        .get_or_insert(visible);

    let source = Source::resolve(expression, ctx);
    bind_value(vm, node, &source, apply_show);
}

fn apply_show(vm: &Vm, node: NodeId, value: &Value) {
    let display = if truthy(value) {
        vm.meta()
            .get(node)
            .and_then(|meta| meta.visible_display.clone())
            .filter(|display| !display.is_empty())
    } else {
        Some("none".to_string())
    };
    vm.document_mut().set_style(node, "display", display.as_deref());
}

pub(crate) fn bind_if(vm: &Vm, node: NodeId, expression: &str, ctx: Option<Rc<LoopContext>>) {
    let markup = vm.document().inner_html(node);
    vm.meta_mut()
        .entry(node)
        .render_content
        .get_or_insert(markup);

    let source = Source::resolve(expression, ctx.as_deref());
    let rendered = Rc::new(Cell::new(truthy(&source.current(vm, node))));

    if rendered.get() {
        compile(vm, node, ctx, Mode::Children);
    } else {
        vm.empty(node);
    }

    source.subscribe(
        vm,
        node,
        Rc::new(move |vm: &Vm, change: &Change| {
            let show = truthy(&vm.value_at(&change.target));
            if show == rendered.get() {
                return;
            }
            rendered.set(show);

            if show {
                let markup = vm
                    .meta()
                    .get(node)
                    .and_then(|meta| meta.render_content.clone())
                    .unwrap_or_default();
                vm.append_markup(node, &markup);
                // The repetition may have moved since the first render
                let ctx = vm.loop_context(node);
                compile(vm, node, ctx, Mode::Children);
            } else {
                vm.empty(node);
            }
        }),
    );
}
