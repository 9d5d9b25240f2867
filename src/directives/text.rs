//! `{{ }}`, `v-text`, `v-html` and `v-el`.

use crate::dom::NodeId;
use crate::types::{display_value, LoopContext};
use crate::vm::Vm;

use super::{bind_value, Source};

pub(crate) fn bind_text(vm: &Vm, node: NodeId, expression: &str, ctx: Option<&LoopContext>) {
    let source = Source::resolve(expression, ctx);
    bind_value(vm, node, &source, |vm, node, value| {
        vm.set_text(node, &display_value(value));
    });
}

/// Interpolation in a text node. The literal text around the expression is
/// kept in the node's metadata and recomposed on every render.
pub(crate) fn bind_interpolation(
    vm: &Vm,
    node: NodeId,
    prefix: &str,
    expression: &str,
    suffix: &str,
    ctx: Option<&LoopContext>,
) {
    {
        let mut meta = vm.meta_mut();
        let entry = meta.entry(node);
        entry.prefix = prefix.to_string();
        entry.suffix = suffix.to_string();
    }

    let source = Source::resolve(expression, ctx);
    bind_value(vm, node, &source, |vm, node, value| {
        let text = {
            let meta = vm.meta();
            let (prefix, suffix) = meta
                .get(node)
                .map(|m| (m.prefix.as_str(), m.suffix.as_str()))
                .unwrap_or_default();
            format!("{}{}{}", prefix, display_value(value), suffix)
        };
        vm.set_text(node, &text);
    });
}

/// Children are replaced with freshly parsed markup on every change.
pub(crate) fn bind_html(vm: &Vm, node: NodeId, expression: &str, ctx: Option<&LoopContext>) {
    let source = Source::resolve(expression, ctx);
    bind_value(vm, node, &source, |vm, node, value| {
        vm.set_html(node, &display_value(value));
    });
}

pub(crate) fn bind_el(vm: &Vm, node: NodeId, name: &str) {
    let name = name.trim();
    if name.is_empty() {
        vm.malformed("el", name);
        return;
    }
    vm.model_mut().register_element(name, node);
}
