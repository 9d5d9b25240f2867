//! Directive handlers - one binding strategy per directive.
//!
//! Every handler follows the same shape:
//! 1. Resolve its expression to a [`Source`] (`$index`, global field, or an
//!    access path inside a repetition)
//! 2. Render once from the current model value
//! 3. Subscribe so later writes re-render
//!
//! Callbacks never trust captured values: they read the model again at the
//! path they are currently registered under (`change.target`), which stays
//! correct after index realignment. `$index` is read from the live loop
//! context of the enclosing repetition.
//!
//! Handlers validate their own source. A wrong shape is reported as a
//! [`Warning`](crate::Warning) and only that binding stays inert.

pub(crate) mod bind;
pub(crate) mod display;
pub(crate) mod form;
pub(crate) mod list;
pub(crate) mod on;
pub(crate) mod text;

use std::rc::Rc;

use crate::dom::NodeId;
use crate::types::{Change, LoopContext, Path, Value};
use crate::vm::Vm;
use crate::watcher::{Callback, SubscriptionId};

/// Where a directive reads its value from.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Source {
    /// `$index` (or an expression built around it) inside a repetition.
    Index(String),
    /// A field path from the model root, watched with `add`.
    Global(Path),
    /// A loop-scoped access path, watched with `watch_access`.
    Scoped(Path),
}

impl Source {
    pub fn resolve(expression: &str, ctx: Option<&LoopContext>) -> Source {
        let expression = expression.trim();

        if ctx.is_some() && expression.contains("$index") {
            return Source::Index(expression.to_string());
        }

        let path = Path::parse(expression);
        match ctx.and_then(|ctx| ctx.resolve(&path)) {
            Some((scoped, _)) => Source::Scoped(scoped),
            None => Source::Global(path),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        match self {
            Source::Global(path) | Source::Scoped(path) => Some(path),
            Source::Index(_) => None,
        }
    }

    /// Path to name in warnings.
    pub fn describe(&self, expression: &str) -> Path {
        self.path()
            .cloned()
            .unwrap_or_else(|| Path::parse(expression))
    }

    /// Value for the binding on `node`.
    pub fn current(&self, vm: &Vm, node: NodeId) -> Value {
        match self {
            Source::Index(expression) => {
                let Some(ctx) = vm.loop_context(node) else {
                    return Value::Null;
                };
                if expression == "$index" {
                    Value::from(ctx.index)
                } else {
                    Value::String(expression.replace("$index", &ctx.index.to_string()))
                }
            }
            Source::Global(path) | Source::Scoped(path) => vm.value_at(path),
        }
    }

    /// Register `callback` in the table matching the source. `$index` has no
    /// model path; see [`bind_value`].
    pub fn subscribe(
        &self,
        vm: &Vm,
        owner: NodeId,
        callback: Callback<Vm>,
    ) -> Option<SubscriptionId> {
        match self {
            Source::Index(_) => None,
            Source::Global(path) => Some(vm.watch(path.clone(), Some(owner), callback)),
            Source::Scoped(path) => Some(vm.watch_access(path.clone(), Some(owner), callback)),
        }
    }
}

/// Render `node` from `source` now and again on every change.
///
/// `$index` bindings render again when their repetition moves (unshift and
/// shift) instead of on model writes.
pub(crate) fn bind_value(
    vm: &Vm,
    node: NodeId,
    source: &Source,
    apply: impl Fn(&Vm, NodeId, &Value) + 'static,
) -> Option<SubscriptionId> {
    apply(vm, node, &source.current(vm, node));

    let apply = Rc::new(apply);
    if let Source::Index(_) = source {
        let source = source.clone();
        vm.meta_mut()
            .entry(node)
            .index_renders
            .push(Rc::new(move |vm: &Vm, node: NodeId| {
                apply(vm, node, &source.current(vm, node));
            }));
        return None;
    }
    source.subscribe(
        vm,
        node,
        Rc::new(move |vm: &Vm, change: &Change| {
            let value = vm.value_at(&change.target);
            apply(vm, node, &value);
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_resolve_sources() {
        let ctx = LoopContext::new(json!({"name": "a"}), 2, &Path::parse("items"), "item", None);

        assert_eq!(
            Source::resolve("item.name", Some(&ctx)),
            Source::Scoped(Path::parse("items.2.name"))
        );
        assert_eq!(
            Source::resolve("title", Some(&ctx)),
            Source::Global(Path::parse("title"))
        );
        assert_eq!(
            Source::resolve("$index", Some(&ctx)),
            Source::Index("$index".to_string())
        );
        assert_eq!(
            Source::resolve("row-$index", Some(&ctx)),
            Source::Index("row-$index".to_string())
        );
        assert_eq!(
            Source::resolve("$index", None),
            Source::Global(Path::parse("$index"))
        );
        assert_eq!(
            Source::resolve(" title ", None),
            Source::Global(Path::parse("title"))
        );
    }
}
