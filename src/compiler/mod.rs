//! Compiler - finds directives in a subtree and binds them.
//!
//! A compile runs in two passes over one root:
//! 1. Walk - depth-first, counting directive occurrences and queueing a
//!    compile unit (node + loop context) for every node that has any.
//!    Nodes anchoring a `v-if` or `v-for` are queued but not entered; their
//!    content is compiled later by the directive itself.
//! 2. Batch - every queued directive attribute is stripped from the node and
//!    dispatched to its handler. Each dispatch resolves one pending count.
//!
//! When the pending count of a document compile reaches zero, the compiled
//! fragment replaces the live element's children in one swap. Recompiles
//! started by `v-if` and `v-for` run as their own roots and never swap.
//!
//! # Example
//!
//! ```ignore
//! // <p>{{ greeting }}</p>  ->  1 unit, pending = 1
//! compile(&vm, fragment, None, Mode::Document { element });
//! assert!(vm.is_compiled());
//! ```

mod directive;
mod expr;

use std::rc::Rc;

use crate::directives;
use crate::dom::{Document, NodeId, NodeKind};
use crate::error::Warning;
use crate::options::Options;
use crate::types::LoopContext;
use crate::vm::Vm;

pub(crate) use directive::{DirectiveFlags, DirectiveKind};
pub(crate) use expr::{parse_arg, parse_call, parse_for, parse_object, split_interpolation, Arg};

// =============================================================================
// TYPES
// =============================================================================

/// What a compile root is and what happens when it completes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Mode {
    /// Detached copy of `element`'s children; swapped in on completion.
    Document { element: NodeId },
    /// Children of an already attached node (`v-if` render).
    Children,
    /// A `v-for` clone: the root's own directives are compiled too.
    Clone,
}

/// A node waiting for its directives to be bound.
struct CompileUnit {
    node: NodeId,
    ctx: Option<Rc<LoopContext>>,
    /// Directive occurrences counted for this node.
    count: usize,
}

/// Pending-compile bookkeeping for one root.
struct Batch {
    root: NodeId,
    mode: Mode,
    pending: usize,
    completed: bool,
}

impl Batch {
    fn resolve(&mut self, vm: &Vm, count: usize) {
        self.pending = self.pending.saturating_sub(count);
        if self.pending == 0 && !self.completed {
            self.completed = true;
            match self.mode {
                Mode::Document { element } => vm.swap_in(self.root, element),
                Mode::Children | Mode::Clone => {
                    log::trace!("compile root {:?} complete", self.root);
                }
            }
        }
    }
}

// =============================================================================
// Entry point
// =============================================================================

/// Compile the subtree at `root`.
pub(crate) fn compile(vm: &Vm, root: NodeId, ctx: Option<Rc<LoopContext>>, mode: Mode) {
    let mut units = Vec::new();
    {
        let document = vm.document();
        walk(
            &document,
            vm.options(),
            root,
            mode == Mode::Clone,
            &ctx,
            &mut units,
        );
    }

    let pending = units.iter().map(|unit| unit.count).sum();
    log::debug!(
        "compiling {:?} ({:?}): {} nodes, {} directives",
        root,
        mode,
        units.len(),
        pending
    );

    let mut batch = Batch {
        root,
        mode,
        pending,
        completed: false,
    };
    if pending == 0 {
        batch.resolve(vm, 0);
    }

    for unit in units {
        compile_unit(vm, unit, &mut batch);
    }
}

// =============================================================================
// Walk
// =============================================================================

fn walk(
    document: &Document,
    options: &Options,
    node: NodeId,
    include_self: bool,
    ctx: &Option<Rc<LoopContext>>,
    units: &mut Vec<CompileUnit>,
) {
    if include_self {
        let (flags, count) = classify(document, options, node);
        if count > 0 {
            units.push(CompileUnit {
                node,
                ctx: ctx.clone(),
                count,
            });
        }
        if flags.intersects(DirectiveFlags::LATE) {
            return;
        }
    }

    for child in document.children(node) {
        walk(document, options, *child, true, ctx, units);
    }
}

fn classify(document: &Document, options: &Options, node: NodeId) -> (DirectiveFlags, usize) {
    match document.kind(node) {
        Some(NodeKind::Text) => {
            let text = document.text(node).unwrap_or_default();
            if split_interpolation(text, &options.open, &options.close).is_some() {
                (DirectiveFlags::INTERPOLATION, 1)
            } else {
                (DirectiveFlags::empty(), 0)
            }
        }
        Some(NodeKind::Element) => {
            let mut flags = DirectiveFlags::empty();
            let mut count = 0;
            for name in document.attribute_names(node) {
                if let Some(rest) = name.strip_prefix(options.prefix.as_str()) {
                    flags |= DirectiveKind::parse(rest).flag();
                    count += 1;
                }
            }
            (flags, count)
        }
        _ => (DirectiveFlags::empty(), 0),
    }
}

// =============================================================================
// Batch
// =============================================================================

fn compile_unit(vm: &Vm, unit: CompileUnit, batch: &mut Batch) {
    let CompileUnit { node, ctx, count } = unit;

    // An earlier directive (v-text, v-html) may have replaced this node
    if !vm.document().contains(node) {
        batch.resolve(vm, count);
        return;
    }

    if vm.document().is_text(node) {
        compile_text(vm, node, ctx.as_deref());
        batch.resolve(vm, count);
        return;
    }

    let prefix = vm.options().prefix.clone();
    let directives: Vec<(String, DirectiveKind, String)> = {
        let document = vm.document();
        document
            .attribute_names(node)
            .into_iter()
            .filter_map(|name| {
                let kind = DirectiveKind::parse(name.strip_prefix(prefix.as_str())?);
                let value = document.attribute(node, &name).unwrap_or_default().to_string();
                Some((name, kind, value))
            })
            .collect()
    };

    // v-for takes the whole node: the rest of its directives are compiled on
    // every clone instead.
    if let Some((name, _, value)) = directives
        .iter()
        .find(|(_, kind, _)| *kind == DirectiveKind::For)
    {
        vm.document_mut().remove_attribute(node, name);
        directives::list::bind_for(vm, node, value, ctx);
        batch.resolve(vm, count);
        return;
    }

    for (name, kind, value) in directives {
        vm.document_mut().remove_attribute(node, &name);
        dispatch(vm, node, &name, kind, &value, ctx.as_ref());
        batch.resolve(vm, 1);
    }
}

fn compile_text(vm: &Vm, node: NodeId, ctx: Option<&LoopContext>) {
    let parts = {
        let document = vm.document();
        let options = vm.options();
        document.text(node).and_then(|text| {
            split_interpolation(text, &options.open, &options.close)
                .map(|(prefix, expression, suffix)| {
                    (prefix.to_string(), expression.to_string(), suffix.to_string())
                })
        })
    };

    if let Some((prefix, expression, suffix)) = parts {
        directives::text::bind_interpolation(vm, node, &prefix, &expression, &suffix, ctx);
    }
}

fn dispatch(
    vm: &Vm,
    node: NodeId,
    name: &str,
    kind: DirectiveKind,
    value: &str,
    ctx: Option<&Rc<LoopContext>>,
) {
    log::trace!("{:?}: {}=\"{}\"", node, name, value);

    match kind {
        DirectiveKind::Text => directives::text::bind_text(vm, node, value, ctx.map(|c| &**c)),
        DirectiveKind::Html => directives::text::bind_html(vm, node, value, ctx.map(|c| &**c)),
        DirectiveKind::El => directives::text::bind_el(vm, node, value),
        DirectiveKind::Show => directives::display::bind_show(vm, node, value, ctx.map(|c| &**c)),
        DirectiveKind::If => directives::display::bind_if(vm, node, value, ctx.cloned()),
        DirectiveKind::Model => directives::form::bind_model(vm, node, value, ctx.map(|c| &**c)),
        DirectiveKind::On(event) => directives::on::bind_on(vm, node, event.as_deref(), value),
        DirectiveKind::Bind(attribute) => {
            directives::bind::bind(vm, node, attribute.as_deref(), value, ctx.map(|c| &**c))
        }
        DirectiveKind::For => directives::list::bind_for(vm, node, value, ctx.cloned()),
        DirectiveKind::Unknown(_) => vm.warn(Warning::UnknownDirective(name.to_string())),
    }
}
