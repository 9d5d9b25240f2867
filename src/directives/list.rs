//! `v-for` - expand a template node into one clone per array element.
//!
//! `item in items` reads a model field; `tag in item.tags` reads through an
//! enclosing loop alias and is watched as an access path. The template
//! leaves the tree and stays detached as the source for new clones; the
//! [`reconcile`](crate::reconcile) module keeps the clones in step with the
//! array afterwards.

use std::cell::Cell;
use std::rc::Rc;

use crate::compiler::parse_for;
use crate::dom::NodeId;
use crate::error::Warning;
use crate::reconcile::{self, Section};
use crate::types::{Change, LoopContext, Value};
use crate::vm::Vm;

use super::Source;

pub(crate) fn bind_for(vm: &Vm, template: NodeId, expression: &str, ctx: Option<Rc<LoopContext>>) {
    let Some((alias, field)) = parse_for(expression) else {
        vm.malformed("for", expression);
        vm.release(template);
        return;
    };

    let source = Source::resolve(&field, ctx.as_deref());
    let Some(path) = source.path().cloned() else {
        vm.malformed("for", expression);
        vm.release(template);
        return;
    };

    let Value::Array(items) = vm.value_at(&path) else {
        vm.release(template);
        vm.warn(Warning::ListSource(path));
        return;
    };

    let Some(parent) = vm.document().parent(template) else {
        log::debug!("v-for template {:?} is not attached", template);
        return;
    };

    let anchor = vm.document().next_sibling(template);
    vm.document_mut().detach(template);

    let section = Rc::new(Section {
        id: vm.next_section(),
        alias,
        template,
        parent: Cell::new(parent),
        ctx,
        path: path.clone(),
    });
    vm.meta_mut().entry(parent).sections.push(Rc::clone(&section));

    reconcile::build(vm, &section, &path, &items, anchor);

    let scoped = matches!(source, Source::Scoped(_));
    let subscribed = Rc::clone(&section);
    source.subscribe(
        vm,
        template,
        Rc::new(move |vm: &Vm, change: &Change| {
            if change.below_target().is_some() {
                // One element changed: only its own access paths care.
                // Nested sections see this through the outermost one.
                if !scoped {
                    vm.trigger_change(change);
                }
                return;
            }
            reconcile::update(vm, &subscribed, change);
        }),
    );
}
