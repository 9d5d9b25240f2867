//! List reconciler - keeps a repeated section's clones in step with its array.
//!
//! Clones of one section are found by their [`ListTag`](crate::meta::ListTag),
//! not by position, so other sections and static siblings sharing the parent
//! are never touched.
//!
//! | change           | DOM                                   | subscriptions                 |
//! |------------------|---------------------------------------|-------------------------------|
//! | push             | one clone after the last tagged one   | new clone registers its own   |
//! | pop              | last tagged clone released            | released with it              |
//! | unshift          | one clone before the first tagged one | existing ones move forward 1  |
//! | shift            | first tagged clone released           | remaining ones move back 1    |
//! | splice/sort/reverse, assignment | all clones rebuilt     | old released, new registered  |
//!
//! Push and pop never touch index alignment: elements before the end keep
//! their positions. After unshift and shift each moved clone's loop context
//! is realigned too, and its `$index` bindings render again.

use std::cell::Cell;
use std::rc::Rc;

use crate::compiler::{compile, Mode};
use crate::dom::NodeId;
use crate::error::Warning;
use crate::meta::{ListTag, SectionId};
use crate::types::{Change, ChangeKind, LoopContext, Path, Value};
use crate::vm::Vm;

/// One `v-for` expansion.
pub(crate) struct Section {
    pub id: SectionId,
    pub alias: String,
    /// Detached node every clone is copied from.
    pub template: NodeId,
    /// Node the clones live under. Moves once, when a document compile
    /// swaps its fragment into the live element.
    pub parent: Cell<NodeId>,
    /// Loop context the section was compiled in (outer repetitions).
    pub ctx: Option<Rc<LoopContext>>,
    /// Array path at compile time.
    pub path: Path,
}

impl Section {
    /// Enclosing loop context for clones of the array now at `array_path`.
    fn parent_ctx(&self, vm: &Vm, array_path: &Path) -> Option<Rc<LoopContext>> {
        let ctx = self.ctx.as_ref()?;
        if *array_path == self.path || !self.path.starts_with(&ctx.path) {
            return Some(Rc::clone(ctx));
        }
        let moved = array_path.truncated(ctx.path.len());
        let item = vm.value_at(&moved);
        Some(Rc::new(ctx.rebased(&moved, item)))
    }
}

/// Tagged clones of `section`, in DOM order.
fn tagged(vm: &Vm, section: &Section) -> Vec<NodeId> {
    let document = vm.document();
    let meta = vm.meta();
    document
        .children(section.parent.get())
        .iter()
        .copied()
        .filter(|child| meta.section_of(*child) == Some(section.id))
        .collect()
}

/// Clone the template for element `index`, insert it before `before` (or at
/// the end) and compile it.
fn instantiate(
    vm: &Vm,
    section: &Section,
    array_path: &Path,
    index: usize,
    item: &Value,
    before: Option<NodeId>,
) {
    let Some(clone) = vm.document_mut().clone_node(section.template, true) else {
        return;
    };

    let parent_ctx = section.parent_ctx(vm, array_path);
    let ctx = Rc::new(LoopContext::new(
        item.clone(),
        index,
        array_path,
        &section.alias,
        parent_ctx.as_deref(),
    ));
    vm.meta_mut().entry(clone).list = Some(ListTag {
        section: section.id,
        alias: section.alias.clone(),
        ctx: Rc::clone(&ctx),
    });

    vm.document_mut()
        .insert_before(section.parent.get(), clone, before);
    compile(vm, clone, Some(ctx), Mode::Clone);
}

/// Create one clone per element, inserted before `before`.
pub(crate) fn build(
    vm: &Vm,
    section: &Section,
    array_path: &Path,
    items: &[Value],
    before: Option<NodeId>,
) {
    log::debug!(
        "building {} clones of `{}` over {}",
        items.len(),
        section.alias,
        array_path
    );
    for (index, item) in items.iter().enumerate() {
        instantiate(vm, section, array_path, index, item, before);
    }
}

/// Apply one array change to the section.
pub(crate) fn update(vm: &Vm, section: &Section, change: &Change) {
    let path = &change.target;
    let Value::Array(items) = vm.value_at(path) else {
        clear(vm, section);
        vm.warn(Warning::ListSource(path.clone()));
        return;
    };

    let clones = tagged(vm, section);
    match change.kind {
        ChangeKind::Push if clones.len() + 1 == items.len() => {
            let before = clones.last().and_then(|last| vm.document().next_sibling(*last));
            let index = items.len() - 1;
            instantiate(vm, section, path, index, &items[index], before);
        }
        ChangeKind::Pop if clones.len() == items.len() + 1 => {
            if let Some(last) = clones.last() {
                vm.release(*last);
            }
        }
        ChangeKind::Unshift if clones.len() + 1 == items.len() => {
            vm.realign(change, path, 1);
            let before = clones.first().copied();
            instantiate(vm, section, path, 0, &items[0], before);
            for clone in &clones {
                vm.refresh_indices(*clone);
            }
        }
        ChangeKind::Shift if clones.len() == items.len() + 1 => {
            if let Some(first) = clones.first() {
                vm.release(*first);
            }
            vm.realign(change, path, -1);
            for clone in clones.iter().skip(1) {
                vm.refresh_indices(*clone);
            }
        }
        _ => rebuild(vm, section, path, &items, &clones),
    }
}

/// Release every clone and build the section again from `items`.
fn rebuild(vm: &Vm, section: &Section, path: &Path, items: &[Value], clones: &[NodeId]) {
    let before = clones.last().and_then(|last| vm.document().next_sibling(*last));
    for clone in clones {
        vm.release(*clone);
    }
    build(vm, section, path, items, before);
}

fn clear(vm: &Vm, section: &Section) {
    for clone in tagged(vm, section) {
        vm.release(clone);
    }
}
