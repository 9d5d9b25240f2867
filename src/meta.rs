//! Per-node engine state, kept beside the DOM instead of inside it.

use std::rc::Rc;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::dom::NodeId;
use crate::reconcile::Section;
use crate::types::{LoopContext, Path};
use crate::vm::Vm;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) struct SectionId(pub u64);

/// Marks a node as one repetition of a `v-for` section.
#[derive(Clone, Debug)]
pub(crate) struct ListTag {
    pub section: SectionId,
    pub alias: String,
    /// Loop context of the repetition, moved along with index realignment.
    pub ctx: Rc<LoopContext>,
}

/// Re-render of a binding that reads `$index`.
pub(crate) type IndexRender = Rc<dyn Fn(&Vm, NodeId)>;

#[derive(Default)]
pub(crate) struct NodeMeta {
    /// Literal text around an interpolation.
    pub prefix: String,
    pub suffix: String,
    /// Inline `display` captured before `v-show` first hid the node.
    pub visible_display: Option<String>,
    /// Markup cached by `v-if` before its first render.
    pub render_content: Option<String>,
    pub list: Option<ListTag>,
    pub index_renders: Vec<IndexRender>,
    /// Repeated sections whose clones live among this node's children.
    pub sections: Vec<Rc<Section>>,
}

#[derive(Default)]
pub(crate) struct MetaTable {
    nodes: FxHashMap<NodeId, NodeMeta>,
}

impl MetaTable {
    pub fn get(&self, node: NodeId) -> Option<&NodeMeta> {
        self.nodes.get(&node)
    }

    pub fn entry(&mut self, node: NodeId) -> &mut NodeMeta {
        self.nodes.entry(node).or_default()
    }

    pub fn take(&mut self, node: NodeId) -> Option<NodeMeta> {
        self.nodes.remove(&node)
    }

    pub fn section_of(&self, node: NodeId) -> Option<SectionId> {
        self.nodes
            .get(&node)
            .and_then(|meta| meta.list.as_ref())
            .map(|tag| tag.section)
    }

    /// Move every repetition context under the array `base` by `delta`.
    pub fn realign_contexts(&mut self, base: &Path, delta: isize) {
        for tag in self.nodes.values_mut().filter_map(|meta| meta.list.as_mut()) {
            if let Some(moved) = tag.ctx.shifted(base, delta) {
                tag.ctx = Rc::new(moved);
            }
        }
    }

    /// Drop state of released nodes, returning the sections they parented.
    pub fn forget(&mut self, released: &FxHashSet<NodeId>) -> Vec<Rc<Section>> {
        let mut sections = Vec::new();
        for node in released {
            if let Some(meta) = self.nodes.remove(node) {
                sections.extend(meta.sections);
            }
        }
        sections
    }
}
