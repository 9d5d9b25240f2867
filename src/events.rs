//! Events - native event objects and the per-node listener registry.
//!
//! Listeners are kept out of the DOM, in a table keyed by [`NodeId`]:
//! - `add(node, kind, fn)` - attach a listener, returns its id
//! - `remove(node, id)` - detach one listener
//! - `matching(node, kind)` - snapshot of listeners to run for a dispatch
//! - `forget(released)` - drop everything attached to released nodes
//!
//! Dispatch is synchronous and target-only: [`Vm::dispatch`](crate::Vm::dispatch)
//! runs the snapshot in attach order before returning.

use std::rc::Rc;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::dom::NodeId;
use crate::types::Value;
use crate::vm::Vm;

// =============================================================================
// TYPES
// =============================================================================

/// A native event delivered to a node.
#[derive(Clone, Debug, PartialEq)]
pub struct Event {
    /// Event name (e.g., "click", "input", "change")
    pub kind: String,
    /// Node the event was dispatched on (set by dispatch)
    pub target: Option<NodeId>,
    /// Free-form payload for application events
    pub detail: Value,
}

impl Event {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            target: None,
            detail: Value::Null,
        }
    }

    pub fn with_detail(kind: impl Into<String>, detail: Value) -> Self {
        Self {
            detail,
            ..Self::new(kind)
        }
    }
}

/// One argument passed to a `v-on` handler.
#[derive(Clone, Debug, PartialEq)]
pub enum HandlerArg {
    /// The `$event` token (or the implicit sole argument).
    Event(Event),
    /// A literal from the argument list, with `$index` already substituted.
    Value(Value),
}

impl HandlerArg {
    pub fn as_event(&self) -> Option<&Event> {
        match self {
            HandlerArg::Event(event) => Some(event),
            HandlerArg::Value(_) => None,
        }
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            HandlerArg::Value(value) => Some(value),
            HandlerArg::Event(_) => None,
        }
    }
}

/// Application callback bound through `v-on`.
pub type Handler = Rc<dyn Fn(&Vm, &[HandlerArg])>;

/// Build a [`Handler`] from a closure.
pub fn handler(f: impl Fn(&Vm, &[HandlerArg]) + 'static) -> Handler {
    Rc::new(f)
}

/// Native listener attached to a node.
pub(crate) type Listener = Rc<dyn Fn(&Vm, &Event)>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

// =============================================================================
// STATE
// =============================================================================

#[derive(Default)]
pub(crate) struct Listeners {
    next_id: u64,
    by_node: FxHashMap<NodeId, Vec<(ListenerId, String, Listener)>>,
}

impl Listeners {
    pub fn add(&mut self, node: NodeId, kind: &str, listener: Listener) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.by_node
            .entry(node)
            .or_default()
            .push((id, kind.to_string(), listener));
        id
    }

    pub fn remove(&mut self, node: NodeId, id: ListenerId) -> bool {
        let Some(list) = self.by_node.get_mut(&node) else {
            return false;
        };
        let before = list.len();
        list.retain(|(existing, ..)| *existing != id);
        let removed = list.len() != before;
        if list.is_empty() {
            self.by_node.remove(&node);
        }
        removed
    }

    /// Listeners for `kind` on `node`, in attach order.
    pub fn matching(&self, node: NodeId, kind: &str) -> Vec<Listener> {
        self.by_node
            .get(&node)
            .map(|list| {
                list.iter()
                    .filter(|(_, k, _)| k == kind)
                    .map(|(.., listener)| Rc::clone(listener))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn count(&self, node: NodeId) -> usize {
        self.by_node.get(&node).map_or(0, Vec::len)
    }

    pub fn forget(&mut self, released: &FxHashSet<NodeId>) {
        self.by_node.retain(|node, _| !released.contains(node));
    }
}
