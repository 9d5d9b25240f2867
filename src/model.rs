//! Model - the data a template binds to, owned by the runtime.
//!
//! Holds three things side by side instead of injecting engine fields into
//! the caller's data:
//! - `data` - the JSON object the template reads and writes
//! - `elements` - the `v-el` registry (name -> live node)
//! - `handlers` - callable values for `v-on` (JSON cannot hold functions)

use std::fmt;
use std::rc::Rc;

use rustc_hash::{FxHashMap, FxHashSet};
use serde_json::Map;

use crate::dom::NodeId;
use crate::events::Handler;
use crate::types::{lookup, lookup_mut, Path, Segment, Value};

#[derive(Default)]
pub struct Model {
    data: Value,
    elements: FxHashMap<String, NodeId>,
    handlers: FxHashMap<String, Handler>,
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("data", &self.data)
            .field("elements", &self.elements)
            .field("handlers", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Model {
    pub fn new(data: Map<String, Value>) -> Self {
        Self {
            data: Value::Object(data),
            elements: FxHashMap::default(),
            handlers: FxHashMap::default(),
        }
    }

    /// The whole model object.
    pub fn data(&self) -> &Value {
        &self.data
    }

    pub fn get(&self, path: &Path) -> Option<&Value> {
        lookup(&self.data, path.segments())
    }

    pub fn get_mut(&mut self, path: &Path) -> Option<&mut Value> {
        lookup_mut(&mut self.data, path.segments())
    }

    /// Write `value` at `path` and return what was there (`Null` for a new
    /// object member). The parent must already exist; array writes must hit
    /// an existing element. Returns `None` when the path is unreachable.
    pub fn set(&mut self, path: &Path, value: Value) -> Option<Value> {
        let (last, parent) = path.segments().split_last()?;
        let container = lookup_mut(&mut self.data, parent)?;

        match (container, last) {
            (Value::Object(map), Segment::Field(name)) => {
                Some(map.insert(name.clone(), value).unwrap_or(Value::Null))
            }
            (Value::Object(map), Segment::Index(index)) => {
                Some(map.insert(index.to_string(), value).unwrap_or(Value::Null))
            }
            (Value::Array(items), Segment::Index(index)) => {
                let slot = items.get_mut(*index)?;
                Some(std::mem::replace(slot, value))
            }
            _ => None,
        }
    }

    /// The array at `path`, if there is one.
    pub fn array_mut(&mut self, path: &Path) -> Option<&mut Vec<Value>> {
        match self.get_mut(path)? {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    // =========================================================================
    // Element registry
    // =========================================================================

    pub fn element(&self, name: &str) -> Option<NodeId> {
        self.elements.get(name).copied()
    }

    pub fn register_element(&mut self, name: &str, node: NodeId) {
        self.elements.insert(name.to_string(), node);
    }

    /// Drop registry entries that point at released nodes.
    pub fn forget_elements(&mut self, released: &FxHashSet<NodeId>) {
        self.elements.retain(|_, node| !released.contains(node));
    }

    pub fn elements(&self) -> impl Iterator<Item = (&str, NodeId)> {
        self.elements.iter().map(|(name, node)| (name.as_str(), *node))
    }

    // =========================================================================
    // Handlers
    // =========================================================================

    pub fn handler(&self, name: &str) -> Option<Handler> {
        self.handlers.get(name).map(Rc::clone)
    }

    /// Install a handler, returning the one it replaces.
    pub fn set_handler(&mut self, name: &str, handler: Handler) -> Option<Handler> {
        self.handlers.insert(name.to_string(), handler)
    }

    pub fn remove_handler(&mut self, name: &str) -> Option<Handler> {
        self.handlers.remove(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn model(value: Value) -> Model {
        match value {
            Value::Object(map) => Model::new(map),
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_get_and_set() {
        let mut m = model(json!({"title": "a", "items": [{"name": "x"}]}));

        assert_eq!(m.get(&Path::parse("items.0.name")), Some(&json!("x")));
        assert_eq!(m.set(&Path::parse("title"), json!("b")), Some(json!("a")));
        assert_eq!(m.set(&Path::parse("fresh"), json!(1)), Some(Value::Null));
        assert_eq!(
            m.set(&Path::parse("items.0.name"), json!("y")),
            Some(json!("x"))
        );
        assert_eq!(m.get(&Path::parse("items.0.name")), Some(&json!("y")));
    }

    #[test]
    fn test_unreachable_writes() {
        let mut m = model(json!({"items": []}));
        assert_eq!(m.set(&Path::parse("missing.x"), json!(1)), None);
        assert_eq!(m.set(&Path::parse("items.3"), json!(1)), None);
        assert_eq!(m.set(&Path::root(), json!(1)), None);
    }

    #[test]
    fn test_array_access() {
        let mut m = model(json!({"items": [1, 2], "title": "x"}));
        m.array_mut(&Path::parse("items")).unwrap().push(json!(3));
        assert_eq!(m.get(&Path::parse("items")), Some(&json!([1, 2, 3])));
        assert!(m.array_mut(&Path::parse("title")).is_none());
    }
}
