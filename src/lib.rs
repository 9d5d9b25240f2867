//! # spark-vm
//!
//! Directive-driven MVVM runtime: compile a markup template against a JSON
//! model once, then keep the tree in step with every model write.
//!
//! ## Architecture
//!
//! Reactivity is path based. Every binding subscribes to the model path it
//! reads; every write produces a [`Change`] that is fanned out to the
//! subscriptions whose paths overlap it.
//!
//! ```text
//! markup -> Document -> compiler -> directives -> Watcher subscriptions
//!                                                     ^
//! vm.set / vm.push / vm.shift ... -> Change ----------+-> DOM patches
//! ```
//!
//! Bindings inside a `v-for` repetition subscribe to *access paths*
//! (`items.2.done`) that the list reconciler shifts when elements are added
//! or removed at the front of the array.
//!
//! ## Modules
//!
//! - [`dom`] - Arena document, markup parsing and serialization
//! - [`types`] - Paths, changes, loop contexts
//! - [`watcher`] - Path subscriptions and index realignment
//! - [`vm`] - The runtime handle: model writes, events, lifecycle
//! - [`events`] - Events and `v-on` handlers
//!
//! ## Example
//!
//! ```ignore
//! use serde_json::json;
//! use spark_vm::{Document, Event, Vm};
//!
//! let document = Document::parse(r#"<ul id="app"><li v-for="item in items">{{ item.name }}</li></ul>"#);
//! let root = document.first_child(document.body()).unwrap();
//! let vm = Vm::new(document, root, json!({"items": [{"name": "a"}]}))?;
//!
//! vm.push("items", json!({"name": "b"}));
//! assert_eq!(vm.inner_html(root), "<li>a</li><li>b</li>");
//! ```

mod compiler;
mod directives;
mod meta;
mod reconcile;

pub mod dom;
pub mod error;
pub mod events;
pub mod model;
pub mod options;
pub mod types;
pub mod vm;
pub mod watcher;

// Re-export commonly used items
pub use dom::{Document, Element, NodeId, NodeKind};
pub use error::{VmError, Warning};
pub use events::{handler, Event, Handler, HandlerArg};
pub use model::Model;
pub use options::Options;
pub use types::{Change, ChangeKind, LoopContext, Path, Segment, Value};
pub use vm::Vm;
pub use watcher::{SubscriptionId, Watcher};
