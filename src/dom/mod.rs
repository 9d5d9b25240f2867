//! DOM - the node tree the runtime compiles and patches.
//!
//! The tree is an arena ([`Document`]) of nodes addressed by [`NodeId`]
//! handles:
//! - Registry: slot allocation, free pool, generations, recursive release
//! - Node: element payload (attributes, class list, inline style, form state)
//! - Markup: parsing through `tl` and serialization back to markup
//!
//! # Architecture
//!
//! Nodes are NOT objects with engine fields bolted on. Anything the runtime
//! needs to remember about a node lives in its own side table keyed by the
//! handle:
//!
//! ```text
//! Document          NodeMeta side table         Listener table
//! 3: <li>     ->    3: list tag (section 1)     3: click -> handler
//! 4: "text"   ->    4: prefix "Hi ", suffix "!"
//! ```

mod markup;
mod node;
mod registry;

pub use node::{Element, NodeId, NodeKind};
pub use registry::Document;
