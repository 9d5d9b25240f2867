//! Shared fixtures for the integration tests.

use serde_json::Value;
use spark_vm::{Document, NodeId, Options, Vm};

/// Parse `markup`, compile its first top-level element against `model` and
/// return the runtime with that element.
pub fn mount(markup: &str, model: Value) -> (Vm, NodeId) {
    mount_with(markup, model, Options::default().log_warnings(false))
}

pub fn mount_with(markup: &str, model: Value, options: Options) -> (Vm, NodeId) {
    let _ = env_logger::builder().is_test(true).try_init();

    let document = Document::parse(markup);
    let root = document
        .first_child(document.body())
        .expect("markup has a root element");
    let vm = Vm::with_options(document, root, model, options).expect("template compiles");
    (vm, root)
}

/// The `index`-th child of `node`.
pub fn child(vm: &Vm, node: NodeId, index: usize) -> NodeId {
    vm.document().children(node)[index]
}
