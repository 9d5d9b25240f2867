//! `v-on` - attach model handlers to native events.
//!
//! ```text
//! v-on:click="remove($index, $event)"
//! v-on="{mouseenter: hover, mouseleave: leave('x')}"
//! ```
//!
//! The handler is looked up by name in the model's handler table. Replacing
//! or removing it (`Vm::set_handler`) rebinds: the old listener is detached
//! and the new one attached.
//!
//! `$index` is read from the node's loop context each time the event fires,
//! so a repetition moved by unshift or shift reports its current position.
//! Outside a repetition it is passed as the plain string `"$index"`.

use std::cell::Cell;
use std::rc::Rc;

use crate::compiler::{parse_arg, parse_call, parse_object, Arg};
use crate::dom::NodeId;
use crate::events::{Event, HandlerArg, Listener, ListenerId};
use crate::types::{Change, Path, Value};
use crate::vm::Vm;

pub(crate) fn bind_on(vm: &Vm, node: NodeId, event: Option<&str>, expression: &str) {
    match event {
        Some(event) => bind_event(vm, node, event, expression),
        None => match parse_object(expression) {
            Some(entries) => {
                for (event, call) in entries {
                    bind_event(vm, node, &event, &call);
                }
            }
            None => vm.malformed("on", expression),
        },
    }
}

fn bind_event(vm: &Vm, node: NodeId, event: &str, call: &str) {
    let Some((name, args)) = parse_call(call) else {
        vm.malformed("on", call);
        return;
    };

    let args: Rc<Vec<Arg>> = Rc::new(
        args.unwrap_or_default()
            .iter()
            .map(|arg| parse_arg(arg))
            .collect(),
    );

    let event = event.to_string();
    let handler_name = name.clone();
    let attached: Rc<Cell<Option<ListenerId>>> = Rc::new(Cell::new(None));

    let attach = Rc::new(move |vm: &Vm| {
        if let Some(id) = attached.take() {
            vm.unlisten(node, id);
        }
        let Some(handler) = vm.model().handler(&handler_name) else {
            log::trace!("no handler `{}` for {:?}", handler_name, node);
            return;
        };

        let args = Rc::clone(&args);
        let listener: Listener = Rc::new(move |vm: &Vm, native: &Event| {
            let mut values: Vec<HandlerArg> = args
                .iter()
                .map(|arg| match arg {
                    Arg::Event => HandlerArg::Event(native.clone()),
                    Arg::Index => HandlerArg::Value(current_index(vm, node)),
                    Arg::Value(value) => HandlerArg::Value(value.clone()),
                })
                .collect();
            if values.is_empty() {
                values.push(HandlerArg::Event(native.clone()));
            }
            handler(vm, &values);
        });
        attached.set(Some(vm.listen(node, &event, listener)));
    });

    attach(vm);
    vm.watch(
        Path::field(name),
        Some(node),
        Rc::new(move |vm: &Vm, change: &Change| {
            if change.is_direct() {
                attach(vm);
            }
        }),
    );
}

fn current_index(vm: &Vm, node: NodeId) -> Value {
    match vm.loop_context(node) {
        Some(ctx) => Value::from(ctx.index),
        None => Value::String("$index".to_string()),
    }
}
