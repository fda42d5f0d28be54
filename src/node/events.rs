//! Control event wiring.
//!
//! Handlers capture only the node id and resolve it through the registry
//! when an event arrives, so the surface never keeps a node alive.

use std::rc::Rc;

use super::Node;
use crate::accessor::Accessor;
use crate::callback::CallbackEvent;
use crate::engine;
use crate::surface::{ControlEvent, EventHandler, EventKind};
use crate::types::{ControlAction, EditState, Value};

pub(super) fn wire(node: &Node) {
    let id = node.id();
    let surface = node.surface();

    for action in ControlAction::ALL {
        let Some(control) = node.control(action) else {
            continue;
        };
        let handler: EventHandler = Rc::new(move |_: &ControlEvent| {
            if let Some(node) = engine::get_node(id) {
                node.handle_action(action);
            }
        });
        surface.on(control, EventKind::Click, handler);
    }

    let inputs: Vec<(String, _)> = {
        let state = node.inner.state.borrow();
        state
            .accessors
            .iter()
            .filter_map(Accessor::as_scalar)
            .map(|scalar| (scalar.field().to_string(), scalar.control()))
            .collect()
    };
    for (field, control) in inputs {
        for kind in [EventKind::Input, EventKind::Commit] {
            let field = field.clone();
            let handler: EventHandler = Rc::new(move |event: &ControlEvent| {
                let Some(value) = event.value.clone() else {
                    return;
                };
                if let Some(node) = engine::get_node(id) {
                    node.handle_input(&field, event.kind, value);
                }
            });
            surface.on(control, kind, handler);
        }
    }
}

impl Node {
    fn handle_action(&self, action: ControlAction) {
        let result = match action {
            ControlAction::EditStart => self.start_edit(false),
            ControlAction::EditCancel => self.cancel(),
            ControlAction::EditSubmit => self.submit().map(|_| ()),
            ControlAction::RemoveSelf => self.remove_self(),
            ControlAction::Reset => self.reset(),
        };
        if let Err(err) = result {
            log::warn!("{}: {} failed: {}", self.instance().type_name(), action.name(), err);
        }
    }

    /// Input from a field control.
    ///
    /// Editing nodes take it as the pending value. Clean nodes without an
    /// edit lifecycle commit it on the commit event and report a change.
    fn handle_input(&self, field: &str, kind: EventKind, value: Value) {
        match self.edit_state() {
            EditState::Editing => {
                let mut state = self.inner.state.borrow_mut();
                if let Some(scalar) = super::find_mut(&mut state.accessors, field)
                    .and_then(Accessor::as_scalar_mut)
                {
                    scalar.set_pending(value);
                }
            }
            EditState::Clean if self.has_lifecycle() => {
                log::warn!(
                    "{}: input on `{}` ignored outside of an edit",
                    self.instance().type_name(),
                    field
                );
                self.update_ui();
            }
            EditState::Clean => {
                if kind == EventKind::Commit {
                    self.commit_live(field, value);
                }
            }
        }
    }

    /// Write a committed control value straight to the instance. The
    /// field's validator still applies.
    fn commit_live(&self, field: &str, value: Value) {
        let instance = self.instance();
        if instance.get(field).as_ref() == Some(&value) {
            return;
        }
        let validator = {
            let state = self.inner.state.borrow();
            super::find(&state.accessors, field)
                .and_then(Accessor::as_scalar)
                .and_then(|scalar| scalar.validator())
        };
        if validator.is_some_and(|valid| !valid(&value)) {
            log::debug!("{}: `{}` failed validation", instance.type_name(), field);
            self.update_ui();
            return;
        }
        if !instance.write(field, value) {
            log::warn!("{}: rejected value for `{}`", instance.type_name(), field);
            self.update_ui();
            return;
        }
        self.fire(CallbackEvent::Change {
            field: field.to_string(),
        });
    }
}
