//! Node construction.
//!
//! `bind` is the only way to create a node. Everything that can be checked
//! against the instance is checked before anything is rendered; everything
//! that needs the rendered controls is checked before the node is
//! registered. A failed bind leaves no controls behind.

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

use super::{Node, NodeInner, NodeState, ParentLink, events};
use crate::accessor::{Accessor, ArrayAccessor, ScalarAccessor};
use crate::callback::{CallbackEvent, CallbackSlots, TempCallbacks};
use crate::config::{BindConfig, BindOptions, TempCallback};
use crate::engine::{self, NodeId};
use crate::error::BindError;
use crate::instance::Instance;
use crate::surface::{ControlHandles, ControlId, SurfaceRef};
use crate::types::{CallbackKind, ControlAction, EditState};

/// Bind `instance` to controls rendered under `target`.
///
/// The instance's own [`BindConfig`] is used unless `options` supplies one.
/// Elements of array fields are bound recursively. Configuration errors,
/// including binding an instance that has already been attached to a node,
/// fail the call and leave no controls behind.
pub fn bind(
    instance: &Instance,
    surface: &SurfaceRef,
    target: ControlId,
    options: BindOptions,
) -> Result<Node, BindError> {
    bind_node(instance, surface, target, options, None)
}

pub(super) fn bind_node(
    instance: &Instance,
    surface: &SurfaceRef,
    target: ControlId,
    options: BindOptions,
    parent: Option<ParentLink>,
) -> Result<Node, BindError> {
    if instance.is_claimed() {
        log::error!("{} is already attached to a node", instance.type_name());
        return Err(BindError::AlreadyAttached {
            type_name: instance.type_name(),
        });
    }

    let BindOptions {
        config,
        temp_callback,
        edit_on_init,
    } = options;
    let Some(mut config) = config.or_else(|| instance.bind_config()) else {
        log::error!("{} has no binding configuration", instance.type_name());
        return Err(BindError::NotBindable {
            type_name: instance.type_name(),
        });
    };
    let edit_on_init = edit_on_init.unwrap_or(config.edit_on_init);
    config.temp_callback.extend(temp_callback);

    check_fields(instance, &config)?;

    let handles = surface.render(&config.template, target)?;
    let id = engine::allocate_id();
    let node = match assemble(id, instance, surface, &handles, config, parent) {
        Ok(node) => node,
        Err(err) => {
            surface.remove(handles.root());
            return Err(err);
        }
    };

    events::wire(&node);
    node.init(edit_on_init);

    // Attach last, then drop the bind-time callbacks
    if let Err(err) = instance.claim(id) {
        node.discard();
        return Err(err);
    }
    node.inner.temp.discard();

    log::debug!("bound {} as {:?}", instance.type_name(), id);
    Ok(node)
}

/// Check the configured fields against the instance.
fn check_fields(instance: &Instance, config: &BindConfig) -> Result<(), BindError> {
    let type_name = instance.type_name();
    let mut seen = HashSet::new();

    for (field, field_config) in &config.bind {
        if !seen.insert(field.as_str()) {
            return Err(BindError::DuplicateField {
                field: field.clone(),
            });
        }

        let missing = || BindError::MissingField {
            type_name,
            field: field.clone(),
        };

        match field_config.element {
            None => {
                if instance.get(field).is_none() {
                    if instance.has_list(field) {
                        return Err(BindError::NotScalar {
                            field: field.clone(),
                        });
                    }
                    return Err(missing());
                }
            }
            Some(element) => {
                let Some(elements) = instance.list(field) else {
                    if instance.get(field).is_some() {
                        return Err(BindError::NotAnArray {
                            field: field.clone(),
                        });
                    }
                    return Err(missing());
                };
                for (index, item) in elements.iter().enumerate() {
                    if !element.matches(item) {
                        log::error!(
                            "{}.{} holds `{}`, found `{}`",
                            type_name,
                            field,
                            element.name(),
                            item.type_name()
                        );
                        return Err(BindError::ElementType {
                            field: field.clone(),
                            expected: element.name(),
                            found: item.type_name(),
                        });
                    }
                    if item.is_claimed() || elements[..index].iter().any(|e| e.ptr_eq(item)) {
                        log::error!("{}.{} lists an attached instance", type_name, field);
                        return Err(BindError::AlreadyAttached {
                            type_name: item.type_name(),
                        });
                    }
                }
            }
        }
    }
    Ok(())
}

/// Resolve controls, build accessors (binding array elements) and register
/// the node.
fn assemble(
    id: NodeId,
    instance: &Instance,
    surface: &SurfaceRef,
    handles: &ControlHandles,
    config: BindConfig,
    parent: Option<ParentLink>,
) -> Result<Node, BindError> {
    let owner = instance.type_name();
    let locate = |locator: &str| {
        handles.get(locator).ok_or_else(|| {
            log::error!("{}: could not find control `{}`", owner, locator);
            BindError::MissingControl {
                owner: owner.to_string(),
                locator: locator.to_string(),
            }
        })
    };

    let mut controls = [None; ControlAction::ALL.len()];
    for action in ControlAction::ALL {
        if let Some(locator) = config.control.locator(action) {
            controls[action.slot()] = Some(locate(locator)?);
        }
    }

    // Every control is located before any element is bound
    let mut located = Vec::with_capacity(config.bind.len());
    for (field, field_config) in &config.bind {
        located.push((field, field_config, locate(field_config.locator(field))?));
    }

    let mut accessors: Vec<Accessor> = Vec::with_capacity(located.len());
    for (field, field_config, control) in located {
        let accessor = match field_config.element {
            None => Accessor::Scalar(ScalarAccessor::new(
                field.as_str(),
                control,
                field_config.validator.clone(),
            )),
            Some(element) => {
                let children = match bind_elements(id, instance, surface, field, control) {
                    Ok(children) => children,
                    Err(err) => {
                        for child in accessors
                            .iter()
                            .filter_map(Accessor::as_array)
                            .flat_map(ArrayAccessor::children)
                        {
                            child.discard();
                        }
                        return Err(err);
                    }
                };
                Accessor::Array(ArrayAccessor::new(
                    field.as_str(),
                    control,
                    element,
                    children,
                    field_config.reorderable,
                ))
            }
        };
        accessors.push(accessor);
    }

    let callbacks = CallbackSlots::resolve(instance, &config.callback);
    let temp: Vec<(CallbackKind, TempCallback)> = config.temp_callback;

    let inner = Rc::new(NodeInner {
        id,
        instance: instance.clone(),
        surface: surface.clone(),
        root: handles.root(),
        controls,
        callbacks,
        temp: TempCallbacks::new(temp),
        parent,
        state: RefCell::new(NodeState {
            edit_state: EditState::Clean,
            accessors,
            enabled: true,
            destroyed: false,
        }),
        listeners: RefCell::new(Vec::new()),
    });
    engine::register(id, &inner);
    Ok(Node::from_inner(inner))
}

/// Bind every element of an array field. On failure the elements bound so
/// far are discarded.
fn bind_elements(
    parent: NodeId,
    instance: &Instance,
    surface: &SurfaceRef,
    field: &str,
    control: ControlId,
) -> Result<Vec<Node>, BindError> {
    let elements = instance.list(field).unwrap_or_default();
    let mut children: Vec<Node> = Vec::with_capacity(elements.len());
    for item in &elements {
        let link = ParentLink {
            id: parent,
            field: field.to_string(),
        };
        match bind_node(item, surface, control, BindOptions::default(), Some(link)) {
            Ok(child) => children.push(child),
            Err(err) => {
                for child in &children {
                    child.discard();
                }
                return Err(err);
            }
        }
    }
    Ok(children)
}

impl Node {
    /// First population: enter the initial state and show it.
    fn init(&self, edit_on_init: bool) {
        self.adopt_editing_children();

        if edit_on_init {
            if let Err(err) = self.start_edit(true) {
                log::warn!("{}: could not start edit on init: {}", self.instance().type_name(), err);
            }
            return;
        }

        self.refresh_controls();
        self.update_ui();
        if self.control(ControlAction::EditCancel).is_some() {
            self.fire(CallbackEvent::EditCancel);
        }
    }
}
