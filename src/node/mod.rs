//! Node - The binding context of one instance.
//!
//! A node owns the accessors for its instance's bound fields, the handles
//! of its lifecycle controls and its edit state. Nodes bound to the
//! elements of an array field are owned by that field's accessor, so the
//! node tree mirrors the instance tree:
//!
//! ```text
//! Project                 node 0
//! └── passes[]            ArrayAccessor
//!     ├── Pass "Main"     node 1 (parent = 0, "passes")
//!     └── Pass "Blur"     node 2 (parent = 0, "passes")
//! ```
//!
//! Parent links are ids resolved through the registry and never keep the
//! parent alive.
//!
//! - [`bind`] - Build a node for an instance
//! - `lifecycle` - start edit, cancel, submit, reset, remove self
//! - `array` - add, remove, reorder and re-sync array elements
//! - `events` - Control event wiring

mod array;
mod bind;
mod events;
mod lifecycle;

pub use bind::bind;

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::accessor::{Accessor, ArrayAccessor};
use crate::callback::{CallbackEvent, CallbackSlots, TempCallbacks};
use crate::engine::{self, NodeId};
use crate::error::BindError;
use crate::instance::Instance;
use crate::surface::{ControlId, SurfaceRef};
use crate::types::{ControlAction, EditState, Value};

/// Listener for committed field changes on a node or any of its descendants.
///
/// Receives the node the change happened on and the field name.
pub type ChangeListener = Rc<dyn Fn(&Node, &str)>;

/// Non-owning link to the array field holding this node's instance.
#[derive(Debug, Clone)]
pub(crate) struct ParentLink {
    pub id: NodeId,
    pub field: String,
}

pub(crate) struct NodeState {
    edit_state: EditState,
    /// Keyed by field name, in declaration order.
    accessors: Vec<Accessor>,
    /// Lifecycle controls enabled; cleared while a sibling is editing.
    enabled: bool,
    destroyed: bool,
}

pub(crate) struct NodeInner {
    id: NodeId,
    instance: Instance,
    surface: SurfaceRef,
    root: ControlId,
    controls: [Option<ControlId>; ControlAction::ALL.len()],
    callbacks: CallbackSlots,
    temp: TempCallbacks,
    parent: Option<ParentLink>,
    state: RefCell<NodeState>,
    listeners: RefCell<Vec<ChangeListener>>,
}

impl Drop for NodeInner {
    fn drop(&mut self) {
        engine::forget(self.id);
    }
}

/// Shared handle to a bound node.
#[derive(Clone)]
pub struct Node {
    inner: Rc<NodeInner>,
}

impl Node {
    pub(crate) fn from_inner(inner: Rc<NodeInner>) -> Self {
        Self { inner }
    }

    pub fn id(&self) -> NodeId {
        self.inner.id
    }

    pub fn instance(&self) -> &Instance {
        &self.inner.instance
    }

    pub fn surface(&self) -> &SurfaceRef {
        &self.inner.surface
    }

    /// Root control of the rendered template.
    pub fn root(&self) -> ControlId {
        self.inner.root
    }

    /// Handle of a lifecycle control, if this node has one.
    pub fn control(&self, action: ControlAction) -> Option<ControlId> {
        self.inner.controls[action.slot()]
    }

    /// Control bound to a field.
    pub fn field_control(&self, field: &str) -> Option<ControlId> {
        let state = self.inner.state.borrow();
        find(&state.accessors, field).map(Accessor::control)
    }

    /// Bound field names in declaration order.
    pub fn fields(&self) -> Vec<String> {
        let state = self.inner.state.borrow();
        state.accessors.iter().map(|a| a.field().to_string()).collect()
    }

    pub fn edit_state(&self) -> EditState {
        self.inner.state.borrow().edit_state
    }

    pub fn is_editing(&self) -> bool {
        self.edit_state() == EditState::Editing
    }

    /// Whether this node is the live node attached to its instance.
    pub fn is_attached(&self) -> bool {
        self.inner
            .instance
            .node()
            .is_some_and(|node| node.id() == self.id())
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.state.borrow().destroyed
    }

    /// Nodes with a start-edit control only take field input while editing.
    pub fn has_lifecycle(&self) -> bool {
        self.control(ControlAction::EditStart).is_some()
    }

    // =========================================================================
    // Field Access
    // =========================================================================

    /// Committed value of a scalar field.
    pub fn get(&self, field: &str) -> Result<Value, BindError> {
        let instance = &self.inner.instance;
        instance.get(field).ok_or_else(|| {
            if instance.has_list(field) {
                BindError::NotScalar {
                    field: field.to_string(),
                }
            } else {
                self.missing_field(field)
            }
        })
    }

    /// Pending value of a field while editing.
    pub fn pending(&self, field: &str) -> Option<Value> {
        let state = self.inner.state.borrow();
        find(&state.accessors, field)?
            .as_scalar()?
            .pending()
            .cloned()
    }

    /// Write a bound scalar field.
    ///
    /// While editing this replaces the pending value, so `cancel` still
    /// restores the committed one. Otherwise the instance is written
    /// directly. Either way the control is refreshed.
    pub fn set(&self, field: &str, value: impl Into<Value>) -> Result<(), BindError> {
        self.ensure_alive()?;
        let value = value.into();
        let instance = &self.inner.instance;

        let mut state = self.inner.state.borrow_mut();
        let accessor = find_mut(&mut state.accessors, field).ok_or_else(|| self.missing_field(field))?;
        let Some(scalar) = accessor.as_scalar_mut() else {
            return Err(BindError::NotScalar {
                field: field.to_string(),
            });
        };

        if !scalar.set_pending(value.clone()) && !instance.write(field, value) {
            return Err(BindError::Rejected {
                type_name: instance.type_name(),
                field: field.to_string(),
            });
        }
        scalar.update_ui(instance, &*self.inner.surface);
        Ok(())
    }

    pub fn is_dirty(&self, field: &str) -> bool {
        let state = self.inner.state.borrow();
        find(&state.accessors, field).is_some_and(|a| a.is_dirty(&self.inner.instance))
    }

    /// Fields whose pending value differs from the committed one.
    pub fn dirty_fields(&self) -> Vec<String> {
        let state = self.inner.state.borrow();
        state
            .accessors
            .iter()
            .filter(|a| a.is_dirty(&self.inner.instance))
            .map(|a| a.field().to_string())
            .collect()
    }

    /// Refresh every control of this node and its descendants from the
    /// instance (or pending values while editing).
    pub fn update_ui(&self) {
        let children: Vec<Node> = {
            let state = self.inner.state.borrow();
            for accessor in &state.accessors {
                if let Accessor::Scalar(scalar) = accessor {
                    scalar.update_ui(&self.inner.instance, &*self.inner.surface);
                }
            }
            all_children(&state.accessors)
        };
        for child in children {
            child.update_ui();
        }
    }

    // =========================================================================
    // Affordances
    // =========================================================================

    /// Enable or disable this node's lifecycle controls.
    pub fn set_enabled(&self, enabled: bool) {
        self.inner.state.borrow_mut().enabled = enabled;
        self.refresh_controls();
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.state.borrow().enabled
    }

    /// Apply visibility and enablement for the current state.
    pub(crate) fn refresh_controls(&self) {
        let state = self.inner.state.borrow();
        if state.destroyed {
            return;
        }
        let editing = state.edit_state == EditState::Editing;
        let surface = &self.inner.surface;

        for action in ControlAction::ALL {
            let Some(control) = self.control(action) else {
                continue;
            };
            let (visible, enabled) = match action {
                ControlAction::EditStart | ControlAction::RemoveSelf | ControlAction::Reset => {
                    (!editing, state.enabled)
                }
                ControlAction::EditCancel | ControlAction::EditSubmit => (editing, true),
            };
            surface.set_visible(control, visible);
            surface.set_enabled(control, enabled);
        }

        let inputs_enabled = editing || !self.has_lifecycle();
        for scalar in state.accessors.iter().filter_map(Accessor::as_scalar) {
            surface.set_enabled(scalar.control(), inputs_enabled);
        }
    }

    // =========================================================================
    // Tree
    // =========================================================================

    pub(crate) fn parent_link(&self) -> Option<&ParentLink> {
        self.inner.parent.as_ref()
    }

    /// Node owning the array this node's instance belongs to.
    pub fn parent(&self) -> Option<Node> {
        self.inner.parent.as_ref().and_then(|link| engine::get_node(link.id))
    }

    /// Name of the parent's array field holding this node's instance.
    pub fn parent_field(&self) -> Option<&str> {
        self.inner.parent.as_ref().map(|link| link.field.as_str())
    }

    /// Current position of this node's instance in the parent's array.
    pub fn index_in_parent(&self) -> Option<usize> {
        let link = self.parent_link()?;
        let parent = self.parent()?;
        self.inner.instance.position_in(parent.instance(), &link.field)
    }

    /// Child nodes bound to an array field, in element order.
    pub fn children(&self, field: &str) -> Result<Vec<Node>, BindError> {
        self.with_array(field, |array| array.children().to_vec())
    }

    /// Register a listener for committed changes on this node and its
    /// descendants.
    pub fn subscribe(&self, listener: impl Fn(&Node, &str) + 'static) {
        let listener: ChangeListener = Rc::new(listener);
        self.inner.listeners.borrow_mut().push(listener);
    }

    /// Run `callback` when this node is destroyed.
    pub fn on_destroy(&self, callback: impl FnOnce() + 'static) {
        engine::on_destroy(self.id(), callback);
    }

    /// Tear this node down.
    ///
    /// Array elements are removed from their parent's array. Root nodes
    /// release their controls and children.
    pub fn unbind(&self) -> Result<(), BindError> {
        self.ensure_alive()?;
        if self.parent_link().is_some() {
            return self.remove_self();
        }
        self.destroy();
        Ok(())
    }

    // =========================================================================
    // Internals
    // =========================================================================

    /// Dispatch a callback to both tiers. Change events also bubble to
    /// listeners on this node and its ancestors.
    pub(crate) fn fire(&self, event: CallbackEvent) {
        let kind = event.kind();
        log::trace!("{} {:?}: {}", self.inner.instance.type_name(), self.id(), kind.name());

        if let Some(method) = self.inner.callbacks.get(kind) {
            method(&self.inner.instance, &event);
        }
        for callback in self.inner.temp.get(kind) {
            callback(self, &event);
        }
        if let CallbackEvent::Change { field } = &event {
            self.bubble_change(field);
        }
    }

    fn bubble_change(&self, field: &str) {
        let mut current = Some(self.clone());
        while let Some(node) = current {
            let listeners: Vec<ChangeListener> = node.inner.listeners.borrow().clone();
            for listener in listeners {
                listener(self, field);
            }
            current = node.parent();
        }
    }

    /// Destroy children first, then release this node's controls and id.
    pub(crate) fn destroy(&self) {
        let children = {
            let mut state = self.inner.state.borrow_mut();
            if state.destroyed {
                return;
            }
            state.destroyed = true;
            all_children(&state.accessors)
        };

        for child in children.iter().rev() {
            child.destroy();
        }

        self.inner.surface.remove(self.inner.root);
        engine::release(self.id());
        log::debug!("destroyed {} {:?}", self.inner.instance.type_name(), self.id());
    }

    /// Tear down a node whose bind did not complete and release the claims
    /// it and its descendants made.
    pub(crate) fn discard(&self) {
        let children = {
            let state = self.inner.state.borrow();
            all_children(&state.accessors)
        };
        for child in &children {
            child.discard();
        }
        self.destroy();
        self.inner.instance.release_claim(self.id());
    }

    pub(crate) fn ensure_alive(&self) -> Result<(), BindError> {
        if self.is_destroyed() {
            return Err(BindError::Destroyed);
        }
        Ok(())
    }

    fn missing_field(&self, field: &str) -> BindError {
        BindError::MissingField {
            type_name: self.inner.instance.type_name(),
            field: field.to_string(),
        }
    }

    pub(crate) fn with_array<R>(
        &self,
        field: &str,
        f: impl FnOnce(&ArrayAccessor) -> R,
    ) -> Result<R, BindError> {
        let state = self.inner.state.borrow();
        let accessor = find(&state.accessors, field).ok_or_else(|| self.missing_field(field))?;
        let array = accessor.as_array().ok_or_else(|| BindError::NotAnArray {
            field: field.to_string(),
        })?;
        Ok(f(array))
    }

    pub(crate) fn with_array_mut<R>(
        &self,
        field: &str,
        f: impl FnOnce(&mut ArrayAccessor) -> R,
    ) -> Result<R, BindError> {
        let mut state = self.inner.state.borrow_mut();
        let accessor = find_mut(&mut state.accessors, field).ok_or_else(|| self.missing_field(field))?;
        let array = accessor.as_array_mut().ok_or_else(|| BindError::NotAnArray {
            field: field.to_string(),
        })?;
        Ok(f(array))
    }

    /// Names of the bound array fields.
    pub(crate) fn array_fields(&self) -> Vec<String> {
        let state = self.inner.state.borrow();
        state
            .accessors
            .iter()
            .filter_map(Accessor::as_array)
            .map(|a| a.field().to_string())
            .collect()
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.inner.id)
            .field("type", &self.inner.instance.type_name())
            .field("edit_state", &self.edit_state())
            .finish()
    }
}

fn find<'a>(accessors: &'a [Accessor], field: &str) -> Option<&'a Accessor> {
    accessors.iter().find(|a| a.field() == field)
}

fn find_mut<'a>(accessors: &'a mut [Accessor], field: &str) -> Option<&'a mut Accessor> {
    accessors.iter_mut().find(|a| a.field() == field)
}

fn all_children(accessors: &[Accessor]) -> Vec<Node> {
    accessors
        .iter()
        .filter_map(Accessor::as_array)
        .flat_map(|a| a.children().iter().cloned())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BindConfig, BindOptions, FieldConfig};
    use crate::instance::{Bindable, Method, method};
    use crate::surface::MemorySurface;
    use crate::types::CallbackKind;
    use std::cell::Cell;

    // =========================================================================
    // Fixtures
    // =========================================================================

    struct Attrib {
        name: String,
        size: i64,
        starts: u32,
        changes: Vec<String>,
    }

    impl Attrib {
        fn started(&mut self, _event: &CallbackEvent) {
            self.starts += 1;
        }

        fn changed(&mut self, event: &CallbackEvent) {
            if let Some(field) = event.field() {
                self.changes.push(field.to_string());
            }
        }
    }

    impl Bindable for Attrib {
        fn bind_config(&self) -> Option<BindConfig> {
            Some(
                BindConfig::new("<li>{name} {size} {editStart} {editCancel} {editSubmit} {removeSelf}</li>")
                    .field(
                        "name",
                        FieldConfig::scalar().validate(|v| v.as_text().is_some_and(|s| !s.is_empty())),
                    )
                    .field("size", FieldConfig::scalar())
                    .control(ControlAction::EditStart, "editStart")
                    .control(ControlAction::EditCancel, "editCancel")
                    .control(ControlAction::EditSubmit, "editSubmit")
                    .control(ControlAction::RemoveSelf, "removeSelf")
                    .callback(CallbackKind::EditStart, "started")
                    .callback(CallbackKind::Change, "changed"),
            )
        }

        fn field(&self, name: &str) -> Option<Value> {
            match name {
                "name" => Some(Value::from(self.name.as_str())),
                "size" => Some(Value::from(self.size)),
                _ => None,
            }
        }

        fn set_field(&mut self, name: &str, value: Value) -> bool {
            match (name, value) {
                ("name", Value::Text(s)) => self.name = s,
                ("size", Value::Int(i)) => self.size = i,
                _ => return false,
            }
            true
        }

        fn method(&self, name: &str) -> Option<Method> {
            match name {
                "started" => Some(method(Attrib::started)),
                "changed" => Some(method(Attrib::changed)),
                _ => None,
            }
        }
    }

    struct Layout {
        title: String,
        attribs: Vec<Instance>,
        changes: Vec<String>,
    }

    impl Layout {
        fn changed(&mut self, event: &CallbackEvent) {
            if let Some(field) = event.field() {
                self.changes.push(field.to_string());
            }
        }

        /// Keep the first attribute and add a fresh one.
        fn reset(&mut self, _event: &CallbackEvent) {
            self.title = "Layout".to_string();
            self.attribs.truncate(1);
            self.attribs.push(attrib("uv", 2));
        }
    }

    impl Bindable for Layout {
        fn bind_config(&self) -> Option<BindConfig> {
            Some(
                BindConfig::new("<ul>{title} {reset} {attribs}</ul>")
                    .field("title", FieldConfig::scalar())
                    .field("attribs", FieldConfig::array_of::<Attrib>().reorderable(true))
                    .control(ControlAction::Reset, "reset")
                    .callback(CallbackKind::Change, "changed")
                    .callback(CallbackKind::Reset, "reset"),
            )
        }

        fn field(&self, name: &str) -> Option<Value> {
            (name == "title").then(|| Value::from(self.title.as_str()))
        }

        fn set_field(&mut self, name: &str, value: Value) -> bool {
            match (name, value) {
                ("title", Value::Text(s)) => {
                    self.title = s;
                    true
                }
                _ => false,
            }
        }

        fn list(&self, name: &str) -> Option<&[Instance]> {
            (name == "attribs").then_some(self.attribs.as_slice())
        }

        fn list_mut(&mut self, name: &str) -> Option<&mut Vec<Instance>> {
            (name == "attribs").then_some(&mut self.attribs)
        }

        fn method(&self, name: &str) -> Option<Method> {
            match name {
                "changed" => Some(method(Layout::changed)),
                "reset" => Some(method(Layout::reset)),
                _ => None,
            }
        }
    }

    /// Not bindable without an explicit config.
    struct Plain;
    impl Bindable for Plain {}

    struct Item {
        label: String,
        /// Template lacks the `{label}` control.
        broken: bool,
        editing: bool,
    }

    impl Bindable for Item {
        fn bind_config(&self) -> Option<BindConfig> {
            let template = if self.broken {
                "<li>{editStart} {editCancel} {editSubmit}</li>"
            } else {
                "<li>{label} {editStart} {editCancel} {editSubmit}</li>"
            };
            Some(
                BindConfig::new(template)
                    .field("label", FieldConfig::scalar())
                    .control(ControlAction::EditStart, "editStart")
                    .control(ControlAction::EditCancel, "editCancel")
                    .control(ControlAction::EditSubmit, "editSubmit")
                    .edit_on_init(self.editing),
            )
        }

        fn field(&self, name: &str) -> Option<Value> {
            (name == "label").then(|| Value::from(self.label.as_str()))
        }
    }

    struct Shelf {
        items: Vec<Instance>,
    }

    impl Bindable for Shelf {
        fn bind_config(&self) -> Option<BindConfig> {
            Some(BindConfig::new("<ol>{items}</ol>").field("items", FieldConfig::array_of::<Item>()))
        }

        fn list(&self, name: &str) -> Option<&[Instance]> {
            (name == "items").then_some(self.items.as_slice())
        }

        fn list_mut(&mut self, name: &str) -> Option<&mut Vec<Instance>> {
            (name == "items").then_some(&mut self.items)
        }
    }

    fn item(label: &str, broken: bool, editing: bool) -> Instance {
        Instance::new(Item {
            label: label.to_string(),
            broken,
            editing,
        })
    }

    fn setup() -> (Rc<MemorySurface>, SurfaceRef) {
        engine::reset_registry();
        let surface = Rc::new(MemorySurface::new());
        let shared: SurfaceRef = surface.clone();
        (surface, shared)
    }

    fn attrib(name: &str, size: i64) -> Instance {
        Instance::new(Attrib {
            name: name.to_string(),
            size,
            starts: 0,
            changes: Vec::new(),
        })
    }

    fn layout(attribs: Vec<Instance>) -> Instance {
        Instance::new(Layout {
            title: "Layout".to_string(),
            attribs,
            changes: Vec::new(),
        })
    }

    fn bind_root(instance: &Instance, surface: &MemorySurface, shared: &SurfaceRef) -> Node {
        bind(instance, shared, surface.root(), BindOptions::default()).unwrap()
    }

    fn attrib_changes(instance: &Instance) -> Vec<String> {
        instance.with(|a: &Attrib| a.changes.clone()).unwrap()
    }

    fn attrib_names(layout: &Instance) -> Vec<String> {
        layout
            .list("attribs")
            .unwrap()
            .iter()
            .map(|a| a.get("name").unwrap().to_string())
            .collect()
    }

    fn ctl(node: &Node, action: ControlAction) -> ControlId {
        node.control(action).unwrap()
    }

    // =========================================================================
    // Binding
    // =========================================================================

    #[test]
    fn test_bind_renders_committed_values() {
        let (surface, shared) = setup();
        let inst = attrib("pos", 4);
        let node = bind_root(&inst, &surface, &shared);

        assert!(node.is_attached());
        assert!(inst.is_attached());
        assert_eq!(node.fields(), ["name", "size"]);
        assert_eq!(surface.value(node.field_control("name").unwrap()), Some(Value::from("pos")));
        assert_eq!(surface.value(node.field_control("size").unwrap()), Some(Value::from(4)));
    }

    #[test]
    fn test_view_state_affordances() {
        let (surface, shared) = setup();
        let node = bind_root(&attrib("pos", 4), &surface, &shared);

        assert_eq!(node.edit_state(), EditState::Clean);
        assert!(surface.is_visible(ctl(&node, ControlAction::EditStart)));
        assert!(surface.is_visible(ctl(&node, ControlAction::RemoveSelf)));
        assert!(!surface.is_visible(ctl(&node, ControlAction::EditCancel)));
        assert!(!surface.is_visible(ctl(&node, ControlAction::EditSubmit)));
        // Lifecycle nodes only take input while editing
        assert!(!surface.is_enabled(node.field_control("name").unwrap()));
    }

    #[test]
    fn test_bind_missing_control_leaves_nothing() {
        let (surface, shared) = setup();
        let before = surface.len();

        let config = BindConfig::new("<li>{name}</li>")
            .field("name", FieldConfig::scalar())
            .control(ControlAction::EditStart, "editStart");
        let result = bind(&attrib("pos", 4), &shared, surface.root(), BindOptions::new().config(config));

        assert!(matches!(result, Err(BindError::MissingControl { ref locator, .. }) if locator == "editStart"));
        assert_eq!(surface.len(), before);
        assert_eq!(engine::get_allocated_count(), 0);
    }

    #[test]
    fn test_bind_config_errors() {
        let (surface, shared) = setup();
        let target = surface.root();

        let err = bind(&Instance::new(Plain), &shared, target, BindOptions::default()).unwrap_err();
        assert!(matches!(err, BindError::NotBindable { .. }));

        let duplicate = BindConfig::new("<li>{name}</li>")
            .field("name", FieldConfig::scalar())
            .field("name", FieldConfig::scalar());
        let err = bind(&attrib("a", 1), &shared, target, BindOptions::new().config(duplicate)).unwrap_err();
        assert_eq!(err, BindError::DuplicateField { field: "name".to_string() });

        let missing = BindConfig::new("<li>{color}</li>").field("color", FieldConfig::scalar());
        let err = bind(&attrib("a", 1), &shared, target, BindOptions::new().config(missing)).unwrap_err();
        assert!(matches!(err, BindError::MissingField { .. }));

        let not_array = BindConfig::new("<li>{name}</li>").field("name", FieldConfig::array_of::<Attrib>());
        let err = bind(&attrib("a", 1), &shared, target, BindOptions::new().config(not_array)).unwrap_err();
        assert!(matches!(err, BindError::NotAnArray { .. }));
    }

    #[test]
    fn test_bind_rejects_wrong_element_type() {
        let (surface, shared) = setup();
        let bad = Instance::new(Plain);
        let inst = layout(vec![attrib("pos", 4), bad]);

        let err = bind(&inst, &shared, surface.root(), BindOptions::default()).unwrap_err();
        assert!(matches!(err, BindError::ElementType { .. }));
        assert_eq!(engine::get_allocated_count(), 0);
    }

    #[test]
    fn test_failed_bind_leaves_elements_unclaimed() {
        let (surface, shared) = setup();
        let a = attrib("a", 1);
        let inst = layout(vec![a.clone()]);
        let before = surface.len();

        // `title` is declared after the array but has no control
        let config = BindConfig::new("<ul>{attribs}</ul>")
            .field("attribs", FieldConfig::array_of::<Attrib>())
            .field("title", FieldConfig::scalar());
        let err = bind(&inst, &shared, surface.root(), BindOptions::new().config(config)).unwrap_err();

        assert!(matches!(err, BindError::MissingControl { ref locator, .. } if locator == "title"));
        assert!(!a.is_claimed());
        assert_eq!(surface.len(), before);
        assert_eq!(engine::get_allocated_count(), 0);

        let node = bind_root(&inst, &surface, &shared);
        assert_eq!(node.children("attribs").unwrap().len(), 1);
        assert!(a.is_attached());
    }

    #[test]
    fn test_failed_element_bind_releases_earlier_elements() {
        let (surface, shared) = setup();
        let first = item("first", false, false);
        let second = item("second", true, false);
        let inst = Instance::new(Shelf {
            items: vec![first.clone(), second.clone()],
        });
        let before = surface.len();

        let err = bind(&inst, &shared, surface.root(), BindOptions::default()).unwrap_err();
        assert!(matches!(err, BindError::MissingControl { ref locator, .. } if locator == "label"));
        assert!(!first.is_claimed());
        assert!(!second.is_claimed());
        assert_eq!(surface.len(), before);
        assert_eq!(engine::get_allocated_count(), 0);

        second.with_mut(|i: &mut Item| i.broken = false);
        let node = bind(&inst, &shared, surface.root(), BindOptions::default()).unwrap();
        assert_eq!(node.children("items").unwrap().len(), 2);
    }

    #[test]
    fn test_duplicate_element_rejected_at_bind() {
        let (surface, shared) = setup();
        let a = attrib("a", 1);
        let inst = layout(vec![a.clone(), a.clone()]);

        let err = bind(&inst, &shared, surface.root(), BindOptions::default()).unwrap_err();
        assert!(matches!(err, BindError::AlreadyAttached { .. }));
        assert!(!a.is_claimed());
        assert_eq!(engine::get_allocated_count(), 0);
    }

    #[test]
    fn test_reattach_fails_and_keeps_original() {
        let (surface, shared) = setup();
        let inst = attrib("pos", 4);
        let node = bind_root(&inst, &surface, &shared);
        node.start_edit(false).unwrap();
        node.set("name", "pos2").unwrap();
        let controls = surface.len();

        let err = bind(&inst, &shared, surface.root(), BindOptions::default()).unwrap_err();
        assert!(matches!(err, BindError::AlreadyAttached { .. }));

        assert_eq!(surface.len(), controls);
        assert!(node.is_editing());
        assert_eq!(node.pending("name"), Some(Value::from("pos2")));
        assert!(inst.node().is_some_and(|n| n.id() == node.id()));
    }

    // =========================================================================
    // Callbacks
    // =========================================================================

    #[test]
    fn test_temp_callbacks_fire_only_during_bind() {
        let (surface, shared) = setup();
        let cancels = Rc::new(Cell::new(0));
        let counter = cancels.clone();

        let options = BindOptions::new().temp_callback(CallbackKind::EditCancel, move |node: &Node, _: &CallbackEvent| {
            assert!(!node.is_attached());
            counter.set(counter.get() + 1);
        });
        let node = bind(&attrib("pos", 4), &shared, surface.root(), options).unwrap();
        assert_eq!(cancels.get(), 1);

        node.start_edit(false).unwrap();
        node.cancel().unwrap();
        assert_eq!(cancels.get(), 1);
    }

    #[test]
    fn test_unresolved_callback_is_not_fatal() {
        let (surface, shared) = setup();
        let config = BindConfig::new("<li>{name}</li>")
            .field("name", FieldConfig::scalar())
            .callback(CallbackKind::Change, "noSuchMethod");
        let inst = attrib("pos", 4);
        let node = bind(&inst, &shared, surface.root(), BindOptions::new().config(config)).unwrap();

        // Live node: commit goes straight through
        surface.commit(node.field_control("name").unwrap(), "pos2");
        assert_eq!(inst.get("name"), Some(Value::from("pos2")));
        assert!(attrib_changes(&inst).is_empty());
    }

    // =========================================================================
    // Edit Lifecycle
    // =========================================================================

    #[test]
    fn test_start_edit_shows_edit_controls() {
        let (surface, shared) = setup();
        let inst = attrib("pos", 4);
        let node = bind_root(&inst, &surface, &shared);

        node.start_edit(false).unwrap();
        assert!(node.is_editing());
        assert!(!surface.is_visible(ctl(&node, ControlAction::EditStart)));
        assert!(!surface.is_visible(ctl(&node, ControlAction::RemoveSelf)));
        assert!(surface.is_visible(ctl(&node, ControlAction::EditCancel)));
        assert!(surface.is_visible(ctl(&node, ControlAction::EditSubmit)));
        assert!(surface.is_enabled(node.field_control("name").unwrap()));
        assert_eq!(inst.with(|a: &Attrib| a.starts), Some(1));

        let err = node.start_edit(false).unwrap_err();
        assert_eq!(
            err,
            BindError::InvalidTransition {
                op: "start edit",
                state: EditState::Editing
            }
        );
    }

    #[test]
    fn test_cancel_restores_committed() {
        let (surface, shared) = setup();
        let inst = attrib("pos", 4);
        let node = bind_root(&inst, &surface, &shared);

        node.start_edit(false).unwrap();
        node.set("size", 8).unwrap();
        assert!(node.is_dirty("size"));
        assert_eq!(node.get("size"), Ok(Value::from(4)));

        node.cancel().unwrap();
        assert_eq!(inst.get("size"), Some(Value::from(4)));
        assert!(!node.is_dirty("size"));
        assert_eq!(surface.value(node.field_control("size").unwrap()), Some(Value::from(4)));
        assert!(node.cancel().is_err());
    }

    #[test]
    fn test_submit_commits_and_reports_changes() {
        let (surface, shared) = setup();
        let inst = attrib("pos", 4);
        let node = bind_root(&inst, &surface, &shared);

        node.start_edit(false).unwrap();
        node.set("size", 8).unwrap();
        assert_eq!(node.dirty_fields(), ["size"]);

        assert_eq!(node.submit(), Ok(true));
        assert_eq!(node.edit_state(), EditState::Clean);
        assert_eq!(inst.get("size"), Some(Value::from(8)));
        assert!(node.dirty_fields().is_empty());
        assert_eq!(attrib_changes(&inst), ["size"]);
    }

    #[test]
    fn test_submit_is_atomic_on_validation_failure() {
        let (surface, shared) = setup();
        let inst = attrib("pos", 4);
        let node = bind_root(&inst, &surface, &shared);

        node.start_edit(false).unwrap();
        node.set("size", 8).unwrap();
        node.set("name", "").unwrap();

        assert_eq!(node.submit(), Ok(false));
        assert!(node.is_editing());
        assert_eq!(inst.get("size"), Some(Value::from(4)));
        assert_eq!(inst.get("name"), Some(Value::from("pos")));
        assert!(attrib_changes(&inst).is_empty());

        node.set("name", "pos").unwrap();
        assert_eq!(node.submit(), Ok(true));
        assert_eq!(inst.get("size"), Some(Value::from(8)));
    }

    #[test]
    fn test_submit_rolls_back_rejected_write() {
        let (surface, shared) = setup();
        let inst = attrib("pos", 4);
        let node = bind_root(&inst, &surface, &shared);

        node.start_edit(false).unwrap();
        node.set("name", "pos2").unwrap();
        node.set("size", "big").unwrap();

        let err = node.submit().unwrap_err();
        assert!(matches!(err, BindError::Rejected { ref field, .. } if field == "size"));
        assert_eq!(inst.get("name"), Some(Value::from("pos")));
        assert!(node.is_editing());
    }

    #[test]
    fn test_forced_dirty_reports_every_field() {
        let (surface, shared) = setup();
        let inst = attrib("pos", 4);
        let node = bind_root(&inst, &surface, &shared);

        node.start_edit(true).unwrap();
        assert_eq!(node.dirty_fields(), ["name", "size"]);
        node.submit().unwrap();
        assert_eq!(attrib_changes(&inst), ["name", "size"]);
    }

    #[test]
    fn test_edit_through_controls() {
        let (surface, shared) = setup();
        let inst = attrib("pos", 4);
        let node = bind_root(&inst, &surface, &shared);
        let name = node.field_control("name").unwrap();

        // Disabled while clean
        assert!(!surface.input(name, "ignored"));

        assert!(surface.click(ctl(&node, ControlAction::EditStart)));
        assert!(surface.input(name, "normal"));
        assert_eq!(node.pending("name"), Some(Value::from("normal")));
        assert!(surface.click(ctl(&node, ControlAction::EditSubmit)));

        assert_eq!(inst.get("name"), Some(Value::from("normal")));
        assert_eq!(attrib_changes(&inst), ["name"]);
    }

    #[test]
    fn test_live_commit_runs_validator() {
        let (surface, shared) = setup();
        let config = BindConfig::new("<li>{name}</li>")
            .field("name", FieldConfig::scalar().validate(|v| v.as_text().is_some_and(|s| !s.is_empty())))
            .callback(CallbackKind::Change, "changed");
        let inst = attrib("pos", 4);
        let node = bind(&inst, &shared, surface.root(), BindOptions::new().config(config)).unwrap();
        let name = node.field_control("name").unwrap();

        assert!(surface.commit(name, ""));
        assert_eq!(inst.get("name"), Some(Value::from("pos")));
        assert_eq!(surface.value(name), Some(Value::from("pos")));
        assert!(attrib_changes(&inst).is_empty());

        assert!(surface.commit(name, "uv"));
        assert_eq!(inst.get("name"), Some(Value::from("uv")));
        assert_eq!(attrib_changes(&inst), ["name"]);
    }

    #[test]
    fn test_edit_on_init() {
        let (surface, shared) = setup();
        let inst = attrib("pos", 4);
        let node = bind(&inst, &shared, surface.root(), BindOptions::new().edit_on_init(true)).unwrap();

        assert!(node.is_editing());
        assert_eq!(node.dirty_fields(), ["name", "size"]);
        assert!(surface.is_visible(ctl(&node, ControlAction::EditSubmit)));
    }

    #[test]
    fn test_set_outside_edit_writes_instance() {
        let (surface, shared) = setup();
        let inst = attrib("pos", 4);
        let node = bind_root(&inst, &surface, &shared);

        node.set("size", 6).unwrap();
        assert_eq!(inst.get("size"), Some(Value::from(6)));
        assert_eq!(surface.value(node.field_control("size").unwrap()), Some(Value::from(6)));
        assert!(!node.is_dirty("size"));

        assert!(matches!(node.set("size", "six"), Err(BindError::Rejected { .. })));
        assert!(matches!(node.set("color", 1), Err(BindError::MissingField { .. })));
    }

    // =========================================================================
    // Arrays
    // =========================================================================

    #[test]
    fn test_children_follow_elements() {
        let (surface, shared) = setup();
        let inst = layout(vec![attrib("pos", 4), attrib("uv", 2)]);
        let node = bind_root(&inst, &surface, &shared);

        let children = node.children("attribs").unwrap();
        assert_eq!(children.len(), 2);
        assert_eq!(children[1].index_in_parent(), Some(1));
        assert_eq!(children[1].parent().map(|p| p.id()), Some(node.id()));
        assert_eq!(children[1].parent_field(), Some("attribs"));
        assert_eq!(
            surface.children(node.field_control("attribs").unwrap()),
            [children[0].root(), children[1].root()]
        );
        assert!(matches!(node.children("title"), Err(BindError::NotAnArray { .. })));
    }

    #[test]
    fn test_sibling_edit_locks_array() {
        let (surface, shared) = setup();
        let inst = layout(vec![attrib("pos", 4), attrib("uv", 2)]);
        let node = bind_root(&inst, &surface, &shared);
        let children = node.children("attribs").unwrap();

        children[1].start_edit(false).unwrap();
        assert_eq!(node.editing_child("attribs").map(|c| c.id()), Some(children[1].id()));

        assert!(!surface.is_enabled(ctl(&children[0], ControlAction::RemoveSelf)));
        assert!(!surface.is_enabled(ctl(&children[0], ControlAction::EditStart)));
        assert!(!surface.click(ctl(&children[0], ControlAction::RemoveSelf)));
        assert!(!node.is_reorderable("attribs"));

        assert!(matches!(children[0].start_edit(false), Err(BindError::Locked { .. })));
        assert!(matches!(
            node.remove_child("attribs", children[0].instance()),
            Err(BindError::Locked { .. })
        ));
        assert_eq!(node.children("attribs").unwrap().len(), 2);

        children[1].cancel().unwrap();
        assert!(node.editing_child("attribs").is_none());
        assert!(surface.is_enabled(ctl(&children[0], ControlAction::RemoveSelf)));
        assert!(node.is_reorderable("attribs"));
    }

    #[test]
    fn test_children_editing_at_bind_are_adopted() {
        let (surface, shared) = setup();
        let inst = Instance::new(Shelf {
            items: vec![item("draft", false, true), item("done", false, false)],
        });
        let node = bind(&inst, &shared, surface.root(), BindOptions::default()).unwrap();
        let children = node.children("items").unwrap();

        assert!(children[0].is_editing());
        assert_eq!(node.editing_child("items").map(|c| c.id()), Some(children[0].id()));
        assert!(!surface.is_enabled(ctl(&children[1], ControlAction::EditStart)));

        children[0].cancel().unwrap();
        assert!(surface.is_enabled(ctl(&children[1], ControlAction::EditStart)));
    }

    #[test]
    fn test_remove_child_reindexes() {
        let (surface, shared) = setup();
        let inst = layout(vec![attrib("a", 1), attrib("b", 2), attrib("c", 3)]);
        let node = bind_root(&inst, &surface, &shared);
        let children = node.children("attribs").unwrap();
        let removed_root = children[1].root();

        node.remove_child("attribs", children[1].instance()).unwrap();

        assert_eq!(attrib_names(&inst), ["a", "c"]);
        let remaining = node.children("attribs").unwrap();
        assert_eq!(remaining.len(), 2);
        assert_eq!(remaining[1].id(), children[2].id());
        assert_eq!(remaining[1].index_in_parent(), Some(1));
        assert!(children[1].is_destroyed());
        assert!(!children[1].instance().is_attached());
        assert!(!surface.exists(removed_root));
        assert_eq!(inst.with(|l: &Layout| l.changes.clone()), Some(vec!["attribs".to_string()]));

        let err = node.remove_child("attribs", children[1].instance()).unwrap_err();
        assert!(matches!(err, BindError::NotAnElement { .. }));
    }

    #[test]
    fn test_remove_self_click() {
        let (surface, shared) = setup();
        let inst = layout(vec![attrib("a", 1), attrib("b", 2)]);
        let node = bind_root(&inst, &surface, &shared);
        let first = node.children("attribs").unwrap()[0].clone();

        let destroyed = Rc::new(Cell::new(false));
        let flag = destroyed.clone();
        first.on_destroy(move || flag.set(true));

        assert!(surface.click(ctl(&first, ControlAction::RemoveSelf)));
        assert!(destroyed.get());
        assert_eq!(attrib_names(&inst), ["b"]);

        let root_err = node.remove_self().unwrap_err();
        assert_eq!(root_err, BindError::NoParent);
    }

    #[test]
    fn test_add_child() {
        let (surface, shared) = setup();
        let inst = layout(vec![attrib("a", 1)]);
        let node = bind_root(&inst, &surface, &shared);

        let err = node.add_child("attribs", &Instance::new(Plain), false).unwrap_err();
        assert!(matches!(err, BindError::ElementType { .. }));
        assert_eq!(attrib_names(&inst), ["a"]);

        let added = node.add_child("attribs", &attrib("b", 2), true).unwrap();
        assert_eq!(attrib_names(&inst), ["a", "b"]);
        assert_eq!(added.index_in_parent(), Some(1));
        assert!(added.is_editing());
        assert_eq!(node.editing_child("attribs").map(|c| c.id()), Some(added.id()));

        let first = node.children("attribs").unwrap()[0].clone();
        assert!(!surface.is_enabled(ctl(&first, ControlAction::EditStart)));

        let err = node.add_child("attribs", &attrib("c", 3), false).unwrap_err();
        assert!(matches!(err, BindError::Locked { .. }));
    }

    #[test]
    fn test_reorder() {
        let (surface, shared) = setup();
        let inst = layout(vec![attrib("a", 1), attrib("b", 2), attrib("c", 3)]);
        let node = bind_root(&inst, &surface, &shared);
        let before = node.children("attribs").unwrap();

        node.reorder("attribs", 0, 2).unwrap();
        assert_eq!(attrib_names(&inst), ["b", "c", "a"]);
        let after = node.children("attribs").unwrap();
        assert_eq!(after[2].id(), before[0].id());
        assert_eq!(
            surface.children(node.field_control("attribs").unwrap()),
            after.iter().map(Node::root).collect::<Vec<_>>()
        );

        assert!(matches!(node.reorder("attribs", 0, 3), Err(BindError::IndexOutOfRange { .. })));

        node.set_reorderable("attribs", false).unwrap();
        assert!(matches!(node.reorder("attribs", 0, 1), Err(BindError::NotReorderable { .. })));
    }

    #[test]
    fn test_reset_resyncs_children() {
        let (surface, shared) = setup();
        let inst = layout(vec![attrib("a", 1), attrib("b", 2)]);
        let node = bind_root(&inst, &surface, &shared);
        let before = node.children("attribs").unwrap();

        surface.commit(node.field_control("title").unwrap(), "Renamed");
        assert!(surface.click(ctl(&node, ControlAction::Reset)));

        assert_eq!(attrib_names(&inst), ["a", "uv"]);
        let after = node.children("attribs").unwrap();
        assert_eq!(after.len(), 2);
        assert_eq!(after[0].id(), before[0].id());
        assert!(before[1].is_destroyed());
        assert!(after[1].instance().is_attached());
        assert_eq!(surface.value(node.field_control("title").unwrap()), Some(Value::from("Layout")));
    }

    #[test]
    fn test_reset_rejects_duplicate_element() {
        let (surface, shared) = setup();
        let a = attrib("a", 1);
        let inst = layout(vec![a.clone()]);
        let config = BindConfig::new("<ul>{reset} {attribs}</ul>")
            .field("attribs", FieldConfig::array_of::<Attrib>())
            .control(ControlAction::Reset, "reset");
        let node = bind(&inst, &shared, surface.root(), BindOptions::new().config(config)).unwrap();
        let before = node.children("attribs").unwrap();

        inst.with_mut(|l: &mut Layout| l.attribs.push(a.clone()));
        let err = node.reset().unwrap_err();

        assert!(matches!(err, BindError::AlreadyAttached { .. }));
        let after = node.children("attribs").unwrap();
        assert_eq!(after.len(), 1);
        assert_eq!(after[0].id(), before[0].id());
        assert!(!after[0].is_destroyed());
    }

    // =========================================================================
    // Tree Utilities
    // =========================================================================

    #[test]
    fn test_change_bubbles_to_ancestors() {
        let (surface, shared) = setup();
        let inst = layout(vec![attrib("a", 1)]);
        let node = bind_root(&inst, &surface, &shared);

        let seen: Rc<RefCell<Vec<(NodeId, String)>>> = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        node.subscribe(move |from: &Node, field: &str| sink.borrow_mut().push((from.id(), field.to_string())));

        let child = node.children("attribs").unwrap()[0].clone();
        child.start_edit(false).unwrap();
        child.set("size", 5).unwrap();
        child.submit().unwrap();

        assert_eq!(*seen.borrow(), [(child.id(), "size".to_string())]);
    }

    #[test]
    fn test_dropped_root_forgets_destroy_callbacks() {
        let (surface, shared) = setup();
        let inst = attrib("pos", 4);
        let node = bind_root(&inst, &surface, &shared);

        let destroyed = Rc::new(Cell::new(false));
        let flag = destroyed.clone();
        node.on_destroy(move || flag.set(true));
        assert_eq!(Rc::strong_count(&destroyed), 2);

        drop(node);
        assert!(!inst.is_attached());
        assert!(!destroyed.get());
        assert_eq!(Rc::strong_count(&destroyed), 1);
    }

    #[test]
    fn test_unbind_releases_tree() {
        let (surface, shared) = setup();
        let inst = layout(vec![attrib("a", 1), attrib("b", 2)]);
        let node = bind_root(&inst, &surface, &shared);
        assert_eq!(engine::get_allocated_count(), 3);

        node.unbind().unwrap();
        assert!(node.is_destroyed());
        assert_eq!(engine::get_allocated_count(), 0);
        assert_eq!(surface.children(surface.root()).len(), 0);
        assert_eq!(node.start_edit(false), Err(BindError::Destroyed));
    }
}
