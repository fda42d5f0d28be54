//! Memory Surface - A retained control tree without any output device.
//!
//! Templates are opaque markup in which interactive sub-elements are declared
//! as `{name}` placeholders:
//!
//! ```text
//! <li>{name} {size} {editStart} {editCancel} {editSubmit} {removeSelf}</li>
//! ```
//!
//! Rendering creates one container control holding the markup, with one child
//! control per placeholder, appended under the target control.
//!
//! Events are delivered the way a widget toolkit would deliver them: a
//! disabled control, or a control inside a hidden subtree, never fires.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};

use super::{
    ControlEvent, ControlFlags, ControlHandles, ControlId, ControlSurface, EventHandler,
    EventKind, SurfaceError,
};
use crate::types::Value;

const ROOT: usize = 0;

struct Element {
    name: Option<String>,
    markup: Option<String>,
    parent: Option<usize>,
    children: Vec<usize>,
    flags: ControlFlags,
    value: Value,
    handlers: Vec<(EventKind, EventHandler)>,
}

impl Element {
    fn new(parent: Option<usize>) -> Self {
        Self {
            name: None,
            markup: None,
            parent,
            children: Vec::new(),
            flags: ControlFlags::default(),
            value: Value::Null,
            handlers: Vec::new(),
        }
    }
}

/// In-memory [`ControlSurface`].
pub struct MemorySurface {
    elements: RefCell<HashMap<usize, Element>>,
    next_id: Cell<usize>,
}

impl Default for MemorySurface {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Template Parsing
// =============================================================================

/// Extract `{name}` placeholders in declaration order.
pub fn parse_template(template: &str) -> Result<Vec<String>, SurfaceError> {
    let mut names = Vec::new();
    let mut seen = HashSet::new();
    let mut current: Option<String> = None;

    for ch in template.chars() {
        let Some(name) = current.as_mut() else {
            match ch {
                '{' => current = Some(String::new()),
                '}' => return Err(SurfaceError::Template("unmatched `}`".to_string())),
                _ => {}
            }
            continue;
        };

        match ch {
            '{' => return Err(SurfaceError::Template("nested `{`".to_string())),
            '}' => {
                let name = std::mem::take(name);
                current = None;
                if name.is_empty() {
                    return Err(SurfaceError::Template("empty placeholder".to_string()));
                }
                if !seen.insert(name.clone()) {
                    return Err(SurfaceError::Template(format!(
                        "duplicate placeholder `{}`",
                        name
                    )));
                }
                names.push(name);
            }
            c if c.is_alphanumeric() || c == '_' || c == '-' => name.push(c),
            c => {
                return Err(SurfaceError::Template(format!(
                    "invalid character {:?} in placeholder",
                    c
                )));
            }
        }
    }

    if current.is_some() {
        return Err(SurfaceError::Template("unterminated placeholder".to_string()));
    }
    Ok(names)
}

// =============================================================================
// Construction & Inspection
// =============================================================================

impl MemorySurface {
    pub fn new() -> Self {
        let mut elements = HashMap::new();
        let mut root = Element::new(None);
        root.name = Some("root".to_string());
        elements.insert(ROOT, root);
        Self {
            elements: RefCell::new(elements),
            next_id: Cell::new(ROOT + 1),
        }
    }

    /// The top-level control every tree is rendered under.
    pub fn root(&self) -> ControlId {
        ControlId::from_raw(ROOT)
    }

    /// Number of live controls, including the root.
    pub fn len(&self) -> usize {
        self.elements.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 1
    }

    pub fn exists(&self, control: ControlId) -> bool {
        self.elements.borrow().contains_key(&control.raw())
    }

    pub fn flags(&self, control: ControlId) -> Option<ControlFlags> {
        self.elements.borrow().get(&control.raw()).map(|e| e.flags)
    }

    /// Own visibility flag.
    pub fn is_visible(&self, control: ControlId) -> bool {
        self.flags(control)
            .is_some_and(|f| f.contains(ControlFlags::VISIBLE))
    }

    /// Visible itself and through every ancestor.
    pub fn is_shown(&self, control: ControlId) -> bool {
        let elements = self.elements.borrow();
        let mut cursor = Some(control.raw());
        while let Some(id) = cursor {
            match elements.get(&id) {
                Some(e) if e.flags.contains(ControlFlags::VISIBLE) => cursor = e.parent,
                _ => return false,
            }
        }
        true
    }

    pub fn is_enabled(&self, control: ControlId) -> bool {
        self.flags(control)
            .is_some_and(|f| f.contains(ControlFlags::ENABLED))
    }

    pub fn value(&self, control: ControlId) -> Option<Value> {
        self.elements
            .borrow()
            .get(&control.raw())
            .map(|e| e.value.clone())
    }

    pub fn name(&self, control: ControlId) -> Option<String> {
        self.elements
            .borrow()
            .get(&control.raw())
            .and_then(|e| e.name.clone())
    }

    pub fn markup(&self, control: ControlId) -> Option<String> {
        self.elements
            .borrow()
            .get(&control.raw())
            .and_then(|e| e.markup.clone())
    }

    pub fn children(&self, control: ControlId) -> Vec<ControlId> {
        self.elements
            .borrow()
            .get(&control.raw())
            .map(|e| e.children.iter().copied().map(ControlId::from_raw).collect())
            .unwrap_or_default()
    }

    pub fn parent(&self, control: ControlId) -> Option<ControlId> {
        self.elements
            .borrow()
            .get(&control.raw())
            .and_then(|e| e.parent)
            .map(ControlId::from_raw)
    }

    pub fn handler_count(&self, control: ControlId) -> usize {
        self.elements
            .borrow()
            .get(&control.raw())
            .map(|e| e.handlers.len())
            .unwrap_or(0)
    }

    /// Depth-first search for a named control below `within`.
    pub fn find(&self, within: ControlId, name: &str) -> Option<ControlId> {
        let elements = self.elements.borrow();
        let mut stack = vec![within.raw()];
        while let Some(id) = stack.pop() {
            let element = elements.get(&id)?;
            if id != within.raw() && element.name.as_deref() == Some(name) {
                return Some(ControlId::from_raw(id));
            }
            stack.extend(element.children.iter().rev());
        }
        None
    }

    fn allocate(&self) -> usize {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        id
    }
}

// =============================================================================
// Event Delivery
// =============================================================================

impl MemorySurface {
    /// Deliver a user event. Returns false if the control could not receive it.
    pub fn emit(&self, control: ControlId, kind: EventKind, value: Option<Value>) -> bool {
        if !self.is_shown(control) || !self.is_enabled(control) {
            return false;
        }

        // Copy handlers out so they may touch the surface freely
        let handlers: Vec<EventHandler> = {
            let mut elements = self.elements.borrow_mut();
            let Some(element) = elements.get_mut(&control.raw()) else {
                return false;
            };
            if let Some(ref v) = value {
                element.value = v.clone();
            }
            element
                .handlers
                .iter()
                .filter(|(k, _)| *k == kind)
                .map(|(_, h)| h.clone())
                .collect()
        };

        let event = ControlEvent { control, kind, value };
        for handler in handlers {
            handler(&event);
        }
        true
    }

    pub fn click(&self, control: ControlId) -> bool {
        self.emit(control, EventKind::Click, None)
    }

    /// Simulate typing into a control.
    pub fn input(&self, control: ControlId, value: impl Into<Value>) -> bool {
        self.emit(control, EventKind::Input, Some(value.into()))
    }

    pub fn commit(&self, control: ControlId, value: impl Into<Value>) -> bool {
        self.emit(control, EventKind::Commit, Some(value.into()))
    }
}

// =============================================================================
// ControlSurface
// =============================================================================

impl ControlSurface for MemorySurface {
    fn render(&self, template: &str, target: ControlId) -> Result<ControlHandles, SurfaceError> {
        let names = parse_template(template)?;
        if !self.exists(target) {
            return Err(SurfaceError::UnknownControl(target));
        }

        let root_id = self.allocate();
        let mut named = HashMap::with_capacity(names.len());
        let mut elements = self.elements.borrow_mut();

        let mut root = Element::new(Some(target.raw()));
        root.markup = Some(template.to_string());

        for name in names {
            let id = self.allocate();
            let mut element = Element::new(Some(root_id));
            element.name = Some(name.clone());
            elements.insert(id, element);
            root.children.push(id);
            named.insert(name, ControlId::from_raw(id));
        }

        elements.insert(root_id, root);
        if let Some(parent) = elements.get_mut(&target.raw()) {
            parent.children.push(root_id);
        }

        Ok(ControlHandles::new(ControlId::from_raw(root_id), named))
    }

    fn on(&self, control: ControlId, kind: EventKind, handler: EventHandler) {
        if let Some(element) = self.elements.borrow_mut().get_mut(&control.raw()) {
            element.handlers.push((kind, handler));
        }
    }

    fn set_enabled(&self, control: ControlId, enabled: bool) {
        if let Some(element) = self.elements.borrow_mut().get_mut(&control.raw()) {
            element.flags.set(ControlFlags::ENABLED, enabled);
        }
    }

    fn set_visible(&self, control: ControlId, visible: bool) {
        if let Some(element) = self.elements.borrow_mut().get_mut(&control.raw()) {
            element.flags.set(ControlFlags::VISIBLE, visible);
        }
    }

    fn set_value(&self, control: ControlId, value: &Value) {
        if let Some(element) = self.elements.borrow_mut().get_mut(&control.raw()) {
            element.value = value.clone();
        }
    }

    fn place(&self, control: ControlId, index: usize) {
        let mut elements = self.elements.borrow_mut();
        let Some(parent) = elements.get(&control.raw()).and_then(|e| e.parent) else {
            return;
        };
        if let Some(container) = elements.get_mut(&parent) {
            container.children.retain(|&c| c != control.raw());
            let index = index.min(container.children.len());
            container.children.insert(index, control.raw());
        }
    }

    fn remove(&self, control: ControlId) {
        if control.raw() == ROOT {
            return;
        }
        let mut elements = self.elements.borrow_mut();
        let Some(parent) = elements.get(&control.raw()).map(|e| e.parent) else {
            return;
        };
        if let Some(container) = parent.and_then(|p| elements.get_mut(&p)) {
            container.children.retain(|&c| c != control.raw());
        }

        // Handlers are dropped with their elements
        let mut stack = vec![control.raw()];
        while let Some(id) = stack.pop() {
            if let Some(element) = elements.remove(&id) {
                stack.extend(element.children);
            }
        }
    }
}
