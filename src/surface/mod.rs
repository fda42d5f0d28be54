//! Control Surface - The rendering/event boundary of the engine.
//!
//! The engine never draws anything. It asks a [`ControlSurface`] to
//! materialize a template under a target control, gets back named handles
//! for the interactive sub-elements, subscribes to their events and toggles
//! their affordances (enabled, visible, displayed value, position).
//!
//! - [`memory`] - Retained in-memory surface used by tests and headless hosts
//! - [`terminal`] - Paints a memory surface subtree with crossterm styling

pub mod memory;
pub mod terminal;

use std::collections::HashMap;
use std::rc::Rc;

use thiserror::Error;

use crate::types::Value;

pub use memory::MemorySurface;

// =============================================================================
// Handles
// =============================================================================

/// Opaque handle to a control living on a surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ControlId(usize);

impl ControlId {
    pub fn from_raw(raw: usize) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> usize {
        self.0
    }
}

/// Handles returned by [`ControlSurface::render`]: the root of the rendered
/// template plus every named interactive sub-element it declares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlHandles {
    root: ControlId,
    named: HashMap<String, ControlId>,
}

impl ControlHandles {
    pub fn new(root: ControlId, named: HashMap<String, ControlId>) -> Self {
        Self { root, named }
    }

    pub fn root(&self) -> ControlId {
        self.root
    }

    pub fn get(&self, locator: &str) -> Option<ControlId> {
        self.named.get(locator).copied()
    }

    pub fn len(&self) -> usize {
        self.named.len()
    }

    pub fn is_empty(&self) -> bool {
        self.named.is_empty()
    }
}

// =============================================================================
// Flags
// =============================================================================

bitflags::bitflags! {
    /// Affordance state of a single control.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ControlFlags: u8 {
        const VISIBLE = 1 << 0;
        const ENABLED = 1 << 1;
    }
}

impl Default for ControlFlags {
    fn default() -> Self {
        ControlFlags::VISIBLE | ControlFlags::ENABLED
    }
}

// =============================================================================
// Events
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Value changed while the user is still typing/dragging.
    Input,
    /// Value committed (enter, blur, picker closed).
    Commit,
    Click,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ControlEvent {
    pub control: ControlId,
    pub kind: EventKind,
    /// Reported value for input/commit events.
    pub value: Option<Value>,
}

/// Event handler registered with [`ControlSurface::on`].
pub type EventHandler = Rc<dyn Fn(&ControlEvent)>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SurfaceError {
    #[error("unknown control {0:?}")]
    UnknownControl(ControlId),
    #[error("bad template: {0}")]
    Template(String),
}

// =============================================================================
// Surface Capability
// =============================================================================

/// The capability contract between the engine and whatever draws controls.
///
/// Implementations must not call back into the engine from the affordance
/// setters; events are only delivered from user interaction.
pub trait ControlSurface {
    /// Instantiate `template` as the last child of `target`.
    fn render(&self, template: &str, target: ControlId) -> Result<ControlHandles, SurfaceError>;

    /// Subscribe to events of one kind on a control.
    fn on(&self, control: ControlId, kind: EventKind, handler: EventHandler);

    fn set_enabled(&self, control: ControlId, enabled: bool);

    fn set_visible(&self, control: ControlId, visible: bool);

    /// Refresh the value shown by a control.
    fn set_value(&self, control: ControlId, value: &Value);

    /// Move a control to `index` among its container's children.
    fn place(&self, control: ControlId, index: usize);

    /// Destroy a control, its descendants and their handlers.
    fn remove(&self, control: ControlId);
}

/// Shared surface reference held by every node of a tree.
pub type SurfaceRef = Rc<dyn ControlSurface>;
