//! Callback Resolver - Two tiers of callbacks per node.
//!
//! - Permanent: method names from the config, resolved once on the instance
//!   at bind time into a fixed slot table. Unresolved names log a warning and
//!   leave the slot empty.
//! - Temporary: functions handed to the bind call. They see the node during
//!   its first population and are dropped once the node is attached.
//!
//! Both tiers fire when both exist, permanent first.

use std::cell::RefCell;

use crate::config::TempCallback;
use crate::instance::{Instance, Method};
use crate::types::CallbackKind;

// =============================================================================
// Events
// =============================================================================

/// A callback notification and its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackEvent {
    EditStart,
    EditCancel,
    EditSubmit,
    RemoveSelf,
    Reset,
    /// A field's committed value changed.
    Change { field: String },
    /// An array element moved from `from` to `to`.
    Reorder { field: String, from: usize, to: usize },
    /// An element was appended to an array at `index`.
    Add { field: String, index: usize },
    /// Array element positions changed.
    ReIndex { field: String },
}

impl CallbackEvent {
    pub fn kind(&self) -> CallbackKind {
        match self {
            CallbackEvent::EditStart => CallbackKind::EditStart,
            CallbackEvent::EditCancel => CallbackKind::EditCancel,
            CallbackEvent::EditSubmit => CallbackKind::EditSubmit,
            CallbackEvent::RemoveSelf => CallbackKind::RemoveSelf,
            CallbackEvent::Reset => CallbackKind::Reset,
            CallbackEvent::Change { .. } => CallbackKind::Change,
            CallbackEvent::Reorder { .. } => CallbackKind::Reorder,
            CallbackEvent::Add { .. } => CallbackKind::Add,
            CallbackEvent::ReIndex { .. } => CallbackKind::ReIndex,
        }
    }

    /// Field the event concerns, if any.
    pub fn field(&self) -> Option<&str> {
        match self {
            CallbackEvent::Change { field }
            | CallbackEvent::Reorder { field, .. }
            | CallbackEvent::Add { field, .. }
            | CallbackEvent::ReIndex { field } => Some(field),
            _ => None,
        }
    }
}

// =============================================================================
// Permanent Slots
// =============================================================================

/// Permanent callbacks resolved on the instance, one slot per kind.
pub(crate) struct CallbackSlots {
    slots: [Option<Method>; CallbackKind::ALL.len()],
}

impl CallbackSlots {
    pub fn empty() -> Self {
        Self {
            slots: std::array::from_fn(|_| None),
        }
    }

    /// Resolve configured method names on `instance`.
    pub fn resolve(instance: &Instance, config: &[(CallbackKind, String)]) -> Self {
        let mut slots = Self::empty();
        for (kind, name) in config {
            if kind.is_temp_only() {
                log::warn!(
                    "{}: {} is only delivered to bind-time callbacks, ignoring `{}`",
                    instance.type_name(),
                    kind.name(),
                    name
                );
                continue;
            }
            match instance.method(name) {
                Some(method) => slots.slots[kind.slot()] = Some(method),
                None => log::warn!(
                    "{}: callback `{}` for {} not found",
                    instance.type_name(),
                    name,
                    kind.name()
                ),
            }
        }
        slots
    }

    pub fn get(&self, kind: CallbackKind) -> Option<Method> {
        self.slots[kind.slot()].clone()
    }
}

// =============================================================================
// Temporary Callbacks
// =============================================================================

/// Bind-time callbacks. `None` once discarded.
pub(crate) struct TempCallbacks {
    callbacks: RefCell<Option<Vec<(CallbackKind, TempCallback)>>>,
}

impl TempCallbacks {
    pub fn new(callbacks: Vec<(CallbackKind, TempCallback)>) -> Self {
        Self {
            callbacks: RefCell::new(Some(callbacks)),
        }
    }

    /// Callbacks registered for `kind`, cloned out of the cell.
    pub fn get(&self, kind: CallbackKind) -> Vec<TempCallback> {
        self.callbacks
            .borrow()
            .iter()
            .flatten()
            .filter(|(k, _)| *k == kind)
            .map(|(_, cb)| cb.clone())
            .collect()
    }

    pub fn discard(&self) {
        self.callbacks.borrow_mut().take();
    }
}
