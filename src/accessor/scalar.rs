//! Scalar accessor - one instance field bridged to one control.

use crate::config::Validator;
use crate::instance::Instance;
use crate::surface::{ControlId, ControlSurface};
use crate::types::Value;

/// Bridges a scalar field to its control.
///
/// Holds a pending value only while the owning node is editing. `get`
/// always reads the committed value from the instance.
pub struct ScalarAccessor {
    field: String,
    control: ControlId,
    validator: Option<Validator>,
    pending: Option<Value>,
    forced: bool,
}

impl ScalarAccessor {
    pub fn new(field: impl Into<String>, control: ControlId, validator: Option<Validator>) -> Self {
        Self {
            field: field.into(),
            control,
            validator,
            pending: None,
            forced: false,
        }
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn control(&self) -> ControlId {
        self.control
    }

    /// Committed value.
    pub fn get(&self, instance: &Instance) -> Value {
        instance.get(&self.field).unwrap_or_default()
    }

    pub fn pending(&self) -> Option<&Value> {
        self.pending.as_ref()
    }

    /// What the control should show: pending while editing, committed otherwise.
    pub fn display_value(&self, instance: &Instance) -> Value {
        match &self.pending {
            Some(value) => value.clone(),
            None => self.get(instance),
        }
    }

    // =========================================================================
    // Edit Lifecycle
    // =========================================================================

    /// Snapshot the committed value as the initial pending value.
    pub fn edit_start(&mut self, instance: &Instance, force_dirty: bool) {
        self.pending = Some(self.get(instance));
        self.forced = force_dirty;
    }

    /// Replace the pending value. Returns false when not editing.
    pub fn set_pending(&mut self, value: Value) -> bool {
        match &mut self.pending {
            Some(pending) => {
                *pending = value;
                true
            }
            None => false,
        }
    }

    pub fn is_dirty(&self, instance: &Instance) -> bool {
        match &self.pending {
            Some(pending) => self.forced || *pending != self.get(instance),
            None => false,
        }
    }

    pub fn validator(&self) -> Option<Validator> {
        self.validator.clone()
    }

    /// Validator and the value it should check, if this field has one.
    pub fn validation(&self, instance: &Instance) -> Option<(Validator, Value)> {
        let validator = self.validator.clone()?;
        Some((validator, self.display_value(instance)))
    }

    pub fn validate_edit(&self, instance: &Instance) -> bool {
        match self.validation(instance) {
            Some((validator, value)) => validator(&value),
            None => true,
        }
    }

    pub fn edit_cancel(&mut self) {
        self.pending = None;
        self.forced = false;
    }

    /// End the edit, handing back the pending value.
    pub fn edit_submit(&mut self) -> Option<Value> {
        self.forced = false;
        self.pending.take()
    }

    pub fn update_ui(&self, instance: &Instance, surface: &dyn ControlSurface) {
        surface.set_value(self.control, &self.display_value(instance));
    }
}
