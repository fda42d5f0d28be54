//! Core types shared by every layer of the binding engine.
//!
//! - [`Value`] - Scalar field values moved between instances and controls
//! - [`EditState`] - Clean/Editing state of a node
//! - [`ControlAction`] - The lifecycle buttons a node may own
//! - [`CallbackKind`] - Recognized callback slots
//! - [`ElementType`] - Declared element type of an array field

use std::any::TypeId;
use std::fmt;

use crate::instance::Instance;

// =============================================================================
// Value
// =============================================================================

/// A scalar field value.
///
/// Bound instances expose their scalar fields as `Value`s, and controls
/// display and report them. Array-typed fields are not values; they are
/// sequences of [`Instance`]s handled by the array accessor.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Floats, and integers widened to floats.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(value as i64)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

// =============================================================================
// Edit State
// =============================================================================

/// Edit lifecycle state of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EditState {
    /// Viewing committed values. Initial state.
    #[default]
    Clean,
    /// Accessors hold pending values awaiting submit or cancel.
    Editing,
}

// =============================================================================
// Control Actions
// =============================================================================

/// Lifecycle controls a node can own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlAction {
    EditStart,
    EditCancel,
    EditSubmit,
    RemoveSelf,
    Reset,
}

impl ControlAction {
    pub const ALL: [ControlAction; 5] = [
        ControlAction::EditStart,
        ControlAction::EditCancel,
        ControlAction::EditSubmit,
        ControlAction::RemoveSelf,
        ControlAction::Reset,
    ];

    /// Name used in diagnostics and template locators.
    pub fn name(self) -> &'static str {
        match self {
            ControlAction::EditStart => "editStart",
            ControlAction::EditCancel => "editCancel",
            ControlAction::EditSubmit => "editSubmit",
            ControlAction::RemoveSelf => "removeSelf",
            ControlAction::Reset => "reset",
        }
    }

    pub(crate) fn slot(self) -> usize {
        self as usize
    }
}

// =============================================================================
// Callback Kinds
// =============================================================================

/// Recognized callback slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallbackKind {
    EditStart,
    EditCancel,
    EditSubmit,
    RemoveSelf,
    Reset,
    Change,
    Reorder,
    Add,
    ReIndex,
}

impl CallbackKind {
    pub const ALL: [CallbackKind; 9] = [
        CallbackKind::EditStart,
        CallbackKind::EditCancel,
        CallbackKind::EditSubmit,
        CallbackKind::RemoveSelf,
        CallbackKind::Reset,
        CallbackKind::Change,
        CallbackKind::Reorder,
        CallbackKind::Add,
        CallbackKind::ReIndex,
    ];

    pub fn name(self) -> &'static str {
        match self {
            CallbackKind::EditStart => "onEditStart",
            CallbackKind::EditCancel => "onEditCancel",
            CallbackKind::EditSubmit => "onEditSubmit",
            CallbackKind::RemoveSelf => "onRemoveSelf",
            CallbackKind::Reset => "onReset",
            CallbackKind::Change => "onChange",
            CallbackKind::Reorder => "onReorder",
            CallbackKind::Add => "onAdd",
            CallbackKind::ReIndex => "onReIndex",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    /// Cancel and submit notifications only reach bind-time callbacks.
    pub fn is_temp_only(self) -> bool {
        matches!(self, CallbackKind::EditCancel | CallbackKind::EditSubmit)
    }

    /// Fired only by array accessors.
    pub fn is_array_only(self) -> bool {
        matches!(
            self,
            CallbackKind::Reorder | CallbackKind::Add | CallbackKind::ReIndex
        )
    }

    pub(crate) fn slot(self) -> usize {
        self as usize
    }
}

// =============================================================================
// Element Type Descriptor
// =============================================================================

/// Declared element type of an array-typed field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElementType {
    id: TypeId,
    name: &'static str,
}

impl ElementType {
    pub fn of<T: 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Check the runtime type of an instance against this descriptor.
    pub fn matches(&self, instance: &Instance) -> bool {
        instance.type_id() == self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_display() {
        assert_eq!(Value::from("Main").to_string(), "Main");
        assert_eq!(Value::from(4).to_string(), "4");
        assert_eq!(Value::Null.to_string(), "");
        assert_eq!(Value::from(true).to_string(), "true");
    }

    #[test]
    fn test_value_accessors() {
        assert_eq!(Value::from("x").as_text(), Some("x"));
        assert_eq!(Value::from(3).as_int(), Some(3));
        assert_eq!(Value::from(3).as_float(), Some(3.0));
        assert_eq!(Value::from("3").as_int(), None);
        assert!(Value::default().is_null());
    }

    #[test]
    fn test_callback_names_roundtrip() {
        for kind in CallbackKind::ALL {
            assert_eq!(CallbackKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(CallbackKind::from_name("onSomethingElse"), None);
    }

    #[test]
    fn test_callback_tiers() {
        assert!(CallbackKind::EditCancel.is_temp_only());
        assert!(CallbackKind::EditSubmit.is_temp_only());
        assert!(!CallbackKind::EditStart.is_temp_only());
        assert!(CallbackKind::ReIndex.is_array_only());
        assert!(!CallbackKind::Change.is_array_only());
    }

    #[test]
    fn test_slots_are_dense() {
        for (i, kind) in CallbackKind::ALL.iter().enumerate() {
            assert_eq!(kind.slot(), i);
        }
        for (i, action) in ControlAction::ALL.iter().enumerate() {
            assert_eq!(action.slot(), i);
        }
    }
}
