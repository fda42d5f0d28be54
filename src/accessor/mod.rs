//! Accessors - Per-field bridges between an instance and its controls.
//!
//! - [`ScalarAccessor`] - committed/pending value, dirty flag, validator
//! - [`ArrayAccessor`] - child nodes of an array field, sibling edit token,
//!   reorder switch

mod array;
mod scalar;

pub use array::ArrayAccessor;
pub use scalar::ScalarAccessor;

use crate::instance::Instance;
use crate::surface::ControlId;

pub enum Accessor {
    Scalar(ScalarAccessor),
    Array(ArrayAccessor),
}

impl Accessor {
    pub fn field(&self) -> &str {
        match self {
            Accessor::Scalar(acc) => acc.field(),
            Accessor::Array(acc) => acc.field(),
        }
    }

    pub fn control(&self) -> ControlId {
        match self {
            Accessor::Scalar(acc) => acc.control(),
            Accessor::Array(acc) => acc.control(),
        }
    }

    pub fn is_dirty(&self, instance: &Instance) -> bool {
        match self {
            Accessor::Scalar(acc) => acc.is_dirty(instance),
            Accessor::Array(acc) => acc.is_dirty(),
        }
    }

    pub fn edit_start(&mut self, instance: &Instance, force_dirty: bool) {
        match self {
            Accessor::Scalar(acc) => acc.edit_start(instance, force_dirty),
            Accessor::Array(acc) => acc.edit_start(force_dirty),
        }
    }

    pub fn edit_cancel(&mut self) {
        match self {
            Accessor::Scalar(acc) => acc.edit_cancel(),
            Accessor::Array(acc) => acc.edit_cancel(),
        }
    }

    pub fn as_scalar(&self) -> Option<&ScalarAccessor> {
        match self {
            Accessor::Scalar(acc) => Some(acc),
            Accessor::Array(_) => None,
        }
    }

    pub fn as_scalar_mut(&mut self) -> Option<&mut ScalarAccessor> {
        match self {
            Accessor::Scalar(acc) => Some(acc),
            Accessor::Array(_) => None,
        }
    }

    pub fn as_array(&self) -> Option<&ArrayAccessor> {
        match self {
            Accessor::Array(acc) => Some(acc),
            Accessor::Scalar(_) => None,
        }
    }

    pub fn as_array_mut(&mut self) -> Option<&mut ArrayAccessor> {
        match self {
            Accessor::Array(acc) => Some(acc),
            Accessor::Scalar(_) => None,
        }
    }
}
