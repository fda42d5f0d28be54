//! Binding errors.
//!
//! Configuration errors make `bind` fail without producing a node.
//! Transition and structural errors leave the tree exactly as it was.
//! Validation failures are not errors: `submit` reports them as `Ok(false)`.

use thiserror::Error;

use crate::surface::SurfaceError;
use crate::types::EditState;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum BindError {
    #[error("`{type_name}` has no binding configuration")]
    NotBindable { type_name: &'static str },

    #[error("`{type_name}` instance is already attached to a node")]
    AlreadyAttached { type_name: &'static str },

    #[error("could not find control `{locator}` for {owner}")]
    MissingControl { owner: String, locator: String },

    #[error("field `{field}` is bound more than once")]
    DuplicateField { field: String },

    #[error("`{type_name}` has no field `{field}`")]
    MissingField { type_name: &'static str, field: String },

    #[error("field `{field}` is not an array")]
    NotAnArray { field: String },

    #[error("field `{field}` is an array and has no scalar value")]
    NotScalar { field: String },

    #[error("`{type_name}` rejected value for field `{field}`")]
    Rejected { type_name: &'static str, field: String },

    #[error("array `{field}` holds `{expected}`, got `{found}`")]
    ElementType {
        field: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("cannot {op} while {state:?}")]
    InvalidTransition { op: &'static str, state: EditState },

    #[error("node is not an element of a bound array")]
    NoParent,

    #[error("array `{field}` is locked while one of its elements is being edited")]
    Locked { field: String },

    #[error("array `{field}` cannot be reordered right now")]
    NotReorderable { field: String },

    #[error("index {index} out of range for `{field}` (len {len})")]
    IndexOutOfRange {
        field: String,
        index: usize,
        len: usize,
    },

    #[error("instance is not an element of `{field}`")]
    NotAnElement { field: String },

    #[error("node has been destroyed")]
    Destroyed,

    #[error(transparent)]
    Surface(#[from] SurfaceError),
}
