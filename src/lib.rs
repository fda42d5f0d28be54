//! # dataui
//!
//! Binds trees of plain data objects to trees of interactive controls.
//!
//! ## Architecture
//!
//! A data object implements [`Bindable`] and is wrapped in an [`Instance`].
//! [`bind`] renders the object's template on a [`ControlSurface`] and builds
//! a [`Node`]: one accessor per bound field, handles for the lifecycle
//! controls, and a Clean/Editing state machine. Array fields bind their
//! elements as child nodes, so the node tree mirrors the data tree.
//!
//! ```text
//! Instance ──bind──▶ Node ──▶ Accessors ──▶ controls on the surface
//!                     │
//!                     └── array field ──▶ child Nodes
//! ```
//!
//! Control events flow back through the accessors into the instance. Edits
//! are staged as pending values until submitted; cancel discards them.
//!
//! ## Modules
//!
//! - [`types`] - Values, edit states, control actions, callback kinds
//! - [`engine`] - Node registry (ids, weak lookup, destroy callbacks)
//! - [`instance`] - Bindable trait and shared instance handles
//! - [`config`] - Binding configuration
//! - [`callback`] - Callback events and resolution
//! - [`accessor`] - Scalar and array field accessors
//! - [`node`] - Nodes, edit lifecycle, array operations
//! - [`surface`] - Control surface contract, in-memory surface, terminal painter
//! - [`tracker`] - Saved/changed status of a bound tree

pub mod accessor;
pub mod callback;
pub mod config;
pub mod engine;
pub mod error;
pub mod instance;
pub mod node;
pub mod surface;
pub mod tracker;
pub mod types;

// Re-export commonly used items
pub use types::*;

pub use engine::{NodeId, get_allocated_count, get_node, is_allocated, on_destroy, reset_registry};

pub use error::BindError;

pub use instance::{Bindable, Instance, Method, method};

pub use config::{BindConfig, BindOptions, ControlConfig, FieldConfig, TempCallback, Validator};

pub use callback::CallbackEvent;

pub use node::{ChangeListener, Node, bind};

pub use surface::{
    ControlEvent, ControlFlags, ControlHandles, ControlId, ControlSurface, EventHandler,
    EventKind, MemorySurface, SurfaceError, SurfaceRef,
};

pub use tracker::ChangeTracker;
