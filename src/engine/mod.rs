//! Binding Engine - Node registry.
//!
//! Nodes are owned by their parents (through array accessors) or by the
//! caller that bound them. The registry only maps ids to weak references:
//!
//! ```text
//! NodeId(0): Project  (parent=None)
//! NodeId(1): Pass     (parent=(0, "pass"))
//! NodeId(2): Attrib   (parent=(1, "layout"))
//! ```

mod registry;

pub use registry::*;
